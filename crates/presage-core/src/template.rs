#![forbid(unsafe_code)]

//! Parameterized patches.
//!
//! A [`TemplatePatch`] is a string with positional placeholders (`{0}`,
//! `{1}`, ...) plus the state keys bound to each placeholder. Literal braces
//! are written doubled (`{{`, `}}`), so any observed content can be embedded
//! verbatim with [`escape_literal`].
//!
//! A conditional template instead maps the rendered value of one binding to a
//! literal output per branch.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Error produced while parsing or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template string is not well formed.
    Malformed {
        /// Byte offset of the problem.
        offset: usize,
        reason: &'static str,
    },
    /// A placeholder refers to a value that was not supplied.
    MissingValue { index: usize, supplied: usize },
    /// A conditional template has no binding index.
    MissingConditionalIndex,
    /// The conditional binding index is past the end of `bindings`.
    ConditionalIndexOutOfRange { index: usize, bindings: usize },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { offset, reason } => {
                write!(f, "malformed template at byte {offset}: {reason}")
            }
            Self::MissingValue { index, supplied } => write!(
                f,
                "placeholder {{{index}}} has no value ({supplied} supplied)"
            ),
            Self::MissingConditionalIndex => {
                write!(f, "conditional template without a binding index")
            }
            Self::ConditionalIndexOutOfRange { index, bindings } => write!(
                f,
                "conditional binding index {index} out of range for {bindings} bindings"
            ),
        }
    }
}

impl std::error::Error for TemplateError {}

/// One parsed piece of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePiece {
    Literal(String),
    Placeholder(usize),
}

/// Escape `text` so it renders verbatim inside a template.
#[must_use]
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '{' => out.push_str("{{"),
            '}' => out.push_str("}}"),
            other => out.push(other),
        }
    }
    out
}

/// Parse a template string into literal and placeholder pieces.
///
/// Adjacent literal text is merged into one piece.
pub fn parse_template(template: &str) -> Result<Vec<TemplatePiece>, TemplateError> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                        Some(_) => {
                            return Err(TemplateError::Malformed {
                                offset,
                                reason: "placeholder must be a decimal index",
                            });
                        }
                        None => {
                            return Err(TemplateError::Malformed {
                                offset,
                                reason: "unterminated placeholder",
                            });
                        }
                    }
                }
                let index = digits.parse().map_err(|_| TemplateError::Malformed {
                    offset,
                    reason: "empty or oversized placeholder index",
                })?;
                if !literal.is_empty() {
                    pieces.push(TemplatePiece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(TemplatePiece::Placeholder(index));
            }
            '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(TemplateError::Malformed {
                    offset,
                    reason: "unmatched closing brace",
                });
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        pieces.push(TemplatePiece::Literal(literal));
    }
    Ok(pieces)
}

/// Inverse of [`parse_template`].
#[must_use]
pub fn compose_template(pieces: &[TemplatePiece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            TemplatePiece::Literal(text) => out.push_str(&escape_literal(text)),
            TemplatePiece::Placeholder(index) => {
                out.push('{');
                out.push_str(&index.to_string());
                out.push('}');
            }
        }
    }
    out
}

/// A parameterized patch payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    /// Template string with `{N}` placeholders.
    pub template: String,
    /// State key bound to each placeholder index.
    pub bindings: Vec<String>,
    /// Character offsets of the bound values in the content the template
    /// was learned from.
    #[serde(default)]
    pub slots: Vec<usize>,
    /// Literal output per rendered value of the conditional binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_templates: Option<BTreeMap<String, String>>,
    /// Which binding selects the conditional branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_binding_index: Option<usize>,
}

impl TemplatePatch {
    /// A plain template with no slot information.
    #[must_use]
    pub fn simple(template: impl Into<String>, bindings: Vec<String>) -> Self {
        Self {
            template: template.into(),
            bindings,
            slots: Vec::new(),
            conditional_templates: None,
            conditional_binding_index: None,
        }
    }

    /// A conditional template on a single binding.
    ///
    /// `fallback` is the literal stored in `template`; it is what a consumer
    /// that ignores conditionals would render.
    #[must_use]
    pub fn conditional(
        binding: impl Into<String>,
        branches: BTreeMap<String, String>,
        fallback: &str,
    ) -> Self {
        Self {
            template: escape_literal(fallback),
            bindings: vec![binding.into()],
            slots: Vec::new(),
            conditional_templates: Some(branches),
            conditional_binding_index: Some(0),
        }
    }

    #[must_use]
    pub fn with_slots(mut self, slots: Vec<usize>) -> Self {
        self.slots = slots;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.conditional_templates.is_some()
    }

    /// State key that selects the conditional branch.
    pub fn conditional_binding(&self) -> Result<&str, TemplateError> {
        let index = self
            .conditional_binding_index
            .ok_or(TemplateError::MissingConditionalIndex)?;
        self.bindings
            .get(index)
            .map(String::as_str)
            .ok_or(TemplateError::ConditionalIndexOutOfRange {
                index,
                bindings: self.bindings.len(),
            })
    }

    /// Output of the branch selected by `key`, if that branch was observed.
    #[must_use]
    pub fn select_branch(&self, key: &str) -> Option<&str> {
        self.conditional_templates
            .as_ref()?
            .get(key)
            .map(String::as_str)
    }

    /// Substitute `values[i]` for every `{i}` in the template.
    pub fn render(&self, values: &[String]) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.template.len());
        for piece in parse_template(&self.template)? {
            match piece {
                TemplatePiece::Literal(text) => out.push_str(&text),
                TemplatePiece::Placeholder(index) => {
                    let value = values.get(index).ok_or(TemplateError::MissingValue {
                        index,
                        supplied: values.len(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Check that the template parses and its indices fit its bindings.
    pub fn validate(&self) -> Result<(), TemplateError> {
        for piece in parse_template(&self.template)? {
            if let TemplatePiece::Placeholder(index) = piece
                && index >= self.bindings.len()
            {
                return Err(TemplateError::MissingValue {
                    index,
                    supplied: self.bindings.len(),
                });
            }
        }
        if self.is_conditional() {
            self.conditional_binding()?;
        }
        Ok(())
    }

    /// Rough heap footprint in bytes.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.template.len()
            + self.bindings.iter().map(String::len).sum::<usize>()
            + self.slots.len() * std::mem::size_of::<usize>()
            + self.conditional_templates.as_ref().map_or(0, |branches| {
                branches.iter().map(|(k, v)| k.len() + v.len()).sum()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn renders_positional_placeholders() {
        let tp = TemplatePatch::simple("User: {0} {1}", strings(&["first", "last"]));
        assert_eq!(tp.render(&strings(&["Jane", "Doe"])).unwrap(), "User: Jane Doe");
    }

    #[test]
    fn escaped_braces_render_verbatim() {
        let tp = TemplatePatch::simple("{{x}} = {0}", strings(&["x"]));
        assert_eq!(tp.render(&strings(&["1"])).unwrap(), "{x} = 1");
        assert_eq!(escape_literal("{a}"), "{{a}}");
    }

    #[test]
    fn parse_compose_inverse() {
        let source = "a {{b}} {0}{1} c";
        let pieces = parse_template(source).unwrap();
        assert_eq!(
            pieces,
            vec![
                TemplatePiece::Literal("a {b} ".into()),
                TemplatePiece::Placeholder(0),
                TemplatePiece::Placeholder(1),
                TemplatePiece::Literal(" c".into()),
            ]
        );
        assert_eq!(compose_template(&pieces), source);
    }

    #[test]
    fn malformed_templates() {
        assert!(matches!(
            parse_template("{x}"),
            Err(TemplateError::Malformed { offset: 0, .. })
        ));
        assert!(matches!(
            parse_template("ab {0"),
            Err(TemplateError::Malformed { offset: 3, .. })
        ));
        assert!(matches!(
            parse_template("}"),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            parse_template("{}"),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_value_is_an_error() {
        let tp = TemplatePatch::simple("{2}", strings(&["a"]));
        assert_eq!(
            tp.render(&strings(&["x"])),
            Err(TemplateError::MissingValue {
                index: 2,
                supplied: 1
            })
        );
        assert!(tp.validate().is_err());
    }

    #[test]
    fn conditional_branches() {
        let mut branches = BTreeMap::new();
        branches.insert("true".to_string(), "Online".to_string());
        branches.insert("false".to_string(), "Offline".to_string());
        let tp = TemplatePatch::conditional("isOnline", branches, "Offline");
        assert!(tp.is_conditional());
        assert_eq!(tp.conditional_binding(), Ok("isOnline"));
        assert_eq!(tp.select_branch("true"), Some("Online"));
        assert_eq!(tp.select_branch("maybe"), None);
        assert!(tp.validate().is_ok());

        let json = serde_json::to_value(&tp).unwrap();
        assert_eq!(json["conditionalTemplates"]["false"], "Offline");
        assert_eq!(json["conditionalBindingIndex"], 0);
    }

    #[test]
    fn conditional_without_index_is_invalid() {
        let mut tp = TemplatePatch::conditional("flag", BTreeMap::new(), "");
        tp.conditional_binding_index = None;
        assert_eq!(tp.validate(), Err(TemplateError::MissingConditionalIndex));
    }

    #[test]
    fn plain_template_omits_conditional_fields() {
        let tp = TemplatePatch::simple("{0}", strings(&["count"])).with_slots(vec![7]);
        let json = serde_json::to_value(&tp).unwrap();
        assert!(json.get("conditionalTemplates").is_none());
        assert!(json.get("conditionalBindingIndex").is_none());
        assert_eq!(json["slots"][0], 7);
    }
}
