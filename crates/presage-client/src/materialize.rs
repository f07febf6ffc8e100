#![forbid(unsafe_code)]

//! Template materialization: templated patch + live state -> concrete patch.
//!
//! Plain templates substitute `{i}` with the rendered value of
//! `bindings[i]`; absent and null values render as the empty string.
//! Conditional templates select the literal output recorded for the current
//! value of their binding. A value that was never observed is a
//! [`MaterializeError::NoConditionalMatch`]: the caller waits for the
//! authoritative patches rather than guessing.
//!
//! Everything here is pure. Applying the result is the surface's job.

use std::fmt;

use presage_core::{Attributes, Patch, StateSnapshot, TemplateError, TemplatePatch};

/// Why a templated patch could not be materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    /// The conditional binding's current value has no recorded branch.
    NoConditionalMatch { binding: String, value: String },
    /// The template itself is malformed.
    Template(TemplateError),
}

impl fmt::Display for MaterializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConditionalMatch { binding, value } => {
                write!(f, "no conditional branch for {binding} = {value}")
            }
            Self::Template(err) => write!(f, "template error: {err}"),
        }
    }
}

impl std::error::Error for MaterializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Template(err) => Some(err),
            Self::NoConditionalMatch { .. } => None,
        }
    }
}

impl From<TemplateError> for MaterializeError {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

/// Content of `template_patch` under `state`.
pub fn materialize_template(
    template_patch: &TemplatePatch,
    state: &StateSnapshot,
) -> Result<String, MaterializeError> {
    if template_patch.is_conditional() {
        let binding = template_patch.conditional_binding()?;
        let value = state.value_or_null(binding).branch_key();
        return template_patch
            .select_branch(&value)
            .map(str::to_owned)
            .ok_or_else(|| MaterializeError::NoConditionalMatch {
                binding: binding.to_string(),
                value,
            });
    }
    let values: Vec<String> = template_patch
        .bindings
        .iter()
        .map(|key| state.value_or_null(key).render())
        .collect();
    Ok(template_patch.render(&values)?)
}

/// Concrete form of `patch`. Concrete patches are returned unchanged.
pub fn materialize(patch: &Patch, state: &StateSnapshot) -> Result<Patch, MaterializeError> {
    Ok(match patch {
        Patch::UpdateTextTemplate {
            path,
            template_patch,
        } => Patch::UpdateText {
            path: path.clone(),
            content: materialize_template(template_patch, state)?,
        },
        Patch::UpdatePropsTemplate {
            path,
            attr_name,
            template_patch,
        } => {
            let mut attrs = Attributes::new();
            attrs.insert(attr_name.clone(), materialize_template(template_patch, state)?);
            Patch::UpdateProps {
                path: path.clone(),
                attrs,
                removed: Vec::new(),
            }
        }
        concrete => concrete.clone(),
    })
}

/// Materialize every patch, or none: the first failure is returned.
pub fn materialize_all(patches: &[Patch], state: &StateSnapshot) -> Result<Vec<Patch>, MaterializeError> {
    patches.iter().map(|patch| materialize(patch, state)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use presage_core::{NodePath, StateValue};
    use std::collections::BTreeMap;

    fn online_template() -> TemplatePatch {
        let branches: BTreeMap<String, String> = [
            ("true".to_string(), "Online".to_string()),
            ("false".to_string(), "Offline".to_string()),
        ]
        .into_iter()
        .collect();
        TemplatePatch::conditional("isOnline", branches, "Offline")
    }

    #[test]
    fn simple_template_substitutes_values() {
        let tp = TemplatePatch::simple("Count: {0}", vec!["count".into()]);
        let state = StateSnapshot::new().with("count", 42);
        assert_eq!(materialize_template(&tp, &state).unwrap(), "Count: 42");
    }

    #[test]
    fn absent_and_null_render_empty() {
        let tp = TemplatePatch::simple("[{0}|{1}]", vec!["gone".into(), "nil".into()]);
        let state = StateSnapshot::new().with("nil", StateValue::Null);
        assert_eq!(materialize_template(&tp, &state).unwrap(), "[|]");
    }

    #[test]
    fn conditional_selects_branch() {
        let tp = online_template();
        let on = StateSnapshot::new().with("isOnline", true);
        let off = StateSnapshot::new().with("isOnline", false);
        assert_eq!(materialize_template(&tp, &on).unwrap(), "Online");
        assert_eq!(materialize_template(&tp, &off).unwrap(), "Offline");
    }

    #[test]
    fn conditional_unseen_value_is_no_match() {
        let tp = online_template();
        for state in [
            StateSnapshot::new(),
            StateSnapshot::new().with("isOnline", "maybe"),
        ] {
            assert!(matches!(
                materialize_template(&tp, &state),
                Err(MaterializeError::NoConditionalMatch { ref binding, .. }) if binding == "isOnline"
            ));
        }
    }

    #[test]
    fn conditional_without_index_is_a_template_error() {
        let mut tp = online_template();
        tp.conditional_binding_index = None;
        assert_eq!(
            materialize_template(&tp, &StateSnapshot::new()),
            Err(MaterializeError::Template(TemplateError::MissingConditionalIndex))
        );
    }

    #[test]
    fn patches_become_concrete() {
        let state = StateSnapshot::new().with("count", 3);
        let path = NodePath::root().child(0);
        let text = materialize(
            &Patch::UpdateTextTemplate {
                path: path.clone(),
                template_patch: TemplatePatch::simple("n={0}", vec!["count".into()]),
            },
            &state,
        )
        .unwrap();
        assert_eq!(
            text,
            Patch::UpdateText {
                path: path.clone(),
                content: "n=3".into()
            }
        );

        let props = materialize(
            &Patch::UpdatePropsTemplate {
                path: NodePath::root(),
                attr_name: "data-count".into(),
                template_patch: TemplatePatch::simple("{0}", vec!["count".into()]),
            },
            &state,
        )
        .unwrap();
        assert!(matches!(
            props,
            Patch::UpdateProps { ref attrs, ref removed, .. }
                if attrs.get("data-count").map(String::as_str) == Some("3") && removed.is_empty()
        ));

        let remove = Patch::Remove { path };
        assert_eq!(materialize(&remove, &state).unwrap(), remove);
    }

    #[test]
    fn all_or_nothing() {
        let patches = vec![
            Patch::UpdateTextTemplate {
                path: NodePath::root().child(0),
                template_patch: TemplatePatch::simple("{0}", vec!["count".into()]),
            },
            Patch::UpdateTextTemplate {
                path: NodePath::root().child(1),
                template_patch: online_template(),
            },
        ];
        let state = StateSnapshot::new().with("count", 1);
        assert!(materialize_all(&patches, &state).is_err());
        let state = state.with("isOnline", true);
        assert_eq!(materialize_all(&patches, &state).unwrap().len(), 2);
    }
}
