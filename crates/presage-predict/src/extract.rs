#![forbid(unsafe_code)]

//! Template extraction from a single observed change.
//!
//! Given the content before and after one state change, an [`Extractor`]
//! tries to explain the new content as a function of state:
//!
//! 1. **Single variable**: the old value's rendered form occurs in the old
//!    content; replacing it with `{0}` and substituting the new value must
//!    reproduce the new content. Every occurrence is tried first, then
//!    smaller sets of occurrences, so `"Count: 0 of 10"` still yields
//!    `"Count: {0} of 10"`. When other snapshot values also occur in the
//!    content as whole tokens, the multi-variable form is preferred if it
//!    too reproduces; a value glued inside a word or number is treated as
//!    coincidence and the single-variable form stands.
//! 2. **Conditional**: a boolean change whose old and new content share no
//!    substring relationship; each observed branch is kept as a literal.
//! 3. **Multi variable**: every snapshot value occurring in the old content
//!    (non-overlapping, leftmost and longest first) becomes a placeholder,
//!    numbered by position. At least two distinct keys must match, and
//!    substituting the new snapshot must reproduce the new content.
//!
//! Every accepted template reproduces the observed new content exactly.

use std::collections::BTreeMap;

use presage_core::template::{TemplatePiece, compose_template};
use presage_core::{Patch, StateChange, StateSnapshot, TemplatePatch, UiNode};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

/// Which extraction strategy produced a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionKind {
    SingleVariable,
    Conditional,
    MultiVariable,
}

/// Templated patches learned from one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatedPatches {
    pub patches: Vec<Patch>,
    /// Strategy used for each patch, in order.
    pub kinds: SmallVec<[ExtractionKind; 4]>,
}

/// A reproducing multi-variable template.
#[derive(Debug)]
struct MultiMatch {
    template: TemplatePatch,
    /// Every placeholder for a key other than the changed one sits on a
    /// token boundary in the old content.
    others_on_boundaries: bool,
}

#[derive(Debug, Clone, Copy)]
struct Occurrence<'a> {
    start: usize,
    end: usize,
    key: &'a str,
}

/// Extracts templates for one state change.
#[derive(Debug, Clone)]
pub struct Extractor<'a> {
    change: &'a StateChange,
    before: StateSnapshot,
    after: StateSnapshot,
}

impl<'a> Extractor<'a> {
    /// `snapshot` may be taken before or after the change; the changed key is
    /// pinned to its old and new values respectively.
    #[must_use]
    pub fn new(change: &'a StateChange, snapshot: &StateSnapshot) -> Self {
        Self {
            change,
            before: change.state_before(snapshot),
            after: change.state_after(snapshot),
        }
    }

    /// Explain `new` as a template over `old`.
    #[must_use]
    pub fn extract_content(&self, old: &str, new: &str) -> Option<(TemplatePatch, ExtractionKind)> {
        if let Some(single) = self.single_variable(old, new) {
            return Some(match self.multi_variable(old, new) {
                Some(multi) if multi.others_on_boundaries => {
                    (multi.template, ExtractionKind::MultiVariable)
                }
                _ => (single, ExtractionKind::SingleVariable),
            });
        }
        if let Some(conditional) = self.conditional(old, new) {
            return Some((conditional, ExtractionKind::Conditional));
        }
        self.multi_variable(old, new)
            .map(|multi| (multi.template, ExtractionKind::MultiVariable))
    }

    /// Turn every patch of an observed diff into its templated form.
    ///
    /// Returns `None` if the diff is empty, if any patch is structural or
    /// removes attributes, or if any content cannot be explained.
    #[must_use]
    pub fn extract_patches(&self, patches: &[Patch], old_tree: &UiNode) -> Option<TemplatedPatches> {
        if patches.is_empty() {
            return None;
        }
        let mut out = TemplatedPatches {
            patches: Vec::with_capacity(patches.len()),
            kinds: SmallVec::new(),
        };
        for patch in patches {
            match patch {
                Patch::UpdateText { path, content } => {
                    let old = old_tree.find(path)?.text_content()?;
                    let (template_patch, kind) = self.extract_content(old, content)?;
                    out.patches.push(Patch::UpdateTextTemplate {
                        path: path.clone(),
                        template_patch,
                    });
                    out.kinds.push(kind);
                }
                Patch::UpdateProps {
                    path,
                    attrs,
                    removed,
                } if removed.is_empty() => {
                    let node = old_tree.find(path)?;
                    for (name, value) in attrs {
                        let old = node.attr(name)?;
                        let (template_patch, kind) = self.extract_content(old, value)?;
                        out.patches.push(Patch::UpdatePropsTemplate {
                            path: path.clone(),
                            attr_name: name.clone(),
                            template_patch,
                        });
                        out.kinds.push(kind);
                    }
                }
                other => {
                    trace!(patch = other.variant_name(), "patch cannot be templated");
                    return None;
                }
            }
        }
        // Canonical order by address so a re-derived template compares equal
        // to one loaded from a snapshot.
        let mut pairs: Vec<(Patch, ExtractionKind)> =
            out.patches.into_iter().zip(out.kinds).collect();
        pairs.sort_by_cached_key(|(patch, _)| patch.template_key());
        let (patches, kinds) = pairs.into_iter().unzip();
        Some(TemplatedPatches { patches, kinds })
    }

    fn single_variable(&self, old: &str, new: &str) -> Option<TemplatePatch> {
        let needle = self.change.old_value.render();
        if needle.is_empty() {
            return None;
        }
        let occurrences: Vec<Occurrence<'_>> = old
            .match_indices(needle.as_str())
            .map(|(start, m)| Occurrence {
                start,
                end: start + m.len(),
                key: &self.change.state_key,
            })
            .collect();
        if occurrences.is_empty() {
            return None;
        }
        let bindings = [self.change.state_key.as_str()];
        let value = [self.change.new_value.render()];
        occurrence_subsets(occurrences.len())
            .into_iter()
            .find_map(|subset| {
                let picked: Vec<Occurrence<'_>> =
                    subset.iter().map(|&i| occurrences[i]).collect();
                let template = build(old, &picked, &bindings);
                let rendered = template.render(&value).ok()?;
                (rendered == new).then_some(template)
            })
    }

    fn conditional(&self, old: &str, new: &str) -> Option<TemplatePatch> {
        self.change.old_value.as_bool()?;
        self.change.new_value.as_bool()?;
        if old.contains(new) || new.contains(old) {
            return None;
        }
        let (old_key, new_key) = (
            self.change.old_value.branch_key(),
            self.change.new_value.branch_key(),
        );
        if old_key == new_key {
            return None;
        }
        let mut branches = BTreeMap::new();
        branches.insert(old_key, old.to_string());
        branches.insert(new_key, new.to_string());
        // Fallback is the first branch by key, so both flip directions
        // derive the same template.
        let fallback = branches.values().next().cloned().unwrap_or_default();
        Some(TemplatePatch::conditional(
            self.change.state_key.clone(),
            branches,
            &fallback,
        ))
    }

    fn multi_variable(&self, old: &str, new: &str) -> Option<MultiMatch> {
        let rendered: Vec<(&str, String)> = self
            .before
            .iter()
            .map(|(key, value)| (key, value.render()))
            .filter(|(_, text)| !text.is_empty())
            .collect();

        let mut found: Vec<Occurrence<'_>> = Vec::new();
        for (key, text) in &rendered {
            found.extend(old.match_indices(text.as_str()).map(|(start, m)| Occurrence {
                start,
                end: start + m.len(),
                key: *key,
            }));
        }
        // Stable sort keeps key order among equal spans.
        found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut chosen: Vec<Occurrence<'_>> = Vec::new();
        let mut cursor = 0;
        for occ in found {
            if occ.start >= cursor {
                cursor = occ.end;
                chosen.push(occ);
            }
        }

        let mut bindings: Vec<&str> = Vec::new();
        for occ in &chosen {
            if !bindings.contains(&occ.key) {
                bindings.push(occ.key);
            }
        }
        if bindings.len() < 2 {
            return None;
        }

        let template = build(old, &chosen, &bindings);
        let values: Vec<String> = bindings
            .iter()
            .map(|key| self.after.value_or_null(key).render())
            .collect();
        let reproduced = template.render(&values).ok()?;
        if reproduced != new {
            return None;
        }
        let others_on_boundaries = chosen
            .iter()
            .filter(|occ| occ.key != self.change.state_key)
            .all(|occ| on_token_boundary(old, occ));
        Some(MultiMatch {
            template,
            others_on_boundaries,
        })
    }
}

/// Above this many occurrences only "all of them" and each single one are
/// tried.
const MAX_SUBSET_OCCURRENCES: usize = 8;

/// Candidate occurrence subsets, as sorted index lists: all occurrences
/// first, then smaller subsets, leftmost first within a size.
fn occurrence_subsets(n: usize) -> Vec<Vec<usize>> {
    if n > MAX_SUBSET_OCCURRENCES {
        let mut out = vec![(0..n).collect::<Vec<_>>()];
        out.extend((0..n).map(|i| vec![i]));
        return out;
    }
    let mut subsets: Vec<Vec<usize>> = (1..(1u32 << n))
        .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
        .collect();
    subsets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    subsets
}

/// Whether `occ` is not glued to a letter or digit on either side.
fn on_token_boundary(content: &str, occ: &Occurrence<'_>) -> bool {
    let before = content[..occ.start].chars().next_back();
    let after = content[occ.end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Build a template by cutting `occurrences` (sorted, non-overlapping) out of
/// `content` and numbering them by their position in `bindings`.
fn build(content: &str, occurrences: &[Occurrence<'_>], bindings: &[&str]) -> TemplatePatch {
    let mut pieces = Vec::with_capacity(occurrences.len() * 2 + 1);
    let mut slots = Vec::with_capacity(occurrences.len());
    let mut cursor = 0;
    for occ in occurrences {
        if occ.start > cursor {
            pieces.push(TemplatePiece::Literal(content[cursor..occ.start].to_string()));
        }
        let index = bindings.iter().position(|b| *b == occ.key).unwrap_or(0);
        pieces.push(TemplatePiece::Placeholder(index));
        slots.push(content[..occ.start].chars().count());
        cursor = occ.end;
    }
    if cursor < content.len() {
        pieces.push(TemplatePiece::Literal(content[cursor..].to_string()));
    }
    TemplatePatch::simple(
        compose_template(&pieces),
        bindings.iter().map(|b| (*b).to_string()).collect(),
    )
    .with_slots(slots)
}
