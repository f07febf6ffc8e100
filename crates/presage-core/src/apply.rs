#![forbid(unsafe_code)]

//! Apply concrete patches to an in-memory tree.
//!
//! Each patch mutates exactly the node it addresses. `Remove` leaves a `Null`
//! placeholder in the slot so sibling paths stay valid; `Create` on an
//! occupied slot replaces the occupant.

use std::fmt;

use crate::node::{NodeKind, UiNode};
use crate::patch::Patch;
use crate::path::NodePath;

/// Error returned when a patch cannot be applied to a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No node exists at the addressed path.
    NodeNotFound { path: NodePath },
    /// A `Create` targets a slot whose parent does not exist.
    ParentNotFound { path: NodePath },
    /// The addressed node is of the wrong kind for this patch.
    KindMismatch {
        path: NodePath,
        expected: NodeKind,
        found: NodeKind,
    },
    /// A templated patch reached the tree without being materialized.
    Unmaterialized { path: NodePath },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { path } => write!(f, "no node at path '{path}'"),
            Self::ParentNotFound { path } => write!(f, "no parent element for path '{path}'"),
            Self::KindMismatch {
                path,
                expected,
                found,
            } => write!(
                f,
                "expected {} at path '{path}', found {}",
                expected.as_str(),
                found.as_str()
            ),
            Self::Unmaterialized { path } => {
                write!(f, "template patch at path '{path}' must be materialized first")
            }
        }
    }
}

impl std::error::Error for ApplyError {}

/// Apply one concrete patch to `tree`.
pub fn apply_patch(tree: &mut UiNode, patch: &Patch) -> Result<(), ApplyError> {
    match patch {
        Patch::Create { path, node } => create(tree, path, node),
        Patch::Remove { path } => {
            let target = tree
                .find_mut(path)
                .ok_or_else(|| ApplyError::NodeNotFound { path: path.clone() })?;
            *target = UiNode::null_at(path.clone());
            Ok(())
        }
        Patch::UpdateText { path, content } => match find(tree, path)? {
            UiNode::Text(text) => {
                text.content.clone_from(content);
                Ok(())
            }
            other => Err(mismatch(path, NodeKind::Text, other)),
        },
        Patch::UpdateProps {
            path,
            attrs,
            removed,
        } => match find(tree, path)? {
            UiNode::Element(el) => {
                el.attrs
                    .extend(attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
                for key in removed {
                    el.attrs.remove(key);
                }
                Ok(())
            }
            other => Err(mismatch(path, NodeKind::Element, other)),
        },
        Patch::UpdateTextTemplate { path, .. } | Patch::UpdatePropsTemplate { path, .. } => {
            Err(ApplyError::Unmaterialized { path: path.clone() })
        }
    }
}

/// Apply `patches` in order, stopping at the first failure.
///
/// Patches before the failing one remain applied.
pub fn apply_patches(tree: &mut UiNode, patches: &[Patch]) -> Result<(), ApplyError> {
    patches.iter().try_for_each(|patch| apply_patch(tree, patch))
}

/// Return a patched copy of `tree`, leaving the input untouched.
pub fn patched(tree: &UiNode, patches: &[Patch]) -> Result<UiNode, ApplyError> {
    let mut copy = tree.clone();
    apply_patches(&mut copy, patches)?;
    Ok(copy)
}

fn find<'a>(tree: &'a mut UiNode, path: &NodePath) -> Result<&'a mut UiNode, ApplyError> {
    tree.find_mut(path)
        .ok_or_else(|| ApplyError::NodeNotFound { path: path.clone() })
}

fn mismatch(path: &NodePath, expected: NodeKind, found: &UiNode) -> ApplyError {
    ApplyError::KindMismatch {
        path: path.clone(),
        expected,
        found: found.kind(),
    }
}

fn create(tree: &mut UiNode, path: &NodePath, node: &UiNode) -> Result<(), ApplyError> {
    let mut node = node.clone();
    if node.path() != path {
        node.assign_paths(path.clone());
    }

    if let Some(target) = tree.find_mut(path) {
        *target = node;
        return Ok(());
    }

    let parent_path = path
        .parent()
        .ok_or_else(|| ApplyError::NodeNotFound { path: path.clone() })?;
    match tree.find_mut(&parent_path) {
        Some(UiNode::Element(el)) => {
            let at = el.children.partition_point(|c| c.path() < path);
            el.children.insert(at, node);
            Ok(())
        }
        Some(other) => Err(mismatch(&parent_path, NodeKind::Element, other)),
        None => Err(ApplyError::ParentNotFound { path: path.clone() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::template::TemplatePatch;
    use pretty_assertions::assert_eq;

    fn list(items: &[&str]) -> UiNode {
        UiNode::element("ul")
            .attr("class", "list")
            .children(items.iter().map(|item| UiNode::text(*item)))
            .build()
            .with_assigned_paths()
    }

    #[test]
    fn applying_a_reconcile_diff_converges() {
        let old = list(&["a", "b"]);
        let new = UiNode::element("ul")
            .attr("class", "list wide")
            .child(UiNode::text("a"))
            .child(UiNode::text("B"))
            .child(UiNode::element("li").child(UiNode::text("c")))
            .build()
            .with_assigned_paths();
        let result = patched(&old, &reconcile(&old, &new)).unwrap();
        assert_eq!(result, new);
    }

    #[test]
    fn remove_leaves_a_placeholder() {
        let mut tree = list(&["a", "b", "c"]);
        let path = NodePath::from_slot_indices(&[1]);
        apply_patch(&mut tree, &Patch::Remove { path: path.clone() }).unwrap();
        assert!(tree.find(&path).unwrap().is_null());
        let third = NodePath::from_slot_indices(&[2]);
        assert_eq!(tree.find(&third).and_then(UiNode::text_content), Some("c"));
    }

    #[test]
    fn create_inserts_in_path_order() {
        let mut tree = list(&["a", "c"]);
        let first = NodePath::from_slot_indices(&[0]);
        let second = NodePath::from_slot_indices(&[1]);
        let mid = first.between(&second).unwrap();
        apply_patch(
            &mut tree,
            &Patch::Create {
                path: mid.clone(),
                node: UiNode::text("b"),
            },
        )
        .unwrap();
        let texts: Vec<_> = tree
            .children()
            .iter()
            .filter_map(UiNode::text_content)
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(tree.children()[1].path(), &mid);
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let mut tree = list(&["a"]);
        let err = apply_patch(
            &mut tree,
            &Patch::UpdateText {
                path: NodePath::root(),
                content: "x".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::KindMismatch {
                expected: NodeKind::Text,
                found: NodeKind::Element,
                ..
            }
        ));
    }

    #[test]
    fn missing_nodes_are_reported() {
        let mut tree = list(&["a"]);
        let deep = NodePath::from_slot_indices(&[4, 0]);
        assert_eq!(
            apply_patch(&mut tree, &Patch::Remove { path: deep.clone() }),
            Err(ApplyError::NodeNotFound { path: deep.clone() })
        );
        assert_eq!(
            apply_patch(
                &mut tree,
                &Patch::Create {
                    path: deep.clone(),
                    node: UiNode::text("x"),
                }
            ),
            Err(ApplyError::ParentNotFound { path: deep })
        );
    }

    #[test]
    fn templates_must_be_materialized() {
        let mut tree = list(&["a"]);
        let path = NodePath::from_slot_indices(&[0]);
        let err = apply_patch(
            &mut tree,
            &Patch::UpdateTextTemplate {
                path: path.clone(),
                template_patch: TemplatePatch::simple("{0}", vec!["x".into()]),
            },
        )
        .unwrap_err();
        assert_eq!(err, ApplyError::Unmaterialized { path });
        assert!(err.to_string().contains("materialized"));
    }
}
