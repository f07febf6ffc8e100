#![forbid(unsafe_code)]

//! Stateless tree reconciler.
//!
//! [`reconcile`] compares two UI trees and returns the ordered patch list
//! that turns the old tree into the new one. Children are matched by
//! [`NodePath`], not by position, so a conditional sibling that switches
//! between content and `Null` only ever produces a patch for its own slot.
//!
//! Patch order is fixed: at each element, removals of vanished children come
//! first (in old order), then the new children are walked in order.

use rustc_hash::FxHashMap;
use tracing::{debug_span, trace};

use crate::node::{Attributes, Element, UiNode};
use crate::patch::Patch;
use crate::path::NodePath;

/// Compute the patches that turn `old` into `new`.
///
/// Deterministic and side-effect free. `reconcile(t, t)` is always empty.
#[must_use]
pub fn reconcile(old: &UiNode, new: &UiNode) -> Vec<Patch> {
    let _span = debug_span!("reconcile").entered();
    let mut patches = Vec::new();
    diff_node(old, new, &mut patches);
    trace!(patches = patches.len(), "reconcile finished");
    patches
}

fn diff_node(old: &UiNode, new: &UiNode, out: &mut Vec<Patch>) {
    match (old, new) {
        (UiNode::Null(_), UiNode::Null(_)) => {}
        (_, UiNode::Null(null)) => out.push(Patch::Remove {
            path: null.path.clone(),
        }),
        (UiNode::Text(a), UiNode::Text(b)) => {
            if a.content != b.content {
                out.push(Patch::UpdateText {
                    path: b.path.clone(),
                    content: b.content.clone(),
                });
            }
        }
        (UiNode::Element(a), UiNode::Element(b)) if a.tag == b.tag && a.key == b.key => {
            diff_attrs(a, b, out);
            diff_children(a, b, out);
        }
        // Null to content, kind change, tag change, or key change.
        _ => out.push(Patch::Create {
            path: new.path().clone(),
            node: new.clone(),
        }),
    }
}

fn diff_attrs(old: &Element, new: &Element, out: &mut Vec<Patch>) {
    let changed: Attributes = new
        .attrs
        .iter()
        .filter(|(k, v)| old.attrs.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let removed: Vec<String> = old
        .attrs
        .keys()
        .filter(|k| !new.attrs.contains_key(*k))
        .cloned()
        .collect();
    if !changed.is_empty() || !removed.is_empty() {
        out.push(Patch::UpdateProps {
            path: new.path.clone(),
            attrs: changed,
            removed,
        });
    }
}

fn diff_children(old: &Element, new: &Element, out: &mut Vec<Patch>) {
    let old_by_path: FxHashMap<&NodePath, &UiNode> =
        old.children.iter().map(|c| (c.path(), c)).collect();
    let new_by_path: FxHashMap<&NodePath, &UiNode> =
        new.children.iter().map(|c| (c.path(), c)).collect();

    for child in &old.children {
        if !child.is_null() && !new_by_path.contains_key(child.path()) {
            out.push(Patch::Remove {
                path: child.path().clone(),
            });
        }
    }

    for child in &new.children {
        match old_by_path.get(child.path()) {
            Some(previous) => diff_node(previous, child, out),
            None if child.is_null() => {}
            None => out.push(Patch::Create {
                path: child.path().clone(),
                node: child.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn counter(count: u32, show_badge: bool) -> UiNode {
        UiNode::element("div")
            .attr("class", "counter")
            .child(UiNode::text(format!("Count: {count}")))
            .child_if(show_badge, UiNode::element("span").child(UiNode::text("new")))
            .child(UiNode::element("button").child(UiNode::text("+")))
            .build()
            .with_assigned_paths()
    }

    #[test]
    fn identical_trees_produce_nothing() {
        let tree = counter(3, true);
        assert!(reconcile(&tree, &tree).is_empty());
    }

    #[test]
    fn text_change_is_a_single_update() {
        let patches = reconcile(&counter(0, false), &counter(1, false));
        assert_eq!(
            patches,
            vec![Patch::UpdateText {
                path: NodePath::from_slot_indices(&[0]),
                content: "Count: 1".into(),
            }]
        );
    }

    #[test]
    fn null_to_element_is_a_single_create() {
        let new = counter(0, true);
        let patches = reconcile(&counter(0, false), &new);
        let path = NodePath::from_slot_indices(&[1]);
        assert_eq!(
            patches,
            vec![Patch::Create {
                path: path.clone(),
                node: new.find(&path).unwrap().clone(),
            }]
        );
    }

    #[test]
    fn element_to_null_is_a_single_remove() {
        let patches = reconcile(&counter(0, true), &counter(0, false));
        assert_eq!(
            patches,
            vec![Patch::Remove {
                path: NodePath::from_slot_indices(&[1]),
            }]
        );
    }

    #[test]
    fn attribute_diff_lists_only_changes() {
        let old = UiNode::element("a")
            .attr("href", "/x")
            .attr("title", "t")
            .attr("id", "keep")
            .build();
        let new = UiNode::element("a")
            .attr("href", "/y")
            .attr("id", "keep")
            .attr("rel", "next")
            .build();
        let patches = reconcile(&old, &new);
        let mut attrs = Attributes::new();
        attrs.insert("href".into(), "/y".into());
        attrs.insert("rel".into(), "next".into());
        assert_eq!(
            patches,
            vec![Patch::UpdateProps {
                path: NodePath::root(),
                attrs,
                removed: vec!["title".into()],
            }]
        );
    }

    #[test]
    fn tag_change_replaces_the_node() {
        let old = UiNode::element("div")
            .child(UiNode::element("p").attr("a", "1"))
            .build()
            .with_assigned_paths();
        let new = UiNode::element("div")
            .child(UiNode::element("h1").attr("a", "2"))
            .build()
            .with_assigned_paths();
        let patches = reconcile(&old, &new);
        assert_eq!(patches.len(), 1);
        assert!(matches!(&patches[0], Patch::Create { node, .. } if node.kind().as_str() == "Element"));
    }

    #[test]
    fn vanished_children_are_removed_before_new_ones_are_walked() {
        let old = UiNode::element("ul")
            .child(UiNode::text("a"))
            .child(UiNode::text("b"))
            .build()
            .with_assigned_paths();
        let mut new = UiNode::element("ul").child(UiNode::text("z")).build();
        new.assign_paths(NodePath::root());
        // Second slot vanishes entirely; the first changes content.
        let patches = reconcile(&old, &new);
        assert_eq!(
            patches,
            vec![
                Patch::Remove {
                    path: NodePath::from_slot_indices(&[1]),
                },
                Patch::UpdateText {
                    path: NodePath::from_slot_indices(&[0]),
                    content: "z".into(),
                },
            ]
        );
    }

    #[test]
    fn sibling_inserted_before_existing_ones_is_a_single_create() {
        let old = UiNode::element("ul")
            .child(UiNode::text("a"))
            .child(UiNode::text("b"))
            .build()
            .with_assigned_paths();
        let new = UiNode::element("ul")
            .child_at(crate::path::PATH_GAP / 2, UiNode::text("new"))
            .child(UiNode::text("a"))
            .child(UiNode::text("b"))
            .build()
            .with_assigned_paths();
        assert_eq!(old.children()[0].path(), new.children()[1].path());

        let inserted = new.children()[0].clone();
        assert_eq!(
            reconcile(&old, &new),
            vec![Patch::Create {
                path: inserted.path().clone(),
                node: inserted,
            }]
        );
    }

    #[test]
    fn null_to_null_is_silent() {
        let a = UiNode::null_at(NodePath::from_slot_indices(&[0]));
        assert!(reconcile(&a, &a.clone()).is_empty());
    }
}
