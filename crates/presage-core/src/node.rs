#![forbid(unsafe_code)]

//! UI tree model: elements, text, and explicit null placeholders.
//!
//! Every position that can hold a node holds exactly one [`UiNode`] at every
//! render. A conditionally absent node is a [`UiNode::Null`] carrying the path
//! of the slot it occupies, so the paths of its siblings never shift.
//!
//! # Building trees
//!
//! ```
//! use presage_core::node::UiNode;
//!
//! let tree = UiNode::element("div")
//!     .attr("class", "counter")
//!     .child(UiNode::text("Count: 0"))
//!     .child(UiNode::null())
//!     .build()
//!     .with_assigned_paths();
//!
//! let text = tree.children()[0].path().to_string();
//! assert_eq!(text, "00010000");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::NodePath;

/// Ordered attribute map.
pub type Attributes = BTreeMap<String, String>;

/// Discriminant of a [`UiNode`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
    Null,
}

impl NodeKind {
    /// Human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Element => "Element",
            Self::Text => "Text",
            Self::Null => "Null",
        }
    }
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attrs: Attributes,
    #[serde(default)]
    pub children: Vec<UiNode>,
    /// Stable key. Compared for equality at the same path only: a changed
    /// key replaces the node. Keys never match moved children; position is
    /// carried by the path alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub path: NodePath,
}

/// A text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub content: String,
    #[serde(default)]
    pub path: NodePath,
}

/// A placeholder for a slot where nothing renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Null {
    #[serde(default)]
    pub path: NodePath,
}

/// A node of the UI tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UiNode {
    Element(Element),
    Text(Text),
    Null(Null),
}

impl UiNode {
    /// Start building an element.
    #[must_use]
    pub fn element(tag: impl Into<String>) -> ElementBuilder {
        ElementBuilder::new(tag)
    }

    /// A text node at the root path.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(Text {
            content: content.into(),
            path: NodePath::root(),
        })
    }

    /// A null placeholder at the root path.
    #[must_use]
    pub fn null() -> Self {
        Self::Null(Null::default())
    }

    /// A null placeholder at `path`.
    #[must_use]
    pub fn null_at(path: NodePath) -> Self {
        Self::Null(Null { path })
    }

    /// Kind of this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Element(_) => NodeKind::Element,
            Self::Text(_) => NodeKind::Text,
            Self::Null(_) => NodeKind::Null,
        }
    }

    /// Structural path of this node.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        match self {
            Self::Element(el) => &el.path,
            Self::Text(text) => &text.path,
            Self::Null(null) => &null.path,
        }
    }

    /// Overwrite the path of this node only (children are left untouched).
    pub fn set_path(&mut self, path: NodePath) {
        match self {
            Self::Element(el) => el.path = path,
            Self::Text(text) => text.path = path,
            Self::Null(null) => null.path = path,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Stable key of an element, if any. Not used to match moved children.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Element(el) => el.key.as_deref(),
            _ => None,
        }
    }

    /// Children of an element; empty for text and null nodes.
    #[must_use]
    pub fn children(&self) -> &[UiNode] {
        match self {
            Self::Element(el) => &el.children,
            _ => &[],
        }
    }

    /// Text content of a text node.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(&text.content),
            _ => None,
        }
    }

    /// Attribute value of an element.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element(el) => el.attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// Assign gap-allocated paths to this subtree, starting at `path`.
    ///
    /// A child that already carries a path keeps its last segment and is
    /// rebased under `path`. A child still at the root path is unassigned and
    /// receives the first gap boundary after its previous sibling's segment,
    /// so a tree built only with [`ElementBuilder::child`] gets slot `i` at
    /// `(i + 1) * PATH_GAP`. Null children occupy their slot like any other
    /// node. Reassigning an assigned tree leaves it unchanged.
    pub fn assign_paths(&mut self, path: NodePath) {
        if let Self::Element(el) = self {
            let mut prev = 0;
            for child in &mut el.children {
                let segment = match child.path().last_segment() {
                    Some(segment) => segment,
                    None => NodePath::segment_after(prev),
                };
                child.assign_paths(path.child_segment(segment));
                prev = segment;
            }
        }
        self.set_path(path);
    }

    /// Consume and return the tree with paths assigned from the root.
    #[must_use]
    pub fn with_assigned_paths(mut self) -> Self {
        self.assign_paths(NodePath::root());
        self
    }

    /// Find the node at `path`.
    #[must_use]
    pub fn find(&self, path: &NodePath) -> Option<&UiNode> {
        if self.path() == path {
            return Some(self);
        }
        if !path.starts_with(self.path()) {
            return None;
        }
        self.children()
            .iter()
            .find(|child| path.starts_with(child.path()))
            .and_then(|child| child.find(path))
    }

    /// Find the node at `path`, mutably.
    pub fn find_mut(&mut self, path: &NodePath) -> Option<&mut UiNode> {
        if self.path() == path {
            return Some(self);
        }
        if !path.starts_with(self.path()) {
            return None;
        }
        match self {
            Self::Element(el) => el
                .children
                .iter_mut()
                .find(|child| path.starts_with(child.path()))
                .and_then(|child| child.find_mut(path)),
            _ => None,
        }
    }

    /// Pre-order iterator over this subtree, including null placeholders.
    #[must_use]
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Map of every path in this subtree to its node.
    #[must_use]
    pub fn path_map(&self) -> BTreeMap<&NodePath, &UiNode> {
        self.iter().map(|node| (node.path(), node)).collect()
    }

    /// Number of nodes in this subtree, including null placeholders.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Rough heap footprint of this subtree in bytes.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        let own = std::mem::size_of::<UiNode>() + self.path().depth() * 4;
        match self {
            Self::Element(el) => {
                own + el.tag.len()
                    + el.key.as_ref().map_or(0, String::len)
                    + el.attrs.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
                    + el.children.iter().map(UiNode::estimated_bytes).sum::<usize>()
            }
            Self::Text(text) => own + text.content.len(),
            Self::Null(_) => own,
        }
    }
}

impl From<Element> for UiNode {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

impl From<ElementBuilder> for UiNode {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

/// Pre-order traversal of a subtree.
#[derive(Debug)]
pub struct PreOrder<'a> {
    stack: Vec<&'a UiNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a UiNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// Builder for [`Element`] nodes.
#[derive(Debug, Clone)]
#[must_use]
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            element: Element {
                tag: tag.into(),
                attrs: Attributes::new(),
                children: Vec::new(),
                key: None,
                path: NodePath::root(),
            },
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.element.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the element key. See [`Element::key`]; keys do not drive
    /// reordering.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.element.key = Some(key.into());
        self
    }

    pub fn child(mut self, child: impl Into<UiNode>) -> Self {
        self.element.children.push(child.into());
        self
    }

    /// Add `child` at an explicit path segment.
    ///
    /// The segment survives path assignment, so a sibling inserted between
    /// two existing ones (see [`NodePath::between`]) leaves their paths alone.
    /// Unassigned siblings after it continue from the next gap boundary.
    pub fn child_at(mut self, segment: u32, child: impl Into<UiNode>) -> Self {
        let mut child = child.into();
        child.set_path(NodePath::root().child_segment(segment));
        self.element.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = UiNode>) -> Self {
        self.element.children.extend(children);
        self
    }

    /// Add `child` when `present`, otherwise a null placeholder in its slot.
    pub fn child_if(self, present: bool, child: impl Into<UiNode>) -> Self {
        if present {
            self.child(child)
        } else {
            self.child(UiNode::null())
        }
    }

    #[must_use]
    pub fn build(self) -> UiNode {
        UiNode::Element(self.element)
    }
}
