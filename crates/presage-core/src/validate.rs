#![forbid(unsafe_code)]

//! Size and shape limits for UI trees.
//!
//! Trees that exceed these limits are not learned from. The walk stops at the
//! first violation.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::node::UiNode;
use crate::path::NodePath;

/// Limits enforced by [`validate_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_depth: usize,
    /// Counts null placeholders.
    pub max_nodes: usize,
    pub max_children: usize,
    pub max_attr_key_len: usize,
    pub max_attr_value_len: usize,
    pub max_text_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_nodes: 10_000,
            max_children: 1_000,
            max_attr_key_len: 256,
            max_attr_value_len: 4_096,
            max_text_len: 1024 * 1024,
        }
    }
}

/// A tree limit or shape violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    TooDeep { depth: usize, max: usize },
    TooManyNodes { max: usize },
    TooManyChildren { path: NodePath, count: usize, max: usize },
    AttrKeyTooLong { path: NodePath, len: usize, max: usize },
    AttrValueTooLong { path: NodePath, key: String, len: usize, max: usize },
    TextTooLong { path: NodePath, len: usize, max: usize },
    /// Two siblings share a path.
    DuplicatePath { path: NodePath },
    /// A child's path is not a direct child of its parent's path.
    MisplacedChild { parent: NodePath, child: NodePath },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooDeep { depth, max } => write!(f, "tree depth {depth} exceeds {max}"),
            Self::TooManyNodes { max } => write!(f, "tree has more than {max} nodes"),
            Self::TooManyChildren { path, count, max } => {
                write!(f, "element '{path}' has {count} children (max {max})")
            }
            Self::AttrKeyTooLong { path, len, max } => {
                write!(f, "attribute key of {len} bytes at '{path}' (max {max})")
            }
            Self::AttrValueTooLong {
                path,
                key,
                len,
                max,
            } => write!(
                f,
                "attribute {key:?} at '{path}' has a {len}-byte value (max {max})"
            ),
            Self::TextTooLong { path, len, max } => {
                write!(f, "text of {len} bytes at '{path}' (max {max})")
            }
            Self::DuplicatePath { path } => write!(f, "duplicate sibling path '{path}'"),
            Self::MisplacedChild { parent, child } => {
                write!(f, "child '{child}' is not directly below '{parent}'")
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// Check `tree` against `config`.
pub fn validate_tree(tree: &UiNode, config: &ValidationConfig) -> Result<(), TreeError> {
    let mut seen = 0usize;
    walk(tree, 0, config, &mut seen)
}

fn walk(
    node: &UiNode,
    depth: usize,
    config: &ValidationConfig,
    seen: &mut usize,
) -> Result<(), TreeError> {
    if depth > config.max_depth {
        return Err(TreeError::TooDeep {
            depth,
            max: config.max_depth,
        });
    }
    *seen += 1;
    if *seen > config.max_nodes {
        return Err(TreeError::TooManyNodes {
            max: config.max_nodes,
        });
    }

    match node {
        UiNode::Null(_) => Ok(()),
        UiNode::Text(text) => {
            if text.content.len() > config.max_text_len {
                return Err(TreeError::TextTooLong {
                    path: text.path.clone(),
                    len: text.content.len(),
                    max: config.max_text_len,
                });
            }
            Ok(())
        }
        UiNode::Element(el) => {
            if el.children.len() > config.max_children {
                return Err(TreeError::TooManyChildren {
                    path: el.path.clone(),
                    count: el.children.len(),
                    max: config.max_children,
                });
            }
            for (key, value) in &el.attrs {
                if key.len() > config.max_attr_key_len {
                    return Err(TreeError::AttrKeyTooLong {
                        path: el.path.clone(),
                        len: key.len(),
                        max: config.max_attr_key_len,
                    });
                }
                if value.len() > config.max_attr_value_len {
                    return Err(TreeError::AttrValueTooLong {
                        path: el.path.clone(),
                        key: key.clone(),
                        len: value.len(),
                        max: config.max_attr_value_len,
                    });
                }
            }

            let mut siblings = FxHashSet::default();
            for child in &el.children {
                if !el.path.is_parent_of(child.path()) {
                    return Err(TreeError::MisplacedChild {
                        parent: el.path.clone(),
                        child: child.path().clone(),
                    });
                }
                if !siblings.insert(child.path()) {
                    return Err(TreeError::DuplicatePath {
                        path: child.path().clone(),
                    });
                }
                walk(child, depth + 1, config, seen)?;
            }
            Ok(())
        }
    }
}
