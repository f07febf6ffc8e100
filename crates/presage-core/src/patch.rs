#![forbid(unsafe_code)]

//! Patch records shipped to the render surface.
//!
//! Patches address nodes by [`NodePath`], never by child index, so a patch
//! stream stays valid when conditional siblings appear or disappear.
//!
//! The wire form is an internally tagged record:
//!
//! ```json
//! { "type": "UpdateTextTemplate",
//!   "path": "00010000",
//!   "templatePatch": { "template": "Count: {0}", "bindings": ["count"], "slots": [7] } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::node::{Attributes, UiNode};
use crate::path::NodePath;
use crate::template::TemplatePatch;

/// One surgical update to a UI tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Patch {
    /// Insert `node` at `path`, replacing whatever occupies the slot.
    Create { path: NodePath, node: UiNode },
    /// Clear the slot at `path`; it becomes a null placeholder.
    Remove { path: NodePath },
    /// Replace the content of the text node at `path`.
    UpdateText { path: NodePath, content: String },
    /// Set the changed attributes of the element at `path`.
    ///
    /// `attrs` holds only keys whose value changed or that were added;
    /// `removed` lists keys that disappeared.
    UpdateProps {
        path: NodePath,
        attrs: Attributes,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed: Vec<String>,
    },
    /// Text update whose content is computed from live state.
    UpdateTextTemplate {
        path: NodePath,
        #[serde(rename = "templatePatch")]
        template_patch: TemplatePatch,
    },
    /// Single-attribute update whose value is computed from live state.
    UpdatePropsTemplate {
        path: NodePath,
        #[serde(rename = "attrName")]
        attr_name: String,
        #[serde(rename = "templatePatch")]
        template_patch: TemplatePatch,
    },
}

impl Patch {
    /// Path of the node this patch addresses.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        match self {
            Self::Create { path, .. }
            | Self::Remove { path }
            | Self::UpdateText { path, .. }
            | Self::UpdateProps { path, .. }
            | Self::UpdateTextTemplate { path, .. }
            | Self::UpdatePropsTemplate { path, .. } => path,
        }
    }

    /// Whether this patch still needs live values before it can be applied.
    #[must_use]
    pub fn is_template(&self) -> bool {
        matches!(
            self,
            Self::UpdateTextTemplate { .. } | Self::UpdatePropsTemplate { .. }
        )
    }

    /// Payload of a templated patch.
    #[must_use]
    pub fn template_patch(&self) -> Option<&TemplatePatch> {
        match self {
            Self::UpdateTextTemplate { template_patch, .. }
            | Self::UpdatePropsTemplate { template_patch, .. } => Some(template_patch),
            _ => None,
        }
    }

    /// Whether this patch changes the shape of the tree.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Remove { .. })
    }

    /// Variant name as it appears in the `type` tag.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "Create",
            Self::Remove { .. } => "Remove",
            Self::UpdateText { .. } => "UpdateText",
            Self::UpdateProps { .. } => "UpdateProps",
            Self::UpdateTextTemplate { .. } => "UpdateTextTemplate",
            Self::UpdatePropsTemplate { .. } => "UpdatePropsTemplate",
        }
    }

    /// Rough heap footprint in bytes.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        let own = std::mem::size_of::<Self>() + self.path().depth() * 4;
        own + match self {
            Self::Create { node, .. } => node.estimated_bytes(),
            Self::Remove { .. } => 0,
            Self::UpdateText { content, .. } => content.len(),
            Self::UpdateProps { attrs, removed, .. } => {
                attrs.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
                    + removed.iter().map(String::len).sum::<usize>()
            }
            Self::UpdateTextTemplate { template_patch, .. } => template_patch.estimated_bytes(),
            Self::UpdatePropsTemplate {
                attr_name,
                template_patch,
                ..
            } => attr_name.len() + template_patch.estimated_bytes(),
        }
    }

    /// Key under which a templated patch is stored in a `.template` snapshot:
    /// the path, plus `@attr` for attribute templates.
    #[must_use]
    pub fn template_key(&self) -> Option<String> {
        match self {
            Self::UpdateTextTemplate { path, .. } => Some(path.to_string()),
            Self::UpdatePropsTemplate {
                path, attr_name, ..
            } => Some(format!("{path}@{attr_name}")),
            _ => None,
        }
    }
}

/// Rebuild a templated patch from its `.template` snapshot key.
///
/// Returns `None` when the key does not parse as a path.
#[must_use]
pub fn patch_from_template_key(key: &str, template_patch: TemplatePatch) -> Option<Patch> {
    match key.split_once('@') {
        Some((path, attr)) => Some(Patch::UpdatePropsTemplate {
            path: path.parse().ok()?,
            attr_name: attr.to_string(),
            template_patch,
        }),
        None => Some(Patch::UpdateTextTemplate {
            path: key.parse().ok()?,
            template_patch,
        }),
    }
}

/// Sum of [`Patch::estimated_bytes`] over a list.
#[must_use]
pub fn estimated_bytes(patches: &[Patch]) -> usize {
    patches.iter().map(Patch::estimated_bytes).sum()
}

/// Count patches per variant name, for logging.
#[must_use]
pub fn variant_histogram(patches: &[Patch]) -> BTreeMap<&'static str, usize> {
    let mut hist = BTreeMap::new();
    for patch in patches {
        *hist.entry(patch.variant_name()).or_insert(0) += 1;
    }
    hist
}
