#![forbid(unsafe_code)]

//! Render surfaces: where concrete patches land on the client.

use presage_core::{ApplyError, Patch, UiNode, apply_patch};

/// A local rendering target that accepts concrete patches.
///
/// `apply` must touch only the node the patch addresses. `tree` reflects
/// everything applied so far.
pub trait RenderSurface {
    /// Apply one concrete patch.
    fn apply(&mut self, patch: &Patch) -> Result<(), ApplyError>;

    /// The tree as currently rendered.
    fn tree(&self) -> &UiNode;

    /// Throw away the current content and show `tree`.
    fn reset(&mut self, tree: UiNode);

    /// Apply patches in order, stopping at the first failure.
    fn apply_all(&mut self, patches: &[Patch]) -> Result<(), ApplyError> {
        for patch in patches {
            self.apply(patch)?;
        }
        Ok(())
    }
}

/// A surface backed by an in-memory [`UiNode`] tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSurface {
    tree: UiNode,
    applied: u64,
}

impl TreeSurface {
    #[must_use]
    pub fn new(tree: UiNode) -> Self {
        Self { tree, applied: 0 }
    }

    /// Patches applied since creation.
    #[inline]
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.applied
    }

    #[must_use]
    pub fn into_tree(self) -> UiNode {
        self.tree
    }
}

impl RenderSurface for TreeSurface {
    fn apply(&mut self, patch: &Patch) -> Result<(), ApplyError> {
        apply_patch(&mut self.tree, patch)?;
        self.applied += 1;
        Ok(())
    }

    fn tree(&self) -> &UiNode {
        &self.tree
    }

    fn reset(&mut self, tree: UiNode) {
        self.tree = tree;
    }
}
