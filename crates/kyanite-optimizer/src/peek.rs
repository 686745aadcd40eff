//! Dense peek rewrite.
//!
//! Recognizes single-cell extraction over a fully dense operand and
//! rewrites it to a precomputed stride walk: one (fixed index | dynamic
//! marker, dimension size) pair per dimension, ordered fastest-varying
//! first, so the flat offset accumulates in a single pass at execution.

use crate::pass::OptPass;

use kyanite_core::{peek_dims, ExprNode, ExprTree, NodeId};

/// Pass rewriting dense peeks to flat-offset accumulation.
pub struct DensePeekPass;

impl DensePeekPass {
    /// Create a new dense peek pass.
    pub fn new() -> Self {
        Self
    }
}

impl Default for DensePeekPass {
    fn default() -> Self {
        Self::new()
    }
}

impl OptPass for DensePeekPass {
    fn name(&self) -> &str {
        "dense_peek"
    }

    fn try_rewrite(&self, tree: &ExprTree, id: NodeId) -> Option<ExprNode> {
        let ExprNode::Peek {
            tensor,
            indexes,
            ty,
        } = tree.node(id)
        else {
            return None;
        };
        let operand = tree.result_type(*tensor);
        if !ty.is_scalar() || !operand.is_dense() {
            return None;
        }

        Some(ExprNode::DensePeek {
            tensor: *tensor,
            indexes: indexes.clone(),
            dims: peek_dims(operand, indexes),
            ty: ty.clone(),
        })
    }
}
