//! Simple dense join rewrite.
//!
//! Recognizes elementwise joins of two dense operands whose dimension
//! lists fully, inner-, or outer-overlap, and rewrites them to a
//! specialized node that iterates the primary buffer linearly and follows
//! along in the secondary with a precomputed index rule. The rewritten
//! node always writes a freshly allocated result buffer; joins whose
//! buffer can be reclaimed are claimed by the in-place pass first.

use crate::pass::OptPass;

use kyanite_core::{classify_dense_join, ExprNode, ExprTree, NodeId, Overlap, Primary};

/// Pass rewriting broadcast-compatible dense joins to linear iteration.
pub struct SimpleJoinPass;

impl SimpleJoinPass {
    /// Create a new simple join pass.
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimpleJoinPass {
    fn default() -> Self {
        Self::new()
    }
}

impl OptPass for SimpleJoinPass {
    fn name(&self) -> &str {
        "dense_simple_join"
    }

    fn try_rewrite(&self, tree: &ExprTree, id: NodeId) -> Option<ExprNode> {
        let ExprNode::Join { lhs, rhs, op, ty } = tree.node(id) else {
            return None;
        };
        let lhs_ty = tree.result_type(*lhs);
        let rhs_ty = tree.result_type(*rhs);

        // Dense non-scalar operands and a dense non-scalar result only.
        if !ty.is_dense() || !lhs_ty.is_dense() || !rhs_ty.is_dense() {
            return None;
        }

        let layout = classify_dense_join(lhs_ty, rhs_ty);
        if layout.overlap == Overlap::Complex {
            return None;
        }

        let primary_is_mutable = match layout.primary {
            Primary::Lhs => tree.result_is_mutable(*lhs),
            Primary::Rhs => tree.result_is_mutable(*rhs),
        };

        Some(ExprNode::DenseJoin {
            lhs: *lhs,
            rhs: *rhs,
            op: *op,
            ty: ty.clone(),
            layout,
            primary_is_mutable,
        })
    }
}
