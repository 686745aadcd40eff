//! In-place dense join rewrite.
//!
//! Recognizes elementwise joins of two identically shaped dense operands
//! where at least one operand buffer may legally be overwritten with the
//! result: the operand is mutable (the invocation owns its buffer
//! exclusively) and its cell type equals the join's promoted result cell
//! type exactly, so no widening or narrowing happens through the reused
//! buffer. The rewritten node returns the overwritten buffer as a mutable
//! result, which lets chained joins keep reusing one buffer up the tree.

use crate::pass::OptPass;

use kyanite_core::{ExprNode, ExprTree, NodeId, Side};

/// Pass rewriting eligible joins to overwrite one operand buffer.
pub struct InplaceJoinPass;

impl InplaceJoinPass {
    /// Create a new in-place join pass.
    pub fn new() -> Self {
        Self
    }
}

impl Default for InplaceJoinPass {
    fn default() -> Self {
        Self::new()
    }
}

impl OptPass for InplaceJoinPass {
    fn name(&self) -> &str {
        "dense_inplace_join"
    }

    fn try_rewrite(&self, tree: &ExprTree, id: NodeId) -> Option<ExprNode> {
        let ExprNode::Join { lhs, rhs, op, ty } = tree.node(id) else {
            return None;
        };
        let lhs_ty = tree.result_type(*lhs);
        let rhs_ty = tree.result_type(*rhs);

        // Dense non-scalar operands with identical dimension lists only:
        // broadcasting reuse is out, the buffer written must have exactly
        // the result's element count.
        if !lhs_ty.is_dense() || !rhs_ty.is_dense() {
            return None;
        }
        if lhs_ty.dimensions() != rhs_ty.dimensions() {
            return None;
        }

        let eligible = |operand: NodeId| {
            tree.result_is_mutable(operand)
                && tree.result_type(operand).cell_type() == ty.cell_type()
        };
        // Left-hand operand wins when both qualify.
        let target = if eligible(*lhs) {
            Side::Lhs
        } else if eligible(*rhs) {
            Side::Rhs
        } else {
            return None;
        };

        Some(ExprNode::InplaceJoin {
            lhs: *lhs,
            rhs: *rhs,
            op: *op,
            ty: ty.clone(),
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyanite_core::{BinaryOp, CellType, Dimension, ValueType};

    fn x5(cell_type: CellType) -> ValueType {
        ValueType::tensor(cell_type, vec![Dimension::dense("x", 5)]).unwrap()
    }

    fn rewrite_target(lhs_mutable: bool, rhs_mutable: bool) -> Option<Side> {
        let mut tree = ExprTree::new();
        let a = tree.param(0, x5(CellType::F64), lhs_mutable);
        let b = tree.param(1, x5(CellType::F64), rhs_mutable);
        let join = tree.join(a, b, BinaryOp::Sub).unwrap();

        let node = InplaceJoinPass::new().try_rewrite(&tree, join)?;
        match node {
            ExprNode::InplaceJoin { target, .. } => Some(target),
            _ => panic!("unexpected rewrite: {node:?}"),
        }
    }

    #[test]
    fn test_mutable_operands_claimed() {
        assert_eq!(rewrite_target(true, false), Some(Side::Lhs));
        assert_eq!(rewrite_target(false, true), Some(Side::Rhs));
        assert_eq!(rewrite_target(false, false), None);
    }

    #[test]
    fn test_lhs_preferred_when_both_mutable() {
        assert_eq!(rewrite_target(true, true), Some(Side::Lhs));
    }

    #[test]
    fn test_self_join_claimed() {
        let mut tree = ExprTree::new();
        let a = tree.param(0, x5(CellType::F64), true);
        let join = tree.join(a, a, BinaryOp::Add).unwrap();

        let node = InplaceJoinPass::new().try_rewrite(&tree, join).unwrap();
        assert!(matches!(
            node,
            ExprNode::InplaceJoin {
                target: Side::Lhs,
                ..
            }
        ));
    }

    #[test]
    fn test_scalars_not_claimed() {
        let mut tree = ExprTree::new();
        let a = tree.param(0, ValueType::scalar(), true);
        let b = tree.param(1, ValueType::scalar(), true);
        let join = tree.join(a, b, BinaryOp::Add).unwrap();
        assert!(InplaceJoinPass::new().try_rewrite(&tree, join).is_none());

        let mut tree = ExprTree::new();
        let a = tree.param(0, x5(CellType::F64), true);
        let b = tree.param(1, ValueType::scalar(), true);
        let join = tree.join(a, b, BinaryOp::Add).unwrap();
        assert!(InplaceJoinPass::new().try_rewrite(&tree, join).is_none());
    }

    #[test]
    fn test_broadcast_shapes_not_claimed() {
        let mut tree = ExprTree::new();
        let x5y3 = ValueType::tensor(
            CellType::F64,
            vec![Dimension::dense("x", 5), Dimension::dense("y", 3)],
        )
        .unwrap();
        let a = tree.param(0, x5(CellType::F64), true);
        let b = tree.param(1, x5y3, true);
        let join = tree.join(a, b, BinaryOp::Mul).unwrap();
        assert!(InplaceJoinPass::new().try_rewrite(&tree, join).is_none());
    }

    #[test]
    fn test_mapped_operands_not_claimed() {
        let mut tree = ExprTree::new();
        let sparse = ValueType::tensor(CellType::F64, vec![Dimension::mapped("x")]).unwrap();
        let a = tree.param(0, sparse.clone(), true);
        let b = tree.param(1, sparse, true);
        let join = tree.join(a, b, BinaryOp::Add).unwrap();
        assert!(InplaceJoinPass::new().try_rewrite(&tree, join).is_none());
    }

    #[test]
    fn test_cell_type_must_match_result() {
        // double - float promotes to double: only the double side may be
        // overwritten.
        let mut tree = ExprTree::new();
        let a = tree.param(0, x5(CellType::F64), true);
        let d = tree.param(1, x5(CellType::F32), true);
        let join = tree.join(a, d, BinaryOp::Sub).unwrap();
        let node = InplaceJoinPass::new().try_rewrite(&tree, join).unwrap();
        assert!(matches!(
            node,
            ExprNode::InplaceJoin {
                target: Side::Lhs,
                ..
            }
        ));

        let mut tree = ExprTree::new();
        let d = tree.param(0, x5(CellType::F32), true);
        let a = tree.param(1, x5(CellType::F64), true);
        let join = tree.join(d, a, BinaryOp::Sub).unwrap();
        let node = InplaceJoinPass::new().try_rewrite(&tree, join).unwrap();
        assert!(matches!(
            node,
            ExprNode::InplaceJoin {
                target: Side::Rhs,
                ..
            }
        ));

        // Sole mutable candidate has the wrong cell type: not claimed.
        let mut tree = ExprTree::new();
        let a = tree.param(0, x5(CellType::F64), false);
        let d = tree.param(1, x5(CellType::F32), true);
        let join = tree.join(a, d, BinaryOp::Sub).unwrap();
        assert!(InplaceJoinPass::new().try_rewrite(&tree, join).is_none());
    }

    #[test]
    fn test_float_cells_claimed() {
        let mut tree = ExprTree::new();
        let d = tree.param(0, x5(CellType::F32), true);
        let e = tree.param(1, x5(CellType::F32), true);
        let join = tree.join(d, e, BinaryOp::Sub).unwrap();
        let node = InplaceJoinPass::new().try_rewrite(&tree, join).unwrap();
        assert!(matches!(
            node,
            ExprNode::InplaceJoin {
                target: Side::Lhs,
                ..
            }
        ));
    }
}
