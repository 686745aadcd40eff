//! End-to-end tests for simple dense join optimization.
//!
//! Checks which joins get the specialized linear-iteration node, the
//! primary/overlap/factor classification it carries, and exact agreement
//! with the reference evaluation.

mod common;

use common::{
    assert_equivalent, assert_reused_param, count_dense_joins, count_inplace_joins, dense_type,
    optimized, seq_value, SeqGen,
};
use kyanite_core::{
    BinaryOp, CellType, Dimension, ExprNode, ExprTree, Overlap, Primary, Value, ValueType,
};

/// Build `lhs op rhs`, check equivalence, and return the specialized
/// join's (primary, overlap, factor, primary_is_mutable), if any.
fn verify_join(
    lhs: (ValueType, bool),
    rhs: (ValueType, bool),
    op: BinaryOp,
) -> Option<(Primary, Overlap, usize, bool)> {
    let mut tree = ExprTree::new();
    let a = tree.param(0, lhs.0.clone(), lhs.1);
    let b = tree.param(1, rhs.0.clone(), rhs.1);
    tree.join(a, b, op).unwrap();

    let mut gen = SeqGen::new(0.0);
    let params = vec![seq_value(&mut gen, &lhs.0), seq_value(&mut gen, &rhs.0)];
    assert_equivalent(&tree, &params);

    let opt = optimized(&tree);
    let joins = opt.find_all(|node| matches!(node, ExprNode::DenseJoin { .. }));
    match joins.as_slice() {
        [] => None,
        [id] => match opt.node(*id) {
            ExprNode::DenseJoin {
                layout,
                primary_is_mutable,
                ..
            } => Some((
                layout.primary,
                layout.overlap,
                layout.factor,
                *primary_is_mutable,
            )),
            _ => unreachable!(),
        },
        _ => panic!("expected at most one dense join"),
    }
}

#[test]
fn test_basic_join_is_optimized() {
    let info = verify_join(
        (dense_type(CellType::F64, &[("x", 5)]), false),
        (dense_type(CellType::F64, &[("x", 5)]), false),
        BinaryOp::Add,
    );
    assert_eq!(info, Some((Primary::Lhs, Overlap::Full, 1, false)));
}

#[test]
fn test_inner_broadcast_is_optimized() {
    // x5y3 * y3: the vector is the fastest-varying block of the tensor.
    let info = verify_join(
        (dense_type(CellType::F64, &[("x", 5), ("y", 3)]), true),
        (dense_type(CellType::F64, &[("y", 3)]), false),
        BinaryOp::Mul,
    );
    assert_eq!(info, Some((Primary::Lhs, Overlap::Inner, 5, true)));

    let info = verify_join(
        (dense_type(CellType::F64, &[("y", 3)]), false),
        (dense_type(CellType::F64, &[("x", 5), ("y", 3)]), false),
        BinaryOp::Add,
    );
    assert_eq!(info, Some((Primary::Rhs, Overlap::Inner, 5, false)));
}

#[test]
fn test_outer_broadcast_is_optimized() {
    // The larger operand drives iteration; the 5-vector broadcasts across
    // y with factor 3.
    let info = verify_join(
        (dense_type(CellType::F64, &[("x", 5), ("y", 3)]), true),
        (dense_type(CellType::F64, &[("x", 5)]), true),
        BinaryOp::Mul,
    );
    assert_eq!(info, Some((Primary::Lhs, Overlap::Outer, 3, true)));

    let info = verify_join(
        (dense_type(CellType::F64, &[("x", 5)]), true),
        (dense_type(CellType::F64, &[("x", 5), ("y", 3)]), true),
        BinaryOp::Mul,
    );
    assert_eq!(info, Some((Primary::Rhs, Overlap::Outer, 3, true)));
}

#[test]
fn test_complex_overlap_is_not_optimized() {
    let info = verify_join(
        (dense_type(CellType::F64, &[("x", 5), ("y", 3)]), false),
        (dense_type(CellType::F64, &[("y", 3), ("z", 2)]), false),
        BinaryOp::Add,
    );
    assert_eq!(info, None);
}

#[test]
fn test_complex_join_still_evaluates_generically() {
    // x2 + y3: disjoint dimensions produce the full x2y3 product grid.
    let mut tree = ExprTree::new();
    let a = tree.param(0, dense_type(CellType::F64, &[("x", 2)]), false);
    let b = tree.param(1, dense_type(CellType::F64, &[("y", 3)]), false);
    tree.join(a, b, BinaryOp::Add).unwrap();

    let params = vec![
        common::vector("x", vec![10.0, 20.0]),
        common::vector("y", vec![1.0, 2.0, 3.0]),
    ];
    let outcome = assert_equivalent(&tree, &params);

    let expected = Value::new(
        dense_type(CellType::F64, &[("x", 2), ("y", 3)]),
        kyanite_core::CellBuffer::F64(vec![11.0, 12.0, 13.0, 21.0, 22.0, 23.0]),
    );
    assert_eq!(outcome.result, expected);
}

#[test]
fn test_scalar_operands_are_not_optimized() {
    let x5 = dense_type(CellType::F64, &[("x", 5)]);
    assert_eq!(
        verify_join((ValueType::scalar(), true), (ValueType::scalar(), true), BinaryOp::Add),
        None
    );
    assert_eq!(
        verify_join((ValueType::scalar(), false), (x5.clone(), false), BinaryOp::Add),
        None
    );
    assert_eq!(
        verify_join((x5, false), (ValueType::scalar(), false), BinaryOp::Add),
        None
    );
}

#[test]
fn test_mapped_operands_are_not_optimized() {
    // Structural check only: mapped values live in an external engine.
    let sparse = ValueType::tensor(CellType::F64, vec![Dimension::mapped("s")]).unwrap();
    let mixed = ValueType::tensor(
        CellType::F64,
        vec![Dimension::dense("x", 5), Dimension::mapped("s")],
    )
    .unwrap();
    let x5 = dense_type(CellType::F64, &[("x", 5)]);

    for (lhs, rhs) in [
        (sparse.clone(), sparse.clone()),
        (sparse.clone(), x5.clone()),
        (x5.clone(), sparse.clone()),
        (mixed.clone(), mixed.clone()),
        (mixed.clone(), x5.clone()),
        (x5, mixed),
    ] {
        let mut tree = ExprTree::new();
        let a = tree.param(0, lhs, true);
        let b = tree.param(1, rhs, true);
        tree.join(a, b, BinaryOp::Add).unwrap();

        let opt = optimized(&tree);
        assert_eq!(count_dense_joins(&opt), 0);
        assert_eq!(count_inplace_joins(&opt), 0);
    }
}

#[test]
fn test_mixed_cell_types_promote_to_double() {
    // float primary, double secondary: result cells are double.
    let info = verify_join(
        (dense_type(CellType::F32, &[("x", 5), ("y", 3)]), false),
        (dense_type(CellType::F64, &[("y", 3)]), false),
        BinaryOp::Add,
    );
    assert_eq!(info, Some((Primary::Lhs, Overlap::Inner, 5, false)));

    // Both float: the specialized node keeps float cells.
    let mut tree = ExprTree::new();
    let ty = dense_type(CellType::F32, &[("x", 5)]);
    let a = tree.param(0, ty.clone(), false);
    let b = tree.param(1, ty.clone(), false);
    let join = tree.join(a, b, BinaryOp::Add).unwrap();
    assert_eq!(tree.result_type(join).cell_type(), CellType::F32);

    let mut gen = SeqGen::new(0.0);
    let params = vec![seq_value(&mut gen, &ty), seq_value(&mut gen, &ty)];
    let outcome = assert_equivalent(&tree, &params);
    assert_eq!(outcome.result.ty().cell_type(), CellType::F32);
}

#[test]
fn test_simple_join_allocates_even_with_mutable_primary() {
    // A broadcast join never reuses a buffer, mutable primary or not.
    let x5y3 = dense_type(CellType::F64, &[("x", 5), ("y", 3)]);
    let x5 = dense_type(CellType::F64, &[("x", 5)]);
    let mut tree = ExprTree::new();
    let a = tree.param(0, x5y3.clone(), true);
    let b = tree.param(1, x5.clone(), true);
    tree.join(a, b, BinaryOp::Add).unwrap();

    let mut gen = SeqGen::new(0.0);
    let params = vec![seq_value(&mut gen, &x5y3), seq_value(&mut gen, &x5)];
    let outcome = assert_equivalent(&tree, &params);
    assert_reused_param(&outcome, None);
}
