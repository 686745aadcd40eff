#![allow(dead_code)] // not every test binary uses every helper

//! Shared evaluation fixture for optimizer/runtime integration tests.
//!
//! Mirrors the production flow: build a tree, optimize a clone of it with
//! the default passes, compile both, execute both against fresh copies of
//! the same parameter values, and compare. The pass-free optimizer is the
//! reference configuration every specialized path must match exactly.

use kyanite_core::{
    CellBuffer, CellType, Dimension, ExprNode, ExprTree, Value, ValueType,
};
use kyanite_optimizer::Optimizer;
use kyanite_runtime::{compile, ParamStore};

/// Deterministic cell sequence owned by one test.
///
/// An explicit seeded counter (not process-wide state): cell values are
/// seed+1, seed+2, ... so expected results stay easy to reason about.
pub struct SeqGen {
    next: f64,
}

impl SeqGen {
    pub fn new(seed: f64) -> Self {
        Self { next: seed }
    }

    pub fn next_cell(&mut self) -> f64 {
        self.next += 1.0;
        self.next
    }
}

/// Build a dense value type; dimensions are given as (name, size).
pub fn dense_type(cell_type: CellType, dims: &[(&str, usize)]) -> ValueType {
    ValueType::tensor(
        cell_type,
        dims.iter().map(|(n, s)| Dimension::dense(n, *s)).collect(),
    )
    .expect("valid dense type")
}

/// Fill a dense value of the given type from a sequence.
pub fn seq_value(gen: &mut SeqGen, ty: &ValueType) -> Value {
    let mut cells = CellBuffer::zeros(ty.cell_type(), ty.dense_count());
    for i in 0..ty.dense_count() {
        cells.set(i, gen.next_cell());
    }
    Value::new(ty.clone(), cells)
}

/// Build a double-cell vector value with explicit cells.
pub fn vector(name: &str, cells: Vec<f64>) -> Value {
    let ty = dense_type(CellType::F64, &[(name, cells.len())]);
    Value::new(ty, CellBuffer::F64(cells))
}

/// Result of one evaluation: the final value plus the parameter buffers
/// as they stand after execution.
pub struct EvalOutcome {
    pub result: Value,
    pub params: Vec<Value>,
}

/// Optimize a clone of the tree with the default passes.
pub fn optimized(tree: &ExprTree) -> ExprTree {
    let mut tree = tree.clone();
    Optimizer::with_default_passes().optimize(&mut tree);
    tree
}

/// Compile and execute a tree against fresh copies of the given params.
pub fn evaluate(tree: &ExprTree, params: &[Value]) -> EvalOutcome {
    let plan = compile(tree).expect("tree compiles");
    let mut store = ParamStore::new(params.to_vec());
    let result = plan.execute(&mut store).expect("plan executes").into_owned();
    EvalOutcome {
        result,
        params: store.into_values(),
    }
}

/// Evaluate optimized and reference configurations; their results must be
/// exactly equal. Returns the optimized outcome for further inspection.
pub fn assert_equivalent(tree: &ExprTree, params: &[Value]) -> EvalOutcome {
    let reference = evaluate(tree, params);
    let outcome = evaluate(&optimized(tree), params);
    assert_eq!(
        outcome.result, reference.result,
        "optimized result diverges from the reference evaluation"
    );
    outcome
}

/// Assert which parameter buffer, if any, holds the result after
/// execution. Every other parameter must not.
pub fn assert_reused_param(outcome: &EvalOutcome, reused: Option<usize>) {
    for (i, value) in outcome.params.iter().enumerate() {
        if Some(i) == reused {
            assert_eq!(
                value, &outcome.result,
                "parameter {i} should have been overwritten with the result"
            );
        } else {
            assert_ne!(
                value, &outcome.result,
                "parameter {i} must not hold the result"
            );
        }
    }
}

/// Count in-place join nodes after optimization.
pub fn count_inplace_joins(tree: &ExprTree) -> usize {
    tree.find_all(|node| matches!(node, ExprNode::InplaceJoin { .. }))
        .len()
}

/// Count allocating dense join nodes after optimization.
pub fn count_dense_joins(tree: &ExprTree) -> usize {
    tree.find_all(|node| matches!(node, ExprNode::DenseJoin { .. }))
        .len()
}

/// Count dense peek nodes after optimization.
pub fn count_dense_peeks(tree: &ExprTree) -> usize {
    tree.find_all(|node| matches!(node, ExprNode::DensePeek { .. }))
        .len()
}
