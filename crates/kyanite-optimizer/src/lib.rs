//! Rewrite passes for Kyanite expression trees.
//!
//! The optimizer walks a finalized expression tree bottom-up and offers
//! every node to an ordered list of rewrite passes; the first pass whose
//! pattern matches replaces the node in place with a specialized variant.
//! A node no pass matches passes through unchanged, which is the normal
//! outcome, never an error.
//!
//! Built-in passes, in offer order:
//! 1. [`InplaceJoinPass`] - same-shape dense joins overwriting an operand
//!    buffer (must run before the allocating rewrite so it claims
//!    full-overlap joins first)
//! 2. [`SimpleJoinPass`] - broadcast-compatible dense joins into a fresh
//!    buffer
//! 3. [`DensePeekPass`] - dense single-cell extraction via a precomputed
//!    stride walk
//!
//! # Example
//!
//! ```
//! use kyanite_core::{BinaryOp, CellType, Dimension, ExprTree, ValueType};
//! use kyanite_optimizer::Optimizer;
//!
//! let ty = ValueType::tensor(CellType::F64, vec![Dimension::dense("x", 5)]).unwrap();
//! let mut tree = ExprTree::new();
//! let a = tree.param(0, ty.clone(), true);
//! let b = tree.param(1, ty, false);
//! tree.join(a, b, BinaryOp::Add).unwrap();
//!
//! let rewrites = Optimizer::with_default_passes().optimize(&mut tree);
//! assert_eq!(rewrites, 1);
//! ```

pub mod inplace_join;
pub mod pass;
pub mod peek;
pub mod simple_join;

pub use inplace_join::InplaceJoinPass;
pub use pass::OptPass;
pub use peek::DensePeekPass;
pub use simple_join::SimpleJoinPass;

use kyanite_core::{ExprTree, NodeId};

/// Bottom-up rewrite driver with a configurable pass list.
pub struct Optimizer {
    /// Passes in offer order; the first applicable rewrite wins.
    passes: Vec<Box<dyn OptPass>>,
}

impl Optimizer {
    /// Create an optimizer with no passes.
    ///
    /// Optimizing with it leaves every tree unchanged; tests use this as
    /// the reference (non-optimized) configuration.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Create an optimizer with the built-in passes in their fixed order.
    pub fn with_default_passes() -> Self {
        let mut optimizer = Self::new();
        optimizer
            .add_pass(InplaceJoinPass::new())
            .add_pass(SimpleJoinPass::new())
            .add_pass(DensePeekPass::new());
        optimizer
    }

    /// Append a pass to the offer order.
    pub fn add_pass(&mut self, pass: impl OptPass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Rewrite every applicable node of the tree in place.
    ///
    /// Nodes are offered in arena order, which visits children before
    /// parents (the arena is append-only), so each rewrite sees its
    /// operands in final form. Returns the number of nodes rewritten.
    #[tracing::instrument(skip_all, fields(nodes = tree.len()))]
    pub fn optimize(&self, tree: &mut ExprTree) -> usize {
        let mut rewrites = 0;
        for index in 0..tree.len() {
            let id = NodeId::new(index);
            for pass in &self.passes {
                if let Some(replacement) = pass.try_rewrite(tree, id) {
                    tracing::debug!(pass = pass.name(), node = index, "rewrote node");
                    tree.replace(id, replacement);
                    rewrites += 1;
                    break;
                }
            }
        }
        rewrites
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
