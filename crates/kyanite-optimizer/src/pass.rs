//! Rewrite pass trait.

use kyanite_core::{ExprNode, ExprTree, NodeId};

/// A single node-rewrite pass.
///
/// The driver offers every node to each pass during its bottom-up walk.
/// A pass returns `Some(replacement)` when the node matches its pattern and
/// `None` otherwise; `None` is the expected non-applicable outcome, never
/// an error. By the time a node is offered, all of its operand children are
/// final (already offered, possibly rewritten).
///
/// A replacement must keep the node's operand children and declared result
/// type; it only changes how the node executes.
pub trait OptPass: Send + Sync {
    /// Get the pass name (used for logging).
    fn name(&self) -> &str;

    /// Attempt to rewrite one node.
    fn try_rewrite(&self, tree: &ExprTree, id: NodeId) -> Option<ExprNode>;
}
