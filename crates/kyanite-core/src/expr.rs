//! Arena-owned expression tree.
//!
//! Nodes are immutable once built and live in an append-only arena, so a
//! child's `NodeId` is always smaller than its parent's. Optimizer passes
//! replace a node in place (same id, same operand children) with a
//! specialized variant; the node kinds form a closed enum so every pass and
//! the instruction compiler match exhaustively.

use crate::ops::BinaryOp;
use crate::overlap::JoinLayout;
use crate::types::{DimensionSize, ValueType};
use crate::value::Value;
use crate::{Error, Result};

/// Identifier of a node in an [`ExprTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Create a new node ID.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Which operand of a join a rewrite targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

/// One per-dimension index of a single-cell extraction, in declared
/// dimension order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeekIndex {
    /// Compile-time-known index into the dimension.
    Fixed(usize),

    /// Runtime expression producing the index, rounded to the nearest
    /// integer during execution.
    Expr(NodeId),
}

/// Whether one peek dimension's index is fixed or popped at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeekStep {
    Fixed(usize),
    Dynamic,
}

/// One dimension of a compiled peek walk, fastest-varying first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeekDim {
    pub step: PeekStep,
    pub size: usize,
}

/// Build the stride walk of a peek, ordered fastest-varying first.
///
/// Reversing the declared (slowest-first) dimension order lets the walk
/// accumulate `offset += index * stride; stride *= size` without knowing
/// later sizes up front. Shared by the peek optimizer and the generic peek
/// compilation, so both agree on the walk.
///
/// All dimensions of `operand` must be dense.
pub fn peek_dims(operand: &ValueType, indexes: &[PeekIndex]) -> Vec<PeekDim> {
    assert_eq!(
        operand.dimensions().len(),
        indexes.len(),
        "peek of {} needs {} indexes, got {}",
        operand,
        operand.dimensions().len(),
        indexes.len()
    );
    operand
        .dimensions()
        .iter()
        .zip(indexes)
        .rev()
        .map(|(dim, index)| {
            let size = dim
                .dense_size()
                .expect("peek stride walk over mapped dimension");
            let step = match index {
                PeekIndex::Fixed(i) => PeekStep::Fixed(*i),
                PeekIndex::Expr(_) => PeekStep::Dynamic,
            };
            PeekDim { step, size }
        })
        .collect()
}

/// A node in the expression tree.
///
/// `Param`, `Const`, `Join` and `Peek` are the generic kinds the tree is
/// built from; the `Dense*`/`Inplace*` kinds only appear as optimizer
/// rewrites of the generic ones.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    /// Runtime-provided operand.
    ///
    /// `mutable` is the evaluation context's ownership contract: the
    /// invocation holds the only reference to this operand's buffer and an
    /// optimized plan may overwrite it in place.
    Param {
        index: usize,
        ty: ValueType,
        mutable: bool,
    },

    /// Literal value owned by the plan; shared and never mutable.
    Const { value: Value },

    /// Generic elementwise join of two operands.
    Join {
        lhs: NodeId,
        rhs: NodeId,
        op: BinaryOp,
        ty: ValueType,
    },

    /// Generic single-cell extraction over a tensor operand.
    Peek {
        tensor: NodeId,
        indexes: Vec<PeekIndex>,
        ty: ValueType,
    },

    /// Specialized dense join writing a freshly allocated result buffer.
    DenseJoin {
        lhs: NodeId,
        rhs: NodeId,
        op: BinaryOp,
        ty: ValueType,
        layout: JoinLayout,
        /// Whether the primary operand's result is mutable (introspection
        /// metadata; this node always allocates).
        primary_is_mutable: bool,
    },

    /// Specialized dense join overwriting one operand's buffer in place.
    InplaceJoin {
        lhs: NodeId,
        rhs: NodeId,
        op: BinaryOp,
        ty: ValueType,
        /// The operand whose buffer is overwritten and returned.
        target: Side,
    },

    /// Specialized dense peek with a precomputed stride walk.
    DensePeek {
        tensor: NodeId,
        indexes: Vec<PeekIndex>,
        /// Stride walk, fastest-varying dimension first.
        dims: Vec<PeekDim>,
        ty: ValueType,
    },
}

impl ExprNode {
    /// Declared result type of this node.
    pub fn result_type(&self) -> &ValueType {
        match self {
            ExprNode::Param { ty, .. }
            | ExprNode::Join { ty, .. }
            | ExprNode::Peek { ty, .. }
            | ExprNode::DenseJoin { ty, .. }
            | ExprNode::InplaceJoin { ty, .. }
            | ExprNode::DensePeek { ty, .. } => ty,
            ExprNode::Const { value } => value.ty(),
        }
    }

    /// Whether this node's result buffer may be overwritten by a parent.
    ///
    /// Params report their declared mutability; constants are shared;
    /// every computing node produces (or reclaims) an exclusively owned
    /// buffer.
    pub fn result_is_mutable(&self) -> bool {
        match self {
            ExprNode::Param { mutable, .. } => *mutable,
            ExprNode::Const { .. } => false,
            ExprNode::Join { .. }
            | ExprNode::Peek { .. }
            | ExprNode::DenseJoin { .. }
            | ExprNode::InplaceJoin { .. }
            | ExprNode::DensePeek { .. } => true,
        }
    }

    /// Ordered operand children.
    ///
    /// For peeks: the tensor operand first, then the dynamic index
    /// expressions in declared dimension order. Instruction compilation
    /// pushes operands in exactly this order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            ExprNode::Param { .. } | ExprNode::Const { .. } => Vec::new(),
            ExprNode::Join { lhs, rhs, .. }
            | ExprNode::DenseJoin { lhs, rhs, .. }
            | ExprNode::InplaceJoin { lhs, rhs, .. } => vec![*lhs, *rhs],
            ExprNode::Peek {
                tensor, indexes, ..
            }
            | ExprNode::DensePeek {
                tensor, indexes, ..
            } => std::iter::once(*tensor)
                .chain(indexes.iter().filter_map(|index| match index {
                    PeekIndex::Expr(id) => Some(*id),
                    PeekIndex::Fixed(_) => None,
                }))
                .collect(),
        }
    }
}

/// Append-only arena of expression nodes.
///
/// The last node added is the root. Built once, optimized in place, then
/// shared read-only for the life of the compiled plan.
#[derive(Debug, Clone, Default)]
pub struct ExprTree {
    nodes: Vec<ExprNode>,
}

impl ExprTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root node: the last one added.
    ///
    /// # Panics
    ///
    /// Panics on an empty tree.
    pub fn root(&self) -> NodeId {
        assert!(!self.nodes.is_empty(), "empty expression tree has no root");
        NodeId::new(self.nodes.len() - 1)
    }

    /// Get a node.
    ///
    /// # Panics
    ///
    /// Panics if the id is out of range (ids are only minted by this tree).
    pub fn node(&self, id: NodeId) -> &ExprNode {
        &self.nodes[id.index()]
    }

    /// Declared result type of a node.
    pub fn result_type(&self, id: NodeId) -> &ValueType {
        self.node(id).result_type()
    }

    /// Whether a node's result buffer may be overwritten by its parent.
    pub fn result_is_mutable(&self, id: NodeId) -> bool {
        self.node(id).result_is_mutable()
    }

    /// Ordered operand children of a node.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children()
    }

    /// Replace a node in place with a rewritten variant.
    ///
    /// The replacement must keep the same operand children and result type;
    /// parents referencing the id are unaffected.
    pub fn replace(&mut self, id: NodeId, node: ExprNode) {
        debug_assert_eq!(self.nodes[id.index()].result_type(), node.result_type());
        debug_assert_eq!(self.nodes[id.index()].children(), node.children());
        self.nodes[id.index()] = node;
    }

    /// Ids of all nodes matching a predicate, in arena order.
    pub fn find_all(&self, mut predicate: impl FnMut(&ExprNode) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| predicate(node))
            .map(|(index, _)| NodeId::new(index))
            .collect()
    }

    // ── Builders ──

    fn push(&mut self, node: ExprNode) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Add a parameter leaf.
    pub fn param(&mut self, index: usize, ty: ValueType, mutable: bool) -> NodeId {
        self.push(ExprNode::Param { index, ty, mutable })
    }

    /// Add a constant leaf.
    pub fn constant(&mut self, value: Value) -> NodeId {
        self.push(ExprNode::Const { value })
    }

    /// Add a generic elementwise join of two existing nodes.
    ///
    /// The result type is computed with [`ValueType::join`].
    ///
    /// # Errors
    ///
    /// Returns an error if the operand types share a dimension name with
    /// conflicting sizes.
    pub fn join(&mut self, lhs: NodeId, rhs: NodeId, op: BinaryOp) -> Result<NodeId> {
        let ty = ValueType::join(self.result_type(lhs), self.result_type(rhs))?;
        Ok(self.push(ExprNode::Join { lhs, rhs, op, ty }))
    }

    /// Add a generic single-cell extraction over an existing node.
    ///
    /// `indexes` lists one entry per dimension of the operand's type, in
    /// declared dimension order. The result is scalar.
    ///
    /// # Errors
    ///
    /// Returns an error if the index count does not match the operand's
    /// rank, a fixed index is out of range for its dense dimension, or a
    /// dynamic index expression is not scalar-typed.
    pub fn peek(&mut self, tensor: NodeId, indexes: Vec<PeekIndex>) -> Result<NodeId> {
        let operand = self.result_type(tensor).clone();
        if operand.is_scalar() {
            return Err(Error::InvalidNode(
                "cannot peek a scalar operand".to_string(),
            ));
        }
        if indexes.len() != operand.dimensions().len() {
            return Err(Error::InvalidNode(format!(
                "peek of {} needs {} indexes, got {}",
                operand,
                operand.dimensions().len(),
                indexes.len()
            )));
        }
        for (dim, index) in operand.dimensions().iter().zip(&indexes) {
            match index {
                PeekIndex::Fixed(i) => {
                    if let DimensionSize::Dense(size) = dim.size {
                        if *i >= size {
                            return Err(Error::InvalidNode(format!(
                                "fixed index {} out of range for dimension {}",
                                i, dim
                            )));
                        }
                    }
                }
                PeekIndex::Expr(id) => {
                    if !self.result_type(*id).is_scalar() {
                        return Err(Error::InvalidNode(format!(
                            "dynamic peek index must be scalar, got {}",
                            self.result_type(*id)
                        )));
                    }
                }
            }
        }
        Ok(self.push(ExprNode::Peek {
            tensor,
            indexes,
            ty: ValueType::scalar(),
        }))
    }
}
