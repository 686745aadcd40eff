//! Core data model for the Kyanite dense tensor expression engine.
//!
//! This crate provides the foundational abstractions the optimizer and
//! runtime crates build on:
//! - Cell and value types with name-sorted dimension lists (`types`)
//! - The scalar binary operator set (`ops`)
//! - Dense run-time values and typed cell buffers (`value`)
//! - The dimension overlap classifier for dense joins (`overlap`)
//! - The arena-owned expression tree with a closed node enum (`expr`)

pub mod expr;
pub mod ops;
pub mod overlap;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use expr::{peek_dims, ExprNode, ExprTree, NodeId, PeekDim, PeekIndex, PeekStep, Side};
pub use ops::{BinaryOp, ScalarFn};
pub use overlap::{classify_dense_join, JoinLayout, Overlap, Primary};
pub use types::{CellType, Dimension, DimensionSize, ValueType};
pub use value::{CellBuffer, CellScalar, Value};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for expression construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value type: {0}")]
    InvalidType(String),

    #[error("incompatible join operands: {0}")]
    IncompatibleJoin(String),

    #[error("invalid expression node: {0}")]
    InvalidNode(String),
}
