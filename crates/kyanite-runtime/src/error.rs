//! Error types for the runtime crate.

use thiserror::Error;

/// Plan compilation and execution errors.
///
/// Only boundary conditions are errors: a tree this core cannot execute,
/// or a parameter store that does not match the compiled plan. Malformed
/// plans themselves (unbalanced stacks, spec/instruction mismatches) are
/// programming errors guarded by assertions, and a dynamic peek index out
/// of range is not an error at all.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The tree contains operands this core cannot evaluate.
    #[error("unsupported plan: {0}")]
    Unsupported(String),

    /// The parameter store disagrees with the plan's parameter types.
    #[error("parameter mismatch: {0}")]
    ParamMismatch(String),
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
