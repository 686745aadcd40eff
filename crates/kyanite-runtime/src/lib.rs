//! Instruction compilation and stack-based interpretation for Kyanite.
//!
//! This crate turns a finalized (post-optimization) expression tree into a
//! linear instruction sequence and executes it against a per-invocation
//! operand stack:
//! - `instruction` - compiled instructions and the auxiliary spec store
//! - `kernels` - per-cell-type and generic execution kernels
//! - `plan` - post-order compilation and the executable `CompiledPlan`
//! - `state` - parameter store, value slots, and the operand stack
//!
//! A compiled plan is immutable and `Send + Sync`; independent invocations
//! execute it concurrently, each with a private `ParamStore` and execution
//! state.
//!
//! # Example
//!
//! ```
//! use kyanite_core::{BinaryOp, CellBuffer, CellType, Dimension, ExprTree, Value, ValueType};
//! use kyanite_runtime::{compile, ParamStore};
//!
//! let ty = ValueType::tensor(CellType::F64, vec![Dimension::dense("x", 3)]).unwrap();
//! let mut tree = ExprTree::new();
//! let a = tree.param(0, ty.clone(), false);
//! let b = tree.param(1, ty.clone(), false);
//! tree.join(a, b, BinaryOp::Mul).unwrap();
//!
//! let plan = compile(&tree).unwrap();
//! let mut params = ParamStore::new(vec![
//!     Value::new(ty.clone(), CellBuffer::F64(vec![1.0, 2.0, 3.0])),
//!     Value::new(ty.clone(), CellBuffer::F64(vec![4.0, 5.0, 6.0])),
//! ]);
//! let result = plan.execute(&mut params).unwrap();
//! assert_eq!(result.as_ref(), &Value::new(ty, CellBuffer::F64(vec![4.0, 10.0, 18.0])));
//! ```

pub mod error;
pub mod instruction;
mod kernels;
pub mod plan;
pub mod state;

pub use error::{Result, RuntimeError};
pub use instruction::{AuxSpec, InstrFn, Instruction, SpecId, SpecStore};
pub use plan::{compile, CompiledPlan};
pub use state::{ExecutionState, ParamStore, ValueSlot};
