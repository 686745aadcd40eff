//! Plan compilation and execution.
//!
//! A finalized expression tree compiles into a linear instruction sequence
//! via depth-first post-order traversal: every node's operands execute
//! before the node itself, so each instruction finds its operands on top
//! of the stack. The compiled plan is immutable and shared; any number of
//! invocations may execute it concurrently, each with its own parameter
//! store and execution state.

use crate::error::{Result, RuntimeError};
use crate::instruction::{
    AuxSpec, DenseJoinSpec, GenericJoinSpec, InplaceJoinSpec, InstrFn, Instruction, PeekSpec,
    SpecStore,
};
use crate::kernels;
use crate::state::{ExecutionState, ParamStore, ValueSlot};

use kyanite_core::{
    peek_dims, CellType, ExprNode, ExprTree, NodeId, Primary, Side, Value, ValueType,
};

use std::borrow::Cow;

/// A compiled, immutable execution plan.
#[derive(Debug)]
pub struct CompiledPlan {
    /// Instructions in execution (post-) order.
    instructions: Vec<Instruction>,

    /// Auxiliary specs referenced by the instructions.
    specs: SpecStore,

    /// Parameter indexes the plan reads, with their expected types.
    params: Vec<(usize, ValueType)>,
}

impl CompiledPlan {
    /// The compiled instruction sequence.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Execute the plan against one invocation's parameter store.
    ///
    /// Returns the final stack-top result: borrowed from the store when
    /// the plan ended in a reclaimed parameter buffer, owned otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is missing a parameter or holds one
    /// of the wrong type.
    pub fn execute<'a>(&self, params: &'a mut ParamStore) -> Result<Cow<'a, Value>> {
        for (index, expected) in &self.params {
            if *index >= params.len() {
                return Err(RuntimeError::ParamMismatch(format!(
                    "plan reads parameter {index} but the store holds {}",
                    params.len()
                )));
            }
            let actual = params.get(*index).ty();
            if actual != expected {
                return Err(RuntimeError::ParamMismatch(format!(
                    "parameter {index} is {actual}, plan expects {expected}"
                )));
            }
        }

        let mut state = ExecutionState::new(&mut *params);
        for instruction in &self.instructions {
            instruction.run(&mut state, &self.specs);
        }
        assert_eq!(
            state.stack_len(),
            1,
            "compiled plan left an unbalanced operand stack"
        );
        let slot = state.pop();
        drop(state);

        match slot {
            ValueSlot::Temp(value) => Ok(Cow::Owned(value)),
            ValueSlot::Param(index) => Ok(Cow::Borrowed(params.get(index))),
            ValueSlot::Const(id) => Ok(Cow::Owned(self.specs.constant(id).clone())),
        }
    }
}

/// Compile a finalized expression tree into an executable plan.
///
/// # Errors
///
/// Returns an error if the tree joins or peeks operands with mapped
/// dimensions; such nodes belong to the external generic engine, not this
/// core.
#[tracing::instrument(skip_all, fields(nodes = tree.len()))]
pub fn compile(tree: &ExprTree) -> Result<CompiledPlan> {
    let mut plan = CompiledPlan {
        instructions: Vec::with_capacity(tree.len()),
        specs: SpecStore::default(),
        params: Vec::new(),
    };
    compile_node(tree, tree.root(), &mut plan)?;
    Ok(plan)
}

/// Compile a node's operands, then the node itself.
fn compile_node(tree: &ExprTree, id: NodeId, plan: &mut CompiledPlan) -> Result<()> {
    for child in tree.children(id) {
        compile_node(tree, child, plan)?;
    }
    let instruction = compile_self(tree, id, plan)?;
    plan.instructions.push(instruction);
    Ok(())
}

/// Produce the one instruction executing this node.
fn compile_self(tree: &ExprTree, id: NodeId, plan: &mut CompiledPlan) -> Result<Instruction> {
    match tree.node(id) {
        ExprNode::Param { index, ty, .. } => {
            match plan.params.iter().find(|(i, _)| i == index) {
                Some((_, existing)) => assert_eq!(
                    existing, ty,
                    "parameter {index} declared with two different types"
                ),
                None => plan.params.push((*index, ty.clone())),
            }
            let spec = plan.specs.push(AuxSpec::Param(*index));
            Ok(Instruction::new(kernels::load_param, Some(spec)))
        }

        ExprNode::Const { value } => {
            let spec = plan.specs.push(AuxSpec::Const(value.clone()));
            Ok(Instruction::new(kernels::load_const, Some(spec)))
        }

        ExprNode::Join { lhs, rhs, op, ty } => {
            let lhs_ty = tree.result_type(*lhs);
            let rhs_ty = tree.result_type(*rhs);
            check_executable(ty)?;
            check_executable(lhs_ty)?;
            check_executable(rhs_ty)?;
            let spec = plan.specs.push(AuxSpec::Join(GenericJoinSpec {
                op: op.scalar_fn(),
                ty: ty.clone(),
                lhs_strides: operand_strides(ty, lhs_ty),
                rhs_strides: operand_strides(ty, rhs_ty),
            }));
            Ok(Instruction::new(kernels::generic_join_op, Some(spec)))
        }

        ExprNode::Peek {
            tensor, indexes, ..
        } => {
            let operand = tree.result_type(*tensor);
            check_executable(operand)?;
            let spec = plan.specs.push(AuxSpec::Peek(PeekSpec {
                dims: peek_dims(operand, indexes),
            }));
            Ok(Instruction::new(kernels::generic_peek_op, Some(spec)))
        }

        ExprNode::DenseJoin {
            lhs,
            rhs,
            op,
            ty,
            layout,
            ..
        } => {
            let (pri_ty, sec_ty) = match layout.primary {
                Primary::Lhs => (tree.result_type(*lhs), tree.result_type(*rhs)),
                Primary::Rhs => (tree.result_type(*rhs), tree.result_type(*lhs)),
            };
            let fun = select_dense_join(
                pri_ty.cell_type(),
                sec_ty.cell_type(),
                layout.primary == Primary::Rhs,
            );
            let spec = plan.specs.push(AuxSpec::DenseJoin(DenseJoinSpec {
                op: op.scalar_fn(),
                ty: ty.clone(),
                layout: *layout,
            }));
            Ok(Instruction::new(fun, Some(spec)))
        }

        ExprNode::InplaceJoin {
            lhs,
            rhs,
            op,
            ty,
            target,
        } => {
            let other_ty = match target {
                Side::Lhs => tree.result_type(*rhs),
                Side::Rhs => tree.result_type(*lhs),
            };
            let fun = select_inplace_join(ty.cell_type(), other_ty.cell_type());
            let spec = plan.specs.push(AuxSpec::InplaceJoin(InplaceJoinSpec {
                op: op.scalar_fn(),
                target: *target,
            }));
            Ok(Instruction::new(fun, Some(spec)))
        }

        ExprNode::DensePeek { tensor, dims, .. } => {
            let fun = match tree.result_type(*tensor).cell_type() {
                CellType::F64 => kernels::dense_peek_op::<f64> as InstrFn,
                CellType::F32 => kernels::dense_peek_op::<f32> as InstrFn,
            };
            let spec = plan.specs.push(AuxSpec::Peek(PeekSpec { dims: dims.clone() }));
            Ok(Instruction::new(fun, Some(spec)))
        }
    }
}

/// Reject node types this core cannot evaluate.
fn check_executable(ty: &ValueType) -> Result<()> {
    if ty.has_mapped() {
        return Err(RuntimeError::Unsupported(format!(
            "mapped dimensions in {ty} are not executable by this core"
        )));
    }
    Ok(())
}

/// Per result dimension, the stride it contributes to an operand's flat
/// index; 0 when the operand lacks the dimension.
fn operand_strides(result: &ValueType, operand: &ValueType) -> Vec<usize> {
    let dims = operand.dimensions();
    let mut strides = vec![0usize; dims.len()];
    let mut stride = 1usize;
    for (k, dim) in dims.iter().enumerate().rev() {
        strides[k] = stride;
        stride *= dim.dense_size().expect("dense operand");
    }
    result
        .dimensions()
        .iter()
        .map(|result_dim| {
            dims.iter()
                .position(|dim| dim.name == result_dim.name)
                .map(|k| strides[k])
                .unwrap_or(0)
        })
        .collect()
}

/// Select the dense join kernel for the primary/secondary cell types.
///
/// The output cell type follows the promotion rule, so it is fully
/// determined here. `swap` is true when the primary operand is the join's
/// right-hand side.
fn select_dense_join(primary: CellType, secondary: CellType, swap: bool) -> InstrFn {
    use CellType::{F32, F64};
    match (primary, secondary, swap) {
        (F64, F64, false) => kernels::dense_join_op::<f64, f64, f64, false>,
        (F64, F64, true) => kernels::dense_join_op::<f64, f64, f64, true>,
        (F64, F32, false) => kernels::dense_join_op::<f64, f32, f64, false>,
        (F64, F32, true) => kernels::dense_join_op::<f64, f32, f64, true>,
        (F32, F64, false) => kernels::dense_join_op::<f32, f64, f64, false>,
        (F32, F64, true) => kernels::dense_join_op::<f32, f64, f64, true>,
        (F32, F32, false) => kernels::dense_join_op::<f32, f32, f32, false>,
        (F32, F32, true) => kernels::dense_join_op::<f32, f32, f32, true>,
    }
}

/// Select the in-place join kernel for the target (= result) and
/// secondary cell types.
fn select_inplace_join(target: CellType, other: CellType) -> InstrFn {
    use CellType::{F32, F64};
    match (target, other) {
        (F64, F64) => kernels::inplace_join_op::<f64, f64>,
        (F64, F32) => kernels::inplace_join_op::<f64, f32>,
        (F32, F32) => kernels::inplace_join_op::<f32, f32>,
        (F32, F64) => {
            unreachable!("in-place target cell type always equals the promoted result type")
        }
    }
}
