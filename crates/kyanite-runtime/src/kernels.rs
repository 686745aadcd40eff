//! Instruction kernels.
//!
//! Each kernel implements the per-instruction contract: pop exactly the
//! node's operand count, push exactly one result. The dense kernels are
//! monomorphized per cell type and selected once at compile time; the
//! generic kernels dispatch on the buffer variant per element and double
//! as the reference semantics every specialized path must match exactly.

use crate::instruction::{SpecId, SpecStore};
use crate::state::{ExecutionState, ValueSlot};

use kyanite_core::{
    CellBuffer, CellScalar, Overlap, PeekDim, PeekStep, Primary, ScalarFn, Side, Value,
};
use num_traits::AsPrimitive;

/// Push a parameter reference.
pub(crate) fn load_param(state: &mut ExecutionState<'_>, spec: Option<SpecId>, specs: &SpecStore) {
    let index = specs.param(spec.expect("param instruction needs a spec"));
    state.push(ValueSlot::Param(index));
}

/// Push a plan-owned constant reference.
pub(crate) fn load_const(state: &mut ExecutionState<'_>, spec: Option<SpecId>, specs: &SpecStore) {
    let id = spec.expect("const instruction needs a spec");
    debug_assert!(matches!(
        specs.get(id),
        crate::instruction::AuxSpec::Const(_)
    ));
    state.push(ValueSlot::Const(id));
}

/// Generic elementwise join: odometer walk over the result dimensions,
/// per-element operand indexes from precomputed stride tables.
pub(crate) fn generic_join_op(
    state: &mut ExecutionState<'_>,
    spec: Option<SpecId>,
    specs: &SpecStore,
) {
    let spec = specs.join(spec.expect("join instruction needs a spec"));
    let rhs_slot = state.pop();
    let lhs_slot = state.pop();
    let lhs = state.value(&lhs_slot, specs);
    let rhs = state.value(&rhs_slot, specs);

    let sizes: Vec<usize> = spec
        .ty
        .dimensions()
        .iter()
        .map(|dim| dim.dense_size().expect("dense join result"))
        .collect();
    let count = spec.ty.dense_count();
    let mut out = CellBuffer::zeros(spec.ty.cell_type(), count);
    let mut coords = vec![0usize; sizes.len()];
    for i in 0..count {
        let mut lhs_index = 0;
        let mut rhs_index = 0;
        for (k, &coord) in coords.iter().enumerate() {
            lhs_index += coord * spec.lhs_strides[k];
            rhs_index += coord * spec.rhs_strides[k];
        }
        out.set(
            i,
            (spec.op)(lhs.cells().get(lhs_index), rhs.cells().get(rhs_index)),
        );
        for k in (0..coords.len()).rev() {
            coords[k] += 1;
            if coords[k] < sizes[k] {
                break;
            }
            coords[k] = 0;
        }
    }

    let value = Value::new(spec.ty.clone(), out);
    state.push(ValueSlot::Temp(value));
}

/// Specialized dense join: iterate the primary buffer linearly, follow
/// along in the secondary with the layout's index rule, write a fresh
/// result buffer.
///
/// `SWAP` is true when the primary operand is the right-hand side, so the
/// scalar operator still sees its arguments in (lhs, rhs) order.
pub(crate) fn dense_join_op<P, S, O, const SWAP: bool>(
    state: &mut ExecutionState<'_>,
    spec: Option<SpecId>,
    specs: &SpecStore,
) where
    P: CellScalar,
    S: CellScalar,
    O: CellScalar,
{
    let spec = specs.dense_join(spec.expect("dense join instruction needs a spec"));
    let rhs_slot = state.pop();
    let lhs_slot = state.pop();
    let (pri_slot, sec_slot) = match spec.layout.primary {
        Primary::Lhs => (lhs_slot, rhs_slot),
        Primary::Rhs => (rhs_slot, lhs_slot),
    };
    let pri = P::cells(state.value(&pri_slot, specs).cells()).expect("primary cell type");
    let sec = S::cells(state.value(&sec_slot, specs).cells()).expect("secondary cell type");

    let apply = |p: f64, s: f64| if SWAP { (spec.op)(s, p) } else { (spec.op)(p, s) };
    let mut out: Vec<O> = Vec::with_capacity(pri.len());
    match spec.layout.overlap {
        Overlap::Full => {
            for (p, s) in pri.iter().zip(sec) {
                out.push(O::from_f64(apply(p.as_(), s.as_())));
            }
        }
        Overlap::Inner => {
            let secondary_count = sec.len();
            for (i, p) in pri.iter().enumerate() {
                out.push(O::from_f64(apply(p.as_(), sec[i % secondary_count].as_())));
            }
        }
        Overlap::Outer => {
            let factor = spec.layout.factor;
            for (i, p) in pri.iter().enumerate() {
                out.push(O::from_f64(apply(p.as_(), sec[i / factor].as_())));
            }
        }
        Overlap::Complex => unreachable!("complex overlap never compiles to a dense join"),
    }

    let value = Value::new(spec.ty.clone(), O::into_buffer(out));
    state.push(ValueSlot::Temp(value));
}

/// Overwrite `target`'s cells with `op` applied pairwise against `other`.
///
/// `swap` is true when the target is the join's right-hand operand.
fn overwrite<T, S>(target: &mut Value, other: &Value, op: ScalarFn, swap: bool)
where
    T: CellScalar,
    S: CellScalar,
{
    let other_cells = S::cells(other.cells()).expect("in-place secondary cell type");
    let target_cells = T::cells_mut(target.cells_mut()).expect("in-place target cell type");
    debug_assert_eq!(target_cells.len(), other_cells.len());
    for (t, o) in target_cells.iter_mut().zip(other_cells) {
        let (a, b): (f64, f64) = if swap {
            (o.as_(), t.as_())
        } else {
            (t.as_(), o.as_())
        };
        *t = T::from_f64(op(a, b));
    }
}

/// Specialized in-place dense join: overwrite the chosen operand's buffer
/// element-by-element and push that same buffer as the result.
///
/// `T` is the target (= result) cell type, `S` the secondary operand's.
pub(crate) fn inplace_join_op<T, S>(
    state: &mut ExecutionState<'_>,
    spec: Option<SpecId>,
    specs: &SpecStore,
) where
    T: CellScalar,
    S: CellScalar,
{
    let spec = specs.inplace_join(spec.expect("in-place join instruction needs a spec"));
    let rhs_slot = state.pop();
    let lhs_slot = state.pop();
    let (target, other) = match spec.target {
        Side::Lhs => (lhs_slot, rhs_slot),
        Side::Rhs => (rhs_slot, lhs_slot),
    };
    let swap = spec.target == Side::Rhs;

    match (target, other) {
        (ValueSlot::Param(t), ValueSlot::Param(o)) if t == o => {
            // Self-join of one parameter: a single pass reading and
            // writing the same buffer.
            let cells = T::cells_mut(state.params_mut().get_mut(t).cells_mut())
                .expect("in-place target cell type");
            for cell in cells.iter_mut() {
                let v: f64 = cell.as_();
                *cell = T::from_f64((spec.op)(v, v));
            }
            state.push(ValueSlot::Param(t));
        }
        (ValueSlot::Param(t), ValueSlot::Param(o)) => {
            let (target_value, other_value) = state.params_mut().pair_mut(t, o);
            overwrite::<T, S>(target_value, other_value, spec.op, swap);
            state.push(ValueSlot::Param(t));
        }
        (ValueSlot::Param(t), ValueSlot::Const(id)) => {
            let other_value = specs.constant(id);
            overwrite::<T, S>(state.params_mut().get_mut(t), other_value, spec.op, swap);
            state.push(ValueSlot::Param(t));
        }
        (ValueSlot::Param(t), ValueSlot::Temp(other_value)) => {
            overwrite::<T, S>(state.params_mut().get_mut(t), &other_value, spec.op, swap);
            state.push(ValueSlot::Param(t));
        }
        (ValueSlot::Temp(mut target_value), other) => {
            let other_value = match &other {
                ValueSlot::Param(o) => state.params().get(*o),
                ValueSlot::Const(id) => specs.constant(*id),
                ValueSlot::Temp(value) => value,
            };
            overwrite::<T, S>(&mut target_value, other_value, spec.op, swap);
            state.push(ValueSlot::Temp(target_value));
        }
        (ValueSlot::Const(_), _) => unreachable!("in-place target is never a constant"),
    }
}

/// Accumulate the flat offset of a peek, popping one stack value per
/// dynamic dimension. Returns `None` when any dynamic index is out of
/// range; the peek then yields the default 0.0 and execution continues.
fn peek_offset(
    state: &mut ExecutionState<'_>,
    specs: &SpecStore,
    dims: &[PeekDim],
) -> Option<usize> {
    let mut offset = 0usize;
    let mut stride = 1usize;
    let mut valid = true;
    for dim in dims {
        match dim.step {
            PeekStep::Fixed(index) => offset += index * stride,
            PeekStep::Dynamic => {
                let slot = state.pop();
                let raw = state
                    .value(&slot, specs)
                    .as_f64()
                    .expect("scalar peek index operand");
                let index = raw.round();
                if index < 0.0 || index >= dim.size as f64 {
                    valid = false;
                    tracing::warn!(index, size = dim.size, "dimension index out of bounds");
                } else {
                    offset += index as usize * stride;
                }
            }
        }
        stride *= dim.size;
    }
    valid.then_some(offset)
}

/// Generic single-cell extraction, dispatching on the buffer variant for
/// the one cell read.
pub(crate) fn generic_peek_op(
    state: &mut ExecutionState<'_>,
    spec: Option<SpecId>,
    specs: &SpecStore,
) {
    let spec = specs.peek(spec.expect("peek instruction needs a spec"));
    let offset = peek_offset(state, specs, &spec.dims);
    let tensor_slot = state.pop();
    let result = match offset {
        Some(offset) => state.value(&tensor_slot, specs).cells().get(offset),
        None => 0.0,
    };
    state.push(ValueSlot::Temp(Value::scalar(result)));
}

/// Specialized dense peek with the cell read monomorphized per declared
/// cell type.
pub(crate) fn dense_peek_op<T: CellScalar>(
    state: &mut ExecutionState<'_>,
    spec: Option<SpecId>,
    specs: &SpecStore,
) {
    let spec = specs.peek(spec.expect("peek instruction needs a spec"));
    let offset = peek_offset(state, specs, &spec.dims);
    let tensor_slot = state.pop();
    let result: f64 = match offset {
        Some(offset) => {
            let cells =
                T::cells(state.value(&tensor_slot, specs).cells()).expect("peek cell type");
            cells[offset].as_()
        }
        None => 0.0,
    };
    state.push(ValueSlot::Temp(Value::scalar(result)));
}
