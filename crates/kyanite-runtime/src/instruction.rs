//! Compiled instructions and their auxiliary specs.
//!
//! An instruction is one directly executable unit: a function pointer
//! selected per declared cell type at compile time, plus one handle into
//! the plan's auxiliary spec store (or none). Specs are built once during
//! compilation and shared read-only by every invocation of the plan.

use crate::state::ExecutionState;

use kyanite_core::{JoinLayout, PeekDim, ScalarFn, Side, Value, ValueType};

/// Handle to an auxiliary spec in a plan's [`SpecStore`].
///
/// An arena index rather than a raw address: instructions stay
/// pointer-sized without carrying unchecked pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecId(usize);

impl SpecId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Spec of a generic elementwise join.
///
/// `lhs_strides`/`rhs_strides` give, per result dimension, the stride that
/// dimension contributes to the operand's flat index (0 when the operand
/// lacks the dimension). Precomputed from the declared operand types.
#[derive(Debug)]
pub struct GenericJoinSpec {
    pub op: ScalarFn,
    pub ty: ValueType,
    pub lhs_strides: Vec<usize>,
    pub rhs_strides: Vec<usize>,
}

/// Spec of a specialized dense join writing a fresh buffer.
#[derive(Debug)]
pub struct DenseJoinSpec {
    pub op: ScalarFn,
    pub ty: ValueType,
    pub layout: JoinLayout,
}

/// Spec of an in-place dense join overwriting one operand.
#[derive(Debug)]
pub struct InplaceJoinSpec {
    pub op: ScalarFn,
    pub target: Side,
}

/// Spec of a single-cell extraction: the stride walk, fastest-varying
/// dimension first. Shared by the generic and the specialized peek.
#[derive(Debug)]
pub struct PeekSpec {
    pub dims: Vec<PeekDim>,
}

/// Auxiliary data attached to one compiled instruction.
#[derive(Debug)]
pub enum AuxSpec {
    /// Parameter index pushed by a param-load instruction.
    Param(usize),

    /// Literal value pushed by a const-load instruction.
    Const(Value),

    /// Generic join evaluation.
    Join(GenericJoinSpec),

    /// Specialized dense join.
    DenseJoin(DenseJoinSpec),

    /// Specialized in-place dense join.
    InplaceJoin(InplaceJoinSpec),

    /// Single-cell extraction walk.
    Peek(PeekSpec),
}

/// Side table of auxiliary specs owned by one compiled plan.
#[derive(Debug, Default)]
pub struct SpecStore {
    specs: Vec<AuxSpec>,
}

impl SpecStore {
    /// Add a spec, returning its handle.
    pub fn push(&mut self, spec: AuxSpec) -> SpecId {
        let id = SpecId(self.specs.len());
        self.specs.push(spec);
        id
    }

    /// Get a spec by handle.
    pub fn get(&self, id: SpecId) -> &AuxSpec {
        &self.specs[id.index()]
    }

    /// Get a constant value.
    ///
    /// # Panics
    ///
    /// Panics if the spec is not a constant; the plan is malformed.
    pub fn constant(&self, id: SpecId) -> &Value {
        match self.get(id) {
            AuxSpec::Const(value) => value,
            other => panic!("instruction spec mismatch: expected constant, got {other:?}"),
        }
    }

    pub(crate) fn param(&self, id: SpecId) -> usize {
        match self.get(id) {
            AuxSpec::Param(index) => *index,
            other => panic!("instruction spec mismatch: expected param, got {other:?}"),
        }
    }

    pub(crate) fn join(&self, id: SpecId) -> &GenericJoinSpec {
        match self.get(id) {
            AuxSpec::Join(spec) => spec,
            other => panic!("instruction spec mismatch: expected join, got {other:?}"),
        }
    }

    pub(crate) fn dense_join(&self, id: SpecId) -> &DenseJoinSpec {
        match self.get(id) {
            AuxSpec::DenseJoin(spec) => spec,
            other => panic!("instruction spec mismatch: expected dense join, got {other:?}"),
        }
    }

    pub(crate) fn inplace_join(&self, id: SpecId) -> &InplaceJoinSpec {
        match self.get(id) {
            AuxSpec::InplaceJoin(spec) => spec,
            other => panic!("instruction spec mismatch: expected in-place join, got {other:?}"),
        }
    }

    pub(crate) fn peek(&self, id: SpecId) -> &PeekSpec {
        match self.get(id) {
            AuxSpec::Peek(spec) => spec,
            other => panic!("instruction spec mismatch: expected peek, got {other:?}"),
        }
    }
}

/// Executable function of one instruction.
///
/// Contract: pop exactly the node's operand count off the state's stack,
/// push exactly one result, never suspend.
pub type InstrFn = fn(&mut ExecutionState<'_>, Option<SpecId>, &SpecStore);

/// One compiled instruction: an executable function plus its spec handle.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    fun: InstrFn,
    spec: Option<SpecId>,
}

impl Instruction {
    /// Create an instruction.
    pub fn new(fun: InstrFn, spec: Option<SpecId>) -> Self {
        Self { fun, spec }
    }

    /// Execute this instruction against the given state.
    pub fn run(&self, state: &mut ExecutionState<'_>, specs: &SpecStore) {
        (self.fun)(state, self.spec, specs);
    }
}
