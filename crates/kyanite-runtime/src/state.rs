//! Per-invocation execution state.
//!
//! One evaluation owns a parameter store (the operand buffers handed in by
//! the caller) and an operand stack of value slots. Slots either reference
//! a parameter buffer, reference a constant in the compiled plan, or own a
//! scratch value outright; owned slots are the per-execution scratch
//! storage and are dropped with the state. Nothing here is shared between
//! invocations, so no locking exists at this layer.

use crate::instruction::{SpecId, SpecStore};

use kyanite_core::Value;

/// Caller-provided operand buffers for one invocation.
///
/// Index positions correspond to the `Param` indexes of the compiled
/// tree. In-place instructions write into these values; after execution
/// the caller observes any reclaimed buffer here.
#[derive(Debug)]
pub struct ParamStore {
    values: Vec<Value>,
}

impl ParamStore {
    /// Create a store from operand values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a parameter value.
    pub fn get(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// Get a parameter value mutably.
    pub fn get_mut(&mut self, index: usize) -> &mut Value {
        &mut self.values[index]
    }

    /// Split-borrow one parameter mutably and another immutably.
    ///
    /// Needed by in-place join kernels whose target and secondary are two
    /// distinct parameters of the same store.
    ///
    /// # Panics
    ///
    /// Panics if `target == other`.
    pub fn pair_mut(&mut self, target: usize, other: usize) -> (&mut Value, &Value) {
        assert_ne!(target, other, "pair_mut needs two distinct parameters");
        if target < other {
            let (head, tail) = self.values.split_at_mut(other);
            (&mut head[target], &tail[0])
        } else {
            let (head, tail) = self.values.split_at_mut(target);
            (&mut tail[0], &head[other])
        }
    }

    /// Consume the store, returning the (possibly mutated) values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// One entry on the operand stack.
#[derive(Debug)]
pub enum ValueSlot {
    /// Borrowed from the invocation's parameter store.
    Param(usize),

    /// Borrowed from the compiled plan's constant table.
    Const(SpecId),

    /// Scratch value owned by this execution.
    Temp(Value),
}

/// Execution state of one plan invocation: the operand stack over the
/// caller's parameter store.
#[derive(Debug)]
pub struct ExecutionState<'a> {
    params: &'a mut ParamStore,
    stack: Vec<ValueSlot>,
}

impl<'a> ExecutionState<'a> {
    /// Create a fresh state over a parameter store.
    pub fn new(params: &'a mut ParamStore) -> Self {
        Self {
            params,
            stack: Vec::new(),
        }
    }

    /// Push one operand.
    pub fn push(&mut self, slot: ValueSlot) {
        self.stack.push(slot);
    }

    /// Pop one operand.
    ///
    /// # Panics
    ///
    /// Panics on an empty stack; a compiled plan that underflows is
    /// malformed.
    pub fn pop(&mut self) -> ValueSlot {
        self.stack.pop().expect("operand stack underflow")
    }

    /// Current stack depth.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// The parameter store.
    pub fn params(&self) -> &ParamStore {
        self.params
    }

    /// The parameter store, mutably.
    pub fn params_mut(&mut self) -> &mut ParamStore {
        self.params
    }

    /// Resolve a slot to the value it denotes.
    pub fn value<'s>(&'s self, slot: &'s ValueSlot, specs: &'s SpecStore) -> &'s Value {
        match slot {
            ValueSlot::Param(index) => self.params.get(*index),
            ValueSlot::Const(id) => specs.constant(*id),
            ValueSlot::Temp(value) => value,
        }
    }
}
