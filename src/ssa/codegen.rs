//! The SSA reader surface: a stable contract between SSA and backends.
//!
//! In the example backend this crate is grounded on, every SSA node has a
//! virtual `GenerateCode` method that calls back into a `CodeGen` visitor
//! with itself, i.e. double dispatch. SSA here is a closed, non-extensible
//! enum, so the idiomatic replacement is a single `match` over the kind
//! tag: [`CodeGenerator::generate_on`] takes a `ValueId` and switches on
//! `Function::value(id).kind`. Each backend ([`crate::isa::arm32`],
//! [`crate::isa::riscv32`]) implements this trait once.
//!
//! Caching is the other half of the contract: calling `generate_on` twice
//! for the same value must return the same MIR operand (typically the same
//! virtual register), both for correctness of value identity and so that
//! selection is linear in the size of the input SSA rather than
//! exponential in the depth of operand chains. [`ValueCache`] is the
//! shared implementation of that memoization; selectors hold one and
//! consult it before recursing into an operand.

use crate::entity::PrimaryMap;
use crate::mir::operand::{Operand, Register};
use crate::ssa::ValueId;
use std::collections::HashMap;

/// Something that can lower one SSA value to the MIR operand holding its
/// result (or a null operand, for kinds with no result). Generic over the
/// target's physical register type, the same way [`crate::mir::inst::MirInst`]
/// is, so one trait serves every target's selector.
pub trait CodeGenerator<R: Register> {
    /// Lower `value` (a node of `func`), appending whatever MIR
    /// instructions are necessary to the function currently being built,
    /// and return the operand that represents its result.
    ///
    /// Implementations must consult and populate a [`ValueCache`] so that
    /// repeat calls for the same `value` return the same operand without
    /// re-emitting instructions. Recursion into a value's own operands is
    /// guaranteed to terminate because the input SSA is acyclic.
    fn generate_on(&mut self, value: ValueId) -> Operand<R>;
}

/// Memoizes the MIR operand produced for each SSA value within the
/// function currently being selected. Reset between functions.
pub struct ValueCache<R: Register> {
    cache: HashMap<ValueId, Operand<R>>,
}

impl<R: Register> Default for ValueCache<R> {
    fn default() -> Self {
        Self { cache: HashMap::new() }
    }
}

impl<R: Register> ValueCache<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously cached operand for `value`, if any.
    pub fn get(&self, value: ValueId) -> Option<Operand<R>> {
        self.cache.get(&value).copied()
    }

    /// Record the operand produced for `value`. Subsequent lookups for the
    /// same id return this operand rather than regenerating it.
    pub fn insert(&mut self, value: ValueId, operand: Operand<R>) {
        self.cache.insert(value, operand);
    }

    /// Drop all entries; called when moving on to the next function.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Per-module memoization of `GlobalId -> Operand` (a `Label`), separate
/// from the per-function [`ValueCache`] since globals outlive any one
/// function's selection pass.
pub struct GlobalCache<R: Register> {
    cache: PrimaryMap<crate::ssa::GlobalId, Option<Operand<R>>>,
}

impl<R: Register> GlobalCache<R> {
    pub fn new(count: usize) -> Self {
        let mut cache = PrimaryMap::new();
        for _ in 0..count {
            cache.push(None);
        }
        Self { cache }
    }

    pub fn get(&self, global: crate::ssa::GlobalId) -> Option<Operand<R>> {
        self.cache[global]
    }

    pub fn insert(&mut self, global: crate::ssa::GlobalId, operand: Operand<R>) {
        self.cache[global] = Some(operand);
    }
}
