//! The shared shape of a mechanical MIR rewrite pass.
//!
//! Passes that need nothing beyond "walk the instruction list with some
//! local tables, maybe erase or insert" (move elimination, move
//! propagation, move overriding, branch elimination) implement this trait
//! once and are reused by every target. Passes with real per-target
//! knowledge — liveness, both register allocators, slot-spill insertion,
//! prologue/epilogue synthesis, and the ISA-specific legalizations — are
//! plain functions called in sequence from each target's `compile_function`
//! (see [`crate::isa::arm32`], [`crate::isa::riscv32`]); threading their
//! typed results (live intervals, an interference graph) through a
//! `Box<dyn Pass>` pipeline would cost more indirection than it buys, so
//! the pipeline there is a straight-line function rather than a runtime
//! list, the same way `cranelift_codegen::Context::compile` is a fixed
//! sequence of steps rather than a dynamically assembled one.

use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Register;

/// A self-contained instruction-list rewrite, reusable across targets.
pub trait Pass<R: Register, I: MirInst<R>> {
    fn run_on(&mut self, func: &mut MirFunction<R, I>);
}
