//! The machine-instruction contract shared by every target.
//!
//! Each target defines its own concrete instruction type (an opcode plus
//! whatever per-ISA side data it needs — e.g. AArch32's folded shift, or
//! RV32's register/immediate opcode variants) rather than sharing one
//! struct, the same way the example backend's `AArch32Inst` and
//! `RISCV32Inst` are separate classes. What *is* shared is this trait:
//! implementing it is what lets the liveness analysis, both register
//! allocators, and the ISA-agnostic peephole passes (move elimination,
//! move propagation, move overriding, branch elimination) be written once
//! and reused by every target, instead of duplicated per ISA.
//!
//! The C++ original attaches a back-pointer from each "use" to its owning
//! instruction so a peephole rewrite can mutate that instruction in place.
//! Here, every pass already walks a `Vec<I>` by position, so a rewrite
//! just indexes back into the vector — the back-pointer is simply the
//! position in the list, which Rust's ownership model hands us for free.

use crate::mir::operand::{Operand, Register};
use smallvec::SmallVec;
use std::fmt;

/// Up to two successor labels a control-transfer instruction may name.
pub type Targets<R> = SmallVec<[Operand<R>; 2]>;

/// Common shape every target's concrete instruction type exposes.
pub trait MirInst<R: Register>: fmt::Debug + Clone {
    /// The target's opcode enumeration.
    type Op: Copy + Eq + fmt::Debug;

    fn opcode(&self) -> Self::Op;

    fn dest(&self) -> Option<Operand<R>>;
    fn set_dest(&mut self, op: Operand<R>);

    /// Source operands, in the order selection produced them.
    fn srcs(&self) -> &[Operand<R>];
    fn srcs_mut(&mut self) -> &mut [Operand<R>];

    /// Whether this is a register-to-register move, for move elimination
    /// and propagation. A move always has exactly one source.
    fn is_move(&self) -> bool;

    /// Whether this instruction is a call (forces conservative liveness
    /// and clobbers every caller-saved temporary across it).
    fn is_call(&self) -> bool;

    /// If this instruction is a bare label marker, the label it defines.
    fn as_label(&self) -> Option<Operand<R>>;

    /// If this is an unconditional jump, its target label.
    fn as_unconditional_jump(&self) -> Option<Operand<R>>;

    /// Every label this instruction may transfer control to (conditional
    /// branches name two; unconditional jumps name one; everything else
    /// names none). Used to build the CFG for liveness analysis.
    fn branch_targets(&self) -> Targets<R>;

    /// Whether control falls through to the next instruction if this one
    /// does not branch (false only for unconditional jumps and returns).
    fn falls_through(&self) -> bool;

    /// Whether this is a function return.
    fn is_return(&self) -> bool;
}
