//! ISA-agnostic MIR rewrite passes: move elimination, move propagation,
//! move overriding, and branch elimination.
//!
//! Every pass here implements [`crate::mir::pass::Pass`] and is run by
//! every target's pipeline (see `isa::arm32::compile_function` and
//! `isa::riscv32::compile_function`) at the point in the sequence the
//! example backend runs its equivalents.

mod branch_elim;
mod move_elim;
mod move_override;
mod move_prop;

pub use branch_elim::BranchEliminationPass;
pub use move_elim::MoveEliminationPass;
pub use move_override::MoveOverridingPass;
pub use move_prop::MovePropagationPass;
