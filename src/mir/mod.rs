//! Machine IR: target instructions over mixed physical/virtual operands.
//!
//! Produced by each target's instruction selector (`isa::*::lower`),
//! mutated in place by the pass pipeline, and finally dumped to text by
//! each target's emitter. See `operand` for the five operand kinds and
//! their uniqueness invariants, `inst` for the shared instruction
//! contract, `function`/`module` for ownership, and `pass` for how
//! mechanical rewrites are shared across targets.

pub mod function;
pub mod inst;
pub mod module;
pub mod operand;
pub mod pass;
