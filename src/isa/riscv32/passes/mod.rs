//! RV32-specific legalization and peephole passes, run in the order
//! described in SPEC_FULL.md §4.3 after the shared ISA-agnostic passes
//! and register allocation. Unlike AArch32, RV32 has no shift-combining,
//! division-strength-reduction, or instruction-scheduling pass.

pub mod branch_combine;
pub mod func_decorate;
pub mod imm_convert;
pub mod imm_normalize;
pub mod lea_combine;
pub mod lea_elim;
pub mod load_store_prop;
pub mod slot_spill;
