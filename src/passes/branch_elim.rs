//! Removes an unconditional jump whose target is the label immediately
//! following it — the jump is a no-op, since control already falls
//! through there.
//!
//! Grounded on the example backend's (AArch32-specific) `BranchElimination
//! Pass`; generalized here over [`MirInst::as_unconditional_jump`] and
//! [`MirInst::as_label`] so every target shares one implementation
//! instead of duplicating the opcode check per ISA.

use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Register;
use crate::mir::pass::Pass;

#[derive(Default)]
pub struct BranchEliminationPass;

impl BranchEliminationPass {
    pub fn new() -> Self {
        Self
    }
}

impl<R: Register, I: MirInst<R>> Pass<R, I> for BranchEliminationPass {
    fn run_on(&mut self, func: &mut MirFunction<R, I>) {
        let mut out: Vec<I> = Vec::with_capacity(func.insts.len());

        for inst in func.insts.drain(..) {
            if let Some(label) = inst.as_label() {
                if let Some(last) = out.last() {
                    if last.as_unconditional_jump() == Some(label) {
                        out.pop();
                    }
                }
            }
            out.push(inst);
        }

        func.insts = out;
    }
}
