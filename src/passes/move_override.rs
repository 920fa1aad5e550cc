//! Removes move instructions whose destination is immediately overwritten
//! by the very next instruction, when that instruction doesn't also read
//! the move's destination — and removes moves that are no-ops outright
//! (`mov r0, r0`).
//!
//! Grounded on the example backend's `MoveOverridingPass`.

use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Register;
use crate::mir::pass::Pass;

#[derive(Default)]
pub struct MoveOverridingPass;

impl MoveOverridingPass {
    pub fn new() -> Self {
        Self
    }
}

impl<R: Register, I: MirInst<R>> Pass<R, I> for MoveOverridingPass {
    fn run_on(&mut self, func: &mut MirFunction<R, I>) {
        let mut out: Vec<I> = Vec::with_capacity(func.insts.len());

        for inst in func.insts.drain(..) {
            if inst.is_move() && inst.dest() == inst.srcs().first().copied() {
                continue;
            }

            if let Some(last) = out.last() {
                if last.is_move() {
                    let last_dest = last.dest();
                    let last_src = last.srcs().first().copied();
                    let regs_only =
                        last_dest.map(|d| d.is_reg()).unwrap_or(false) && last_src.map(|s| s.is_reg()).unwrap_or(false);
                    let overrides = regs_only && inst.dest() == last_dest;
                    let uses_last_dest = inst.srcs().iter().any(|s| Some(*s) == last_dest);
                    if overrides && !uses_last_dest {
                        out.pop();
                    }
                }
            }

            out.push(inst);
        }

        func.insts = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::riscv32::inst::{Inst, OpCode};
    use crate::isa::riscv32::registers::RegName;
    use crate::mir::operand::Operand;
    use crate::ssa::Linkage;

    /// Back-to-back moves where the first is dead after the second
    /// overwrites its destination collapse to the net move.
    #[test]
    fn dead_first_move_is_overridden() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let r1 = Operand::Reg(RegName::T0);
        let r2 = Operand::Reg(RegName::T1);
        let r3 = Operand::Reg(RegName::T2);
        func.insts.push(Inst::new(OpCode::Mv, Some(r1), &[r2]));
        func.insts.push(Inst::new(OpCode::Mv, Some(r3), &[r1]));
        MoveOverridingPass::new().run_on(&mut func);
        assert_eq!(func.insts.len(), 1);
        assert_eq!(func.insts[0].dest(), Some(r3));
        assert_eq!(func.insts[0].srcs()[0], r2);
    }

    #[test]
    fn self_move_is_removed_outright() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let r1 = Operand::Reg(RegName::T0);
        func.insts.push(Inst::new(OpCode::Mv, Some(r1), &[r1]));
        MoveOverridingPass::new().run_on(&mut func);
        assert!(func.insts.is_empty());
    }

    #[test]
    fn move_is_kept_when_the_second_instruction_still_reads_it() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let r1 = Operand::Reg(RegName::T0);
        let r2 = Operand::Reg(RegName::T1);
        func.insts.push(Inst::new(OpCode::Mv, Some(r1), &[r2]));
        func.insts.push(Inst::new(OpCode::Add, Some(r1), &[r1, r2]));
        MoveOverridingPass::new().run_on(&mut func);
        assert_eq!(func.insts.len(), 2);
    }
}
