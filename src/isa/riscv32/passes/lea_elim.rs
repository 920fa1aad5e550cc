//! Materializes every surviving pseudo `lea reg, ptr, offset` into real
//! RV32I instructions.
//!
//! Grounded on the example backend's `LeaEliminationPass`. By the time
//! this runs, [`super::lea_combine`] has already folded away every `lea`
//! whose `ptr` was a bare label, so the only shapes left here are a slot
//! (load the frame-relative base, then add/subtract the slot's own
//! offset) or a plain register (just a `mv`) — the label arm below is
//! kept only as a fallback for the rare case a `lea` of a label survives
//! uncombined. A trailing nonzero `offset` folds in with a final `add`.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;

const SCRATCH: RegName = RegName::A7;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        if inst.opcode != OpCode::Lea {
            out.push(inst);
            continue;
        }

        let ptr = inst.srcs()[0];
        let offset = inst.srcs()[1];
        let dest = inst.dest().unwrap();
        let ofs_zero = offset.as_imm() == Some(0);
        let temp = if ofs_zero { dest } else { Operand::Reg(SCRATCH) };

        match ptr {
            Operand::Slot(id) => {
                let slot = func.operands.slot(id);
                out.push(Inst::new(OpCode::Mv, Some(temp), &[slot.base]));
                if slot.offset > 0 {
                    out.push(Inst::new(OpCode::Add, Some(temp), &[temp, Operand::Imm(slot.offset)]));
                } else if slot.offset < 0 {
                    out.push(Inst::new(OpCode::Sub, Some(temp), &[temp, Operand::Imm(-slot.offset)]));
                }
            }
            Operand::Label(_) => {
                out.push(Inst::new(OpCode::La, Some(temp), &[ptr]));
            }
            _ => {
                out.push(Inst::new(OpCode::Mv, Some(temp), &[ptr]));
            }
        }

        if !ofs_zero {
            out.push(Inst::new(OpCode::Add, Some(dest), &[temp, offset]));
        }
    }

    func.insts = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Linkage;

    #[test]
    fn lea_of_slot_materializes_base_plus_offset() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let sp = Operand::Reg(RegName::Sp);
        let dest = Operand::Reg(RegName::T0);
        let slot = func.operands.get_slot(sp, 16);
        func.insts.push(Inst::new(OpCode::Lea, Some(dest), &[slot, Operand::Imm(0)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Mv);
        assert_eq!(func.insts[0].srcs()[0], sp);
        assert_eq!(func.insts[1].opcode, OpCode::Add);
        assert_eq!(func.insts[1].srcs()[1], Operand::Imm(16));
    }

    #[test]
    fn lea_with_extra_offset_adds_a_trailing_add() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let reg = Operand::Reg(RegName::A0);
        let dest = Operand::Reg(RegName::T0);
        func.insts.push(Inst::new(OpCode::Lea, Some(dest), &[reg, Operand::Imm(12)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Mv);
        assert_eq!(func.insts[0].dest(), Some(Operand::Reg(SCRATCH)));
        assert_eq!(func.insts[1].opcode, OpCode::Add);
        assert_eq!(func.insts[1].dest(), Some(dest));
    }
}
