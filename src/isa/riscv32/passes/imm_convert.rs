//! Opportunistically folds a trailing immediate operand that's already in
//! range into the dedicated "-I" instruction form, before
//! [`super::imm_normalize`] forcibly materializes whatever's left.
//!
//! Grounded on the example backend's `ImmConversionPass`: `mv dest, #imm`
//! becomes `li dest, imm`; a register-register ALU op whose final operand
//! is an in-range immediate is rewritten in place to its immediate form
//! (`add`→`addi`, `xor`→`xori`, `or`→`ori`, `and`→`andi`, `sll`→`slli`,
//! `srl`→`srli`, `sra`→`srai`, `slt`→`slti`, `sltu`→`sltiu`); `sub dest,
//! a, #imm` negates the immediate and becomes `addi dest, a, -imm` if the
//! negated value still fits.
//!
//! This must run *before* `imm_normalize`: it only ever converts an
//! immediate that's already legal, so running it after normalization
//! (which has already turned every such immediate into a register) would
//! leave it permanently dead.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;

const IMM_MIN: i32 = -2048;
const IMM_MAX: i32 = 2047;

fn in_range(v: i32) -> bool {
    (IMM_MIN..=IMM_MAX).contains(&v)
}

fn imm_form(op: OpCode) -> Option<OpCode> {
    use OpCode::*;
    Some(match op {
        Add => Addi,
        Xor => Xori,
        Or => Ori,
        And => Andi,
        Sll => Slli,
        Srl => Srli,
        Sra => Srai,
        Slt => Slti,
        Sltu => Sltiu,
        _ => return None,
    })
}

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    for inst in func.insts.iter_mut() {
        if inst.opcode == OpCode::Mv {
            if let Operand::Imm(v) = inst.srcs()[0] {
                inst.opcode = OpCode::Li;
                let _ = v;
            }
            continue;
        }

        if inst.opcode == OpCode::Sub {
            if let Operand::Imm(v) = inst.srcs()[1] {
                if let Some(neg) = v.checked_neg() {
                    if in_range(neg) {
                        inst.opcode = OpCode::Addi;
                        inst.srcs_mut()[1] = Operand::Imm(neg);
                    }
                }
            }
            continue;
        }

        if let Some(new_op) = imm_form(inst.opcode) {
            if let Operand::Imm(v) = inst.srcs()[1] {
                if shift_in_range(new_op, v) {
                    inst.opcode = new_op;
                }
            }
        }
    }
}

fn shift_in_range(op: OpCode, v: i32) -> bool {
    match op {
        OpCode::Slli | OpCode::Srli | OpCode::Srai => (0..=31).contains(&v),
        _ => in_range(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Linkage;

    fn reg(r: RegName) -> Operand<RegName> {
        Operand::Reg(r)
    }

    #[test]
    fn add_with_in_range_immediate_becomes_addi() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Add, Some(a), &[a, Operand::Imm(10)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Addi);
    }

    #[test]
    fn add_with_out_of_range_immediate_is_untouched() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Add, Some(a), &[a, Operand::Imm(5000)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Add);
    }

    #[test]
    fn sub_with_negatable_immediate_becomes_addi() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Sub, Some(a), &[a, Operand::Imm(5)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Addi);
        assert_eq!(func.insts[0].srcs()[1], Operand::Imm(-5));
    }

    #[test]
    fn mv_with_immediate_becomes_li() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Mv, Some(a), &[Operand::Imm(7)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Li);
    }
}
