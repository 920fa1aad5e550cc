//! Immediate legalization.
//!
//! Grounded on the example backend's `ImmNormalizePass`. RV32I's
//! immediate fields are a signed 12 bits for `addi`/`slti`/`sltiu`/
//! `xori`/`ori`/`andi` and an unsigned 5 bits for `slli`/`srli`/`srai`;
//! every other ALU/branch opcode takes registers only. Anything that
//! doesn't fit is materialized with `li` into a scratch register first.
//! Runs after [`super::imm_convert`] has already folded every immediate
//! that was already legal into its "-I" form, so everything left here
//! genuinely needs a register.
//!
//! The original limits its scratch pool to `a6`/`a7`; that's one register
//! short for an instruction needing three simultaneous materializations
//! (e.g. a fully-immediate three-operand compare survives this pass with
//! one operand already a register, but legalize_flex still walks every
//! source), so this broadens it to `t0`-`t2` plus `a7`.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;

const SCRATCH_POOL: [RegName; 4] = [RegName::T0, RegName::T1, RegName::T2, RegName::A7];

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        let mut inst = inst;

        match inst.opcode {
            OpCode::Li => {
                // already a single materializing pseudo-op, nothing to legalize
            }
            OpCode::Addi | OpCode::Slti | OpCode::Sltiu | OpCode::Xori | OpCode::Ori | OpCode::Andi => {
                legalize_flex(&mut inst, &mut out, is_valid_imm12);
            }
            OpCode::Slli | OpCode::Srli | OpCode::Srai => {
                legalize_flex(&mut inst, &mut out, is_valid_shamt);
            }
            OpCode::Add
            | OpCode::Sub
            | OpCode::Slt
            | OpCode::Sltu
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Divu
            | OpCode::Rem
            | OpCode::Remu
            | OpCode::Xor
            | OpCode::Or
            | OpCode::And
            | OpCode::Sll
            | OpCode::Srl
            | OpCode::Sra
            | OpCode::Beq
            | OpCode::Bne
            | OpCode::Blt
            | OpCode::Ble
            | OpCode::Bgt
            | OpCode::Bge
            | OpCode::Bltu
            | OpCode::Bleu
            | OpCode::Bgtu
            | OpCode::Bgeu => {
                let mut mask = reg_mask(&inst);
                for src in inst.srcs_mut() {
                    if let Some(imm) = src.as_imm() {
                        let temp = select_temp_reg(&mut mask);
                        out.push(Inst::new(OpCode::Li, Some(Operand::Reg(temp)), &[Operand::Imm(imm)]));
                        *src = Operand::Reg(temp);
                    }
                }
            }
            _ => {}
        }

        out.push(inst);
    }

    func.insts = out;
}

/// Every source but the last must be a register; the last may be an
/// immediate if `valid_last` accepts it.
fn legalize_flex(inst: &mut Inst, out: &mut Vec<Inst>, valid_last: fn(i32) -> bool) {
    let mut mask = reg_mask(inst);
    let last = inst.srcs().len() - 1;
    for (i, src) in inst.srcs_mut().iter_mut().enumerate() {
        let imm = match src.as_imm() {
            Some(imm) => imm,
            None => continue,
        };
        let needs_materializing = i != last || !valid_last(imm);
        if needs_materializing {
            let temp = select_temp_reg(&mut mask);
            out.push(Inst::new(OpCode::Li, Some(Operand::Reg(temp)), &[Operand::Imm(imm)]));
            *src = Operand::Reg(temp);
        }
    }
}

fn reg_mask(inst: &Inst) -> u32 {
    let mut mask = 0u32;
    for src in inst.srcs() {
        if let Some(r) = src.as_phys() {
            mask |= 1 << (r as u32);
        }
    }
    mask
}

fn select_temp_reg(mask: &mut u32) -> RegName {
    for &reg in SCRATCH_POOL.iter() {
        let bit = reg as u32;
        if *mask & (1 << bit) == 0 {
            *mask |= 1 << bit;
            return reg;
        }
    }
    unreachable!("instruction exhausted every immediate-materializing scratch register")
}

fn is_valid_imm12(imm: i32) -> bool {
    (-2048..=2047).contains(&imm)
}

fn is_valid_shamt(imm: i32) -> bool {
    (0..=31).contains(&imm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Linkage;

    #[test]
    fn in_range_addi_is_left_alone() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = Operand::Reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Addi, Some(a), &[a, Operand::Imm(100)]));
        run(&mut func);
        assert_eq!(func.insts.len(), 1);
        assert_eq!(func.insts[0].opcode, OpCode::Addi);
    }

    #[test]
    fn out_of_range_addi_materializes_via_li() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = Operand::Reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Addi, Some(a), &[a, Operand::Imm(5000)]));
        run(&mut func);
        assert_eq!(func.insts.len(), 2);
        assert_eq!(func.insts[0].opcode, OpCode::Li);
        assert_eq!(func.insts[1].opcode, OpCode::Addi);
        assert!(func.insts[1].srcs()[1].is_reg());
    }

    #[test]
    fn register_only_opcode_materializes_its_immediate() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = Operand::Reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Mul, Some(a), &[a, Operand::Imm(3)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Li);
        assert_eq!(func.insts[1].opcode, OpCode::Mul);
    }

    #[test]
    fn out_of_range_shift_amount_materializes() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = Operand::Reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Slli, Some(a), &[a, Operand::Imm(40)]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::Li);
        assert_eq!(func.insts[1].opcode, OpCode::Slli);
    }
}
