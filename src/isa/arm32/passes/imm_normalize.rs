//! Immediate legalization.
//!
//! Grounded on the example backend's `ImmNormalizePass`. AArch32's
//! immediate fields are narrow and irregular (an 8-bit value rotated by
//! an even shift for data-processing opcodes, 12 bits for `add`/`sub`,
//! 5 bits for shift amounts), so this pass walks every instruction after
//! selection and register allocation and replaces any operand that can't
//! be encoded in its field with a `mov`/`movt` sequence into a scratch
//! register drawn from `r0`-`r3`.
//!
//! Loading the address of a label is handled separately by the LEA
//! combine/elimination passes, not here — the selector never emits a
//! bare label as a `ldr` source the way the example backend's pseudo
//! `ldr r0, =label` does.

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        let mut inst = inst;

        match inst.opcode {
            OpCode::Mov => {
                if let Some(imm) = inst.srcs()[0].as_imm() {
                    if !is_valid_opr16(imm) {
                        let dest = inst.dest().unwrap();
                        insert_move(&mut out, imm, dest);
                        continue;
                    }
                }
            }
            OpCode::Str
            | OpCode::Strb
            | OpCode::Mul
            | OpCode::Mls
            | OpCode::Sdiv
            | OpCode::Udiv
            | OpCode::Clz
            | OpCode::Sxtb
            | OpCode::Uxtb => {
                let mut mask = reg_mask(&inst);
                for src in inst.srcs_mut() {
                    if let Some(imm) = src.as_imm() {
                        let temp = select_temp_reg(&mut mask);
                        insert_move(&mut out, imm, Operand::Reg(temp));
                        *src = Operand::Reg(temp);
                    }
                }
            }
            OpCode::Add | OpCode::Sub => {
                legalize_flex(&mut inst, &mut out, is_valid_opr12);
            }
            OpCode::Subs | OpCode::Rsb | OpCode::Cmp | OpCode::And | OpCode::Orr | OpCode::Eor => {
                legalize_flex(&mut inst, &mut out, is_valid_opr8m);
            }
            OpCode::Lsl | OpCode::Lsr | OpCode::Asr => {
                legalize_flex(&mut inst, &mut out, is_valid_opr_sh);
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
            insert_move(out, imm, Operand::Reg(temp));
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
    for bit in RegName::R0 as u32..=RegName::R3 as u32 {
        if mask & (1 << bit) == 0 {
            *mask |= 1 << bit;
            return [RegName::R0, RegName::R1, RegName::R2, RegName::R3][bit as usize];
        }
    }
    unreachable!("instruction exhausted every argument-temp register")
}

fn insert_move(out: &mut Vec<Inst>, imm: i32, dest: Operand<RegName>) {
    let imm = imm as u32;
    if is_valid_imm8m(imm) {
        out.push(Inst::new(OpCode::Mov, Some(dest), &[Operand::Imm(imm as i32)]));
    } else {
        let lo = (imm & 0xffff) as i32;
        let hi = imm >> 16;
        out.push(Inst::new(OpCode::Mov, Some(dest), &[Operand::Imm(lo)]));
        if hi != 0 {
            out.push(Inst::new(OpCode::Movt, Some(dest), &[Operand::Imm(hi as i32)]));
        }
    }
}

/// Whether `imm`, viewed as an unsigned 32-bit value, fits the `imm8m`
/// encoding: an 8-bit value rotated right by an even number of bits.
fn is_valid_imm8m(imm: u32) -> bool {
    for i in 0..16u32 {
        let rot = (i << 1) & 0b11111;
        let cur = imm.rotate_left(rot);
        if cur & !0xffu32 == 0 {
            return true;
        }
    }
    false
}

fn is_valid_opr8m(imm: i32) -> bool {
    is_valid_imm8m(imm as u32)
}

fn is_valid_opr16(imm: i32) -> bool {
    let u = imm as u32;
    u <= 0xffff || is_valid_imm8m(u)
}

fn is_valid_opr12(imm: i32) -> bool {
    let u = imm as u32;
    u <= 0xfff || is_valid_imm8m(u)
}

fn is_valid_opr_sh(imm: i32) -> bool {
    (0..=0b11111).contains(&imm)
}
