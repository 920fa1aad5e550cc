//! Applies register-allocation results and inserts loads/stores for
//! virtual registers that were spilled to a stack slot.
//!
//! Grounded on the example backend's `SlotSpillingPass`, same overall
//! shape as [`crate::isa::arm32::passes::slot_spill`]: a spilled move
//! source folds into one `lw`; every other spilled source gets a scratch
//! load selected from `t0`-`t2` avoiding the instruction's other physical
//! operands; a spilled destination stores back through `t0`. A slot
//! offset at or past RV32's 12-bit signed immediate range is materialized
//! into a scratch register with an `addi` first (`t1` for a spilled
//! source load, `t0` is already the destination-store scratch).

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::{RegName, FP};
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, OperandPool, SlotId};

const MAX_IMM_OFFSET: i32 = 2048;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        let mut inst = inst;

        if inst.is_move() && inst.srcs()[0].is_virtual() {
            let src = inst.srcs()[0];
            let alloc_to = func.operands.alloc_to(src);
            if alloc_to.is_slot() {
                let dest = inst.dest().unwrap();
                emit_load(&mut out, &func.operands, slot_id_of(alloc_to), dest);
                inst = out.pop().unwrap();
            } else {
                inst.srcs_mut()[0] = alloc_to;
            }
        } else if !inst.is_move() {
            let mut used = reg_mask(&inst);
            for src in inst.srcs_mut() {
                if !src.is_virtual() {
                    continue;
                }
                let alloc_to = func.operands.alloc_to(*src);
                if alloc_to.is_reg() {
                    *src = alloc_to;
                } else if alloc_to.is_slot() {
                    let temp = select_temp_reg(&mut used);
                    emit_load(&mut out, &func.operands, slot_id_of(alloc_to), Operand::Reg(temp));
                    *src = Operand::Reg(temp);
                }
            }
        }

        if let Some(dest) = inst.dest() {
            if dest.is_virtual() {
                let alloc_to = func.operands.alloc_to(dest);
                if alloc_to.is_reg() {
                    inst.set_dest(alloc_to);
                    out.push(inst);
                } else if alloc_to.is_slot() {
                    let temp = Operand::Reg(RegName::T0);
                    inst.set_dest(temp);
                    out.push(inst);
                    emit_store(&mut out, &func.operands, slot_id_of(alloc_to), temp);
                }
                continue;
            }
        }

        out.push(inst);
    }

    func.insts = out;
}

fn slot_id_of<R: crate::mir::operand::Register>(op: Operand<R>) -> SlotId {
    match op {
        Operand::Slot(id) => id,
        _ => unreachable!("caller guarantees a slot operand"),
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
    for bit in RegName::T0 as u32..=RegName::T2 as u32 {
        if mask & (1 << bit) == 0 {
            *mask |= 1 << bit;
            return [RegName::T0, RegName::T1, RegName::T2][(bit - RegName::T0 as u32) as usize];
        }
    }
    unreachable!("instruction exhausted every spill-load scratch register")
}

/// Push the load(s) needed to read the spilled slot `slot_id` into
/// `dest`, which may itself still be a virtual register — the caller's
/// shared destination-handling step resolves it afterward.
fn emit_load(out: &mut Vec<Inst>, pool: &OperandPool<RegName>, slot_id: SlotId, dest: Operand<RegName>) {
    let slot = pool.slot(slot_id);
    if slot.offset.abs() >= MAX_IMM_OFFSET {
        let temp = if dest.is_virtual() { Operand::Reg(RegName::T1) } else { dest };
        out.push(Inst::new(OpCode::Addi, Some(temp), &[Operand::Reg(FP), Operand::Imm(slot.offset)]));
        out.push(Inst::new(OpCode::Lw, Some(dest), &[temp]));
    } else {
        out.push(Inst::new(OpCode::Lw, Some(dest), &[Operand::Slot(slot_id)]));
    }
}

fn emit_store(out: &mut Vec<Inst>, pool: &OperandPool<RegName>, slot_id: SlotId, src: Operand<RegName>) {
    let slot = pool.slot(slot_id);
    if slot.offset.abs() >= MAX_IMM_OFFSET {
        let temp = Operand::Reg(RegName::T1);
        out.push(Inst::new(OpCode::Addi, Some(temp), &[Operand::Reg(FP), Operand::Imm(slot.offset)]));
        out.push(Inst::new(OpCode::Sw, None, &[src, temp]));
    } else {
        out.push(Inst::new(OpCode::Sw, None, &[src, Operand::Slot(slot_id)]));
    }
}
