//! Applies register-allocation results and inserts loads/stores for
//! virtual registers that were spilled to a stack slot.
//!
//! Grounded on the example backend's `SlotSpillingPass`: a move whose
//! spilled source can be satisfied by loading straight into the move's
//! own destination folds the load and the move into one `ldr` (the
//! resulting load still runs through the same destination-handling step
//! applied to every other instruction, exactly as the original falls
//! through to it after erasing the move); every other spilled source
//! gets a fresh scratch load just before the instruction that reads it,
//! preferring `r12` and falling back to `r3` when `r12` is already one
//! of the instruction's other operands; a spilled destination gets a
//! scratch store through `r12` just after.
//!
//! A slot offset at or past the 12-bit AArch32 immediate-offset range is
//! materialized into a scratch register with a `sub` first.

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::{RegName, FP};
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, OperandPool, SlotId};

const MAX_IMM_OFFSET: i32 = 4096;

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
                    let temp = Operand::Reg(RegName::R12);
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

/// Bitmask (by `RegName` discriminant) of physical registers this
/// instruction's source operands already occupy, so a scratch load
/// doesn't clobber a register the instruction also reads directly.
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
    if mask & (1 << (RegName::R12 as u32)) == 0 {
        *mask |= 1 << (RegName::R12 as u32);
        RegName::R12
    } else {
        *mask |= 1 << (RegName::R3 as u32);
        RegName::R3
    }
}

/// Push the load(s) needed to read the spilled slot `slot_id` into
/// `dest`, which may itself still be a virtual register — the caller's
/// shared destination-handling step resolves it afterward.
fn emit_load(out: &mut Vec<Inst>, pool: &OperandPool<RegName>, slot_id: SlotId, dest: Operand<RegName>) {
    let slot = pool.slot(slot_id);
    if -slot.offset >= MAX_IMM_OFFSET {
        let temp = if dest.is_virtual() { Operand::Reg(RegName::R3) } else { dest };
        out.push(Inst::new(OpCode::Sub, Some(temp), &[Operand::Reg(FP), Operand::Imm(-slot.offset)]));
        out.push(Inst::new(OpCode::Ldr, Some(dest), &[temp]));
    } else {
        out.push(Inst::new(OpCode::Ldr, Some(dest), &[Operand::Slot(slot_id)]));
    }
}

fn emit_store(out: &mut Vec<Inst>, pool: &OperandPool<RegName>, slot_id: SlotId, src: Operand<RegName>) {
    let slot = pool.slot(slot_id);
    if -slot.offset >= MAX_IMM_OFFSET {
        let temp = Operand::Reg(RegName::R3);
        out.push(Inst::new(OpCode::Sub, Some(temp), &[Operand::Reg(FP), Operand::Imm(-slot.offset)]));
        out.push(Inst::new(OpCode::Str, None, &[src, temp]));
    } else {
        out.push(Inst::new(OpCode::Str, None, &[src, Operand::Slot(slot_id)]));
    }
}
