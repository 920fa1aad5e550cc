//! Prologue/epilogue synthesis.
//!
//! Grounded on the example backend's `FuncDecoratePass`: scan the
//! finished instruction list for which callee-saved registers (r4-r10)
//! were actually written, whether the function makes any calls, and the
//! total size of in-frame slots, then:
//!
//! - prepend a `push` of every used callee-saved register (plus `lr` if
//!   the function calls out) and rewrite the `bx lr` into a matching
//!   `pop` (substituting `pc` for `lr` so the pop itself returns);
//! - reserve `r11` as the frame pointer whenever any slot exists, and
//!   emit `mov r11, sp` / `sub sp, sp, #size` right after the push;
//! - rebase every positive-offset (incoming stack-argument) slot by the
//!   size of the saved-register area, since those offsets were computed
//!   against the frame boundary before the prologue existed.
//!
//! This crate's slots are always frame-pointer relative (see
//! [`crate::mir::function::SlotAllocator`]), so unlike the original this
//! pass has no separate "stack-pointer-based preserved slot" case to
//! track — only negative in-frame slots and positive incoming-argument
//! slots.

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, SlotId};
use std::collections::HashSet;

const FIRST_CALLEE_SAVED: u32 = RegName::R4 as u32;
const LAST_CALLEE_SAVED: u32 = RegName::R10 as u32;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut used_regs = 0u32;
    let mut has_call = false;
    let mut neg_slot_size: u32 = 0;
    let mut poif_slots: HashSet<SlotId> = HashSet::new();
    let mut ret_pos: Option<usize> = None;

    for (idx, inst) in func.insts.iter().enumerate() {
        if inst.is_call() {
            has_call = true;
            continue;
        }
        if let Some(dest) = inst.dest() {
            log_preserved_reg(dest, &mut used_regs);
        }
        match inst.opcode {
            OpCode::Str | OpCode::Strb => log_slot(inst.srcs()[1], func, &mut neg_slot_size, &mut poif_slots),
            OpCode::Ldr | OpCode::Ldrb => log_slot(inst.srcs()[0], func, &mut neg_slot_size, &mut poif_slots),
            OpCode::Bx if inst.srcs()[0].as_phys() == Some(RegName::Lr) => ret_pos = Some(idx),
            _ => {}
        }
    }

    if has_call {
        used_regs |= 1 << (RegName::Lr as u32);
    }
    if neg_slot_size > 0 || !poif_slots.is_empty() {
        used_regs |= 1 << (RegName::R11 as u32);
    }

    let add_pos_offset = (used_regs.count_ones() * 4) as i32;

    if used_regs != 0 {
        if let Some(pos) = ret_pos {
            func.insts[pos] = make_pop(used_regs);
        }
        func.insts.insert(0, make_push(used_regs));
    }

    if neg_slot_size > 0 {
        let insert_at = if used_regs != 0 { 1 } else { 0 };
        update_sp(func, insert_at, neg_slot_size);
    }

    for slot_id in poif_slots {
        let slot = func.operands.slot(slot_id);
        func.operands.reoffset_slot(slot_id, slot.offset + add_pos_offset);
    }
}

fn log_preserved_reg(op: Operand<RegName>, used_regs: &mut u32) {
    if let Some(r) = op.as_phys() {
        let n = r as u32;
        if (FIRST_CALLEE_SAVED..=LAST_CALLEE_SAVED).contains(&n) {
            *used_regs |= 1 << n;
        }
    }
}

fn log_slot(
    op: Operand<RegName>,
    func: &MirFunction<RegName, Inst>,
    neg_slot_size: &mut u32,
    poif_slots: &mut HashSet<SlotId>,
) {
    let id = match op {
        Operand::Slot(id) => id,
        _ => return,
    };
    let slot = func.operands.slot(id);
    if slot.offset < 0 {
        let size = (-slot.offset) as u32;
        if size > *neg_slot_size {
            *neg_slot_size = size;
        }
    } else {
        poif_slots.insert(id);
    }
}

fn reg_from_bit(bit: u32) -> RegName {
    use RegName::*;
    [R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10, R11, R12, Sp, Lr, Pc][bit as usize]
}

fn make_push(used_regs: u32) -> Inst {
    let regs: Vec<Operand<RegName>> =
        (0..16).filter(|b| used_regs & (1 << b) != 0).map(|b| Operand::Reg(reg_from_bit(b))).collect();
    Inst::new(OpCode::Push, None, &regs)
}

fn make_pop(used_regs: u32) -> Inst {
    let regs: Vec<Operand<RegName>> = (0..16)
        .filter(|b| used_regs & (1 << b) != 0)
        .map(|b| {
            let name = reg_from_bit(b);
            let name = if name == RegName::Lr { RegName::Pc } else { name };
            Operand::Reg(name)
        })
        .collect();
    Inst::new(OpCode::Pop, None, &regs)
}

fn update_sp(func: &mut MirFunction<RegName, Inst>, pos: usize, size: u32) {
    let r11 = Operand::Reg(RegName::R11);
    let sp = Operand::Reg(RegName::Sp);
    let mov = Inst::new(OpCode::Mov, Some(r11), &[sp]);
    let sub = Inst::new(OpCode::Sub, Some(sp), &[sp, Operand::Imm(size as i32)]);
    func.insts.splice(pos..pos, [mov, sub]);
}
