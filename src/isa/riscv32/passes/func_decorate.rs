//! Prologue/epilogue synthesis.
//!
//! Grounded on the example backend's `FuncDecoratePass`. Unlike AArch32,
//! RV32 has two distinct kinds of stack-relative slot to account for: the
//! frame-pointer-based in-frame slots (`alloca`s and register spills,
//! always negative offset) and the stack-pointer-based slots the selector
//! emits for outgoing call arguments past the eighth (always positive,
//! non-negative offset — see `Selector::generate_on`'s `Call` arm). Both
//! contribute to the total frame size the prologue reserves; only the
//! frame-pointer-based *positive*-offset slots (incoming stack arguments)
//! need rebasing once the saved-register area's size is known, since
//! stack-pointer-based slots are already measured from the post-prologue
//! stack pointer.
//!
//! If the function never uses a negative in-frame slot at all (no
//! allocas, no spills — only a flat SP-relative outgoing-argument area,
//! or no stack usage whatsoever), there is no stable frame-pointer value
//! to anchor an incoming-argument slot against, so every would-be
//! FP-based positive slot is rewritten to be SP-based instead, exactly as
//! the original's pass does.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, SlotId};
use std::collections::HashSet;

const FIRST_CALLEE_SAVED: u32 = RegName::S1 as u32;
const LAST_CALLEE_SAVED: u32 = RegName::S11 as u32;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut used_regs: HashSet<RegName> = HashSet::new();
    let mut has_call = false;
    let mut neg_slot_size: u32 = 0;
    let mut preserved_slot_size: u32 = 0;
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
            OpCode::Sw | OpCode::Sb => {
                log_slot(inst.srcs()[1], func, &mut neg_slot_size, &mut preserved_slot_size, &mut poif_slots)
            }
            OpCode::Lw | OpCode::Lb | OpCode::Lbu => {
                log_slot(inst.srcs()[0], func, &mut neg_slot_size, &mut preserved_slot_size, &mut poif_slots)
            }
            OpCode::Ret => ret_pos = Some(idx),
            _ => {}
        }
    }

    if has_call {
        used_regs.insert(RegName::Ra);
    }
    // The frame pointer is only worth establishing when there's a real
    // negative-offset in-frame area (allocas, spills) to anchor it to —
    // a purely SP-relative outgoing-argument area needs no separate base.
    let has_frame = neg_slot_size > 0;
    if has_frame {
        used_regs.insert(RegName::Fp);
    }
    let slot_size = neg_slot_size + preserved_slot_size;

    let saved_size = (used_regs.len() * 4) as u32;
    let total = saved_size + slot_size;

    if !used_regs.is_empty() {
        if let Some(pos) = ret_pos {
            let pop = make_pop(func, &used_regs, saved_size, slot_size);
            func.insts.splice(pos..pos, pop);
        }
        let push = make_push(func, &used_regs, saved_size, slot_size, has_frame);
        func.insts.splice(0..0, push);
    }

    if has_frame {
        // `fp` sits at `sp + slot_size`, exactly where the slot
        // allocator's offset-0 reference point was, so incoming
        // positive-offset slots shift by the saved-register area alone.
        for slot_id in poif_slots {
            let slot = func.operands.slot(slot_id);
            func.operands.reoffset_slot(slot_id, slot.offset + saved_size as i32);
        }
    } else {
        // No stable frame: incoming args are reinterpreted as SP-based,
        // shifted by the full amount the prologue moved `sp` down by.
        let sp = Operand::Reg(RegName::Sp);
        for slot_id in poif_slots {
            let slot = func.operands.slot(slot_id);
            rewrite_base(func, slot_id, sp, slot.offset + total as i32);
        }
    }
}

fn log_preserved_reg(op: Operand<RegName>, used_regs: &mut HashSet<RegName>) {
    if let Some(r) = op.as_phys() {
        let n = r as u32;
        if (FIRST_CALLEE_SAVED..=LAST_CALLEE_SAVED).contains(&n) {
            used_regs.insert(r);
        }
    }
}

fn log_slot(
    op: Operand<RegName>,
    func: &MirFunction<RegName, Inst>,
    neg_slot_size: &mut u32,
    preserved_slot_size: &mut u32,
    poif_slots: &mut HashSet<SlotId>,
) {
    let id = match op {
        Operand::Slot(id) => id,
        _ => return,
    };
    let slot = func.operands.slot(id);
    match slot.base.as_phys() {
        Some(RegName::Fp) => {
            if slot.offset < 0 {
                let size = (-slot.offset) as u32;
                if size > *neg_slot_size {
                    *neg_slot_size = size;
                }
            } else {
                poif_slots.insert(id);
            }
        }
        Some(RegName::Sp) => {
            let size = (slot.offset + 4) as u32;
            if size > *preserved_slot_size {
                *preserved_slot_size = size;
            }
        }
        _ => {}
    }
}

/// Rewrite a slot's base register (used only when the function has no
/// stable frame pointer and its incoming-argument slots must be
/// reinterpreted as stack-pointer relative).
fn rewrite_base(func: &mut MirFunction<RegName, Inst>, old: SlotId, new_base: Operand<RegName>, new_offset: i32) {
    let new_slot = func.operands.get_slot(new_base, new_offset);
    for inst in func.insts.iter_mut() {
        for src in inst.srcs_mut() {
            if *src == Operand::Slot(old) {
                *src = new_slot;
            }
        }
    }
}

fn make_push(
    func: &mut MirFunction<RegName, Inst>,
    used_regs: &HashSet<RegName>,
    saved_size: u32,
    slot_size: u32,
    has_frame: bool,
) -> Vec<Inst> {
    let sp = Operand::Reg(RegName::Sp);
    let total = saved_size + slot_size;
    let mut out = Vec::new();
    if total > 0 {
        out.push(Inst::new(OpCode::Addi, Some(sp), &[sp, Operand::Imm(-(total as i32))]));
    }
    for (i, &reg) in ordered(used_regs).iter().enumerate() {
        let slot = func.operands.get_slot(sp, (slot_size + (i as u32) * 4) as i32);
        out.push(Inst::new(OpCode::Sw, None, &[Operand::Reg(reg), slot]));
    }
    if has_frame {
        let fp = Operand::Reg(RegName::Fp);
        out.push(Inst::new(OpCode::Addi, Some(fp), &[sp, Operand::Imm(slot_size as i32)]));
    }
    out
}

fn make_pop(func: &mut MirFunction<RegName, Inst>, used_regs: &HashSet<RegName>, saved_size: u32, slot_size: u32) -> Vec<Inst> {
    let sp = Operand::Reg(RegName::Sp);
    let total = saved_size + slot_size;
    let mut out = Vec::new();
    for (i, &reg) in ordered(used_regs).iter().enumerate() {
        let slot = func.operands.get_slot(sp, (slot_size + (i as u32) * 4) as i32);
        out.push(Inst::new(OpCode::Lw, Some(Operand::Reg(reg)), &[slot]));
    }
    if total > 0 {
        out.push(Inst::new(OpCode::Addi, Some(sp), &[sp, Operand::Imm(total as i32)]));
    }
    out
}

fn ordered(regs: &HashSet<RegName>) -> Vec<RegName> {
    let mut v: Vec<RegName> = regs.iter().copied().collect();
    v.sort_by_key(|r| *r as u32);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Linkage;

    #[test]
    fn leaf_function_with_no_callee_saved_use_gets_no_prologue() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a0 = Operand::Reg(RegName::A0);
        func.insts.push(Inst::new(OpCode::Addi, Some(a0), &[a0, Operand::Imm(1)]));
        func.insts.push(Inst::new(OpCode::Ret, None, &[]));
        run(&mut func);
        assert!(!func.insts.iter().any(|i| i.opcode == OpCode::Addi && i.dest() == Some(Operand::Reg(RegName::Sp))));
    }

    #[test]
    fn alloca_slot_establishes_a_frame_pointer() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let fp = Operand::Reg(RegName::Fp);
        let s1 = Operand::Reg(RegName::S1);
        let slot = func.operands.get_slot(fp, -8);
        func.insts.push(Inst::new(OpCode::Sw, None, &[s1, slot]));
        func.insts.push(Inst::new(OpCode::Ret, None, &[]));
        run(&mut func);
        let sets_fp = func.insts.iter().any(|i| i.opcode == OpCode::Addi && i.dest() == Some(fp));
        assert!(sets_fp, "a function with a real in-frame slot must establish fp");
    }

    #[test]
    fn sp_only_outgoing_args_get_no_frame_pointer() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let sp = Operand::Reg(RegName::Sp);
        let s1 = Operand::Reg(RegName::S1);
        let slot = func.operands.get_slot(sp, 0);
        func.insts.push(Inst::new(OpCode::Sw, None, &[s1, slot]));
        func.insts.push(Inst::new(OpCode::Ret, None, &[]));
        run(&mut func);
        let sets_fp = func.insts.iter().any(|i| i.dest() == Some(Operand::Reg(RegName::Fp)));
        assert!(!sets_fp, "outgoing-argument space alone must not establish fp");
    }
}
