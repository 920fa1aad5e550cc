//! Folds an address computed by a pseudo `lea` directly into a following
//! `ldr`/`str`'s address operand, and deletes any `lea` whose result
//! turns out to be dead after that folding.
//!
//! Grounded on the example backend's `LeaCombiningPass`, run after
//! register allocation and slot spilling (so every `lea` operand is
//! already a physical register or a resolved slot, never virtual). A
//! `lea reg, ptr, offset` first absorbs a constant `offset` into `ptr`
//! directly when `ptr` is already a slot or a plain register — producing
//! a new slot operand in place of computing an address at runtime — and
//! is tracked as a "reg holds address of this slot" def; a later
//! `ldr`/`str` addressing through that register is rewritten to address
//! the slot directly instead. Defs are invalidated the same way as
//! [`crate::passes::move_prop`]: on a label, a call, or a write to the
//! register the def lives in or the register its slot is based on.
//!
//! This crate does not port the original's extra optimization of fusing
//! a `lea` of a global label straight into the following load (that
//! path is simplified away — [`super::lea_elim`] materializes every
//! surviving `lea` uniformly instead).

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, SlotId};
use std::collections::HashMap;

const MAX_FOLD_OFFSET: i32 = 4095;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    combine(func);
    remove_dead_leas(func);
}

fn combine(func: &mut MirFunction<RegName, Inst>) {
    let mut slots: HashMap<Operand<RegName>, SlotId> = HashMap::new();
    let mut uses: HashMap<Operand<RegName>, Vec<Operand<RegName>>> = HashMap::new();
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        let mut inst = inst;

        match inst.opcode {
            OpCode::Lea => {
                simplify_lea(&mut inst, &mut func.operands);
                let dest = inst.dest().unwrap();
                invalidate(dest, &mut slots, &mut uses);
                add_slot_def(&inst, &func.operands, &mut slots, &mut uses);
                out.push(inst);
                continue;
            }
            OpCode::Ldr | OpCode::Ldrb => {
                if let Some(&id) = slots.get(&inst.srcs()[0]) {
                    inst.srcs_mut()[0] = Operand::Slot(id);
                }
                let dest = inst.dest().unwrap();
                invalidate(dest, &mut slots, &mut uses);
            }
            OpCode::Str | OpCode::Strb => {
                if let Some(&id) = slots.get(&inst.srcs()[1]) {
                    inst.srcs_mut()[1] = Operand::Slot(id);
                }
            }
            _ => {
                if inst.as_label().is_some() || inst.is_call() {
                    slots.clear();
                    uses.clear();
                } else if let Some(dest) = inst.dest() {
                    invalidate(dest, &mut slots, &mut uses);
                }
            }
        }

        out.push(inst);
    }

    func.insts = out;
}

/// Fold a constant offset into `ptr` when possible, leaving `offset` at
/// `#0` so the caller can treat any still-nonzero offset as "needs
/// real materialization" in [`super::lea_elim`].
fn simplify_lea(inst: &mut Inst, pool: &mut crate::mir::operand::OperandPool<RegName>) {
    let ptr = inst.srcs()[0];
    let offset = inst.srcs()[1];
    let imm = match offset.as_imm() {
        Some(0) | None => return,
        Some(imm) => imm,
    };

    if let Operand::Slot(id) = ptr {
        let slot = pool.slot(id);
        let new_slot = pool.get_slot(slot.base, slot.offset + imm);
        inst.srcs_mut()[0] = new_slot;
        inst.srcs_mut()[1] = Operand::Imm(0);
    } else if ptr.is_reg() {
        let new_slot = pool.get_slot(ptr, imm);
        inst.srcs_mut()[0] = new_slot;
        inst.srcs_mut()[1] = Operand::Imm(0);
    }
}

fn add_slot_def(
    inst: &Inst,
    pool: &crate::mir::operand::OperandPool<RegName>,
    slots: &mut HashMap<Operand<RegName>, SlotId>,
    uses: &mut HashMap<Operand<RegName>, Vec<Operand<RegName>>>,
) {
    let dest = inst.dest().unwrap();
    let ptr = inst.srcs()[0];
    let id = match ptr {
        Operand::Slot(id) => id,
        _ => return,
    };
    let slot = pool.slot(id);
    if slot.offset > MAX_FOLD_OFFSET || slot.offset < -MAX_FOLD_OFFSET {
        return;
    }
    slots.insert(dest, id);
    uses.entry(slot.base).or_default().push(dest);
}

fn invalidate(
    reg: Operand<RegName>,
    slots: &mut HashMap<Operand<RegName>, SlotId>,
    uses: &mut HashMap<Operand<RegName>, Vec<Operand<RegName>>>,
) {
    slots.remove(&reg);
    if let Some(dependents) = uses.remove(&reg) {
        for dest in dependents {
            slots.remove(&dest);
        }
    }
}

/// A second forward sweep: a `lea`'s destination is dead if nothing
/// reads it before it's either overwritten or the function ends — the
/// combining pass above may have folded away every read that would
/// otherwise have consumed it. Leaves `r0`-`r3` alone since those may
/// carry an outgoing call argument that this representation doesn't
/// re-read as an explicit operand.
fn remove_dead_leas(func: &mut MirFunction<RegName, Inst>) {
    let mut pending: HashMap<Operand<RegName>, usize> = HashMap::new();
    let mut dead: Vec<usize> = Vec::new();

    for (idx, inst) in func.insts.iter().enumerate() {
        for src in inst.srcs() {
            pending.remove(src);
        }
        if let Some(dest) = inst.dest() {
            if let Some(prev_idx) = pending.remove(&dest) {
                dead.push(prev_idx);
            }
        }
        if inst.opcode == OpCode::Lea {
            let dest = inst.dest().unwrap();
            if !is_reserved_arg_reg(dest) {
                pending.insert(dest, idx);
            }
        }
    }
    dead.extend(pending.values().copied());
    dead.sort_unstable();
    dead.dedup();

    for idx in dead.into_iter().rev() {
        func.insts.remove(idx);
    }
}

fn is_reserved_arg_reg(op: Operand<RegName>) -> bool {
    matches!(op.as_phys(), Some(RegName::R0 | RegName::R1 | RegName::R2 | RegName::R3))
}
