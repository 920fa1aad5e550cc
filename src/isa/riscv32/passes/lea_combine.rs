//! Folds an address computed by a pseudo `lea` directly into a following
//! `lw`/`lb`/`lbu`/`sw`/`sb`'s address operand, materializes a `lea` of a
//! bare label straight into `la`, and deletes any `lea` whose result
//! turns out dead after that folding.
//!
//! Grounded on the example backend's `LeaCombiningPass`, run after
//! register allocation and slot spilling — every `lea` operand here is
//! already a physical register or a resolved slot, never virtual. A `lea
//! reg, ptr, offset` first absorbs a constant `offset` into `ptr`
//! directly when `ptr` is already a slot or a plain register, tracked as
//! a "reg holds address of this slot" def that a later load/store
//! addressing through that register folds away entirely. Unlike
//! AArch32, a `lea` whose `ptr` is a bare label is eagerly turned into
//! `la dest, label` here rather than left for [`super::lea_elim`] — if a
//! nonzero offset remains after that the `lea`'s `ptr` operand is
//! rewritten to `dest` so the elimination pass still materializes the
//! add.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, OperandPool, SlotId};
use std::collections::HashMap;

const MAX_FOLD_OFFSET: i32 = 2047;

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
                let dest = inst.dest().unwrap();
                invalidate(dest, &mut slots, &mut uses);

                if let Operand::Label(_) = inst.srcs()[0] {
                    materialize_label(&inst, &mut out);
                    continue;
                }

                simplify_lea(&mut inst, &mut func.operands);
                add_slot_def(&inst, &func.operands, &mut slots, &mut uses);
                out.push(inst);
                continue;
            }
            OpCode::Lw | OpCode::Lb | OpCode::Lbu => {
                if let Some(&id) = slots.get(&inst.srcs()[0]) {
                    inst.srcs_mut()[0] = Operand::Slot(id);
                }
                let dest = inst.dest().unwrap();
                invalidate(dest, &mut slots, &mut uses);
            }
            OpCode::Sw | OpCode::Sb => {
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

/// A `lea` whose base pointer is a bare label loads straight into `la
/// dest, label`, with any remaining constant offset folded in as a
/// trailing `addi` — eager materialization that the generic elimination
/// pass would otherwise defer to a `movw`/`movt`-style sequence.
fn materialize_label(inst: &Inst, out: &mut Vec<Inst>) {
    let label = inst.srcs()[0];
    let offset = inst.srcs()[1];
    let dest = inst.dest().unwrap();

    out.push(Inst::new(OpCode::La, Some(dest), &[label]));
    if offset.as_imm() != Some(0) {
        out.push(Inst::new(OpCode::Addi, Some(dest), &[dest, offset]));
    }
}

/// Fold a constant offset into `ptr` when possible, leaving `offset` at
/// `0` so the caller can treat any still-nonzero offset as "needs real
/// materialization" in [`super::lea_elim`].
fn simplify_lea(inst: &mut Inst, pool: &mut OperandPool<RegName>) {
    if inst.opcode != OpCode::Lea {
        return;
    }
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
    pool: &OperandPool<RegName>,
    slots: &mut HashMap<Operand<RegName>, SlotId>,
    uses: &mut HashMap<Operand<RegName>, Vec<Operand<RegName>>>,
) {
    if inst.opcode != OpCode::Lea {
        return;
    }
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

/// A second forward sweep removing `lea`s whose destination nothing
/// reads. Leaves `a0`-`a7` alone since those may carry an outgoing call
/// argument never re-read as an explicit operand.
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
    use RegName::*;
    matches!(op.as_phys(), Some(A0 | A1 | A2 | A3 | A4 | A5 | A6 | A7))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Linkage;

    #[test]
    fn bare_label_lea_becomes_la_with_no_trailing_addi() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let dest = Operand::Reg(RegName::T0);
        let label = func.operands.get_label("g");
        func.insts.push(Inst::new(OpCode::Lea, Some(dest), &[label, Operand::Imm(0)]));
        func.insts.push(Inst::new(OpCode::Lw, Some(dest), &[dest]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::La);
        assert_eq!(func.insts[0].srcs().len(), 1);
    }

    #[test]
    fn offset_label_lea_gets_trailing_addi() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let dest = Operand::Reg(RegName::T0);
        let label = func.operands.get_label("g");
        func.insts.push(Inst::new(OpCode::Lea, Some(dest), &[label, Operand::Imm(4)]));
        func.insts.push(Inst::new(OpCode::Lw, Some(dest), &[dest]));
        run(&mut func);
        assert_eq!(func.insts[0].opcode, OpCode::La);
        assert_eq!(func.insts[1].opcode, OpCode::Addi);
        assert_eq!(func.insts[1].srcs()[1], Operand::Imm(4));
    }

    #[test]
    fn lea_of_slot_folds_into_following_load_and_dies() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let sp = Operand::Reg(RegName::Sp);
        let dest = Operand::Reg(RegName::T0);
        let slot = func.operands.get_slot(sp, 8);
        func.insts.push(Inst::new(OpCode::Lea, Some(dest), &[slot, Operand::Imm(0)]));
        func.insts.push(Inst::new(OpCode::Lw, Some(dest), &[dest]));
        func.insts.push(Inst::new(OpCode::Ret, None, &[]));
        run(&mut func);
        assert!(!func.insts.iter().any(|i| i.opcode == OpCode::Lea));
        let load = func.insts.iter().find(|i| i.opcode == OpCode::Lw).unwrap();
        assert!(load.srcs()[0].is_slot());
    }
}
