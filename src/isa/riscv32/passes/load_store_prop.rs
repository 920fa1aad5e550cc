//! Load/store propagation.
//!
//! Grounded on the example backend's `LoadStorePropagationPass`. Tracks,
//! per memory location (a slot operand or a bare label reached through a
//! register-only address), the value most recently written or read
//! there. A `lw`/`lb`/`lbu` from a known location either becomes a `mv`
//! from that value, or is erased outright when it would just be a
//! self-move. A store whose address is *not* a tracked slot/label
//! invalidates every tracked location conservatively (the address might
//! alias any of them); a store that redundantly writes the value already
//! known to be there is removed since it has no observable effect.
//! `sw`'s source operand order is `[value, addr]`, the reverse of an ARM
//! `str`'s `[addr, value]`, to match real RV32 assembly syntax.
//!
//! RV32 additionally tracks, per register, which label's address it was
//! last loaded from (`la reg, label`) — a second `lw`/`sw` addressing
//! through that register directly (no intervening `lea`/slot folding)
//! is recognized as accessing the same location the label names, which
//! lets the value-tracking map above key on the label consistently
//! whether reached through a fresh `la` or a register still holding an
//! earlier one. Byte ops (`lb`/`lbu`/`sb`) only ever invalidate or
//! populate entries at the same granularity this pass already tracks at
//! — it keys purely by address operand, so `sb` simply invalidates like
//! any other write rather than modeling partial overlap with a 4-byte
//! entry.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;
use std::collections::HashMap;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut known: HashMap<Operand<RegName>, Operand<RegName>> = HashMap::new();
    let mut labels: HashMap<Operand<RegName>, Operand<RegName>> = HashMap::new();
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        match inst.opcode {
            OpCode::La => {
                let dest = inst.dest().unwrap();
                let label = inst.srcs()[0];
                invalidate_dest(dest, &mut known);
                labels.insert(dest, label);
                out.push(inst);
            }
            OpCode::Lw | OpCode::Lb | OpCode::Lbu => {
                let addr = resolve(inst.srcs()[0], &labels);
                let dest = inst.dest().unwrap();
                let trackable = is_trackable(addr);
                let existing = if trackable { known.get(&addr).copied() } else { None };

                if existing == Some(dest) {
                    invalidate_dest(dest, &mut labels);
                    continue;
                }

                invalidate_dest(dest, &mut known);
                invalidate_dest(dest, &mut labels);
                if trackable {
                    known.insert(addr, dest);
                }

                match existing {
                    Some(value) => out.push(Inst::new(OpCode::Mv, Some(dest), &[value])),
                    None => out.push(inst),
                }
            }
            OpCode::Sw | OpCode::Sb => {
                let value = inst.srcs()[0];
                let addr = resolve(inst.srcs()[1], &labels);
                if is_trackable(addr) {
                    if known.get(&addr).copied() == Some(value) {
                        continue; // already holds this value
                    }
                    known.insert(addr, value);
                } else {
                    known.clear();
                }
                out.push(inst);
            }
            _ => {
                if inst.as_label().is_some() || inst.is_call() {
                    known.clear();
                    labels.clear();
                } else if let Some(dest) = inst.dest() {
                    invalidate_dest(dest, &mut known);
                    invalidate_dest(dest, &mut labels);
                }
                out.push(inst);
            }
        }
    }

    func.insts = out;
}

/// If `addr` is a plain register last loaded from a label via `la`,
/// resolve it to that label so it keys the value map the same way a
/// fresh `la` would.
fn resolve(addr: Operand<RegName>, labels: &HashMap<Operand<RegName>, Operand<RegName>>) -> Operand<RegName> {
    if addr.is_reg() {
        if let Some(&label) = labels.get(&addr) {
            return label;
        }
    }
    addr
}

fn is_trackable(addr: Operand<RegName>) -> bool {
    addr.is_slot() || addr.is_label()
}

fn invalidate_dest(dest: Operand<RegName>, map: &mut HashMap<Operand<RegName>, Operand<RegName>>) {
    map.retain(|&loc, &mut val| loc != dest && val != dest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Linkage;

    #[test]
    fn second_load_from_same_slot_becomes_mv() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let sp = Operand::Reg(RegName::Sp);
        let a0 = Operand::Reg(RegName::A0);
        let a1 = Operand::Reg(RegName::A1);
        let slot = func.operands.get_slot(sp, 0);
        func.insts.push(Inst::new(OpCode::Lw, Some(a0), &[slot]));
        func.insts.push(Inst::new(OpCode::Lw, Some(a1), &[slot]));
        run(&mut func);
        assert_eq!(func.insts.len(), 2);
        assert_eq!(func.insts[1].opcode, OpCode::Mv);
        assert_eq!(func.insts[1].srcs()[0], a0);
    }

    #[test]
    fn redundant_store_of_known_value_is_removed() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let sp = Operand::Reg(RegName::Sp);
        let a0 = Operand::Reg(RegName::A0);
        let slot = func.operands.get_slot(sp, 0);
        func.insts.push(Inst::new(OpCode::Sw, None, &[a0, slot]));
        func.insts.push(Inst::new(OpCode::Sw, None, &[a0, slot]));
        run(&mut func);
        assert_eq!(func.insts.len(), 1);
    }

    #[test]
    fn load_through_register_holding_label_address_is_tracked() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let t0 = Operand::Reg(RegName::T0);
        let a0 = Operand::Reg(RegName::A0);
        let a1 = Operand::Reg(RegName::A1);
        let label = func.operands.get_label("g");
        func.insts.push(Inst::new(OpCode::La, Some(t0), &[label]));
        func.insts.push(Inst::new(OpCode::Lw, Some(a0), &[t0]));
        func.insts.push(Inst::new(OpCode::Lw, Some(a1), &[t0]));
        run(&mut func);
        let last = func.insts.last().unwrap();
        assert_eq!(last.opcode, OpCode::Mv);
        assert_eq!(last.srcs()[0], a0);
    }
}
