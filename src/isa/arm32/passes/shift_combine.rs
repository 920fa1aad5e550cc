//! Folds a `lsl`/`lsr`/`asr` by an immediate into the flex-operand slot
//! of a following instruction, instead of materializing the shifted
//! value into its own register first.
//!
//! Grounded on the example backend's `ShiftCombiningPass`. A tracked
//! shift def is applied to the *last* source operand of `sub`, `subs`,
//! `rsb`, `cmp`, `mvn` and `lea` (its offset slot) directly; for the
//! commutative `add`/`and`/`orr`/`eor` the operands are tried in both
//! orders, since the shifted operand may legally appear in either
//! position. Defs are invalidated exactly like
//! [`crate::passes::move_prop`]. A final sweep drops any shift
//! instruction left with an unread (dead) destination once every use
//! has been folded away.

use crate::isa::arm32::inst::{Inst, OpCode, ShiftOp};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;
use std::collections::HashMap;

#[derive(Clone, Copy)]
struct ShiftInfo {
    base: Operand<RegName>,
    op: ShiftOp,
    amt: u8,
}

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut defs: HashMap<Operand<RegName>, ShiftInfo> = HashMap::new();
    let mut uses: HashMap<Operand<RegName>, Vec<Operand<RegName>>> = HashMap::new();

    for inst in func.insts.iter_mut() {
        if inst.as_label().is_some() || inst.is_call() {
            defs.clear();
            uses.clear();
            continue;
        }

        match inst.opcode {
            OpCode::Lsl | OpCode::Lsr | OpCode::Asr => {
                let dest = inst.dest().unwrap();
                invalidate(dest, &mut defs, &mut uses);
                log_shift(inst, &mut defs, &mut uses);
            }
            OpCode::Add | OpCode::And | OpCode::Orr | OpCode::Eor => {
                if !apply_shift(inst, 1, &defs) {
                    inst.srcs_mut().swap(0, 1);
                    apply_shift(inst, 1, &defs);
                }
                let dest = inst.dest().unwrap();
                invalidate(dest, &mut defs, &mut uses);
            }
            OpCode::Sub | OpCode::Subs | OpCode::Rsb | OpCode::Cmp | OpCode::Mvn => {
                let last = inst.srcs().len() - 1;
                apply_shift(inst, last, &defs);
                if let Some(dest) = inst.dest() {
                    invalidate(dest, &mut defs, &mut uses);
                }
            }
            OpCode::Lea => {
                apply_shift(inst, 1, &defs);
            }
            _ => {
                if let Some(dest) = inst.dest() {
                    if dest.is_virtual() {
                        invalidate(dest, &mut defs, &mut uses);
                    }
                }
            }
        }
    }

    func.insts.retain(|inst| {
        if matches!(inst.opcode, OpCode::Lsl | OpCode::Lsr | OpCode::Asr) {
            let dest = inst.dest().unwrap();
            !(dest.is_virtual() && func.operands.vreg(dest.as_virtual().unwrap()).use_count <= 1)
        } else {
            true
        }
    });
}

fn log_shift(
    inst: &Inst,
    defs: &mut HashMap<Operand<RegName>, ShiftInfo>,
    uses: &mut HashMap<Operand<RegName>, Vec<Operand<RegName>>>,
) {
    let dest = inst.dest().unwrap();
    let base = inst.srcs()[0];
    if dest == base {
        return;
    }
    let amt = match inst.srcs()[1].as_imm() {
        Some(amt) => amt as u8,
        None => return,
    };
    let op = match inst.opcode {
        OpCode::Lsl => ShiftOp::Lsl,
        OpCode::Lsr => ShiftOp::Lsr,
        OpCode::Asr => ShiftOp::Asr,
        _ => unreachable!(),
    };
    defs.insert(dest, ShiftInfo { base, op, amt });
    uses.entry(base).or_default().push(dest);
}

fn apply_shift(inst: &mut Inst, idx: usize, defs: &HashMap<Operand<RegName>, ShiftInfo>) -> bool {
    let opr = inst.srcs()[idx];
    match defs.get(&opr) {
        Some(info) => {
            inst.srcs_mut()[idx] = info.base;
            inst.shift_op = info.op;
            inst.shift_amt = info.amt;
            true
        }
        None => false,
    }
}

fn invalidate(
    reg: Operand<RegName>,
    defs: &mut HashMap<Operand<RegName>, ShiftInfo>,
    uses: &mut HashMap<Operand<RegName>, Vec<Operand<RegName>>>,
) {
    defs.remove(&reg);
    if let Some(dependents) = uses.remove(&reg) {
        for dest in dependents {
            defs.remove(&dest);
        }
    }
}
