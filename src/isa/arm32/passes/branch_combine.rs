//! Fuses a pseudo `SetXX` comparison directly into the pseudo two-target
//! `br` that consumes it, then lowers whatever's left (unfused `br`s and
//! `SetXX`s whose result is used for something other than a branch) into
//! real ARMv7-A instructions.
//!
//! Grounded on the example backend's `BranchCombiningPass`. A `SetXX`
//! def is tracked in a small map until either it's consumed by the very
//! next reachable `br` (folding into `cmp lhs, rhs` plus a pair of
//! branches, picking the inverse condition for the "else" edge) or it's
//! invalidated by a label, a call, or another instruction overwriting
//! one of the registers it reads — the same def/invalidate shape as
//! [`crate::passes::move_prop`].
//!
//! A `SetXX` that survives to the second pass (its value feeds something
//! other than a fused branch) is materialized directly: `seteq` has a
//! flag-free `sub`/`clz`/`lsr` idiom (the zero flag falls out of
//! `clz(lhs - rhs) >> 5`); every other condition is materialized with a
//! `cmp` and a short forward branch around a `mov #1` — this crate has
//! no conditional-move opcode, so unlike the original's `movw<cc>` this
//! uses a real branch instead.

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, VRegId};
use std::collections::HashMap;

struct SetCond {
    op: OpCode,
    lhs: Operand<RegName>,
    rhs: Operand<RegName>,
}

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    combine(func);
    materialize_remaining(func);
}

fn is_setcc(op: OpCode) -> bool {
    matches!(
        op,
        OpCode::SetEq
            | OpCode::SetNe
            | OpCode::SetULt
            | OpCode::SetSLt
            | OpCode::SetULe
            | OpCode::SetSLe
            | OpCode::SetUGt
            | OpCode::SetSGt
            | OpCode::SetUGe
            | OpCode::SetSGe
    )
}

fn combine(func: &mut MirFunction<RegName, Inst>) {
    let mut defs: HashMap<VRegId, SetCond> = HashMap::new();
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        if is_setcc(inst.opcode) {
            let dest = inst.dest().unwrap().as_virtual().unwrap();
            defs.insert(
                dest,
                SetCond { op: inst.opcode, lhs: inst.srcs()[0], rhs: inst.srcs()[1] },
            );
            out.push(inst);
            continue;
        }

        if inst.opcode == OpCode::Br {
            let cond = inst.srcs()[0];
            let tl = inst.srcs()[1];
            let fl = inst.srcs()[2];
            match cond.as_virtual().and_then(|id| defs.get(&id)) {
                Some(setc) => {
                    out.push(Inst::new(OpCode::Cmp, None, &[setc.lhs, setc.rhs]));
                    out.push(Inst::branch(inverse_branch(setc.op), fl));
                    out.push(Inst::branch(OpCode::B, tl));
                }
                None => {
                    out.push(Inst::new(OpCode::Cmp, None, &[cond, Operand::Imm(0)]));
                    out.push(Inst::branch(OpCode::Beq, fl));
                    out.push(Inst::branch(OpCode::B, tl));
                }
            }
            continue;
        }

        if inst.as_label().is_some() || inst.is_call() {
            defs.clear();
        } else if let Some(dest) = inst.dest() {
            if let Some(id) = dest.as_virtual() {
                defs.remove(&id);
            }
            defs.retain(|_, setc| setc.lhs != dest && setc.rhs != dest);
        }

        out.push(inst);
    }

    func.insts = out;
}

fn inverse_branch(setcc: OpCode) -> OpCode {
    match setcc {
        OpCode::SetEq => OpCode::Bne,
        OpCode::SetNe => OpCode::Beq,
        OpCode::SetULt => OpCode::Bhs,
        OpCode::SetSLt => OpCode::Bge,
        OpCode::SetULe => OpCode::Bhi,
        OpCode::SetSLe => OpCode::Bgt,
        OpCode::SetUGt => OpCode::Bls,
        OpCode::SetSGt => OpCode::Ble,
        OpCode::SetUGe => OpCode::Blo,
        OpCode::SetSGe => OpCode::Blt,
        _ => unreachable!("not a SetXX opcode"),
    }
}

fn materialize_remaining(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        if !is_setcc(inst.opcode) {
            out.push(inst);
            continue;
        }

        let dest = inst.dest().unwrap();
        let lhs = inst.srcs()[0];
        let rhs = inst.srcs()[1];

        let live = dest.as_virtual().map(|id| func.operands.vreg(id).use_count > 1).unwrap_or(true);
        if !live {
            continue;
        }

        if inst.opcode == OpCode::SetEq {
            let temp = Operand::Reg(RegName::R3);
            out.push(Inst::new(OpCode::Sub, Some(temp), &[lhs, rhs]));
            out.push(Inst::new(OpCode::Clz, Some(temp), &[temp]));
            out.push(Inst::new(OpCode::Lsr, Some(dest), &[temp, Operand::Imm(5)]));
        } else {
            let skip = func.operands.new_anon_label();
            out.push(Inst::new(OpCode::Cmp, None, &[lhs, rhs]));
            out.push(Inst::new(OpCode::Mov, Some(dest), &[Operand::Imm(0)]));
            out.push(Inst::branch(inverse_branch(inst.opcode), skip));
            out.push(Inst::new(OpCode::Mov, Some(dest), &[Operand::Imm(1)]));
            out.push(Inst::label(skip));
        }
    }

    func.insts = out;
}
