//! Fuses a pseudo `SetXX` comparison directly into the pseudo two-target
//! `br` that consumes it, then lowers whatever's left (unfused `br`s and
//! `SetXX`s whose result is used for something other than a branch) into
//! real RV32I instructions.
//!
//! Grounded on the example backend's `BranchCombiningPass`, same def/use
//! tracking shape as [`crate::isa::arm32::passes::branch_combine`]. A
//! `SetXX` def is tracked until either it's consumed by the very next
//! reachable `br` — folding into `bxx lhs, rhs, falseLabel` plus `j
//! trueLabel`, picking the inverse condition — or invalidated by a label,
//! a call, or a write to one of the registers it reads. A fallback `br`
//! whose condition isn't a tracked `SetXX` lowers to `beqz cond,
//! falseLabel` / `j trueLabel` instead.
//!
//! A `SetXX` that survives to materialize (its value feeds something
//! other than a fused branch, and is used at least once) is built from
//! real comparison instructions: `sltu`/`slt` cover `<`/`>` directly
//! (swapping operands for `>`), `==`/`!=` go through `xor` + `seqz`/
//! `snez`, and `<=`/`>=` flip a `sltu`/`slt` result with `xori _, 1`. The
//! scratch register these sequences share is `a0`, matching the original.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, VRegId};
use std::collections::HashMap;

const SCRATCH: RegName = RegName::A0;

struct SetCond {
    op: OpCode,
    lhs: Operand<RegName>,
    rhs: Operand<RegName>,
}

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    combine(func);
    materialize_remaining(func);
}

fn combine(func: &mut MirFunction<RegName, Inst>) {
    let mut defs: HashMap<VRegId, SetCond> = HashMap::new();
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        if inst.opcode.is_set_cc() {
            let dest = inst.dest().unwrap().as_virtual().unwrap();
            defs.insert(dest, SetCond { op: inst.opcode, lhs: inst.srcs()[0], rhs: inst.srcs()[1] });
            out.push(inst);
            continue;
        }

        if inst.opcode == OpCode::Br {
            let cond = inst.srcs()[0];
            let tl = inst.srcs()[1];
            let fl = inst.srcs()[2];
            match cond.as_virtual().and_then(|id| defs.get(&id)) {
                Some(setc) => {
                    out.push(Inst::cond_branch(inverse_branch(setc.op), setc.lhs, setc.rhs, fl));
                    out.push(Inst::jump(tl));
                }
                None => {
                    out.push(Inst::branch_if_zero(cond, fl));
                    out.push(Inst::jump(tl));
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
    use OpCode::*;
    match setcc {
        SetEq => Bne,
        SetNe => Beq,
        SetULt => Bgeu,
        SetSLt => Bge,
        SetULe => Bgtu,
        SetSLe => Bgt,
        SetUGt => Bleu,
        SetSGt => Ble,
        SetUGe => Bltu,
        SetSGe => Blt,
        _ => unreachable!("not a SetXX opcode"),
    }
}

fn materialize_remaining(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        if !inst.opcode.is_set_cc() {
            out.push(inst);
            continue;
        }

        let dest = inst.dest().unwrap();
        let lhs = inst.srcs()[0];
        let rhs = inst.srcs()[1];

        let live = dest.as_virtual().map(|id| func.operands.vreg(id).use_count > 0).unwrap_or(true);
        if !live {
            continue;
        }

        let temp = Operand::Reg(SCRATCH);
        match inst.opcode {
            OpCode::SetEq => {
                out.push(Inst::new(OpCode::Xor, Some(temp), &[lhs, rhs]));
                out.push(Inst::new(OpCode::Seqz, Some(dest), &[temp]));
            }
            OpCode::SetNe => {
                out.push(Inst::new(OpCode::Xor, Some(temp), &[lhs, rhs]));
                out.push(Inst::new(OpCode::Snez, Some(dest), &[temp]));
            }
            OpCode::SetULt => {
                out.push(Inst::new(OpCode::Sltu, Some(dest), &[lhs, rhs]));
            }
            OpCode::SetSLt => {
                out.push(Inst::new(OpCode::Slt, Some(dest), &[lhs, rhs]));
            }
            OpCode::SetULe => {
                out.push(Inst::new(OpCode::Sltu, Some(temp), &[rhs, lhs]));
                out.push(Inst::new(OpCode::Xori, Some(dest), &[temp, Operand::Imm(1)]));
            }
            OpCode::SetSLe => {
                out.push(Inst::new(OpCode::Slt, Some(temp), &[rhs, lhs]));
                out.push(Inst::new(OpCode::Xori, Some(dest), &[temp, Operand::Imm(1)]));
            }
            OpCode::SetUGt => {
                out.push(Inst::new(OpCode::Sltu, Some(dest), &[rhs, lhs]));
            }
            OpCode::SetSGt => {
                out.push(Inst::new(OpCode::Slt, Some(dest), &[rhs, lhs]));
            }
            OpCode::SetUGe => {
                out.push(Inst::new(OpCode::Sltu, Some(temp), &[lhs, rhs]));
                out.push(Inst::new(OpCode::Xori, Some(dest), &[temp, Operand::Imm(1)]));
            }
            OpCode::SetSGe => {
                out.push(Inst::new(OpCode::Slt, Some(temp), &[lhs, rhs]));
                out.push(Inst::new(OpCode::Xori, Some(dest), &[temp, Operand::Imm(1)]));
            }
            _ => unreachable!("not a SetXX opcode"),
        }
    }

    func.insts = out;
}
