//! Materializes every surviving pseudo `lea reg, ptr, offset` into real
//! ARMv7-A instructions.
//!
//! Grounded on the example backend's `LeaEliminationPass`. `ptr` is
//! either a slot (load the frame-relative base, then add/subtract the
//! slot's own offset), a label (load its address with `movw`/`movt`), or
//! a plain register (just a `mov`). If `offset` isn't immediate zero, a
//! final `add dest, temp, offset` folds it in — carrying over any
//! shift-combining side data already attached to the `lea`, so a
//! previously-combined `lsl #n` scale still lands on the real `add`.

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;

const SCRATCH: RegName = RegName::R12;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        if inst.opcode != OpCode::Lea {
            out.push(inst);
            continue;
        }

        let ptr = inst.srcs()[0];
        let offset = inst.srcs()[1];
        let dest = inst.dest().unwrap();
        let ofs_zero = offset.as_imm() == Some(0);
        let temp = if ofs_zero { dest } else { Operand::Reg(SCRATCH) };

        match ptr {
            Operand::Slot(id) => {
                let slot = func.operands.slot(id);
                out.push(Inst::new(OpCode::Mov, Some(temp), &[slot.base]));
                if slot.offset > 0 {
                    out.push(Inst::new(OpCode::Add, Some(temp), &[temp, Operand::Imm(slot.offset)]));
                } else if slot.offset < 0 {
                    out.push(Inst::new(OpCode::Sub, Some(temp), &[temp, Operand::Imm(-slot.offset)]));
                }
            }
            Operand::Label(_) => {
                out.push(Inst::new(OpCode::Movw, Some(temp), &[ptr]));
                out.push(Inst::new(OpCode::Movt, Some(temp), &[ptr]));
            }
            _ => {
                out.push(Inst::new(OpCode::Mov, Some(temp), &[ptr]));
            }
        }

        if !ofs_zero {
            let mut add = Inst::new(OpCode::Add, Some(dest), &[temp, offset]);
            add.shift_op = inst.shift_op;
            add.shift_amt = inst.shift_amt;
            out.push(add);
        }
    }

    func.insts = out;
}
