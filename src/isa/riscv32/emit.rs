//! RV32 textual (GNU-as) emission.
//!
//! Grounded on the example backend's `RISCV32Inst::Dump`: tab-indented
//! `mnemonic operands`, unindented `label:` lines, bare integer
//! immediates (no `#` prefix, unlike AArch32), `offset(base)` slots.

use crate::isa::riscv32::inst::{Inst, OpCode};
use crate::isa::riscv32::registers::RegName;
use crate::mir::inst::MirInst;
use crate::mir::module::{DataDirective, DataWord, MemoryData};
use crate::mir::operand::{Operand, OperandPool};
use crate::ssa::Linkage;
use std::fmt::Write;

fn fmt_operand(op: Operand<RegName>, pool: &OperandPool<RegName>) -> String {
    match op {
        Operand::Reg(r) => r.to_string(),
        Operand::Virtual(_) => panic!("virtual register reached emission"),
        Operand::Imm(i) => i.to_string(),
        Operand::Label(id) => pool.label_name(id).to_string(),
        Operand::Slot(id) => {
            let slot = pool.slot(id);
            format!("{}({})", slot.offset, fmt_operand(slot.base, pool))
        }
    }
}

/// Emit one function's instruction list as assembly text.
pub fn emit_function(name: &str, linkage: Linkage, insts: &[Inst], pool: &OperandPool<RegName>, out: &mut String) {
    if matches!(linkage, Linkage::External | Linkage::Ctor | Linkage::Dtor) {
        let _ = writeln!(out, "\t.globl {}", name);
    }
    let _ = writeln!(out, "{}:", name);
    for inst in insts {
        emit_inst(inst, pool, out);
    }
}

fn emit_inst(inst: &Inst, pool: &OperandPool<RegName>, out: &mut String) {
    if inst.opcode == OpCode::Label {
        let label = inst.srcs()[0];
        let _ = writeln!(out, "{}:", fmt_operand(label, pool));
        return;
    }

    if inst.opcode == OpCode::Ret {
        let _ = writeln!(out, "\tret");
        return;
    }

    let mut operands: Vec<String> = Vec::new();
    if let Some(d) = inst.dest() {
        operands.push(fmt_operand(d, pool));
    }
    for &src in inst.srcs() {
        operands.push(fmt_operand(src, pool));
    }

    let _ = writeln!(out, "\t{} {}", inst.opcode, operands.join(", "));
}

/// Emit every global/string data entry as `.zero`/`.asciz`/`.long`/`.byte`
/// directives.
pub fn emit_data(data: &[MemoryData], out: &mut String) {
    for entry in data {
        if matches!(entry.linkage, Linkage::External) {
            let _ = writeln!(out, "\t.globl {}", entry.name);
        }
        let _ = writeln!(out, "{}:", entry.name);
        for directive in &entry.directives {
            match directive {
                DataDirective::Zero(n) => {
                    let _ = writeln!(out, "\t.zero {}", n);
                }
                DataDirective::Asciz(s) => {
                    let _ = writeln!(out, "\t.asciz \"{}\"", s.escape_default());
                }
                DataDirective::Long(DataWord::Int(v)) => {
                    let _ = writeln!(out, "\t.long {}", v);
                }
                DataDirective::Long(DataWord::Label(l)) => {
                    let _ = writeln!(out, "\t.long {}", l);
                }
                DataDirective::Byte(b) => {
                    let _ = writeln!(out, "\t.byte {}", b);
                }
            }
        }
    }
}
