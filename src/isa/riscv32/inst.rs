//! RV32I/M concrete machine instruction.
//!
//! Grounded on the example backend's `RISCV32Inst`: one opcode
//! enumeration covering real RV32 mnemonics plus the pseudo instructions
//! (`Lea`, `Br`, `SetCc` family) the selector and the legalization
//! passes use as intermediate scaffolding. Unlike AArch32 there is no
//! folded shift/flex-operand side slot — RV32's three-address encoding
//! has no such thing to fold into.

use crate::isa::riscv32::registers::RegName;
use crate::mir::inst::{MirInst, Targets};
use crate::mir::operand::Operand;
use smallvec::{smallvec, SmallVec};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Lw,
    Lb,
    Lbu,
    Sw,
    Sb,
    Addi,
    Slti,
    Sltiu,
    Add,
    Sub,
    Slt,
    Sltu,
    Mul,
    Div,
    Divu,
    Rem,
    Remu,
    Neg,
    Seqz,
    Snez,
    Call,
    Ret,
    J,
    Beq,
    Bne,
    Blt,
    Ble,
    Bgt,
    Bge,
    Bltu,
    Bleu,
    Bgtu,
    Bgeu,
    Beqz,
    La,
    Li,
    Mv,
    Xori,
    Ori,
    Andi,
    Xor,
    Or,
    And,
    Not,
    Slli,
    Srli,
    Srai,
    Sll,
    Srl,
    Sra,
    Label,
    Lea,
    Br,
    SetEq,
    SetNe,
    SetULt,
    SetSLt,
    SetULe,
    SetSLe,
    SetUGt,
    SetSGt,
    SetUGe,
    SetSGe,
    Zero,
    Asciz,
    Long,
    Byte,
}

impl OpCode {
    pub fn is_conditional_branch(self) -> bool {
        use OpCode::*;
        matches!(self, Beq | Bne | Blt | Ble | Bgt | Bge | Bltu | Bleu | Bgtu | Bgeu | Beqz)
    }

    pub fn is_set_cc(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            SetEq | SetNe | SetULt | SetSLt | SetULe | SetSLe | SetUGt | SetSGt | SetUGe | SetSGe
        )
    }

    /// Whether this is one of the register-immediate opcodes produced by
    /// [`super::passes::imm_convert`] from its register-register form.
    pub fn is_reg_imm_form(self) -> bool {
        use OpCode::*;
        matches!(self, Addi | Slti | Sltiu | Xori | Ori | Andi | Slli | Srli | Srai | Li)
    }
}

#[derive(Debug, Clone)]
pub struct Inst {
    pub opcode: OpCode,
    dest: Option<Operand<RegName>>,
    srcs: SmallVec<[Operand<RegName>; 3]>,
}

impl Inst {
    pub fn new(opcode: OpCode, dest: Option<Operand<RegName>>, srcs: &[Operand<RegName>]) -> Self {
        Self { opcode, dest, srcs: SmallVec::from_slice(srcs) }
    }

    pub fn label(label: Operand<RegName>) -> Self {
        Self::new(OpCode::Label, None, &[label])
    }

    /// A fused `bxx lhs, rhs, label` conditional branch, produced by
    /// branch combining once a `SetXX` def is matched with a `br`.
    pub fn cond_branch(opcode: OpCode, lhs: Operand<RegName>, rhs: Operand<RegName>, label: Operand<RegName>) -> Self {
        Self::new(opcode, None, &[lhs, rhs, label])
    }

    /// A fused `beqz cond, label`.
    pub fn branch_if_zero(cond: Operand<RegName>, label: Operand<RegName>) -> Self {
        Self::new(OpCode::Beqz, None, &[cond, label])
    }

    pub fn jump(target: Operand<RegName>) -> Self {
        Self::new(OpCode::J, None, &[target])
    }

    pub fn pseudo_br(cond: Operand<RegName>, then_label: Operand<RegName>, else_label: Operand<RegName>) -> Self {
        Self::new(OpCode::Br, None, &[cond, then_label, else_label])
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OpCode::*;
        let s = match self {
            Lw => "lw",
            Lb => "lb",
            Lbu => "lbu",
            Sw => "sw",
            Sb => "sb",
            Addi => "addi",
            Slti => "slti",
            Sltiu => "sltiu",
            Add => "add",
            Sub => "sub",
            Slt => "slt",
            Sltu => "sltu",
            Mul => "mul",
            Div => "div",
            Divu => "divu",
            Rem => "rem",
            Remu => "remu",
            Neg => "neg",
            Seqz => "seqz",
            Snez => "snez",
            Call => "call",
            Ret => "ret",
            J => "j",
            Beq => "beq",
            Bne => "bne",
            Blt => "blt",
            Ble => "ble",
            Bgt => "bgt",
            Bge => "bge",
            Bltu => "bltu",
            Bleu => "bleu",
            Bgtu => "bgtu",
            Bgeu => "bgeu",
            Beqz => "beqz",
            La => "la",
            Li => "li",
            Mv => "mv",
            Xori => "xori",
            Ori => "ori",
            Andi => "andi",
            Xor => "xor",
            Or => "or",
            And => "and",
            Not => "not",
            Slli => "slli",
            Srli => "srli",
            Srai => "srai",
            Sll => "sll",
            Srl => "srl",
            Sra => "sra",
            Label => "",
            Lea => "lea",
            Br => "br",
            SetEq => "seteq",
            SetNe => "setne",
            SetULt => "setult",
            SetSLt => "setslt",
            SetULe => "setule",
            SetSLe => "setsle",
            SetUGt => "setugt",
            SetSGt => "setsgt",
            SetUGe => "setuge",
            SetSGe => "setsge",
            Zero => ".zero",
            Asciz => ".asciz",
            Long => ".long",
            Byte => ".byte",
        };
        write!(f, "{}", s)
    }
}

impl MirInst<RegName> for Inst {
    type Op = OpCode;

    fn opcode(&self) -> OpCode {
        self.opcode
    }

    fn dest(&self) -> Option<Operand<RegName>> {
        self.dest
    }

    fn set_dest(&mut self, op: Operand<RegName>) {
        self.dest = Some(op);
    }

    fn srcs(&self) -> &[Operand<RegName>] {
        &self.srcs
    }

    fn srcs_mut(&mut self) -> &mut [Operand<RegName>] {
        &mut self.srcs
    }

    fn is_move(&self) -> bool {
        self.opcode == OpCode::Mv && self.srcs.len() == 1
    }

    fn is_call(&self) -> bool {
        self.opcode == OpCode::Call
    }

    fn as_label(&self) -> Option<Operand<RegName>> {
        (self.opcode == OpCode::Label).then(|| self.srcs[0])
    }

    fn as_unconditional_jump(&self) -> Option<Operand<RegName>> {
        (self.opcode == OpCode::J).then(|| self.srcs[0])
    }

    fn branch_targets(&self) -> Targets<RegName> {
        match self.opcode {
            OpCode::J => smallvec![self.srcs[0]],
            OpCode::Beqz => smallvec![self.srcs[1]],
            op if op.is_conditional_branch() => smallvec![self.srcs[2]],
            OpCode::Br => smallvec![self.srcs[1], self.srcs[2]],
            _ => smallvec![],
        }
    }

    fn falls_through(&self) -> bool {
        !matches!(self.opcode, OpCode::J | OpCode::Br) && !self.is_return()
    }

    fn is_return(&self) -> bool {
        self.opcode == OpCode::Ret
    }
}
