//! AArch32 concrete machine instruction.
//!
//! Grounded on the example backend's `AArch32Inst`: one opcode
//! enumeration covering real ARMv7-A mnemonics plus the pseudo
//! instructions (`Lea`, `Br`, `SetCc` family) the selector and the
//! legalization passes use as intermediate scaffolding, plus a folded
//! shift op/amount side-slot used by shift-combining.

use crate::isa::arm32::registers::RegName;
use crate::mir::inst::{MirInst, Targets};
use crate::mir::operand::Operand;
use smallvec::{smallvec, SmallVec};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Ldr,
    Ldrb,
    Str,
    Strb,
    Push,
    Pop,
    Add,
    Sub,
    Subs,
    Rsb,
    Mul,
    Mls,
    Smmul,
    Umull,
    Sdiv,
    Udiv,
    Cmp,
    B,
    Bl,
    Bx,
    Beq,
    Bne,
    Blo,
    Blt,
    Bls,
    Ble,
    Bhi,
    Bgt,
    Bhs,
    Bge,
    Mov,
    Movw,
    Movt,
    Mvn,
    And,
    Orr,
    Eor,
    Lsl,
    Lsr,
    Asr,
    Clz,
    Sxtb,
    Uxtb,
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
        matches!(self, Beq | Bne | Blo | Blt | Bls | Ble | Bhi | Bgt | Bhs | Bge)
    }

    pub fn is_set_cc(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            SetEq | SetNe | SetULt | SetSLt | SetULe | SetSLe | SetUGt | SetSGt | SetUGe | SetSGe
        )
    }
}

/// The shift folded into an instruction's flex-operand position by the
/// shift-combining pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShiftOp {
    #[default]
    Nop,
    Lsl,
    Lsr,
    Asr,
    Ror,
}

#[derive(Debug, Clone)]
pub struct Inst {
    pub opcode: OpCode,
    dest: Option<Operand<RegName>>,
    srcs: SmallVec<[Operand<RegName>; 3]>,
    pub shift_op: ShiftOp,
    pub shift_amt: u8,
}

impl Inst {
    pub fn new(opcode: OpCode, dest: Option<Operand<RegName>>, srcs: &[Operand<RegName>]) -> Self {
        Self {
            opcode,
            dest,
            srcs: SmallVec::from_slice(srcs),
            shift_op: ShiftOp::Nop,
            shift_amt: 0,
        }
    }

    pub fn label(label: Operand<RegName>) -> Self {
        Self::new(OpCode::Label, None, &[label])
    }

    pub fn branch(opcode: OpCode, target: Operand<RegName>) -> Self {
        Self::new(opcode, None, &[target])
    }

    pub fn pseudo_br(cond: Operand<RegName>, then_label: Operand<RegName>, else_label: Operand<RegName>) -> Self {
        Self::new(OpCode::Br, None, &[cond, then_label, else_label])
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OpCode::*;
        let s = match self {
            Ldr => "ldr",
            Ldrb => "ldrb",
            Str => "str",
            Strb => "strb",
            Push => "push",
            Pop => "pop",
            Add => "add",
            Sub => "sub",
            Subs => "subs",
            Rsb => "rsb",
            Mul => "mul",
            Mls => "mls",
            Smmul => "smmul",
            Umull => "umull",
            Sdiv => "sdiv",
            Udiv => "udiv",
            Cmp => "cmp",
            B => "b",
            Bl => "bl",
            Bx => "bx",
            Beq => "beq",
            Bne => "bne",
            Blo => "blo",
            Blt => "blt",
            Bls => "bls",
            Ble => "ble",
            Bhi => "bhi",
            Bgt => "bgt",
            Bhs => "bhs",
            Bge => "bge",
            Mov => "mov",
            Movw => "movw",
            Movt => "movt",
            Mvn => "mvn",
            And => "and",
            Orr => "orr",
            Eor => "eor",
            Lsl => "lsl",
            Lsr => "lsr",
            Asr => "asr",
            Clz => "clz",
            Sxtb => "sxtb",
            Uxtb => "uxtb",
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
        self.opcode == OpCode::Mov && self.srcs.len() == 1
    }

    fn is_call(&self) -> bool {
        self.opcode == OpCode::Bl
    }

    fn as_label(&self) -> Option<Operand<RegName>> {
        (self.opcode == OpCode::Label).then(|| self.srcs[0])
    }

    fn as_unconditional_jump(&self) -> Option<Operand<RegName>> {
        (self.opcode == OpCode::B).then(|| self.srcs[0])
    }

    fn branch_targets(&self) -> Targets<RegName> {
        match self.opcode {
            OpCode::B => smallvec![self.srcs[0]],
            op if op.is_conditional_branch() => smallvec![self.srcs[0]],
            OpCode::Br => smallvec![self.srcs[1], self.srcs[2]],
            _ => smallvec![],
        }
    }

    fn falls_through(&self) -> bool {
        !matches!(self.opcode, OpCode::B | OpCode::Bx | OpCode::Br) && !self.is_return()
    }

    fn is_return(&self) -> bool {
        self.opcode == OpCode::Bx && self.srcs.first().and_then(|o| o.as_phys()) == Some(RegName::Lr)
    }
}
