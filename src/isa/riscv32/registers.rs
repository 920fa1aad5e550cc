//! RV32I physical register names and ABI pools.
//!
//! Grounded on the example backend's `RISCV32Reg::RegName` and
//! `RISCV32ArchInfo`'s register-pool split.

use crate::mir::operand::Register;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegName {
    Zero,
    Ra,
    Sp,
    X3,
    X4,
    T0,
    T1,
    T2,
    Fp,
    S1,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    S8,
    S9,
    S10,
    S11,
    T3,
    T4,
    T5,
    T6,
}

impl fmt::Display for RegName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RegName::*;
        let s = match self {
            Zero => "zero",
            Ra => "ra",
            Sp => "sp",
            X3 => "x3",
            X4 => "x4",
            T0 => "t0",
            T1 => "t1",
            T2 => "t2",
            Fp => "fp",
            S1 => "s1",
            A0 => "a0",
            A1 => "a1",
            A2 => "a2",
            A3 => "a3",
            A4 => "a4",
            A5 => "a5",
            A6 => "a6",
            A7 => "a7",
            S2 => "s2",
            S3 => "s3",
            S4 => "s4",
            S5 => "s5",
            S6 => "s6",
            S7 => "s7",
            S8 => "s8",
            S9 => "s9",
            S10 => "s10",
            S11 => "s11",
            T3 => "t3",
            T4 => "t4",
            T5 => "t5",
            T6 => "t6",
        };
        write!(f, "{}", s)
    }
}

impl Register for RegName {}

/// Argument registers, in ABI order (up to eight in registers).
pub const ARG_REGS: [RegName; 8] = [
    RegName::A0,
    RegName::A1,
    RegName::A2,
    RegName::A3,
    RegName::A4,
    RegName::A5,
    RegName::A6,
    RegName::A7,
];

/// Return-value register.
pub const RETURN_REG: RegName = RegName::A0;

/// Frame pointer (x8, conventionally `s0`/`fp`).
pub const FP: RegName = RegName::Fp;

/// Return-address register, holding the caller's return address across a
/// call.
pub const RA: RegName = RegName::Ra;

pub const SP: RegName = RegName::Sp;

/// Caller-saved temporaries the allocator may freely clobber across a
/// call: `t0`-`t2`, `a0`-`a7`, `t3`-`t6`.
pub const TEMP_REGS: [RegName; 15] = [
    RegName::T0,
    RegName::T1,
    RegName::T2,
    RegName::A0,
    RegName::A1,
    RegName::A2,
    RegName::A3,
    RegName::A4,
    RegName::A5,
    RegName::A6,
    RegName::A7,
    RegName::T3,
    RegName::T4,
    RegName::T5,
    RegName::T6,
];

/// Callee-saved registers the allocator may use for values that must
/// survive a call: `s1`-`s11` (`fp`/x8 is reserved for the frame).
pub const CALLEE_SAVED_REGS: [RegName; 11] = [
    RegName::S1,
    RegName::S2,
    RegName::S3,
    RegName::S4,
    RegName::S5,
    RegName::S6,
    RegName::S7,
    RegName::S8,
    RegName::S9,
    RegName::S10,
    RegName::S11,
];

pub fn is_temp(reg: RegName) -> bool {
    TEMP_REGS.contains(&reg)
}
