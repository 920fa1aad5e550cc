//! AArch32 (ARMv7-A) physical register names and ABI pools.
//!
//! Grounded on the example backend's `AArch32Reg::RegName`.

use crate::mir::operand::Register;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegName {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Sp,
    Lr,
    Pc,
}

impl fmt::Display for RegName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RegName::*;
        let s = match self {
            R0 => "r0",
            R1 => "r1",
            R2 => "r2",
            R3 => "r3",
            R4 => "r4",
            R5 => "r5",
            R6 => "r6",
            R7 => "r7",
            R8 => "r8",
            R9 => "r9",
            R10 => "r10",
            R11 => "r11",
            R12 => "r12",
            Sp => "sp",
            Lr => "lr",
            Pc => "pc",
        };
        write!(f, "{}", s)
    }
}

impl Register for RegName {}

/// Argument registers, in ABI order (AAPCS32: up to four in registers).
pub const ARG_REGS: [RegName; 4] = [RegName::R0, RegName::R1, RegName::R2, RegName::R3];

/// Return-value register.
pub const RETURN_REG: RegName = RegName::R0;

/// Frame pointer (ARMv7-A's r11, "variable register 11" by AAPCS
/// convention).
pub const FP: RegName = RegName::R11;

/// Link register, holding the return address across a call.
pub const LR: RegName = RegName::Lr;

pub const SP: RegName = RegName::Sp;

/// Caller-saved temporaries the allocator may freely clobber across a
/// call: r0-r3 (argument/result/scratch) and r12 (intra-procedure-call
/// scratch).
pub const TEMP_REGS: [RegName; 5] = [RegName::R0, RegName::R1, RegName::R2, RegName::R3, RegName::R12];

/// Callee-saved registers the allocator may use for values that must
/// survive a call: r4-r10 (r11/fp and lr are reserved for the frame).
pub const CALLEE_SAVED_REGS: [RegName; 7] = [
    RegName::R4,
    RegName::R5,
    RegName::R6,
    RegName::R7,
    RegName::R8,
    RegName::R9,
    RegName::R10,
];

pub fn is_temp(reg: RegName) -> bool {
    TEMP_REGS.contains(&reg)
}
