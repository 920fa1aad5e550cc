//! AAPCS32 calling-convention helpers used by the selector when lowering
//! `call` and function entry.

use crate::isa::arm32::registers::{RegName, ARG_REGS};
use crate::mir::operand::Operand;

/// Where one argument at `index` (0-based) is passed: a register, or the
/// positive byte offset from the frame-pointer base of its stack slot if
/// `index` overflows the register pool.
pub enum ArgLocation {
    Reg(RegName),
    StackOffset(i32),
}

pub fn arg_location(index: usize) -> ArgLocation {
    if index < ARG_REGS.len() {
        ArgLocation::Reg(ARG_REGS[index])
    } else {
        // AAPCS32 argument slots grow upward from the frame boundary;
        // the first overflow argument sits at offset 0, the next at +4.
        ArgLocation::StackOffset(((index - ARG_REGS.len()) * 4) as i32)
    }
}

/// Whether `op` is one of the four argument registers this ABI uses.
pub fn is_arg_reg(op: Operand<RegName>) -> bool {
    op.as_phys().map(|r| ARG_REGS.contains(&r)).unwrap_or(false)
}
