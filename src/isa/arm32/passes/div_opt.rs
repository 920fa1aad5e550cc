//! Division-by-constant lowering (AArch32 only).
//!
//! Replaces `sdiv`/`udiv` whose divisor is a known immediate with the
//! standard "multiply by a magic constant, shift, fix up the sign" idiom
//! (Granlund & Montgomery, by way of Warren's *Hacker's Delight* ch. 10),
//! so the final output never contains a division instruction for a
//! constant divisor. The magic-number search itself is the textbook
//! algorithm also found in `cranelift_codegen::divconst_magic_numbers`;
//! what's backend-specific here is turning the resulting `(mul_by,
//! shift_by[, do_add])` triple into an AArch32 instruction sequence.
//!
//! Signed division needs only `smmul` (a single-destination signed
//! multiply-high), so it composes with the shared single-`dest`
//! [`crate::mir::inst::MirInst`] contract directly. Unsigned division
//! needs the high half of a *64-bit* product, which AArch32 only
//! produces two registers at a time (`umull RdLo, RdHi, Rn, Rm`); the
//! low half is never read, so it's written to a scratch register chosen
//! to avoid every other operand of the instruction and carried as an
//! extra source operand purely so the emitter can name it — it is never
//! treated as a value this pass or any later one reads.
//!
//! Runs after register allocation and spill insertion (operands here are
//! always physical), and after immediate normalization, so any
//! immediate this pass introduces (the magic constant) is materialized
//! directly with `movw`/`movt` rather than relying on a later pass to
//! catch it.

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        let replaced = match inst.opcode {
            OpCode::Sdiv => inst.srcs()[1]
                .as_imm()
                .map(|d| lower_signed(inst.dest().unwrap(), inst.srcs()[0], d)),
            OpCode::Udiv => inst.srcs()[1]
                .as_imm()
                .filter(|&d| d > 0)
                .map(|d| lower_unsigned(inst.dest().unwrap(), inst.srcs()[0], d as u32)),
            _ => None,
        };

        match replaced {
            Some(seq) => out.extend(seq),
            None => out.push(inst),
        }
    }

    func.insts = out;
}

fn movimm32(dest: Operand<RegName>, value: u32, out: &mut Vec<Inst>) {
    let lo = (value & 0xffff) as i32;
    let hi = (value >> 16) as i32;
    out.push(Inst::new(OpCode::Movw, Some(dest), &[Operand::Imm(lo)]));
    if hi != 0 {
        out.push(Inst::new(OpCode::Movt, Some(dest), &[Operand::Imm(hi)]));
    }
}

/// Choose a scratch register distinct from every operand already in use.
fn select_scratch(avoid: &[Operand<RegName>]) -> RegName {
    for candidate in [RegName::R12, RegName::R3, RegName::R2, RegName::R1, RegName::R0] {
        if !avoid.iter().any(|o| o.as_phys() == Some(candidate)) {
            return candidate;
        }
    }
    unreachable!("instruction exhausted every scratch register")
}

fn lower_signed(dest: Operand<RegName>, n: Operand<RegName>, d: i32) -> Vec<Inst> {
    let mut out = Vec::new();
    if d == 1 {
        out.push(Inst::new(OpCode::Mov, Some(dest), &[n]));
        return out;
    }
    if d == -1 {
        out.push(Inst::new(OpCode::Rsb, Some(dest), &[n, Operand::Imm(0)]));
        return out;
    }

    let m = magic_s32(d);
    let mreg = Operand::Reg(select_scratch(&[n, dest]));
    movimm32(mreg, m.mul_by as u32, &mut out);

    // q = MULSH(n, M)
    out.push(Inst::new(OpCode::Smmul, Some(dest), &[n, mreg]));
    if d > 0 && m.mul_by < 0 {
        out.push(Inst::new(OpCode::Add, Some(dest), &[dest, n]));
    } else if d < 0 && m.mul_by > 0 {
        out.push(Inst::new(OpCode::Sub, Some(dest), &[dest, n]));
    }
    if m.shift_by > 0 {
        out.push(Inst::new(OpCode::Asr, Some(dest), &[dest, Operand::Imm(m.shift_by)]));
    }
    // Round toward zero: add 1 if q is negative.
    let fixup = Operand::Reg(select_scratch(&[n, dest, mreg]));
    out.push(Inst::new(OpCode::Lsr, Some(fixup), &[dest, Operand::Imm(31)]));
    out.push(Inst::new(OpCode::Add, Some(dest), &[dest, fixup]));
    out
}

fn lower_unsigned(dest: Operand<RegName>, n: Operand<RegName>, d: u32) -> Vec<Inst> {
    let mut out = Vec::new();
    if d == 1 {
        out.push(Inst::new(OpCode::Mov, Some(dest), &[n]));
        return out;
    }

    let m = magic_u32(d);
    let mreg = Operand::Reg(select_scratch(&[n, dest]));
    movimm32(mreg, m.mul_by, &mut out);

    let lo_scratch = Operand::Reg(select_scratch(&[n, dest, mreg]));
    // umull lo_scratch, dest, n, mreg -- only the high half (dest) matters.
    out.push(Inst::new(OpCode::Umull, Some(dest), &[lo_scratch, n, mreg]));

    if m.do_add {
        // q += (n - q) >> 1, then shift by (s - 1) to finish.
        let tmp = lo_scratch;
        out.push(Inst::new(OpCode::Sub, Some(tmp), &[n, dest]));
        out.push(Inst::new(OpCode::Lsr, Some(tmp), &[tmp, Operand::Imm(1)]));
        out.push(Inst::new(OpCode::Add, Some(dest), &[tmp, dest]));
        if m.shift_by > 1 {
            out.push(Inst::new(OpCode::Lsr, Some(dest), &[dest, Operand::Imm(m.shift_by - 1)]));
        }
    } else if m.shift_by > 0 {
        out.push(Inst::new(OpCode::Lsr, Some(dest), &[dest, Operand::Imm(m.shift_by)]));
    }
    out
}

struct MagicS32 {
    mul_by: i32,
    shift_by: i32,
}

struct MagicU32 {
    mul_by: u32,
    do_add: bool,
    shift_by: i32,
}

fn magic_s32(d: i32) -> MagicS32 {
    debug_assert!(d != 0 && d != 1 && d != -1);
    let two31: u32 = 0x8000_0000;
    let mut p: i32 = 31;
    let ad: u32 = d.unsigned_abs();
    let t: u32 = two31 + ((d as u32) >> 31);
    let anc: u32 = u32::wrapping_sub(t - 1, t % ad);
    let mut q1: u32 = two31 / anc;
    let mut r1: u32 = two31 - q1 * anc;
    let mut q2: u32 = two31 / ad;
    let mut r2: u32 = two31 - q2 * ad;
    loop {
        p += 1;
        q1 = 2 * q1;
        r1 = 2 * r1;
        if r1 >= anc {
            q1 += 1;
            r1 -= anc;
        }
        q2 = 2 * q2;
        r2 = 2 * r2;
        if r2 >= ad {
            q2 += 1;
            r2 -= ad;
        }
        let delta = ad - r2;
        if !(q1 < delta || (q1 == delta && r1 == 0)) {
            break;
        }
    }
    let mul_by = if d < 0 { u32::wrapping_neg(q2 + 1) } else { q2 + 1 } as i32;
    MagicS32 { mul_by, shift_by: p - 32 }
}

fn magic_u32(d: u32) -> MagicU32 {
    debug_assert!(d != 0 && d != 1);
    let mut do_add = false;
    let mut p: i32 = 31;
    let nc: u32 = 0xffff_ffff - u32::wrapping_neg(d) % d;
    let mut q1: u32 = 0x8000_0000 / nc;
    let mut r1: u32 = 0x8000_0000 - q1 * nc;
    let mut q2: u32 = 0x7fff_ffff / d;
    let mut r2: u32 = 0x7fff_ffff - q2 * d;
    loop {
        p += 1;
        if r1 >= nc - r1 {
            q1 = u32::wrapping_add(2 * q1, 1);
            r1 = u32::wrapping_sub(2 * r1, nc);
        } else {
            q1 = 2 * q1;
            r1 = 2 * r1;
        }
        if r2 + 1 >= d - r2 {
            if q2 >= 0x7fff_ffff {
                do_add = true;
            }
            q2 = 2 * q2 + 1;
            r2 = u32::wrapping_sub(u32::wrapping_add(2 * r2, 1), d);
        } else {
            if q2 >= 0x8000_0000 {
                do_add = true;
            }
            q2 = 2 * q2;
            r2 = 2 * r2 + 1;
        }
        let delta = d - 1 - r2;
        if !(p < 64 && (q1 < delta || (q1 == delta && r1 == 0))) {
            break;
        }
    }
    MagicU32 { mul_by: q2 + 1, do_add, shift_by: p - 32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_numbers_match_known_values() {
        let m = magic_u32(3);
        assert_eq!(m.mul_by, 0xaaaaaaab);
        assert_eq!(m.shift_by, 1);
        assert!(!m.do_add);

        let m = magic_u32(7);
        assert_eq!(m.mul_by, 0x24924925);
        assert_eq!(m.shift_by, 3);
        assert!(m.do_add);
    }

    #[test]
    fn div_by_constant_leaves_no_div_opcode() {
        use crate::isa::arm32::registers::RegName;
        use crate::mir::function::MirFunction;
        use crate::ssa::Linkage;

        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let n = Operand::Reg(RegName::R0);
        func.push(Inst::new(OpCode::Sdiv, Some(Operand::Reg(RegName::R0)), &[n, Operand::Imm(3)]));
        run(&mut func);
        assert!(func.insts.iter().all(|i| !matches!(i.opcode, OpCode::Sdiv | OpCode::Udiv)));
    }
}
