//! Load/store propagation.
//!
//! Grounded on the example backend's `LoadStorePropagationPass`. Tracks,
//! per memory location (a slot operand or a bare label reached through a
//! register-only address), the value most recently written or read
//! there. A `ldr`/`ldrb` from a known location either becomes a `mov`
//! from that value, or is erased outright when it would just be a
//! self-move. Any store whose address is *not* a tracked slot/label
//! invalidates every tracked location conservatively (the address might
//! alias any of them); a store that redundantly writes the value already
//! known to be there is removed since it has no observable effect.
//!
//! Byte stores/loads (`strb`/`ldrb`) only ever invalidate or populate
//! entries for the same location at byte granularity — this pass keys
//! purely by address operand, so a `strb` simply invalidates the
//! location like any other write rather than attempting to model
//! partial overlap with a 4-byte entry.

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;
use std::collections::HashMap;

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut known: HashMap<Operand<RegName>, Operand<RegName>> = HashMap::new();
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());

    for inst in func.insts.drain(..) {
        match inst.opcode {
            OpCode::Ldr | OpCode::Ldrb => {
                let addr = inst.srcs()[0];
                let dest = inst.dest().unwrap();
                let trackable = is_trackable(addr);
                let existing = if trackable { known.get(&addr).copied() } else { None };

                if existing == Some(dest) {
                    continue;
                }

                invalidate_dest(dest, &mut known);
                if trackable {
                    known.insert(addr, dest);
                }

                match existing {
                    Some(value) => out.push(Inst::new(OpCode::Mov, Some(dest), &[value])),
                    None => out.push(inst),
                }
            }
            OpCode::Str | OpCode::Strb => {
                let value = inst.srcs()[0];
                let addr = inst.srcs()[1];
                if is_trackable(addr) {
                    if known.get(&addr).copied() == Some(value) {
                        continue; // already holds this value
                    }
                    known.insert(addr, value);
                } else {
                    known.clear();
                }
                out.push(inst);
            }
            _ => {
                if inst.as_label().is_some() || inst.is_call() {
                    known.clear();
                } else if let Some(dest) = inst.dest() {
                    invalidate_dest(dest, &mut known);
                }
                out.push(inst);
            }
        }
    }

    func.insts = out;
}

fn is_trackable(addr: Operand<RegName>) -> bool {
    addr.is_slot() || addr.is_label()
}

fn invalidate_dest(dest: Operand<RegName>, known: &mut HashMap<Operand<RegName>, Operand<RegName>>) {
    known.retain(|&loc, &mut val| loc != dest && val != dest);
}
