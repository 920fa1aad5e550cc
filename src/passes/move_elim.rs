//! Folds `mov dest, src` into the preceding instruction when that
//! instruction already wrote `src`, by redirecting its destination to
//! `dest` and dropping the move.
//!
//! Grounded on the example backend's `MoveEliminatePass`: single
//! lookback, no dataflow.

use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Register;
use crate::mir::pass::Pass;

#[derive(Default)]
pub struct MoveEliminationPass;

impl MoveEliminationPass {
    pub fn new() -> Self {
        Self
    }
}

impl<R: Register, I: MirInst<R>> Pass<R, I> for MoveEliminationPass {
    fn run_on(&mut self, func: &mut MirFunction<R, I>) {
        let mut out: Vec<I> = Vec::with_capacity(func.insts.len());
        for inst in func.insts.drain(..) {
            if inst.is_move() {
                if let (Some(dest), Some(&src)) = (inst.dest(), inst.srcs().first()) {
                    if let Some(last) = out.last_mut() {
                        if last.dest() == Some(src) {
                            last.set_dest(dest);
                            continue;
                        }
                    }
                }
            }
            out.push(inst);
        }
        func.insts = out;
    }
}
