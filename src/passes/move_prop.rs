//! Propagates the source of a still-live move into every later use of its
//! destination, until the destination is redefined, a label, or a call is
//! reached (calls and labels conservatively invalidate every tracked
//! definition, since either may be a join point or clobber registers).
//!
//! Grounded on the example backend's `MovePropagationPass`. A definition
//! is tracked either when both operands are virtual registers (always
//! safe to propagate, since virtuals never alias) or when an optional
//! predicate accepts the move — used by a target to additionally
//! propagate moves between physical registers it knows are safe.

use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, Register};
use crate::mir::pass::Pass;
use std::collections::HashMap;

pub struct MovePropagationPass<R: Register, I: MirInst<R>> {
    predicate: Option<Box<dyn Fn(&I) -> bool>>,
    _marker: std::marker::PhantomData<R>,
}

impl<R: Register, I: MirInst<R>> MovePropagationPass<R, I> {
    pub fn new() -> Self {
        Self {
            predicate: None,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_predicate(predicate: impl Fn(&I) -> bool + 'static) -> Self {
        Self {
            predicate: Some(Box::new(predicate)),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<R: Register, I: MirInst<R>> Default for MovePropagationPass<R, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Register, I: MirInst<R>> Pass<R, I> for MovePropagationPass<R, I> {
    fn run_on(&mut self, func: &mut MirFunction<R, I>) {
        let mut defs: HashMap<Operand<R>, Operand<R>> = HashMap::new();

        for inst in func.insts.iter_mut() {
            if inst.as_label().is_some() || inst.is_call() {
                defs.clear();
            }

            for src in inst.srcs_mut() {
                if let Some(&replacement) = defs.get(src) {
                    *src = replacement;
                }
            }

            if let Some(dest) = inst.dest() {
                defs.retain(|&d, &mut v| d != dest && v != dest);
                if inst.is_move() {
                    let val = inst.srcs()[0];
                    let both_virtual = dest.is_virtual() && val.is_virtual();
                    let allowed = both_virtual || self.predicate.as_ref().map_or(false, |p| p(inst));
                    if allowed {
                        defs.insert(dest, val);
                    }
                }
            }
        }
    }
}
