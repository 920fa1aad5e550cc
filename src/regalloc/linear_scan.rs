//! Linear-scan register allocation (Poletto & Sarkar).
//!
//! Intervals are scanned in increasing `start_pos` order, maintaining an
//! "active" set sorted by `end_pos`. Intervals that have already expired
//! are retired before each new interval is considered; if no physical
//! register remains free, the active interval with the furthest `end_pos`
//! is spilled to a stack slot instead (spilling favors keeping short,
//! nearby-dying intervals in registers, since they free a register sooner).

use crate::mir::function::{MirFunction, SlotAllocator};
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, Register, VRegId};
use crate::regalloc::LiveIntervals;
use std::collections::HashMap;

/// The outcome of allocation for one virtual register: either a physical
/// register or a stack slot (identified by its frame offset, which the
/// caller turns into a real `Slot` operand once it knows the frame base).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment<R> {
    Phys(R),
    Spill(i32),
}

pub type Assignments<R> = HashMap<VRegId, Assignment<R>>;

struct ActiveInterval<R> {
    vreg: VRegId,
    end_pos: usize,
    reg: R,
}

/// Run linear-scan allocation over `intervals`, choosing from `temp_pool`
/// first for intervals marked `can_alloc_temp`, falling back to
/// `callee_saved_pool` and finally a spill slot from `slots`.
pub fn allocate<R: Register>(
    intervals: &LiveIntervals,
    temp_pool: &[R],
    callee_saved_pool: &[R],
    slots: &mut SlotAllocator,
) -> Assignments<R> {
    let mut order: Vec<(VRegId, crate::regalloc::LiveInterval)> =
        intervals.iter().map(|(&v, &li)| (v, li)).collect();
    order.sort_by_key(|(_, li)| li.start_pos);

    let mut active: Vec<ActiveInterval<R>> = Vec::new();
    let mut free_temps: Vec<R> = temp_pool.iter().rev().copied().collect();
    let mut free_callee_saved: Vec<R> = callee_saved_pool.iter().rev().copied().collect();
    let mut result = Assignments::new();

    for (vreg, interval) in order {
        expire_old(&mut active, interval.start_pos, &mut free_temps, &mut free_callee_saved, temp_pool, callee_saved_pool);

        let pool = if interval.can_alloc_temp { &mut free_temps } else { &mut free_callee_saved };
        let fallback = if interval.can_alloc_temp { &mut free_callee_saved } else { &mut free_temps };

        if let Some(reg) = pool.pop().or_else(|| fallback.pop()) {
            result.insert(vreg, Assignment::Phys(reg));
            active.push(ActiveInterval { vreg, end_pos: interval.end_pos, reg });
            active.sort_by_key(|a| a.end_pos);
        } else {
            // Spill either the new interval or the active interval whose
            // end_pos is furthest away, whichever frees a register sooner
            // for the longer-lived value.
            match active.last() {
                Some(candidate) if candidate.end_pos > interval.end_pos => {
                    let spilled = active.pop().unwrap();
                    log::trace!(
                        "linear-scan: spilling {:?} (end_pos {}) to make room for {:?} (end_pos {}), which lives longer",
                        spilled.vreg, spilled.end_pos, vreg, interval.end_pos,
                    );
                    result.insert(vreg, Assignment::Phys(spilled.reg));
                    result.insert(spilled.vreg, Assignment::Spill(slots.allocate(4)));
                    active.push(ActiveInterval { vreg, end_pos: interval.end_pos, reg: spilled.reg });
                    active.sort_by_key(|a| a.end_pos);
                }
                _ => {
                    log::trace!(
                        "linear-scan: spilling {:?} (end_pos {}) directly, no active interval lives longer",
                        vreg, interval.end_pos,
                    );
                    result.insert(vreg, Assignment::Spill(slots.allocate(4)));
                }
            }
        }
    }

    result
}

fn expire_old<R: Register>(
    active: &mut Vec<ActiveInterval<R>>,
    start_pos: usize,
    free_temps: &mut Vec<R>,
    free_callee_saved: &mut Vec<R>,
    temp_pool: &[R],
    callee_saved_pool: &[R],
) {
    let mut i = 0;
    while i < active.len() {
        if active[i].end_pos < start_pos {
            let expired = active.remove(i);
            if temp_pool.contains(&expired.reg) {
                free_temps.push(expired.reg);
            } else if callee_saved_pool.contains(&expired.reg) {
                free_callee_saved.push(expired.reg);
            }
        } else {
            i += 1;
        }
    }
}

/// Write every assignment back into the function's vreg side table as an
/// `Operand`, turning spill offsets into real frame slots via `base`.
pub fn apply<R: Register, I: MirInst<R>>(
    func: &mut MirFunction<R, I>,
    assignments: &Assignments<R>,
    base: Operand<R>,
) {
    for (&vreg, assignment) in assignments {
        let operand = match *assignment {
            Assignment::Phys(r) => Operand::Reg(r),
            Assignment::Spill(offset) => func.operands.get_slot(base, offset),
        };
        func.operands.vreg_mut(vreg).alloc_to = Some(operand);
    }
}
