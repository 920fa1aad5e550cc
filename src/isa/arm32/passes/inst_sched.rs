//! Instruction scheduling (AArch32 only).
//!
//! Grounded on the example backend's list scheduler: between barriers
//! (a label, a call, or the start/end of the function) build a
//! dependency DAG over the straight-line run of instructions — an edge
//! from every definition to each of its uses, plus an edge from every
//! store to every load/store that follows it (since this pass runs
//! after load/store propagation has already removed the redundant cases
//! it could prove safe, anything left is treated as a possible alias) —
//! then repeatedly pick, among the instructions with no remaining
//! unscheduled predecessor, the one with the longest remaining
//! critical-path length to the end of the region.
//!
//! Latencies are a small Cortex-A72-shaped table: multiply and
//! divide-adjacent ops (`mul`, `mls`, `smmul`, `umull`) cost more than a
//! single-cycle `add`/`mov`, and memory ops cost more than ALU ops. The
//! table is deliberately coarse — correctness of the final assembly
//! never depends on the exact numbers, only on priority order being
//! deterministic, which is what gives the scheduler its idempotence
//! property (running it twice on its own output reproduces that output,
//! since a region already in priority order has nothing left to reorder).
//!
//! The jump-reorder relaxation the example backend gates behind an
//! "always false" `IsRelated` check stays disabled here too: moving a
//! branch across other instructions needs a hazard model this crate does
//! not attempt (see SPEC_FULL.md's Open Questions).

use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::RegName;
use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Operand;
use std::collections::HashSet;

fn latency(op: OpCode) -> u32 {
    use OpCode::*;
    match op {
        Mul | Mls | Smmul | Umull => 4,
        Sdiv | Udiv => 8,
        Ldr | Ldrb | Str | Strb => 3,
        Push | Pop => 2,
        Bl => 1,
        _ => 1,
    }
}

fn is_barrier(inst: &Inst) -> bool {
    inst.as_label().is_some() || inst.is_call() || !inst.branch_targets().is_empty() || inst.is_return()
}

fn is_mem_write(op: OpCode) -> bool {
    matches!(op, OpCode::Str | OpCode::Strb)
}

fn is_mem_access(op: OpCode) -> bool {
    matches!(op, OpCode::Ldr | OpCode::Ldrb | OpCode::Str | OpCode::Strb)
}

pub fn run(func: &mut MirFunction<RegName, Inst>) {
    let mut out: Vec<Inst> = Vec::with_capacity(func.insts.len());
    let mut region: Vec<Inst> = Vec::new();

    for inst in func.insts.drain(..) {
        if is_barrier(&inst) {
            out.extend(schedule_region(std::mem::take(&mut region)));
            out.push(inst);
        } else {
            region.push(inst);
        }
    }
    out.extend(schedule_region(region));

    func.insts = out;
}

/// Schedule one barrier-free straight-line run of instructions.
fn schedule_region(region: Vec<Inst>) -> Vec<Inst> {
    let n = region.len();
    if n <= 1 {
        return region;
    }

    // succs[i] = instructions that must come after i.
    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut pred_count: Vec<usize> = vec![0; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if depends(&region[i], &region[j]) {
                succs[i].push(j);
                pred_count[j] += 1;
            }
        }
    }

    // Longest remaining path to the end of the region, computed once
    // up front (program order is already a topological order since
    // dependencies only ever point forward).
    let mut crit: Vec<u32> = vec![0; n];
    for i in (0..n).rev() {
        let mut best = latency(region[i].opcode());
        for &s in &succs[i] {
            best = best.max(latency(region[i].opcode()) + crit[s]);
        }
        crit[i] = best;
    }

    let mut scheduled: HashSet<usize> = HashSet::new();
    let mut remaining_preds = pred_count.clone();
    let mut order: Vec<usize> = Vec::with_capacity(n);

    while order.len() < n {
        let next = (0..n)
            .filter(|i| !scheduled.contains(i) && remaining_preds[*i] == 0)
            .max_by_key(|&i| (crit[i], std::cmp::Reverse(i)))
            .expect("dependency DAG has a cycle");
        scheduled.insert(next);
        order.push(next);
        for &s in &succs[next] {
            remaining_preds[s] -= 1;
        }
    }

    order.into_iter().map(|i| region[i].clone()).collect()
}

/// Whether `b` must be scheduled no earlier than `a`: `a` defines
/// something `b` reads or overwrites, or both touch memory and either
/// is a write.
fn depends(a: &Inst, b: &Inst) -> bool {
    if let Some(dest) = a.dest() {
        if b.srcs().contains(&dest) || b.dest() == Some(dest) {
            return true;
        }
    }
    if let Some(dest) = b.dest() {
        if a.srcs().contains(&dest) {
            return true;
        }
    }
    if is_mem_access(a.opcode()) && is_mem_access(b.opcode()) && (is_mem_write(a.opcode()) || is_mem_write(b.opcode()))
    {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Linkage;

    #[test]
    fn scheduling_is_idempotent() {
        let mut func: MirFunction<RegName, Inst> = MirFunction::new("f".into(), Linkage::Internal);
        let a = Operand::Reg(RegName::R0);
        let b = Operand::Reg(RegName::R1);
        func.insts.push(Inst::new(OpCode::Mul, Some(a), &[a, b]));
        func.insts.push(Inst::new(OpCode::Add, Some(b), &[b, Operand::Imm(1)]));
        func.insts.push(Inst::new(OpCode::Mov, Some(Operand::Reg(RegName::R2)), &[a]));

        run(&mut func);
        let first_pass: Vec<OpCode> = func.insts.iter().map(|i| i.opcode).collect();
        run(&mut func);
        let second_pass: Vec<OpCode> = func.insts.iter().map(|i| i.opcode).collect();
        assert_eq!(first_pass, second_pass);
    }
}
