//! Register allocation: liveness analysis feeding either a linear-scan or
//! a graph-coloring allocator, followed by spill insertion.
//!
//! Both allocators are selected per target (see
//! [`crate::isa::arm32::AArch32Isa`] and
//! [`crate::isa::riscv32::Riscv32Isa`]) and operate over the shared
//! [`crate::mir::inst::MirInst`] contract, so this module is written once
//! and reused by every ISA.

pub mod graph_coloring;
pub mod linear_scan;
pub mod liveness;

use crate::mir::function::SlotAllocator;
use crate::mir::operand::{Register, VRegId};
use std::collections::HashMap;
use std::collections::HashSet;

/// `[start_pos, end_pos]` over per-function linear instruction indices:
/// the range in which a virtual register's value is live. `can_alloc_temp`
/// is false when the interval spans a call, or a write to a caller-saved
/// temporary, forcing the allocator to prefer a callee-saved register or a
/// slot instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveInterval {
    pub start_pos: usize,
    pub end_pos: usize,
    pub can_alloc_temp: bool,
}

/// Live intervals for every virtual register in one function, for
/// linear-scan allocation.
pub type LiveIntervals = HashMap<VRegId, LiveInterval>;

/// One node's neighbourhood in an interference graph: every virtual
/// register simultaneously live with it, plus coalescing hints collected
/// from move instructions.
#[derive(Debug, Clone, Default)]
pub struct IfGraphNodeInfo {
    pub neighbours: HashSet<VRegId>,
    pub suggest_same: HashSet<VRegId>,
    pub can_alloc_temp: bool,
}

/// An interference graph for one function, for graph-coloring allocation.
pub type InterferenceGraph = HashMap<VRegId, IfGraphNodeInfo>;

fn add_edge(graph: &mut InterferenceGraph, a: VRegId, b: VRegId) {
    if a != b {
        graph.entry(a).or_default().neighbours.insert(b);
        graph.entry(b).or_default().neighbours.insert(a);
    } else {
        graph.entry(a).or_default();
    }
}

fn add_suggest_same(graph: &mut InterferenceGraph, a: VRegId, b: VRegId) {
    if a != b {
        graph.entry(a).or_default().suggest_same.insert(b);
        graph.entry(b).or_default().suggest_same.insert(a);
    } else {
        graph.entry(a).or_default();
    }
}

/// Drop every node in `nodes` from `graph`, including references to it
/// from every other node's neighbour/suggestion sets. Used to shrink the
/// interference graph after a spill-and-restart so the next coloring
/// attempt sees a strictly smaller problem.
fn remove_nodes(graph: &mut InterferenceGraph, nodes: &HashSet<VRegId>) {
    for n in nodes {
        graph.remove(n);
    }
    for info in graph.values_mut() {
        for n in nodes {
            info.neighbours.remove(n);
            info.suggest_same.remove(n);
        }
    }
}

/// Run graph-coloring allocation to completion, spilling and restarting
/// as many times as [`graph_coloring::color`] demands. Each spill round
/// assigns the stuck nodes a slot and removes them from the graph before
/// trying again, which strictly shrinks the graph each iteration and so
/// always terminates.
pub fn allocate_graph_coloring<R: Register>(
    mut graph: InterferenceGraph,
    temp_pool: &[R],
    callee_saved_pool: &[R],
    slots: &mut SlotAllocator,
) -> graph_coloring::Assignments<R> {
    let mut spilled = graph_coloring::Assignments::new();
    loop {
        match graph_coloring::color(&graph, temp_pool, callee_saved_pool) {
            graph_coloring::ColoringResult::Colored(mut assignments) => {
                assignments.extend(spilled);
                return assignments;
            }
            graph_coloring::ColoringResult::NeedsSpill(set) => {
                let new_spills = graph_coloring::spill_to_slots(&set, slots);
                spilled.extend(new_spills);
                remove_nodes(&mut graph, &set);
            }
        }
    }
}
