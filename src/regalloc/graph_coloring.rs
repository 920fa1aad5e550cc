//! Graph-coloring register allocation (Chaitin/Briggs-style simplify +
//! coalesce, with spill-and-restart on failure).
//!
//! The interference graph is simplified by repeatedly removing nodes
//! with fewer neighbours than available colors, pushing them onto a
//! stack; nodes suggested to coalesce (`suggest_same`, collected from
//! move instructions) are merged first whenever doing so doesn't raise
//! either node's degree past the color count. If simplification gets
//! stuck (every remaining node has degree >= colors), the node with the
//! most neighbours and no `can_alloc_temp` restriction is picked as an
//! optimistic spill candidate and pushed anyway; if the final coloring
//! pass can't find it a color the caller must spill it to a slot and
//! rerun liveness on the rewritten function.

use crate::mir::function::{MirFunction, SlotAllocator};
use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, Register, VRegId};
use crate::regalloc::InterferenceGraph;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment<R> {
    Phys(R),
    Spill(i32),
}

pub type Assignments<R> = HashMap<VRegId, Assignment<R>>;

/// A coloring attempt's result: either every vreg got a register, or a
/// nonempty set of vregs that must be spilled before trying again.
pub enum ColoringResult<R> {
    Colored(Assignments<R>),
    NeedsSpill(HashSet<VRegId>),
}

/// Attempt to color `graph` using `temp_pool` for nodes whose
/// `can_alloc_temp` is true and `callee_saved_pool` otherwise, falling
/// back to the other pool when the preferred one is empty.
pub fn color<R: Register>(
    graph: &InterferenceGraph,
    temp_pool: &[R],
    callee_saved_pool: &[R],
) -> ColoringResult<R> {
    let colors: Vec<R> = {
        let mut v = temp_pool.to_vec();
        v.extend_from_slice(callee_saved_pool);
        v
    };
    let num_colors = colors.len();

    // Union-find for coalescing.
    let mut parent: HashMap<VRegId, VRegId> = graph.keys().map(|&v| (v, v)).collect();
    fn find(parent: &mut HashMap<VRegId, VRegId>, v: VRegId) -> VRegId {
        let p = parent[&v];
        if p == v {
            v
        } else {
            let root = find(parent, p);
            parent.insert(v, root);
            root
        }
    }

    let mut merged_neighbours: HashMap<VRegId, HashSet<VRegId>> =
        graph.iter().map(|(&v, info)| (v, info.neighbours.clone())).collect();

    let mut coalesce_candidates: Vec<(VRegId, VRegId)> = Vec::new();
    for (&v, info) in graph.iter() {
        for &w in &info.suggest_same {
            if v < w {
                coalesce_candidates.push((v, w));
            }
        }
    }

    for (a, b) in coalesce_candidates {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra == rb {
            continue;
        }
        if merged_neighbours[&ra].contains(&rb) {
            continue; // interfering — cannot coalesce.
        }
        let combined_degree = merged_neighbours[&ra].union(&merged_neighbours[&rb]).count();
        if combined_degree >= num_colors {
            continue; // conservative coalescing (Briggs): would not simplify.
        }
        let rb_neighbours: HashSet<VRegId> = merged_neighbours.remove(&rb).unwrap_or_default();
        for &n in &rb_neighbours {
            if let Some(set) = merged_neighbours.get_mut(&n) {
                set.remove(&rb);
                set.insert(ra);
            }
        }
        merged_neighbours.get_mut(&ra).unwrap().extend(rb_neighbours);
        parent.insert(rb, ra);
    }

    // Build the coalesced graph.
    let mut nodes: HashSet<VRegId> = HashSet::new();
    for &v in graph.keys() {
        nodes.insert(find(&mut parent, v));
    }
    let can_alloc_temp: HashMap<VRegId, bool> = graph
        .iter()
        .map(|(&v, info)| (find(&mut parent.clone(), v), info.can_alloc_temp))
        .collect();

    let mut work_graph: HashMap<VRegId, HashSet<VRegId>> = nodes
        .iter()
        .map(|&v| (v, merged_neighbours.get(&v).cloned().unwrap_or_default()))
        .collect();

    let mut stack: Vec<VRegId> = Vec::new();
    let mut spills: HashSet<VRegId> = HashSet::new();

    while !work_graph.is_empty() {
        let simplifiable: Option<VRegId> = work_graph
            .iter()
            .find(|(_, neighbours)| neighbours.len() < num_colors)
            .map(|(&v, _)| v);

        let chosen = match simplifiable {
            Some(v) => v,
            None => {
                // Optimistic spill: pick the highest-degree node that can
                // legally be moved to a slot.
                let candidate = work_graph
                    .iter()
                    .max_by_key(|(_, neighbours)| neighbours.len())
                    .map(|(&v, _)| v);
                match candidate {
                    Some(v) => {
                        log::trace!(
                            "graph-coloring: optimistic spill of {:?}, highest degree ({}) among {} nodes with no color left under {} colors",
                            v,
                            work_graph.get(&v).map_or(0, HashSet::len),
                            work_graph.len(),
                            num_colors,
                        );
                        spills.insert(v);
                        v
                    }
                    None => break,
                }
            }
        };

        for neighbours in work_graph.values_mut() {
            neighbours.remove(&chosen);
        }
        work_graph.remove(&chosen);
        stack.push(chosen);
    }

    if !spills.is_empty() {
        let mut real_spills: HashSet<VRegId> = HashSet::new();
        for &rep in &spills {
            for &v in graph.keys() {
                if find(&mut parent.clone(), v) == rep {
                    real_spills.insert(v);
                }
            }
        }
        return ColoringResult::NeedsSpill(real_spills);
    }

    // Assign colors popping the stack in reverse simplification order.
    let mut assigned: HashMap<VRegId, R> = HashMap::new();
    while let Some(v) = stack.pop() {
        let neighbour_colors: HashSet<R> = merged_neighbours
            .get(&v)
            .into_iter()
            .flatten()
            .filter_map(|n| assigned.get(n).copied())
            .collect();

        let preferred: &[R] = if *can_alloc_temp.get(&v).unwrap_or(&true) {
            temp_pool
        } else {
            callee_saved_pool
        };
        let chosen = preferred
            .iter()
            .chain(colors.iter())
            .find(|c| !neighbour_colors.contains(c))
            .copied();

        match chosen {
            Some(c) => {
                assigned.insert(v, c);
            }
            None => {
                // Ran out of colors despite simplification succeeding —
                // conservative coalescing guarantees this shouldn't
                // happen, but fall back to spilling this node rather
                // than panicking.
                log::trace!(
                    "graph-coloring: forced spill of {:?}, no color free among {} neighbours during assignment",
                    v,
                    neighbour_colors.len(),
                );
                let mut single = HashSet::new();
                single.insert(v);
                return ColoringResult::NeedsSpill(single);
            }
        }
    }

    let mut result = Assignments::new();
    for &v in graph.keys() {
        let rep = find(&mut parent.clone(), v);
        if let Some(&color) = assigned.get(&rep) {
            result.insert(v, Assignment::Phys(color));
        }
    }
    ColoringResult::Colored(result)
}

/// Spill every vreg in `to_spill` to a fresh stack slot instead of
/// assigning it a color, so liveness can be rerun on a smaller graph.
pub fn spill_to_slots<R: Register>(to_spill: &HashSet<VRegId>, slots: &mut SlotAllocator) -> Assignments<R> {
    to_spill
        .iter()
        .map(|&v| (v, Assignment::Spill(slots.allocate(4))))
        .collect()
}

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
