//! Liveness analysis: builds a CFG of basic blocks from the linear
//! instruction list, runs the `live_out` dataflow equation to fixpoint,
//! then produces either live intervals or an interference graph from the
//! fixed point, depending on which allocator will consume it.
//!
//! Grounded on the example backend's `LivenessAnalysisPass`: blocks split
//! at labels and at branches that fall through; `live_out` is computed by
//! a worklist-free fixpoint iteration in reverse postorder on the
//! *reverse* CFG (from the exit block); live intervals are then produced
//! by one more forward sweep in the blocks' original layout order.

use crate::mir::inst::MirInst;
use crate::mir::operand::{Operand, Register, VRegId};
use crate::regalloc::{add_edge, add_suggest_same, IfGraphNodeInfo, InterferenceGraph, LiveInterval, LiveIntervals};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Block {
    /// Indices into the original instruction list.
    insts: Vec<usize>,
    preds: Vec<usize>,
    succs: Vec<usize>,
    var_kill: HashSet<VRegId>,
    ue_var: HashSet<VRegId>,
    live_out: HashSet<VRegId>,
}

/// The control-flow graph built from one function's linear instruction
/// list, plus the fixed point of the `live_out` dataflow equation.
pub struct Cfg {
    blocks: HashMap<usize, Block>,
    /// Block ids in the order their first instruction appears in the
    /// original list (the order live-interval generation sweeps in).
    order: Vec<usize>,
}

fn vreg_of<R: Register>(op: Operand<R>) -> Option<VRegId> {
    op.as_virtual()
}

/// Build the CFG and solve liveness for `insts`. `is_temp` distinguishes
/// caller-saved "temporary" registers from callee-saved ones, needed to
/// compute `can_alloc_temp`.
pub fn analyze<R: Register, I: MirInst<R>>(insts: &[I]) -> Cfg {
    let mut labels: HashMap<Operand<R>, usize> = HashMap::new();
    let mut blocks: HashMap<usize, Block> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();
    let mut next_bid: usize = 0;

    blocks.entry(0).or_default();
    order.push(0);
    let mut cur_bid = 0usize;

    let mut get_block_id = |label: Operand<R>, next_bid: &mut usize, blocks: &mut HashMap<usize, Block>| -> usize {
        *labels.entry(label).or_insert_with(|| {
            *next_bid += 1;
            blocks.entry(*next_bid).or_default();
            *next_bid
        })
    };

    for (idx, inst) in insts.iter().enumerate() {
        if let Some(label) = inst.as_label() {
            let next_bid_val = get_block_id(label, &mut next_bid, &mut blocks);
            // A label only starts a fresh predecessor edge from the
            // previous block if that block could fall through to it.
            let prev_falls_through = blocks[&cur_bid]
                .insts
                .last()
                .map(|&i| insts[i].falls_through())
                .unwrap_or(true);
            if prev_falls_through {
                blocks.get_mut(&cur_bid).unwrap().succs.push(next_bid_val);
                blocks.get_mut(&next_bid_val).unwrap().preds.push(cur_bid);
            }
            cur_bid = next_bid_val;
            order.push(cur_bid);
            continue;
        }

        blocks.get_mut(&cur_bid).unwrap().insts.push(idx);

        let targets = inst.branch_targets();
        if !targets.is_empty() {
            for target in targets.iter() {
                let tgt_bid = get_block_id(*target, &mut next_bid, &mut blocks);
                blocks.get_mut(&cur_bid).unwrap().succs.push(tgt_bid);
                blocks.get_mut(&tgt_bid).unwrap().preds.push(cur_bid);
            }
            if inst.falls_through() {
                // Conditional branch with an implicit fallthrough edge:
                // split the block unless the next instruction is already
                // a label (which will create the edge itself above).
                let next_is_label = insts.get(idx + 1).map(|n| n.as_label().is_some()).unwrap_or(false);
                if !next_is_label {
                    next_bid += 1;
                    let fallthrough_bid = next_bid;
                    blocks.entry(fallthrough_bid).or_default();
                    blocks.get_mut(&cur_bid).unwrap().succs.push(fallthrough_bid);
                    blocks.get_mut(&fallthrough_bid).unwrap().preds.push(cur_bid);
                    cur_bid = fallthrough_bid;
                    order.push(cur_bid);
                }
            }
        }
    }

    // def/use info per block.
    for block in blocks.values_mut() {
        for &idx in &block.insts {
            let inst = &insts[idx];
            for src in inst.srcs() {
                if let Some(v) = vreg_of(*src) {
                    if !block.var_kill.contains(&v) {
                        block.ue_var.insert(v);
                    }
                }
            }
            if let Some(v) = inst.dest().and_then(vreg_of) {
                block.var_kill.insert(v);
            }
        }
    }

    // Reverse postorder on the reverse CFG, rooted at every block with no
    // successor (an exit block).
    let rpo = reverse_postorder(&blocks);

    let mut changed = true;
    while changed {
        changed = false;
        for &bid in &rpo {
            let succs = blocks[&bid].succs.clone();
            let mut new_live: Vec<VRegId> = Vec::new();
            for succ_bid in &succs {
                let succ = &blocks[succ_bid];
                for &v in &succ.ue_var {
                    new_live.push(v);
                }
                for &v in &succ.live_out {
                    if !succ.var_kill.contains(&v) {
                        new_live.push(v);
                    }
                }
            }
            let block = blocks.get_mut(&bid).unwrap();
            for v in new_live {
                if block.live_out.insert(v) {
                    changed = true;
                }
            }
        }
    }

    Cfg { blocks, order }
}

fn reverse_postorder(blocks: &HashMap<usize, Block>) -> Vec<usize> {
    let exits: Vec<usize> = blocks
        .iter()
        .filter(|(_, b)| b.succs.is_empty())
        .map(|(&id, _)| id)
        .collect();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut rpo: Vec<usize> = Vec::new();
    for exit in exits {
        visit_reverse(exit, blocks, &mut visited, &mut rpo);
    }
    // Blocks unreachable from any exit (e.g. dead infinite loops) still
    // need to participate; append them in id order for determinism.
    let mut remaining: Vec<usize> = blocks.keys().copied().filter(|b| !visited.contains(b)).collect();
    remaining.sort_unstable();
    for b in remaining {
        visit_reverse(b, blocks, &mut visited, &mut rpo);
    }
    rpo
}

fn visit_reverse(cur: usize, blocks: &HashMap<usize, Block>, visited: &mut HashSet<usize>, rpo: &mut Vec<usize>) {
    if !visited.insert(cur) {
        return;
    }
    if let Some(block) = blocks.get(&cur) {
        for &pred in &block.preds {
            visit_reverse(pred, blocks, visited, rpo);
        }
    }
    rpo.insert(0, cur);
}

/// Produce live intervals for linear-scan allocation by a single forward
/// sweep over the blocks in layout order.
pub fn live_intervals<R: Register, I: MirInst<R>>(
    cfg: &Cfg,
    insts: &[I],
    is_temp: impl Fn(R) -> bool,
) -> LiveIntervals {
    let mut result = LiveIntervals::new();
    let mut pos = 0usize;
    let mut last_temp_pos = 0usize;

    let mut log = |result: &mut LiveIntervals, vreg: VRegId, pos: usize, last_temp_pos: usize| {
        match result.get_mut(&vreg) {
            Some(li) => {
                li.end_pos = pos;
                if last_temp_pos > li.start_pos {
                    li.can_alloc_temp = false;
                }
            }
            None => {
                result.insert(
                    vreg,
                    LiveInterval {
                        start_pos: pos,
                        end_pos: pos,
                        can_alloc_temp: true,
                    },
                );
            }
        }
    };

    for &bid in &cfg.order {
        let block = &cfg.blocks[&bid];
        for &idx in &block.insts {
            let inst = &insts[idx];
            for src in inst.srcs() {
                if let Some(v) = vreg_of(*src) {
                    log(&mut result, v, pos, last_temp_pos);
                }
            }
            if let Some(dest) = inst.dest() {
                if let Some(v) = vreg_of(dest) {
                    log(&mut result, v, pos, last_temp_pos);
                } else if let Some(r) = dest.as_phys() {
                    if is_temp(r) {
                        last_temp_pos = pos;
                    }
                }
            }
            if inst.is_call() {
                last_temp_pos = pos;
            }
            pos += 1;
        }
        for &v in &block.live_out {
            log(&mut result, v, pos, last_temp_pos);
        }
    }
    result
}

/// Produce an interference graph for graph-coloring allocation. Walks
/// each block in reverse, maintaining the running "currently live" set.
pub fn interference_graph<R: Register, I: MirInst<R>>(
    cfg: &Cfg,
    insts: &[I],
    is_temp: impl Fn(R) -> bool,
) -> InterferenceGraph {
    let mut graph = InterferenceGraph::new();
    let mut cannot_alloc_temp: HashSet<VRegId> = HashSet::new();

    for &bid in &cfg.order {
        let block = &cfg.blocks[&bid];
        let mut live_now: HashSet<VRegId> = block.live_out.clone();
        for &idx in block.insts.iter().rev() {
            let inst = &insts[idx];

            let dest_is_temp = inst.dest().and_then(|d| d.as_phys()).map(&is_temp).unwrap_or(false);
            if dest_is_temp || inst.is_call() {
                for &v in &live_now {
                    cannot_alloc_temp.insert(v);
                }
            }

            if let Some(dest_vreg) = inst.dest().and_then(vreg_of) {
                for &v in &live_now {
                    add_edge(&mut graph, v, dest_vreg);
                }
                live_now.remove(&dest_vreg);
            }

            for src in inst.srcs() {
                if let Some(v) = vreg_of(*src) {
                    live_now.insert(v);
                }
            }

            if inst.is_move() {
                if let (Some(dest), Some(&src)) = (inst.dest(), inst.srcs().first()) {
                    if let (Some(d), Some(s)) = (vreg_of(dest), vreg_of(src)) {
                        add_suggest_same(&mut graph, d, s);
                    }
                }
            }
        }
    }

    for (vreg, info) in graph.iter_mut() {
        info.can_alloc_temp = !cannot_alloc_temp.contains(vreg);
    }
    graph
}

/// Rebuild an `IfGraphNodeInfo` default for a vreg with no recorded
/// interference (an isolated node still needs an entry so the allocator
/// can colour it).
pub fn ensure_node(graph: &mut InterferenceGraph, vreg: VRegId) -> &mut IfGraphNodeInfo {
    graph.entry(vreg).or_default()
}
