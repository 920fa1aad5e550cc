//! AArch32 (ARMv7-A) target: registers, instruction set, ABI, selector,
//! legalization/peephole passes, and textual emission.
//!
//! [`AArch32Isa::compile`] is the one entry point every other module in
//! this file exists to support: it runs instruction selection followed
//! by the pass pipeline described in SPEC_FULL.md §4.3 for every
//! function in the module, then emits the finished MIR and the data
//! section as GNU-as text.

pub mod abi;
pub mod emit;
pub mod inst;
pub mod lower;
pub mod passes;
pub mod registers;

use crate::isa::{BackendOptions, TargetIsa};
use crate::mir::function::MirFunction;
use crate::mir::module::lower_globals;
use crate::mir::operand::Operand;
use crate::mir::pass::Pass;
use crate::passes::{BranchEliminationPass, MoveEliminationPass, MoveOverridingPass, MovePropagationPass};
use crate::regalloc::{allocate_graph_coloring, graph_coloring, linear_scan, liveness};
use crate::ssa;
use crate::ssa::codegen::GlobalCache;

use self::inst::Inst;
use self::registers::{RegName, CALLEE_SAVED_REGS, FP, TEMP_REGS};

/// The AArch32 target. Stateless: every per-compilation artifact lives
/// in the [`MirFunction`]s `compile` builds and discards.
pub struct AArch32Isa;

impl AArch32Isa {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AArch32Isa {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetIsa for AArch32Isa {
    fn ptr_size(&self) -> u32 {
        4
    }

    fn compile(&self, module: &ssa::Module, options: &BackendOptions) -> String {
        log::debug!("arm32: compiling module with {} function(s)", module.functions.len());

        let mut globals = GlobalCache::new(module.globals.len());
        let mut data = lower_globals(module);
        let mut out = String::new();

        for (_, func) in module.functions.iter() {
            log::trace!("arm32: selecting function `{}`", func.name);
            let selector = lower::Selector::new(module, func, &mut globals, &mut data);
            let mir = selector.run();
            let mir = compile_function(mir, options);
            emit::emit_function(&mir.name, mir.linkage, &mir.insts, &mir.operands, &mut out);
        }

        emit::emit_data(&data, &mut out);
        out
    }
}

/// Run the full pass pipeline on one function's freshly-selected
/// (virtual-register-only) MIR, returning it ready for emission.
fn compile_function(mut mir: MirFunction<RegName, Inst>, options: &BackendOptions) -> MirFunction<RegName, Inst> {
    log::trace!("arm32: `{}`: {} instructions after selection", mir.name, mir.insts.len());

    MoveEliminationPass::new().run_on(&mut mir);
    MovePropagationPass::new().run_on(&mut mir);
    MoveOverridingPass::new().run_on(&mut mir);

    let cfg = liveness::analyze(&mir.insts);
    let base = Operand::Reg(FP);

    match options.allocator {
        crate::isa::AllocatorKind::LinearScan => {
            let intervals = liveness::live_intervals(&cfg, &mir.insts, registers::is_temp);
            let assignments = linear_scan::allocate(&intervals, &TEMP_REGS, &CALLEE_SAVED_REGS, &mut mir.slots);
            linear_scan::apply(&mut mir, &assignments, base);
        }
        crate::isa::AllocatorKind::GraphColoring => {
            let graph = liveness::interference_graph(&cfg, &mir.insts, registers::is_temp);
            let assignments = allocate_graph_coloring(graph, &TEMP_REGS, &CALLEE_SAVED_REGS, &mut mir.slots);
            graph_coloring::apply(&mut mir, &assignments, base);
        }
    }

    passes::slot_spill::run(&mut mir);
    passes::func_decorate::run(&mut mir);
    passes::imm_normalize::run(&mut mir);
    passes::branch_combine::run(&mut mir);
    passes::lea_combine::run(&mut mir);
    passes::lea_elim::run(&mut mir);
    passes::load_store_prop::run(&mut mir);
    passes::shift_combine::run(&mut mir);
    passes::div_opt::run(&mut mir);
    BranchEliminationPass::new().run_on(&mut mir);
    if options.schedule {
        passes::inst_sched::run(&mut mir);
    }

    log::trace!("arm32: `{}`: {} instructions after legalization", mir.name, mir.insts.len());
    mir.assert_no_virtuals();
    mir
}
