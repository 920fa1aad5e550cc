//! Target architectures.
//!
//! Each target is a self-contained module exposing its register set, its
//! concrete [`crate::mir::inst::MirInst`] implementation, its instruction
//! selector, its legalization/peephole passes, and its assembly emitter.
//! [`select`] is the architecture-name selector named in the external
//! interfaces: the one recoverable failure in this crate.

pub mod arm32;
pub mod riscv32;

use std::str::FromStr;
use target_lexicon::{Architecture, Triple};

use crate::error::BackendError;
use crate::ssa;

/// Allocator chosen for a compilation; see [`BackendOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    LinearScan,
    GraphColoring,
}

/// Per-compilation configuration. `schedule` is silently ignored by
/// targets with no scheduling pass (currently RV32), rather than
/// rejected, since not every target has an opinion on every knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    pub allocator: AllocatorKind,
    pub schedule: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            allocator: AllocatorKind::GraphColoring,
            schedule: true,
        }
    }
}

/// What every target implements: pointer size plus the entry point that
/// runs instruction selection and the full pass pipeline for one module,
/// producing assembly text.
pub trait TargetIsa {
    fn ptr_size(&self) -> u32;
    fn compile(&self, module: &ssa::Module, options: &BackendOptions) -> String;
}

/// Resolve an architecture name to its [`TargetIsa`], the way the example
/// backend's own `isa::lookup` resolves a `target_lexicon::Triple` down to
/// an `Architecture` variant. `name` may be a friendly alias
/// (`"aarch32"`/`"arm32"`, `"rv32"`) or any triple/architecture component
/// `target_lexicon` itself recognizes (`"armv7"`, `"riscv32"`, ...); both
/// forms are normalized to a canonical token and parsed through
/// `Triple::from_str` before dispatching on its architecture. The sole
/// user-visible recoverable error in this crate.
pub fn select(name: &str) -> Result<Box<dyn TargetIsa>, BackendError> {
    let canonical = match name {
        "aarch32" | "arm32" => "armv7",
        "rv32" => "riscv32",
        other => other,
    };

    let unknown = || BackendError::UnknownArchitecture(name.to_string());
    let triple = Triple::from_str(canonical).map_err(|_| unknown())?;

    match triple.architecture {
        Architecture::Arm { .. } => Ok(Box::new(arm32::AArch32Isa::new())),
        Architecture::Riscv32 { .. } => Ok(Box::new(riscv32::Riscv32Isa::new())),
        _ => Err(unknown()),
    }
}
