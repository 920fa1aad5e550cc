//! Top-level entry point tying architecture selection to compilation.

use crate::error::BackendError;
use crate::isa::{self, BackendOptions};
use crate::ssa;

/// Compile `module` for the named architecture (`"arm32"`/`"aarch32"` or
/// `"riscv32"`/`"rv32"`), returning the finished GNU-as assembly text.
pub fn compile_module(module: &ssa::Module, arch: &str, options: &BackendOptions) -> Result<String, BackendError> {
    let target = isa::select(arch)?;
    Ok(target.compile(module, options))
}
