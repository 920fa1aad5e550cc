//! A compiled module: every function's machine IR plus the data section.

use crate::mir::function::MirFunction;
use crate::mir::inst::MirInst;
use crate::mir::operand::Register;
use crate::ssa;
use crate::ssa::Linkage;

/// One directive in a global's or string literal's data-section entry.
#[derive(Debug, Clone)]
pub enum DataDirective {
    /// Reserve `n` zeroed bytes (`.zero n`).
    Zero(u32),
    /// Emit a NUL-terminated string (`.asciz "..."`).
    Asciz(String),
    /// Emit one 32-bit little-endian word (`.long n`, or a label address).
    Long(DataWord),
    /// Emit one byte (`.byte n`).
    Byte(u8),
}

/// The value a `.long` directive emits: either a literal or a reference to
/// another label (for pointer-typed aggregate fields).
#[derive(Debug, Clone)]
pub enum DataWord {
    Int(i32),
    Label(String),
}

/// A global variable or string literal's data-section entry.
pub struct MemoryData {
    pub name: String,
    pub linkage: Linkage,
    pub directives: Vec<DataDirective>,
}

/// Every function and every piece of static data the emitter needs to
/// dump, keyed by label the way the spec's data model describes ("two
/// mappings keyed by label: functions and memory-data").
pub struct MirModule<R: Register, I: MirInst<R>> {
    pub functions: Vec<MirFunction<R, I>>,
    pub data: Vec<MemoryData>,
}

impl<R: Register, I: MirInst<R>> Default for MirModule<R, I> {
    fn default() -> Self {
        Self {
            functions: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl<R: Register, I: MirInst<R>> MirModule<R, I> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lower every `global_var` in an SSA module to its data-section entry.
/// Shared by every target's `compile`, since the directive shape
/// (`.zero`/`.asciz`/`.long`/`.byte`) carries no ISA-specific state.
pub fn lower_globals(module: &ssa::Module) -> Vec<MemoryData> {
    module
        .globals
        .iter()
        .map(|(_, global)| MemoryData {
            name: global.name.clone(),
            linkage: global.linkage,
            directives: lower_const(global.init.as_ref(), &global.ty),
        })
        .collect()
}

fn lower_const(init: Option<&ssa::ConstValue>, ty: &ssa::Type) -> Vec<DataDirective> {
    match init {
        None | Some(ssa::ConstValue::Zero) => vec![DataDirective::Zero(ty.size())],
        Some(ssa::ConstValue::Int(v)) => {
            if ty.size() == 1 {
                vec![DataDirective::Byte(*v as u8)]
            } else {
                vec![DataDirective::Long(DataWord::Int(*v as i32))]
            }
        }
        Some(ssa::ConstValue::Str(s)) => vec![DataDirective::Asciz(s.clone())],
        Some(ssa::ConstValue::Struct(fields)) => {
            let field_tys = match ty {
                ssa::Type::Struct(tys) => tys.clone(),
                other => vec![other.clone(); fields.len()],
            };
            fields
                .iter()
                .zip(field_tys.iter())
                .flat_map(|(f, fty)| lower_const(Some(f), fty))
                .collect()
        }
        Some(ssa::ConstValue::Array(elems)) => {
            let elem_ty = match ty {
                ssa::Type::Array(elem, _) => (**elem).clone(),
                other => other.clone(),
            };
            elems.iter().flat_map(|e| lower_const(Some(e), &elem_ty)).collect()
        }
    }
}
