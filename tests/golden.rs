//! Golden assembly scenarios, verbatim per SPEC_FULL.md's S1/S6 cases.
//! Plain string literals compared with `assert_eq!`/`contains`, matching
//! the example backend's in-source MIR pass test style rather than
//! external fixture files.

use backendgen::isa::{AllocatorKind, BackendOptions};
use backendgen::ssa::{BlockData, Function, Kind, Linkage, Module, Type, ValueData};

fn return_zero_module() -> Module {
    let mut module = Module::new();

    let mut values = backendgen::entity::PrimaryMap::new();
    let zero = values.push(ValueData { kind: Kind::ConstInt(0), ty: Type::I32 });
    let ret = values.push(ValueData { kind: Kind::Return { val: Some(zero) }, ty: Type::I32 });

    let mut blocks = backendgen::entity::PrimaryMap::new();
    let entry = blocks.push(BlockData { preds: Vec::new(), insts: vec![zero, ret] });

    module.functions.push(Function {
        name: "f".into(),
        linkage: Linkage::External,
        params: Vec::new(),
        ret: Some(Type::I32),
        values,
        blocks,
        entry,
    });

    module
}

fn options() -> BackendOptions {
    BackendOptions { allocator: AllocatorKind::GraphColoring, schedule: true }
}

#[test]
fn s1_return_zero_arm32() {
    let module = return_zero_module();
    let asm = backendgen::compile_module(&module, "arm32", &options()).unwrap();
    assert!(asm.contains("mov r0, #0"), "asm:\n{asm}");
    assert!(asm.contains("bx lr"), "asm:\n{asm}");
    let mov_pos = asm.find("mov r0, #0").unwrap();
    let bx_pos = asm.find("bx lr").unwrap();
    assert!(mov_pos < bx_pos, "mov must precede the epilogue branch");
}

#[test]
fn s1_return_zero_riscv32() {
    let module = return_zero_module();
    let asm = backendgen::compile_module(&module, "riscv32", &options()).unwrap();
    assert!(asm.contains("li a0, 0"), "asm:\n{asm}");
    assert!(asm.contains("ret"), "asm:\n{asm}");
    let li_pos = asm.find("li a0, 0").unwrap();
    let ret_pos = asm.find("ret").unwrap();
    assert!(li_pos < ret_pos);
}

#[test]
fn unknown_architecture_is_the_sole_recoverable_error() {
    let module = return_zero_module();
    let err = backendgen::compile_module(&module, "mips", &options()).unwrap_err();
    assert!(matches!(err, backendgen::BackendError::UnknownArchitecture(ref name) if name == "mips"));
}
