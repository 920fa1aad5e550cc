//! SSA → AArch32 MIR instruction selection.
//!
//! One [`Selector`] is built per function; it owns the [`MirFunction`]
//! being built and a [`ValueCache`] memoizing each SSA value's MIR
//! operand, so `generate_on` is safe to call repeatedly for the same
//! value (every later use after the first is a cache hit, per §4.1).

use crate::isa::arm32::abi::{arg_location, ArgLocation};
use crate::isa::arm32::inst::{Inst, OpCode};
use crate::isa::arm32::registers::{FP, LR, RETURN_REG};
use crate::mir::function::MirFunction;
use crate::mir::module::{DataDirective, DataWord, MemoryData};
use crate::mir::operand::Operand;
use crate::ssa;
use crate::ssa::codegen::{CodeGenerator, GlobalCache, ValueCache};
use std::collections::HashMap;

use super::registers::RegName;

pub struct Selector<'m> {
    module: &'m ssa::Module,
    func: &'m ssa::Function,
    pub mir: MirFunction<RegName, Inst>,
    cache: ValueCache<RegName>,
    globals: &'m mut GlobalCache<RegName>,
    data: &'m mut Vec<MemoryData>,
    block_labels: HashMap<ssa::BlockId, Operand<RegName>>,
    arg_slots: Vec<Operand<RegName>>,
}

impl<'m> Selector<'m> {
    pub fn new(
        module: &'m ssa::Module,
        func: &'m ssa::Function,
        globals: &'m mut GlobalCache<RegName>,
        data: &'m mut Vec<MemoryData>,
    ) -> Self {
        let mut mir = MirFunction::new(func.name.clone(), func.linkage);
        let block_labels = func
            .block_order()
            .map(|b| (b, mir.operands.new_anon_label()))
            .collect();
        Self {
            module,
            func,
            mir,
            cache: ValueCache::new(),
            globals,
            data,
            block_labels,
            arg_slots: Vec::new(),
        }
    }

    /// Lower every block of the function in layout order, returning the
    /// finished (still virtual-register-only) MIR function.
    pub fn run(mut self) -> MirFunction<RegName, Inst> {
        self.bind_arguments();
        for block in self.func.block_order() {
            let label = self.block_labels[&block];
            self.mir.push(Inst::label(label));
            let insts: Vec<ssa::ValueId> = self.func.blocks[block].insts.clone();
            for value in insts {
                self.generate_on(value);
            }
        }
        self.mir
    }

    fn bind_arguments(&mut self) {
        for (index, _ty) in self.func.params.iter().enumerate() {
            match arg_location(index) {
                ArgLocation::Reg(reg) => {
                    let dest = self.mir.operands.new_vreg();
                    self.mir.push(Inst::new(OpCode::Mov, Some(dest), &[Operand::Reg(reg)]));
                    self.arg_slots.push(dest);
                }
                ArgLocation::StackOffset(offset) => {
                    // Positive offset from the frame boundary; rebased by
                    // the saved-register area's size once prologue
                    // synthesis knows how large that area actually is.
                    let slot = self.mir.operands.get_slot(Operand::Reg(FP), offset);
                    self.arg_slots.push(slot);
                }
            }
        }
    }

    fn load_op(&mut self, size: u32) -> OpCode {
        if size == 1 {
            OpCode::Ldrb
        } else {
            let _ = size;
            OpCode::Ldr
        }
    }

    fn store_op(&mut self, size: u32) -> OpCode {
        if size == 1 {
            OpCode::Strb
        } else {
            OpCode::Str
        }
    }

    fn global_operand(&mut self, global: ssa::GlobalId) -> Operand<RegName> {
        if let Some(op) = self.globals.get(global) {
            return op;
        }
        let name = self.module.globals[global].name.clone();
        let label = self.mir.operands.get_label(&name);
        self.globals.insert(global, label);
        label
    }

    fn emit_const_data(&mut self, value: i64) -> Operand<RegName> {
        let label = self.mir.operands.new_anon_label();
        let name = match label {
            Operand::Label(id) => self.mir.operands.label_name(id).to_string(),
            _ => unreachable!(),
        };
        self.data.push(MemoryData {
            name,
            linkage: ssa::Linkage::Internal,
            directives: vec![DataDirective::Long(DataWord::Int(value as i32))],
        });
        label
    }

    fn emit_str_data(&mut self, s: &str) -> Operand<RegName> {
        let label = self.mir.operands.new_anon_label();
        let name = match label {
            Operand::Label(id) => self.mir.operands.label_name(id).to_string(),
            _ => unreachable!(),
        };
        self.data.push(MemoryData {
            name,
            linkage: ssa::Linkage::Internal,
            directives: vec![DataDirective::Asciz(s.to_string())],
        });
        label
    }
}

impl<'m> CodeGenerator<RegName> for Selector<'m> {
    fn generate_on(&mut self, value: ssa::ValueId) -> Operand<RegName> {
        if let Some(cached) = self.cache.get(value) {
            return cached;
        }

        let data = self.func.value(value).clone();
        let result = match data.kind {
            ssa::Kind::Load { ptr } => {
                let addr = self.generate_on(ptr);
                let dest = self.mir.operands.new_vreg_sized(data.ty.size());
                let op = self.load_op(data.ty.size());
                self.mir.push(Inst::new(op, Some(dest), &[addr]));
                dest
            }
            ssa::Kind::Store { value: val, ptr } => {
                let addr = self.generate_on(ptr);
                let val_op = self.generate_on(val);
                let size = self.func.value(val).ty.size();
                let op = self.store_op(size);
                self.mir.push(Inst::new(op, None, &[val_op, addr]));
                Operand::Imm(0)
            }
            ssa::Kind::Access { kind, base, index } => {
                let base_op = self.generate_on(base);
                let index_op = self.generate_on(index);
                let dest = self.mir.operands.new_vreg();
                match kind {
                    ssa::AccessKind::Pointer => {
                        self.mir.push(Inst::new(OpCode::Lea, Some(dest), &[base_op, index_op]));
                    }
                    ssa::AccessKind::Element => {
                        // LEA dest, base, index; shift-combining later folds
                        // a preceding LSL #2 (scale) into this slot when
                        // index is itself a shift result.
                        self.mir.push(Inst::new(OpCode::Lea, Some(dest), &[base_op, index_op]));
                    }
                }
                dest
            }
            ssa::Kind::Binary { op, lhs, rhs } => {
                let lhs_op = self.generate_on(lhs);
                let rhs_op = self.generate_on(rhs);
                let dest = self.mir.operands.new_vreg();
                if op.is_cmp() {
                    let setcc = match op {
                        ssa::BinaryOp::Eq => OpCode::SetEq,
                        ssa::BinaryOp::Ne => OpCode::SetNe,
                        ssa::BinaryOp::ULt => OpCode::SetULt,
                        ssa::BinaryOp::SLt => OpCode::SetSLt,
                        ssa::BinaryOp::ULe => OpCode::SetULe,
                        ssa::BinaryOp::SLe => OpCode::SetSLe,
                        ssa::BinaryOp::UGt => OpCode::SetUGt,
                        ssa::BinaryOp::SGt => OpCode::SetSGt,
                        ssa::BinaryOp::UGe => OpCode::SetUGe,
                        ssa::BinaryOp::SGe => OpCode::SetSGe,
                        _ => unreachable!(),
                    };
                    self.mir.push(Inst::new(setcc, Some(dest), &[lhs_op, rhs_op]));
                } else {
                    let arith = match op {
                        ssa::BinaryOp::Add => OpCode::Add,
                        ssa::BinaryOp::Sub => OpCode::Sub,
                        ssa::BinaryOp::Mul => OpCode::Mul,
                        ssa::BinaryOp::UDiv => OpCode::Udiv,
                        ssa::BinaryOp::SDiv => OpCode::Sdiv,
                        ssa::BinaryOp::URem | ssa::BinaryOp::SRem => {
                            // No remainder instruction: q = a/b; r = a - q*b
                            let div_op = if matches!(op, ssa::BinaryOp::URem) {
                                OpCode::Udiv
                            } else {
                                OpCode::Sdiv
                            };
                            let q = self.mir.operands.new_vreg();
                            self.mir.push(Inst::new(div_op, Some(q), &[lhs_op, rhs_op]));
                            self.mir.push(Inst::new(OpCode::Mls, Some(dest), &[q, rhs_op, lhs_op]));
                            return self.finish(value, dest);
                        }
                        ssa::BinaryOp::And => OpCode::And,
                        ssa::BinaryOp::Or => OpCode::Orr,
                        ssa::BinaryOp::Xor => OpCode::Eor,
                        ssa::BinaryOp::Shl => OpCode::Lsl,
                        ssa::BinaryOp::LShr => OpCode::Lsr,
                        ssa::BinaryOp::AShr => OpCode::Asr,
                        _ => unreachable!(),
                    };
                    self.mir.push(Inst::new(arith, Some(dest), &[lhs_op, rhs_op]));
                }
                dest
            }
            ssa::Kind::Unary { op, val } => {
                let val_op = self.generate_on(val);
                let dest = self.mir.operands.new_vreg();
                match op {
                    ssa::UnaryOp::Neg => {
                        self.mir.push(Inst::new(OpCode::Rsb, Some(dest), &[val_op, Operand::Imm(0)]));
                    }
                    ssa::UnaryOp::Not => {
                        self.mir.push(Inst::new(OpCode::SetEq, Some(dest), &[val_op, Operand::Imm(0)]));
                    }
                    ssa::UnaryOp::BitNot => {
                        self.mir.push(Inst::new(OpCode::Mvn, Some(dest), &[val_op]));
                    }
                }
                dest
            }
            ssa::Kind::Cast { val } => {
                let val_op = self.generate_on(val);
                let from_size = self.func.value(val).ty.size();
                let to_size = data.ty.size();
                if to_size > from_size {
                    let dest = self.mir.operands.new_vreg();
                    let op = if self.func.value(val).ty.is_signed() { OpCode::Sxtb } else { OpCode::Uxtb };
                    self.mir.push(Inst::new(op, Some(dest), &[val_op]));
                    dest
                } else {
                    val_op
                }
            }
            ssa::Kind::Call { callee, args } => {
                for (i, &arg) in args.iter().enumerate() {
                    let arg_op = self.generate_on(arg);
                    match arg_location(i) {
                        ArgLocation::Reg(reg) => {
                            self.mir.push(Inst::new(OpCode::Mov, Some(Operand::Reg(reg)), &[arg_op]));
                        }
                        ArgLocation::StackOffset(offset) => {
                            let slot = self.mir.operands.get_slot(Operand::Reg(crate::isa::arm32::registers::SP), offset);
                            self.mir.push(Inst::new(OpCode::Str, None, &[arg_op, slot]));
                        }
                    }
                }
                let target = match callee {
                    ssa::Callee::Direct(func_id) => {
                        let name = self.module.functions[func_id].name.clone();
                        self.mir.operands.get_label(&name)
                    }
                    ssa::Callee::Indirect(val) => self.generate_on(val),
                };
                self.mir.push(Inst::new(OpCode::Bl, None, &[target]));
                let dest = self.mir.operands.new_vreg();
                self.mir.push(Inst::new(OpCode::Mov, Some(dest), &[Operand::Reg(RETURN_REG)]));
                dest
            }
            ssa::Kind::Branch { cond, then_blk, else_blk } => {
                let cond_op = self.generate_on(cond);
                let then_label = self.block_labels[&then_blk];
                let else_label = self.block_labels[&else_blk];
                self.mir.push(Inst::pseudo_br(cond_op, then_label, else_label));
                Operand::Imm(0)
            }
            ssa::Kind::Jump { target } => {
                let label = self.block_labels[&target];
                self.mir.push(Inst::branch(OpCode::B, label));
                Operand::Imm(0)
            }
            ssa::Kind::Return { val } => {
                if let Some(val) = val {
                    let val_op = self.generate_on(val);
                    self.mir.push(Inst::new(OpCode::Mov, Some(Operand::Reg(RETURN_REG)), &[val_op]));
                }
                self.mir.push(Inst::new(OpCode::Bx, None, &[Operand::Reg(LR)]));
                Operand::Imm(0)
            }
            ssa::Kind::GlobalRef { global } => {
                let label = self.global_operand(global);
                let dest = self.mir.operands.new_vreg();
                self.mir.push(Inst::new(OpCode::Lea, Some(dest), &[label, Operand::Imm(0)]));
                dest
            }
            ssa::Kind::Alloca => {
                let offset = self.mir.slots.allocate(data.ty.size());
                self.mir.operands.get_slot(Operand::Reg(FP), offset)
            }
            ssa::Kind::ArgRef { index } => self.arg_slots[index],
            ssa::Kind::ConstInt(v) => {
                if let Ok(imm) = i32::try_from(v) {
                    Operand::Imm(imm)
                } else {
                    self.emit_const_data(v)
                }
            }
            ssa::Kind::ConstStr(s) => self.emit_str_data(&s),
            ssa::Kind::ConstZero => Operand::Imm(0),
            ssa::Kind::ConstAggregate(elems) => {
                for &e in &elems {
                    self.generate_on(e);
                }
                elems.first().map(|&e| self.cache.get(e).unwrap()).unwrap_or(Operand::Imm(0))
            }
            ssa::Kind::Select { cond, then_val, else_val } => {
                let cond_op = self.generate_on(cond);
                let dest = self.mir.operands.new_vreg();
                let then_label = self.mir.operands.new_anon_label();
                let else_label = self.mir.operands.new_anon_label();
                let join_label = self.mir.operands.new_anon_label();
                self.mir.push(Inst::pseudo_br(cond_op, then_label, else_label));
                self.mir.push(Inst::label(then_label));
                let then_op = self.generate_on(then_val);
                self.mir.push(Inst::new(OpCode::Mov, Some(dest), &[then_op]));
                self.mir.push(Inst::branch(OpCode::B, join_label));
                self.mir.push(Inst::label(else_label));
                let else_op = self.generate_on(else_val);
                self.mir.push(Inst::new(OpCode::Mov, Some(dest), &[else_op]));
                self.mir.push(Inst::label(join_label));
                dest
            }
            ssa::Kind::Undef => {
                let dest = self.mir.operands.new_vreg();
                self.mir.push(Inst::new(OpCode::Mov, Some(dest), &[Operand::Imm(0)]));
                dest
            }
        };

        self.cache.insert(value, result);
        result
    }
}

impl<'m> Selector<'m> {
    fn finish(&mut self, value: ssa::ValueId, result: Operand<RegName>) -> Operand<RegName> {
        self.cache.insert(value, result);
        result
    }
}
