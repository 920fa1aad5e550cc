//! A function's machine-IR instruction list plus everything selection and
//! the pass pipeline need to own alongside it: the operand pool and the
//! in-frame slot allocator.

use crate::mir::inst::MirInst;
use crate::mir::operand::{OperandPool, Register};
use crate::ssa::Linkage;

/// Hands out stack slots for one function. Every allocation rounds up to
/// 4 bytes and grows the frame downward from the frame pointer, mirroring
/// the example backend's slot allocator: "rounds sizes up to 4 bytes and
/// issues negative frame-pointer offsets."
#[derive(Debug, Clone, Default)]
pub struct SlotAllocator {
    next_offset: i32,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self { next_offset: 0 }
    }

    /// Reserve `size` bytes and return the (negative) frame-pointer offset
    /// of the first byte.
    pub fn allocate(&mut self, size: u32) -> i32 {
        let rounded = (size + 3) & !3;
        self.next_offset -= rounded as i32;
        self.next_offset
    }

    /// Total bytes reserved so far (always a multiple of 4).
    pub fn total_size(&self) -> u32 {
        (-self.next_offset) as u32
    }
}

/// One function's machine IR: its instruction sequence, its operand pool
/// (virtual registers, labels, slots), and its in-frame slot allocator.
pub struct MirFunction<R: Register, I: MirInst<R>> {
    pub name: String,
    pub linkage: Linkage,
    pub insts: Vec<I>,
    pub operands: OperandPool<R>,
    pub slots: SlotAllocator,
}

impl<R: Register, I: MirInst<R>> MirFunction<R, I> {
    pub fn new(name: String, linkage: Linkage) -> Self {
        Self {
            name,
            linkage,
            insts: Vec::new(),
            operands: OperandPool::new(),
            slots: SlotAllocator::new(),
        }
    }

    pub fn push(&mut self, inst: I) {
        for src in inst.srcs() {
            self.operands.note_use(*src);
        }
        if let Some(dest) = inst.dest() {
            self.operands.note_use(dest);
        }
        self.insts.push(inst);
    }

    /// Every source and destination operand of a finalized (post-spill)
    /// instruction must be physical, a slot, an immediate or a label —
    /// never a virtual register. Used by tests and by callers that want
    /// to assert the pipeline actually finished.
    pub fn assert_no_virtuals(&self) {
        for inst in &self.insts {
            for src in inst.srcs() {
                assert!(!src.is_virtual(), "unallocated virtual register reached emission");
            }
            if let Some(dest) = inst.dest() {
                assert!(!dest.is_virtual(), "unallocated virtual register reached emission");
            }
        }
    }
}
