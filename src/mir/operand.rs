//! MIR operands.
//!
//! An operand is a small `Copy` sum type over five kinds (physical
//! register, virtual register, immediate, label, stack slot). The example
//! backend this crate is grounded on represents operands as
//! `shared_ptr<OperandBase>` and relies on pointer-identity hashing to get
//! "each (register, immediate, slot) has one canonical operand" for free;
//! in Rust, a `Copy` enum with a derived `PartialEq`/`Hash` gives the same
//! semantic uniqueness without any sharing at all, *except* for the two
//! kinds whose payload is itself compound (a slot's base+offset, a
//! label's name) where we still want a canonical small handle instead of
//! repeatedly comparing strings or nested structures; those go through the
//! interning tables in this module, keyed by `(base, offset)` and by name
//! respectively. See `src/DESIGN.md` for the reasoning.

use crate::entity::PrimaryMap;
use crate::entity_ref;
use std::collections::HashMap;
use std::fmt;

entity_ref! {
    /// A yet-to-be-allocated value, indexing into a function's vreg table.
    pub struct VRegId;
}
entity_ref! {
    /// An interned label (code or data address reference).
    pub struct LabelId;
}
entity_ref! {
    /// An interned `[base + offset]` memory reference.
    pub struct SlotId;
}

/// A target's physical register name. Each ISA provides its own `enum`
/// (see [`crate::isa::arm32::registers::RegName`] and
/// [`crate::isa::riscv32::registers::RegName`]) and marks it with this
/// trait so the MIR infrastructure in this module stays ISA-agnostic.
pub trait Register: Copy + Eq + std::hash::Hash + fmt::Debug + fmt::Display + 'static {}

/// A MIR operand, generic over the target's physical register type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand<R: Register> {
    Reg(R),
    Virtual(VRegId),
    Imm(i32),
    Label(LabelId),
    Slot(SlotId),
}

impl<R: Register> Operand<R> {
    pub fn is_reg(&self) -> bool {
        matches!(self, Operand::Reg(_) | Operand::Virtual(_))
    }
    pub fn is_virtual(&self) -> bool {
        matches!(self, Operand::Virtual(_))
    }
    pub fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }
    pub fn is_label(&self) -> bool {
        matches!(self, Operand::Label(_))
    }
    pub fn is_slot(&self) -> bool {
        matches!(self, Operand::Slot(_))
    }

    pub fn as_imm(&self) -> Option<i32> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_phys(&self) -> Option<R> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_virtual(&self) -> Option<VRegId> {
        match self {
            Operand::Virtual(v) => Some(*v),
            _ => None,
        }
    }
}

impl<R: Register> fmt::Debug for Operand<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Virtual(v) => write!(f, "vreg[{}]", v.index()),
            Operand::Imm(i) => write!(f, "#{}", i),
            Operand::Label(l) => write!(f, "label[{}]", l.index()),
            Operand::Slot(s) => write!(f, "slot[{}]", s.index()),
        }
    }
}

/// A yet-to-be-allocated value: carries its size and, once the register
/// allocator has run, the physical register or stack slot it was bound to.
/// `alloc_to` is written exactly once, by register allocation, and read
/// during spill insertion and emission.
#[derive(Clone)]
pub struct VRegData<R: Register> {
    pub size: u32,
    pub alloc_to: Option<Operand<R>>,
    /// Number of operand positions (uses + one def, if any) this vreg
    /// appears in; consulted by the graph-coloring spill heuristic.
    pub use_count: u32,
}

/// A `[base + offset]` memory reference. The base is itself a register
/// operand (physical or virtual); slots never nest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotData<R: Register> {
    pub base: Operand<R>,
    pub offset: i32,
}

/// Owns the per-function intern tables for virtual registers, labels and
/// slots, plus the constructors ("factories", in the spec's vocabulary)
/// that enforce the uniqueness invariants in section 3 of the spec.
pub struct OperandPool<R: Register> {
    vregs: PrimaryMap<VRegId, VRegData<R>>,
    labels: PrimaryMap<LabelId, String>,
    label_index: HashMap<String, LabelId>,
    next_anon_label: u32,
    slots: PrimaryMap<SlotId, SlotData<R>>,
    slot_index: HashMap<(Operand<R>, i32), SlotId>,
}

impl<R: Register> Default for OperandPool<R> {
    fn default() -> Self {
        Self {
            vregs: PrimaryMap::new(),
            labels: PrimaryMap::new(),
            label_index: HashMap::new(),
            next_anon_label: 0,
            slots: PrimaryMap::new(),
            slot_index: HashMap::new(),
        }
    }
}

impl<R: Register> OperandPool<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh 4-byte virtual register. Every call returns a
    /// distinct id (property: virtual-register fresh IDs).
    pub fn new_vreg(&mut self) -> Operand<R> {
        self.new_vreg_sized(4)
    }

    /// Allocate a fresh virtual register of the given size in bytes.
    pub fn new_vreg_sized(&mut self, size: u32) -> Operand<R> {
        let id = self.vregs.push(VRegData {
            size,
            alloc_to: None,
            use_count: 0,
        });
        Operand::Virtual(id)
    }

    pub fn vreg(&self, id: VRegId) -> &VRegData<R> {
        &self.vregs[id]
    }

    pub fn vreg_mut(&mut self, id: VRegId) -> &mut VRegData<R> {
        &mut self.vregs[id]
    }

    pub fn vreg_ids(&self) -> impl Iterator<Item = VRegId> + '_ {
        self.vregs.keys()
    }

    /// Record that `operand` appears in one more operand position. No-op
    /// for anything but a virtual register.
    pub fn note_use(&mut self, operand: Operand<R>) {
        if let Operand::Virtual(id) = operand {
            self.vregs[id].use_count += 1;
        }
    }

    pub fn alloc_to(&self, operand: Operand<R>) -> Operand<R> {
        match operand {
            Operand::Virtual(id) => self.vregs[id]
                .alloc_to
                .expect("virtual register read before allocation"),
            other => other,
        }
    }

    /// Get the canonical operand for a named label, interning it.
    pub fn get_label(&mut self, name: &str) -> Operand<R> {
        if let Some(&id) = self.label_index.get(name) {
            return Operand::Label(id);
        }
        let id = self.labels.push(name.to_string());
        self.label_index.insert(name.to_string(), id);
        Operand::Label(id)
    }

    /// Get a fresh anonymous local label (e.g. `.L0`, `.L1`, ...).
    pub fn new_anon_label(&mut self) -> Operand<R> {
        let name = format!(".L{}", self.next_anon_label);
        self.next_anon_label += 1;
        self.get_label(&name)
    }

    pub fn label_name(&self, id: LabelId) -> &str {
        &self.labels[id]
    }

    /// Get the canonical slot operand for `(base, offset)`, interning it.
    pub fn get_slot(&mut self, base: Operand<R>, offset: i32) -> Operand<R> {
        debug_assert!(base.is_reg(), "slot base must be a register operand");
        if let Some(&id) = self.slot_index.get(&(base, offset)) {
            return Operand::Slot(id);
        }
        let id = self.slots.push(SlotData { base, offset });
        self.slot_index.insert((base, offset), id);
        Operand::Slot(id)
    }

    pub fn slot(&self, id: SlotId) -> SlotData<R> {
        self.slots[id]
    }

    /// Rewrite a slot operand's offset in place, re-interning it under the
    /// new offset. Used by prologue/epilogue synthesis, which must shift
    /// every positive-offset in-frame slot by the size of the saved-register
    /// area after it has already assigned offsets.
    pub fn reoffset_slot(&mut self, id: SlotId, new_offset: i32) -> Operand<R> {
        let base = self.slots[id].base;
        self.get_slot(base, new_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::riscv32::registers::RegName;
    use proptest::prelude::*;

    #[test]
    fn interning_a_slot_twice_yields_the_same_operand() {
        let mut pool: OperandPool<RegName> = OperandPool::new();
        let base = Operand::Reg(RegName::Sp);
        let a = pool.get_slot(base, 12);
        let b = pool.get_slot(base, 12);
        assert_eq!(a, b);
        assert_eq!(pool.slots.len(), 1);
    }

    #[test]
    fn interning_a_label_twice_yields_the_same_operand() {
        let mut pool: OperandPool<RegName> = OperandPool::new();
        let a = pool.get_label("g");
        let b = pool.get_label("g");
        assert_eq!(a, b);
        assert_eq!(pool.labels.len(), 1);
    }

    proptest! {
        /// Invariant 1: every distinct `(base, offset)` pair interns to a
        /// distinct slot id, and re-requesting an already-seen pair never
        /// grows the pool.
        #[test]
        fn slot_interning_is_unique_per_offset(offsets in prop::collection::vec(-4096i32..4096, 1..16)) {
            let mut pool: OperandPool<RegName> = OperandPool::new();
            let base = Operand::Reg(RegName::Sp);
            let mut seen = std::collections::HashMap::new();
            for offset in offsets {
                let slot = pool.get_slot(base, offset);
                let again = pool.get_slot(base, offset);
                prop_assert_eq!(slot, again);
                if let Some(&previous) = seen.get(&offset) {
                    prop_assert_eq!(slot, previous);
                } else {
                    seen.insert(offset, slot);
                }
            }
            prop_assert_eq!(pool.slots.len(), seen.len());
        }
    }
}
