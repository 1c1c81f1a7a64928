use core::cell::Cell;
use core::fmt;

use smallvec::SmallVec;

use crate::ir::block::BlockId;
use crate::ir::modifiers::InstFlags;
use crate::ir::opcode::{Opcode, NUM_PSEUDO_OPS};
use crate::ir::types::Type;
use crate::ir::value::Value;

/// Stable handle of an instruction in its function's arena.
///
/// Arena slots are never reused within one compile, so two equal ids always
/// name the same instruction; value identity is id identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(u32);

impl InstId {
    pub(crate) fn new(index: usize) -> InstId {
        InstId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A single IR instruction.
///
/// The opcode and use count live in `Cell`s: backends walk the program
/// through shared references and still need to retire uses and invalidate
/// consumed pseudo-operations. Structural mutation (argument lists, users)
/// goes through `&mut Function`.
pub struct Inst {
    pub(crate) opcode: Cell<Opcode>,
    pub(crate) flags: InstFlags,
    pub(crate) args: SmallVec<[Value; 4]>,
    /// φ operands, one per immediate predecessor of the containing block.
    pub(crate) phi_args: Vec<(BlockId, Value)>,
    pub(crate) uses: Cell<u32>,
    /// Referring instructions, one entry per argument edge.
    pub(crate) users: SmallVec<[InstId; 4]>,
    /// Associated secondary-result instructions, indexed by `PseudoOp`.
    pub(crate) assoc: [Option<InstId>; NUM_PSEUDO_OPS],
    /// Type of a φ-node, latched from its first typed operand.
    pub(crate) phi_type: Cell<Option<Type>>,
}

impl Inst {
    pub(crate) fn new(opcode: Opcode, flags: InstFlags) -> Inst {
        Inst {
            opcode: Cell::new(opcode),
            flags,
            args: SmallVec::new(),
            phi_args: Vec::new(),
            uses: Cell::new(0),
            users: SmallVec::new(),
            assoc: [None; NUM_PSEUDO_OPS],
            phi_type: Cell::new(None),
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode.get()
    }

    pub fn flags(&self) -> &InstFlags {
        &self.flags
    }

    /// Arguments of a live instruction. Invalidated instructions report an
    /// empty list even though the arena storage is retained.
    pub fn args(&self) -> &[Value] {
        if self.opcode.get() == Opcode::Void {
            &[]
        } else {
            &self.args
        }
    }

    pub fn phi_args(&self) -> &[(BlockId, Value)] {
        if self.opcode.get() == Opcode::Void {
            &[]
        } else {
            &self.phi_args
        }
    }

    pub fn num_args(&self) -> usize {
        if self.is_phi() {
            self.phi_args().len()
        } else {
            self.args().len()
        }
    }

    /// Argument `index`; for φ-nodes this indexes the operand list.
    pub fn arg(&self, index: usize) -> Value {
        if self.is_phi() {
            self.phi_args
                .get(index)
                .map(|(_, value)| *value)
                .unwrap_or(Value::Empty)
        } else {
            self.args.get(index).copied().unwrap_or(Value::Empty)
        }
    }

    pub fn uses(&self) -> u32 {
        self.uses.get()
    }

    pub fn has_uses(&self) -> bool {
        self.uses.get() > 0
    }

    pub fn is_phi(&self) -> bool {
        self.opcode.get().is_phi()
    }

    pub(crate) fn add_use(&self) {
        self.uses.set(self.uses.get() + 1);
    }

    pub(crate) fn remove_use(&self) {
        let count = self.uses.get();
        debug_assert!(count > 0, "use count underflow");
        self.uses.set(count.saturating_sub(1));
    }
}
