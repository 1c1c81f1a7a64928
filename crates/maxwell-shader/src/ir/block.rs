use core::fmt;

use smallvec::SmallVec;

use crate::ir::inst::InstId;

/// Stable handle of a block in its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    pub(crate) fn new(index: usize) -> BlockId {
        BlockId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A basic block: an ordered instruction list plus the CFG edges recorded as
/// branches are laid down.
#[derive(Default)]
pub struct Block {
    pub(crate) insts: Vec<InstId>,
    pub(crate) preds: SmallVec<[BlockId; 2]>,
    pub(crate) succs: SmallVec<[BlockId; 2]>,
}

impl Block {
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    pub fn immediate_predecessors(&self) -> &[BlockId] {
        &self.preds
    }

    pub fn successors(&self) -> &[BlockId] {
        &self.succs
    }

    pub(crate) fn add_immediate_predecessor(&mut self, pred: BlockId) {
        if !self.preds.contains(&pred) {
            self.preds.push(pred);
        }
    }
}
