use core::fmt;

use crate::error::{Error, Result};

/// Number of addressable general-purpose registers, excluding the zero
/// register `RZ`.
pub const NUM_USER_REGS: usize = 255;

/// Number of addressable predicates, excluding the always-true `PT`.
pub const NUM_USER_PREDS: usize = 7;

/// A source-ISA general-purpose register name.
///
/// Index 255 is the hardwired zero register `RZ`: reads yield 0 and writes
/// are discarded. `RZ` never becomes an SSA variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(u8);

impl Reg {
    pub const RZ: Reg = Reg(255);

    pub fn new(index: u32) -> Result<Reg> {
        if index > 255 {
            return Err(Error::invalid_argument(format!(
                "register index {index} out of range"
            )));
        }
        Ok(Reg(index as u8))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn is_rz(self) -> bool {
        self == Reg::RZ
    }

    /// The register `offset` slots above this one. Used for 64-bit results
    /// split across a register pair.
    pub fn offset(self, offset: u32) -> Result<Reg> {
        let index = u32::from(self.0) + offset;
        if index >= 255 {
            return Err(Error::invalid_argument(format!(
                "register pair overflows the register file: R{} + {offset}",
                self.0
            )));
        }
        Ok(Reg(index as u8))
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rz() {
            write!(f, "RZ")
        } else {
            write!(f, "R{}", self.0)
        }
    }
}

/// A source-ISA predicate name. Index 7 is the always-true predicate `PT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pred(u8);

impl Pred {
    pub const PT: Pred = Pred(7);

    pub fn new(index: u32) -> Result<Pred> {
        if index > 7 {
            return Err(Error::invalid_argument(format!(
                "predicate index {index} out of range"
            )));
        }
        Ok(Pred(index as u8))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn is_pt(self) -> bool {
        self == Pred::PT
    }
}

impl fmt::Display for Pred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pt() {
            write!(f, "PT")
        } else {
            write!(f, "P{}", self.0)
        }
    }
}
