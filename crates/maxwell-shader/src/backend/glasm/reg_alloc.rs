//! Backend register allocation for the assembly-style target.
//!
//! A fixed pool of 4096 four-component registers. Registers are assigned when
//! an instruction defines its result and returned to the pool when the last
//! use is consumed; scoped temporaries release on drop so every exit path
//! (including `?` propagation) restores the pool.
//!
//! All state lives behind `Cell`/`RefCell` so drop guards and the emit
//! context can share the allocator without aliasing conflicts; one compile is
//! strictly single threaded.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ir::{Function, InstId, Value};

pub const NUM_REGS: usize = 4096;
const NUM_WORDS: usize = NUM_REGS / 64;

/// A backend register name. Long registers hold 64-bit scalars and print as
/// `D#`; everything else prints as `R#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub index: u32,
    pub is_long: bool,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_long {
            write!(f, "D{}", self.index)
        } else {
            write!(f, "R{}", self.index)
        }
    }
}

/// A consumed operand: a register or an inline immediate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegOrImm {
    Reg(Register),
    U32(u32),
    S32(i32),
    F32(f32),
    U64(u64),
    F64(f64),
}

impl RegOrImm {
    pub fn register(self) -> Result<Register> {
        match self {
            RegOrImm::Reg(reg) => Ok(reg),
            other => Err(Error::logic(format!(
                "expected a register operand, got {other:?}"
            ))),
        }
    }

    /// Formats one lane of this operand; immediates ignore the lane.
    pub fn lane(&self, lane: char) -> String {
        match self {
            RegOrImm::Reg(reg) => format!("{reg}.{lane}"),
            RegOrImm::U32(v) => format!("{v}"),
            RegOrImm::S32(v) => format!("{v}"),
            RegOrImm::F32(v) => format!("{v:?}"),
            RegOrImm::U64(v) => format!("{v}"),
            RegOrImm::F64(v) => format!("{v:?}"),
        }
    }
}

impl fmt::Display for RegOrImm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegOrImm::Reg(reg) => write!(f, "{reg}"),
            RegOrImm::U32(v) => write!(f, "{v}"),
            RegOrImm::S32(v) => write!(f, "{v}"),
            RegOrImm::F32(v) => write!(f, "{v:?}"),
            RegOrImm::U64(v) => write!(f, "{v}"),
            RegOrImm::F64(v) => write!(f, "{v:?}"),
        }
    }
}

fn write_lane(f: &mut fmt::Formatter<'_>, value: &RegOrImm, lane: char) -> fmt::Result {
    match value {
        RegOrImm::Reg(reg) => write!(f, "{reg}.{lane}"),
        RegOrImm::U32(v) => write!(f, "{v}"),
        RegOrImm::S32(v) => write!(f, "{v}"),
        RegOrImm::F32(v) => write!(f, "{v:?}"),
        RegOrImm::U64(v) => write!(f, "{v}"),
        RegOrImm::F64(v) => write!(f, "{v:?}"),
    }
}

/// Scalar operand viewed as an unsigned integer.
#[derive(Debug, Clone, Copy)]
pub struct ScalarU32(pub RegOrImm);

impl fmt::Display for ScalarU32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            RegOrImm::S32(v) => write!(f, "{}", v as u32),
            ref other => write_lane(f, other, 'x'),
        }
    }
}

/// Scalar operand viewed as a signed integer.
#[derive(Debug, Clone, Copy)]
pub struct ScalarS32(pub RegOrImm);

impl fmt::Display for ScalarS32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            RegOrImm::U32(v) => write!(f, "{}", v as i32),
            ref other => write_lane(f, other, 'x'),
        }
    }
}

/// Scalar operand viewed as a 32-bit float.
#[derive(Debug, Clone, Copy)]
pub struct ScalarF32(pub RegOrImm);

impl fmt::Display for ScalarF32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            RegOrImm::U32(v) => write!(f, "{:?}", f32::from_bits(v)),
            ref other => write_lane(f, other, 'x'),
        }
    }
}

pub struct RegAlloc {
    register_use: [Cell<u64>; NUM_WORDS],
    register_defined: [Cell<u64>; NUM_WORDS],
    register_defined_long: [Cell<u64>; NUM_WORDS],
    num_used_registers: Cell<usize>,
    defs: RefCell<HashMap<InstId, Register>>,
    /// φ result registers are leased for the whole emission; the backend
    /// moves into them from predecessor blocks long after the last read.
    phi_regs: RefCell<HashMap<InstId, Register>>,
    defines: Cell<usize>,
    frees: Cell<usize>,
}

impl Default for RegAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl RegAlloc {
    pub fn new() -> RegAlloc {
        RegAlloc {
            register_use: core::array::from_fn(|_| Cell::new(0)),
            register_defined: core::array::from_fn(|_| Cell::new(0)),
            register_defined_long: core::array::from_fn(|_| Cell::new(0)),
            num_used_registers: Cell::new(0),
            defs: RefCell::new(HashMap::new()),
            phi_regs: RefCell::new(HashMap::new()),
            defines: Cell::new(0),
            frees: Cell::new(0),
        }
    }

    /// Assigns the result register of `inst`, held until its last use is
    /// consumed.
    pub fn define(&self, func: &Function, inst: InstId) -> Result<Register> {
        let is_long = func.type_of(Value::Inst(inst)).is_long();
        let reg = self.alloc(is_long)?;
        self.defs.borrow_mut().insert(inst, reg);
        Ok(reg)
    }

    /// Assigns a φ result register, kept out of the pool until
    /// [`RegAlloc::release_phis`].
    pub fn define_phi(&self, func: &Function, inst: InstId) -> Result<Register> {
        let is_long = func.type_of(Value::Inst(inst)).is_long();
        let reg = self.alloc(is_long)?;
        self.phi_regs.borrow_mut().insert(inst, reg);
        Ok(reg)
    }

    /// Register previously assigned to `inst`, without consuming a use.
    pub fn register_of(&self, inst: InstId) -> Result<Register> {
        if let Some(&reg) = self.defs.borrow().get(&inst) {
            return Ok(reg);
        }
        if let Some(&reg) = self.phi_regs.borrow().get(&inst) {
            return Ok(reg);
        }
        Err(Error::logic(format!("{inst} has no defined register")))
    }

    /// Consumes one use of `value`. Instruction results return their
    /// register, freeing it when this was the last use; immediates
    /// materialize inline.
    pub fn consume(&self, func: &Function, value: Value) -> Result<RegOrImm> {
        match func.resolve(value) {
            Value::Inst(id) => {
                let inst = func.inst(id);
                inst.remove_use();
                if let Some(&reg) = self.phi_regs.borrow().get(&id) {
                    return Ok(RegOrImm::Reg(reg));
                }
                let reg = self.register_of(id)?;
                if !inst.has_uses() {
                    self.defs.borrow_mut().remove(&id);
                    self.free(reg);
                }
                Ok(RegOrImm::Reg(reg))
            }
            Value::U1(v) => Ok(RegOrImm::S32(if v { -1 } else { 0 })),
            Value::U8(v) => Ok(RegOrImm::U32(u32::from(v))),
            Value::U16(v) => Ok(RegOrImm::U32(u32::from(v))),
            Value::U32(v) => Ok(RegOrImm::U32(v)),
            Value::U64(v) => Ok(RegOrImm::U64(v)),
            Value::F16(bits) => Ok(RegOrImm::U32(u32::from(bits))),
            Value::F32(v) => Ok(RegOrImm::F32(v)),
            Value::F64(v) => Ok(RegOrImm::F64(v)),
            other => Err(Error::logic(format!(
                "value {other} cannot be consumed by the backend"
            ))),
        }
    }

    /// Acquires a scratch register released when the guard drops.
    pub fn alloc_scoped(&self) -> Result<ScopedRegister<'_>> {
        let reg = self.alloc(false)?;
        Ok(ScopedRegister { reg, alloc: self })
    }

    fn alloc(&self, is_long: bool) -> Result<Register> {
        for (word_index, word) in self.register_use.iter().enumerate() {
            let bits = word.get();
            if bits == u64::MAX {
                continue;
            }
            let bit = bits.trailing_ones();
            let index = word_index as u32 * 64 + bit;
            word.set(bits | 1 << bit);
            let defined = if is_long {
                &self.register_defined_long[word_index]
            } else {
                &self.register_defined[word_index]
            };
            defined.set(defined.get() | 1 << bit);
            self.num_used_registers.set(self.num_used_registers.get() + 1);
            self.defines.set(self.defines.get() + 1);
            return Ok(Register { index, is_long });
        }
        Err(Error::BackendResourceExhausted)
    }

    fn free(&self, reg: Register) {
        let word = &self.register_use[reg.index as usize / 64];
        let mask = 1u64 << (reg.index % 64);
        debug_assert!(word.get() & mask != 0, "double free of {reg}");
        word.set(word.get() & !mask);
        self.num_used_registers.set(self.num_used_registers.get() - 1);
        self.frees.set(self.frees.get() + 1);
    }

    /// Returns φ registers to the pool at end of emission.
    pub fn release_phis(&self) {
        for (_, reg) in self.phi_regs.borrow_mut().drain() {
            self.free(reg);
        }
    }

    /// Indices of every register that was ever defined, for the preamble
    /// declarations.
    pub fn defined_registers(&self) -> Vec<u32> {
        collect_bits(&self.register_defined)
    }

    pub fn defined_long_registers(&self) -> Vec<u32> {
        collect_bits(&self.register_defined_long)
    }

    /// Whether every register is back in the pool.
    pub fn pool_is_clean(&self) -> bool {
        self.num_used_registers.get() == 0
    }

    pub fn num_defines(&self) -> usize {
        self.defines.get()
    }

    pub fn num_frees(&self) -> usize {
        self.frees.get()
    }
}

fn collect_bits(words: &[Cell<u64>; NUM_WORDS]) -> Vec<u32> {
    let mut out = Vec::new();
    for (word_index, word) in words.iter().enumerate() {
        let mut bits = word.get();
        while bits != 0 {
            let bit = bits.trailing_zeros();
            out.push(word_index as u32 * 64 + bit);
            bits &= bits - 1;
        }
    }
    out
}

/// RAII scratch register: freed on every exit path.
pub struct ScopedRegister<'a> {
    pub reg: Register,
    alloc: &'a RegAlloc,
}

impl Drop for ScopedRegister<'_> {
    fn drop(&mut self) {
        self.alloc.free(self.reg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_register_releases_on_drop() {
        let alloc = RegAlloc::new();
        {
            let scoped = alloc.alloc_scoped().unwrap();
            assert_eq!(scoped.reg.index, 0);
            assert!(!alloc.pool_is_clean());
        }
        assert!(alloc.pool_is_clean());
        assert_eq!(alloc.num_defines(), alloc.num_frees());
    }

    #[test]
    fn scoped_registers_do_not_alias() {
        let alloc = RegAlloc::new();
        let a = alloc.alloc_scoped().unwrap();
        let b = alloc.alloc_scoped().unwrap();
        assert_ne!(a.reg.index, b.reg.index);
    }
}
