//! Register allocation for the high-level textual target.
//!
//! Registers are GLSL-style local variables declared on first definition.
//! Each allocator entry packs its state into a small tagged integer (`Id`):
//! validity, long/spill/condition-code markers and the pool index.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ir::{Function, InstId, Type, Value};

pub const NUM_REGS: usize = 4096;
const NUM_WORDS: usize = NUM_REGS / 64;

/// Variable type in the emitted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslType {
    U1,
    F16x2,
    S32,
    U32,
    F32,
    S64,
    U64,
    F64,
    U32x2,
    F32x2,
    U32x3,
    F32x3,
    U32x4,
    F32x4,
    Void,
}

impl GlslType {
    pub fn from_ir(ty: Type) -> GlslType {
        match ty {
            Type::U1 => GlslType::U1,
            Type::F16x2 => GlslType::F16x2,
            Type::U8 | Type::U16 | Type::U32 => GlslType::U32,
            Type::F16 | Type::F32 => GlslType::F32,
            Type::U64 => GlslType::U64,
            Type::F64 => GlslType::F64,
            Type::U32x2 => GlslType::U32x2,
            Type::F32x2 => GlslType::F32x2,
            Type::U32x3 => GlslType::U32x3,
            Type::F32x3 => GlslType::F32x3,
            Type::U32x4 => GlslType::U32x4,
            Type::F32x4 => GlslType::F32x4,
            _ => GlslType::Void,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GlslType::U1 => "bool",
            GlslType::F16x2 => "f16vec2",
            GlslType::S32 => "int",
            GlslType::U32 => "uint",
            GlslType::F32 => "float",
            GlslType::S64 => "int64_t",
            GlslType::U64 => "uint64_t",
            GlslType::F64 => "double",
            GlslType::U32x2 => "uvec2",
            GlslType::F32x2 => "vec2",
            GlslType::U32x3 => "uvec3",
            GlslType::F32x3 => "vec3",
            GlslType::U32x4 => "uvec4",
            GlslType::F32x4 => "vec4",
            GlslType::Void => "",
        }
    }

    fn is_long(self) -> bool {
        matches!(self, GlslType::S64 | GlslType::U64 | GlslType::F64)
    }
}

const IS_VALID: u32 = 1 << 0;
const IS_LONG: u32 = 1 << 1;
const IS_SPILL: u32 = 1 << 2;
const IS_CONDITION_CODE: u32 = 1 << 3;
const IS_NULL: u32 = 1 << 4;
const INDEX_SHIFT: u32 = 5;

/// Packed register identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id(u32);

impl Id {
    pub fn new(index: u32) -> Id {
        Id(IS_VALID | index << INDEX_SHIFT)
    }

    pub fn null() -> Id {
        Id(IS_NULL)
    }

    pub fn index(self) -> u32 {
        self.0 >> INDEX_SHIFT
    }

    pub fn is_valid(self) -> bool {
        self.0 & IS_VALID != 0
    }

    pub fn is_null(self) -> bool {
        self.0 & IS_NULL != 0
    }

    pub fn is_long(self) -> bool {
        self.0 & IS_LONG != 0
    }

    pub fn is_spill(self) -> bool {
        self.0 & IS_SPILL != 0
    }

    pub fn is_condition_code(self) -> bool {
        self.0 & IS_CONDITION_CODE != 0
    }

    pub fn with_long(self, long: bool) -> Id {
        if long {
            Id(self.0 | IS_LONG)
        } else {
            Id(self.0 & !IS_LONG)
        }
    }

    pub fn with_condition_code(self, cc: bool) -> Id {
        if cc {
            Id(self.0 | IS_CONDITION_CODE)
        } else {
            Id(self.0 & !IS_CONDITION_CODE)
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.index())
    }
}

pub struct RegAlloc {
    register_use: [Cell<u64>; NUM_WORDS],
    register_defined: [Cell<u64>; NUM_WORDS],
    num_used_registers: Cell<usize>,
    /// Declared text type of each register index; a register freed with one
    /// type is never redeclared with another.
    reg_types: RefCell<HashMap<u32, GlslType>>,
    defs: RefCell<HashMap<InstId, Id>>,
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
            num_used_registers: Cell::new(0),
            reg_types: RefCell::new(HashMap::new()),
            defs: RefCell::new(HashMap::new()),
        }
    }

    /// Defining text of the result of `inst`: `"float R3"` on the first use
    /// of the slot, `"R3"` when the declaration already exists.
    pub fn define(&self, func: &Function, inst: InstId) -> Result<String> {
        let ty = GlslType::from_ir(func.type_of(Value::Inst(inst)));
        if ty == GlslType::Void {
            return Err(Error::invalid_argument(
                "defining a register for a typeless value",
            ));
        }
        let (id, fresh) = self.alloc(ty)?;
        let id = id
            .with_long(ty.is_long())
            .with_condition_code(ty == GlslType::U1);
        self.defs.borrow_mut().insert(inst, id);
        if fresh {
            Ok(format!("{} {id}", ty.name()))
        } else {
            Ok(id.to_string())
        }
    }

    /// Textual operand for one use of `value`, freeing the register after the
    /// last use. Immediates materialize as literals.
    pub fn consume(&self, func: &Function, value: Value) -> Result<String> {
        match func.resolve(value) {
            Value::Inst(id) => {
                let inst = func.inst(id);
                inst.remove_use();
                let reg = *self.defs.borrow().get(&id).ok_or_else(|| {
                    Error::logic(format!("{id} consumed before being defined"))
                })?;
                if !inst.has_uses() {
                    self.defs.borrow_mut().remove(&id);
                    self.free(reg);
                }
                Ok(reg.to_string())
            }
            Value::U1(v) => Ok(if v { "true" } else { "false" }.to_owned()),
            Value::U8(v) => Ok(format!("{v}u")),
            Value::U16(v) => Ok(format!("{v}u")),
            Value::U32(v) => Ok(format!("{v}u")),
            Value::U64(v) => Ok(format!("{v}ul")),
            Value::F16(bits) => Ok(format!("uintBitsToFloat({}u)", u32::from(bits))),
            Value::F32(v) => Ok(format!("{v:?}")),
            Value::F64(v) => Ok(format!("{v:?}lf")),
            other => Err(Error::logic(format!(
                "value {other} cannot be consumed by the backend"
            ))),
        }
    }

    fn alloc(&self, ty: GlslType) -> Result<(Id, bool)> {
        for (word_index, word) in self.register_use.iter().enumerate() {
            let mut bits = !word.get();
            while bits != 0 {
                let bit = bits.trailing_zeros();
                bits &= bits - 1;
                let index = word_index as u32 * 64 + bit;
                if index as usize >= NUM_REGS {
                    break;
                }
                let conflicting = matches!(
                    self.reg_types.borrow().get(&index),
                    Some(&declared) if declared != ty
                );
                if conflicting {
                    continue;
                }
                word.set(word.get() | 1 << bit);
                let defined = &self.register_defined[word_index];
                let fresh = defined.get() & (1 << bit) == 0;
                defined.set(defined.get() | 1 << bit);
                self.num_used_registers.set(self.num_used_registers.get() + 1);
                self.reg_types.borrow_mut().insert(index, ty);
                return Ok((Id::new(index), fresh));
            }
        }
        Err(Error::BackendResourceExhausted)
    }

    fn free(&self, id: Id) {
        let word = &self.register_use[id.index() as usize / 64];
        let mask = 1u64 << (id.index() % 64);
        debug_assert!(word.get() & mask != 0, "double free of {id}");
        word.set(word.get() & !mask);
        self.num_used_registers.set(self.num_used_registers.get() - 1);
    }

    pub fn pool_is_clean(&self) -> bool {
        self.num_used_registers.get() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_packs_flags_and_index() {
        let id = Id::new(1234).with_long(true).with_condition_code(true);
        assert_eq!(id.index(), 1234);
        assert!(id.is_valid());
        assert!(id.is_long());
        assert!(id.is_condition_code());
        assert!(!id.is_spill());
        assert!(!id.is_null());
        assert_eq!(id.with_long(false).index(), 1234);
    }
}
