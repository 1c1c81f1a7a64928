use core::fmt;

use crate::error::{Error, Result};
use crate::ir::attribute::Attribute;
use crate::ir::block::BlockId;
use crate::ir::condition::FlowTest;
use crate::ir::inst::InstId;
use crate::ir::reg::{Pred, Reg};
use crate::ir::types::Type;

/// An IR value: empty, an immediate, a symbolic token, or a reference to an
/// instruction in the owning function's arena.
///
/// Instruction references compare by arena id; floating-point immediates
/// compare by bit pattern so NaN payloads stay distinguishable.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Empty,
    Inst(InstId),
    Reg(Reg),
    Pred(Pred),
    Attribute(Attribute),
    Label(BlockId),
    FlowTest(FlowTest),
    U1(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Raw half-precision bits; the IR never computes on them directly.
    F16(u16),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            Value::U1(_)
                | Value::U8(_)
                | Value::U16(_)
                | Value::U32(_)
                | Value::U64(_)
                | Value::F16(_)
                | Value::F32(_)
                | Value::F64(_)
        )
    }

    pub fn inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            _ => None,
        }
    }

    /// Type of this value without consulting the arena. Instruction
    /// references report `None`; use [`Function::type_of`] for those.
    ///
    /// [`Function::type_of`]: crate::ir::Function::type_of
    pub fn immediate_type(&self) -> Option<Type> {
        Some(match self {
            Value::Empty => Type::Void,
            Value::Inst(_) => return None,
            Value::Reg(_) => Type::Reg,
            Value::Pred(_) => Type::Pred,
            Value::Attribute(_) => Type::Attribute,
            Value::Label(_) => Type::Label,
            Value::FlowTest(_) => Type::FlowTest,
            Value::U1(_) => Type::U1,
            Value::U8(_) => Type::U8,
            Value::U16(_) => Type::U16,
            Value::U32(_) => Type::U32,
            Value::U64(_) => Type::U64,
            Value::F16(_) => Type::F16,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
        })
    }

    pub fn reg(&self) -> Result<Reg> {
        match self {
            Value::Reg(reg) => Ok(*reg),
            other => Err(Error::logic(format!("expected register value, got {other}"))),
        }
    }

    pub fn pred(&self) -> Result<Pred> {
        match self {
            Value::Pred(pred) => Ok(*pred),
            other => Err(Error::logic(format!("expected predicate value, got {other}"))),
        }
    }

    pub fn attribute(&self) -> Result<Attribute> {
        match self {
            Value::Attribute(attr) => Ok(*attr),
            other => Err(Error::logic(format!("expected attribute value, got {other}"))),
        }
    }

    pub fn label(&self) -> Result<BlockId> {
        match self {
            Value::Label(label) => Ok(*label),
            other => Err(Error::logic(format!("expected label value, got {other}"))),
        }
    }

    pub fn u1(&self) -> Result<bool> {
        match self {
            Value::U1(v) => Ok(*v),
            other => Err(Error::logic(format!("expected U1 immediate, got {other}"))),
        }
    }

    pub fn u32(&self) -> Result<u32> {
        match self {
            Value::U32(v) => Ok(*v),
            other => Err(Error::logic(format!("expected U32 immediate, got {other}"))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Inst(a), Value::Inst(b)) => a == b,
            (Value::Reg(a), Value::Reg(b)) => a == b,
            (Value::Pred(a), Value::Pred(b)) => a == b,
            (Value::Attribute(a), Value::Attribute(b)) => a == b,
            (Value::Label(a), Value::Label(b)) => a == b,
            (Value::FlowTest(a), Value::FlowTest(b)) => a == b,
            (Value::U1(a), Value::U1(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F16(a), Value::F16(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "<empty>"),
            Value::Inst(id) => write!(f, "%{}", id.index()),
            Value::Reg(reg) => write!(f, "{reg}"),
            Value::Pred(pred) => write!(f, "{pred}"),
            Value::Attribute(attr) => write!(f, "{attr}"),
            Value::Label(label) => write!(f, "B{}", label.index()),
            Value::FlowTest(test) => write!(f, "{test}"),
            Value::U1(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}u8"),
            Value::U16(v) => write!(f, "{v}u16"),
            Value::U32(v) => write!(f, "{v}u32"),
            Value::U64(v) => write!(f, "{v}u64"),
            Value::F16(bits) => write!(f, "f16({bits:#x})"),
            Value::F32(v) => write!(f, "{v:?}f32"),
            Value::F64(v) => write!(f, "{v:?}f64"),
        }
    }
}
