use core::fmt;

/// Closed set of IR value types.
///
/// Scalar widths mirror the source hardware's register views; vector forms
/// exist only for the widths the composite opcodes produce. `Opaque` is the
/// wildcard used by polymorphic operand slots in the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Opaque,
    Label,
    Reg,
    Pred,
    Attribute,
    FlowTest,
    U1,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
    U32x2,
    U32x3,
    U32x4,
    F16x2,
    F16x3,
    F16x4,
    F32x2,
    F32x3,
    F32x4,
    F64x2,
    F64x3,
    F64x4,
}

impl Type {
    /// Whether a declared operand slot of this type accepts a value of
    /// `actual` type. `Opaque` slots accept anything, including empty values
    /// (reported as `Void`).
    pub fn accepts(self, actual: Type) -> bool {
        self == Type::Opaque || self == actual
    }

    pub fn is_vector(self) -> bool {
        self.vector_len() > 1
    }

    pub fn vector_len(self) -> usize {
        match self {
            Type::U32x2 | Type::F16x2 | Type::F32x2 | Type::F64x2 => 2,
            Type::U32x3 | Type::F16x3 | Type::F32x3 | Type::F64x3 => 3,
            Type::U32x4 | Type::F16x4 | Type::F32x4 | Type::F64x4 => 4,
            _ => 1,
        }
    }

    /// Element type of a vector, or the type itself for scalars.
    pub fn element(self) -> Type {
        match self {
            Type::U32x2 | Type::U32x3 | Type::U32x4 => Type::U32,
            Type::F16x2 | Type::F16x3 | Type::F16x4 => Type::F16,
            Type::F32x2 | Type::F32x3 | Type::F32x4 => Type::F32,
            Type::F64x2 | Type::F64x3 | Type::F64x4 => Type::F64,
            other => other,
        }
    }

    /// 64-bit types occupy a long backend register.
    pub fn is_long(self) -> bool {
        matches!(self, Type::U64 | Type::F64)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
