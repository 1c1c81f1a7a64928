//! Typed builder over the IR core.
//!
//! Wrapper types tag a [`Value`] with the type the translator proved it has;
//! polymorphic helpers inspect operand types and pick the size-specific
//! opcode, failing with `InvalidArgument` when operand types disagree.

use crate::error::{Error, Result};
use crate::ir::attribute::Attribute;
use crate::ir::block::BlockId;
use crate::ir::condition::{Condition, FlowTest};
use crate::ir::modifiers::{FpControl, InstFlags, TextureInstInfo};
use crate::ir::opcode::Opcode;
use crate::ir::program::Function;
use crate::ir::reg::{Pred, Reg};
use crate::ir::types::Type;
use crate::ir::value::Value;

macro_rules! typed_values {
    ($($name:ident),+ $(,)?) => {
        $(
            /// A value the builder has checked to carry this type.
            #[derive(Debug, Clone, Copy, PartialEq)]
            pub struct $name(pub Value);

            impl From<$name> for Value {
                fn from(value: $name) -> Value {
                    value.0
                }
            }
        )+
    };
}

typed_values!(U1, U8, U16, U32, U64, F16, F32, F64);

/// Value of any floating-point scalar width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct F16F32F64(pub Value);

/// Value of either integer register width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct U32U64(pub Value);

impl From<F32> for F16F32F64 {
    fn from(value: F32) -> F16F32F64 {
        F16F32F64(value.0)
    }
}

impl From<F16F32F64> for Value {
    fn from(value: F16F32F64) -> Value {
        value.0
    }
}

impl From<U32> for U32U64 {
    fn from(value: U32) -> U32U64 {
        U32U64(value.0)
    }
}

impl From<U32U64> for Value {
    fn from(value: U32U64) -> Value {
        value.0
    }
}

/// Instruction builder appending to a caller-selected block.
pub struct IREmitter<'f> {
    pub func: &'f mut Function,
    pub block: BlockId,
}

impl<'f> IREmitter<'f> {
    pub fn new(func: &'f mut Function, block: BlockId) -> Self {
        Self { func, block }
    }

    fn inst(&mut self, opcode: Opcode, args: &[Value]) -> Result<Value> {
        Ok(Value::Inst(self.func.append(
            self.block,
            opcode,
            args,
            InstFlags::None,
        )?))
    }

    fn inst_with(&mut self, opcode: Opcode, flags: InstFlags, args: &[Value]) -> Result<Value> {
        Ok(Value::Inst(self.func.append(self.block, opcode, args, flags)?))
    }

    fn type_of(&self, value: Value) -> Type {
        self.func.type_of(value)
    }

    // Immediates.

    pub fn imm1(&self, value: bool) -> U1 {
        U1(Value::U1(value))
    }

    pub fn imm8(&self, value: u8) -> U8 {
        U8(Value::U8(value))
    }

    pub fn imm16(&self, value: u16) -> U16 {
        U16(Value::U16(value))
    }

    pub fn imm32(&self, value: u32) -> U32 {
        U32(Value::U32(value))
    }

    pub fn imm32_signed(&self, value: i32) -> U32 {
        U32(Value::U32(value as u32))
    }

    pub fn imm32_float(&self, value: f32) -> F32 {
        F32(Value::F32(value))
    }

    pub fn imm64(&self, value: u64) -> U64 {
        U64(Value::U64(value))
    }

    pub fn imm64_float(&self, value: f64) -> F64 {
        F64(Value::F64(value))
    }

    // Control flow. Branch emission wires predecessor links; the SSA rewrite
    // relies on every edge having been recorded this way.

    pub fn branch(&mut self, label: BlockId) -> Result<()> {
        self.func.set_branch(self.block, label);
        self.inst(Opcode::Branch, &[Value::Label(label)])?;
        Ok(())
    }

    pub fn branch_conditional(
        &mut self,
        condition: U1,
        true_label: BlockId,
        false_label: BlockId,
    ) -> Result<()> {
        self.func.set_branches(self.block, true_label, false_label);
        self.inst(
            Opcode::BranchConditional,
            &[condition.0, Value::Label(true_label), Value::Label(false_label)],
        )?;
        Ok(())
    }

    pub fn loop_merge(&mut self, merge: BlockId, continue_target: BlockId) -> Result<()> {
        self.inst(
            Opcode::LoopMerge,
            &[Value::Label(merge), Value::Label(continue_target)],
        )?;
        Ok(())
    }

    pub fn selection_merge(&mut self, merge: BlockId) -> Result<()> {
        self.inst(Opcode::SelectionMerge, &[Value::Label(merge)])?;
        Ok(())
    }

    pub fn return_(&mut self) -> Result<()> {
        self.inst(Opcode::Return, &[])?;
        Ok(())
    }

    // Virtual resource accesses. `RZ` and `PT` fold to their constants here
    // and never reach the SSA rewrite.

    pub fn get_reg(&mut self, reg: Reg) -> Result<U32> {
        if reg.is_rz() {
            return Ok(self.imm32(0));
        }
        Ok(U32(self.inst(Opcode::GetRegister, &[Value::Reg(reg)])?))
    }

    pub fn set_reg(&mut self, reg: Reg, value: U32) -> Result<()> {
        if reg.is_rz() {
            return Ok(());
        }
        self.inst(Opcode::SetRegister, &[Value::Reg(reg), value.0])?;
        Ok(())
    }

    pub fn get_pred(&mut self, pred: Pred, is_negated: bool) -> Result<U1> {
        if pred.is_pt() {
            return Ok(self.imm1(!is_negated));
        }
        let value = U1(self.inst(Opcode::GetPred, &[Value::Pred(pred)])?);
        if is_negated {
            self.logical_not(value)
        } else {
            Ok(value)
        }
    }

    pub fn set_pred(&mut self, pred: Pred, value: U1) -> Result<()> {
        if pred.is_pt() {
            return Ok(());
        }
        self.inst(Opcode::SetPred, &[Value::Pred(pred), value.0])?;
        Ok(())
    }

    pub fn get_goto_variable(&mut self, id: u32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::GetGotoVariable, &[Value::U32(id)])?))
    }

    pub fn set_goto_variable(&mut self, id: u32, value: U32) -> Result<()> {
        self.inst(Opcode::SetGotoVariable, &[Value::U32(id), value.0])?;
        Ok(())
    }

    pub fn get_indirect_branch_variable(&mut self) -> Result<U32> {
        Ok(U32(self.inst(Opcode::GetIndirectBranchVariable, &[])?))
    }

    pub fn set_indirect_branch_variable(&mut self, value: U32) -> Result<()> {
        self.inst(Opcode::SetIndirectBranchVariable, &[value.0])?;
        Ok(())
    }

    pub fn get_zflag(&mut self) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetZFlag, &[])?))
    }

    pub fn get_sflag(&mut self) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetSFlag, &[])?))
    }

    pub fn get_cflag(&mut self) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetCFlag, &[])?))
    }

    pub fn get_oflag(&mut self) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetOFlag, &[])?))
    }

    pub fn set_zflag(&mut self, value: U1) -> Result<()> {
        self.inst(Opcode::SetZFlag, &[value.0])?;
        Ok(())
    }

    pub fn set_sflag(&mut self, value: U1) -> Result<()> {
        self.inst(Opcode::SetSFlag, &[value.0])?;
        Ok(())
    }

    pub fn set_cflag(&mut self, value: U1) -> Result<()> {
        self.inst(Opcode::SetCFlag, &[value.0])?;
        Ok(())
    }

    pub fn set_oflag(&mut self, value: U1) -> Result<()> {
        self.inst(Opcode::SetOFlag, &[value.0])?;
        Ok(())
    }

    pub fn get_cbuf(&mut self, binding: U32, byte_offset: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::GetCbuf, &[binding.0, byte_offset.0])?))
    }

    pub fn get_attribute(&mut self, attribute: Attribute) -> Result<F32> {
        Ok(F32(self.inst(
            Opcode::GetAttribute,
            &[Value::Attribute(attribute)],
        )?))
    }

    pub fn set_attribute(&mut self, attribute: Attribute, value: F32) -> Result<()> {
        self.inst(Opcode::SetAttribute, &[Value::Attribute(attribute), value.0])?;
        Ok(())
    }

    fn flow_test(&mut self, flow_test: FlowTest) -> Result<U1> {
        match flow_test {
            FlowTest::T => Ok(self.imm1(true)),
            FlowTest::F => Ok(self.imm1(false)),
            FlowTest::Eq => self.get_zflag(),
            FlowTest::Ne => {
                let zero = self.get_zflag()?;
                self.logical_not(zero)
            }
            other => Err(Error::not_implemented(format!("flow test {other}"))),
        }
    }

    /// Lowers a branch condition to a single `U1`.
    pub fn condition(&mut self, cond: Condition) -> Result<U1> {
        let pred = self.get_pred(cond.pred, cond.pred_negated)?;
        let test = self.flow_test(cond.flow_test)?;
        self.logical_and(pred, test)
    }

    // Pseudo-operation extractors.

    pub fn get_zero_from_op(&mut self, op: Value) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetZeroFromOp, &[op])?))
    }

    pub fn get_sign_from_op(&mut self, op: Value) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetSignFromOp, &[op])?))
    }

    pub fn get_carry_from_op(&mut self, op: Value) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetCarryFromOp, &[op])?))
    }

    pub fn get_overflow_from_op(&mut self, op: Value) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetOverflowFromOp, &[op])?))
    }

    pub fn get_sparse_from_op(&mut self, op: Value) -> Result<U1> {
        Ok(U1(self.inst(Opcode::GetSparseFromOp, &[op])?))
    }

    // Composites.

    /// Builds a vector from 2..=4 elements of one scalar type.
    pub fn composite_construct(&mut self, elements: &[Value]) -> Result<Value> {
        let element_type = self.type_of(*elements.first().ok_or_else(|| {
            Error::invalid_argument("composite construction with no elements")
        })?);
        for &element in elements {
            if self.type_of(element) != element_type {
                return Err(Error::invalid_argument(format!(
                    "composite element types disagree: {element_type} vs {}",
                    self.type_of(element)
                )));
            }
        }
        let opcode = match (element_type, elements.len()) {
            (Type::U32, 2) => Opcode::CompositeConstructU32x2,
            (Type::U32, 3) => Opcode::CompositeConstructU32x3,
            (Type::U32, 4) => Opcode::CompositeConstructU32x4,
            (Type::F16, 2) => Opcode::CompositeConstructF16x2,
            (Type::F16, 3) => Opcode::CompositeConstructF16x3,
            (Type::F16, 4) => Opcode::CompositeConstructF16x4,
            (Type::F32, 2) => Opcode::CompositeConstructF32x2,
            (Type::F32, 3) => Opcode::CompositeConstructF32x3,
            (Type::F32, 4) => Opcode::CompositeConstructF32x4,
            (Type::F64, 2) => Opcode::CompositeConstructF64x2,
            (Type::F64, 3) => Opcode::CompositeConstructF64x3,
            (Type::F64, 4) => Opcode::CompositeConstructF64x4,
            (ty, len) => {
                return Err(Error::invalid_argument(format!(
                    "cannot construct a composite of {len} x {ty}"
                )))
            }
        };
        self.inst(opcode, elements)
    }

    /// Extracts element `element` of a vector value, range-checked.
    pub fn composite_extract(&mut self, vector: Value, element: usize) -> Result<Value> {
        let vector_type = self.type_of(vector);
        let opcode = match vector_type {
            Type::U32x2 => Opcode::CompositeExtractU32x2,
            Type::U32x3 => Opcode::CompositeExtractU32x3,
            Type::U32x4 => Opcode::CompositeExtractU32x4,
            Type::F16x2 => Opcode::CompositeExtractF16x2,
            Type::F16x3 => Opcode::CompositeExtractF16x3,
            Type::F16x4 => Opcode::CompositeExtractF16x4,
            Type::F32x2 => Opcode::CompositeExtractF32x2,
            Type::F32x3 => Opcode::CompositeExtractF32x3,
            Type::F32x4 => Opcode::CompositeExtractF32x4,
            Type::F64x2 => Opcode::CompositeExtractF64x2,
            Type::F64x3 => Opcode::CompositeExtractF64x3,
            Type::F64x4 => Opcode::CompositeExtractF64x4,
            other => {
                return Err(Error::invalid_argument(format!(
                    "cannot extract from non-composite type {other}"
                )))
            }
        };
        if element >= vector_type.vector_len() {
            return Err(Error::invalid_argument(format!(
                "out of bounds element {element} in {vector_type}"
            )));
        }
        self.inst(opcode, &[vector, Value::U32(element as u32)])
    }

    pub fn select(&mut self, condition: U1, true_value: Value, false_value: Value) -> Result<Value> {
        let true_type = self.type_of(true_value);
        if true_type != self.type_of(false_value) {
            return Err(Error::invalid_argument(format!(
                "select arms disagree: {true_type} vs {}",
                self.type_of(false_value)
            )));
        }
        let opcode = match true_type {
            Type::U8 => Opcode::SelectU8,
            Type::U16 => Opcode::SelectU16,
            Type::U32 => Opcode::SelectU32,
            Type::U64 => Opcode::SelectU64,
            Type::F32 => Opcode::SelectF32,
            other => {
                return Err(Error::invalid_argument(format!(
                    "cannot select over type {other}"
                )))
            }
        };
        self.inst(opcode, &[condition.0, true_value, false_value])
    }

    // Bit casts and pack/unpack.

    pub fn bitcast_u32_f32(&mut self, value: F32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::BitCastU32F32, &[value.0])?))
    }

    pub fn bitcast_f32_u32(&mut self, value: U32) -> Result<F32> {
        Ok(F32(self.inst(Opcode::BitCastF32U32, &[value.0])?))
    }

    pub fn bitcast_u16_f16(&mut self, value: F16) -> Result<U16> {
        Ok(U16(self.inst(Opcode::BitCastU16F16, &[value.0])?))
    }

    pub fn bitcast_f16_u16(&mut self, value: U16) -> Result<F16> {
        Ok(F16(self.inst(Opcode::BitCastF16U16, &[value.0])?))
    }

    pub fn bitcast_u64_f64(&mut self, value: F64) -> Result<U64> {
        Ok(U64(self.inst(Opcode::BitCastU64F64, &[value.0])?))
    }

    pub fn bitcast_f64_u64(&mut self, value: U64) -> Result<F64> {
        Ok(F64(self.inst(Opcode::BitCastF64U64, &[value.0])?))
    }

    pub fn pack_uint_2x32(&mut self, vector: Value) -> Result<U64> {
        Ok(U64(self.inst(Opcode::PackUint2x32, &[vector])?))
    }

    pub fn unpack_uint_2x32(&mut self, value: U64) -> Result<Value> {
        self.inst(Opcode::UnpackUint2x32, &[value.0])
    }

    pub fn pack_float_2x16(&mut self, vector: Value) -> Result<U32> {
        Ok(U32(self.inst(Opcode::PackFloat2x16, &[vector])?))
    }

    pub fn unpack_float_2x16(&mut self, value: U32) -> Result<Value> {
        self.inst(Opcode::UnpackFloat2x16, &[value.0])
    }

    pub fn pack_double_2x32(&mut self, vector: Value) -> Result<F64> {
        Ok(F64(self.inst(Opcode::PackDouble2x32, &[vector])?))
    }

    pub fn unpack_double_2x32(&mut self, value: F64) -> Result<Value> {
        self.inst(Opcode::UnpackDouble2x32, &[value.0])
    }

    // Floating-point arithmetic. Polymorphic entry points inspect the operand
    // type and dispatch to the size-specific opcode.

    fn fp_binary(
        &mut self,
        ops: [Opcode; 3],
        a: F16F32F64,
        b: F16F32F64,
        control: FpControl,
    ) -> Result<F16F32F64> {
        let (a_type, b_type) = (self.type_of(a.0), self.type_of(b.0));
        if a_type != b_type {
            return Err(Error::invalid_argument(format!(
                "mismatching types {a_type} and {b_type}"
            )));
        }
        let opcode = match a_type {
            Type::F16 => ops[0],
            Type::F32 => ops[1],
            Type::F64 => ops[2],
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(F16F32F64(self.inst_with(
            opcode,
            InstFlags::Fp(control),
            &[a.0, b.0],
        )?))
    }

    fn fp_unary(&mut self, ops: [Opcode; 3], value: F16F32F64) -> Result<F16F32F64> {
        let opcode = match self.type_of(value.0) {
            Type::F16 => ops[0],
            Type::F32 => ops[1],
            Type::F64 => ops[2],
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(F16F32F64(self.inst(opcode, &[value.0])?))
    }

    fn fp_unary_with(
        &mut self,
        ops: [Opcode; 3],
        value: F16F32F64,
        control: FpControl,
    ) -> Result<F16F32F64> {
        let opcode = match self.type_of(value.0) {
            Type::F16 => ops[0],
            Type::F32 => ops[1],
            Type::F64 => ops[2],
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(F16F32F64(self.inst_with(
            opcode,
            InstFlags::Fp(control),
            &[value.0],
        )?))
    }

    pub fn fp_add(&mut self, a: F16F32F64, b: F16F32F64, control: FpControl) -> Result<F16F32F64> {
        self.fp_binary([Opcode::FPAdd16, Opcode::FPAdd32, Opcode::FPAdd64], a, b, control)
    }

    pub fn fp_mul(&mut self, a: F16F32F64, b: F16F32F64, control: FpControl) -> Result<F16F32F64> {
        self.fp_binary([Opcode::FPMul16, Opcode::FPMul32, Opcode::FPMul64], a, b, control)
    }

    pub fn fp_fma(
        &mut self,
        a: F16F32F64,
        b: F16F32F64,
        c: F16F32F64,
        control: FpControl,
    ) -> Result<F16F32F64> {
        let a_type = self.type_of(a.0);
        if a_type != self.type_of(b.0) || a_type != self.type_of(c.0) {
            return Err(Error::invalid_argument("mismatching fma operand types"));
        }
        let opcode = match a_type {
            Type::F16 => Opcode::FPFma16,
            Type::F32 => Opcode::FPFma32,
            Type::F64 => Opcode::FPFma64,
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(F16F32F64(self.inst_with(
            opcode,
            InstFlags::Fp(control),
            &[a.0, b.0, c.0],
        )?))
    }

    pub fn fp_neg(&mut self, value: F16F32F64) -> Result<F16F32F64> {
        self.fp_unary([Opcode::FPNeg16, Opcode::FPNeg32, Opcode::FPNeg64], value)
    }

    pub fn fp_abs(&mut self, value: F16F32F64) -> Result<F16F32F64> {
        self.fp_unary([Opcode::FPAbs16, Opcode::FPAbs32, Opcode::FPAbs64], value)
    }

    /// Applies the `|x|` and `-x` source modifiers in hardware order.
    pub fn fp_abs_neg(&mut self, value: F16F32F64, abs: bool, neg: bool) -> Result<F16F32F64> {
        let mut value = value;
        if abs {
            value = self.fp_abs(value)?;
        }
        if neg {
            value = self.fp_neg(value)?;
        }
        Ok(value)
    }

    pub fn fp_saturate(&mut self, value: F16F32F64) -> Result<F16F32F64> {
        self.fp_unary(
            [Opcode::FPSaturate16, Opcode::FPSaturate32, Opcode::FPSaturate64],
            value,
        )
    }

    pub fn fp_recip(&mut self, value: F16F32F64) -> Result<F16F32F64> {
        let opcode = match self.type_of(value.0) {
            Type::F32 => Opcode::FPRecip32,
            Type::F64 => Opcode::FPRecip64,
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(F16F32F64(self.inst(opcode, &[value.0])?))
    }

    pub fn fp_round_even(&mut self, value: F16F32F64, control: FpControl) -> Result<F16F32F64> {
        self.fp_unary_with(
            [Opcode::FPRoundEven16, Opcode::FPRoundEven32, Opcode::FPRoundEven64],
            value,
            control,
        )
    }

    pub fn fp_floor(&mut self, value: F16F32F64, control: FpControl) -> Result<F16F32F64> {
        self.fp_unary_with(
            [Opcode::FPFloor16, Opcode::FPFloor32, Opcode::FPFloor64],
            value,
            control,
        )
    }

    pub fn fp_ceil(&mut self, value: F16F32F64, control: FpControl) -> Result<F16F32F64> {
        self.fp_unary_with(
            [Opcode::FPCeil16, Opcode::FPCeil32, Opcode::FPCeil64],
            value,
            control,
        )
    }

    pub fn fp_trunc(&mut self, value: F16F32F64, control: FpControl) -> Result<F16F32F64> {
        self.fp_unary_with(
            [Opcode::FPTrunc16, Opcode::FPTrunc32, Opcode::FPTrunc64],
            value,
            control,
        )
    }

    fn fp_compare(
        &mut self,
        ordered: [Opcode; 3],
        unordered: [Opcode; 3],
        lhs: F16F32F64,
        rhs: F16F32F64,
        is_ordered: bool,
    ) -> Result<U1> {
        let lhs_type = self.type_of(lhs.0);
        if lhs_type != self.type_of(rhs.0) {
            return Err(Error::invalid_argument(format!(
                "mismatching types {lhs_type} and {}",
                self.type_of(rhs.0)
            )));
        }
        let ops = if is_ordered { ordered } else { unordered };
        let opcode = match lhs_type {
            Type::F16 => ops[0],
            Type::F32 => ops[1],
            Type::F64 => ops[2],
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(U1(self.inst(opcode, &[lhs.0, rhs.0])?))
    }

    pub fn fp_equal(&mut self, lhs: F16F32F64, rhs: F16F32F64, ordered: bool) -> Result<U1> {
        self.fp_compare(
            [Opcode::FPOrdEqual16, Opcode::FPOrdEqual32, Opcode::FPOrdEqual64],
            [Opcode::FPUnordEqual16, Opcode::FPUnordEqual32, Opcode::FPUnordEqual64],
            lhs,
            rhs,
            ordered,
        )
    }

    pub fn fp_not_equal(&mut self, lhs: F16F32F64, rhs: F16F32F64, ordered: bool) -> Result<U1> {
        self.fp_compare(
            [
                Opcode::FPOrdNotEqual16,
                Opcode::FPOrdNotEqual32,
                Opcode::FPOrdNotEqual64,
            ],
            [
                Opcode::FPUnordNotEqual16,
                Opcode::FPUnordNotEqual32,
                Opcode::FPUnordNotEqual64,
            ],
            lhs,
            rhs,
            ordered,
        )
    }

    pub fn fp_less_than(&mut self, lhs: F16F32F64, rhs: F16F32F64, ordered: bool) -> Result<U1> {
        self.fp_compare(
            [
                Opcode::FPOrdLessThan16,
                Opcode::FPOrdLessThan32,
                Opcode::FPOrdLessThan64,
            ],
            [
                Opcode::FPUnordLessThan16,
                Opcode::FPUnordLessThan32,
                Opcode::FPUnordLessThan64,
            ],
            lhs,
            rhs,
            ordered,
        )
    }

    pub fn fp_greater_than(&mut self, lhs: F16F32F64, rhs: F16F32F64, ordered: bool) -> Result<U1> {
        self.fp_compare(
            [
                Opcode::FPOrdGreaterThan16,
                Opcode::FPOrdGreaterThan32,
                Opcode::FPOrdGreaterThan64,
            ],
            [
                Opcode::FPUnordGreaterThan16,
                Opcode::FPUnordGreaterThan32,
                Opcode::FPUnordGreaterThan64,
            ],
            lhs,
            rhs,
            ordered,
        )
    }

    pub fn fp_less_than_equal(
        &mut self,
        lhs: F16F32F64,
        rhs: F16F32F64,
        ordered: bool,
    ) -> Result<U1> {
        self.fp_compare(
            [
                Opcode::FPOrdLessThanEqual16,
                Opcode::FPOrdLessThanEqual32,
                Opcode::FPOrdLessThanEqual64,
            ],
            [
                Opcode::FPUnordLessThanEqual16,
                Opcode::FPUnordLessThanEqual32,
                Opcode::FPUnordLessThanEqual64,
            ],
            lhs,
            rhs,
            ordered,
        )
    }

    pub fn fp_greater_than_equal(
        &mut self,
        lhs: F16F32F64,
        rhs: F16F32F64,
        ordered: bool,
    ) -> Result<U1> {
        self.fp_compare(
            [
                Opcode::FPOrdGreaterThanEqual16,
                Opcode::FPOrdGreaterThanEqual32,
                Opcode::FPOrdGreaterThanEqual64,
            ],
            [
                Opcode::FPUnordGreaterThanEqual16,
                Opcode::FPUnordGreaterThanEqual32,
                Opcode::FPUnordGreaterThanEqual64,
            ],
            lhs,
            rhs,
            ordered,
        )
    }

    // Integer arithmetic.

    pub fn iadd(&mut self, a: U32U64, b: U32U64) -> Result<U32U64> {
        let a_type = self.type_of(a.0);
        if a_type != self.type_of(b.0) {
            return Err(Error::invalid_argument(format!(
                "mismatching types {a_type} and {}",
                self.type_of(b.0)
            )));
        }
        let opcode = match a_type {
            Type::U32 => Opcode::IAdd32,
            Type::U64 => Opcode::IAdd64,
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(U32U64(self.inst(opcode, &[a.0, b.0])?))
    }

    pub fn isub(&mut self, a: U32U64, b: U32U64) -> Result<U32U64> {
        let a_type = self.type_of(a.0);
        if a_type != self.type_of(b.0) {
            return Err(Error::invalid_argument(format!(
                "mismatching types {a_type} and {}",
                self.type_of(b.0)
            )));
        }
        let opcode = match a_type {
            Type::U32 => Opcode::ISub32,
            Type::U64 => Opcode::ISub64,
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(U32U64(self.inst(opcode, &[a.0, b.0])?))
    }

    pub fn imul(&mut self, a: U32, b: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::IMul32, &[a.0, b.0])?))
    }

    pub fn ineg(&mut self, value: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::INeg32, &[value.0])?))
    }

    pub fn iabs(&mut self, value: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::IAbs32, &[value.0])?))
    }

    pub fn shift_left_logical(&mut self, base: U32, shift: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::ShiftLeftLogical32, &[base.0, shift.0])?))
    }

    pub fn shift_right_logical(&mut self, base: U32, shift: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::ShiftRightLogical32, &[base.0, shift.0])?))
    }

    pub fn shift_right_arithmetic(&mut self, base: U32, shift: U32) -> Result<U32> {
        Ok(U32(self.inst(
            Opcode::ShiftRightArithmetic32,
            &[base.0, shift.0],
        )?))
    }

    pub fn bitwise_and(&mut self, a: U32, b: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::BitwiseAnd32, &[a.0, b.0])?))
    }

    pub fn bitwise_or(&mut self, a: U32, b: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::BitwiseOr32, &[a.0, b.0])?))
    }

    pub fn bitwise_xor(&mut self, a: U32, b: U32) -> Result<U32> {
        Ok(U32(self.inst(Opcode::BitwiseXor32, &[a.0, b.0])?))
    }

    pub fn bit_field_insert(&mut self, base: U32, insert: U32, offset: U32, count: U32) -> Result<U32> {
        Ok(U32(self.inst(
            Opcode::BitFieldInsert,
            &[base.0, insert.0, offset.0, count.0],
        )?))
    }

    pub fn bit_field_extract(
        &mut self,
        base: U32,
        offset: U32,
        count: U32,
        is_signed: bool,
    ) -> Result<U32> {
        let opcode = if is_signed {
            Opcode::BitFieldSExtract
        } else {
            Opcode::BitFieldUExtract
        };
        Ok(U32(self.inst(opcode, &[base.0, offset.0, count.0])?))
    }

    // Integer comparisons.

    pub fn iless_than(&mut self, lhs: U32, rhs: U32, is_signed: bool) -> Result<U1> {
        let opcode = if is_signed { Opcode::SLessThan } else { Opcode::ULessThan };
        Ok(U1(self.inst(opcode, &[lhs.0, rhs.0])?))
    }

    pub fn iless_than_equal(&mut self, lhs: U32, rhs: U32, is_signed: bool) -> Result<U1> {
        let opcode = if is_signed {
            Opcode::SLessThanEqual
        } else {
            Opcode::ULessThanEqual
        };
        Ok(U1(self.inst(opcode, &[lhs.0, rhs.0])?))
    }

    pub fn igreater_than(&mut self, lhs: U32, rhs: U32, is_signed: bool) -> Result<U1> {
        let opcode = if is_signed {
            Opcode::SGreaterThan
        } else {
            Opcode::UGreaterThan
        };
        Ok(U1(self.inst(opcode, &[lhs.0, rhs.0])?))
    }

    pub fn igreater_than_equal(&mut self, lhs: U32, rhs: U32, is_signed: bool) -> Result<U1> {
        let opcode = if is_signed {
            Opcode::SGreaterThanEqual
        } else {
            Opcode::UGreaterThanEqual
        };
        Ok(U1(self.inst(opcode, &[lhs.0, rhs.0])?))
    }

    pub fn iequal(&mut self, lhs: U32, rhs: U32) -> Result<U1> {
        Ok(U1(self.inst(Opcode::IEqual, &[lhs.0, rhs.0])?))
    }

    pub fn inot_equal(&mut self, lhs: U32, rhs: U32) -> Result<U1> {
        Ok(U1(self.inst(Opcode::INotEqual, &[lhs.0, rhs.0])?))
    }

    // Logical.

    pub fn logical_or(&mut self, a: U1, b: U1) -> Result<U1> {
        Ok(U1(self.inst(Opcode::LogicalOr, &[a.0, b.0])?))
    }

    pub fn logical_and(&mut self, a: U1, b: U1) -> Result<U1> {
        Ok(U1(self.inst(Opcode::LogicalAnd, &[a.0, b.0])?))
    }

    pub fn logical_xor(&mut self, a: U1, b: U1) -> Result<U1> {
        Ok(U1(self.inst(Opcode::LogicalXor, &[a.0, b.0])?))
    }

    pub fn logical_not(&mut self, value: U1) -> Result<U1> {
        Ok(U1(self.inst(Opcode::LogicalNot, &[value.0])?))
    }

    // Conversions.

    pub fn convert_f_to_s(&mut self, bitsize: usize, value: F16F32F64) -> Result<U32U64> {
        let table = match bitsize {
            16 => [Opcode::ConvertS16F16, Opcode::ConvertS16F32, Opcode::ConvertS16F64],
            32 => [Opcode::ConvertS32F16, Opcode::ConvertS32F32, Opcode::ConvertS32F64],
            64 => [Opcode::ConvertS64F16, Opcode::ConvertS64F32, Opcode::ConvertS64F64],
            other => {
                return Err(Error::invalid_argument(format!(
                    "invalid destination bitsize {other}"
                )))
            }
        };
        let opcode = match self.type_of(value.0) {
            Type::F16 => table[0],
            Type::F32 => table[1],
            Type::F64 => table[2],
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(U32U64(self.inst(opcode, &[value.0])?))
    }

    pub fn convert_f_to_u(&mut self, bitsize: usize, value: F16F32F64) -> Result<U32U64> {
        let table = match bitsize {
            16 => [Opcode::ConvertU16F16, Opcode::ConvertU16F32, Opcode::ConvertU16F64],
            32 => [Opcode::ConvertU32F16, Opcode::ConvertU32F32, Opcode::ConvertU32F64],
            64 => [Opcode::ConvertU64F16, Opcode::ConvertU64F32, Opcode::ConvertU64F64],
            other => {
                return Err(Error::invalid_argument(format!(
                    "invalid destination bitsize {other}"
                )))
            }
        };
        let opcode = match self.type_of(value.0) {
            Type::F16 => table[0],
            Type::F32 => table[1],
            Type::F64 => table[2],
            other => return Err(Error::invalid_argument(format!("invalid type {other}"))),
        };
        Ok(U32U64(self.inst(opcode, &[value.0])?))
    }

    pub fn convert_f_to_i(
        &mut self,
        bitsize: usize,
        is_signed: bool,
        value: F16F32F64,
    ) -> Result<U32U64> {
        if is_signed {
            self.convert_f_to_s(bitsize, value)
        } else {
            self.convert_f_to_u(bitsize, value)
        }
    }

    pub fn convert_u(&mut self, result_bitsize: usize, value: U32U64) -> Result<U32U64> {
        match (result_bitsize, self.type_of(value.0)) {
            (32, Type::U32) | (64, Type::U64) => Ok(value),
            (32, Type::U64) => Ok(U32U64(self.inst(Opcode::ConvertU32U64, &[value.0])?)),
            (64, Type::U32) => Ok(U32U64(self.inst(Opcode::ConvertU64U32, &[value.0])?)),
            (bits, ty) => Err(Error::not_implemented(format!(
                "conversion from {ty} to {bits} bits"
            ))),
        }
    }

    // Global memory.

    pub fn load_global_u8(&mut self, address: U64) -> Result<U32> {
        Ok(U32(self.inst(Opcode::LoadGlobalU8, &[address.0])?))
    }

    pub fn load_global_s8(&mut self, address: U64) -> Result<U32> {
        Ok(U32(self.inst(Opcode::LoadGlobalS8, &[address.0])?))
    }

    pub fn load_global_u16(&mut self, address: U64) -> Result<U32> {
        Ok(U32(self.inst(Opcode::LoadGlobalU16, &[address.0])?))
    }

    pub fn load_global_s16(&mut self, address: U64) -> Result<U32> {
        Ok(U32(self.inst(Opcode::LoadGlobalS16, &[address.0])?))
    }

    pub fn load_global_32(&mut self, address: U64) -> Result<U32> {
        Ok(U32(self.inst(Opcode::LoadGlobal32, &[address.0])?))
    }

    pub fn load_global_64(&mut self, address: U64) -> Result<Value> {
        self.inst(Opcode::LoadGlobal64, &[address.0])
    }

    pub fn load_global_128(&mut self, address: U64) -> Result<Value> {
        self.inst(Opcode::LoadGlobal128, &[address.0])
    }

    pub fn write_global_32(&mut self, address: U64, value: U32) -> Result<()> {
        self.inst(Opcode::WriteGlobal32, &[address.0, value.0])?;
        Ok(())
    }

    pub fn write_global_64(&mut self, address: U64, vector: Value) -> Result<()> {
        self.inst(Opcode::WriteGlobal64, &[address.0, vector])?;
        Ok(())
    }

    pub fn write_global_128(&mut self, address: U64, vector: Value) -> Result<()> {
        self.inst(Opcode::WriteGlobal128, &[address.0, vector])?;
        Ok(())
    }

    // Texture sampling. Optional operands are passed as `Value::Empty`.

    pub fn image_sample_implicit_lod(
        &mut self,
        handle: U32,
        coord: Value,
        bias_lc: Value,
        offset: Value,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageSampleImplicitLod,
            InstFlags::Texture(info),
            &[handle.0, coord, bias_lc, offset],
        )
    }

    pub fn image_sample_explicit_lod(
        &mut self,
        handle: U32,
        coord: Value,
        lod: F32,
        offset: Value,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageSampleExplicitLod,
            InstFlags::Texture(info),
            &[handle.0, coord, lod.0, offset],
        )
    }

    pub fn image_sample_dref_implicit_lod(
        &mut self,
        handle: U32,
        coord: Value,
        dref: F32,
        bias_lc: Value,
        offset: Value,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageSampleDrefImplicitLod,
            InstFlags::Texture(info),
            &[handle.0, coord, dref.0, bias_lc, offset],
        )
    }

    pub fn image_sample_dref_explicit_lod(
        &mut self,
        handle: U32,
        coord: Value,
        dref: F32,
        lod: F32,
        offset: Value,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageSampleDrefExplicitLod,
            InstFlags::Texture(info),
            &[handle.0, coord, dref.0, lod.0, offset],
        )
    }

    pub fn image_gather(
        &mut self,
        handle: U32,
        coord: Value,
        offset: Value,
        offset2: Value,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageGather,
            InstFlags::Texture(info),
            &[handle.0, coord, offset, offset2],
        )
    }

    pub fn image_gather_dref(
        &mut self,
        handle: U32,
        coord: Value,
        offset: Value,
        offset2: Value,
        dref: F32,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageGatherDref,
            InstFlags::Texture(info),
            &[handle.0, coord, offset, offset2, dref.0],
        )
    }

    pub fn image_fetch(
        &mut self,
        handle: U32,
        coord: Value,
        offset: Value,
        lod: U32,
        ms: Value,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageFetch,
            InstFlags::Texture(info),
            &[handle.0, coord, offset, lod.0, ms],
        )
    }

    pub fn image_query_dimensions(
        &mut self,
        handle: U32,
        lod: F32,
        info: TextureInstInfo,
    ) -> Result<Value> {
        self.inst_with(
            Opcode::ImageQueryDimensions,
            InstFlags::Texture(info),
            &[handle.0, lod.0],
        )
    }
}
