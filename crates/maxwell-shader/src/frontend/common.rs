//! Comparison and predicate-combine helpers shared by instruction families.

use crate::error::{Error, Result};
use crate::frontend::visitor::TranslatorVisitor;
use crate::ir::emit::{F16F32F64, U1, U32};
use crate::ir::FpControl;

/// Integer comparison encodings shared by the compare/select families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    False,
    LessThan,
    Equal,
    LessThanEqual,
    GreaterThan,
    NotEqual,
    GreaterThanEqual,
    True,
}

impl ComparisonOp {
    pub fn from_raw(raw: u64) -> Result<ComparisonOp> {
        Ok(match raw {
            0 => ComparisonOp::False,
            1 => ComparisonOp::LessThan,
            2 => ComparisonOp::Equal,
            3 => ComparisonOp::LessThanEqual,
            4 => ComparisonOp::GreaterThan,
            5 => ComparisonOp::NotEqual,
            6 => ComparisonOp::GreaterThanEqual,
            7 => ComparisonOp::True,
            other => {
                return Err(Error::invalid_argument(format!(
                    "invalid comparison encoding {other}"
                )))
            }
        })
    }
}

/// Float comparison encodings. Codes 8..15 are the unordered duals of 1..7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpCompareOp {
    False,
    LessThan,
    Equal,
    LessThanEqual,
    GreaterThan,
    NotEqual,
    GreaterThanEqual,
    Number,
    NaN,
    LessThanUnordered,
    EqualUnordered,
    LessThanEqualUnordered,
    GreaterThanUnordered,
    NotEqualUnordered,
    GreaterThanEqualUnordered,
    True,
}

impl FpCompareOp {
    pub fn from_raw(raw: u64) -> Result<FpCompareOp> {
        Ok(match raw {
            0 => FpCompareOp::False,
            1 => FpCompareOp::LessThan,
            2 => FpCompareOp::Equal,
            3 => FpCompareOp::LessThanEqual,
            4 => FpCompareOp::GreaterThan,
            5 => FpCompareOp::NotEqual,
            6 => FpCompareOp::GreaterThanEqual,
            7 => FpCompareOp::Number,
            8 => FpCompareOp::NaN,
            9 => FpCompareOp::LessThanUnordered,
            10 => FpCompareOp::EqualUnordered,
            11 => FpCompareOp::LessThanEqualUnordered,
            12 => FpCompareOp::GreaterThanUnordered,
            13 => FpCompareOp::NotEqualUnordered,
            14 => FpCompareOp::GreaterThanEqualUnordered,
            15 => FpCompareOp::True,
            other => {
                return Err(Error::invalid_argument(format!(
                    "invalid float comparison encoding {other}"
                )))
            }
        })
    }
}

/// Predicate combine function applied to a compare result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    Or,
    Xor,
}

impl BooleanOp {
    pub fn from_raw(raw: u64) -> Result<BooleanOp> {
        Ok(match raw {
            0 => BooleanOp::And,
            1 => BooleanOp::Or,
            2 => BooleanOp::Xor,
            other => {
                return Err(Error::invalid_argument(format!(
                    "invalid boolean op encoding {other}"
                )))
            }
        })
    }
}

pub fn integer_compare(
    v: &mut TranslatorVisitor<'_>,
    operand_1: U32,
    operand_2: U32,
    compare_op: ComparisonOp,
    is_signed: bool,
) -> Result<U1> {
    match compare_op {
        ComparisonOp::False => Ok(v.ir.imm1(false)),
        ComparisonOp::LessThan => v.ir.iless_than(operand_1, operand_2, is_signed),
        ComparisonOp::Equal => v.ir.iequal(operand_1, operand_2),
        ComparisonOp::LessThanEqual => v.ir.iless_than_equal(operand_1, operand_2, is_signed),
        ComparisonOp::GreaterThan => v.ir.igreater_than(operand_1, operand_2, is_signed),
        ComparisonOp::NotEqual => v.ir.inot_equal(operand_1, operand_2),
        ComparisonOp::GreaterThanEqual => v.ir.igreater_than_equal(operand_1, operand_2, is_signed),
        ComparisonOp::True => Ok(v.ir.imm1(true)),
    }
}

pub fn predicate_combine(
    v: &mut TranslatorVisitor<'_>,
    predicate_1: U1,
    predicate_2: U1,
    bop: BooleanOp,
) -> Result<U1> {
    match bop {
        BooleanOp::And => v.ir.logical_and(predicate_1, predicate_2),
        BooleanOp::Or => v.ir.logical_or(predicate_1, predicate_2),
        BooleanOp::Xor => v.ir.logical_xor(predicate_1, predicate_2),
    }
}

pub fn floating_point_compare(
    v: &mut TranslatorVisitor<'_>,
    lhs: F16F32F64,
    rhs: F16F32F64,
    compare_op: FpCompareOp,
    _control: FpControl,
) -> Result<U1> {
    match compare_op {
        FpCompareOp::False => Ok(v.ir.imm1(false)),
        FpCompareOp::LessThan => v.ir.fp_less_than(lhs, rhs, true),
        FpCompareOp::Equal => v.ir.fp_equal(lhs, rhs, true),
        FpCompareOp::LessThanEqual => v.ir.fp_less_than_equal(lhs, rhs, true),
        FpCompareOp::GreaterThan => v.ir.fp_greater_than(lhs, rhs, true),
        FpCompareOp::NotEqual => v.ir.fp_not_equal(lhs, rhs, true),
        FpCompareOp::GreaterThanEqual => v.ir.fp_greater_than_equal(lhs, rhs, true),
        FpCompareOp::Number => {
            let ord = v.ir.fp_equal(lhs, lhs, true)?;
            let rhs_ord = v.ir.fp_equal(rhs, rhs, true)?;
            v.ir.logical_and(ord, rhs_ord)
        }
        FpCompareOp::NaN => {
            let unord = v.ir.fp_not_equal(lhs, lhs, false)?;
            let rhs_unord = v.ir.fp_not_equal(rhs, rhs, false)?;
            v.ir.logical_or(unord, rhs_unord)
        }
        FpCompareOp::LessThanUnordered => v.ir.fp_less_than(lhs, rhs, false),
        FpCompareOp::EqualUnordered => v.ir.fp_equal(lhs, rhs, false),
        FpCompareOp::LessThanEqualUnordered => v.ir.fp_less_than_equal(lhs, rhs, false),
        FpCompareOp::GreaterThanUnordered => v.ir.fp_greater_than(lhs, rhs, false),
        FpCompareOp::NotEqualUnordered => v.ir.fp_not_equal(lhs, rhs, false),
        FpCompareOp::GreaterThanEqualUnordered => v.ir.fp_greater_than_equal(lhs, rhs, false),
        FpCompareOp::True => Ok(v.ir.imm1(true)),
    }
}
