//! Integer add and predicate-set instructions.

use crate::error::Result;
use crate::frontend::common::{integer_compare, predicate_combine, BooleanOp, ComparisonOp};
use crate::frontend::decode::bits;
use crate::frontend::visitor::TranslatorVisitor;
use crate::ir::emit::U32;
use crate::ir::Pred;

impl TranslatorVisitor<'_> {
    fn iadd(&mut self, insn: u64, src_b: U32) -> Result<()> {
        let src_a = self.src_reg_a(insn)?;
        let mut op_a = self.x(src_a)?;
        let mut op_b = src_b;
        if bits(insn, 49, 1) != 0 {
            op_a = self.ir.ineg(op_a)?;
        }
        if bits(insn, 45, 1) != 0 {
            op_b = self.ir.ineg(op_b)?;
        }
        let result = self.ir.iadd(op_a.into(), op_b.into())?;
        let dest = self.dest_reg(insn)?;
        self.x_store(dest, U32(result.0))?;

        if bits(insn, 47, 1) != 0 {
            let zero = self.ir.get_zero_from_op(result.0)?;
            self.ir.set_zflag(zero)?;
            let sign = self.ir.get_sign_from_op(result.0)?;
            self.ir.set_sflag(sign)?;
            let carry = self.ir.get_carry_from_op(result.0)?;
            self.ir.set_cflag(carry)?;
            let overflow = self.ir.get_overflow_from_op(result.0)?;
            self.ir.set_oflag(overflow)?;
        }
        Ok(())
    }

    pub(super) fn iadd_reg(&mut self, insn: u64) -> Result<()> {
        let src_b = self.get_reg20(insn)?;
        self.iadd(insn, src_b)
    }

    pub(super) fn iadd_imm(&mut self, insn: u64) -> Result<()> {
        let src_b = self.get_imm20(insn);
        self.iadd(insn, src_b)
    }

    pub(super) fn isetp_reg(&mut self, insn: u64) -> Result<()> {
        let dest_pred = Pred::new(bits(insn, 3, 3) as u32)?;
        let combine_pred = Pred::new(bits(insn, 39, 3) as u32)?;
        let combine_negated = bits(insn, 42, 1) != 0;
        let is_signed = bits(insn, 43, 1) != 0;
        let bop = BooleanOp::from_raw(bits(insn, 45, 2))?;
        let compare_op = ComparisonOp::from_raw(bits(insn, 48, 3))?;

        let op_a = {
            let reg = self.src_reg_a(insn)?;
            self.x(reg)?
        };
        let op_b = self.get_reg20(insn)?;
        let compared = integer_compare(self, op_a, op_b, compare_op, is_signed)?;
        let combine = self.ir.get_pred(combine_pred, combine_negated)?;
        let result = predicate_combine(self, compared, combine, bop)?;
        self.ir.set_pred(dest_pred, result)
    }
}
