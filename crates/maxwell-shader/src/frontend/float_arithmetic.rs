//! Floating-point add, multiply and fused multiply-add.

use crate::error::Result;
use crate::frontend::decode::bits;
use crate::frontend::visitor::TranslatorVisitor;
use crate::ir::emit::{F16F32F64, F32};
use crate::ir::{FmzMode, FpControl, FpRounding};

fn fp_control(ftz: bool) -> FpControl {
    FpControl {
        no_contraction: true,
        rounding: FpRounding::DontCare,
        fmz_mode: if ftz { FmzMode::FTZ } else { FmzMode::None },
    }
}

impl TranslatorVisitor<'_> {
    /// Stores `result` and updates the Z/S flags when the CC bit is set.
    fn store_f32_cc(&mut self, insn: u64, result: F16F32F64) -> Result<()> {
        let dest = self.dest_reg(insn)?;
        self.f_store(dest, F32(result.0))?;
        if bits(insn, 47, 1) != 0 {
            let zero = self.ir.get_zero_from_op(result.0)?;
            self.ir.set_zflag(zero)?;
            let sign = self.ir.get_sign_from_op(result.0)?;
            self.ir.set_sflag(sign)?;
        }
        Ok(())
    }

    fn fadd(&mut self, insn: u64, src_b: F32) -> Result<()> {
        let src_a = self.src_reg_a(insn)?;
        let op_a = self.f(src_a)?;
        let abs_a = bits(insn, 46, 1) != 0;
        let neg_a = bits(insn, 48, 1) != 0;
        let abs_b = bits(insn, 49, 1) != 0;
        let neg_b = bits(insn, 45, 1) != 0;
        let op_a = self.ir.fp_abs_neg(op_a.into(), abs_a, neg_a)?;
        let op_b = self.ir.fp_abs_neg(src_b.into(), abs_b, neg_b)?;
        let control = fp_control(bits(insn, 44, 1) != 0);
        let mut result = self.ir.fp_add(op_a, op_b, control)?;
        if bits(insn, 50, 1) != 0 {
            result = self.ir.fp_saturate(result)?;
        }
        self.store_f32_cc(insn, result)
    }

    pub(super) fn fadd_reg(&mut self, insn: u64) -> Result<()> {
        let src_b = self.get_float_reg20(insn)?;
        self.fadd(insn, src_b)
    }

    pub(super) fn fadd_cbuf(&mut self, insn: u64, word_index: u32) -> Result<()> {
        let src_b = self.get_float_cbuf(insn, word_index)?;
        self.fadd(insn, src_b)
    }

    pub(super) fn fadd_imm(&mut self, insn: u64) -> Result<()> {
        let src_b = self.get_float_imm20(insn);
        self.fadd(insn, src_b)
    }

    fn fmul(&mut self, insn: u64, src_b: F32) -> Result<()> {
        let src_a = self.src_reg_a(insn)?;
        let op_a = self.f(src_a)?;
        let neg_b = bits(insn, 48, 1) != 0;
        let op_b = self.ir.fp_abs_neg(src_b.into(), false, neg_b)?;
        let control = fp_control(bits(insn, 44, 1) != 0);
        let mut result = self.ir.fp_mul(op_a.into(), op_b, control)?;
        if bits(insn, 50, 1) != 0 {
            result = self.ir.fp_saturate(result)?;
        }
        self.store_f32_cc(insn, result)
    }

    pub(super) fn fmul_reg(&mut self, insn: u64) -> Result<()> {
        let src_b = self.get_float_reg20(insn)?;
        self.fmul(insn, src_b)
    }

    pub(super) fn fmul_cbuf(&mut self, insn: u64, word_index: u32) -> Result<()> {
        let src_b = self.get_float_cbuf(insn, word_index)?;
        self.fmul(insn, src_b)
    }

    pub(super) fn fmul_imm(&mut self, insn: u64) -> Result<()> {
        let src_b = self.get_float_imm20(insn);
        self.fmul(insn, src_b)
    }

    pub(super) fn ffma_reg(&mut self, insn: u64) -> Result<()> {
        let op_a = {
            let reg = self.src_reg_a(insn)?;
            self.f(reg)?
        };
        let op_b = self.get_float_reg20(insn)?;
        let op_c = self.get_float_reg39(insn)?;
        let neg_b = bits(insn, 48, 1) != 0;
        let neg_c = bits(insn, 49, 1) != 0;
        let op_b = self.ir.fp_abs_neg(op_b.into(), false, neg_b)?;
        let op_c = self.ir.fp_abs_neg(op_c.into(), false, neg_c)?;
        let control = fp_control(bits(insn, 44, 1) != 0);
        let mut result = self.ir.fp_fma(op_a.into(), op_b, op_c, control)?;
        if bits(insn, 50, 1) != 0 {
            result = self.ir.fp_saturate(result)?;
        }
        self.store_f32_cc(insn, result)
    }

    pub(super) fn mov_reg(&mut self, insn: u64) -> Result<()> {
        let value = self.get_reg20(insn)?;
        let dest = self.dest_reg(insn)?;
        self.x_store(dest, value)
    }

    pub(super) fn mov32_imm(&mut self, insn: u64) -> Result<()> {
        let value = self.get_imm32(insn);
        let dest = self.dest_reg(insn)?;
        self.x_store(dest, value)
    }
}
