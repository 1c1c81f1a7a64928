//! FCMP: floating-point compare-and-select.

use crate::error::Result;
use crate::frontend::common::{floating_point_compare, FpCompareOp};
use crate::frontend::decode::bits;
use crate::frontend::visitor::TranslatorVisitor;
use crate::ir::emit::{F32, U32};
use crate::ir::{FmzMode, FpControl, FpRounding};

fn fcmp(v: &mut TranslatorVisitor<'_>, insn: u64, src_a: U32, operand: F32) -> Result<()> {
    let compare_op = FpCompareOp::from_raw(bits(insn, 48, 4))?;
    let ftz = bits(insn, 47, 1) != 0;
    let control = FpControl {
        no_contraction: false,
        rounding: FpRounding::DontCare,
        fmz_mode: if ftz { FmzMode::FTZ } else { FmzMode::None },
    };

    let zero = v.ir.imm32_float(0.0);
    let cmp_result = floating_point_compare(v, operand.into(), zero.into(), compare_op, control)?;
    let src_reg = {
        let reg = v.src_reg_a(insn)?;
        v.x(reg)?
    };
    let result = v.ir.select(cmp_result, src_reg.0, src_a.0)?;

    let dest = v.dest_reg(insn)?;
    v.x_store(dest, U32(result))
}

impl TranslatorVisitor<'_> {
    pub(super) fn fcmp_reg(&mut self, insn: u64) -> Result<()> {
        let src_a = self.get_reg20(insn)?;
        let operand = self.get_float_reg39(insn)?;
        fcmp(self, insn, src_a, operand)
    }

    pub(super) fn fcmp_rc(&mut self, insn: u64, word_index: u32) -> Result<()> {
        let src_a = self.get_reg39(insn)?;
        let operand = self.get_float_cbuf(insn, word_index)?;
        fcmp(self, insn, src_a, operand)
    }

    pub(super) fn fcmp_cr(&mut self, insn: u64, word_index: u32) -> Result<()> {
        let src_a = self.get_cbuf(insn, word_index)?;
        let operand = self.get_float_reg39(insn)?;
        fcmp(self, insn, src_a, operand)
    }

    pub(super) fn fcmp_imm(&mut self, insn: u64) -> Result<()> {
        let src_a = self.get_reg39(insn)?;
        let operand = self.get_float_imm20(insn);
        fcmp(self, insn, src_a, operand)
    }
}
