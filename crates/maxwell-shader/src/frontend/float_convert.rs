//! F2I: floating point to integer conversion.

use crate::error::{Error, Result};
use crate::frontend::decode::bits;
use crate::frontend::visitor::TranslatorVisitor;
use crate::ir::emit::{F16F32F64, U32, U64};
use crate::ir::{FmzMode, FpControl, FpRounding};

const NUM_CBUF_BINDINGS: u64 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SrcFormat {
    F16,
    F32,
    F64,
}

fn src_format(insn: u64, word_index: u32) -> Result<SrcFormat> {
    match bits(insn, 10, 2) {
        1 => Ok(SrcFormat::F16),
        2 => Ok(SrcFormat::F32),
        3 => Ok(SrcFormat::F64),
        other => Err(Error::decode(
            word_index,
            format!("invalid F2I source format {other}"),
        )),
    }
}

fn dest_bitsize(insn: u64) -> Result<usize> {
    match bits(insn, 8, 2) {
        1 => Ok(16),
        2 => Ok(32),
        3 => Ok(64),
        other => Err(Error::not_implemented(format!(
            "invalid F2I destination format {other}"
        ))),
    }
}

/// Reads a 64-bit float operand out of a constant buffer: the offset must be
/// 8-byte aligned and the value is assembled from two 32-bit words.
fn unpack_cbuf_f64(v: &mut TranslatorVisitor<'_>, insn: u64, word_index: u32) -> Result<F16F32F64> {
    let binding = bits(insn, 34, 5);
    if binding >= NUM_CBUF_BINDINGS {
        return Err(Error::decode(
            word_index,
            format!("out of bounds constant buffer binding {binding}"),
        ));
    }
    let offset = bits(insn, 20, 14) as i64;
    let offset = (offset << 50) >> 50;
    if offset < 0 || offset >= 0x1000 {
        return Err(Error::decode(
            word_index,
            format!("out of bounds constant buffer offset {}", offset * 4),
        ));
    }
    if offset % 2 != 0 {
        return Err(Error::decode(
            word_index,
            format!("unaligned F64 constant buffer offset {}", offset * 4),
        ));
    }
    let binding = v.ir.imm32(binding as u32);
    let byte_offset = v.ir.imm32(offset as u32 * 4 + 4);
    let cbuf_data = v.ir.get_cbuf(binding, byte_offset)?;
    let zero = v.ir.imm32(0);
    let vector = v.ir.composite_construct(&[zero.0, cbuf_data.0])?;
    Ok(F16F32F64(v.ir.pack_double_2x32(vector)?.0))
}

fn translate_f2i(v: &mut TranslatorVisitor<'_>, insn: u64, src_a: F16F32F64) -> Result<()> {
    let format = src_format(insn, 0)?;
    let bitsize = dest_bitsize(insn)?;

    // Denormal flushing only affects the f32-to-narrow paths.
    let denorm_cares = format == SrcFormat::F32 && bitsize != 64;
    let mut fmz_mode = FmzMode::DontCare;
    if denorm_cares {
        fmz_mode = if bits(insn, 44, 1) != 0 {
            FmzMode::FTZ
        } else {
            FmzMode::None
        };
    }
    let control = FpControl {
        no_contraction: true,
        rounding: FpRounding::DontCare,
        fmz_mode,
    };

    let abs = bits(insn, 45, 1) != 0;
    let neg = bits(insn, 46, 1) != 0;
    let op_a = v.ir.fp_abs_neg(src_a, abs, neg)?;
    let rounded = match bits(insn, 39, 2) {
        0 => v.ir.fp_round_even(op_a, control)?,
        1 => v.ir.fp_floor(op_a, control)?,
        2 => v.ir.fp_ceil(op_a, control)?,
        _ => v.ir.fp_trunc(op_a, control)?,
    };

    let is_signed = bits(insn, 12, 1) != 0;
    let result = v.ir.convert_f_to_i(bitsize, is_signed, rounded)?;

    let dest = v.dest_reg(insn)?;
    if bitsize == 64 {
        let vector = v.ir.unpack_uint_2x32(U64(result.0))?;
        let lo = v.ir.composite_extract(vector, 0)?;
        let hi = v.ir.composite_extract(vector, 1)?;
        v.x_store(dest, U32(lo))?;
        v.x_store(dest.offset(1)?, U32(hi))?;
    } else {
        v.x_store(dest, U32(result.0))?;
    }

    if bits(insn, 47, 1) != 0 {
        return Err(Error::not_implemented("F2I CC"));
    }
    Ok(())
}

impl TranslatorVisitor<'_> {
    pub(super) fn f2i_reg(&mut self, insn: u64) -> Result<()> {
        let src_reg = self.reg20(insn)?;
        let op_a = match src_format(insn, 0)? {
            SrcFormat::F16 => {
                let raw = self.x(src_reg)?;
                let halves = self.ir.unpack_float_2x16(raw)?;
                let half = bits(insn, 43, 1) as usize;
                F16F32F64(self.ir.composite_extract(halves, half)?)
            }
            SrcFormat::F32 => self.f(src_reg)?.into(),
            SrcFormat::F64 => {
                let lo = self.x(src_reg)?;
                let hi = self.x(src_reg.offset(1)?)?;
                let vector = self.ir.composite_construct(&[lo.0, hi.0])?;
                F16F32F64(self.ir.pack_double_2x32(vector)?.0)
            }
        };
        translate_f2i(self, insn, op_a)
    }

    pub(super) fn f2i_cbuf(&mut self, insn: u64, word_index: u32) -> Result<()> {
        let op_a = match src_format(insn, word_index)? {
            SrcFormat::F16 => {
                let raw = self.get_cbuf(insn, word_index)?;
                let halves = self.ir.unpack_float_2x16(raw)?;
                let half = bits(insn, 43, 1) as usize;
                F16F32F64(self.ir.composite_extract(halves, half)?)
            }
            SrcFormat::F32 => self.get_float_cbuf(insn, word_index)?.into(),
            SrcFormat::F64 => unpack_cbuf_f64(self, insn, word_index)?,
        };
        translate_f2i(self, insn, op_a)
    }
}
