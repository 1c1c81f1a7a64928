//! Per-instruction translation state and shared operand helpers.

use crate::error::{Error, Result};
use crate::frontend::decode::{bits, Opcode};
use crate::ir::emit::{F32, U32};
use crate::ir::{IREmitter, Reg};

/// Highest constant buffer binding the hardware accepts.
const NUM_CBUF_BINDINGS: u64 = 18;
/// Constant buffers span 16 KiB.
const CBUF_SIZE_BYTES: u64 = 0x4000;

/// Translates the instructions of one block into IR.
///
/// Reads and writes of registers, predicates and flags go through the naive
/// `Get*`/`Set*` opcodes; SSA construction happens later in the optimizer.
pub struct TranslatorVisitor<'f> {
    pub ir: IREmitter<'f>,
}

impl TranslatorVisitor<'_> {
    pub fn visit(&mut self, opcode: Opcode, insn: u64, word_index: u32) -> Result<()> {
        match opcode {
            Opcode::Nop => Ok(()),
            Opcode::MovReg => self.mov_reg(insn),
            Opcode::Mov32Imm => self.mov32_imm(insn),
            Opcode::FAddReg => self.fadd_reg(insn),
            Opcode::FAddCbuf => self.fadd_cbuf(insn, word_index),
            Opcode::FAddImm => self.fadd_imm(insn),
            Opcode::FMulReg => self.fmul_reg(insn),
            Opcode::FMulCbuf => self.fmul_cbuf(insn, word_index),
            Opcode::FMulImm => self.fmul_imm(insn),
            Opcode::FFmaReg => self.ffma_reg(insn),
            Opcode::FCmpReg => self.fcmp_reg(insn),
            Opcode::FCmpRc => self.fcmp_rc(insn, word_index),
            Opcode::FCmpCr => self.fcmp_cr(insn, word_index),
            Opcode::FCmpImm => self.fcmp_imm(insn),
            Opcode::F2IReg => self.f2i_reg(insn),
            Opcode::F2ICbuf => self.f2i_cbuf(insn, word_index),
            Opcode::F2IImm => Err(Error::not_implemented("F2I with immediate operand")),
            Opcode::IAddReg => self.iadd_reg(insn),
            Opcode::IAddImm => self.iadd_imm(insn),
            Opcode::ISetpReg => self.isetp_reg(insn),
            Opcode::Ipa => self.ipa(insn),
            Opcode::Ast => self.ast(insn),
            Opcode::Tex => self.tex(insn),
            Opcode::Tld4 => self.tld4(insn),
            // Branches are emitted from the recovered block layout, not from
            // the raw words; see `translate_program`.
            Opcode::Exit | Opcode::Bra => Ok(()),
        }
    }

    // Operand field helpers. Field positions are shared by every instruction
    // family: destination in 0..8, source A in 8..16, source B in 20..28 or
    // an immediate/constant-buffer field at 20, source C in 39..47.

    pub fn dest_reg(&self, insn: u64) -> Result<Reg> {
        Reg::new(bits(insn, 0, 8) as u32)
    }

    pub fn src_reg_a(&self, insn: u64) -> Result<Reg> {
        Reg::new(bits(insn, 8, 8) as u32)
    }

    pub fn reg20(&self, insn: u64) -> Result<Reg> {
        Reg::new(bits(insn, 20, 8) as u32)
    }

    pub fn reg39(&self, insn: u64) -> Result<Reg> {
        Reg::new(bits(insn, 39, 8) as u32)
    }

    /// Register read; `RZ` folds to `0`.
    pub fn x(&mut self, reg: Reg) -> Result<U32> {
        self.ir.get_reg(reg)
    }

    /// Register read viewed as `f32`.
    pub fn f(&mut self, reg: Reg) -> Result<F32> {
        let raw = self.x(reg)?;
        self.ir.bitcast_f32_u32(raw)
    }

    pub fn x_store(&mut self, reg: Reg, value: U32) -> Result<()> {
        self.ir.set_reg(reg, value)
    }

    pub fn f_store(&mut self, reg: Reg, value: F32) -> Result<()> {
        let raw = self.ir.bitcast_u32_f32(value)?;
        self.ir.set_reg(reg, raw)
    }

    pub fn get_reg20(&mut self, insn: u64) -> Result<U32> {
        let reg = self.reg20(insn)?;
        self.x(reg)
    }

    pub fn get_reg39(&mut self, insn: u64) -> Result<U32> {
        let reg = self.reg39(insn)?;
        self.x(reg)
    }

    pub fn get_float_reg20(&mut self, insn: u64) -> Result<F32> {
        let reg = self.reg20(insn)?;
        self.f(reg)
    }

    pub fn get_float_reg39(&mut self, insn: u64) -> Result<F32> {
        let reg = self.reg39(insn)?;
        self.f(reg)
    }

    /// Constant buffer operand: binding in 34..39, signed byte offset (in
    /// words of 4) in 20..34. Out-of-range fields are rejected before any IR
    /// is emitted.
    pub fn get_cbuf(&mut self, insn: u64, word_index: u32) -> Result<U32> {
        let binding = bits(insn, 34, 5);
        if binding >= NUM_CBUF_BINDINGS {
            return Err(Error::decode(
                word_index,
                format!("out of bounds constant buffer binding {binding}"),
            ));
        }
        let offset = bits(insn, 20, 14) as i64;
        let offset = (offset << 50) >> 50; // sign extend 14 bits
        if offset < 0 || offset as u64 * 4 >= CBUF_SIZE_BYTES {
            return Err(Error::decode(
                word_index,
                format!("out of bounds constant buffer offset {}", offset * 4),
            ));
        }
        let binding = self.ir.imm32(binding as u32);
        let byte_offset = self.ir.imm32(offset as u32 * 4);
        self.ir.get_cbuf(binding, byte_offset)
    }

    pub fn get_float_cbuf(&mut self, insn: u64, word_index: u32) -> Result<F32> {
        let raw = self.get_cbuf(insn, word_index)?;
        self.ir.bitcast_f32_u32(raw)
    }

    /// 19-bit integer immediate at 20.
    pub fn get_imm20(&mut self, insn: u64) -> U32 {
        self.ir.imm32(bits(insn, 20, 19) as u32)
    }

    /// Float immediate: the 19 most significant mantissa/exponent bits.
    pub fn get_float_imm20(&mut self, insn: u64) -> F32 {
        let raw = (bits(insn, 20, 19) as u32) << 13;
        self.ir.imm32_float(f32::from_bits(raw))
    }

    /// 32-bit immediate at 20 (wide-immediate forms only).
    pub fn get_imm32(&mut self, insn: u64) -> U32 {
        self.ir.imm32(bits(insn, 20, 32) as u32)
    }
}
