//! Source-ISA instruction word decoding.
//!
//! Instructions are 64-bit words with the primary opcode in the top 12 bits.
//! Only the encodings the translator lowers are listed; everything else is a
//! `DecodeError` so unsupported content fails before any IR is built.

use crate::error::{Error, Result};

/// Extracts `len` bits of `insn` starting at bit `lo`.
pub fn bits(insn: u64, lo: u32, len: u32) -> u64 {
    (insn >> lo) & ((1u64 << len) - 1)
}

/// Primary opcode field, bits 52..64.
const OPCODE_SHIFT: u32 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    MovReg,
    Mov32Imm,
    FAddReg,
    FAddCbuf,
    FAddImm,
    FMulReg,
    FMulCbuf,
    FMulImm,
    FFmaReg,
    FCmpReg,
    FCmpRc,
    FCmpCr,
    FCmpImm,
    F2IReg,
    F2ICbuf,
    F2IImm,
    IAddReg,
    IAddImm,
    ISetpReg,
    Ipa,
    Ast,
    Tex,
    Tld4,
    Exit,
    Bra,
}

pub fn decode(insn: u64, word_index: u32) -> Result<Opcode> {
    let opcode = (insn >> OPCODE_SHIFT) as u16;
    Ok(match opcode {
        0x50b => Opcode::Nop,
        0x5c9 => Opcode::MovReg,
        0x010 => Opcode::Mov32Imm,
        0x5c5 => Opcode::FAddReg,
        0x4c5 => Opcode::FAddCbuf,
        0x385 => Opcode::FAddImm,
        0x5c6 => Opcode::FMulReg,
        0x4c6 => Opcode::FMulCbuf,
        0x386 => Opcode::FMulImm,
        0x59a => Opcode::FFmaReg,
        0x5ba => Opcode::FCmpReg,
        0x5bb => Opcode::FCmpRc,
        0x4ba => Opcode::FCmpCr,
        0x36a => Opcode::FCmpImm,
        0x5cb => Opcode::F2IReg,
        0x4cb => Opcode::F2ICbuf,
        0x36b => Opcode::F2IImm,
        0x5c1 => Opcode::IAddReg,
        0x381 => Opcode::IAddImm,
        0x5b6 => Opcode::ISetpReg,
        0xe00 => Opcode::Ipa,
        0xef5 => Opcode::Ast,
        0xc03 => Opcode::Tex,
        0xc83 => Opcode::Tld4,
        0xe30 => Opcode::Exit,
        0xe24 => Opcode::Bra,
        other => {
            return Err(Error::decode(
                word_index,
                format!("unknown opcode {other:#05x}"),
            ))
        }
    })
}
