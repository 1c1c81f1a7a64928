//! Source-ISA frontend: decoding and IR translation.

pub mod attribute;
pub mod common;
pub mod decode;
pub mod float_arithmetic;
pub mod float_compare;
pub mod float_convert;
pub mod integer_arithmetic;
pub mod texture;
pub mod translate;
pub mod visitor;

pub use translate::{translate_program, CfgBlock, CfgTerminator};
pub use visitor::TranslatorVisitor;

/// Access to the guest shader the embedding driver exposes.
pub trait Environment {
    /// Reads the 64-bit instruction word at `word_index`.
    fn read_instruction(&self, word_index: u32) -> u64;

    /// Compute stage workgroup size; ignored for graphics stages.
    fn workgroup_size(&self) -> [u32; 3] {
        [1, 1, 1]
    }
}

/// Environment over a little-endian byte buffer of instruction words.
pub struct BytesEnvironment<'a> {
    bytes: &'a [u8],
}

impl<'a> BytesEnvironment<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl Environment for BytesEnvironment<'_> {
    fn read_instruction(&self, word_index: u32) -> u64 {
        let offset = word_index as usize * 8;
        let mut word = [0u8; 8];
        if let Some(chunk) = self.bytes.get(offset..offset + 8) {
            word.copy_from_slice(chunk);
        }
        u64::from_le_bytes(word)
    }
}
