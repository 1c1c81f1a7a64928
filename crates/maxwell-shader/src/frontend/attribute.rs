//! IPA: fragment shader varying interpolation.

use crate::error::{Error, Result};
use crate::frontend::decode::bits;
use crate::frontend::visitor::TranslatorVisitor;
use crate::ir::emit::{F16F32F64, F32};
use crate::ir::{Attribute, Reg};

impl TranslatorVisitor<'_> {
    pub(super) fn ipa(&mut self, insn: u64) -> Result<()> {
        // IPA reads varyings in fragment shaders; the position attribute maps
        // to the host's fragment coordinate. Results are undefined in other
        // stages.
        let index_reg = Reg::new(bits(insn, 8, 8) as u32)?;
        let is_indexed = bits(insn, 38, 1) != 0 && !index_reg.is_rz();
        if is_indexed {
            return Err(Error::not_implemented("IPA.IDX"));
        }

        let attribute = Attribute::from_offset(bits(insn, 28, 10) as u32 * 4)?;
        let mut value: F16F32F64 = self.ir.get_attribute(attribute)?.into();

        match bits(insn, 47, 2) {
            0 => {} // pass-through
            1 => {
                let multiplier = Reg::new(bits(insn, 20, 8) as u32)?;
                let multiplier = self.f(multiplier)?;
                value = self
                    .ir
                    .fp_mul(value, multiplier.into(), Default::default())?;
            }
            2 => return Err(Error::not_implemented("IPA.CONSTANT")),
            _ => return Err(Error::not_implemented("IPA.SC")),
        }

        // Saturated IPAs generally come from clamped varyings.
        if bits(insn, 51, 1) != 0 {
            if attribute == Attribute::FrontFace {
                return Err(Error::not_implemented("IPA.SAT on FrontFace"));
            }
            value = self.ir.fp_saturate(value)?;
        }

        let dest = self.dest_reg(insn)?;
        self.f_store(dest, F32(value.0))
    }

    /// AST: attribute store, the output path of vertex-like stages.
    pub(super) fn ast(&mut self, insn: u64) -> Result<()> {
        let attribute = Attribute::from_offset(bits(insn, 28, 10) as u32 * 4)?;
        let value = {
            let reg = Reg::new(bits(insn, 0, 8) as u32)?;
            self.f(reg)?
        };
        self.ir.set_attribute(attribute, value)
    }
}
