//! TEX and TLD4: texture sampling and gather.
//!
//! Coordinates arrive in consecutive registers starting at the coordinate
//! register; the depth-compare reference follows the coordinates. Bias and
//! explicit LOD come from source B, offsets and the LOD clamp from source C.

use crate::error::{Error, Result};
use crate::frontend::decode::bits;
use crate::frontend::visitor::TranslatorVisitor;
use crate::ir::emit::F32;
use crate::ir::{Pred, Reg, TextureInstInfo, TextureType, Value};

fn texture_type(raw: u64) -> Result<TextureType> {
    TextureType::from_raw(raw as u32)
}

fn coord_count(texture_type: TextureType) -> usize {
    match texture_type {
        TextureType::Color1D | TextureType::Buffer => 1,
        TextureType::ColorArray1D | TextureType::Color2D => 2,
        TextureType::ColorArray2D | TextureType::Color3D | TextureType::ColorCube => 3,
        TextureType::ColorArrayCube => 4,
    }
}

impl TranslatorVisitor<'_> {
    /// Builds the coordinate operand: a scalar for 1D, a composite vector
    /// otherwise.
    fn gather_coords(&mut self, base: Reg, count: usize) -> Result<Value> {
        if count == 1 {
            return Ok(self.f(base)?.0);
        }
        let mut elements = Vec::with_capacity(count);
        for lane in 0..count {
            elements.push(self.f(base.offset(lane as u32)?)?.0);
        }
        self.ir.composite_construct(&elements)
    }

    fn store_color_result(&mut self, dest: Reg, result: Value) -> Result<()> {
        for lane in 0..4 {
            let element = self.ir.composite_extract(result, lane)?;
            self.f_store(dest.offset(lane as u32)?, F32(element))?;
        }
        Ok(())
    }

    /// Writes the sparse-residency predicate when the instruction requests
    /// it. The extractor stays associated with the sample instruction so the
    /// backend can fold it into the sample's emission.
    fn store_sparse_pred(&mut self, insn: u64, sample: Value) -> Result<()> {
        if bits(insn, 36, 1) == 0 {
            return Ok(());
        }
        let pred = Pred::new(bits(insn, 37, 3) as u32)?;
        let sparse = self.ir.get_sparse_from_op(sample)?;
        self.ir.set_pred(pred, sparse)
    }

    pub(super) fn tex(&mut self, insn: u64) -> Result<()> {
        let shape = texture_type(bits(insn, 28, 3))?;
        let lod_mode = bits(insn, 31, 2);
        let is_depth = bits(insn, 33, 1) != 0;
        let has_offset = bits(insn, 34, 1) != 0;
        let has_lod_clamp = bits(insn, 35, 1) != 0;
        let descriptor_index = bits(insn, 40, 8) as u32;

        if shape == TextureType::Buffer && (lod_mode != 0 || is_depth) {
            return Err(Error::not_implemented("buffer sampling with modifiers"));
        }

        let info = TextureInstInfo {
            texture_type: shape,
            is_depth,
            has_bias: lod_mode == 1,
            has_lod_clamp,
            gather_component: 0,
            descriptor_index,
        };

        let coord_reg = self.src_reg_a(insn)?;
        let count = coord_count(shape);
        let coord = self.gather_coords(coord_reg, count)?;
        let dref = if is_depth {
            Some(self.f(coord_reg.offset(count as u32)?)?)
        } else {
            None
        };

        let offset = if has_offset {
            let reg = self.reg39(insn)?;
            self.x(reg)?.0
        } else {
            Value::Empty
        };
        let lod_clamp = if has_lod_clamp {
            let reg = self.reg39(insn)?;
            let reg = if has_offset { reg.offset(1)? } else { reg };
            Some(self.f(reg)?)
        } else {
            None
        };

        let handle = self.ir.imm32(descriptor_index);
        let sample = match (lod_mode, dref) {
            // Implicit LOD, with an optional bias packed next to the clamp.
            (0 | 1, None) => {
                let bias_lc = self.bias_lod_clamp(insn, lod_mode == 1, lod_clamp)?;
                self.ir
                    .image_sample_implicit_lod(handle, coord, bias_lc, offset, info)?
            }
            (0 | 1, Some(dref)) => {
                let bias_lc = self.bias_lod_clamp(insn, lod_mode == 1, lod_clamp)?;
                self.ir
                    .image_sample_dref_implicit_lod(handle, coord, dref, bias_lc, offset, info)?
            }
            (2, None) => {
                let lod = self.get_float_reg20(insn)?;
                self.ir
                    .image_sample_explicit_lod(handle, coord, lod, offset, info)?
            }
            (2, Some(dref)) => {
                let lod = self.get_float_reg20(insn)?;
                self.ir
                    .image_sample_dref_explicit_lod(handle, coord, dref, lod, offset, info)?
            }
            (mode, _) => {
                return Err(Error::not_implemented(format!(
                    "texture LOD mode {mode}"
                )))
            }
        };

        self.store_sparse_pred(insn, sample)?;

        let dest = self.dest_reg(insn)?;
        if is_depth {
            self.f_store(dest, F32(sample))
        } else {
            self.store_color_result(dest, sample)
        }
    }

    /// Assembles the combined bias/LOD-clamp operand: a 2-wide composite when
    /// both are present, a lone scalar otherwise.
    fn bias_lod_clamp(
        &mut self,
        insn: u64,
        has_bias: bool,
        lod_clamp: Option<F32>,
    ) -> Result<Value> {
        let bias = if has_bias {
            Some(self.get_float_reg20(insn)?)
        } else {
            None
        };
        Ok(match (bias, lod_clamp) {
            (Some(bias), Some(clamp)) => self.ir.composite_construct(&[bias.0, clamp.0])?,
            (Some(bias), None) => bias.0,
            (None, Some(clamp)) => clamp.0,
            (None, None) => Value::Empty,
        })
    }

    pub(super) fn tld4(&mut self, insn: u64) -> Result<()> {
        let gather_component = bits(insn, 28, 2) as u8;
        let shape = texture_type(bits(insn, 30, 3))?;
        let is_depth = bits(insn, 33, 1) != 0;
        let offset_mode = bits(insn, 34, 2);
        let descriptor_index = bits(insn, 40, 8) as u32;

        match shape {
            TextureType::Color2D
            | TextureType::ColorArray2D
            | TextureType::ColorCube
            | TextureType::ColorArrayCube => {}
            other => {
                return Err(Error::not_implemented(format!(
                    "gather from texture shape {other:?}"
                )))
            }
        }

        let info = TextureInstInfo {
            texture_type: shape,
            is_depth,
            has_bias: false,
            has_lod_clamp: false,
            gather_component,
            descriptor_index,
        };

        let coord_reg = self.src_reg_a(insn)?;
        let coord = self.gather_coords(coord_reg, coord_count(shape))?;

        let (offset, offset2) = match offset_mode {
            0 => (Value::Empty, Value::Empty),
            1 => {
                let reg = self.reg20(insn)?;
                (self.x(reg)?.0, Value::Empty)
            }
            2 => {
                // Four offsets: two registers of packed [XYXY] pairs.
                let reg = self.reg20(insn)?;
                let first = self.x(reg)?.0;
                let second = self.x(reg.offset(1)?)?.0;
                (first, second)
            }
            other => {
                return Err(Error::not_implemented(format!(
                    "gather offset mode {other}"
                )))
            }
        };

        let handle = self.ir.imm32(descriptor_index);
        let sample = if is_depth {
            let dref = self.get_float_reg39(insn)?;
            self.ir
                .image_gather_dref(handle, coord, offset, offset2, dref, info)?
        } else {
            self.ir.image_gather(handle, coord, offset, offset2, info)?
        };

        self.store_sparse_pred(insn, sample)?;

        let dest = self.dest_reg(insn)?;
        self.store_color_result(dest, sample)
    }
}
