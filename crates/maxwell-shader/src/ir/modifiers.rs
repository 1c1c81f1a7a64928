//! Opcode-specific instruction flag payloads.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FpRounding {
    #[default]
    DontCare,
    /// Round to nearest even.
    RN,
    /// Round towards negative infinity.
    RM,
    /// Round towards positive infinity.
    RP,
    /// Round towards zero.
    RZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FmzMode {
    #[default]
    DontCare,
    /// Flush denorm inputs and outputs to zero.
    FTZ,
    /// FTZ, and multiplies of zero by anything yield zero.
    FMZ,
    None,
}

/// Floating-point control attached to FP arithmetic instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FpControl {
    pub no_contraction: bool,
    pub rounding: FpRounding,
    pub fmz_mode: FmzMode,
}

/// Texture shape addressed by a sampling instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Color1D,
    ColorArray1D,
    Color2D,
    ColorArray2D,
    Color3D,
    ColorCube,
    ColorArrayCube,
    Buffer,
}

impl TextureType {
    pub fn from_raw(raw: u32) -> Result<TextureType> {
        match raw {
            0 => Ok(TextureType::Color1D),
            1 => Ok(TextureType::ColorArray1D),
            2 => Ok(TextureType::Color2D),
            3 => Ok(TextureType::ColorArray2D),
            4 => Ok(TextureType::Color3D),
            5 => Ok(TextureType::ColorCube),
            6 => Ok(TextureType::ColorArrayCube),
            7 => Ok(TextureType::Buffer),
            other => Err(Error::invalid_argument(format!(
                "invalid texture type encoding {other}"
            ))),
        }
    }
}

/// Per-instruction texture sampling key carried by image opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInstInfo {
    pub texture_type: TextureType,
    pub is_depth: bool,
    pub has_bias: bool,
    pub has_lod_clamp: bool,
    /// Gathered component for `ImageGather`, `0..4`.
    pub gather_component: u8,
    /// Index into the emit context's texture binding table.
    pub descriptor_index: u32,
}

impl Default for TextureInstInfo {
    fn default() -> Self {
        Self {
            texture_type: TextureType::Color2D,
            is_depth: false,
            has_bias: false,
            has_lod_clamp: false,
            gather_component: 0,
            descriptor_index: 0,
        }
    }
}

/// Flags payload of an instruction; which variant is legal is declared by the
/// opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InstFlags {
    #[default]
    None,
    Fp(FpControl),
    Texture(TextureInstInfo),
}

impl InstFlags {
    pub fn fp(&self) -> FpControl {
        match self {
            InstFlags::Fp(control) => *control,
            _ => FpControl::default(),
        }
    }

    pub fn texture(&self) -> Result<TextureInstInfo> {
        match self {
            InstFlags::Texture(info) => Ok(*info),
            _ => Err(Error::logic("instruction carries no texture info")),
        }
    }
}
