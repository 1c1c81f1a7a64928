use core::fmt;

use crate::error::{Error, Result};

/// A shader pipeline attribute addressed by the attribute load/store ops.
///
/// Hardware addresses attributes by byte offset into the attribute memory;
/// the well-known slots below cover the offsets the translator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    PrimitiveId,
    PositionX,
    PositionY,
    PositionZ,
    PositionW,
    /// One component of a user-defined varying: `index` in `0..32`,
    /// `component` in `0..4`.
    Generic { index: u8, component: u8 },
    FrontFace,
    InstanceId,
    VertexId,
}

const PRIMITIVE_ID_OFFSET: u32 = 0x060;
const POSITION_OFFSET: u32 = 0x070;
const GENERIC_BASE_OFFSET: u32 = 0x080;
const GENERIC_END_OFFSET: u32 = 0x280;
const FRONT_FACE_OFFSET: u32 = 0x3fc;
const INSTANCE_ID_OFFSET: u32 = 0x2f8;
const VERTEX_ID_OFFSET: u32 = 0x2fc;

impl Attribute {
    /// Decodes an attribute byte offset as encoded in attribute load/store
    /// and interpolation instructions.
    pub fn from_offset(offset: u32) -> Result<Attribute> {
        if offset % 4 != 0 {
            return Err(Error::invalid_argument(format!(
                "misaligned attribute offset {offset:#x}"
            )));
        }
        match offset {
            PRIMITIVE_ID_OFFSET => Ok(Attribute::PrimitiveId),
            POSITION_OFFSET => Ok(Attribute::PositionX),
            o if o == POSITION_OFFSET + 4 => Ok(Attribute::PositionY),
            o if o == POSITION_OFFSET + 8 => Ok(Attribute::PositionZ),
            o if o == POSITION_OFFSET + 12 => Ok(Attribute::PositionW),
            o if (GENERIC_BASE_OFFSET..GENERIC_END_OFFSET).contains(&o) => {
                let slot = (o - GENERIC_BASE_OFFSET) / 4;
                Ok(Attribute::Generic {
                    index: (slot / 4) as u8,
                    component: (slot % 4) as u8,
                })
            }
            FRONT_FACE_OFFSET => Ok(Attribute::FrontFace),
            INSTANCE_ID_OFFSET => Ok(Attribute::InstanceId),
            VERTEX_ID_OFFSET => Ok(Attribute::VertexId),
            other => Err(Error::invalid_argument(format!(
                "unknown attribute offset {other:#x}"
            ))),
        }
    }

    pub fn is_generic(self) -> bool {
        matches!(self, Attribute::Generic { .. })
    }

    pub fn generic_index(self) -> Option<u8> {
        match self {
            Attribute::Generic { index, .. } => Some(index),
            _ => None,
        }
    }

    pub fn is_position(self) -> bool {
        matches!(
            self,
            Attribute::PositionX
                | Attribute::PositionY
                | Attribute::PositionZ
                | Attribute::PositionW
        )
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::PrimitiveId => write!(f, "primitive_id"),
            Attribute::PositionX => write!(f, "position.x"),
            Attribute::PositionY => write!(f, "position.y"),
            Attribute::PositionZ => write!(f, "position.z"),
            Attribute::PositionW => write!(f, "position.w"),
            Attribute::Generic { index, component } => {
                write!(f, "generic{}.{}", index, ["x", "y", "z", "w"][*component as usize & 3])
            }
            Attribute::FrontFace => write!(f, "front_face"),
            Attribute::InstanceId => write!(f, "instance_id"),
            Attribute::VertexId => write!(f, "vertex_id"),
        }
    }
}
