//! Resource usage summary pass.
//!
//! Walks the post-SSA program once and fills [`Info`] for the embedding
//! driver: constant buffers read, texture descriptors referenced, attributes
//! touched. The backends build their binding tables from the descriptor
//! lists, so the order here (sorted by descriptor index) is part of the
//! output contract.

use crate::error::Result;
use crate::ir::{Attribute, Opcode, Program, PseudoOp, TextureDescriptor, TextureType, Value};

pub fn collect_info_pass(program: &mut Program) -> Result<()> {
    let mut info = core::mem::take(&mut program.info);

    for func in &program.functions {
        for block_id in func.block_ids() {
            for &inst_id in func.block(block_id).insts() {
                let inst = func.inst(inst_id);
                match inst.opcode() {
                    Opcode::GetCbuf => {
                        if let Value::U32(binding) = func.resolve(inst.arg(0)) {
                            if binding < 32 {
                                info.constant_buffer_mask |= 1 << binding;
                            }
                        }
                    }
                    Opcode::GetAttribute => match inst.arg(0).attribute()? {
                        Attribute::Generic { index, .. } => {
                            info.input_generics |= 1 << index;
                        }
                        attr if attr.is_position() => info.loads_position = true,
                        _ => {}
                    },
                    Opcode::SetAttribute => match inst.arg(0).attribute()? {
                        Attribute::Generic { index, .. } => {
                            info.output_generics |= 1 << index;
                        }
                        attr if attr.is_position() => info.stores_position = true,
                        _ => {}
                    },
                    Opcode::LoadGlobalU8
                    | Opcode::LoadGlobalS8
                    | Opcode::LoadGlobalU16
                    | Opcode::LoadGlobalS16
                    | Opcode::LoadGlobal32
                    | Opcode::LoadGlobal64
                    | Opcode::LoadGlobal128
                    | Opcode::WriteGlobalU8
                    | Opcode::WriteGlobalS8
                    | Opcode::WriteGlobalU16
                    | Opcode::WriteGlobalS16
                    | Opcode::WriteGlobal32
                    | Opcode::WriteGlobal64
                    | Opcode::WriteGlobal128 => info.uses_global_memory = true,
                    Opcode::ImageSampleImplicitLod
                    | Opcode::ImageSampleExplicitLod
                    | Opcode::ImageSampleDrefImplicitLod
                    | Opcode::ImageSampleDrefExplicitLod
                    | Opcode::ImageGather
                    | Opcode::ImageGatherDref
                    | Opcode::ImageFetch
                    | Opcode::ImageQueryDimensions
                    | Opcode::ImageQueryLod
                    | Opcode::ImageGradient => {
                        let tex = inst.flags().texture()?;
                        let descriptor = TextureDescriptor {
                            texture_type: tex.texture_type,
                            descriptor_index: tex.descriptor_index,
                        };
                        let list = if tex.texture_type == TextureType::Buffer {
                            &mut info.texture_buffer_descriptors
                        } else {
                            &mut info.texture_descriptors
                        };
                        if !list.contains(&descriptor) {
                            list.push(descriptor);
                        }
                        if func.assoc_pseudo_op(inst_id, PseudoOp::Sparse).is_some() {
                            info.uses_sparse_residency = true;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    info.texture_descriptors
        .sort_by_key(|descriptor| descriptor.descriptor_index);
    info.texture_buffer_descriptors
        .sort_by_key(|descriptor| descriptor.descriptor_index);
    program.info = info;
    Ok(())
}
