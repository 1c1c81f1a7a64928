//! Scalar ALU, composite, conversion and memory emission for the
//! assembly-style target.
//!
//! Scalar values live in the `.x` lane of their register. Comparison results
//! are integer masks: `-1` for true, `0` for false.

use crate::backend::glasm::emit_context::EmitContext;
use crate::backend::glasm::reg_alloc::Register;
use crate::error::{Error, Result};
use crate::ir::{Attribute, InstId, Opcode, PseudoOp, Stage, Value};
use crate::profile::GenericInputType;

const LANES: [char; 4] = ['x', 'y', 'z', 'w'];

/// Emits the Z/S (and for integer adds C/O) pseudo-operations associated
/// with `inst`, then retires them so they are not emitted again.
pub fn store_cc_pseudos(
    ctx: &EmitContext<'_>,
    inst: InstId,
    ret: Register,
    is_float: bool,
) -> Result<()> {
    let cmp = if is_float { "F" } else { "S" };
    if let Some(zero) = ctx.func.assoc_pseudo_op(inst, PseudoOp::Zero) {
        if ctx.func.inst(zero).has_uses() {
            let reg = ctx.define(zero)?;
            ctx.add(&format!("SEQ.{cmp} {reg}.x,{ret}.x,0;"));
        }
        ctx.retire_pseudo(zero)?;
    }
    if let Some(sign) = ctx.func.assoc_pseudo_op(inst, PseudoOp::Sign) {
        if ctx.func.inst(sign).has_uses() {
            let reg = ctx.define(sign)?;
            ctx.add(&format!("SLT.{cmp} {reg}.x,{ret}.x,0;"));
        }
        ctx.retire_pseudo(sign)?;
    }
    if let Some(carry) = ctx.func.assoc_pseudo_op(inst, PseudoOp::Carry) {
        if ctx.func.inst(carry).has_uses() {
            let reg = ctx.define(carry)?;
            ctx.add(&format!("MOV.S {reg}.x,0;"));
            ctx.add(&format!("MOV.S {reg}.x(CF.x),-1;"));
        }
        ctx.retire_pseudo(carry)?;
    }
    if let Some(overflow) = ctx.func.assoc_pseudo_op(inst, PseudoOp::Overflow) {
        if ctx.func.inst(overflow).has_uses() {
            let reg = ctx.define(overflow)?;
            ctx.add(&format!("MOV.S {reg}.x,0;"));
            ctx.add(&format!("MOV.S {reg}.x(OF.x),-1;"));
        }
        ctx.retire_pseudo(overflow)?;
    }
    Ok(())
}

fn needs_cc(ctx: &EmitContext<'_>, inst: InstId) -> bool {
    [PseudoOp::Carry, PseudoOp::Overflow]
        .iter()
        .any(|&kind| ctx.func.assoc_pseudo_op(inst, kind).is_some())
}

pub fn fp_binary(ctx: &EmitContext<'_>, inst: InstId, mnemonic: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume_f32(ir_inst.arg(0))?;
    let b = ctx.consume_f32(ir_inst.arg(1))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("{mnemonic} {ret}.x,{a},{b};"));
    store_cc_pseudos(ctx, inst, ret, true)
}

pub fn fp_fma(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume_f32(ir_inst.arg(0))?;
    let b = ctx.consume_f32(ir_inst.arg(1))?;
    let c = ctx.consume_f32(ir_inst.arg(2))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MAD.F {ret}.x,{a},{b},{c};"));
    store_cc_pseudos(ctx, inst, ret, true)
}

pub fn fp_unary(ctx: &EmitContext<'_>, inst: InstId, mnemonic: &str) -> Result<()> {
    let value = ctx.consume_f32(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("{mnemonic} {ret}.x,{value};"));
    Ok(())
}

pub fn fp_neg(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let value = ctx.consume_f32(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.F {ret}.x,-{value};"));
    Ok(())
}

pub fn fp_abs(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let value = ctx.consume_f32(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.F {ret}.x,|{value}|;"));
    Ok(())
}

pub fn fp_compare(ctx: &EmitContext<'_>, inst: InstId, mnemonic: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume_f32(ir_inst.arg(0))?;
    let b = ctx.consume_f32(ir_inst.arg(1))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("{mnemonic} {ret}.x,{a},{b};"));
    Ok(())
}

pub fn int_add(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume_s32(ir_inst.arg(0))?;
    let b = ctx.consume_s32(ir_inst.arg(1))?;
    let ret = ctx.define(inst)?;
    if needs_cc(ctx, inst) {
        ctx.add(&format!("ADD.S.CC {ret}.x,{a},{b};"));
    } else {
        ctx.add(&format!("ADD.S {ret}.x,{a},{b};"));
    }
    store_cc_pseudos(ctx, inst, ret, false)
}

pub fn int_binary(ctx: &EmitContext<'_>, inst: InstId, mnemonic: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume_s32(ir_inst.arg(0))?;
    let b = ctx.consume_s32(ir_inst.arg(1))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("{mnemonic} {ret}.x,{a},{b};"));
    store_cc_pseudos(ctx, inst, ret, false)
}

pub fn int_unary(ctx: &EmitContext<'_>, inst: InstId, mnemonic: &str) -> Result<()> {
    let value = ctx.consume_s32(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("{mnemonic} {ret}.x,{value};"));
    Ok(())
}

pub fn int_neg(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let value = ctx.consume_s32(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.S {ret}.x,-{value};"));
    Ok(())
}

pub fn logical_not(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let value = ctx.consume_s32(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("SEQ.S {ret}.x,{value},0;"));
    Ok(())
}

pub fn bit_field_insert(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let base = ctx.consume_u32(ir_inst.arg(0))?;
    let insert = ctx.consume_u32(ir_inst.arg(1))?;
    let offset = ctx.consume_u32(ir_inst.arg(2))?;
    let count = ctx.consume_u32(ir_inst.arg(3))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("BFI.U {ret}.x,{offset},{count},{insert},{base};"));
    Ok(())
}

pub fn bit_field_extract(ctx: &EmitContext<'_>, inst: InstId, signed: bool) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let base = ctx.consume_u32(ir_inst.arg(0))?;
    let offset = ctx.consume_u32(ir_inst.arg(1))?;
    let count = ctx.consume_u32(ir_inst.arg(2))?;
    let ret = ctx.define(inst)?;
    let suffix = if signed { "S" } else { "U" };
    ctx.add(&format!("BFE.{suffix} {ret}.x,{offset},{count},{base};"));
    Ok(())
}

pub fn select(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let cond = ctx.consume_s32(ir_inst.arg(0))?;
    let true_value = ctx.consume_u32(ir_inst.arg(1))?;
    let false_value = ctx.consume_u32(ir_inst.arg(2))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.S.CC RC.x,{cond};"));
    ctx.add(&format!("MOV.U {ret}.x,{false_value};"));
    ctx.add(&format!("MOV.U {ret}.x(NE.x),{true_value};"));
    Ok(())
}

/// Bit casts move bits unchanged between register views.
pub fn bitcast(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let value = ctx.consume_u32(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.U {ret}.x,{value};"));
    Ok(())
}

pub fn pack(ctx: &EmitContext<'_>, inst: InstId, mnemonic: &str) -> Result<()> {
    let vector = ctx.consume_register(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("{mnemonic} {ret}.x,{vector};"));
    Ok(())
}

pub fn unpack(ctx: &EmitContext<'_>, inst: InstId, mnemonic: &str) -> Result<()> {
    let value = ctx.consume(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("{mnemonic} {ret}.xy,{};", value.lane('x')));
    Ok(())
}

pub fn convert(ctx: &EmitContext<'_>, inst: InstId, dst: &str, src: &str) -> Result<()> {
    let value = ctx.consume(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("CVT.{dst}.{src} {ret}.x,{};", value.lane('x')));
    Ok(())
}

pub fn composite_construct(ctx: &EmitContext<'_>, inst: InstId, is_float: bool) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let args: Vec<Value> = ir_inst.args().to_vec();
    let mut operands = Vec::with_capacity(args.len());
    for arg in args {
        operands.push(ctx.consume(arg)?);
    }
    let ret = ctx.define(inst)?;
    let suffix = if is_float { "F" } else { "U" };
    for (lane, operand) in LANES.iter().zip(operands.iter()) {
        ctx.add(&format!("MOV.{suffix} {ret}.{lane},{};", operand.lane('x')));
    }
    Ok(())
}

pub fn composite_extract(ctx: &EmitContext<'_>, inst: InstId, is_float: bool) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let vector = ctx.consume_register(ir_inst.arg(0))?;
    let element = match ctx.func.resolve(ir_inst.arg(1)) {
        Value::U32(element) => element as usize,
        other => {
            return Err(Error::invalid_argument(format!(
                "composite element index must be immediate, got {other}"
            )))
        }
    };
    let lane = *LANES
        .get(element)
        .ok_or_else(|| Error::invalid_argument(format!("element {element} out of range")))?;
    let ret = ctx.define(inst)?;
    let suffix = if is_float { "F" } else { "U" };
    ctx.add(&format!("MOV.{suffix} {ret}.x,{vector}.{lane};"));
    Ok(())
}

pub fn undef(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.S {ret}.x,0;"));
    Ok(())
}

pub fn get_cbuf(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let binding = match ctx.func.resolve(ir_inst.arg(0)) {
        Value::U32(binding) => binding,
        _ => {
            return Err(Error::not_implemented(
                "indirect constant buffer binding",
            ))
        }
    };
    let offset = ctx.consume_u32(ir_inst.arg(1))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("LDC.U32 {ret}.x,cbuf{binding}[{offset}];"));
    Ok(())
}

fn attribute_source(ctx: &EmitContext<'_>, attribute: Attribute) -> Result<(String, &'static str)> {
    let input = match ctx.stage {
        Stage::Vertex => "vertex",
        Stage::Fragment => "fragment",
        Stage::Compute => {
            return Err(Error::invalid_argument(
                "compute shaders have no input attributes",
            ))
        }
    };
    Ok(match attribute {
        Attribute::PrimitiveId => ("primitive.id".to_owned(), "S"),
        Attribute::PositionX
        | Attribute::PositionY
        | Attribute::PositionZ
        | Attribute::PositionW => {
            if ctx.stage != Stage::Fragment {
                return Err(Error::not_implemented("position reads outside fragment"));
            }
            let lane = match attribute {
                Attribute::PositionX => "x",
                Attribute::PositionY => "y",
                Attribute::PositionZ => "z",
                _ => "w",
            };
            (format!("fragment.position.{lane}"), "F")
        }
        Attribute::Generic { index, component } => {
            let suffix = match ctx.profile.generic_input_types[usize::from(index) & 31] {
                GenericInputType::Float => "F",
                GenericInputType::SignedInt => "S",
                GenericInputType::UnsignedInt => "U",
            };
            let lane = LANES[usize::from(component) & 3];
            (format!("{input}.attrib[{index}].{lane}"), suffix)
        }
        Attribute::FrontFace => ("fragment.facing.x".to_owned(), "S"),
        Attribute::InstanceId => {
            if !ctx.profile.support_vertex_instance_id {
                return Err(Error::not_implemented("instance id attribute"));
            }
            ("vertex.instance".to_owned(), "S")
        }
        Attribute::VertexId => {
            if !ctx.profile.support_vertex_instance_id {
                return Err(Error::not_implemented("vertex id attribute"));
            }
            ("vertex.id".to_owned(), "S")
        }
    })
}

pub fn get_attribute(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let attribute = ctx.func.inst(inst).arg(0).attribute()?;
    let (source, suffix) = attribute_source(ctx, attribute)?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.{suffix} {ret}.x,{source};"));
    Ok(())
}

pub fn set_attribute(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let attribute = ir_inst.arg(0).attribute()?;
    let value = ctx.consume_f32(ir_inst.arg(1))?;
    let target = match attribute {
        Attribute::PositionX => "result.position.x".to_owned(),
        Attribute::PositionY => "result.position.y".to_owned(),
        Attribute::PositionZ => "result.position.z".to_owned(),
        Attribute::PositionW => "result.position.w".to_owned(),
        Attribute::Generic { index, component } => {
            format!("result.attrib[{index}].{}", LANES[usize::from(component) & 3])
        }
        other => {
            return Err(Error::not_implemented(format!(
                "attribute store to {other}"
            )))
        }
    };
    ctx.add(&format!("MOV.F {target},{value};"));
    Ok(())
}

pub fn load_global(ctx: &EmitContext<'_>, inst: InstId, width: &str) -> Result<()> {
    let address = ctx.consume(ctx.func.inst(inst).arg(0))?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("LOAD.{width} {ret},{};", address.lane('x')));
    Ok(())
}

pub fn write_global(ctx: &EmitContext<'_>, inst: InstId, width: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let address = ctx.consume(ir_inst.arg(0))?;
    let value = ctx.consume(ir_inst.arg(1))?;
    ctx.add(&format!("STORE.{width} {},{};", value.lane('x'), address.lane('x')));
    Ok(())
}

pub fn invocation_info(ctx: &EmitContext<'_>, inst: InstId, source: &str) -> Result<()> {
    if ctx.stage != Stage::Compute {
        return Err(Error::invalid_argument(format!(
            "{source} read outside compute"
        )));
    }
    let ret = ctx.define(inst)?;
    ctx.add(&format!("MOV.U {ret},{source};"));
    Ok(())
}

pub fn pseudo_op_unreachable(opcode: Opcode) -> Result<()> {
    Err(Error::logic(format!(
        "{opcode} was not consumed by its producing instruction"
    )))
}

pub fn bindless_unreachable(opcode: Opcode) -> Result<()> {
    Err(Error::logic(format!("{opcode} after descriptor rewriting")))
}
