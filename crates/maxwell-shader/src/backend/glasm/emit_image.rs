//! Texture sampling lowering for the assembly-style target.
//!
//! The opcode mnemonic and operand packing branch on the full texture key:
//! shape, depth compare, bias, LOD clamp, offset arity and sparse residency.
//! Scratch registers for gather offsets are allocated before any operand is
//! consumed so they cannot alias a register freed by that consumption.

use crate::backend::glasm::emit_context::EmitContext;
use crate::backend::glasm::reg_alloc::{RegOrImm, Register, ScopedRegister};
use crate::error::{Error, Result};
use crate::ir::{InstId, PseudoOp, TextureInstInfo, TextureType, Value};

fn texture(ctx: &EmitContext<'_>, info: TextureInstInfo, index: &Value) -> Result<String> {
    // FIXME: indexed reads resolve through the flags payload only; a dynamic
    // index register is ignored here.
    let _ = index;
    Ok(format!("texture[{}]", ctx.texture_binding(info)?))
}

fn texture_type(info: TextureInstInfo) -> &'static str {
    if info.is_depth {
        match info.texture_type {
            TextureType::Color1D => "SHADOW1D",
            TextureType::ColorArray1D => "SHADOWARRAY1D",
            TextureType::Color2D => "SHADOW2D",
            TextureType::ColorArray2D => "SHADOWARRAY2D",
            TextureType::Color3D => "SHADOW3D",
            TextureType::ColorCube => "SHADOWCUBE",
            TextureType::ColorArrayCube => "SHADOWARRAYCUBE",
            TextureType::Buffer => "SHADOWBUFFER",
        }
    } else {
        match info.texture_type {
            TextureType::Color1D => "1D",
            TextureType::ColorArray1D => "ARRAY1D",
            TextureType::Color2D => "2D",
            TextureType::ColorArray2D => "ARRAY2D",
            TextureType::Color3D => "3D",
            TextureType::ColorCube => "CUBE",
            TextureType::ColorArrayCube => "ARRAYCUBE",
            TextureType::Buffer => "BUFFER",
        }
    }
}

fn offset_operand(ctx: &EmitContext<'_>, offset: &Value) -> Result<String> {
    if offset.is_empty() {
        return Ok(String::new());
    }
    Ok(format!(",offset({})", ctx.consume(*offset)?))
}

/// Gather scratch registers, acquired before any operand consumption.
fn alloc_offsets_regs<'c>(
    ctx: &'c EmitContext<'_>,
    offset2: &Value,
) -> Result<(Option<ScopedRegister<'c>>, Option<ScopedRegister<'c>>)> {
    if offset2.is_empty() {
        Ok((None, None))
    } else {
        Ok((
            Some(ctx.reg_alloc.alloc_scoped()?),
            Some(ctx.reg_alloc.alloc_scoped()?),
        ))
    }
}

fn swizzle_offsets(
    ctx: &EmitContext<'_>,
    off_x: Register,
    off_y: Register,
    offset1: &Value,
    offset2: &Value,
) -> Result<()> {
    let offsets_a = ctx.consume_register(*offset1)?;
    let offsets_b = ctx.consume_register(*offset2)?;
    // Input swizzle:  [XYXY] [XYXY]
    // Output swizzle: [XXXX] [YYYY]
    ctx.add(&format!("MOV {off_x}.x,{offsets_a}.x;"));
    ctx.add(&format!("MOV {off_x}.y,{offsets_a}.z;"));
    ctx.add(&format!("MOV {off_x}.z,{offsets_b}.x;"));
    ctx.add(&format!("MOV {off_x}.w,{offsets_b}.z;"));
    ctx.add(&format!("MOV {off_y}.x,{offsets_a}.y;"));
    ctx.add(&format!("MOV {off_y}.y,{offsets_a}.w;"));
    ctx.add(&format!("MOV {off_y}.z,{offsets_b}.y;"));
    ctx.add(&format!("MOV {off_y}.w,{offsets_b}.w;"));
    Ok(())
}

/// Coordinate operand as text. Immediate-assembled coordinates move into a
/// scratch register so extra lanes can be written; live coordinates are
/// copied to `RC` so lane writes do not clobber other readers.
fn coord<'c>(
    ctx: &'c EmitContext<'_>,
    coord: &Value,
) -> Result<(String, Option<ScopedRegister<'c>>)> {
    let resolved = ctx.func.resolve(*coord);
    if resolved.is_immediate() || resolved.is_empty() {
        let scoped = ctx.reg_alloc.alloc_scoped()?;
        let reg = scoped.reg;
        if let Ok(imm) = ctx.consume(resolved) {
            ctx.add(&format!("MOV.F {reg}.x,{imm};"));
        }
        return Ok((reg.to_string(), Some(scoped)));
    }
    let inst = resolved
        .inst()
        .ok_or_else(|| Error::logic("coordinate is neither immediate nor instruction"))?;
    let coord_reg = ctx.consume_register(resolved)?;
    if ctx.func.inst(inst).has_uses() {
        // The coordinate is still read later; write lanes into RC instead of
        // the live register.
        ctx.add(&format!("MOV.F RC,{coord_reg};"));
        return Ok(("RC".to_owned(), None));
    }
    Ok((coord_reg.to_string(), None))
}

fn sparse_inst(ctx: &EmitContext<'_>, inst: InstId) -> Option<InstId> {
    ctx.func.assoc_pseudo_op(inst, PseudoOp::Sparse)
}

fn sparse_mod(sparse: Option<InstId>) -> &'static str {
    if sparse.is_some() {
        ".SPARSE"
    } else {
        ""
    }
}

/// Initializes the residency register after a sparse sample and retires the
/// pseudo-op so it is not emitted twice.
fn store_sparse(ctx: &EmitContext<'_>, sparse: Option<InstId>) -> Result<()> {
    let Some(sparse) = sparse else {
        return Ok(());
    };
    if ctx.func.inst(sparse).has_uses() {
        let ret = ctx.define(sparse)?;
        ctx.add(&format!("MOV.S {ret}.x,-1;"));
        ctx.add(&format!("MOV.S {ret}.x(NONRESIDENT),0;"));
    }
    ctx.retire_pseudo(sparse)?;
    Ok(())
}

fn consume_opt(ctx: &EmitContext<'_>, value: &Value) -> Result<Option<RegOrImm>> {
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(ctx.consume(*value)?))
    }
}

fn require(operand: Option<RegOrImm>, what: &str) -> Result<RegOrImm> {
    operand.ok_or_else(|| Error::logic(format!("texture instruction is missing its {what}")))
}

pub fn emit_image_sample_implicit_lod(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, coord_val, bias_lc_val, offset) = (
        ir_inst.arg(0),
        ir_inst.arg(1),
        ir_inst.arg(2),
        ir_inst.arg(3),
    );
    let sparse = sparse_inst(ctx, inst);
    let sparse_mod = sparse_mod(sparse);
    let lod_clamp_mod = if info.has_lod_clamp { ".LODCLAMP" } else { "" };
    let ty = texture_type(info);
    let texture = texture(ctx, info, &index)?;
    let bias_lc = consume_opt(ctx, &bias_lc_val)?;
    let offset_vec = offset_operand(ctx, &offset)?;
    let (coord_vec, _coord_alloc) = coord(ctx, &coord_val)?;
    let ret = ctx.define(inst)?;
    if info.has_bias {
        let bias_lc = require(bias_lc, "bias operand")?;
        if info.texture_type == TextureType::ColorArrayCube {
            ctx.add(&format!(
                "TXB.F{lod_clamp_mod}{sparse_mod} {ret},{coord_vec},{bias_lc},{texture},ARRAYCUBE{offset_vec};"
            ));
        } else if info.has_lod_clamp {
            ctx.add(&format!("MOV.F {coord_vec}.w,{};", bias_lc.lane('x')));
            ctx.add(&format!(
                "TXB.F.LODCLAMP{sparse_mod} {ret},{coord_vec},{},{texture},{ty}{offset_vec};",
                bias_lc.lane('y')
            ));
        } else {
            ctx.add(&format!("MOV.F {coord_vec}.w,{};", bias_lc.lane('x')));
            ctx.add(&format!(
                "TXB.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
            ));
        }
    } else if info.has_lod_clamp && info.texture_type == TextureType::ColorArrayCube {
        let bias_lc = require(bias_lc, "LOD clamp operand")?;
        ctx.add(&format!(
            "TEX.F.LODCLAMP{sparse_mod} {ret},{coord_vec},{bias_lc},{texture}{offset_vec};"
        ));
    } else {
        ctx.add(&format!(
            "TEX.F{lod_clamp_mod}{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
        ));
    }
    store_sparse(ctx, sparse)
}

pub fn emit_image_sample_explicit_lod(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, coord_val, lod_val, offset) = (
        ir_inst.arg(0),
        ir_inst.arg(1),
        ir_inst.arg(2),
        ir_inst.arg(3),
    );
    let sparse = sparse_inst(ctx, inst);
    let sparse_mod = sparse_mod(sparse);
    let ty = texture_type(info);
    let texture = texture(ctx, info, &index)?;
    let lod = ctx.consume_f32(lod_val)?;
    let offset_vec = offset_operand(ctx, &offset)?;
    let (coord_vec, _coord_alloc) = coord(ctx, &coord_val)?;
    let ret = ctx.define(inst)?;
    if info.texture_type == TextureType::ColorArrayCube {
        ctx.add(&format!(
            "TXL.F{sparse_mod} {ret},{coord_vec},{lod},{texture},ARRAYCUBE{offset_vec};"
        ));
    } else {
        ctx.add(&format!("MOV.F {coord_vec}.w,{lod};"));
        ctx.add(&format!(
            "TXL.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
        ));
    }
    store_sparse(ctx, sparse)
}

pub fn emit_image_sample_dref_implicit_lod(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, coord_val, dref_val, bias_lc_val, offset) = (
        ir_inst.arg(0),
        ir_inst.arg(1),
        ir_inst.arg(2),
        ir_inst.arg(3),
        ir_inst.arg(4),
    );
    let sparse = sparse_inst(ctx, inst);
    let sparse_mod = sparse_mod(sparse);
    let ty = texture_type(info);
    let texture = texture(ctx, info, &index)?;
    let dref = ctx.consume_f32(dref_val)?;
    let bias_lc = consume_opt(ctx, &bias_lc_val)?;
    let offset_vec = offset_operand(ctx, &offset)?;
    let (coord_vec, _coord_alloc) = coord(ctx, &coord_val)?;
    let ret = ctx.define(inst)?;
    if info.has_bias {
        let bias_lc = require(bias_lc, "bias operand")?;
        if info.has_lod_clamp {
            match info.texture_type {
                TextureType::Color1D | TextureType::ColorArray1D | TextureType::Color2D => {
                    ctx.add(&format!("MOV.F {coord_vec}.z,{dref};"));
                    ctx.add(&format!("MOV.F {coord_vec}.w,{};", bias_lc.lane('x')));
                    ctx.add(&format!(
                        "TXB.F.LODCLAMP{sparse_mod} {ret},{coord_vec},{},{texture},{ty}{offset_vec};",
                        bias_lc.lane('y')
                    ));
                }
                TextureType::ColorArray2D | TextureType::ColorCube => {
                    ctx.add(&format!("MOV.F {coord_vec}.w,{dref};"));
                    ctx.add(&format!(
                        "TXB.F.LODCLAMP{sparse_mod} {ret},{coord_vec},{},{texture},{ty}{offset_vec};",
                        bias_lc
                    ));
                }
                other => {
                    return Err(Error::not_implemented(format!(
                        "depth sample of {other:?} with bias and LOD clamp"
                    )))
                }
            }
        } else {
            match info.texture_type {
                TextureType::Color1D | TextureType::ColorArray1D | TextureType::Color2D => {
                    ctx.add(&format!("MOV.F {coord_vec}.z,{dref};"));
                    ctx.add(&format!("MOV.F {coord_vec}.w,{};", bias_lc.lane('x')));
                    ctx.add(&format!(
                        "TXB.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
                    ));
                }
                TextureType::ColorArray2D | TextureType::ColorCube => {
                    ctx.add(&format!("MOV.F {coord_vec}.w,{dref};"));
                    ctx.add(&format!(
                        "TXB.F{sparse_mod} {ret},{coord_vec},{bias_lc},{texture},{ty}{offset_vec};"
                    ));
                }
                TextureType::ColorArrayCube => {
                    let pair = ctx.reg_alloc.alloc_scoped()?;
                    let pair_reg = pair.reg;
                    ctx.add(&format!("MOV.F {pair_reg}.x,{dref};"));
                    ctx.add(&format!("MOV.F {pair_reg}.y,{};", bias_lc.lane('x')));
                    ctx.add(&format!(
                        "TXB.F{sparse_mod} {ret},{coord_vec},{pair_reg},{texture},{ty}{offset_vec};"
                    ));
                }
                other => {
                    return Err(Error::not_implemented(format!(
                        "depth sample of {other:?} with bias"
                    )))
                }
            }
        }
    } else if info.has_lod_clamp {
        let bias_lc = require(bias_lc, "LOD clamp operand")?;
        if info.texture_type != TextureType::ColorArrayCube {
            let w_swizzle = matches!(
                info.texture_type,
                TextureType::ColorArray2D | TextureType::ColorCube
            );
            let dref_swizzle = if w_swizzle { 'w' } else { 'z' };
            ctx.add(&format!("MOV.F {coord_vec}.{dref_swizzle},{dref};"));
            ctx.add(&format!(
                "TEX.F.LODCLAMP{sparse_mod} {ret},{coord_vec},{bias_lc},{texture},{ty}{offset_vec};"
            ));
        } else {
            let pair = ctx.reg_alloc.alloc_scoped()?;
            let pair_reg = pair.reg;
            ctx.add(&format!("MOV.F {pair_reg}.x,{dref};"));
            ctx.add(&format!("MOV.F {pair_reg}.y,{bias_lc};"));
            ctx.add(&format!(
                "TEX.F.LODCLAMP{sparse_mod} {ret},{coord_vec},{pair_reg},{texture},{ty}{offset_vec};"
            ));
        }
    } else if info.texture_type != TextureType::ColorArrayCube {
        let w_swizzle = matches!(
            info.texture_type,
            TextureType::ColorArray2D | TextureType::ColorCube
        );
        let dref_swizzle = if w_swizzle { 'w' } else { 'z' };
        ctx.add(&format!("MOV.F {coord_vec}.{dref_swizzle},{dref};"));
        ctx.add(&format!(
            "TEX.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
        ));
    } else {
        ctx.add(&format!(
            "TEX.F{sparse_mod} {ret},{coord_vec},{dref},{texture},{ty}{offset_vec};"
        ));
    }
    store_sparse(ctx, sparse)
}

pub fn emit_image_sample_dref_explicit_lod(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, coord_val, dref_val, lod_val, offset) = (
        ir_inst.arg(0),
        ir_inst.arg(1),
        ir_inst.arg(2),
        ir_inst.arg(3),
        ir_inst.arg(4),
    );
    let sparse = sparse_inst(ctx, inst);
    let sparse_mod = sparse_mod(sparse);
    let ty = texture_type(info);
    let texture = texture(ctx, info, &index)?;
    let dref = ctx.consume_f32(dref_val)?;
    let lod = ctx.consume_f32(lod_val)?;
    let offset_vec = offset_operand(ctx, &offset)?;
    let (coord_vec, _coord_alloc) = coord(ctx, &coord_val)?;
    let ret = ctx.define(inst)?;
    match info.texture_type {
        TextureType::Color1D | TextureType::ColorArray1D | TextureType::Color2D => {
            ctx.add(&format!("MOV.F {coord_vec}.z,{dref};"));
            ctx.add(&format!("MOV.F {coord_vec}.w,{lod};"));
            ctx.add(&format!(
                "TXL.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
            ));
        }
        TextureType::ColorArray2D | TextureType::ColorCube => {
            ctx.add(&format!("MOV.F {coord_vec}.w,{dref};"));
            ctx.add(&format!(
                "TXL.F{sparse_mod} {ret},{coord_vec},{lod},{texture},{ty}{offset_vec};"
            ));
        }
        TextureType::ColorArrayCube => {
            let pair = ctx.reg_alloc.alloc_scoped()?;
            let pair_reg = pair.reg;
            ctx.add(&format!("MOV.F {pair_reg}.x,{dref};"));
            ctx.add(&format!("MOV.F {pair_reg}.y,{lod};"));
            ctx.add(&format!(
                "TXL.F{sparse_mod} {ret},{coord_vec},{pair_reg},{texture},{ty}{offset_vec};"
            ));
        }
        other => {
            return Err(Error::not_implemented(format!(
                "depth sample of {other:?} with explicit LOD"
            )))
        }
    }
    store_sparse(ctx, sparse)
}

pub fn emit_image_gather(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, coord_val, offset, offset2) = (
        ir_inst.arg(0),
        ir_inst.arg(1),
        ir_inst.arg(2),
        ir_inst.arg(3),
    );
    // Allocate offset scratch early so it cannot overwrite a register freed
    // by operand consumption below.
    let (off_x, off_y) = alloc_offsets_regs(ctx, &offset2)?;
    let comp = ['x', 'y', 'z', 'w'][usize::from(info.gather_component) & 3];
    let sparse = sparse_inst(ctx, inst);
    let sparse_mod = sparse_mod(sparse);
    let ty = texture_type(info);
    let texture = texture(ctx, info, &index)?;
    let coord_vec = ctx.consume_register(coord_val)?;
    let ret = ctx.define(inst)?;
    if offset2.is_empty() {
        let offset_vec = offset_operand(ctx, &offset)?;
        ctx.add(&format!(
            "TXG.F{sparse_mod} {ret},{coord_vec},{texture}.{comp},{ty}{offset_vec};"
        ));
    } else {
        let (off_x, off_y) = match (&off_x, &off_y) {
            (Some(x), Some(y)) => (x.reg, y.reg),
            _ => return Err(Error::logic("gather offsets were not preallocated")),
        };
        swizzle_offsets(ctx, off_x, off_y, &offset, &offset2)?;
        ctx.add(&format!(
            "TXGO.F{sparse_mod} {ret},{coord_vec},{off_x},{off_y},{texture}.{comp},{ty};"
        ));
    }
    store_sparse(ctx, sparse)
}

pub fn emit_image_gather_dref(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    // FIXME: depth-compare gathers do not produce the expected texels on real
    // content; the packing below matches observed behavior, not intent.
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, coord_val, offset, offset2, dref_val) = (
        ir_inst.arg(0),
        ir_inst.arg(1),
        ir_inst.arg(2),
        ir_inst.arg(3),
        ir_inst.arg(4),
    );
    let (off_x, off_y) = alloc_offsets_regs(ctx, &offset2)?;
    let sparse = sparse_inst(ctx, inst);
    let sparse_mod = sparse_mod(sparse);
    let ty = texture_type(info);
    let texture = texture(ctx, info, &index)?;
    let coord_vec = ctx.consume_register(coord_val)?;
    let dref = ctx.consume_f32(dref_val)?;
    let ret = ctx.define(inst)?;
    let args = match info.texture_type {
        TextureType::Color2D => {
            ctx.add(&format!("MOV.F {coord_vec}.z,{dref};"));
            coord_vec.to_string()
        }
        TextureType::ColorArray2D | TextureType::ColorCube => {
            ctx.add(&format!("MOV.F {coord_vec}.w,{dref};"));
            coord_vec.to_string()
        }
        TextureType::ColorArrayCube => format!("{coord_vec},{dref}"),
        other => {
            return Err(Error::not_implemented(format!(
                "depth gather from {other:?}"
            )))
        }
    };
    if offset2.is_empty() {
        let offset_vec = offset_operand(ctx, &offset)?;
        ctx.add(&format!(
            "TXG.F{sparse_mod} {ret},{args},{texture},{ty}{offset_vec};"
        ));
    } else {
        let (off_x, off_y) = match (&off_x, &off_y) {
            (Some(x), Some(y)) => (x.reg, y.reg),
            _ => return Err(Error::logic("gather offsets were not preallocated")),
        };
        swizzle_offsets(ctx, off_x, off_y, &offset, &offset2)?;
        ctx.add(&format!(
            "TXGO.F{sparse_mod} {ret},{args},{off_x},{off_y},{texture},{ty};"
        ));
    }
    store_sparse(ctx, sparse)
}

pub fn emit_image_fetch(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, coord_val, offset, lod_val, ms_val) = (
        ir_inst.arg(0),
        ir_inst.arg(1),
        ir_inst.arg(2),
        ir_inst.arg(3),
        ir_inst.arg(4),
    );
    let sparse = sparse_inst(ctx, inst);
    let sparse_mod = sparse_mod(sparse);
    let ty = texture_type(info);
    let texture = texture(ctx, info, &index)?;
    let lod = ctx.consume_s32(lod_val)?;
    let ms = consume_opt(ctx, &ms_val)?;
    let offset_vec = offset_operand(ctx, &offset)?;
    let (coord_vec, _coord_alloc) = coord(ctx, &coord_val)?;
    let ret = ctx.define(inst)?;
    if info.texture_type == TextureType::Buffer {
        ctx.add(&format!(
            "TXF.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
        ));
    } else if let Some(ms) = ms {
        ctx.add(&format!("MOV.S {coord_vec}.w,{};", ms.lane('x')));
        ctx.add(&format!(
            "TXFMS.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
        ));
    } else {
        ctx.add(&format!("MOV.S {coord_vec}.w,{lod};"));
        ctx.add(&format!(
            "TXF.F{sparse_mod} {ret},{coord_vec},{texture},{ty}{offset_vec};"
        ));
    }
    store_sparse(ctx, sparse)
}

pub fn emit_image_query_dimensions(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let info = ir_inst.flags().texture()?;
    let (index, lod_val) = (ir_inst.arg(0), ir_inst.arg(1));
    let texture = texture(ctx, info, &index)?;
    let ty = texture_type(info);
    let lod = ctx.consume_f32(lod_val)?;
    let ret = ctx.define(inst)?;
    ctx.add(&format!("TXQ {ret},{lod},{texture},{ty};"));
    Ok(())
}

pub fn emit_image_query_lod(_ctx: &EmitContext<'_>, _inst: InstId) -> Result<()> {
    Err(Error::not_implemented("image LOD query in the assembly backend"))
}

pub fn emit_image_gradient(_ctx: &EmitContext<'_>, _inst: InstId) -> Result<()> {
    Err(Error::not_implemented("image gradient in the assembly backend"))
}
