//! Emission driver for the assembly-style target.
//!
//! Blocks are walked in layout order and instructions in block order; operand
//! consumption order is part of the register allocator contract. φ results
//! get their registers before any code is emitted, and the moves that
//! populate them run in each predecessor right before its terminator.

use core::fmt::Write as _;

use crate::backend::glasm::emit_alu as alu;
use crate::backend::glasm::emit_context::EmitContext;
use crate::backend::glasm::emit_image as image;
use crate::error::{Error, Result};
use crate::ir::{BlockId, InstId, Opcode, Program, Stage, Type};
use crate::profile::Profile;

fn header(stage: Stage) -> &'static str {
    match stage {
        Stage::Vertex => "!!NVvp5.0\n",
        Stage::Fragment => "!!NVfp5.0\n",
        Stage::Compute => "!!NVcp5.0\n",
    }
}

fn phi_move_suffix(ty: Type) -> &'static str {
    match ty {
        Type::F16 | Type::F32 | Type::F16x2 | Type::F16x3 | Type::F16x4 | Type::F32x2
        | Type::F32x3 | Type::F32x4 => "F",
        Type::F64 | Type::F64x2 | Type::F64x3 | Type::F64x4 => "F64",
        Type::U1 => "S",
        _ => "U",
    }
}

/// Moves this block's outgoing φ operands into the φ registers of every
/// successor. Runs immediately before the terminator.
fn emit_phi_moves(ctx: &EmitContext<'_>, block: BlockId) -> Result<()> {
    let func = ctx.func;
    let mut seen: [Option<BlockId>; 2] = [None; 2];
    for (index, &succ) in func.block(block).successors().iter().enumerate() {
        // Both edges of a conditional branch can name one block; the moves
        // must still run once.
        if seen.contains(&Some(succ)) {
            continue;
        }
        if let Some(slot) = seen.get_mut(index) {
            *slot = Some(succ);
        }
        for &phi_id in func.block(succ).insts() {
            let phi = func.inst(phi_id);
            if !phi.is_phi() {
                break;
            }
            if !phi.has_uses() {
                continue;
            }
            let Some((_, value)) = phi
                .phi_args()
                .iter()
                .find(|(pred, _)| *pred == block)
                .copied()
            else {
                continue;
            };
            let phi_reg = ctx.reg_alloc.register_of(phi_id)?;
            let operand = ctx.consume(value)?;
            let suffix = phi_move_suffix(func.type_of(crate::ir::Value::Inst(phi_id)));
            if func.type_of(crate::ir::Value::Inst(phi_id)).is_vector() {
                ctx.add(&format!("MOV.{suffix} {phi_reg},{operand};"));
            } else {
                ctx.add(&format!("MOV.{suffix} {phi_reg}.x,{};", operand.lane('x')));
            }
        }
    }
    Ok(())
}

fn emit_branch(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let target = ctx.func.inst(inst).arg(0).label()?;
    ctx.add(&format!("BRA B{};", target.index()));
    Ok(())
}

fn emit_branch_conditional(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let condition = ctx.consume_s32(ir_inst.arg(0))?;
    let true_label = ir_inst.arg(1).label()?;
    let false_label = ir_inst.arg(2).label()?;
    ctx.add(&format!("MOV.S.CC RC.x,{condition};"));
    ctx.add(&format!("BRA B{} (NE.x);", true_label.index()));
    ctx.add(&format!("BRA B{};", false_label.index()));
    Ok(())
}

fn fp_cmp(base: &'static str, width: &'static str, unordered: bool) -> String {
    if unordered {
        format!("{base}U.{width}")
    } else {
        format!("{base}.{width}")
    }
}

fn emit_inst(ctx: &EmitContext<'_>, inst_id: InstId) -> Result<()> {
    use Opcode::*;

    let inst = ctx.func.inst(inst_id);
    let opcode = inst.opcode();
    if !opcode.has_side_effects() && !inst.has_uses() && !opcode.is_phi() {
        // Dead code elimination runs before the backend; anything left here
        // became dead through backend-side pseudo-op retirement.
        return Ok(());
    }
    if matches!(opcode, FPAdd16 | FPFma16 | FPMul16) && !ctx.profile.support_float16 {
        return Err(Error::not_implemented("f16 arithmetic on this host"));
    }
    if matches!(opcode, IAdd64 | ISub64) && !ctx.profile.support_int64 {
        return Err(Error::not_implemented("64-bit integers on this host"));
    }

    match opcode {
        Void | Identity => Ok(()),
        // φ registers are preallocated; moves happen in predecessors.
        Phi => Ok(()),
        UndefU1 | UndefU8 | UndefU16 | UndefU32 | UndefU64 => alu::undef(ctx, inst_id),

        Branch => emit_branch(ctx, inst_id),
        BranchConditional => emit_branch_conditional(ctx, inst_id),
        LoopMerge | SelectionMerge => Ok(()),
        Return => {
            ctx.add("RET;");
            Ok(())
        }

        GetCbuf => alu::get_cbuf(ctx, inst_id),
        GetAttribute => alu::get_attribute(ctx, inst_id),
        SetAttribute => alu::set_attribute(ctx, inst_id),
        WorkgroupId => alu::invocation_info(ctx, inst_id, "invocation.groupid"),
        LocalInvocationId => alu::invocation_info(ctx, inst_id, "invocation.localid"),

        GetZeroFromOp | GetSignFromOp | GetCarryFromOp | GetOverflowFromOp | GetSparseFromOp => {
            alu::pseudo_op_unreachable(opcode)
        }

        CompositeConstructU32x2 | CompositeConstructU32x3 | CompositeConstructU32x4 => {
            alu::composite_construct(ctx, inst_id, false)
        }
        CompositeConstructF16x2 | CompositeConstructF16x3 | CompositeConstructF16x4
        | CompositeConstructF32x2 | CompositeConstructF32x3 | CompositeConstructF32x4
        | CompositeConstructF64x2 | CompositeConstructF64x3 | CompositeConstructF64x4 => {
            alu::composite_construct(ctx, inst_id, true)
        }
        CompositeExtractU32x2 | CompositeExtractU32x3 | CompositeExtractU32x4 => {
            alu::composite_extract(ctx, inst_id, false)
        }
        CompositeExtractF16x2 | CompositeExtractF16x3 | CompositeExtractF16x4
        | CompositeExtractF32x2 | CompositeExtractF32x3 | CompositeExtractF32x4
        | CompositeExtractF64x2 | CompositeExtractF64x3 | CompositeExtractF64x4 => {
            alu::composite_extract(ctx, inst_id, true)
        }

        SelectU8 | SelectU16 | SelectU32 | SelectU64 | SelectF32 => alu::select(ctx, inst_id),

        BitCastU16F16 | BitCastU32F32 | BitCastU64F64 | BitCastF16U16 | BitCastF32U32
        | BitCastF64U64 => alu::bitcast(ctx, inst_id),
        PackUint2x32 => alu::pack(ctx, inst_id, "PK64.U"),
        UnpackUint2x32 => alu::unpack(ctx, inst_id, "UP64.U"),
        PackFloat2x16 => alu::pack(ctx, inst_id, "PK2H"),
        UnpackFloat2x16 => alu::unpack(ctx, inst_id, "UP2H"),
        PackDouble2x32 => alu::pack(ctx, inst_id, "PK64"),
        UnpackDouble2x32 => alu::unpack(ctx, inst_id, "UP64"),

        FPAdd16 => alu::fp_binary(ctx, inst_id, "ADD.F16"),
        FPAdd32 => alu::fp_binary(ctx, inst_id, "ADD.F"),
        FPAdd64 => alu::fp_binary(ctx, inst_id, "ADD.F64"),
        FPFma16 => alu::fp_fma(ctx, inst_id),
        FPFma32 => alu::fp_fma(ctx, inst_id),
        FPFma64 => alu::fp_fma(ctx, inst_id),
        FPMul16 => alu::fp_binary(ctx, inst_id, "MUL.F16"),
        FPMul32 => alu::fp_binary(ctx, inst_id, "MUL.F"),
        FPMul64 => alu::fp_binary(ctx, inst_id, "MUL.F64"),
        FPNeg16 | FPNeg32 | FPNeg64 => alu::fp_neg(ctx, inst_id),
        FPAbs16 | FPAbs32 | FPAbs64 => alu::fp_abs(ctx, inst_id),
        FPSaturate16 => alu::fp_unary(ctx, inst_id, "MOV.F16.SAT"),
        FPSaturate32 => alu::fp_unary(ctx, inst_id, "MOV.F.SAT"),
        FPSaturate64 => alu::fp_unary(ctx, inst_id, "MOV.F64.SAT"),
        FPRecip32 => alu::fp_unary(ctx, inst_id, "RCP.F"),
        FPRecip64 => alu::fp_unary(ctx, inst_id, "RCP.F64"),
        FPRecipSqrt32 => alu::fp_unary(ctx, inst_id, "RSQ.F"),
        FPRecipSqrt64 => alu::fp_unary(ctx, inst_id, "RSQ.F64"),
        FPSqrt => alu::fp_unary(ctx, inst_id, "SQT.F"),
        FPSin => alu::fp_unary(ctx, inst_id, "SIN"),
        FPCos => alu::fp_unary(ctx, inst_id, "COS"),
        FPExp2 => alu::fp_unary(ctx, inst_id, "EX2"),
        FPLog2 => alu::fp_unary(ctx, inst_id, "LG2"),
        FPRoundEven16 => alu::fp_unary(ctx, inst_id, "ROUND.F16"),
        FPRoundEven32 => alu::fp_unary(ctx, inst_id, "ROUND.F"),
        FPRoundEven64 => alu::fp_unary(ctx, inst_id, "ROUND.F64"),
        FPFloor16 => alu::fp_unary(ctx, inst_id, "FLR.F16"),
        FPFloor32 => alu::fp_unary(ctx, inst_id, "FLR.F"),
        FPFloor64 => alu::fp_unary(ctx, inst_id, "FLR.F64"),
        FPCeil16 => alu::fp_unary(ctx, inst_id, "CEIL.F16"),
        FPCeil32 => alu::fp_unary(ctx, inst_id, "CEIL.F"),
        FPCeil64 => alu::fp_unary(ctx, inst_id, "CEIL.F64"),
        FPTrunc16 => alu::fp_unary(ctx, inst_id, "TRUNC.F16"),
        FPTrunc32 => alu::fp_unary(ctx, inst_id, "TRUNC.F"),
        FPTrunc64 => alu::fp_unary(ctx, inst_id, "TRUNC.F64"),

        FPOrdEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SEQ", "F16", false)),
        FPOrdEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SEQ", "F", false)),
        FPOrdEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SEQ", "F64", false)),
        FPUnordEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SEQ", "F16", true)),
        FPUnordEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SEQ", "F", true)),
        FPUnordEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SEQ", "F64", true)),
        FPOrdNotEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SNE", "F16", false)),
        FPOrdNotEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SNE", "F", false)),
        FPOrdNotEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SNE", "F64", false)),
        FPUnordNotEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SNE", "F16", true)),
        FPUnordNotEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SNE", "F", true)),
        FPUnordNotEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SNE", "F64", true)),
        FPOrdLessThan16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLT", "F16", false)),
        FPOrdLessThan32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLT", "F", false)),
        FPOrdLessThan64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLT", "F64", false)),
        FPUnordLessThan16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLT", "F16", true)),
        FPUnordLessThan32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLT", "F", true)),
        FPUnordLessThan64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLT", "F64", true)),
        FPOrdGreaterThan16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGT", "F16", false)),
        FPOrdGreaterThan32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGT", "F", false)),
        FPOrdGreaterThan64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGT", "F64", false)),
        FPUnordGreaterThan16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGT", "F16", true)),
        FPUnordGreaterThan32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGT", "F", true)),
        FPUnordGreaterThan64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGT", "F64", true)),
        FPOrdLessThanEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLE", "F16", false)),
        FPOrdLessThanEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLE", "F", false)),
        FPOrdLessThanEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLE", "F64", false)),
        FPUnordLessThanEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLE", "F16", true)),
        FPUnordLessThanEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLE", "F", true)),
        FPUnordLessThanEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SLE", "F64", true)),
        FPOrdGreaterThanEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGE", "F16", false)),
        FPOrdGreaterThanEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGE", "F", false)),
        FPOrdGreaterThanEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGE", "F64", false)),
        FPUnordGreaterThanEqual16 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGE", "F16", true)),
        FPUnordGreaterThanEqual32 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGE", "F", true)),
        FPUnordGreaterThanEqual64 => alu::fp_compare(ctx, inst_id, &fp_cmp("SGE", "F64", true)),

        IAdd32 | IAdd64 => alu::int_add(ctx, inst_id),
        ISub32 | ISub64 => alu::int_binary(ctx, inst_id, "SUB.S"),
        IMul32 => alu::int_binary(ctx, inst_id, "MUL.S"),
        INeg32 => alu::int_neg(ctx, inst_id),
        IAbs32 => alu::int_unary(ctx, inst_id, "ABS.S"),
        ShiftLeftLogical32 => alu::int_binary(ctx, inst_id, "SHL.U"),
        ShiftRightLogical32 => alu::int_binary(ctx, inst_id, "SHR.U"),
        ShiftRightArithmetic32 => alu::int_binary(ctx, inst_id, "SHR.S"),
        BitwiseAnd32 => alu::int_binary(ctx, inst_id, "AND.S"),
        BitwiseOr32 => alu::int_binary(ctx, inst_id, "OR.S"),
        BitwiseXor32 => alu::int_binary(ctx, inst_id, "XOR.S"),
        BitFieldInsert => alu::bit_field_insert(ctx, inst_id),
        BitFieldSExtract => alu::bit_field_extract(ctx, inst_id, true),
        BitFieldUExtract => alu::bit_field_extract(ctx, inst_id, false),

        SLessThan => alu::int_binary(ctx, inst_id, "SLT.S"),
        SLessThanEqual => alu::int_binary(ctx, inst_id, "SLE.S"),
        SGreaterThan => alu::int_binary(ctx, inst_id, "SGT.S"),
        SGreaterThanEqual => alu::int_binary(ctx, inst_id, "SGE.S"),
        ULessThan => alu::int_binary(ctx, inst_id, "SLT.U"),
        ULessThanEqual => alu::int_binary(ctx, inst_id, "SLE.U"),
        UGreaterThan => alu::int_binary(ctx, inst_id, "SGT.U"),
        UGreaterThanEqual => alu::int_binary(ctx, inst_id, "SGE.U"),
        IEqual => alu::int_binary(ctx, inst_id, "SEQ.S"),
        INotEqual => alu::int_binary(ctx, inst_id, "SNE.S"),

        LogicalOr => alu::int_binary(ctx, inst_id, "OR.S"),
        LogicalAnd => alu::int_binary(ctx, inst_id, "AND.S"),
        LogicalXor => alu::int_binary(ctx, inst_id, "XOR.S"),
        LogicalNot => alu::logical_not(ctx, inst_id),

        ConvertS16F16 => alu::convert(ctx, inst_id, "S16", "F16"),
        ConvertS16F32 => alu::convert(ctx, inst_id, "S16", "F32"),
        ConvertS16F64 => alu::convert(ctx, inst_id, "S16", "F64"),
        ConvertS32F16 => alu::convert(ctx, inst_id, "S32", "F16"),
        ConvertS32F32 => alu::convert(ctx, inst_id, "S32", "F32"),
        ConvertS32F64 => alu::convert(ctx, inst_id, "S32", "F64"),
        ConvertS64F16 => alu::convert(ctx, inst_id, "S64", "F16"),
        ConvertS64F32 => alu::convert(ctx, inst_id, "S64", "F32"),
        ConvertS64F64 => alu::convert(ctx, inst_id, "S64", "F64"),
        ConvertU16F16 => alu::convert(ctx, inst_id, "U16", "F16"),
        ConvertU16F32 => alu::convert(ctx, inst_id, "U16", "F32"),
        ConvertU16F64 => alu::convert(ctx, inst_id, "U16", "F64"),
        ConvertU32F16 => alu::convert(ctx, inst_id, "U32", "F16"),
        ConvertU32F32 => alu::convert(ctx, inst_id, "U32", "F32"),
        ConvertU32F64 => alu::convert(ctx, inst_id, "U32", "F64"),
        ConvertU64F16 => alu::convert(ctx, inst_id, "U64", "F16"),
        ConvertU64F32 => alu::convert(ctx, inst_id, "U64", "F32"),
        ConvertU64F64 => alu::convert(ctx, inst_id, "U64", "F64"),
        ConvertU32U64 => alu::convert(ctx, inst_id, "U32", "U64"),
        ConvertU64U32 => alu::convert(ctx, inst_id, "U64", "U32"),

        LoadGlobalU8 => alu::load_global(ctx, inst_id, "U8"),
        LoadGlobalS8 => alu::load_global(ctx, inst_id, "S8"),
        LoadGlobalU16 => alu::load_global(ctx, inst_id, "U16"),
        LoadGlobalS16 => alu::load_global(ctx, inst_id, "S16"),
        LoadGlobal32 => alu::load_global(ctx, inst_id, "U32"),
        LoadGlobal64 => alu::load_global(ctx, inst_id, "U32X2"),
        LoadGlobal128 => alu::load_global(ctx, inst_id, "U32X4"),
        WriteGlobalU8 => alu::write_global(ctx, inst_id, "U8"),
        WriteGlobalS8 => alu::write_global(ctx, inst_id, "S8"),
        WriteGlobalU16 => alu::write_global(ctx, inst_id, "U16"),
        WriteGlobalS16 => alu::write_global(ctx, inst_id, "S16"),
        WriteGlobal32 => alu::write_global(ctx, inst_id, "U32"),
        WriteGlobal64 => alu::write_global(ctx, inst_id, "U32X2"),
        WriteGlobal128 => alu::write_global(ctx, inst_id, "U32X4"),

        ImageSampleImplicitLod => image::emit_image_sample_implicit_lod(ctx, inst_id),
        ImageSampleExplicitLod => image::emit_image_sample_explicit_lod(ctx, inst_id),
        ImageSampleDrefImplicitLod => image::emit_image_sample_dref_implicit_lod(ctx, inst_id),
        ImageSampleDrefExplicitLod => image::emit_image_sample_dref_explicit_lod(ctx, inst_id),
        ImageGather => image::emit_image_gather(ctx, inst_id),
        ImageGatherDref => image::emit_image_gather_dref(ctx, inst_id),
        ImageFetch => image::emit_image_fetch(ctx, inst_id),
        ImageQueryDimensions => image::emit_image_query_dimensions(ctx, inst_id),
        ImageQueryLod => image::emit_image_query_lod(ctx, inst_id),
        ImageGradient => image::emit_image_gradient(ctx, inst_id),

        BindlessImageSampleImplicitLod
        | BindlessImageSampleExplicitLod
        | BindlessImageSampleDrefImplicitLod
        | BindlessImageSampleDrefExplicitLod
        | BindlessImageGather
        | BindlessImageGatherDref
        | BindlessImageFetch
        | BindlessImageQueryDimensions
        | BindlessImageQueryLod
        | BindlessImageGradient => alu::bindless_unreachable(opcode),

        GetRegister | SetRegister | GetPred | SetPred | GetGotoVariable | SetGotoVariable
        | GetIndirectBranchVariable | SetIndirectBranchVariable | GetZFlag | GetSFlag
        | GetCFlag | GetOFlag | SetZFlag | SetSFlag | SetCFlag | SetOFlag => Err(Error::logic(
            format!("{opcode} survived the SSA rewrite"),
        )),
    }
}

/// Lowers a post-SSA program to assembly-style text.
pub fn emit_glasm(program: &Program, profile: &Profile) -> Result<String> {
    let ctx = EmitContext::new(program, profile)?;
    let func = ctx.func;
    let layout: Vec<BlockId> = func.post_order().iter().rev().copied().collect();

    for &block in &layout {
        for &inst_id in func.block(block).insts() {
            let inst = func.inst(inst_id);
            if inst.is_phi() && inst.has_uses() {
                ctx.reg_alloc.define_phi(func, inst_id)?;
            }
        }
    }

    for &block in &layout {
        ctx.add(&format!("B{}:", block.index()));
        for &inst_id in func.block(block).insts() {
            if func.inst(inst_id).opcode().is_terminator() {
                emit_phi_moves(&ctx, block)?;
            }
            emit_inst(&ctx, inst_id)?;
        }
    }
    ctx.reg_alloc.release_phis();

    let body = ctx.take_code();
    let mut out = String::new();
    out.push_str(header(program.stage));
    let mut binding_mask = program.info.constant_buffer_mask;
    while binding_mask != 0 {
        let binding = binding_mask.trailing_zeros();
        binding_mask &= binding_mask - 1;
        let _ = writeln!(
            out,
            "CBUFFER cbuf{binding}[] = {{ program.buffer[{binding}] }};"
        );
    }
    let _ = writeln!(out, "TEMP RC;");
    for index in ctx.reg_alloc.defined_registers() {
        let _ = writeln!(out, "TEMP R{index};");
    }
    for index in ctx.reg_alloc.defined_long_registers() {
        let _ = writeln!(out, "LONG TEMP D{index};");
    }
    out.push_str(&body);
    out.push_str("END\n");

    if !ctx.reg_alloc.pool_is_clean() {
        return Err(Error::logic(
            "register pool not restored at end of emission",
        ));
    }
    Ok(out)
}
