//! Emission for the high-level textual target.
//!
//! Covers the expression core: arithmetic, logic, comparisons, selects,
//! composites, conversions and resource reads. Control flow beyond a single
//! `return` and the texture family are not lowered here yet; the assembly
//! backend is the complete one.

use core::cell::RefCell;
use core::fmt::Write as _;
use std::collections::BTreeSet;

use crate::backend::glsl::reg_alloc::RegAlloc;
use crate::error::{Error, Result};
use crate::ir::{Attribute, Function, InstId, Opcode, Program, Stage, Value};
use crate::profile::Profile;

struct EmitContext<'a> {
    func: &'a Function,
    stage: Stage,
    reg_alloc: RegAlloc,
    code: RefCell<String>,
    input_attrs: RefCell<BTreeSet<u8>>,
    output_attrs: RefCell<BTreeSet<u8>>,
    cbufs: RefCell<BTreeSet<u32>>,
}

impl<'a> EmitContext<'a> {
    fn add(&self, line: &str) {
        let mut code = self.code.borrow_mut();
        code.push_str("    ");
        code.push_str(line);
        code.push('\n');
    }

    fn consume(&self, value: Value) -> Result<String> {
        self.reg_alloc.consume(self.func, value)
    }

    fn define(&self, inst: InstId) -> Result<String> {
        self.reg_alloc.define(self.func, inst)
    }
}

const LANES: [char; 4] = ['x', 'y', 'z', 'w'];

fn unary(ctx: &EmitContext<'_>, inst: InstId, op: &str) -> Result<()> {
    let value = ctx.consume(ctx.func.inst(inst).arg(0))?;
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}={op}({value});"));
    Ok(())
}

fn binary_fn(ctx: &EmitContext<'_>, inst: InstId, op: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume(ir_inst.arg(0))?;
    let b = ctx.consume(ir_inst.arg(1))?;
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}={op}({a},{b});"));
    Ok(())
}

fn infix(ctx: &EmitContext<'_>, inst: InstId, op: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume(ir_inst.arg(0))?;
    let b = ctx.consume(ir_inst.arg(1))?;
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}={a}{op}{b};"));
    Ok(())
}

fn infix_signed(ctx: &EmitContext<'_>, inst: InstId, op: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume(ir_inst.arg(0))?;
    let b = ctx.consume(ir_inst.arg(1))?;
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}=uint(int({a}){op}int({b}));"));
    Ok(())
}

fn compare(ctx: &EmitContext<'_>, inst: InstId, op: &str, signed: bool) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let a = ctx.consume(ir_inst.arg(0))?;
    let b = ctx.consume(ir_inst.arg(1))?;
    let def = ctx.define(inst)?;
    if signed {
        ctx.add(&format!("{def}=int({a}){op}int({b});"));
    } else {
        ctx.add(&format!("{def}={a}{op}{b};"));
    }
    Ok(())
}

fn composite_construct(ctx: &EmitContext<'_>, inst: InstId, ctor: &str) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let args: Vec<Value> = ir_inst.args().to_vec();
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(ctx.consume(arg)?);
    }
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}={ctor}({});", parts.join(",")));
    Ok(())
}

fn composite_extract(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let vector = ctx.consume(ir_inst.arg(0))?;
    let element = ctx.func.resolve(ir_inst.arg(1)).u32()? as usize;
    let lane = *LANES
        .get(element)
        .ok_or_else(|| Error::invalid_argument(format!("element {element} out of range")))?;
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}={vector}.{lane};"));
    Ok(())
}

fn get_attribute(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let attribute = ctx.func.inst(inst).arg(0).attribute()?;
    let source = match attribute {
        Attribute::Generic { index, component } => {
            ctx.input_attrs.borrow_mut().insert(index);
            format!("in_attr{index}.{}", LANES[usize::from(component) & 3])
        }
        Attribute::PositionX | Attribute::PositionY | Attribute::PositionZ
        | Attribute::PositionW => {
            if ctx.stage != Stage::Fragment {
                return Err(Error::not_implemented("position reads outside fragment"));
            }
            let lane = match attribute {
                Attribute::PositionX => 'x',
                Attribute::PositionY => 'y',
                Attribute::PositionZ => 'z',
                _ => 'w',
            };
            format!("gl_FragCoord.{lane}")
        }
        Attribute::VertexId => "float(gl_VertexID)".to_owned(),
        Attribute::InstanceId => "float(gl_InstanceID)".to_owned(),
        other => return Err(Error::not_implemented(format!("attribute read {other}"))),
    };
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}={source};"));
    Ok(())
}

fn set_attribute(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let attribute = ir_inst.arg(0).attribute()?;
    let value = ctx.consume(ir_inst.arg(1))?;
    let target = match attribute {
        Attribute::Generic { index, component } => {
            ctx.output_attrs.borrow_mut().insert(index);
            format!("out_attr{index}.{}", LANES[usize::from(component) & 3])
        }
        Attribute::PositionX => "gl_Position.x".to_owned(),
        Attribute::PositionY => "gl_Position.y".to_owned(),
        Attribute::PositionZ => "gl_Position.z".to_owned(),
        Attribute::PositionW => "gl_Position.w".to_owned(),
        other => return Err(Error::not_implemented(format!("attribute store {other}"))),
    };
    ctx.add(&format!("{target}={value};"));
    Ok(())
}

fn get_cbuf(ctx: &EmitContext<'_>, inst: InstId) -> Result<()> {
    let ir_inst = ctx.func.inst(inst);
    let binding = ctx.func.resolve(ir_inst.arg(0)).u32()?;
    ctx.cbufs.borrow_mut().insert(binding);
    let offset = ctx.consume(ir_inst.arg(1))?;
    let def = ctx.define(inst)?;
    ctx.add(&format!("{def}=cbuf{binding}[({offset})>>2];"));
    Ok(())
}

fn emit_inst(ctx: &EmitContext<'_>, inst_id: InstId) -> Result<()> {
    use Opcode::*;

    let inst = ctx.func.inst(inst_id);
    let opcode = inst.opcode();
    if !opcode.has_side_effects() && !inst.has_uses() {
        return Ok(());
    }
    match opcode {
        Void | Identity | LoopMerge | SelectionMerge => Ok(()),
        Return => {
            ctx.add("return;");
            Ok(())
        }

        UndefU1 => {
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=false;"));
            Ok(())
        }
        UndefU8 | UndefU16 | UndefU32 | UndefU64 => {
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=0u;"));
            Ok(())
        }

        GetCbuf => get_cbuf(ctx, inst_id),
        GetAttribute => get_attribute(ctx, inst_id),
        SetAttribute => set_attribute(ctx, inst_id),

        GetZeroFromOp | GetSignFromOp | GetCarryFromOp | GetOverflowFromOp | GetSparseFromOp => {
            Err(Error::logic(format!(
                "{opcode} was not consumed by its producing instruction"
            )))
        }

        CompositeConstructU32x2 => composite_construct(ctx, inst_id, "uvec2"),
        CompositeConstructU32x3 => composite_construct(ctx, inst_id, "uvec3"),
        CompositeConstructU32x4 => composite_construct(ctx, inst_id, "uvec4"),
        CompositeConstructF32x2 => composite_construct(ctx, inst_id, "vec2"),
        CompositeConstructF32x3 => composite_construct(ctx, inst_id, "vec3"),
        CompositeConstructF32x4 => composite_construct(ctx, inst_id, "vec4"),
        CompositeExtractU32x2 | CompositeExtractU32x3 | CompositeExtractU32x4
        | CompositeExtractF32x2 | CompositeExtractF32x3 | CompositeExtractF32x4 => {
            composite_extract(ctx, inst_id)
        }

        SelectU8 | SelectU16 | SelectU32 | SelectU64 | SelectF32 => {
            let ir_inst = ctx.func.inst(inst_id);
            let cond = ctx.consume(ir_inst.arg(0))?;
            let true_value = ctx.consume(ir_inst.arg(1))?;
            let false_value = ctx.consume(ir_inst.arg(2))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}={cond}?{true_value}:{false_value};"));
            Ok(())
        }

        BitCastU32F32 => unary(ctx, inst_id, "floatBitsToUint"),
        BitCastF32U32 => unary(ctx, inst_id, "uintBitsToFloat"),
        BitCastU64F64 => unary(ctx, inst_id, "doubleBitsToUint64"),
        BitCastF64U64 => unary(ctx, inst_id, "uint64BitsToDouble"),
        PackUint2x32 => unary(ctx, inst_id, "packUint2x32"),
        UnpackUint2x32 => unary(ctx, inst_id, "unpackUint2x32"),
        PackDouble2x32 => unary(ctx, inst_id, "packDouble2x32"),
        UnpackDouble2x32 => unary(ctx, inst_id, "unpackDouble2x32"),
        PackFloat2x16 => unary(ctx, inst_id, "packFloat2x16"),
        UnpackFloat2x16 => unary(ctx, inst_id, "unpackFloat2x16"),

        FPAdd16 | FPAdd32 | FPAdd64 => infix(ctx, inst_id, "+"),
        FPMul16 | FPMul32 | FPMul64 => infix(ctx, inst_id, "*"),
        FPFma16 | FPFma32 | FPFma64 => {
            let ir_inst = ctx.func.inst(inst_id);
            let a = ctx.consume(ir_inst.arg(0))?;
            let b = ctx.consume(ir_inst.arg(1))?;
            let c = ctx.consume(ir_inst.arg(2))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=fma({a},{b},{c});"));
            Ok(())
        }
        FPNeg16 | FPNeg32 | FPNeg64 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=-({value});"));
            Ok(())
        }
        FPAbs16 | FPAbs32 | FPAbs64 => unary(ctx, inst_id, "abs"),
        FPSaturate16 | FPSaturate32 | FPSaturate64 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=clamp({value},0.0,1.0);"));
            Ok(())
        }
        FPRecip32 | FPRecip64 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=1.0/({value});"));
            Ok(())
        }
        FPRecipSqrt32 | FPRecipSqrt64 => unary(ctx, inst_id, "inversesqrt"),
        FPSqrt => unary(ctx, inst_id, "sqrt"),
        FPSin => unary(ctx, inst_id, "sin"),
        FPCos => unary(ctx, inst_id, "cos"),
        FPExp2 => unary(ctx, inst_id, "exp2"),
        FPLog2 => unary(ctx, inst_id, "log2"),
        FPRoundEven16 | FPRoundEven32 | FPRoundEven64 => unary(ctx, inst_id, "roundEven"),
        FPFloor16 | FPFloor32 | FPFloor64 => unary(ctx, inst_id, "floor"),
        FPCeil16 | FPCeil32 | FPCeil64 => unary(ctx, inst_id, "ceil"),
        FPTrunc16 | FPTrunc32 | FPTrunc64 => unary(ctx, inst_id, "trunc"),

        FPOrdEqual16 | FPOrdEqual32 | FPOrdEqual64 | FPUnordEqual16 | FPUnordEqual32
        | FPUnordEqual64 => compare(ctx, inst_id, "==", false),
        FPOrdNotEqual16 | FPOrdNotEqual32 | FPOrdNotEqual64 | FPUnordNotEqual16
        | FPUnordNotEqual32 | FPUnordNotEqual64 => compare(ctx, inst_id, "!=", false),
        FPOrdLessThan16 | FPOrdLessThan32 | FPOrdLessThan64 | FPUnordLessThan16
        | FPUnordLessThan32 | FPUnordLessThan64 => compare(ctx, inst_id, "<", false),
        FPOrdGreaterThan16 | FPOrdGreaterThan32 | FPOrdGreaterThan64 | FPUnordGreaterThan16
        | FPUnordGreaterThan32 | FPUnordGreaterThan64 => compare(ctx, inst_id, ">", false),
        FPOrdLessThanEqual16 | FPOrdLessThanEqual32 | FPOrdLessThanEqual64
        | FPUnordLessThanEqual16 | FPUnordLessThanEqual32 | FPUnordLessThanEqual64 => {
            compare(ctx, inst_id, "<=", false)
        }
        FPOrdGreaterThanEqual16 | FPOrdGreaterThanEqual32 | FPOrdGreaterThanEqual64
        | FPUnordGreaterThanEqual16 | FPUnordGreaterThanEqual32 | FPUnordGreaterThanEqual64 => {
            compare(ctx, inst_id, ">=", false)
        }

        IAdd32 | IAdd64 => infix(ctx, inst_id, "+"),
        ISub32 | ISub64 => infix(ctx, inst_id, "-"),
        IMul32 => infix(ctx, inst_id, "*"),
        INeg32 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=uint(-int({value}));"));
            Ok(())
        }
        IAbs32 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=uint(abs(int({value})));"));
            Ok(())
        }
        ShiftLeftLogical32 => infix(ctx, inst_id, "<<"),
        ShiftRightLogical32 => infix(ctx, inst_id, ">>"),
        ShiftRightArithmetic32 => infix_signed(ctx, inst_id, ">>"),
        BitwiseAnd32 => infix(ctx, inst_id, "&"),
        BitwiseOr32 => infix(ctx, inst_id, "|"),
        BitwiseXor32 => infix(ctx, inst_id, "^"),
        BitFieldInsert => {
            let ir_inst = ctx.func.inst(inst_id);
            let base = ctx.consume(ir_inst.arg(0))?;
            let insert = ctx.consume(ir_inst.arg(1))?;
            let offset = ctx.consume(ir_inst.arg(2))?;
            let count = ctx.consume(ir_inst.arg(3))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!(
                "{def}=bitfieldInsert({base},{insert},int({offset}),int({count}));"
            ));
            Ok(())
        }
        BitFieldSExtract | BitFieldUExtract => {
            let signed = opcode == BitFieldSExtract;
            let ir_inst = ctx.func.inst(inst_id);
            let base = ctx.consume(ir_inst.arg(0))?;
            let offset = ctx.consume(ir_inst.arg(1))?;
            let count = ctx.consume(ir_inst.arg(2))?;
            let def = ctx.define(inst_id)?;
            if signed {
                ctx.add(&format!(
                    "{def}=uint(bitfieldExtract(int({base}),int({offset}),int({count})));"
                ));
            } else {
                ctx.add(&format!(
                    "{def}=bitfieldExtract({base},int({offset}),int({count}));"
                ));
            }
            Ok(())
        }

        SLessThan => compare(ctx, inst_id, "<", true),
        SLessThanEqual => compare(ctx, inst_id, "<=", true),
        SGreaterThan => compare(ctx, inst_id, ">", true),
        SGreaterThanEqual => compare(ctx, inst_id, ">=", true),
        ULessThan => compare(ctx, inst_id, "<", false),
        ULessThanEqual => compare(ctx, inst_id, "<=", false),
        UGreaterThan => compare(ctx, inst_id, ">", false),
        UGreaterThanEqual => compare(ctx, inst_id, ">=", false),
        IEqual => compare(ctx, inst_id, "==", false),
        INotEqual => compare(ctx, inst_id, "!=", false),

        LogicalOr => infix(ctx, inst_id, "||"),
        LogicalAnd => infix(ctx, inst_id, "&&"),
        LogicalXor => infix(ctx, inst_id, "^^"),
        LogicalNot => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=!({value});"));
            Ok(())
        }

        ConvertS16F16 | ConvertS16F32 | ConvertS16F64 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=uint(int({value})&0xffff);"));
            Ok(())
        }
        ConvertS32F16 | ConvertS32F32 | ConvertS32F64 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=uint(int({value}));"));
            Ok(())
        }
        ConvertU16F16 | ConvertU16F32 | ConvertU16F64 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=uint({value})&0xffffu;"));
            Ok(())
        }
        ConvertU32F16 | ConvertU32F32 | ConvertU32F64 => unary(ctx, inst_id, "uint"),
        ConvertS64F16 | ConvertS64F32 | ConvertS64F64 => {
            let value = ctx.consume(ctx.func.inst(inst_id).arg(0))?;
            let def = ctx.define(inst_id)?;
            ctx.add(&format!("{def}=uint64_t(int64_t({value}));"));
            Ok(())
        }
        ConvertU64F16 | ConvertU64F32 | ConvertU64F64 => unary(ctx, inst_id, "uint64_t"),
        ConvertU32U64 => unary(ctx, inst_id, "uint"),
        ConvertU64U32 => unary(ctx, inst_id, "uint64_t"),

        Phi | Branch | BranchConditional => Err(Error::not_implemented(
            "control flow in the high-level backend",
        )),

        other => Err(Error::not_implemented(format!(
            "{other} in the high-level backend"
        ))),
    }
}

/// Lowers a post-SSA program to high-level shading language text. Only
/// single-block programs are supported.
pub fn emit_glsl(program: &Program, _profile: &Profile) -> Result<String> {
    let func = program.entry_function()?;
    let ctx = EmitContext {
        func,
        stage: program.stage,
        reg_alloc: RegAlloc::new(),
        code: RefCell::new(String::new()),
        input_attrs: RefCell::new(BTreeSet::new()),
        output_attrs: RefCell::new(BTreeSet::new()),
        cbufs: RefCell::new(BTreeSet::new()),
    };

    let layout: Vec<_> = func.post_order().iter().rev().copied().collect();
    if layout.len() > 1 {
        return Err(Error::not_implemented(
            "control flow in the high-level backend",
        ));
    }
    for &block in &layout {
        for &inst_id in func.block(block).insts() {
            emit_inst(&ctx, inst_id)?;
        }
    }

    let mut out = String::new();
    out.push_str("#version 450\n");
    for binding in ctx.cbufs.borrow().iter() {
        let _ = writeln!(
            out,
            "layout(std430,binding={binding}) readonly buffer cbuf_block_{binding} {{ uint cbuf{binding}[]; }};"
        );
    }
    for index in ctx.input_attrs.borrow().iter() {
        let _ = writeln!(out, "layout(location={index}) in vec4 in_attr{index};");
    }
    for index in ctx.output_attrs.borrow().iter() {
        let _ = writeln!(out, "layout(location={index}) out vec4 out_attr{index};");
    }
    out.push_str("void main(){\n");
    out.push_str(&ctx.code.borrow());
    out.push_str("}\n");

    if !ctx.reg_alloc.pool_is_clean() {
        return Err(Error::logic(
            "register pool not restored at end of emission",
        ));
    }
    Ok(out)
}
