use maxwell_shader::backend::glasm::emit_glasm;
use maxwell_shader::ir::emit::{IREmitter, F32, U32};
use maxwell_shader::ir::{
    Attribute, Function, Program, Stage, TextureInstInfo, TextureType, Value,
};
use maxwell_shader::opt::collect_info_pass;
use maxwell_shader::Profile;

fn generic(index: u8) -> Attribute {
    Attribute::Generic {
        index,
        component: 0,
    }
}

fn finish(func: Function, stage: Stage) -> Program {
    let mut program = Program::new(stage);
    program.functions.push(func);
    collect_info_pass(&mut program).expect("info collection");
    program
}

#[test]
fn sparse_biased_clamped_2d_sample() {
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cx = ir.imm32_float(0.25);
        let cy = ir.imm32_float(0.75);
        let coord = ir.composite_construct(&[cx.0, cy.0]).unwrap();
        let bias = ir.imm32_float(1.5);
        let clamp = ir.imm32_float(2.0);
        let bias_lc = ir.composite_construct(&[bias.0, clamp.0]).unwrap();
        // A computed offset so the operand occupies a register.
        let one = ir.imm32(1);
        let two = ir.imm32(2);
        let offset = ir.iadd(one.into(), two.into()).unwrap();

        let info = TextureInstInfo {
            texture_type: TextureType::Color2D,
            is_depth: false,
            has_bias: true,
            has_lod_clamp: true,
            gather_component: 0,
            descriptor_index: 5,
        };
        let handle = ir.imm32(5);
        let sample = ir
            .image_sample_implicit_lod(handle, coord, bias_lc, offset.0, info)
            .unwrap();

        let sparse = ir.get_sparse_from_op(sample).unwrap();
        let hit = ir.imm32(1);
        let miss = ir.imm32(0);
        let sel = ir.select(sparse, hit.0, miss.0).unwrap();
        let sel_f32 = ir.bitcast_f32_u32(U32(sel)).unwrap();
        ir.set_attribute(generic(0), sel_f32).unwrap();

        let lane = ir.composite_extract(sample, 0).unwrap();
        ir.set_attribute(generic(1), F32(lane)).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let program = finish(func, Stage::Fragment);

    assert_eq!(program.info.texture_descriptors.len(), 1);
    assert_eq!(program.info.texture_descriptors[0].descriptor_index, 5);
    assert!(program.info.uses_sparse_residency);

    let code = emit_glasm(&program, &Profile::default()).unwrap();
    assert!(code.contains("TXB.F.LODCLAMP.SPARSE "), "{code}");
    // Bias is packed into the coordinate's w lane before the sample.
    assert!(code.contains(".w,"), "{code}");
    // Descriptor index 5 resolves to the first (and only) binding slot.
    assert!(code.contains("texture[0]"), "{code}");
    assert!(code.contains(",offset("), "{code}");
    // Residency register initialization, exactly once.
    assert_eq!(code.matches("(NONRESIDENT)").count(), 1, "{code}");
    assert!(code.contains(",-1;"), "{code}");
}

#[test]
fn clamped_unbiased_2d_sample_keeps_the_coordinate_untouched() {
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cx = ir.imm32_float(0.25);
        let cy = ir.imm32_float(0.75);
        let coord = ir.composite_construct(&[cx.0, cy.0]).unwrap();
        let half = ir.imm32_float(0.5);
        let three = ir.imm32_float(3.0);
        let clamp = ir
            .fp_add(half.into(), three.into(), Default::default())
            .unwrap();

        let info = TextureInstInfo {
            texture_type: TextureType::Color2D,
            is_depth: false,
            has_bias: false,
            has_lod_clamp: true,
            gather_component: 0,
            descriptor_index: 0,
        };
        let handle = ir.imm32(0);
        let sample = ir
            .image_sample_implicit_lod(handle, coord, clamp.0, Value::Empty, info)
            .unwrap();
        let lane = ir.composite_extract(sample, 0).unwrap();
        ir.set_attribute(generic(0), F32(lane)).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let program = finish(func, Stage::Fragment);

    let code = emit_glasm(&program, &Profile::default()).unwrap();
    // The clamp rides on the mnemonic; no lane of the coordinate is packed.
    assert!(code.contains("TEX.F.LODCLAMP "), "{code}");
    assert!(code.contains(",2D;"), "{code}");
    assert!(!code.contains(".w,"), "{code}");
}

#[test]
fn clamped_unbiased_cube_array_sample_passes_the_clamp_operand() {
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cx = ir.imm32_float(0.1);
        let cy = ir.imm32_float(0.2);
        let cz = ir.imm32_float(0.3);
        let layer = ir.imm32_float(1.0);
        let coord = ir
            .composite_construct(&[cx.0, cy.0, cz.0, layer.0])
            .unwrap();
        let half = ir.imm32_float(0.5);
        let three = ir.imm32_float(3.0);
        let clamp = ir
            .fp_add(half.into(), three.into(), Default::default())
            .unwrap();

        let info = TextureInstInfo {
            texture_type: TextureType::ColorArrayCube,
            is_depth: false,
            has_bias: false,
            has_lod_clamp: true,
            gather_component: 0,
            descriptor_index: 0,
        };
        let handle = ir.imm32(0);
        let sample = ir
            .image_sample_implicit_lod(handle, coord, clamp.0, Value::Empty, info)
            .unwrap();
        let lane = ir.composite_extract(sample, 0).unwrap();
        ir.set_attribute(generic(0), F32(lane)).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let program = finish(func, Stage::Fragment);

    let code = emit_glasm(&program, &Profile::default()).unwrap();
    // The clamp operand sits between the coordinate and the texture, and the
    // statement carries no shape token.
    assert!(code.contains("TEX.F.LODCLAMP "), "{code}");
    assert!(!code.contains("ARRAYCUBE"), "{code}");
    assert!(code.contains(",texture[0];"), "{code}");
}

#[test]
fn gather_with_four_offsets_swizzles_scratch() {
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cx = ir.imm32_float(0.5);
        let cy = ir.imm32_float(0.5);
        let coord = ir.composite_construct(&[cx.0, cy.0]).unwrap();
        let one = ir.imm32(1);
        let two = ir.imm32(2);
        let three = ir.imm32(3);
        let offset1 = ir.iadd(one.into(), two.into()).unwrap();
        let offset2 = ir.iadd(two.into(), three.into()).unwrap();

        let info = TextureInstInfo {
            texture_type: TextureType::Color2D,
            is_depth: false,
            has_bias: false,
            has_lod_clamp: false,
            gather_component: 2,
            descriptor_index: 0,
        };
        let handle = ir.imm32(0);
        let sample = ir
            .image_gather(handle, coord, offset1.0, offset2.0, info)
            .unwrap();
        let lane = ir.composite_extract(sample, 0).unwrap();
        ir.set_attribute(generic(0), F32(lane)).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let program = finish(func, Stage::Fragment);

    let code = emit_glasm(&program, &Profile::default()).unwrap();
    assert!(code.contains("TXGO.F "), "{code}");
    // Gathered component selects the .z lane of the texture reference.
    assert!(code.contains("].z,"), "{code}");
    // The [XYXY][XYXY] to [XXXX][YYYY] swizzle is eight scalar moves.
    assert_eq!(code.matches("MOV R").count(), 8, "{code}");
}

#[test]
fn cc_flags_emit_from_the_producing_add() {
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let a = ir.imm32(10);
        let b = ir.imm32(20);
        let sum = ir.iadd(a.into(), b.into()).unwrap();
        let zero = ir.get_zero_from_op(sum.0).unwrap();
        let carry = ir.get_carry_from_op(sum.0).unwrap();
        let both = ir.logical_and(zero, carry).unwrap();
        let one = ir.imm32(1);
        let none = ir.imm32(0);
        let sel = ir.select(both, one.0, none.0).unwrap();
        let out = ir.bitcast_f32_u32(U32(sel)).unwrap();
        ir.set_attribute(generic(0), out).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let program = finish(func, Stage::Fragment);

    let code = emit_glasm(&program, &Profile::default()).unwrap();
    // Carry tracking upgrades the add to its condition-code form.
    assert!(code.contains("ADD.S.CC "), "{code}");
    assert!(code.contains("SEQ.S "), "{code}");
    assert!(code.contains("(CF.x)"), "{code}");
}

#[test]
fn emission_restores_the_register_pool() {
    // A chain long enough to cycle registers through define and free.
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let mut acc = {
            let lhs = ir.imm32(1);
            let rhs = ir.imm32(2);
            ir.iadd(lhs.into(), rhs.into()).unwrap()
        };
        for step in 0..32 {
            let rhs = ir.imm32(step);
            acc = ir.iadd(acc, rhs.into()).unwrap();
        }
        let out = ir.bitcast_f32_u32(U32(acc.0)).unwrap();
        ir.set_attribute(generic(0), out).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let program = finish(func, Stage::Fragment);

    // emit_glasm fails with a logic error if any register leaks.
    let code = emit_glasm(&program, &Profile::default()).unwrap();
    assert!(code.contains("END"), "{code}");
}
