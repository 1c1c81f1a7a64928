//! End-to-end recompilation from hand-assembled instruction words.

use maxwell_shader::ir::{Condition, FlowTest, Pred};
use maxwell_shader::{
    recompile, BackendKind, BytesEnvironment, CacheLookupSource, CfgBlock, CfgTerminator, Error,
    Profile, ShaderCache, Stage,
};

fn op(opcode: u64) -> u64 {
    opcode << 52
}

fn mov32i(dest: u64, imm: u32) -> u64 {
    op(0x010) | (imm as u64) << 20 | dest
}

fn fadd_reg(dest: u64, src_a: u64, src_b: u64) -> u64 {
    op(0x5c5) | src_b << 20 | src_a << 8 | dest
}

fn fadd_cbuf(dest: u64, src_a: u64, binding: u64, word_offset: u64) -> u64 {
    op(0x4c5) | binding << 34 | word_offset << 20 | src_a << 8 | dest
}

fn fadd_imm(dest: u64, src_a: u64, imm19: u64) -> u64 {
    op(0x385) | imm19 << 20 | src_a << 8 | dest
}

fn iadd_reg(dest: u64, src_a: u64, src_b: u64) -> u64 {
    op(0x5c1) | src_b << 20 | src_a << 8 | dest
}

fn iadd_imm(dest: u64, src_a: u64, imm19: u64) -> u64 {
    op(0x381) | imm19 << 20 | src_a << 8 | dest
}

fn isetp_gt_signed(dest_pred: u64, src_a: u64, src_b: u64) -> u64 {
    // Compare 4 = greater-than, signed bit 43, combine with PT via AND.
    op(0x5b6) | 4 << 48 | 1 << 43 | 7 << 39 | src_b << 20 | src_a << 8 | dest_pred << 3
}

fn f2i_reg(dest: u64, src: u64, rounding: u64) -> u64 {
    // f32 source (2), s32 destination (2), signed.
    op(0x5cb) | rounding << 39 | src << 20 | 1 << 12 | 2 << 10 | 2 << 8 | dest
}

fn f2i_cbuf_f64(dest: u64, binding: u64, word_offset: u64) -> u64 {
    op(0x4cb) | binding << 34 | word_offset << 20 | 1 << 12 | 3 << 10 | 2 << 8 | dest
}

fn ipa_pass(dest: u64, attr_offset: u64) -> u64 {
    op(0xe00) | (attr_offset / 4) << 28 | dest
}

/// Implicit-LOD 2D sample of `descriptor` into `dest..dest+3`.
fn tex_2d(dest: u64, coord: u64, descriptor: u64) -> u64 {
    op(0xc03) | descriptor << 40 | 2 << 28 | coord << 8 | dest
}

fn ast(src: u64, attr_offset: u64) -> u64 {
    op(0xef5) | (attr_offset / 4) << 28 | src
}

/// Byte offset of generic attribute `index`, component `component`.
fn generic_offset(index: u64, component: u64) -> u64 {
    0x80 + index * 16 + component * 4
}

fn to_bytes(words: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 8);
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

fn single_exit_block(len: u32) -> Vec<CfgBlock> {
    vec![CfgBlock {
        begin: 0,
        end: len,
        terminator: CfgTerminator::Exit,
    }]
}

#[test]
fn vertex_straight_line_add() {
    let words = [
        mov32i(1, 1.0f32.to_bits()),
        mov32i(2, 2.0f32.to_bits()),
        fadd_reg(3, 1, 2),
        ast(3, generic_offset(0, 0)),
    ];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let shader = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap();

    assert!(shader.code.starts_with("!!NVvp5.0\n"), "{}", shader.code);
    assert!(shader.code.contains("ADD.F "), "{}", shader.code);
    assert!(
        shader.code.contains("result.attrib[0].x"),
        "{}",
        shader.code
    );
    assert!(shader.code.ends_with("END\n"), "{}", shader.code);
    assert_eq!(shader.info.output_generics, 1);
}

#[test]
fn conditional_branch_lowers_to_predicated_jump() {
    let b0 = [mov32i(1, 5), mov32i(2, 3), isetp_gt_signed(0, 1, 2)];
    let b1 = [mov32i(7, 1.0f32.to_bits()), ast(7, generic_offset(0, 0))];
    let b2 = [mov32i(7, 0.5f32.to_bits()), ast(7, generic_offset(0, 0))];
    let words: Vec<u64> = b0.iter().chain(&b1).chain(&b2).copied().collect();
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = vec![
        CfgBlock {
            begin: 0,
            end: 3,
            terminator: CfgTerminator::BranchConditional {
                condition: Condition::new(FlowTest::T, Pred::new(0).unwrap(), false),
                true_target: 1,
                false_target: 2,
            },
        },
        CfgBlock {
            begin: 3,
            end: 5,
            terminator: CfgTerminator::Exit,
        },
        CfgBlock {
            begin: 5,
            end: 7,
            terminator: CfgTerminator::Exit,
        },
    ];

    let shader = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap();

    assert!(shader.code.contains("SGT.S "), "{}", shader.code);
    assert!(shader.code.contains("BRA B1 (NE.x);"), "{}", shader.code);
    assert!(shader.code.contains("BRA B2;"), "{}", shader.code);
}

#[test]
fn loop_carried_register_emits_phi_moves() {
    let b0 = [mov32i(1, 0)];
    let b2 = [iadd_imm(1, 1, 1)];
    let b3 = [ast(1, generic_offset(0, 0))];
    let words: Vec<u64> = b0.iter().chain(&b2).chain(&b3).copied().collect();
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let always = Condition::new(FlowTest::T, Pred::PT, false);
    let cfg = vec![
        CfgBlock {
            begin: 0,
            end: 1,
            terminator: CfgTerminator::Branch { target: 1 },
        },
        // Loop header: no instructions of its own.
        CfgBlock {
            begin: 1,
            end: 1,
            terminator: CfgTerminator::BranchConditional {
                condition: always,
                true_target: 2,
                false_target: 3,
            },
        },
        CfgBlock {
            begin: 1,
            end: 2,
            terminator: CfgTerminator::Branch { target: 1 },
        },
        CfgBlock {
            begin: 2,
            end: 3,
            terminator: CfgTerminator::Exit,
        },
    ];

    let shader = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap();

    // The loop-carried register merges through a phi: its register is
    // populated from both the preheader and the latch.
    assert!(shader.code.contains("ADD.S "), "{}", shader.code);
    assert!(
        shader.code.matches("MOV.U ").count() >= 2,
        "{}",
        shader.code
    );
    assert!(shader.code.contains("BRA B2 (NE.x);"), "{}", shader.code);
}

#[test]
fn fragment_varying_read_reaches_the_output() {
    let words = [
        ipa_pass(0, generic_offset(0, 0)),
        ast(0, generic_offset(1, 0)),
    ];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let shader = recompile(
        &env,
        &cfg,
        Stage::Fragment,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap();

    assert!(
        shader.code.contains("fragment.attrib[0].x"),
        "{}",
        shader.code
    );
    assert_eq!(shader.info.input_generics, 1);
    assert_eq!(shader.info.output_generics, 2);
}

#[test]
fn float_to_int_conversion_rounds_then_converts() {
    let words = [
        mov32i(1, 7.7f32.to_bits()),
        f2i_reg(2, 1, 3), // truncating conversion
        iadd_reg(3, 2, 2),
        ast(3, generic_offset(0, 0)),
    ];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let shader = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap();

    assert!(shader.code.contains("TRUNC.F "), "{}", shader.code);
    assert!(shader.code.contains("CVT.S32.F32 "), "{}", shader.code);
}

#[test]
fn texture_sample_reaches_the_assembly_backend() {
    let words = [
        mov32i(8, 0.5f32.to_bits()),
        mov32i(9, 0.25f32.to_bits()),
        tex_2d(4, 8, 0),
        ast(4, generic_offset(0, 0)),
    ];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let shader = recompile(
        &env,
        &cfg,
        Stage::Fragment,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap();

    assert!(shader.code.contains("TEX.F "), "{}", shader.code);
    assert!(shader.code.contains("texture[0]"), "{}", shader.code);
    assert_eq!(shader.info.texture_descriptors.len(), 1);
    assert!(!shader.info.uses_sparse_residency);
}

#[test]
fn out_of_range_cbuf_binding_is_a_decode_error() {
    let words = [fadd_cbuf(1, 1, 20, 0), ast(1, generic_offset(0, 0))];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let err = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap_err();
    match err {
        Error::Decode { message, .. } => assert!(message.contains("binding"), "{message}"),
        other => panic!("expected decode error, got {other}"),
    }
}

#[test]
fn misaligned_f64_cbuf_offset_is_a_decode_error() {
    let words = [f2i_cbuf_f64(2, 0, 1), ast(2, generic_offset(0, 0))];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let err = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap_err();
    match err {
        Error::Decode { message, .. } => assert!(message.contains("naligned"), "{message}"),
        other => panic!("expected decode error, got {other}"),
    }
}

#[test]
fn immediate_f2i_is_not_implemented() {
    let words = [op(0x36b)];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let err = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)), "{err}");
}

#[test]
fn unknown_opcode_is_a_decode_error() {
    let words = [op(0xfff)];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = single_exit_block(words.len() as u32);

    let err = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glasm,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }), "{err}");
}

#[test]
fn cache_reports_lookup_source() {
    let words = [
        mov32i(1, 1.0f32.to_bits()),
        fadd_imm(2, 1, (1.0f32.to_bits() >> 13) as u64),
        ast(2, generic_offset(0, 0)),
    ];
    let bytes = to_bytes(&words);
    let cfg = single_exit_block(words.len() as u32);

    let mut cache = ShaderCache::default();
    let (source, first) = cache
        .get_or_recompile(&bytes, &cfg, Stage::Vertex)
        .unwrap();
    assert_eq!(source, CacheLookupSource::Recompiled);
    let first_hash = first.hash;

    let (source, second) = cache
        .get_or_recompile(&bytes, &cfg, Stage::Vertex)
        .unwrap();
    assert_eq!(source, CacheLookupSource::Memory);
    assert_eq!(second.hash, first_hash);

    let other_words = [
        mov32i(1, 2.0f32.to_bits()),
        fadd_imm(2, 1, (1.0f32.to_bits() >> 13) as u64),
        ast(2, generic_offset(0, 0)),
    ];
    let other_bytes = to_bytes(&other_words);
    let (source, _) = cache
        .get_or_recompile(&other_bytes, &cfg, Stage::Vertex)
        .unwrap();
    assert_eq!(source, CacheLookupSource::Recompiled);
}
