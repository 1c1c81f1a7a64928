use maxwell_shader::{
    recompile, BackendKind, BytesEnvironment, CfgBlock, CfgTerminator, Error, Profile, Stage,
};

fn op(opcode: u64) -> u64 {
    opcode << 52
}

fn mov32i(dest: u64, imm: u32) -> u64 {
    op(0x010) | (imm as u64) << 20 | dest
}

fn fadd_imm(dest: u64, src_a: u64, imm19: u64) -> u64 {
    op(0x385) | imm19 << 20 | src_a << 8 | dest
}

fn ast(src: u64, attr_offset: u64) -> u64 {
    op(0xef5) | (attr_offset / 4) << 28 | src
}

fn to_bytes(words: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 8);
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

#[test]
fn straight_line_program_emits_glsl() {
    let words = [
        mov32i(1, 2.0f32.to_bits()),
        fadd_imm(2, 1, (1.0f32.to_bits() >> 13) as u64),
        ast(2, 0x80),
    ];
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = vec![CfgBlock {
        begin: 0,
        end: words.len() as u32,
        terminator: CfgTerminator::Exit,
    }];

    let shader = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glsl,
    )
    .unwrap();

    assert!(shader.code.starts_with("#version 450\n"), "{}", shader.code);
    assert!(
        shader.code.contains("layout(location=0) out vec4 out_attr0;"),
        "{}",
        shader.code
    );
    assert!(shader.code.contains("uintBitsToFloat"), "{}", shader.code);
    assert!(shader.code.contains("out_attr0.x="), "{}", shader.code);
    // Registers are declared on first definition.
    assert!(shader.code.contains("float R"), "{}", shader.code);
}

#[test]
fn control_flow_is_not_lowered_by_the_glsl_backend() {
    let b0 = [mov32i(1, 1)];
    let b1 = [mov32i(2, 2), ast(2, 0x80)];
    let words: Vec<u64> = b0.iter().chain(&b1).copied().collect();
    let bytes = to_bytes(&words);
    let env = BytesEnvironment::new(&bytes);
    let cfg = vec![
        CfgBlock {
            begin: 0,
            end: 1,
            terminator: CfgTerminator::Branch { target: 1 },
        },
        CfgBlock {
            begin: 1,
            end: 3,
            terminator: CfgTerminator::Exit,
        },
    ];

    let err = recompile(
        &env,
        &cfg,
        Stage::Vertex,
        &Profile::default(),
        BackendKind::Glsl,
    )
    .unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)), "{err}");
}
