use pretty_assertions::assert_eq;

use maxwell_shader::ir::emit::IREmitter;
use maxwell_shader::ir::{
    dump_program, verify_ssa, BlockId, Function, InstId, Opcode, Program, Pred, Reg, Stage, Value,
};
use maxwell_shader::opt::ssa_rewrite_pass;

fn reg(index: u32) -> Reg {
    Reg::new(index).expect("register index")
}

fn program_from(func: Function) -> Program {
    let mut program = Program::new(Stage::Fragment);
    program.functions.push(func);
    program
}

fn all_insts(func: &Function) -> Vec<(BlockId, InstId)> {
    func.block_ids()
        .flat_map(|block| {
            func.block(block)
                .insts()
                .iter()
                .map(move |&inst| (block, inst))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn find_insts(func: &Function, opcode: Opcode) -> Vec<InstId> {
    all_insts(func)
        .into_iter()
        .filter(|&(_, inst)| func.inst(inst).opcode() == opcode)
        .map(|(_, inst)| inst)
        .collect()
}

#[test]
fn straight_line_add_folds_register_reads() {
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let three = ir.imm32(3);
        ir.set_reg(reg(1), three).unwrap();
        let four = ir.imm32(4);
        ir.set_reg(reg(2), four).unwrap();
        let a = ir.get_reg(reg(1)).unwrap();
        let b = ir.get_reg(reg(2)).unwrap();
        let sum = ir.iadd(a.into(), b.into()).unwrap();
        ir.set_reg(reg(3), maxwell_shader::ir::emit::U32(sum.0)).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let mut program = program_from(func);
    ssa_rewrite_pass(&mut program).unwrap();
    verify_ssa(&program).unwrap();

    let func = program.entry_function().unwrap();
    assert!(find_insts(func, Opcode::Phi).is_empty());
    let adds = find_insts(func, Opcode::IAdd32);
    assert_eq!(adds.len(), 1);
    assert_eq!(
        func.inst(adds[0]).args(),
        &[Value::U32(3), Value::U32(4)]
    );
}

#[test]
fn if_then_else_merge_inserts_phi() {
    let mut func = Function::new();
    let b0 = func.make_block();
    let b1 = func.make_block();
    let b2 = func.make_block();
    let b3 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cond = ir.imm1(true);
        ir.branch_conditional(cond, b1, b2).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b1);
        let one = ir.imm32(1);
        ir.set_reg(reg(1), one).unwrap();
        ir.branch(b3).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b2);
        let two = ir.imm32(2);
        ir.set_reg(reg(1), two).unwrap();
        ir.branch(b3).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b3);
        let merged = ir.get_reg(reg(1)).unwrap();
        ir.set_reg(reg(4), merged).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let mut program = program_from(func);
    ssa_rewrite_pass(&mut program).unwrap();
    verify_ssa(&program).unwrap();

    let func = program.entry_function().unwrap();
    let first = func.block(b3).insts()[0];
    let phi = func.inst(first);
    assert_eq!(phi.opcode(), Opcode::Phi);
    assert_eq!(
        phi.phi_args(),
        &[(b1, Value::U32(1)), (b2, Value::U32(2))]
    );
}

#[test]
fn loop_carried_value_gets_header_phi() {
    let mut func = Function::new();
    let b0 = func.make_block();
    let b1 = func.make_block(); // header
    let b2 = func.make_block(); // body
    let b3 = func.make_block(); // exit
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let zero = ir.imm32(0);
        ir.set_reg(reg(1), zero).unwrap();
        ir.branch(b1).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b1);
        let cond = ir.imm1(true);
        ir.branch_conditional(cond, b2, b3).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b2);
        let counter = ir.get_reg(reg(1)).unwrap();
        let one = ir.imm32(1);
        let next = ir.iadd(counter.into(), one.into()).unwrap();
        ir.set_reg(reg(1), maxwell_shader::ir::emit::U32(next.0)).unwrap();
        ir.branch(b1).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b3);
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let mut program = program_from(func);
    ssa_rewrite_pass(&mut program).unwrap();
    verify_ssa(&program).unwrap();

    let func = program.entry_function().unwrap();
    let phis = find_insts(func, Opcode::Phi);
    assert_eq!(phis.len(), 1);
    let phi = phis[0];
    assert_eq!(func.block(b1).insts()[0], phi);

    let adds = find_insts(func, Opcode::IAdd32);
    assert_eq!(adds.len(), 1);
    let add = adds[0];
    assert_eq!(
        func.inst(phi).phi_args(),
        &[(b0, Value::U32(0)), (b2, Value::Inst(add))]
    );
    assert_eq!(
        func.inst(add).args(),
        &[Value::Inst(phi), Value::U32(1)]
    );
}

#[test]
fn same_value_diamond_collapses_phi() {
    let mut func = Function::new();
    let b0 = func.make_block();
    let b1 = func.make_block();
    let b2 = func.make_block();
    let b3 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cond = ir.imm1(false);
        ir.branch_conditional(cond, b1, b2).unwrap();
    }
    for arm in [b1, b2] {
        let mut ir = IREmitter::new(&mut func, arm);
        let seven = ir.imm32(7);
        ir.set_reg(reg(1), seven).unwrap();
        ir.branch(b3).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b3);
        let merged = ir.get_reg(reg(1)).unwrap();
        let five = ir.imm32(5);
        let sum = ir.iadd(merged.into(), five.into()).unwrap();
        ir.set_reg(reg(2), maxwell_shader::ir::emit::U32(sum.0)).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let mut program = program_from(func);
    ssa_rewrite_pass(&mut program).unwrap();
    verify_ssa(&program).unwrap();

    let func = program.entry_function().unwrap();
    assert!(find_insts(func, Opcode::Phi).is_empty());
    let adds = find_insts(func, Opcode::IAdd32);
    assert_eq!(adds.len(), 1);
    assert_eq!(
        func.inst(adds[0]).args(),
        &[Value::U32(7), Value::U32(5)]
    );
}

#[test]
fn reading_rz_and_pt_folds_before_the_pass() {
    let mut func = Function::new();
    let b0 = func.make_block();
    let mut ir = IREmitter::new(&mut func, b0);

    assert_eq!(ir.get_reg(Reg::RZ).unwrap().0, Value::U32(0));
    assert_eq!(ir.get_pred(Pred::PT, false).unwrap().0, Value::U1(true));
    assert_eq!(ir.get_pred(Pred::PT, true).unwrap().0, Value::U1(false));

    let value = ir.imm32(9);
    ir.set_reg(Reg::RZ, value).unwrap();
    let t = ir.imm1(true);
    ir.set_pred(Pred::PT, t).unwrap();
    drop(ir);

    // Neither the folded reads nor the dropped writes left any instruction.
    assert!(func.block(b0).insts().is_empty());
}

#[test]
fn entry_read_becomes_undef() {
    let mut func = Function::new();
    let b0 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let loaded = ir.get_reg(reg(1)).unwrap();
        ir.set_reg(reg(2), loaded).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let mut program = program_from(func);
    ssa_rewrite_pass(&mut program).unwrap();
    verify_ssa(&program).unwrap();

    let func = program.entry_function().unwrap();
    assert_eq!(find_insts(func, Opcode::UndefU32).len(), 1);
    assert!(find_insts(func, Opcode::Phi).is_empty());
}

#[test]
fn predicates_and_flags_merge_like_registers() {
    let mut func = Function::new();
    let b0 = func.make_block();
    let b1 = func.make_block();
    let b2 = func.make_block();
    let b3 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cond = ir.imm1(true);
        ir.branch_conditional(cond, b1, b2).unwrap();
    }
    for (arm, value) in [(b1, true), (b2, false)] {
        let mut ir = IREmitter::new(&mut func, arm);
        let imm = ir.imm1(value);
        ir.set_pred(Pred::new(0).unwrap(), imm).unwrap();
        ir.set_zflag(imm).unwrap();
        let word = ir.imm32(value as u32);
        ir.set_goto_variable(42, word).unwrap();
        ir.branch(b3).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b3);
        let pred = ir.get_pred(Pred::new(0).unwrap(), false).unwrap();
        let zflag = ir.get_zflag().unwrap();
        let anded = ir.logical_and(pred, zflag).unwrap();
        ir.set_pred(Pred::new(1).unwrap(), anded).unwrap();
        let goto = ir.get_goto_variable(42).unwrap();
        ir.set_reg(reg(5), goto).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let mut program = program_from(func);
    ssa_rewrite_pass(&mut program).unwrap();
    verify_ssa(&program).unwrap();

    // One phi per merged variable: P0, the zero flag and goto variable 42.
    let func = program.entry_function().unwrap();
    assert_eq!(find_insts(func, Opcode::Phi).len(), 3);
}

#[test]
fn ssa_rewrite_is_idempotent() {
    let mut func = Function::new();
    let b0 = func.make_block();
    let b1 = func.make_block();
    let b2 = func.make_block();
    let b3 = func.make_block();
    {
        let mut ir = IREmitter::new(&mut func, b0);
        let cond = ir.imm1(true);
        ir.branch_conditional(cond, b1, b2).unwrap();
    }
    for (arm, value) in [(b1, 1u32), (b2, 2u32)] {
        let mut ir = IREmitter::new(&mut func, arm);
        let imm = ir.imm32(value);
        ir.set_reg(reg(1), imm).unwrap();
        ir.branch(b3).unwrap();
    }
    {
        let mut ir = IREmitter::new(&mut func, b3);
        let merged = ir.get_reg(reg(1)).unwrap();
        ir.set_reg(reg(2), merged).unwrap();
        ir.return_().unwrap();
    }
    func.compute_post_order();
    let mut program = program_from(func);

    ssa_rewrite_pass(&mut program).unwrap();
    let first = dump_program(&program);
    ssa_rewrite_pass(&mut program).unwrap();
    let second = dump_program(&program);
    assert_eq!(first, second);
}
