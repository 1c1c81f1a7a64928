//! SSA construction over the naive resource reads and writes the translator
//! emits.
//!
//! This pass implements the algorithm proposed in
//!
//!     Simple and Efficient Construction of Static Single Assignment Form.
//!     Braun M., Buchwald S., Hack S., Leiba R., Mallon C., Zwinkau A. (2013)
//!     Compiler Construction. CC 2013.
//!
//! `read_variable` is deliberately iterative: the recursion over predecessor
//! chains in the paper overflows the thread stack on real shaders, so the
//! traversal runs on an explicit stack of [`ReadState`] frames instead. Do
//! not rewrite it recursively.
//!
//! After rewriting, register/predicate/flag/goto accesses are gone from every
//! block: writes are folded into the definition table and dropped, reads are
//! rerouted to their reaching definitions, and the husks are swept from the
//! block lists (their arena slots stay live so stale values keep resolving).

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::ir::{
    BlockId, Function, InstId, Opcode, Pred, Program, Reg, Value, NUM_USER_PREDS, NUM_USER_REGS,
};

/// SSA variable key: every virtual resource the translator reads or writes.
/// `RZ` and `PT` are folded to constants during translation and never appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Variable {
    Reg(Reg),
    Pred(Pred),
    ZeroFlag,
    SignFlag,
    CarryFlag,
    OverflowFlag,
    Goto(u32),
    IndirectBranch,
}

impl Variable {
    fn undef_opcode(self) -> Opcode {
        match self {
            Variable::Reg(_) | Variable::Goto(_) | Variable::IndirectBranch => Opcode::UndefU32,
            Variable::Pred(_)
            | Variable::ZeroFlag
            | Variable::SignFlag
            | Variable::CarryFlag
            | Variable::OverflowFlag => Opcode::UndefU1,
        }
    }
}

type ValueMap = HashMap<BlockId, Value>;

/// Per-variable reaching definitions. Registers and predicates use dense
/// arrays; the goto space is sparse and keyed by label id in an ordered map.
#[derive(Default)]
struct DefTable {
    regs: Vec<ValueMap>,
    preds: Vec<ValueMap>,
    goto_vars: BTreeMap<u32, ValueMap>,
    indirect_branch_var: ValueMap,
    zero_flag: ValueMap,
    sign_flag: ValueMap,
    carry_flag: ValueMap,
    overflow_flag: ValueMap,
}

impl DefTable {
    fn get(&mut self, variable: Variable) -> &mut ValueMap {
        match variable {
            Variable::Reg(reg) => {
                if self.regs.is_empty() {
                    self.regs.resize_with(NUM_USER_REGS, ValueMap::default);
                }
                &mut self.regs[reg.index()]
            }
            Variable::Pred(pred) => {
                if self.preds.is_empty() {
                    self.preds.resize_with(NUM_USER_PREDS, ValueMap::default);
                }
                &mut self.preds[pred.index()]
            }
            Variable::Goto(id) => self.goto_vars.entry(id).or_default(),
            Variable::IndirectBranch => &mut self.indirect_branch_var,
            Variable::ZeroFlag => &mut self.zero_flag,
            Variable::SignFlag => &mut self.sign_flag,
            Variable::CarryFlag => &mut self.carry_flag,
            Variable::OverflowFlag => &mut self.overflow_flag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Start,
    SetValue,
    PreparePhiArgument,
    PushPhiArgument,
}

/// One frame of the iterative `read_variable` traversal.
struct ReadState {
    block: BlockId,
    result: Value,
    phi: Option<InstId>,
    pred_index: usize,
    pc: Status,
}

impl ReadState {
    fn new(block: BlockId) -> ReadState {
        ReadState {
            block,
            result: Value::Empty,
            phi: None,
            pred_index: 0,
            pc: Status::Start,
        }
    }
}

#[derive(Default)]
struct Pass {
    sealed_blocks: HashSet<BlockId>,
    incomplete_phis: HashMap<BlockId, BTreeMap<Variable, InstId>>,
    current_def: DefTable,
}

impl Pass {
    fn write_variable(&mut self, variable: Variable, block: BlockId, value: Value) {
        self.current_def.get(variable).insert(block, value);
    }

    fn read_variable(
        &mut self,
        func: &mut Function,
        variable: Variable,
        root_block: BlockId,
    ) -> Result<Value> {
        // Frame 0 is a sentinel receiving the final result.
        let mut stack = vec![ReadState::new(root_block), ReadState::new(root_block)];
        while stack.len() > 1 {
            let frame = stack.len() - 1;
            let block = stack[frame].block;
            match stack[frame].pc {
                Status::Start => {
                    if let Some(&value) = self.current_def.get(variable).get(&block) {
                        stack[frame].result = value;
                        stack[frame].pc = Status::SetValue;
                    } else if !self.sealed_blocks.contains(&block) {
                        // Incomplete CFG: leave an operandless phi to be
                        // filled when the block seals.
                        let phi = func.prepend_new_phi(block);
                        self.incomplete_phis
                            .entry(block)
                            .or_default()
                            .insert(variable, phi);
                        stack[frame].result = Value::Inst(phi);
                        stack[frame].pc = Status::SetValue;
                    } else if func.block(block).immediate_predecessors().len() == 1 {
                        // One predecessor: no phi needed.
                        let pred = func.block(block).immediate_predecessors()[0];
                        stack[frame].pc = Status::SetValue;
                        stack.push(ReadState::new(pred));
                    } else {
                        // Break potential cycles with an operandless phi
                        // recorded as the definition before operands are
                        // gathered.
                        let phi = func.prepend_new_phi(block);
                        self.write_variable(variable, block, Value::Inst(phi));
                        stack[frame].phi = Some(phi);
                        stack[frame].pred_index = 0;
                        stack[frame].pc = Status::PreparePhiArgument;
                    }
                }
                Status::SetValue => {
                    let result = stack[frame].result;
                    self.write_variable(variable, block, result);
                    stack.pop();
                    let parent = stack.len() - 1;
                    stack[parent].result = result;
                }
                Status::PushPhiArgument => {
                    let phi = stack[frame]
                        .phi
                        .ok_or_else(|| Error::logic("phi frame without a phi"))?;
                    let pred = func.block(block).immediate_predecessors()[stack[frame].pred_index];
                    func.add_phi_operand(phi, pred, stack[frame].result)?;
                    stack[frame].pred_index += 1;
                    stack[frame].pc = Status::PreparePhiArgument;
                }
                Status::PreparePhiArgument => {
                    let num_preds = func.block(block).immediate_predecessors().len();
                    if stack[frame].pred_index == num_preds {
                        let phi = stack[frame]
                            .phi
                            .ok_or_else(|| Error::logic("phi frame without a phi"))?;
                        let result =
                            try_remove_trivial_phi(func, phi, block, variable.undef_opcode())?;
                        stack.pop();
                        let parent = stack.len() - 1;
                        stack[parent].result = result;
                        self.write_variable(variable, block, result);
                    } else {
                        let pred =
                            func.block(block).immediate_predecessors()[stack[frame].pred_index];
                        stack[frame].pc = Status::PushPhiArgument;
                        stack.push(ReadState::new(pred));
                    }
                }
            }
        }
        Ok(stack[0].result)
    }

    /// Marks a block's predecessor list final and completes the phis parked
    /// on it while it was open.
    fn seal_block(&mut self, func: &mut Function, block: BlockId) -> Result<()> {
        if let Some(incomplete) = self.incomplete_phis.remove(&block) {
            for (variable, phi) in incomplete {
                self.add_phi_operands(func, variable, phi, block)?;
            }
        }
        self.sealed_blocks.insert(block);
        Ok(())
    }

    fn add_phi_operands(
        &mut self,
        func: &mut Function,
        variable: Variable,
        phi: InstId,
        block: BlockId,
    ) -> Result<Value> {
        let preds: Vec<BlockId> = func.block(block).immediate_predecessors().to_vec();
        for pred in preds {
            let value = self.read_variable(func, variable, pred)?;
            func.add_phi_operand(phi, pred, value)?;
        }
        try_remove_trivial_phi(func, phi, block, variable.undef_opcode())
    }

    fn visit_inst(&mut self, func: &mut Function, block: BlockId, inst_id: InstId) -> Result<()> {
        match func.inst(inst_id).opcode() {
            Opcode::SetRegister => {
                let reg = func.inst(inst_id).arg(0).reg()?;
                if !reg.is_rz() {
                    let value = func.inst(inst_id).arg(1);
                    self.write_variable(Variable::Reg(reg), block, value);
                }
                func.invalidate(inst_id);
            }
            Opcode::SetPred => {
                let pred = func.inst(inst_id).arg(0).pred()?;
                if !pred.is_pt() {
                    let value = func.inst(inst_id).arg(1);
                    self.write_variable(Variable::Pred(pred), block, value);
                }
                func.invalidate(inst_id);
            }
            Opcode::SetGotoVariable => {
                let id = func.inst(inst_id).arg(0).u32()?;
                let value = func.inst(inst_id).arg(1);
                self.write_variable(Variable::Goto(id), block, value);
                func.invalidate(inst_id);
            }
            Opcode::SetIndirectBranchVariable => {
                let value = func.inst(inst_id).arg(0);
                self.write_variable(Variable::IndirectBranch, block, value);
                func.invalidate(inst_id);
            }
            Opcode::SetZFlag => {
                let value = func.inst(inst_id).arg(0);
                self.write_variable(Variable::ZeroFlag, block, value);
                func.invalidate(inst_id);
            }
            Opcode::SetSFlag => {
                let value = func.inst(inst_id).arg(0);
                self.write_variable(Variable::SignFlag, block, value);
                func.invalidate(inst_id);
            }
            Opcode::SetCFlag => {
                let value = func.inst(inst_id).arg(0);
                self.write_variable(Variable::CarryFlag, block, value);
                func.invalidate(inst_id);
            }
            Opcode::SetOFlag => {
                let value = func.inst(inst_id).arg(0);
                self.write_variable(Variable::OverflowFlag, block, value);
                func.invalidate(inst_id);
            }
            Opcode::GetRegister => {
                let reg = func.inst(inst_id).arg(0).reg()?;
                if !reg.is_rz() {
                    let value = self.read_variable(func, Variable::Reg(reg), block)?;
                    func.replace_uses_with(inst_id, value)?;
                }
            }
            Opcode::GetPred => {
                let pred = func.inst(inst_id).arg(0).pred()?;
                if !pred.is_pt() {
                    let value = self.read_variable(func, Variable::Pred(pred), block)?;
                    func.replace_uses_with(inst_id, value)?;
                }
            }
            Opcode::GetGotoVariable => {
                let id = func.inst(inst_id).arg(0).u32()?;
                let value = self.read_variable(func, Variable::Goto(id), block)?;
                func.replace_uses_with(inst_id, value)?;
            }
            Opcode::GetIndirectBranchVariable => {
                let value = self.read_variable(func, Variable::IndirectBranch, block)?;
                func.replace_uses_with(inst_id, value)?;
            }
            Opcode::GetZFlag => {
                let value = self.read_variable(func, Variable::ZeroFlag, block)?;
                func.replace_uses_with(inst_id, value)?;
            }
            Opcode::GetSFlag => {
                let value = self.read_variable(func, Variable::SignFlag, block)?;
                func.replace_uses_with(inst_id, value)?;
            }
            Opcode::GetCFlag => {
                let value = self.read_variable(func, Variable::CarryFlag, block)?;
                func.replace_uses_with(inst_id, value)?;
            }
            Opcode::GetOFlag => {
                let value = self.read_variable(func, Variable::OverflowFlag, block)?;
                func.replace_uses_with(inst_id, value)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// A phi with at most one distinct operand (ignoring self references) folds
/// to that operand; an operandless or self-only phi folds to a fresh undef
/// inserted after the block's phi prefix.
fn try_remove_trivial_phi(
    func: &mut Function,
    phi: InstId,
    block: BlockId,
    undef_opcode: Opcode,
) -> Result<Value> {
    let mut same = Value::Empty;
    let operands: Vec<Value> = func
        .inst(phi)
        .phi_args()
        .iter()
        .map(|(_, value)| *value)
        .collect();
    for operand in operands {
        let resolved = func.resolve(operand);
        if resolved == func.resolve(same) || resolved == Value::Inst(phi) {
            // Unique value or self reference.
            continue;
        }
        if !same.is_empty() {
            // The phi merges at least two values: not trivial.
            return Ok(Value::Inst(phi));
        }
        same = operand;
    }
    if same.is_empty() {
        // The phi is unreachable or in the start block. Take it out of the
        // prefix, materialize an undef at the first non-phi position, and
        // put the (about to become identity) phi back after the undef.
        func.unlink_from_block(block, phi);
        let first_non_phi = func
            .block(block)
            .insts()
            .iter()
            .position(|&id| !func.inst(id).is_phi())
            .unwrap_or(func.block(block).insts().len());
        let undef = func.insert_new_at(block, first_non_phi, undef_opcode)?;
        func.relink_at(block, first_non_phi + 1, phi);
        same = Value::Inst(undef);
    }
    // Reroute all uses of the phi and fold it to an identity.
    func.replace_uses_with(phi, same)?;
    Ok(same)
}

fn rewrite_function(func: &mut Function) -> Result<()> {
    func.compute_post_order();
    let mut pass = Pass::default();
    let layout: Vec<BlockId> = func.post_order().iter().rev().copied().collect();

    // A block may only seal once every predecessor has been filled; sealing
    // a loop header before its latch is filled would resolve the header's
    // phis against stale placeholder definitions. In reverse post order this
    // coincides with seal-after-visit everywhere except across back edges.
    let mut filled = vec![false; func.num_blocks()];
    fn seal_if_ready(
        pass: &mut Pass,
        func: &mut Function,
        filled: &[bool],
        block: BlockId,
    ) -> Result<()> {
        if pass.sealed_blocks.contains(&block) {
            return Ok(());
        }
        if func
            .block(block)
            .immediate_predecessors()
            .iter()
            .all(|pred| filled[pred.index()])
        {
            pass.seal_block(func, block)?;
        }
        Ok(())
    }

    for &block in &layout {
        seal_if_ready(&mut pass, func, &filled, block)?;
        let snapshot: Vec<InstId> = func.block(block).insts().to_vec();
        for inst in snapshot {
            pass.visit_inst(func, block, inst)?;
        }
        filled[block.index()] = true;
        seal_if_ready(&mut pass, func, &filled, block)?;
        let succs: Vec<BlockId> = func.block(block).successors().to_vec();
        for succ in succs {
            seal_if_ready(&mut pass, func, &filled, succ)?;
        }
    }

    // Sweep the husks: invalidated writes and identity-folded reads/phis stay
    // in the arena but leave the block lists.
    for block in func.block_ids() {
        let keep: Vec<InstId> = func
            .block(block)
            .insts()
            .iter()
            .copied()
            .filter(|&id| {
                let opcode = func.inst(id).opcode();
                opcode != Opcode::Void && opcode != Opcode::Identity
            })
            .collect();
        func.block_mut(block).insts = keep;
    }
    Ok(())
}

/// Rewrites every function of `program` into pure SSA form.
pub fn ssa_rewrite_pass(program: &mut Program) -> Result<()> {
    for func in &mut program.functions {
        rewrite_function(func)?;
    }
    Ok(())
}
