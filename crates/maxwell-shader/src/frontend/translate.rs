//! Block-at-a-time translation driver.
//!
//! Control-flow recovery happens upstream: the caller hands over a list of
//! [`CfgBlock`] descriptors (instruction word ranges plus recovered edges)
//! and this driver translates each block's contents and lays down the
//! terminator the descriptor names. Branch words inside the range are
//! ignored; the descriptor is authoritative.

use crate::error::{Error, Result};
use crate::frontend::decode::decode;
use crate::frontend::visitor::TranslatorVisitor;
use crate::frontend::Environment;
use crate::ir::{BlockId, Condition, Function, IREmitter, Program, Stage};

/// Recovered terminator of a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CfgTerminator {
    /// The shader exits here.
    Exit,
    /// Unconditional jump to the block at the given index.
    Branch { target: usize },
    /// Two-way branch on a predicate/flow-test condition.
    BranchConditional {
        condition: Condition,
        true_target: usize,
        false_target: usize,
    },
}

/// One recovered basic block: the half-open instruction word range
/// `begin..end` plus its terminator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfgBlock {
    pub begin: u32,
    pub end: u32,
    pub terminator: CfgTerminator,
}

fn block_at(blocks: &[BlockId], index: usize) -> Result<BlockId> {
    blocks.get(index).copied().ok_or_else(|| {
        Error::invalid_argument(format!("branch target {index} out of range"))
    })
}

/// Translates a recovered control-flow graph into an IR program.
pub fn translate_program(
    env: &impl Environment,
    cfg: &[CfgBlock],
    stage: Stage,
) -> Result<Program> {
    if cfg.is_empty() {
        return Err(Error::invalid_argument("program has no blocks"));
    }
    let mut func = Function::new();
    let blocks: Vec<BlockId> = cfg.iter().map(|_| func.make_block()).collect();

    for (desc, &block) in cfg.iter().zip(&blocks) {
        let mut visitor = TranslatorVisitor {
            ir: IREmitter::new(&mut func, block),
        };
        for word_index in desc.begin..desc.end {
            let insn = env.read_instruction(word_index);
            let opcode = decode(insn, word_index)?;
            visitor.visit(opcode, insn, word_index)?;
        }
        match desc.terminator {
            CfgTerminator::Exit => visitor.ir.return_()?,
            CfgTerminator::Branch { target } => {
                let target = block_at(&blocks, target)?;
                visitor.ir.branch(target)?;
            }
            CfgTerminator::BranchConditional {
                condition,
                true_target,
                false_target,
            } => {
                let true_target = block_at(&blocks, true_target)?;
                let false_target = block_at(&blocks, false_target)?;
                let cond = visitor.ir.condition(condition)?;
                visitor.ir.branch_conditional(cond, true_target, false_target)?;
            }
        }
    }

    func.compute_post_order();
    let mut program = Program::new(stage);
    program.info.workgroup_size = env.workgroup_size();
    program.functions.push(func);
    tracing::debug!(
        blocks = cfg.len(),
        insts = program.functions[0].num_insts(),
        "translated shader program"
    );
    Ok(program)
}
