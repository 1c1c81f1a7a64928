//! Structural validation of a program after the SSA rewrite.
//!
//! These checks mirror the invariants the backends rely on; they run in tests
//! and behind debug logging, never in the production pipeline hot path.

use std::collections::HashMap;

use thiserror::Error;

use crate::ir::block::BlockId;
use crate::ir::inst::InstId;
use crate::ir::opcode::Opcode;
use crate::ir::program::{Function, Program};
use crate::ir::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("{block} still contains virtual resource access {opcode:?} at {inst}")]
    ResourceOpRemains {
        block: BlockId,
        inst: InstId,
        opcode: Opcode,
    },
    #[error("{block} has a phi at {inst} outside the leading phi prefix")]
    PhiNotInPrefix { block: BlockId, inst: InstId },
    #[error("phi {inst} in {block} has {operands} operands but the block has {preds} predecessors")]
    PhiArityMismatch {
        block: BlockId,
        inst: InstId,
        operands: usize,
        preds: usize,
    },
    #[error("phi {inst} in {block} operand {index} names {got}, expected predecessor {want}")]
    PhiOperandOrder {
        block: BlockId,
        inst: InstId,
        index: usize,
        got: BlockId,
        want: BlockId,
    },
    #[error("phi {inst} in {block} is trivial after the rewrite")]
    TrivialPhi { block: BlockId, inst: InstId },
    #[error("{inst} records {recorded} uses but {actual} argument edges point at it")]
    UseCountMismatch {
        inst: InstId,
        recorded: u32,
        actual: u32,
    },
}

fn verify_function(func: &Function) -> Result<(), VerifyError> {
    let mut edge_counts: HashMap<InstId, u32> = HashMap::new();

    for block_id in func.block_ids() {
        let block = func.block(block_id);
        let mut seen_non_phi = false;
        for &inst_id in block.insts() {
            let inst = func.inst(inst_id);
            let opcode = inst.opcode();
            if opcode.is_virtual_resource_access() {
                return Err(VerifyError::ResourceOpRemains {
                    block: block_id,
                    inst: inst_id,
                    opcode,
                });
            }
            if inst.is_phi() {
                if seen_non_phi {
                    return Err(VerifyError::PhiNotInPrefix {
                        block: block_id,
                        inst: inst_id,
                    });
                }
                let preds = block.immediate_predecessors();
                if inst.phi_args().len() != preds.len() {
                    return Err(VerifyError::PhiArityMismatch {
                        block: block_id,
                        inst: inst_id,
                        operands: inst.phi_args().len(),
                        preds: preds.len(),
                    });
                }
                for (index, ((operand_block, _), &pred)) in
                    inst.phi_args().iter().zip(preds.iter()).enumerate()
                {
                    if *operand_block != pred {
                        return Err(VerifyError::PhiOperandOrder {
                            block: block_id,
                            inst: inst_id,
                            index,
                            got: *operand_block,
                            want: pred,
                        });
                    }
                }
                let mut distinct: Option<Value> = None;
                let mut merges_two = false;
                for (_, operand) in inst.phi_args() {
                    let operand = func.resolve(*operand);
                    if operand == Value::Inst(inst_id) {
                        continue;
                    }
                    match distinct {
                        Some(seen) if seen == operand => {}
                        Some(_) => merges_two = true,
                        None => distinct = Some(operand),
                    }
                }
                if !merges_two {
                    return Err(VerifyError::TrivialPhi {
                        block: block_id,
                        inst: inst_id,
                    });
                }
            } else {
                seen_non_phi = true;
            }
            let operands: Vec<Value> = if inst.is_phi() {
                inst.phi_args().iter().map(|(_, v)| *v).collect()
            } else {
                inst.args().to_vec()
            };
            for operand in operands {
                if let Value::Inst(target) = operand {
                    *edge_counts.entry(target).or_insert(0) += 1;
                }
            }
        }
    }

    for block_id in func.block_ids() {
        for &inst_id in func.block(block_id).insts() {
            let recorded = func.inst(inst_id).uses();
            let actual = edge_counts.get(&inst_id).copied().unwrap_or(0);
            if recorded != actual {
                return Err(VerifyError::UseCountMismatch {
                    inst: inst_id,
                    recorded,
                    actual,
                });
            }
        }
    }
    Ok(())
}

/// Checks every function of a post-SSA program.
pub fn verify_ssa(program: &Program) -> Result<(), VerifyError> {
    for func in &program.functions {
        verify_function(func)?;
    }
    Ok(())
}
