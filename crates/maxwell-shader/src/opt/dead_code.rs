//! Dead code elimination.
//!
//! Removes pure instructions (including φ-nodes) whose results are never
//! used, releasing their operand uses. Runs to a fixpoint because releasing
//! an operand can make its producer dead, and φ cycles can keep each other
//! alive for one round.

use crate::error::Result;
use crate::ir::{InstId, Opcode, Program};

pub fn dead_code_elimination_pass(program: &mut Program) -> Result<()> {
    for func in &mut program.functions {
        loop {
            let mut changed = false;
            // Post order visits loop bodies before their headers, killing
            // most chains in one round.
            let order: Vec<_> = func.post_order().to_vec();
            for &block in &order {
                let snapshot: Vec<InstId> = func.block(block).insts().to_vec();
                for &inst_id in snapshot.iter().rev() {
                    let inst = func.inst(inst_id);
                    let opcode = inst.opcode();
                    if opcode == Opcode::Void || opcode.has_side_effects() {
                        continue;
                    }
                    if !inst.has_uses() {
                        func.invalidate(inst_id);
                        changed = true;
                    }
                }
                let keep: Vec<InstId> = func
                    .block(block)
                    .insts()
                    .iter()
                    .copied()
                    .filter(|&id| func.inst(id).opcode() != Opcode::Void)
                    .collect();
                func.block_mut(block).insts = keep;
            }
            if !changed {
                break;
            }
        }
    }
    Ok(())
}
