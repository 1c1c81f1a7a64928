//! Optimization passes run between translation and backend emission.

pub mod collect_info;
pub mod dead_code;
pub mod ssa_rewrite;

pub use collect_info::collect_info_pass;
pub use dead_code::dead_code_elimination_pass;
pub use ssa_rewrite::ssa_rewrite_pass;

use crate::error::Result;
use crate::ir::Program;

/// Standard pass pipeline: SSA construction, dead code removal, then the
/// resource summary.
pub fn run_passes(program: &mut Program) -> Result<()> {
    ssa_rewrite_pass(program)?;
    dead_code_elimination_pass(program)?;
    collect_info_pass(program)?;
    Ok(())
}
