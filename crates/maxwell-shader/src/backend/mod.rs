//! Backend emitters lowering the IR to textual shading languages.

pub mod glasm;
pub mod glsl;

use crate::error::Result;
use crate::ir::Program;
use crate::profile::Profile;

/// Which textual target to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Assembly-style target; the complete backend.
    #[default]
    Glasm,
    /// High-level textual target.
    Glsl,
}

pub fn emit(kind: BackendKind, program: &Program, profile: &Profile) -> Result<String> {
    match kind {
        BackendKind::Glasm => glasm::emit_glasm(program, profile),
        BackendKind::Glsl => glsl::emit_glsl(program, profile),
    }
}
