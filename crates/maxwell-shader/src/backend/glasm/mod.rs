//! Assembly-style backend: complete lowering of the post-SSA IR.

pub mod emit;
pub mod emit_alu;
pub mod emit_context;
pub mod emit_image;
pub mod reg_alloc;

pub use emit::emit_glasm;
pub use emit_context::EmitContext;
pub use reg_alloc::{RegAlloc, RegOrImm, Register, ScalarF32, ScalarS32, ScalarU32, ScopedRegister};
