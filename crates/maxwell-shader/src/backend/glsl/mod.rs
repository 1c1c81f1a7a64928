//! High-level textual backend: expression core plus typed register naming.

pub mod emit;
pub mod reg_alloc;

pub use emit::emit_glsl;
pub use reg_alloc::{GlslType, Id, RegAlloc};
