//! Maxwell-class GPU shader recompiler.
//!
//! A linear, per-shader pipeline: binary instruction words are translated
//! into a typed SSA-form IR, rewritten by the optimizer, and lowered to one
//! of two textual target languages for the host driver. Each compile owns
//! its arenas and emit state exclusively; there is no process-wide state, so
//! independent shaders can be recompiled on separate threads.

pub mod backend;
pub mod error;
pub mod frontend;
pub mod ir;
pub mod opt;
pub mod profile;
pub mod translate;

pub use backend::BackendKind;
pub use error::{Error, Result};
pub use frontend::{BytesEnvironment, CfgBlock, CfgTerminator, Environment};
pub use ir::{dump_program, verify_ssa, Program, Stage};
pub use profile::{GenericInputType, Profile};
pub use translate::{CacheLookupSource, CachedShader, RecompiledShader, ShaderCache, recompile};
