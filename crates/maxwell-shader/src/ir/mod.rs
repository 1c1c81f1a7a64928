//! Typed, block-structured, SSA-form intermediate representation.

pub mod attribute;
pub mod block;
pub mod condition;
pub mod emit;
pub mod inst;
pub mod modifiers;
pub mod opcode;
pub mod program;
pub mod reg;
pub mod types;
pub mod value;
pub mod verify;

pub use attribute::Attribute;
pub use block::{Block, BlockId};
pub use condition::{Condition, FlowTest};
pub use emit::IREmitter;
pub use inst::{Inst, InstId};
pub use modifiers::{FmzMode, FpControl, FpRounding, InstFlags, TextureInstInfo, TextureType};
pub use opcode::{FlagsKind, Opcode, PseudoOp};
pub use program::{dump_program, Function, Info, Program, Stage, TextureDescriptor};
pub use reg::{Pred, Reg, NUM_USER_PREDS, NUM_USER_REGS};
pub use types::Type;
pub use value::Value;
pub use verify::{verify_ssa, VerifyError};
