use core::cell::RefCell;

use crate::error::{Error, Result};
use crate::ir::{Function, InstId, Program, Stage, TextureInstInfo, TextureType, Value};
use crate::backend::glasm::reg_alloc::{RegAlloc, RegOrImm, Register, ScalarF32, ScalarS32, ScalarU32};
use crate::profile::Profile;

/// Shared state of one assembly-style emission.
///
/// The code buffer is interior-mutable so emit functions, drop guards and the
/// register allocator can all work through shared references.
pub struct EmitContext<'a> {
    pub func: &'a Function,
    pub stage: Stage,
    pub profile: &'a Profile,
    pub reg_alloc: RegAlloc,
    /// Host binding slot per texture descriptor index.
    texture_bindings: Vec<Option<u32>>,
    texture_buffer_bindings: Vec<Option<u32>>,
    code: RefCell<String>,
}

impl<'a> EmitContext<'a> {
    pub fn new(program: &'a Program, profile: &'a Profile) -> Result<EmitContext<'a>> {
        let func = program.entry_function()?;
        let mut texture_bindings = Vec::new();
        for (slot, descriptor) in program.info.texture_descriptors.iter().enumerate() {
            let index = descriptor.descriptor_index as usize;
            if texture_bindings.len() <= index {
                texture_bindings.resize(index + 1, None);
            }
            texture_bindings[index] = Some(slot as u32);
        }
        let mut texture_buffer_bindings = Vec::new();
        for (slot, descriptor) in program.info.texture_buffer_descriptors.iter().enumerate() {
            let index = descriptor.descriptor_index as usize;
            if texture_buffer_bindings.len() <= index {
                texture_buffer_bindings.resize(index + 1, None);
            }
            texture_buffer_bindings[index] = Some(slot as u32);
        }
        Ok(EmitContext {
            func,
            stage: program.stage,
            profile,
            reg_alloc: RegAlloc::new(),
            texture_bindings,
            texture_buffer_bindings,
            code: RefCell::new(String::new()),
        })
    }

    /// Appends one `;`-terminated statement line.
    pub fn add(&self, stmt: &str) {
        let mut code = self.code.borrow_mut();
        code.push_str(stmt);
        code.push('\n');
    }

    pub fn take_code(&self) -> String {
        core::mem::take(&mut self.code.borrow_mut())
    }

    /// Resolves a texture descriptor index through the binding table built
    /// from the program info.
    pub fn texture_binding(&self, info: TextureInstInfo) -> Result<u32> {
        let table = if info.texture_type == TextureType::Buffer {
            &self.texture_buffer_bindings
        } else {
            &self.texture_bindings
        };
        table
            .get(info.descriptor_index as usize)
            .copied()
            .flatten()
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "texture descriptor index {} has no binding",
                    info.descriptor_index
                ))
            })
    }

    pub fn consume(&self, value: Value) -> Result<RegOrImm> {
        self.reg_alloc.consume(self.func, value)
    }

    pub fn consume_u32(&self, value: Value) -> Result<ScalarU32> {
        Ok(ScalarU32(self.consume(value)?))
    }

    pub fn consume_s32(&self, value: Value) -> Result<ScalarS32> {
        Ok(ScalarS32(self.consume(value)?))
    }

    pub fn consume_f32(&self, value: Value) -> Result<ScalarF32> {
        Ok(ScalarF32(self.consume(value)?))
    }

    /// Consumes an operand that must live in a register (vector operands).
    pub fn consume_register(&self, value: Value) -> Result<Register> {
        self.consume(value)?.register()
    }

    pub fn define(&self, inst: InstId) -> Result<Register> {
        self.reg_alloc.define(self.func, inst)
    }

    /// Retires a consumed pseudo-operation: its operand uses go through the
    /// allocator (freeing registers on last use) and the instruction is
    /// hidden so it cannot be emitted twice.
    pub fn retire_pseudo(&self, pseudo: InstId) -> Result<()> {
        let args: Vec<Value> = self.func.inst(pseudo).args().to_vec();
        for arg in args {
            if self.func.resolve(arg).inst().is_some() {
                self.consume(arg)?;
            }
        }
        self.func.discard(pseudo);
        Ok(())
    }
}
