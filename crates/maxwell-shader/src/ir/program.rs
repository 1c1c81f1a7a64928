use core::fmt;
use core::fmt::Write as _;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::ir::block::{Block, BlockId};
use crate::ir::inst::{Inst, InstId};
use crate::ir::modifiers::{InstFlags, TextureType};
use crate::ir::opcode::{FlagsKind, Opcode};
use crate::ir::types::Type;
use crate::ir::value::Value;

/// Shader pipeline stage of a translated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
    Compute,
}

/// A function: an instruction arena plus the blocks that order it.
///
/// Arena slots are stable for the lifetime of the function. Invalidated and
/// identity-folded instructions stay in the arena (their ids remain valid for
/// value comparisons) even after they are unlinked from every block.
pub struct Function {
    insts: Vec<Inst>,
    blocks: Vec<Block>,
    entry: Option<BlockId>,
    post_order: Vec<BlockId>,
}

impl Default for Function {
    fn default() -> Self {
        Self::new()
    }
}

impl Function {
    pub fn new() -> Function {
        Function {
            insts: Vec::new(),
            blocks: Vec::new(),
            entry: None,
            post_order: Vec::new(),
        }
    }

    pub fn make_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(Block::default());
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId::new)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    pub(crate) fn inst_mut(&mut self, id: InstId) -> &mut Inst {
        &mut self.insts[id.index()]
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Follows identity aliases to the value an operand actually names.
    pub fn resolve(&self, value: Value) -> Value {
        let mut value = value;
        while let Value::Inst(id) = value {
            let inst = self.inst(id);
            if inst.opcode() != Opcode::Identity {
                break;
            }
            value = inst.args[0];
        }
        value
    }

    /// Type of a value. φ-nodes report the type of their first non-self
    /// operand, `Opaque` while operandless.
    pub fn type_of(&self, value: Value) -> Type {
        let value = self.resolve(value);
        match value {
            Value::Inst(id) => {
                let inst = self.inst(id);
                match inst.opcode() {
                    Opcode::Phi => inst.phi_type.get().unwrap_or(Type::Opaque),
                    opcode => opcode.result_type(),
                }
            }
            other => other.immediate_type().unwrap_or(Type::Void),
        }
    }

    fn block_has_terminator(&self, block: BlockId) -> bool {
        self.block(block)
            .insts
            .last()
            .map(|&id| self.inst(id).opcode().is_terminator())
            .unwrap_or(false)
    }

    fn check_args(&self, opcode: Opcode, args: &[Value]) -> Result<()> {
        let expected = opcode.arg_types();
        if args.len() != expected.len() {
            return Err(Error::invalid_argument(format!(
                "{opcode} expects {} operands, got {}",
                expected.len(),
                args.len()
            )));
        }
        for (index, (&want, &arg)) in expected.iter().zip(args.iter()).enumerate() {
            let got = self.type_of(arg);
            if !want.accepts(got) {
                return Err(Error::invalid_argument(format!(
                    "{opcode} operand {index} expects {want}, got {got}"
                )));
            }
        }
        Ok(())
    }

    fn link_new_inst(&mut self, opcode: Opcode, args: &[Value], flags: InstFlags) -> Result<InstId> {
        match (opcode.flags_kind(), &flags) {
            (FlagsKind::None, InstFlags::None)
            | (FlagsKind::Fp, InstFlags::Fp(_))
            | (FlagsKind::Fp, InstFlags::None)
            | (FlagsKind::Texture, InstFlags::Texture(_)) => {}
            _ => {
                return Err(Error::invalid_argument(format!(
                    "{opcode} carries the wrong flags payload"
                )))
            }
        }
        self.check_args(opcode, args)?;

        let id = InstId::new(self.insts.len());
        let mut inst = Inst::new(opcode, flags);
        for &arg in args {
            let arg = self.resolve(arg);
            inst.args.push(arg);
        }
        self.insts.push(inst);
        for index in 0..self.inst(id).args.len() {
            if let Value::Inst(target) = self.inst(id).args[index] {
                self.inst(target).add_use();
                self.inst_mut(target).users.push(id);
            }
        }

        if let Some(kind) = opcode.pseudo_op() {
            let producer = self.inst(id).args[0].inst().ok_or_else(|| {
                Error::invalid_argument(format!("{opcode} applied to a non-instruction value"))
            })?;
            self.inst_mut(producer).assoc[kind as usize] = Some(id);
        }
        Ok(id)
    }

    /// Appends a new instruction to `block`, enforcing operand types and the
    /// single-terminator invariant.
    pub fn append(
        &mut self,
        block: BlockId,
        opcode: Opcode,
        args: &[Value],
        flags: InstFlags,
    ) -> Result<InstId> {
        if opcode.is_phi() {
            return Err(Error::invalid_argument(
                "phi nodes are created with prepend_new_phi",
            ));
        }
        if self.block_has_terminator(block) {
            return Err(Error::invalid_argument(format!(
                "appending {opcode} after the terminator of {block}"
            )));
        }
        let id = self.link_new_inst(opcode, args, flags)?;
        self.block_mut(block).insts.push(id);
        Ok(id)
    }

    /// Creates an operandless φ at the start of `block`.
    pub fn prepend_new_phi(&mut self, block: BlockId) -> InstId {
        let id = InstId::new(self.insts.len());
        self.insts.push(Inst::new(Opcode::Phi, InstFlags::None));
        self.block_mut(block).insts.insert(0, id);
        id
    }

    /// Inserts a new argumentless instruction at `position` within `block`.
    /// Used by the SSA rewrite to materialize undefs after the φ prefix.
    pub(crate) fn insert_new_at(
        &mut self,
        block: BlockId,
        position: usize,
        opcode: Opcode,
    ) -> Result<InstId> {
        let id = self.link_new_inst(opcode, &[], InstFlags::None)?;
        self.block_mut(block).insts.insert(position, id);
        Ok(id)
    }

    pub(crate) fn unlink_from_block(&mut self, block: BlockId, inst: InstId) {
        self.block_mut(block).insts.retain(|&id| id != inst);
    }

    pub(crate) fn relink_at(&mut self, block: BlockId, position: usize, inst: InstId) {
        self.block_mut(block).insts.insert(position, inst);
    }

    /// Adds a φ operand for `pred`. The value is resolved before being
    /// stored so alias chains never accumulate inside live argument lists.
    pub fn add_phi_operand(&mut self, phi: InstId, pred: BlockId, value: Value) -> Result<()> {
        if !self.inst(phi).is_phi() {
            return Err(Error::logic(format!("{phi} is not a phi node")));
        }
        let value = self.resolve(value);
        if let Value::Inst(target) = value {
            self.inst(target).add_use();
            self.inst_mut(target).users.push(phi);
        }
        let ty = self.type_of(value);
        let inst = self.inst_mut(phi);
        inst.phi_args.push((pred, value));
        if inst.phi_type.get().is_none() && ty != Type::Opaque && ty != Type::Void {
            inst.phi_type.set(Some(ty));
        }
        Ok(())
    }

    /// Rewrites every referring argument of `id` to `replacement`, moving the
    /// use edges over, then folds `id` to an identity alias of the
    /// replacement so stale values still resolve.
    pub fn replace_uses_with(&mut self, id: InstId, replacement: Value) -> Result<()> {
        let replacement = self.resolve(replacement);
        if replacement == Value::Inst(id) {
            return Err(Error::logic(format!("{id} cannot replace itself")));
        }

        let users = core::mem::take(&mut self.inst_mut(id).users);
        let mut unique: SmallVec<[InstId; 8]> = SmallVec::new();
        for user in users {
            if !unique.contains(&user) {
                unique.push(user);
            }
        }
        for user in unique {
            let opcode = self.inst(user).opcode();
            if opcode == Opcode::Void || opcode == Opcode::Identity {
                // Dead or folded users keep stale storage; nothing to rewire.
                continue;
            }
            let mut rewritten = 0usize;
            {
                let inst = self.inst_mut(user);
                for arg in inst.args.iter_mut() {
                    if *arg == Value::Inst(id) {
                        *arg = replacement;
                        rewritten += 1;
                    }
                }
                for (_, arg) in inst.phi_args.iter_mut() {
                    if *arg == Value::Inst(id) {
                        *arg = replacement;
                        rewritten += 1;
                    }
                }
            }
            if let Value::Inst(target) = replacement {
                for _ in 0..rewritten {
                    self.inst(target).add_use();
                    self.inst_mut(target).users.push(user);
                }
            }
        }
        self.inst(id).uses.set(0);

        self.clear_operands(id);
        let inst = self.inst_mut(id);
        inst.opcode.set(Opcode::Identity);
        inst.args.clear();
        // The alias argument is metadata for `resolve`, not a counted use.
        inst.args.push(replacement);
        Ok(())
    }

    fn clear_operands(&mut self, id: InstId) {
        let args = core::mem::take(&mut self.inst_mut(id).args);
        let phi_args = core::mem::take(&mut self.inst_mut(id).phi_args);
        for arg in args.iter().chain(phi_args.iter().map(|(_, v)| v)) {
            if let Value::Inst(target) = arg {
                self.inst(*target).remove_use();
                let user_list = &mut self.inst_mut(*target).users;
                if let Some(pos) = user_list.iter().position(|&u| u == id) {
                    user_list.swap_remove(pos);
                }
            }
        }
    }

    /// Invalidates an instruction: operand uses are released and the opcode
    /// becomes `Void`. Idempotent. Works through a shared reference so
    /// backends can retire consumed pseudo-operations mid-walk; the argument
    /// storage is abandoned in place and hidden by the `Void` opcode.
    pub fn invalidate(&self, id: InstId) {
        let inst = self.inst(id);
        if inst.opcode() == Opcode::Void {
            return;
        }
        if inst.opcode() == Opcode::Identity {
            // Identity aliases hold an uncounted argument; just hide them.
            inst.opcode.set(Opcode::Void);
            inst.uses.set(0);
            return;
        }
        for arg in inst.args.iter().chain(inst.phi_args.iter().map(|(_, v)| v)) {
            if let Value::Inst(target) = arg {
                self.inst(*target).remove_use();
            }
        }
        inst.opcode.set(Opcode::Void);
        inst.uses.set(0);
    }

    /// Hides an instruction without touching any use counts. Backends use
    /// this after retiring the operand uses through their register allocator,
    /// where plain [`Function::invalidate`] would double-release; the
    /// instruction's own remaining uses are still consumed by its readers.
    pub(crate) fn discard(&self, id: InstId) {
        self.inst(id).opcode.set(Opcode::Void);
    }

    /// The live associated pseudo-operation of `kind`, if any.
    pub fn assoc_pseudo_op(
        &self,
        id: InstId,
        kind: crate::ir::opcode::PseudoOp,
    ) -> Option<InstId> {
        let pseudo = self.inst(id).assoc[kind as usize]?;
        if self.inst(pseudo).opcode() == Opcode::Void {
            return None;
        }
        Some(pseudo)
    }

    /// Records an unconditional branch edge from `from` to `to`.
    pub(crate) fn set_branch(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succs = SmallVec::from_slice(&[to]);
        self.block_mut(to).add_immediate_predecessor(from);
    }

    pub(crate) fn set_branches(&mut self, from: BlockId, true_to: BlockId, false_to: BlockId) {
        self.block_mut(from).succs = SmallVec::from_slice(&[true_to, false_to]);
        self.block_mut(true_to).add_immediate_predecessor(from);
        self.block_mut(false_to).add_immediate_predecessor(from);
    }

    /// Post-order linearization of the CFG from the entry block, for the
    /// optimizer (iterated in reverse) and the backends.
    pub fn compute_post_order(&mut self) {
        let Some(entry) = self.entry else {
            self.post_order.clear();
            return;
        };
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut visited = vec![false; self.blocks.len()];
        // (block, next successor index)
        let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
        visited[entry.index()] = true;
        while let Some(&(block, cursor)) = stack.last() {
            let succs = &self.blocks[block.index()].succs;
            if cursor < succs.len() {
                let next = succs[cursor];
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    stack.push((next, 0));
                }
            } else {
                order.push(block);
                stack.pop();
            }
        }
        self.post_order = order;
    }

    pub fn post_order(&self) -> &[BlockId] {
        &self.post_order
    }
}

/// Texture binding used by a program, keyed by descriptor index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub texture_type: TextureType,
    pub descriptor_index: u32,
}

/// Summary of the resources a program touches, for the embedding driver and
/// the backends' binding tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    /// Bitmask of constant buffer bindings read with immediate indices.
    pub constant_buffer_mask: u32,
    pub texture_descriptors: Vec<TextureDescriptor>,
    pub texture_buffer_descriptors: Vec<TextureDescriptor>,
    /// Bitmask of generic input attributes read.
    pub input_generics: u32,
    /// Bitmask of generic output attributes written.
    pub output_generics: u32,
    pub loads_position: bool,
    pub stores_position: bool,
    pub uses_sparse_residency: bool,
    pub uses_global_memory: bool,
    pub workgroup_size: [u32; 3],
}

/// A whole translated shader: one entry function (plus utility functions on
/// hardware that calls subroutines) and the resource summary.
pub struct Program {
    pub functions: SmallVec<[Function; 1]>,
    pub info: Info,
    pub stage: Stage,
}

impl Program {
    pub fn new(stage: Stage) -> Program {
        Program {
            functions: SmallVec::new(),
            info: Info::default(),
            stage,
        }
    }

    pub fn entry_function(&self) -> Result<&Function> {
        self.functions
            .first()
            .ok_or_else(|| Error::logic("program has no entry function"))
    }

    pub fn entry_function_mut(&mut self) -> Result<&mut Function> {
        self.functions
            .first_mut()
            .ok_or_else(|| Error::logic("program has no entry function"))
    }
}

/// Human-readable dump of a program, one block per paragraph. Only a debug
/// aid; the output is not stable.
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for (func_index, func) in program.functions.iter().enumerate() {
        let _ = writeln!(out, "function {func_index}:");
        for block_id in func.block_ids() {
            let block = func.block(block_id);
            let preds: Vec<String> = block
                .immediate_predecessors()
                .iter()
                .map(|p| p.to_string())
                .collect();
            let _ = writeln!(out, "{block_id}: // preds: [{}]", preds.join(", "));
            for &inst_id in block.insts() {
                let inst = func.inst(inst_id);
                let _ = write!(out, "    {inst_id} = {}", inst.opcode());
                if inst.is_phi() {
                    for (pred, value) in inst.phi_args() {
                        let _ = write!(out, " [{pred}: {value}]");
                    }
                } else {
                    for arg in inst.args() {
                        let _ = write!(out, " {arg}");
                    }
                }
                let _ = writeln!(out, " (uses: {})", inst.uses());
            }
        }
    }
    out
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dump_program(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ir::opcode::PseudoOp;

    fn func_with_block() -> (Function, BlockId) {
        let mut func = Function::new();
        let block = func.make_block();
        (func, block)
    }

    fn iadd(func: &mut Function, block: BlockId, a: Value, b: Value) -> InstId {
        func.append(block, Opcode::IAdd32, &[a, b], InstFlags::None)
            .expect("iadd")
    }

    #[test]
    fn append_tracks_use_counts() {
        let (mut func, block) = func_with_block();
        let a = iadd(&mut func, block, Value::U32(1), Value::U32(2));
        assert_eq!(func.inst(a).uses(), 0);
        let b = iadd(&mut func, block, Value::Inst(a), Value::Inst(a));
        assert_eq!(func.inst(a).uses(), 2);
        assert_eq!(func.inst(b).uses(), 0);
    }

    #[test]
    fn mismatched_operand_types_are_rejected() {
        let (mut func, block) = func_with_block();
        let err = func
            .append(
                block,
                Opcode::IAdd32,
                &[Value::U32(1), Value::F32(1.0)],
                InstFlags::None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn wrong_operand_count_is_rejected() {
        let (mut func, block) = func_with_block();
        let err = func
            .append(block, Opcode::IAdd32, &[Value::U32(1)], InstFlags::None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn nothing_may_follow_a_terminator() {
        let (mut func, block) = func_with_block();
        func.append(block, Opcode::Return, &[], InstFlags::None)
            .expect("return");
        let err = func
            .append(
                block,
                Opcode::IAdd32,
                &[Value::U32(1), Value::U32(2)],
                InstFlags::None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn replace_uses_with_transfers_edges() {
        let (mut func, block) = func_with_block();
        let a = iadd(&mut func, block, Value::U32(1), Value::U32(2));
        let b = iadd(&mut func, block, Value::U32(3), Value::U32(4));
        let c = iadd(&mut func, block, Value::Inst(a), Value::Inst(a));
        assert_eq!(func.inst(a).uses(), 2);

        func.replace_uses_with(a, Value::Inst(b)).expect("replace");
        assert_eq!(func.inst(a).uses(), 0);
        assert_eq!(func.inst(b).uses(), 2);
        assert_eq!(func.inst(c).args(), &[Value::Inst(b), Value::Inst(b)]);
        assert_eq!(func.resolve(Value::Inst(a)), Value::Inst(b));
    }

    #[test]
    fn invalidate_releases_operands_and_is_idempotent() {
        let (mut func, block) = func_with_block();
        let a = iadd(&mut func, block, Value::U32(1), Value::U32(2));
        let b = iadd(&mut func, block, Value::Inst(a), Value::Inst(a));
        assert_eq!(func.inst(a).uses(), 2);

        func.invalidate(b);
        assert_eq!(func.inst(a).uses(), 0);
        assert_eq!(func.inst(b).opcode(), Opcode::Void);
        assert!(func.inst(b).args().is_empty());

        func.invalidate(b);
        assert_eq!(func.inst(a).uses(), 0);
    }

    #[test]
    fn new_phis_form_the_block_prefix() {
        let (mut func, block) = func_with_block();
        iadd(&mut func, block, Value::U32(1), Value::U32(2));
        let phi = func.prepend_new_phi(block);
        assert_eq!(func.block(block).insts()[0], phi);
    }

    #[test]
    fn pseudo_operations_attach_to_their_producer() {
        let (mut func, block) = func_with_block();
        let a = iadd(&mut func, block, Value::U32(1), Value::U32(2));
        let zero = func
            .append(block, Opcode::GetZeroFromOp, &[Value::Inst(a)], InstFlags::None)
            .expect("pseudo");
        assert_eq!(func.assoc_pseudo_op(a, PseudoOp::Zero), Some(zero));
        assert_eq!(func.assoc_pseudo_op(a, PseudoOp::Sign), None);

        func.invalidate(zero);
        assert_eq!(func.assoc_pseudo_op(a, PseudoOp::Zero), None);
        assert_eq!(func.inst(a).uses(), 0);
    }

    #[test]
    fn vector_element_types_must_agree() {
        let (mut func, block) = func_with_block();
        let err = func
            .append(
                block,
                Opcode::CompositeConstructF32x2,
                &[Value::F32(1.0), Value::U32(2)],
                InstFlags::None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    }
}
