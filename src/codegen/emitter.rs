use log::{debug, trace};

use crate::bytecode::instruction::Instruction;
use crate::bytecode::ir::CompiledFunction;
use crate::bytecode::op::{OpCodeType, OperandKind};
use crate::bytecode::operand::{Operand, UNRESOLVED};
use crate::bytecode::stack_check_error::stack_effect;
use crate::bytecode::strings::Interner;
use crate::codegen::compile_error::{AssemblerError, CompileError, Position};
use crate::codegen::frame::Frame;
use crate::codegen::label::{Label, LabelArena, LabelId};
use crate::codegen::scope::{ScopeStack, Variable};

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Drop `Pop 0` from the stream instead of encoding it.
    pub elide_zero_pop: bool,
    /// `finish` rejects labels that are jumped to but never bound.
    pub require_bound_labels: bool,
    /// `finish` rejects a non-zero running stack depth.
    pub require_balanced_stack: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            elide_zero_pop: true,
            require_bound_labels: true,
            require_balanced_stack: true,
        }
    }
}

/// Proof of an open scope, returned by `enter_scope` and consumed by
/// `exit_scope`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a scope must be closed with exit_scope"]
pub struct ScopeToken(usize);

impl ScopeToken {
    pub fn depth(&self) -> usize {
        self.0
    }
}

/// Assembles one function: encodes instructions into a byte stream while
/// tracking the scope chain, labels, local slots and frame sizes.
///
/// `emit*` only reports the declared stack effect of what it appended. The
/// caller folds that effect into the frame with `apply_effect` (or
/// `add_stack` / `release_stack`) so the peak depth is observed in emission
/// order.
pub struct FunctionAssembler<'a, I: Interner> {
    name: String,
    arity: u32,
    config: AssemblerConfig,

    /// Byte offset of the next instruction.
    offset: u32,
    codes: Vec<Instruction>,

    scopes: ScopeStack,
    labels: LabelArena,
    frame: Frame,
    strings: &'a mut I,

    position: Option<Position>,
}

impl<'a, I: Interner> FunctionAssembler<'a, I> {
    pub fn new(name: impl Into<String>, strings: &'a mut I) -> Self {
        Self::with_config(name, strings, AssemblerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, strings: &'a mut I, config: AssemblerConfig) -> Self {
        Self {
            name: name.into(),
            arity: 0,
            config,
            offset: 0,
            codes: Vec::new(),
            scopes: ScopeStack::new(),
            labels: LabelArena::default(),
            frame: Frame::new(),
            strings,
            position: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_arity(&mut self, arity: u32) {
        self.arity = arity;
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.codes
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Record the source position of the node being lowered.
    pub fn set_position(&mut self, line: usize, col: usize) {
        self.position = Some(Position { line, col });
    }

    /// Attach the function name and last recorded position to an error.
    pub fn located(&self, error: AssemblerError) -> CompileError {
        CompileError {
            function: self.name.clone(),
            position: self.position,
            error,
        }
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    pub fn enter_scope(&mut self) -> ScopeToken {
        let depth = self.scopes.push();
        debug!("{}: enter scope {}", self.name, depth);
        ScopeToken(depth)
    }

    /// Close the innermost scope, releasing the slots of the variables it
    /// declared.
    pub fn exit_scope(&mut self, token: ScopeToken) -> Result<(), AssemblerError> {
        self.scopes.pop(token.0, &mut self.frame)?;
        debug!(
            "{}: exit scope {}, slots now {}",
            self.name,
            token.0,
            self.frame.slot_count()
        );
        Ok(())
    }

    /// Run `body` inside a fresh scope that is closed afterwards, even when
    /// `body` fails.
    pub fn scoped<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, AssemblerError>,
    ) -> Result<T, AssemblerError> {
        let token = self.enter_scope();
        let result = body(self);
        let closed = self.exit_scope(token);
        let value = result?;
        closed?;
        Ok(value)
    }

    // =========================================================================
    // Labels
    // =========================================================================

    pub fn create_label(&mut self, name: &str) -> Result<LabelId, AssemblerError> {
        self.scopes.create_label(name, &mut self.labels)
    }

    pub fn get_label(&self, name: &str) -> Result<LabelId, AssemblerError> {
        self.scopes.get_label(name)
    }

    pub fn label(&self, id: LabelId) -> Result<&Label, AssemblerError> {
        self.labels.get(id).ok_or_else(|| unknown_label(id))
    }

    /// Bind the named label to the current offset.
    pub fn bind_label(&mut self, name: &str) -> Result<(), AssemblerError> {
        self.bind_label_at(name, self.offset)
    }

    pub fn bind_label_at(&mut self, name: &str, target: u32) -> Result<(), AssemblerError> {
        let id = self.get_label(name)?;
        self.bind_at(id, target)
    }

    pub fn bind(&mut self, id: LabelId) -> Result<(), AssemblerError> {
        self.bind_at(id, self.offset)
    }

    /// Fails with `LabelNotFound` when `id` belongs to another assembler.
    pub fn bind_at(&mut self, id: LabelId, target: u32) -> Result<(), AssemblerError> {
        let label = self.labels.get_mut(id).ok_or_else(|| unknown_label(id))?;
        label.bind(target);
        debug!("{}: bind '{}' -> {:04}", self.name, label.name, target);
        Ok(())
    }

    // =========================================================================
    // Variables
    // =========================================================================

    pub fn create_variable(&mut self, name: &str) -> Variable {
        self.scopes.create_variable(name, &mut self.frame)
    }

    pub fn get_variable(&self, name: &str) -> Result<Variable, AssemblerError> {
        self.scopes.get_variable(name)
    }

    pub fn get_or_create_variable(&mut self, name: &str) -> Variable {
        self.scopes.get_or_create_variable(name, &mut self.frame)
    }

    // =========================================================================
    // Stack bookkeeping
    // =========================================================================

    pub fn add_stack(&mut self, n: u32) {
        self.frame.add_stack(n);
    }

    pub fn release_stack(&mut self, n: u32) -> Result<(), AssemblerError> {
        self.frame.release_stack(n)
    }

    pub fn apply_effect(&mut self, effect: i32) -> Result<(), AssemblerError> {
        self.frame.apply_effect(effect)
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Emit a kind that carries no operand.
    pub fn emit(&mut self, kind: OpCodeType) -> Result<i32, AssemblerError> {
        self.emit_with(kind, None)
    }

    pub fn emit_int(&mut self, kind: OpCodeType, value: i32) -> Result<i32, AssemblerError> {
        self.emit_with(kind, Some(Operand::Int(value)))
    }

    pub fn emit_float(&mut self, kind: OpCodeType, value: f64) -> Result<i32, AssemblerError> {
        self.emit_with(kind, Some(Operand::Float(value)))
    }

    /// Intern `value` and emit its token.
    pub fn emit_str(&mut self, kind: OpCodeType, value: &str) -> Result<i32, AssemblerError> {
        if kind.operand_kind() != OperandKind::Token {
            return Err(AssemblerError::MalformedOperand {
                op: kind,
                expected: kind.operand_kind(),
                found: Some(Operand::Token(0)),
            });
        }
        let token = self.strings.intern(value);
        self.emit_with(kind, Some(Operand::Token(token)))
    }

    pub fn emit_var(&mut self, kind: OpCodeType, variable: &Variable) -> Result<i32, AssemblerError> {
        self.emit_with(kind, Some(Operand::Int(variable.slot as i32)))
    }

    /// Emit a branch to `label`. The target is read from the label when the
    /// buffer is serialized, so the label may still be unbound here.
    pub fn emit_label(&mut self, kind: OpCodeType, label: LabelId) -> Result<i32, AssemblerError> {
        self.emit_with(kind, Some(Operand::Label(label)))
    }

    /// Append one instruction and return its declared stack effect.
    ///
    /// A `Pop` with a zero count is not appended (unless disabled in the
    /// config) and reports an effect of 0.
    pub fn emit_with(
        &mut self,
        kind: OpCodeType,
        operand: Option<Operand>,
    ) -> Result<i32, AssemblerError> {
        let malformed = || AssemblerError::MalformedOperand {
            op: kind,
            expected: kind.operand_kind(),
            found: operand,
        };

        let found = operand.as_ref().map_or(OperandKind::None, Operand::kind);
        if found != kind.operand_kind() {
            return Err(malformed());
        }
        if matches!(operand, Some(Operand::Label(_))) && !kind.is_branch() {
            return Err(malformed());
        }
        if let Some(Operand::Label(id)) = operand
            && self.labels.get(id).is_none()
        {
            return Err(unknown_label(id));
        }

        let effect = stack_effect(kind, operand.as_ref()).ok_or_else(malformed)?;

        if kind == OpCodeType::Pop && effect == 0 && self.config.elide_zero_pop {
            debug!("{}: elided POP 0 at {:04}", self.name, self.offset);
            return Ok(0);
        }

        if let Some(Operand::Label(id)) = operand {
            self.labels.mark_referenced(id);
        }

        self.push(Instruction::new(kind, operand));
        Ok(effect)
    }

    fn push(&mut self, inst: Instruction) {
        trace!("{}: {:04} {}", self.name, self.offset, inst);
        self.offset += inst.size() as u32;
        self.codes.push(inst);
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Serialize every instruction in emission order. Label operands are
    /// written with their current target, `-1` when still unbound.
    pub fn get_buffer(&self) -> Vec<u8> {
        let resolve = |id: LabelId| {
            self.labels
                .get(id)
                .and_then(Label::target)
                .map_or(UNRESOLVED, |target| target as i32)
        };

        let mut out = Vec::with_capacity(self.offset as usize);
        for inst in &self.codes {
            inst.write_to(&mut out, &resolve);
        }
        out
    }

    /// Close the root scope and produce the compiled function record.
    pub fn finish(mut self) -> Result<CompiledFunction, CompileError> {
        self.scopes.release_root(&mut self.frame);

        if self.config.require_bound_labels
            && let Some(label) = self.labels.unbound_references().next()
        {
            let error = AssemblerError::UnboundLabel(label.name.clone());
            return Err(self.located(error));
        }

        if self.config.require_balanced_stack && self.frame.stack_depth() != 0 {
            let error = AssemblerError::UnbalancedStack(self.frame.stack_depth());
            return Err(self.located(error));
        }

        debug!(
            "{}: {} instructions, {} bytes, max stack {}, max slots {}",
            self.name,
            self.codes.len(),
            self.offset,
            self.frame.max_stack_depth(),
            self.frame.max_slot_count()
        );

        Ok(CompiledFunction {
            code: self.get_buffer(),
            name: self.name,
            arity: self.arity,
            max_stack: self.frame.max_stack_depth(),
            max_slots: self.frame.max_slot_count(),
        })
    }
}

fn unknown_label(id: LabelId) -> AssemblerError {
    AssemblerError::LabelNotFound(format!("#{}", id.index()))
}
