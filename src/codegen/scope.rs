use std::collections::HashMap;

use crate::codegen::compile_error::AssemblerError;
use crate::codegen::frame::Frame;
use crate::codegen::label::{Label, LabelArena, LabelId};

/// A named local bound to a frame slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub slot: u32,
}

/// One lexical region: the labels and variables declared directly in it.
#[derive(Debug, Default)]
pub struct Scope {
    pub depth: usize,
    labels: HashMap<String, LabelId>,
    variables: HashMap<String, Variable>,
    // counts shadowed re-declarations too, so exit releases every slot
    declared: u32,
}

/// The chain of open scopes of one function, innermost last.
///
/// Lookups walk from the innermost scope outwards, so inner declarations
/// hide outer ones. The root scope (depth 0) lives for the whole function.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Depth of the innermost open scope.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    fn current(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn push(&mut self) -> usize {
        let depth = self.scopes.len();
        self.scopes.push(Scope {
            depth,
            ..Scope::default()
        });
        depth
    }

    /// Close the scope at `depth`, releasing the slots it declared.
    pub fn pop(&mut self, depth: usize, frame: &mut Frame) -> Result<(), AssemblerError> {
        let innermost = self.depth();
        if depth != innermost || depth == 0 {
            return Err(AssemblerError::InvalidScopeNesting {
                closing: depth,
                innermost,
            });
        }
        if let Some(scope) = self.scopes.pop() {
            frame.release_slot(scope.declared);
        }
        Ok(())
    }

    /// Release the root scope's slots at the end of the function.
    pub fn release_root(&mut self, frame: &mut Frame) {
        let root = &mut self.scopes[0];
        frame.release_slot(root.declared);
        root.declared = 0;
        root.variables.clear();
    }

    // =========================================================================
    // Labels
    // =========================================================================

    pub fn create_label(
        &mut self,
        name: &str,
        arena: &mut LabelArena,
    ) -> Result<LabelId, AssemblerError> {
        let scope = self.current();
        if let Some(&id) = scope.labels.get(name) {
            if arena.get(id).is_some_and(Label::is_resolved) {
                return Err(AssemblerError::DuplicateLabel(name.to_string()));
            }
            return Ok(id);
        }

        let id = arena.alloc(name);
        scope.labels.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn get_label(&self, name: &str) -> Result<LabelId, AssemblerError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.labels.get(name).copied())
            .ok_or_else(|| AssemblerError::LabelNotFound(name.to_string()))
    }

    // =========================================================================
    // Variables
    // =========================================================================

    pub fn create_variable(&mut self, name: &str, frame: &mut Frame) -> Variable {
        let variable = Variable {
            name: name.to_string(),
            slot: frame.allocate_slot(1),
        };
        let scope = self.current();
        scope.declared += 1;
        scope.variables.insert(name.to_string(), variable.clone());
        variable
    }

    pub fn get_variable(&self, name: &str) -> Result<Variable, AssemblerError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(name).cloned())
            .ok_or_else(|| AssemblerError::VariableNotFound(name.to_string()))
    }

    pub fn get_or_create_variable(&mut self, name: &str, frame: &mut Frame) -> Variable {
        match self.get_variable(name) {
            Ok(variable) => variable,
            Err(_) => self.create_variable(name, frame),
        }
    }
}
