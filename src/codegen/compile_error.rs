use thiserror::Error;

use crate::bytecode::op::{OpCodeType, OperandKind};
use crate::bytecode::operand::Operand;

/// Failures raised while assembling one function. All of them abort the
/// function: a miscounted stack or slot would corrupt its frame sizing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblerError {
    #[error("label '{0}' not found")]
    LabelNotFound(String),

    #[error("label '{0}' is already bound in this scope")]
    DuplicateLabel(String),

    #[error("variable '{0}' not found")]
    VariableNotFound(String),

    #[error("scope at depth {closing} closed while depth {innermost} is the innermost open scope")]
    InvalidScopeNesting { closing: usize, innermost: usize },

    #[error("{op} expects {expected:?} operand, got {found:?}")]
    MalformedOperand {
        op: OpCodeType,
        expected: OperandKind,
        found: Option<Operand>,
    },

    #[error("label '{0}' is referenced but never bound")]
    UnboundLabel(String),

    #[error("operand stack ends at depth {0}, expected 0")]
    UnbalancedStack(u32),

    #[error("releasing {release} stack entries with only {depth} on the stack")]
    StackUnderflow { release: u32, depth: u32 },
}

/// Source position of the node being lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

/// An `AssemblerError` with the function (and position, when known) it was
/// raised in. This is what reaches top-level diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct CompileError {
    pub function: String,
    pub position: Option<Position>,
    #[source]
    pub error: AssemblerError,
}

impl std::fmt::Display for CompileError {
    /// `function:line:col: message`, or `function: message` without position.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(Position { line, col }) => {
                write!(f, "{}:{}:{}: {}", self.function, line, col, self.error)
            }
            None => write!(f, "{}: {}", self.function, self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_errors_display() {
        let err = AssemblerError::LabelNotFound("loop_end".to_string());
        assert!(err.to_string().contains("loop_end"));

        let err = AssemblerError::DuplicateLabel("L".to_string());
        assert!(err.to_string().contains("already bound"));
    }

    #[test]
    fn test_malformed_operand_display() {
        let err = AssemblerError::MalformedOperand {
            op: OpCodeType::Pop,
            expected: OperandKind::Int,
            found: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("POP"));
        assert!(msg.contains("Int"));
        assert!(msg.contains("None"));
    }

    #[test]
    fn test_compile_error_with_position() {
        let err = CompileError {
            function: "main".to_string(),
            position: Some(Position { line: 3, col: 5 }),
            error: AssemblerError::VariableNotFound("x".to_string()),
        };
        assert_eq!(err.to_string(), "main:3:5: variable 'x' not found");
    }

    #[test]
    fn test_compile_error_without_position() {
        let err = CompileError {
            function: "f".to_string(),
            position: None,
            error: AssemblerError::UnbalancedStack(2),
        };
        assert_eq!(err.to_string(), "f: operand stack ends at depth 2, expected 0");
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let err = CompileError {
            function: "f".to_string(),
            position: None,
            error: AssemblerError::LabelNotFound("x".to_string()),
        };
        assert!(err.source().is_some());
    }
}
