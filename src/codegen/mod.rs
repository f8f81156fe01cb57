//! # Function assembler
//!
//! Turns a sequence of opcodes plus lexically scoped names (labels, local
//! variables) into a function's bytecode buffer and the frame sizes needed
//! to run it.
//!
//! ## Conventions
//!
//! - Stack effects are written as `( before -- after )`.
//! - Offsets are byte offsets from the start of the function buffer.
//! - Scopes close in strict LIFO order; slots are rewound on exit.

pub mod compile_error;
pub mod emitter;
pub mod frame;
pub mod label;
pub mod scope;

pub use compile_error::{AssemblerError, CompileError, Position};
pub use emitter::{AssemblerConfig, FunctionAssembler, ScopeToken};
pub use frame::Frame;
pub use label::{Label, LabelId};
pub use scope::Variable;
