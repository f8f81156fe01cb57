//! # Pain bytecode backend
//!
//! Code generation for the Pain stack VM: the per-function assembler, the
//! bytecode encoding it produces, and tools to inspect the result.

pub mod bytecode;
pub mod codegen;
pub mod frontend;
