use serde::{Deserialize, Serialize};

use crate::bytecode::strings::StringTable;

/// A compiled bytecode module: every function plus the string pool their
/// `Ldstr`/`New` tokens index into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleBc {
    pub functions: Vec<CompiledFunction>,
    pub strings: StringTable,
}

impl ModuleBc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Encode as a `.pbc` container.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// One function's finished bytecode and the frame sizes the runtime needs to
/// allocate its activation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub name: String,
    pub arity: u32,
    pub code: Vec<u8>,
    pub max_stack: u32,
    pub max_slots: u32,
}
