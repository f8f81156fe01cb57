pub mod disasm;
pub mod instruction;
pub mod ir;
pub mod op;
pub mod operand;
pub mod stack_check_error;
pub mod strings;

pub use instruction::Instruction;
pub use ir::{CompiledFunction, ModuleBc};
pub use op::OpCodeType;
pub use operand::Operand;
pub use strings::{Interner, SharedStringTable, StringTable};
