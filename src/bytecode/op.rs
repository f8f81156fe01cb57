use serde::{Deserialize, Serialize};

// =============================================================================
// OPCODE - Instruction kinds of the stack VM
// =============================================================================

/// Operation tag of an instruction. The discriminant is the tag byte written
/// to the bytecode buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCodeType {
    Ret = 0x00,

    // arithmetic, bitwise and comparison ( a b -- c )
    Add = 0x01,
    Sub = 0x02,
    Mul = 0x03,
    Div = 0x04,
    Mod = 0x05,
    Shl = 0x06,
    Shr = 0x07,
    Xor = 0x08,
    Eq = 0x09,
    Neq = 0x0A,
    Gt = 0x0B,
    Gte = 0x0C,
    Lt = 0x0D,
    Lte = 0x0E,
    Or = 0x0F,
    And = 0x10,

    // fields
    Ldfld = 0x11,
    Stfld = 0x12,

    // locals, arguments and constants
    Stloc = 0x13,
    Ldloc = 0x14,
    Ldarg = 0x15,
    Ldnull = 0x16,
    Ldstr = 0x17,
    Ldnum = 0x18,
    Ldtoken = 0x19,
    LdLabel = 0x1A,

    // stack ops
    Dup = 0x1B,
    Push = 0x1C,
    Pop = 0x1D,
    Swap1_2 = 0x1E,

    // logic
    Not = 0x1F,

    // branches
    Br = 0x20,
    Brtrue = 0x21,
    Brfalse = 0x22,

    // calls and objects
    Call = 0x23,
    New = 0x24,

    // ==========================================================================
    // Exception regions
    // ==========================================================================
    Try = 0x25,
    EndTry = 0x26,
    Catch = 0x27,
    EndCatch = 0x28,
    Finally = 0x29,
    EndFinally = 0x2A,
    Throw = 0x2B,
    Leave = 0x2C,
}

/// Shape of the payload an opcode kind carries in the encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    /// `i32`, 4 bytes. Slots, counts, label offsets.
    Int,
    /// `f64`, 8 bytes.
    Float,
    /// Interned string token, `u32`, 4 bytes.
    Token,
}

impl OpCodeType {
    /// Every opcode kind, in tag order.
    pub const ALL: [OpCodeType; 45] = {
        use OpCodeType::*;
        [
            Ret, Add, Sub, Mul, Div, Mod, Shl, Shr, Xor, Eq, Neq, Gt, Gte, Lt, Lte, Or, And,
            Ldfld, Stfld, Stloc, Ldloc, Ldarg, Ldnull, Ldstr, Ldnum, Ldtoken, LdLabel, Dup, Push,
            Pop, Swap1_2, Not, Br, Brtrue, Brfalse, Call, New, Try, EndTry, Catch, EndCatch,
            Finally, EndFinally, Throw, Leave,
        ]
    };

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<OpCodeType> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn operand_kind(self) -> OperandKind {
        use OpCodeType::*;
        match self {
            Stloc | Ldloc | Ldarg | Ldtoken | LdLabel | Push | Pop | Br | Brtrue | Brfalse
            | Call | Try | Leave => OperandKind::Int,
            Ldnum => OperandKind::Float,
            Ldstr | New => OperandKind::Token,
            Ret | Add | Sub | Mul | Div | Mod | Shl | Shr | Xor | Eq | Neq | Gt | Gte | Lt
            | Lte | Or | And | Ldfld | Stfld | Ldnull | Dup | Swap1_2 | Not | EndTry | Catch
            | EndCatch | Finally | EndFinally | Throw => OperandKind::None,
        }
    }

    /// True for kinds whose int operand is a byte offset into the function.
    pub fn is_branch(self) -> bool {
        use OpCodeType::*;
        matches!(self, Br | Brtrue | Brfalse | Try | Leave | LdLabel)
    }

    pub fn mnemonic(self) -> &'static str {
        use OpCodeType::*;
        match self {
            Ret => "ret",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Shl => "shl",
            Shr => "shr",
            Xor => "xor",
            Eq => "eq",
            Neq => "neq",
            Gt => "gt",
            Gte => "gte",
            Lt => "lt",
            Lte => "lte",
            Or => "or",
            And => "and",
            Ldfld => "ldfld",
            Stfld => "stfld",
            Stloc => "stloc",
            Ldloc => "ldloc",
            Ldarg => "ldarg",
            Ldnull => "ldnull",
            Ldstr => "ldstr",
            Ldnum => "ldnum",
            Ldtoken => "ldtoken",
            LdLabel => "ldlabel",
            Dup => "dup",
            Push => "push",
            Pop => "pop",
            Swap1_2 => "swap",
            Not => "not",
            Br => "br",
            Brtrue => "brtrue",
            Brfalse => "brfalse",
            Call => "call",
            New => "new",
            Try => "try",
            EndTry => "endtry",
            Catch => "catch",
            EndCatch => "endcatch",
            Finally => "finally",
            EndFinally => "endfinally",
            Throw => "throw",
            Leave => "leave",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<OpCodeType> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }
}

impl std::fmt::Display for OpCodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.mnemonic().to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_match_table_position() {
        for (i, op) in OpCodeType::ALL.iter().enumerate() {
            assert_eq!(op.tag() as usize, i, "{:?} is out of order", op);
            assert_eq!(OpCodeType::from_tag(op.tag()), Some(*op));
        }
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(OpCodeType::from_tag(0x2D), None);
        assert_eq!(OpCodeType::from_tag(0xFF), None);
    }

    #[test]
    fn test_mnemonics_are_unique() {
        for op in OpCodeType::ALL {
            assert_eq!(OpCodeType::from_mnemonic(op.mnemonic()), Some(op));
        }
    }

    #[test]
    fn test_operand_shapes() {
        assert_eq!(OpCodeType::Ldnum.operand_kind(), OperandKind::Float);
        assert_eq!(OpCodeType::Ldstr.operand_kind(), OperandKind::Token);
        assert_eq!(OpCodeType::Brfalse.operand_kind(), OperandKind::Int);
        assert_eq!(OpCodeType::Not.operand_kind(), OperandKind::None);
    }
}
