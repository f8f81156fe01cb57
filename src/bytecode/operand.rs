use crate::bytecode::op::OperandKind;
use crate::codegen::label::LabelId;

/// Width of an int operand (slots, counts, resolved label offsets).
pub const INT_WIDTH: usize = 4;
/// Width of an interned string token.
pub const TOKEN_WIDTH: usize = 4;
/// Width of a numeric literal.
pub const FLOAT_WIDTH: usize = 8;

/// Encoded offset of a label that was never bound.
pub const UNRESOLVED: i32 = -1;

/// Payload attached to an instruction.
///
/// The width is fixed by the variant. `Label` is a symbolic int operand: it
/// names a label cell of the owning function and is turned into that label's
/// offset when the buffer is serialized, so a branch may be emitted before
/// its destination is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Int(i32),
    Float(f64),
    Token(u32),
    Label(LabelId),
}

impl Operand {
    pub fn width(&self) -> usize {
        match self {
            Operand::Int(_) | Operand::Label(_) => INT_WIDTH,
            Operand::Token(_) => TOKEN_WIDTH,
            Operand::Float(_) => FLOAT_WIDTH,
        }
    }

    /// The encoded shape. Labels encode as ints.
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Int(_) | Operand::Label(_) => OperandKind::Int,
            Operand::Float(_) => OperandKind::Float,
            Operand::Token(_) => OperandKind::Token,
        }
    }

    /// Integer value of an already-resolved int operand.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Operand::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Write the operand bytes (little-endian). `resolve` maps a label to its
    /// current offset.
    pub fn write_to(&self, out: &mut Vec<u8>, resolve: &impl Fn(LabelId) -> i32) {
        match *self {
            Operand::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Operand::Label(id) => out.extend_from_slice(&resolve(id).to_le_bytes()),
            Operand::Token(t) => out.extend_from_slice(&t.to_le_bytes()),
            Operand::Float(n) => out.extend_from_slice(&n.to_le_bytes()),
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{}", v),
            Operand::Float(n) => write!(f, "{:?}", n),
            Operand::Token(t) => write!(f, "#{}", t),
            Operand::Label(id) => write!(f, "@{}", id.index()),
        }
    }
}

impl OperandKind {
    pub fn width(self) -> usize {
        match self {
            OperandKind::None => 0,
            OperandKind::Int => INT_WIDTH,
            OperandKind::Token => TOKEN_WIDTH,
            OperandKind::Float => FLOAT_WIDTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_labels(_: LabelId) -> i32 {
        UNRESOLVED
    }

    #[test]
    fn test_widths_fixed_by_kind() {
        assert_eq!(Operand::Int(7).width(), 4);
        assert_eq!(Operand::Token(3).width(), 4);
        assert_eq!(Operand::Float(1.5).width(), 8);
        assert_eq!(Operand::Label(LabelId::new(0)).width(), 4);
        assert_eq!(OperandKind::None.width(), 0);
    }

    #[test]
    fn test_little_endian_int() {
        let mut out = Vec::new();
        Operand::Int(0x0102_0304).write_to(&mut out, &no_labels);
        assert_eq!(out, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_negative_int() {
        let mut out = Vec::new();
        Operand::Int(-1).write_to(&mut out, &no_labels);
        assert_eq!(out, vec![0xFF; 4]);
    }

    #[test]
    fn test_label_written_through_resolver() {
        let mut out = Vec::new();
        Operand::Label(LabelId::new(2)).write_to(&mut out, &|id| id.index() as i32 * 10);
        assert_eq!(out, 20i32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_float_bits() {
        let mut out = Vec::new();
        Operand::Float(2.5).write_to(&mut out, &no_labels);
        assert_eq!(out, 2.5f64.to_le_bytes().to_vec());
    }
}
