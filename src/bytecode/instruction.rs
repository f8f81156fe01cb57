use thiserror::Error;

use crate::bytecode::op::{OpCodeType, OperandKind};
use crate::bytecode::operand::{Operand, UNRESOLVED};
use crate::codegen::label::LabelId;

/// Width of the tag byte that starts every instruction.
pub const TAG_WIDTH: usize = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("no instruction at offset {0}, end of code")]
    UnexpectedEnd(usize),
    #[error("unknown opcode tag 0x{tag:02x} at offset {offset}")]
    UnknownOpcode { tag: u8, offset: usize },
    #[error("truncated {op} operand at offset {offset}: need {need} bytes, have {have}")]
    Truncated {
        op: OpCodeType,
        offset: usize,
        need: usize,
        have: usize,
    },
}

/// One emitted operation: a kind tag plus an optional operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: OpCodeType,
    pub operand: Option<Operand>,
}

impl Instruction {
    pub fn new(kind: OpCodeType, operand: Option<Operand>) -> Self {
        Self { kind, operand }
    }

    /// Encoded size in bytes: tag plus operand width.
    pub fn size(&self) -> usize {
        TAG_WIDTH + self.operand.as_ref().map_or(0, Operand::width)
    }

    pub fn write_to(&self, out: &mut Vec<u8>, resolve: &impl Fn(LabelId) -> i32) {
        out.push(self.kind.tag());
        if let Some(operand) = &self.operand {
            operand.write_to(out, resolve);
        }
    }

    /// Decode the instruction starting at `offset`. Returns the instruction
    /// and the offset of the next one.
    pub fn decode(bytes: &[u8], offset: usize) -> Result<(Instruction, usize), DecodeError> {
        let tag = *bytes.get(offset).ok_or(DecodeError::UnexpectedEnd(offset))?;
        let kind =
            OpCodeType::from_tag(tag).ok_or(DecodeError::UnknownOpcode { tag, offset })?;

        let start = offset + TAG_WIDTH;
        let need = kind.operand_kind().width();
        let have = bytes.len() - start;
        if have < need {
            return Err(DecodeError::Truncated {
                op: kind,
                offset,
                need,
                have,
            });
        }

        let raw = &bytes[start..start + need];
        let operand = match kind.operand_kind() {
            OperandKind::None => None,
            OperandKind::Int => Some(Operand::Int(i32::from_le_bytes(word(raw)))),
            OperandKind::Token => Some(Operand::Token(u32::from_le_bytes(word(raw)))),
            OperandKind::Float => {
                let mut b = [0u8; 8];
                b.copy_from_slice(raw);
                Some(Operand::Float(f64::from_le_bytes(b)))
            }
        };

        Ok((Instruction { kind, operand }, start + need))
    }
}

fn word(raw: &[u8]) -> [u8; 4] {
    let mut b = [0u8; 4];
    b.copy_from_slice(raw);
    b
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{:<11} {}", self.kind, operand),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Decode a whole function buffer into `(offset, instruction)` pairs.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (inst, next) = Instruction::decode(bytes, offset)?;
        out.push((offset, inst));
        offset = next;
    }
    Ok(out)
}

/// Serialize decoded (label-free) instructions back into a buffer.
pub fn encode_all<'a>(insts: impl IntoIterator<Item = &'a Instruction>) -> Vec<u8> {
    let mut out = Vec::new();
    for inst in insts {
        inst.write_to(&mut out, &|_| UNRESOLVED);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_operand(kind: OpCodeType) -> Option<Operand> {
        match kind.operand_kind() {
            OperandKind::None => None,
            OperandKind::Int => Some(Operand::Int(-42)),
            OperandKind::Float => Some(Operand::Float(-0.125)),
            OperandKind::Token => Some(Operand::Token(0xDEAD)),
        }
    }

    #[test]
    fn test_size_is_tag_plus_operand() {
        assert_eq!(Instruction::new(OpCodeType::Not, None).size(), 1);
        assert_eq!(
            Instruction::new(OpCodeType::Push, Some(Operand::Int(1))).size(),
            5
        );
        assert_eq!(
            Instruction::new(OpCodeType::Ldnum, Some(Operand::Float(1.0))).size(),
            9
        );
    }

    #[test]
    fn test_round_trip_every_kind() {
        let insts: Vec<Instruction> = OpCodeType::ALL
            .iter()
            .map(|&kind| Instruction::new(kind, sample_operand(kind)))
            .collect();
        let bytes = encode_all(&insts);

        let decoded = decode_all(&bytes).unwrap();
        assert_eq!(decoded.len(), insts.len());
        for ((_, got), want) in decoded.iter().zip(&insts) {
            assert_eq!(got, want);
        }

        let again = encode_all(decoded.iter().map(|(_, inst)| inst));
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_decode_offsets_advance_by_size() {
        let insts = vec![
            Instruction::new(OpCodeType::Push, Some(Operand::Int(1))),
            Instruction::new(OpCodeType::Dup, None),
            Instruction::new(OpCodeType::Ldnum, Some(Operand::Float(3.0))),
            Instruction::new(OpCodeType::Ret, None),
        ];
        let bytes = encode_all(&insts);
        let offsets: Vec<usize> = decode_all(&bytes).unwrap().iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 5, 6, 15]);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = decode_all(&[0x1B, 0xEE]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownOpcode {
                tag: 0xEE,
                offset: 1
            }
        );
    }

    #[test]
    fn test_decode_past_end() {
        assert_eq!(
            Instruction::decode(&[0x1B], 1),
            Err(DecodeError::UnexpectedEnd(1))
        );
    }

    #[test]
    fn test_truncated_operand() {
        let err = decode_all(&[OpCodeType::Ldloc.tag(), 0x01, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                need: 4,
                have: 2,
                ..
            }
        ));
        assert!(err.to_string().contains("LDLOC"));
    }
}
