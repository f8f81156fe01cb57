use thiserror::Error;

use crate::bytecode::instruction::{DecodeError, Instruction, decode_all};
use crate::bytecode::op::OpCodeType;
use crate::bytecode::operand::Operand;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StackCheckError {
    #[error("stack-check error: {0}")]
    Decode(#[from] DecodeError),

    #[error("stack-check error: underflow at offset {offset}, {inst} needs {needed} items, have {depth}")]
    Underflow {
        offset: usize,
        inst: Instruction,
        needed: i32,
        depth: i32,
    },

    #[error("stack-check error: {inst} at offset {offset} has no count operand")]
    MissingCount { offset: usize, inst: Instruction },

    #[error("stack-check error: {inst} at offset {offset} has negative count {count}")]
    BadCount {
        offset: usize,
        inst: Instruction,
        count: i32,
    },

    #[error("stack-check error: depth overflows at offset {offset}")]
    Overflow { offset: usize },
}

/// Net change in operand-stack depth caused by one instruction.
///
/// `Call` consumes its arguments and `Pop` its count, both read from the int
/// operand; returns `None` when that operand is missing or negative.
pub fn stack_effect(kind: OpCodeType, operand: Option<&Operand>) -> Option<i32> {
    use OpCodeType::*;
    Some(match kind {
        Ret => -1,

        Add | Sub | Mul | Div | Mod => -1,
        Shl | Shr | Xor | Or | And => -1,
        Eq | Neq | Gt | Gte | Lt | Lte => -1,

        // ( obj field -- value )
        Ldfld => -1,
        // ( obj field value -- )
        Stfld => -3,

        Stloc => -1,
        Ldloc | Ldarg => 1,
        Ldnull | Ldstr | Ldnum => 1,
        Ldtoken => -1,
        LdLabel => 1,

        Dup | Push => 1,
        Pop => -count(operand)?,
        Swap1_2 => 0,

        Not => 0,

        Br => 0,
        Brtrue | Brfalse => -1,

        Call => -count(operand)?,
        New => 0,

        Try | Catch | Finally | EndFinally | Throw | Leave => 0,
        // each pops the implicit exception-region state
        EndTry | EndCatch => -1,
    })
}

fn count(operand: Option<&Operand>) -> Option<i32> {
    operand?.as_int().filter(|n| *n >= 0)
}

/// Result of a linear stack check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSummary {
    pub instructions: usize,
    pub max_depth: i32,
    pub final_depth: i32,
}

/// Check stack effects of an encoded function with a given initial height.
///
/// NOTE: This is a linear scan over the buffer in offset order; it does not
/// follow branch targets, so it validates straight-line code and reports the
/// peak of that ordering. Exception-region markers are counted with their
/// declared effects.
pub fn check_code_with_initial(
    code: &[u8],
    initial_height: i32,
) -> Result<StackSummary, StackCheckError> {
    let mut h = initial_height;
    let mut max_depth = h;
    let decoded = decode_all(code)?;

    for (offset, inst) in &decoded {
        let effect = stack_effect(inst.kind, inst.operand.as_ref()).ok_or_else(|| {
            match inst.operand.as_ref().and_then(Operand::as_int) {
                Some(count) => StackCheckError::BadCount {
                    offset: *offset,
                    inst: inst.clone(),
                    count,
                },
                None => StackCheckError::MissingCount {
                    offset: *offset,
                    inst: inst.clone(),
                },
            }
        })?;

        let before = h;
        h = h
            .checked_add(effect)
            .ok_or(StackCheckError::Overflow { offset: *offset })?;
        if h < 0 {
            return Err(StackCheckError::Underflow {
                offset: *offset,
                inst: inst.clone(),
                needed: -effect,
                depth: before,
            });
        }
        max_depth = max_depth.max(h);
    }

    Ok(StackSummary {
        instructions: decoded.len(),
        max_depth,
        final_depth: h,
    })
}

/// Check stack effects starting from empty stack.
pub fn check_code(code: &[u8]) -> Result<StackSummary, StackCheckError> {
    check_code_with_initial(code, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::encode_all;

    fn inst(kind: OpCodeType, operand: Option<Operand>) -> Instruction {
        Instruction::new(kind, operand)
    }

    #[test]
    fn test_fixed_effects() {
        assert_eq!(stack_effect(OpCodeType::Add, None), Some(-1));
        assert_eq!(stack_effect(OpCodeType::Xor, None), Some(-1));
        assert_eq!(stack_effect(OpCodeType::Ldnull, None), Some(1));
        assert_eq!(stack_effect(OpCodeType::Stfld, None), Some(-3));
        assert_eq!(stack_effect(OpCodeType::Swap1_2, None), Some(0));
        assert_eq!(stack_effect(OpCodeType::EndTry, None), Some(-1));
        assert_eq!(stack_effect(OpCodeType::EndCatch, None), Some(-1));
        assert_eq!(stack_effect(OpCodeType::Leave, None), Some(0));
    }

    #[test]
    fn test_dynamic_effects() {
        assert_eq!(
            stack_effect(OpCodeType::Call, Some(&Operand::Int(3))),
            Some(-3)
        );
        assert_eq!(
            stack_effect(OpCodeType::Pop, Some(&Operand::Int(2))),
            Some(-2)
        );
        assert_eq!(stack_effect(OpCodeType::Call, None), None);
        assert_eq!(stack_effect(OpCodeType::Pop, Some(&Operand::Int(-5))), None);
        assert_eq!(
            stack_effect(OpCodeType::Call, Some(&Operand::Int(i32::MIN))),
            None
        );
    }

    fn raw(kind: OpCodeType, count: i32) -> Vec<u8> {
        let mut code = vec![kind.tag()];
        code.extend_from_slice(&count.to_le_bytes());
        code
    }

    #[test]
    fn test_negative_counts_rejected() {
        let err = check_code(&raw(OpCodeType::Pop, -5)).unwrap_err();
        assert!(matches!(
            err,
            StackCheckError::BadCount {
                offset: 0,
                count: -5,
                ..
            }
        ));

        let err = check_code(&raw(OpCodeType::Call, i32::MIN)).unwrap_err();
        assert!(matches!(err, StackCheckError::BadCount { count: i32::MIN, .. }));
        assert!(err.to_string().contains("negative count"));
    }

    #[test]
    fn test_depth_overflow() {
        let code = encode_all(&[inst(OpCodeType::Ldnull, None)]);
        let err = check_code_with_initial(&code, i32::MAX).unwrap_err();
        assert_eq!(err, StackCheckError::Overflow { offset: 0 });
    }

    #[test]
    fn test_simple_code() {
        let code = encode_all(&[
            inst(OpCodeType::Push, Some(Operand::Int(1))),
            inst(OpCodeType::Push, Some(Operand::Int(2))),
            inst(OpCodeType::Add, None),
        ]);
        let summary = check_code(&code).unwrap();
        assert_eq!(summary.instructions, 3);
        assert_eq!(summary.max_depth, 2);
        assert_eq!(summary.final_depth, 1);
    }

    #[test]
    fn test_underflow() {
        let code = encode_all(&[
            inst(OpCodeType::Push, Some(Operand::Int(1))),
            inst(OpCodeType::Add, None),
        ]);
        let err = check_code(&code).unwrap_err();
        assert!(matches!(err, StackCheckError::Underflow { offset: 5, .. }));
        assert!(err.to_string().contains("underflow"));
    }

    #[test]
    fn test_call_consumes_arguments() {
        let code = encode_all(&[
            inst(OpCodeType::Ldnull, None),
            inst(OpCodeType::Ldnull, None),
            inst(OpCodeType::Call, Some(Operand::Int(2))),
        ]);
        assert_eq!(check_code(&code).unwrap().final_depth, 0);
    }

    #[test]
    fn test_initial_height() {
        let code = encode_all(&[inst(OpCodeType::Stloc, Some(Operand::Int(0)))]);
        assert!(check_code(&code).is_err());
        assert_eq!(check_code_with_initial(&code, 1).unwrap().final_depth, 0);
    }

    #[test]
    fn test_decode_error_propagates() {
        let err = check_code(&[0xFF]).unwrap_err();
        assert!(matches!(err, StackCheckError::Decode(_)));
    }
}
