use std::collections::{BTreeSet, HashMap};

use crate::bytecode::instruction::{DecodeError, Instruction, decode_all};
use crate::bytecode::ir::{CompiledFunction, ModuleBc};
use crate::bytecode::op::OpCodeType;
use crate::bytecode::operand::Operand;
use crate::bytecode::strings::StringTable;

/// Print disassembly of a bytecode module
pub fn print_module(module: &ModuleBc) -> Result<(), DecodeError> {
    println!("=== BYTECODE MODULE ===\n");

    for function in &module.functions {
        print_function(function, &module.strings)?;
    }

    if !module.strings.is_empty() {
        println!("════════════════════════════════════════");
        println!(" strings");
        println!("════════════════════════════════════════");
        for (token, text) in module.strings.iter() {
            println!("#{:<5} {:?}", token, text);
        }
    }
    Ok(())
}

fn print_function(function: &CompiledFunction, strings: &StringTable) -> Result<(), DecodeError> {
    println!("════════════════════════════════════════");
    println!(" {}/{}", function.name, function.arity);
    println!(
        " {} bytes, max stack {}, max slots {}",
        function.code.len(),
        function.max_stack,
        function.max_slots
    );
    println!("════════════════════════════════════════");
    print!("{}", disassemble_to_string(&function.code, strings)?);
    println!();
    Ok(())
}

// =============================================================================
// String output (for testing/logging)
// =============================================================================

/// Return disassembly of one function buffer as a String
pub fn disassemble_to_string(code: &[u8], strings: &StringTable) -> Result<String, DecodeError> {
    let decoded = decode_all(code)?;
    let jump_targets = collect_jump_targets(&decoded);
    let mut output = String::new();

    for (offset, inst) in &decoded {
        let is_target = jump_targets.contains(offset);
        if is_target {
            output.push_str("      ┌──────────────────────────────────\n");
        }

        output.push_str(&format!("{:04} ", offset));
        output.push_str(if is_target { "► " } else { "  " });
        output.push_str(&format_instruction(inst, strings));
        output.push('\n');
    }

    Ok(output)
}

fn collect_jump_targets(decoded: &[(usize, Instruction)]) -> BTreeSet<usize> {
    decoded
        .iter()
        .filter(|(_, inst)| inst.kind.is_branch())
        .filter_map(|(_, inst)| inst.operand.as_ref().and_then(Operand::as_int))
        .filter(|target| *target >= 0)
        .map(|target| target as usize)
        .collect()
}

fn format_instruction(inst: &Instruction, strings: &StringTable) -> String {
    let name = inst.kind.to_string();
    match (inst.kind, &inst.operand) {
        (_, None) => name,
        (kind, Some(Operand::Int(target))) if kind.is_branch() => {
            if *target < 0 {
                format!("{:<11} <unbound>", name)
            } else {
                format!("{:<11} → {:04}", name, target)
            }
        }
        (OpCodeType::Ldloc | OpCodeType::Stloc, Some(Operand::Int(slot))) => {
            format!("{:<11} ${}", name, slot)
        }
        (OpCodeType::Ldarg, Some(Operand::Int(slot))) => format!("{:<11} arg{}", name, slot),
        (_, Some(Operand::Token(token))) => match strings.resolve(*token) {
            Some(text) => format!("{:<11} {:?}", name, text),
            None => format!("{:<11} #{} <missing>", name, token),
        },
        (_, Some(operand)) => format!("{:<11} {}", name, operand),
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Print bytecode statistics
pub fn print_module_stats(module: &ModuleBc) -> Result<(), DecodeError> {
    println!("=== BYTECODE STATISTICS ===\n");

    let mut counts: HashMap<OpCodeType, usize> = HashMap::new();
    let mut total = 0;
    for function in &module.functions {
        total += count_ops(&function.code, &mut counts)?;
    }

    let bytes: usize = module.functions.iter().map(|f| f.code.len()).sum();
    println!("Functions:    {}", module.functions.len());
    println!("Strings:      {}", module.strings.len());
    println!("Instructions: {}", total);
    println!("Bytes:        {}", bytes);
    println!();

    println!("Op frequency:");
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.tag().cmp(&b.0.tag())));

    for (op, count) in sorted.iter().take(10) {
        let pct = (**count as f64 / total as f64) * 100.0;
        println!("  {:<14} {:>4} ({:>5.1}%)", op, count, pct);
    }
    Ok(())
}

fn count_ops(code: &[u8], counts: &mut HashMap<OpCodeType, usize>) -> Result<usize, DecodeError> {
    let decoded = decode_all(code)?;
    for (_, inst) in &decoded {
        *counts.entry(inst.kind).or_insert(0) += 1;
    }
    Ok(decoded.len())
}
