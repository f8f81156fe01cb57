//! # Assembly listings
//!
//! A line-oriented text form that drives `FunctionAssembler` the way a
//! lowering pass does: scopes open and close with `{` / `}`, names are
//! declared with directives, and every instruction's stack effect is folded
//! into the frame right after it is emitted.
//!
//! ```text
//! .func main 0        ; name and arity
//! {
//! .var x
//! push 1
//! stloc $x            ; `$` names a variable
//! ldloc $x
//! brfalse @end        ; `@` names a label, forward references are fine
//! ldstr "hello"
//! pop 1
//! .bind end
//! }
//! ret
//! .end
//! ```

use thiserror::Error;

use crate::bytecode::ir::{CompiledFunction, ModuleBc};
use crate::bytecode::op::{OpCodeType, OperandKind};
use crate::bytecode::strings::Interner;
use crate::codegen::compile_error::{AssemblerError, CompileError};
use crate::codegen::emitter::{AssemblerConfig, FunctionAssembler, ScopeToken};
use crate::codegen::label::LabelId;

#[derive(Debug, Error)]
pub enum ListingError {
    /// `line` is 1-based.
    #[error("{line}: {message}")]
    Syntax { line: usize, message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

fn syntax(line: usize, message: impl Into<String>) -> ListingError {
    ListingError::Syntax {
        line,
        message: message.into(),
    }
}

/// Assemble every `.func` block of a listing into one module.
pub fn assemble_listing(source: &str, config: &AssemblerConfig) -> Result<ModuleBc, ListingError> {
    let mut module = ModuleBc::new();
    let mut lines = source.lines().enumerate().map(|(i, text)| (i + 1, text));

    while let Some((line, text)) = lines.next() {
        let stmt = strip_comment(text).trim();
        if stmt.is_empty() {
            continue;
        }

        let mut words = stmt.split_whitespace();
        if words.next() != Some(".func") {
            return Err(syntax(line, format!("expected .func, found '{}'", stmt)));
        }
        let name = words
            .next()
            .ok_or_else(|| syntax(line, ".func needs a name"))?;
        let arity = match words.next() {
            Some(n) => n
                .parse::<u32>()
                .map_err(|_| syntax(line, format!("invalid arity '{}'", n)))?,
            None => 0,
        };

        let function =
            assemble_function(name, arity, line, &mut lines, &mut module.strings, config)?;
        module.functions.push(function);
    }

    Ok(module)
}

fn assemble_function<'s, I: Interner>(
    name: &str,
    arity: u32,
    start: usize,
    lines: &mut impl Iterator<Item = (usize, &'s str)>,
    strings: &mut I,
    config: &AssemblerConfig,
) -> Result<CompiledFunction, ListingError> {
    let mut asm = FunctionAssembler::with_config(name, strings, config.clone());
    asm.set_arity(arity);
    let mut open: Vec<ScopeToken> = Vec::new();

    while let Some((line, text)) = lines.next() {
        let stmt = strip_comment(text).trim();
        if stmt.is_empty() {
            continue;
        }
        let col = text.len() - text.trim_start().len() + 1;
        asm.set_position(line, col);

        let (head, rest) = match stmt.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (stmt, ""),
        };

        match head {
            ".end" => {
                if !open.is_empty() {
                    return Err(syntax(line, format!("{} scope(s) left open", open.len())));
                }
                return Ok(asm.finish()?);
            }
            "{" => open.push(asm.enter_scope()),
            "}" => {
                let token = open.pop().ok_or_else(|| syntax(line, "unmatched '}'"))?;
                asm.exit_scope(token).map_err(|e| asm.located(e))?;
            }
            ".label" => {
                asm.create_label(single_name(line, head, rest)?)
                    .map_err(|e| asm.located(e))?;
            }
            ".bind" => {
                asm.bind_label(single_name(line, head, rest)?)
                    .map_err(|e| asm.located(e))?;
            }
            ".var" => {
                asm.create_variable(single_name(line, head, rest)?);
            }
            mnemonic => {
                let kind = OpCodeType::from_mnemonic(mnemonic)
                    .ok_or_else(|| syntax(line, format!("unknown instruction '{}'", mnemonic)))?;
                let effect = emit_statement(&mut asm, kind, rest, line)?;
                asm.apply_effect(effect).map_err(|e| asm.located(e))?;
            }
        }
    }

    Err(syntax(start, format!("function '{}' has no .end", name)))
}

fn emit_statement<I: Interner>(
    asm: &mut FunctionAssembler<'_, I>,
    kind: OpCodeType,
    arg: &str,
    line: usize,
) -> Result<i32, ListingError> {
    // a missing operand is left for the assembler to reject
    if arg.is_empty() {
        return asm.emit(kind).map_err(|e| asm.located(e).into());
    }

    let emitted = match kind.operand_kind() {
        OperandKind::None => {
            return Err(syntax(line, format!("{} takes no operand", kind)));
        }
        OperandKind::Int => {
            if let Some(name) = arg.strip_prefix('@') {
                let label = resolve_label(asm, name)?;
                asm.emit_label(kind, label)
            } else if let Some(name) = arg.strip_prefix('$') {
                let variable = if kind == OpCodeType::Stloc {
                    asm.get_or_create_variable(name)
                } else {
                    asm.get_variable(name).map_err(|e| asm.located(e))?
                };
                asm.emit_var(kind, &variable)
            } else {
                let value = arg
                    .parse::<i32>()
                    .map_err(|_| syntax(line, format!("invalid integer '{}'", arg)))?;
                asm.emit_int(kind, value)
            }
        }
        OperandKind::Float => {
            let value = arg
                .parse::<f64>()
                .map_err(|_| syntax(line, format!("invalid number '{}'", arg)))?;
            asm.emit_float(kind, value)
        }
        OperandKind::Token => {
            let text = parse_string(arg).ok_or_else(|| syntax(line, "expected a string literal"))?;
            asm.emit_str(kind, &text)
        }
    };

    emitted.map_err(|e| asm.located(e).into())
}

/// Look a label up through the scope chain, declaring it in the current
/// scope when it is not visible yet.
fn resolve_label<I: Interner>(
    asm: &mut FunctionAssembler<'_, I>,
    name: &str,
) -> Result<LabelId, ListingError> {
    match asm.get_label(name) {
        Ok(label) => Ok(label),
        Err(AssemblerError::LabelNotFound(_)) => {
            asm.create_label(name).map_err(|e| asm.located(e).into())
        }
        Err(e) => Err(asm.located(e).into()),
    }
}

fn single_name<'a>(line: usize, directive: &str, rest: &'a str) -> Result<&'a str, ListingError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(name), None) => Ok(name),
        _ => Err(syntax(line, format!("{} takes exactly one name", directive))),
    }
}

/// Cut a `;` comment, ignoring semicolons inside string literals.
fn strip_comment(text: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &text[..i],
            _ => {}
        }
    }
    text
}

fn parse_string(arg: &str) -> Option<String> {
    let inner = arg.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            _ => return None,
        }
    }
    Some(out)
}
