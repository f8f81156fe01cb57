use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use pain::bytecode::disasm::{disassemble_to_string, print_module, print_module_stats};
use pain::bytecode::ir::ModuleBc;
use pain::bytecode::stack_check_error::check_code;
use pain::codegen::AssemblerConfig;
use pain::frontend::assemble_listing;

/// Pain bytecode assembler and inspector
#[derive(Parser)]
#[command(name = "pain", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a `.pasm` listing into a `.pbc` module
    Build {
        input: PathBuf,

        /// Output path, defaults to the input with a `.pbc` extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Encode `pop 0` instead of dropping it
        #[arg(long)]
        keep_zero_pop: bool,

        /// Accept unbound labels and a non-empty stack at function end
        #[arg(long)]
        lenient: bool,

        /// Print the disassembly after building
        #[arg(long)]
        dis: bool,
    },

    /// Disassemble a `.pbc` module
    Dis {
        input: PathBuf,

        /// Print opcode statistics instead of the listing
        #[arg(long)]
        stats: bool,
    },

    /// Run the linear stack check over every function of a `.pbc` module
    Check { input: PathBuf },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Build {
            input,
            output,
            keep_zero_pop,
            lenient,
            dis,
        } => {
            let config = AssemblerConfig {
                elide_zero_pop: !keep_zero_pop,
                require_bound_labels: !lenient,
                require_balanced_stack: !lenient,
            };
            let output = output.unwrap_or_else(|| input.with_extension("pbc"));
            build(&input, &output, &config, dis)
        }
        Command::Dis { input, stats } => {
            let module = load_module(&input)?;
            if stats {
                print_module_stats(&module)?;
            } else {
                print_module(&module)?;
            }
            Ok(())
        }
        Command::Check { input } => check(&input),
    }
}

fn build(input: &Path, output: &Path, config: &AssemblerConfig, dis: bool) -> anyhow::Result<()> {
    ensure_extension(input, "pasm")?;

    let source = fs::read_to_string(input)
        .with_context(|| format!("failed to read '{}'", input.display()))?;
    let module = assemble_listing(&source, config)
        .with_context(|| format!("failed to assemble '{}'", input.display()))?;

    let bytes = module.to_bytes()?;
    fs::write(output, &bytes)
        .with_context(|| format!("failed to write '{}'", output.display()))?;

    log::info!(
        "wrote {} function(s), {} string(s) to {}",
        module.functions.len(),
        module.strings.len(),
        output.display()
    );

    if dis {
        print_module(&module)?;
    }
    Ok(())
}

fn check(input: &Path) -> anyhow::Result<()> {
    let module = load_module(input)?;
    let mut failed = 0;

    for function in &module.functions {
        match check_code(&function.code) {
            Ok(summary) => println!(
                "{:<20} ok    {} instructions, peak {} (declared {})",
                function.name, summary.instructions, summary.max_depth, function.max_stack
            ),
            Err(e) => {
                failed += 1;
                println!("{:<20} FAIL  {}", function.name, e);
                if let Ok(listing) = disassemble_to_string(&function.code, &module.strings) {
                    print!("{}", listing);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} function(s) failed the stack check", failed);
    }
    Ok(())
}

fn load_module(path: &Path) -> anyhow::Result<ModuleBc> {
    ensure_extension(path, "pbc")?;
    let bytes = fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    ModuleBc::from_bytes(&bytes)
        .with_context(|| format!("'{}' is not a bytecode module", path.display()))
}

fn ensure_extension(path: &Path, expected: &str) -> anyhow::Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some(expected) {
        bail!("expected a .{} file, got {}", expected, path.display());
    }
    Ok(())
}
