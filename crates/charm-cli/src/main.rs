use std::fs;
use std::process::ExitCode;

use charm_core::bytecode::compiler::Compiler;
use charm_core::intern::Interner;
use charm_core::parser::parse;
use clap::Parser;

/// A small dynamically typed scripting language.
///
/// With no flags, runs `file` through the tree-walk interpreter and, unless
/// it declares a function (the bytecode VM has no call instruction), also
/// through the compiler and VM, reporting a divergence between the two as a
/// bug rather than trusting either silently.
#[derive(Parser)]
#[command(name = "charm", version, about)]
struct Args {
    /// Source file to run.
    file: String,

    /// Parse `file` and print its AST instead of running it.
    #[arg(long)]
    dump_ast: bool,

    /// Compile `file` and print its disassembled bytecode instead of running it.
    #[arg(long)]
    dump_bc: bool,

    /// Run only the bytecode VM.
    #[arg(long, conflicts_with = "walk_only")]
    vm_only: bool,

    /// Run only the tree-walk interpreter.
    #[arg(long)]
    walk_only: bool,
}

fn main() -> ExitCode {
    // `try_parse` instead of `parse`: clap's own `.exit()` path on a usage
    // error always uses code 2, which would collide with this CLI's own
    // code 2 for a file read failure (spec §6 reserves 1 for bad usage, 2
    // for read failure). Handling the error ourselves keeps the two apart.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // `--help`/`--version` are handled as clap errors too, but they
            // are not "bad usage": let clap print them to the stream (and
            // exit code) it already knows is right, and reserve our own
            // exit-1 codepath for actual usage mistakes.
            let _ = err.print();
            return if err.exit_code() == 0 { ExitCode::SUCCESS } else { ExitCode::from(1) };
        }
    };

    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: could not read {}: {err}", args.file);
            return ExitCode::from(2);
        }
    };

    if args.dump_ast {
        return dump_ast(&source);
    }
    if args.dump_bc {
        return dump_bytecode(&source);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if args.vm_only {
        return match run_vm_only(&source) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        };
    }

    if args.walk_only {
        return match charm_core::run_tree_walk(&source, &mut out) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        };
    }

    match charm_core::run_both(&source, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_vm_only(source: &str) -> Result<(), charm_core::CharmError> {
    charm_core::run_vm(source).map(|_| ())
}

fn dump_ast(source: &str) -> ExitCode {
    let mut interner = Interner::new();
    match parse(source, &mut interner) {
        Ok(program) => {
            for stmt in &program.statements {
                println!("{stmt:?}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn dump_bytecode(source: &str) -> ExitCode {
    let mut interner = Interner::new();
    let program = match parse(source, &mut interner) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match Compiler::compile(&program) {
        Ok(chunk) => {
            // Bytecode is not persisted anywhere, so there is no stable
            // disassembly format to match; a flat hex dump is enough for a
            // debugging aid.
            for byte in chunk.code() {
                print!("{byte:02x} ");
            }
            println!();
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
