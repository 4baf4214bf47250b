use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};

use rlox::diagnostics::DiagnosticSink;
use rlox::Outcome;

const EXIT_USAGE: u8 = 64;
const EXIT_STATIC_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;

/// A tree-walking interpreter for a small dynamically-typed scripting language.
#[derive(Parser, Debug)]
#[command(name = "rlox")]
#[command(version)]
#[command(about = "A tree-walking interpreter for a small dynamically-typed scripting language")]
struct CliArgs {
    /// Script file to execute. If omitted, starts an interactive REPL.
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    // `clap`'s own `parse()` exits with its own usage-error code on a bad
    // invocation; the spec's exit-code contract reserves 64 for that case,
    // so the failure path is handled explicitly instead.
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            use clap::error::ErrorKind;
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    match args.script {
        Some(path) => run_file(&path),
        None => run_repl(),
    }
}

fn run_file(path: &PathBuf) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file '{}': {}", path.display(), err);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let mut sink = DiagnosticSink::new();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match rlox::run(&source, &mut out) {
        Outcome::Ok => ExitCode::SUCCESS,
        Outcome::StaticError(diagnostics) => {
            sink.report_all(&diagnostics);
            ExitCode::from(EXIT_STATIC_ERROR)
        }
        Outcome::RuntimeError(diagnostic) => {
            sink.report(&diagnostic);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_repl() -> ExitCode {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), _> = match Editor::with_config(config) {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Failed to initialize REPL: {}", err);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let history_file = ".rlox_history";
    let _ = rl.load_history(history_file);

    let mut sink = DiagnosticSink::new();

    loop {
        let readline = rl.readline("rlox> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                sink.reset();
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                match rlox::run(&line, &mut out) {
                    Outcome::Ok => {}
                    Outcome::StaticError(diagnostics) => sink.report_all(&diagnostics),
                    Outcome::RuntimeError(diagnostic) => sink.report(&diagnostic),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    ExitCode::SUCCESS
}
