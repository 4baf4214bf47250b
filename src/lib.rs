// ABOUTME: Library module exposing internal components for testing

pub mod ast;
pub mod builtins;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod value;

use std::io::Write;

use error::Diagnostic;

/// Which stage a run stopped at, so the CLI can translate it into the
/// right exit code: static errors (lex/parse/resolve) map to 65, a
/// runtime error maps to 70.
pub enum Outcome {
    Ok,
    StaticError(Vec<Diagnostic>),
    RuntimeError(Diagnostic),
}

/// Runs a complete program through the full pipeline, writing `print`
/// output to `output`.
pub fn run(source: &str, output: &mut dyn Write) -> Outcome {
    let scan = lexer::scan(source);
    if !scan.errors.is_empty() {
        return Outcome::StaticError(scan.errors.iter().map(|e| e.to_diagnostic()).collect());
    }

    let parsed = parser::parse(scan.tokens);
    if !parsed.errors.is_empty() {
        return Outcome::StaticError(parsed.errors.iter().map(|e| e.to_diagnostic()).collect());
    }

    let resolved = resolver::resolve(&parsed.statements);
    if !resolved.errors.is_empty() {
        return Outcome::StaticError(resolved.errors.iter().map(|e| e.to_diagnostic()).collect());
    }

    let mut interp = interpreter::Interpreter::new(resolved.resolutions, output);
    match interp.interpret(&parsed.statements) {
        Ok(()) => Outcome::Ok,
        Err(err) => Outcome::RuntimeError(err.to_diagnostic()),
    }
}
