// ABOUTME: Formats and accumulates diagnostics for the CLI/REPL adapter,
// so `main` never touches a global error flag.

use crate::error::Diagnostic;

pub struct DiagnosticSink {
    had_error: bool,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink { had_error: false }
    }

    pub fn report_all(&mut self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }

    pub fn report(&mut self, diagnostic: &Diagnostic) {
        eprintln!("{}", diagnostic.render());
        self.had_error = true;
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    /// The REPL clears this between lines; a runtime error on one line
    /// shouldn't poison the rest of the session.
    pub fn reset(&mut self) {
        self.had_error = false;
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_exact_diagnostic_format() {
        let d = Diagnostic::new(3, "", "Undefined variable 'x'.");
        assert_eq!(d.render(), "[line 3] Error: Undefined variable 'x'.");
    }

    #[test]
    fn renders_parse_location() {
        let d = Diagnostic::new(1, " at 'foo'", "Expect expression.");
        assert_eq!(d.render(), "[line 1] Error at 'foo': Expect expression.");
    }

    #[test]
    fn tracks_and_resets_error_state() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.had_error());
        sink.report(&Diagnostic::new(1, "", "boom"));
        assert!(sink.had_error());
        sink.reset();
        assert!(!sink.had_error());
    }
}
