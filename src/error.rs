// ABOUTME: Error types for each pipeline stage, plus the Diagnostic they
// all collapse into on the way to the sink.

use thiserror::Error;

use crate::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: usize,
    pub location: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, location: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("[line {}] Error{}: {}", self.line, self.location, self.message)
    }
}

#[derive(Error, Debug, Clone)]
pub enum LexError {
    #[error("Unexpected character.")]
    UnexpectedCharacter { line: usize, character: char },

    #[error("Unterminated string.")]
    UnterminatedString { line: usize },

    #[error("Unterminated comment.")]
    UnterminatedComment { line: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { line, .. } => *line,
            LexError::UnterminatedString { line } => *line,
            LexError::UnterminatedComment { line } => *line,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.line(), "", self.to_string())
    }
}

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("{message}")]
    Unexpected { token: Token, message: String },
}

impl ParseError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ParseError::Unexpected { token, message } => {
                let where_ = if token.kind == crate::token::TokenKind::Eof {
                    " at end".to_string()
                } else {
                    format!(" at '{}'", token.lexeme)
                };
                Diagnostic::new(token.line, where_, message.clone())
            }
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("{message}")]
    Diagnostic { token: Token, message: String },
}

impl ResolveError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            // spec.md §6: resolver diagnostics render with "a short tag
            // like `Resolver`", not the parser's " at '<lexeme>'"/" at end"
            // location — the two stages report where differently.
            ResolveError::Diagnostic { token, .. } => {
                Diagnostic::new(token.line, " Resolver", self.to_string())
            }
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("{message}")]
    Error { token: Token, message: String },
}

impl RuntimeError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        RuntimeError::Error {
            token,
            message: message.into(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            RuntimeError::Error { token, message } => {
                Diagnostic::new(token.line, "", message.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    #[test]
    fn resolve_error_renders_with_a_resolver_tag_not_a_token_location() {
        let token = Token::new(TokenKind::Return, "return", Literal::None, 1);
        let err = ResolveError::Diagnostic {
            token,
            message: "Can't return from top-level code.".to_string(),
        };
        assert_eq!(
            err.to_diagnostic().render(),
            "[line 1] Error Resolver: Can't return from top-level code."
        );
    }
}
