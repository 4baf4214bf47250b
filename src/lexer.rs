// ABOUTME: Scans source text into a stream of tokens
//
// The outer loop is hand-driven (it needs to track byte offset and line
// number across multi-line string and block-comment literals, which a
// single combinator grammar can't do cleanly). Small `nom` recognizers
// handle the self-contained sub-grammars: numbers, identifiers/keywords,
// and string bodies.

use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::digit1;
use nom::combinator::recognize;
use nom::sequence::pair;
use nom::IResult;

use crate::error::LexError;
use crate::token::{Literal, Token, TokenKind};

pub struct Lexer<'a> {
    rest: &'a str,
    line: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

pub struct LexResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

pub fn scan(source: &str) -> LexResult {
    let mut lexer = Lexer::new(source);
    lexer.run();
    LexResult {
        tokens: lexer.tokens,
        errors: lexer.errors,
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_identifier_start),
        take_while(is_identifier_continue),
    ))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        digit1,
        nom::combinator::opt(pair(tag("."), digit1)),
    ))(input)
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            rest: source,
            line: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(&mut self) {
        // The lexer reports only the first error and stops scanning right
        // there; unlike the parser, there is no synchronize-and-continue
        // at this level.
        while !self.rest.is_empty() && self.errors.is_empty() {
            self.scan_token();
        }
        self.tokens.push(Token::new(
            TokenKind::Eof,
            "",
            Literal::None,
            self.line,
        ));
    }

    fn advance_rest(&mut self, new_rest: &'a str) {
        self.rest = new_rest;
    }

    fn push(&mut self, kind: TokenKind, lexeme: &str, literal: Literal) {
        self.tokens.push(Token::new(kind, lexeme, literal, self.line));
    }

    fn scan_token(&mut self) {
        let mut chars = self.rest.char_indices();
        let (_, c) = match chars.next() {
            Some(pair) => pair,
            None => return,
        };

        match c {
            '(' => self.simple(TokenKind::LeftParen, 1),
            ')' => self.simple(TokenKind::RightParen, 1),
            '{' => self.simple(TokenKind::LeftBrace, 1),
            '}' => self.simple(TokenKind::RightBrace, 1),
            ',' => self.simple(TokenKind::Comma, 1),
            '.' => self.simple(TokenKind::Dot, 1),
            '-' => self.two_char('-', TokenKind::Decrement, TokenKind::Minus),
            '+' => self.two_char('+', TokenKind::Increment, TokenKind::Plus),
            ';' => self.simple(TokenKind::Semicolon, 1),
            '*' => self.simple(TokenKind::Star, 1),
            '?' => self.simple(TokenKind::Question, 1),
            ':' => self.simple(TokenKind::Colon, 1),
            '!' => self.two_char('=', TokenKind::BangEqual, TokenKind::Bang),
            '=' => self.two_char('=', TokenKind::EqualEqual, TokenKind::Equal),
            '<' => self.two_char('=', TokenKind::LessEqual, TokenKind::Less),
            '>' => self.two_char('=', TokenKind::GreaterEqual, TokenKind::Greater),
            '/' => self.slash_or_comment(),
            ' ' | '\r' | '\t' => self.advance_rest(&self.rest[1..]),
            '\n' => {
                self.line += 1;
                self.advance_rest(&self.rest[1..]);
            }
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number_literal(),
            c if is_identifier_start(c) => self.identifier_or_keyword(),
            other => {
                self.errors.push(LexError::UnexpectedCharacter {
                    line: self.line,
                    character: other,
                });
                self.advance_rest(&self.rest[other.len_utf8()..]);
            }
        }
    }

    fn simple(&mut self, kind: TokenKind, len: usize) {
        let lexeme = self.rest[..len].to_string();
        self.advance_rest(&self.rest[len..]);
        self.push(kind, &lexeme, Literal::None);
    }

    fn two_char(&mut self, expect_next: char, two: TokenKind, one: TokenKind) {
        let mut it = self.rest.char_indices();
        it.next();
        if let Some((idx, c)) = it.next() {
            if c == expect_next {
                let lexeme = self.rest[..idx + c.len_utf8()].to_string();
                self.advance_rest(&self.rest[idx + c.len_utf8()..]);
                self.push(two, &lexeme, Literal::None);
                return;
            }
        }
        self.simple(one, 1);
    }

    fn slash_or_comment(&mut self) {
        let mut it = self.rest.char_indices();
        it.next();
        match it.next() {
            Some((_, '/')) => {
                // line comment: consume through end of line
                if let Some(nl) = self.rest.find('\n') {
                    self.advance_rest(&self.rest[nl..]);
                } else {
                    self.advance_rest("");
                }
            }
            Some((_, '*')) => {
                // block comment: does NOT nest, scans to the first "*/"
                let after_open = &self.rest[2..];
                if let Some(end) = after_open.find("*/") {
                    let consumed = &after_open[..end];
                    self.line += consumed.matches('\n').count();
                    self.advance_rest(&after_open[end + 2..]);
                } else {
                    self.line += after_open.matches('\n').count();
                    self.errors.push(LexError::UnterminatedComment { line: self.line });
                    self.advance_rest("");
                }
            }
            _ => self.simple(TokenKind::Slash, 1),
        }
    }

    fn string(&mut self) {
        let start_line = self.line;
        let after_quote = &self.rest[1..];
        let mut closed_at = None;
        let mut lines_inside = 0;
        for (i, c) in after_quote.char_indices() {
            if c == '"' {
                closed_at = Some(i);
                break;
            }
            if c == '\n' {
                lines_inside += 1;
            }
        }
        match closed_at {
            Some(end) => {
                let value = after_quote[..end].to_string();
                self.line += lines_inside;
                self.advance_rest(&after_quote[end + 1..]);
                let lexeme = format!("\"{}\"", value);
                self.push(TokenKind::String, &lexeme, Literal::String(value));
            }
            None => {
                self.line += lines_inside;
                self.errors.push(LexError::UnterminatedString { line: start_line });
                self.advance_rest("");
            }
        }
    }

    fn number_literal(&mut self) {
        match number(self.rest) {
            Ok((rest, matched)) => {
                let value: f64 = matched.parse().expect("nom guarantees a valid digit sequence");
                let lexeme = matched.to_string();
                self.advance_rest(rest);
                self.push(TokenKind::Number, &lexeme, Literal::Number(value));
            }
            Err(_) => {
                // unreachable: scan_token only dispatches here on an ascii digit
                self.simple(TokenKind::Number, 1);
            }
        }
    }

    fn identifier_or_keyword(&mut self) {
        match identifier(self.rest) {
            Ok((rest, matched)) => {
                let lexeme = matched.to_string();
                self.advance_rest(rest);
                match TokenKind::keyword(&lexeme) {
                    Some(kind) => self.push(kind, &lexeme, Literal::None),
                    None => self.push(TokenKind::Identifier, &lexeme, Literal::None),
                }
            }
            Err(_) => {
                self.simple(TokenKind::Identifier, 1);
            }
        }
    }
}
