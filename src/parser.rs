// ABOUTME: Recursive-descent, precedence-climbing parser over the token
// stream produced by the lexer.
//
// program        -> declaration* EOF ;
// declaration    -> funDecl | varDecl | statement ;
// funDecl        -> "fun" function ;
// function       -> IDENTIFIER "(" parameters? ")" block ;
// parameters     -> IDENTIFIER ( "," IDENTIFIER )* ;
// varDecl        -> "var" IDENTIFIER ( "=" expression )? ";" ;
// statement      -> exprStmt | forStmt | ifStmt | printStmt | returnStmt
//                  | breakStmt | continueStmt | whileStmt | block ;
// exprStmt       -> expression ";" ;
// forStmt        -> "for" "(" ( varDecl | exprStmt | ";" )
//                    expression? ";" expression? ")" statement ;
// ifStmt         -> "if" "(" expression ")" statement ( "else" statement )? ;
// printStmt      -> "print" expression ";" ;
// returnStmt     -> "return" expression? ";" ;
// breakStmt      -> "break" ";" ;
// continueStmt   -> "continue" ";" ;
// whileStmt      -> "while" "(" expression ")" statement ;
// block          -> "{" declaration* "}" ;
// expression     -> assignment ;
// assignment     -> IDENTIFIER ( "=" assignment | "++" | "--" ) | logic_or ;
// logic_or       -> logic_and ( "or" logic_and )* ;
// logic_and      -> ternary ( "and" ternary )* ;
// ternary        -> equality ( "?" expression ":" ternary )? ;
// equality       -> comparison ( ( "!=" | "==" ) comparison )* ;
// comparison     -> term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
// term           -> factor ( ( "-" | "+" ) factor )* ;
// factor         -> unary ( ( "/" | "*" ) unary )* ;
// unary          -> ( "!" | "-" ) unary | call ;
// call           -> primary ( "(" arguments? ")" )* ;
// arguments      -> expression ( "," expression )* ;
// primary        -> NUMBER | STRING | "true" | "false" | "nil"
//                  | "(" expression ")" | IDENTIFIER | "fun" functionBody ;
// functionBody   -> "(" parameters? ")" "{" declaration* "}" ;

use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, LiteralValue, NodeId, Stmt};
use crate::error::ParseError;
use crate::token::{Literal, Token, TokenKind};

const MAX_ARGS: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_node_id: NodeId,
    errors: Vec<ParseError>,
}

pub struct ParseOutcome {
    pub statements: Vec<Stmt>,
    pub errors: Vec<ParseError>,
}

pub fn parse(tokens: Vec<Token>) -> ParseOutcome {
    let mut parser = Parser::new(tokens);
    let statements = parser.parse_program();
    ParseOutcome {
        statements,
        errors: parser.errors,
    }
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            next_node_id: 0,
            errors: Vec::new(),
        }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn parse_program(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        statements
    }

    // ----- declarations -----

    fn declaration(&mut self) -> PResult<Stmt> {
        // `fun` only starts a declaration when followed by a name; bare
        // `fun (...) { ... }` is a function-expression primary instead,
        // so we need one token of lookahead past `fun` to tell them apart.
        if self.check(TokenKind::Fun) && self.check_next(TokenKind::Identifier) {
            self.advance();
            return self.function_declaration("function");
        }
        if self.match_kind(&[TokenKind::Var]) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn function_declaration(&mut self, kind: &str) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {} name.", kind))?;
        self.consume(TokenKind::LeftParen, &format!("Expect '(' after {} name.", kind))?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, &format!("Expect '{{' before {} body.", kind))?;
        let body = self.block()?;
        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn var_declaration(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.match_kind(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // ----- statements -----

    fn statement(&mut self) -> PResult<Stmt> {
        if self.match_kind(&[TokenKind::For]) {
            return self.for_statement();
        }
        if self.match_kind(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.match_kind(&[TokenKind::Print]) {
            return self.print_statement();
        }
        if self.match_kind(&[TokenKind::Return]) {
            return self.return_statement();
        }
        if self.match_kind(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.match_kind(&[TokenKind::Break]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.")?;
            return Ok(Stmt::Break(keyword));
        }
        if self.match_kind(&[TokenKind::Continue]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.")?;
            return Ok(Stmt::Continue(keyword));
        }
        if self.match_kind(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_kind(&[TokenKind::Semicolon]) {
            None
        } else if self.check(TokenKind::Var) {
            self.advance();
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let body = self.statement()?;

        // The step clause lives in `While::increment`, not folded into the
        // body block, so that `continue` (which unwinds straight out of the
        // body) still runs it before the condition is re-checked.
        let condition = condition.unwrap_or(Expr::Literal(LiteralValue::Bool(true)));
        let mut desugared = Stmt::While {
            condition,
            body: Box::new(body),
            increment,
        };

        if let Some(initializer) = initializer {
            desugared = Stmt::Block(vec![initializer, desugared]);
        }

        Ok(desugared)
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_kind(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> PResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While {
            condition,
            body,
            increment: None,
        })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // ----- expressions -----

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.logic_or()?;

        if self.match_kind(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            if let Expr::Variable { name, .. } = expr {
                let id = self.fresh_id();
                return Ok(Expr::Assign {
                    id,
                    name,
                    value: Box::new(value),
                });
            }

            self.errors.push(ParseError::Unexpected {
                token: equals,
                message: "Invalid assignment target.".to_string(),
            });
            return Ok(expr);
        }

        if self.match_kind(&[TokenKind::Increment, TokenKind::Decrement]) {
            let op_token = self.previous().clone();
            if let Expr::Variable { name, .. } = expr {
                return Ok(self.desugar_crement(name, &op_token));
            }

            self.errors.push(ParseError::Unexpected {
                token: op_token,
                message: "Invalid assignment target.".to_string(),
            });
            return Ok(expr);
        }

        Ok(expr)
    }

    /// Desugars `name++`/`name--` into `name = name + 1`/`name = name - 1`,
    /// per the grammar's assignment-level production for these operators.
    fn desugar_crement(&mut self, name: Token, op_token: &Token) -> Expr {
        let (op_kind, op_lexeme) = if op_token.kind == TokenKind::Increment {
            (TokenKind::Plus, "+")
        } else {
            (TokenKind::Minus, "-")
        };
        let read_id = self.fresh_id();
        let operator = Token::new(op_kind, op_lexeme, Literal::None, op_token.line);
        let step = Expr::Binary {
            left: Box::new(Expr::Variable {
                id: read_id,
                name: name.clone(),
            }),
            operator,
            right: Box::new(Expr::Literal(LiteralValue::Number(1.0))),
        };
        let assign_id = self.fresh_id();
        Expr::Assign {
            id: assign_id,
            name,
            value: Box::new(step),
        }
    }

    fn logic_or(&mut self) -> PResult<Expr> {
        let mut expr = self.logic_and()?;
        while self.match_kind(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> PResult<Expr> {
        let mut expr = self.ternary()?;
        while self.match_kind(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.ternary()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn ternary(&mut self) -> PResult<Expr> {
        let condition = self.equality()?;

        if self.match_kind(&[TokenKind::Question]) {
            let then_branch = self.expression()?;
            self.consume(TokenKind::Colon, "Expect ':' after '?' branch of ternary expression.")?;
            let else_branch = self.ternary()?;
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(condition)
    }

    fn equality(&mut self) -> PResult<Expr> {
        let mut expr = self.comparison()?;
        while self.match_kind(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut expr = self.term()?;
        while self.match_kind(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut expr = self.factor()?;
        while self.match_kind(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> PResult<Expr> {
        let mut expr = self.unary()?;
        while self.match_kind(&[TokenKind::Slash, TokenKind::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.match_kind(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.match_kind(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> PResult<Expr> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    self.error_at_current("Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.match_kind(&[TokenKind::False]) {
            return Ok(Expr::Literal(LiteralValue::Bool(false)));
        }
        if self.match_kind(&[TokenKind::True]) {
            return Ok(Expr::Literal(LiteralValue::Bool(true)));
        }
        if self.match_kind(&[TokenKind::Nil]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }
        if self.match_kind(&[TokenKind::Number]) {
            return match &self.previous().literal {
                Literal::Number(n) => Ok(Expr::Literal(LiteralValue::Number(*n))),
                _ => unreachable!("lexer guarantees a Number literal on a Number token"),
            };
        }
        if self.match_kind(&[TokenKind::String]) {
            return match &self.previous().literal {
                Literal::String(s) => Ok(Expr::Literal(LiteralValue::String(s.clone()))),
                _ => unreachable!("lexer guarantees a String literal on a String token"),
            };
        }
        if self.match_kind(&[TokenKind::Identifier]) {
            let id = self.fresh_id();
            return Ok(Expr::Variable {
                id,
                name: self.previous().clone(),
            });
        }
        if self.match_kind(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }
        if self.match_kind(&[TokenKind::Fun]) {
            return self.function_expr();
        }

        Err(self.make_error(self.peek().clone(), "Expect expression."))
    }

    /// Parses the `"(" parameters? ")" "{" declaration* "}"` tail shared
    /// by named function declarations and anonymous function literals.
    fn function_expr(&mut self) -> PResult<Expr> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'fun'.")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block()?;
        Ok(Expr::FunctionExpr {
            params,
            body: Rc::from(body.into_boxed_slice()),
        })
    }

    // ----- token-stream plumbing -----

    fn match_kind(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    /// One token of lookahead past the current token, used to decide
    /// whether `fun` starts a named declaration or an anonymous literal.
    fn check_next(&self, kind: TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        match self.tokens.get(self.current + 1) {
            Some(token) => token.kind == kind,
            None => false,
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<Token> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.make_error(self.peek().clone(), message))
    }

    fn make_error(&self, token: Token, message: &str) -> ParseError {
        ParseError::Unexpected {
            token,
            message: message.to_string(),
        }
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.peek().clone();
        let err = self.make_error(token, message);
        self.errors.push(err);
    }

    /// Discards tokens until a likely statement boundary, so one syntax
    /// error doesn't cascade into a wall of spurious follow-on errors.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
