// ABOUTME: Static resolution pass computing lexical hop-distances for
// variable references ahead of evaluation.

use std::collections::HashMap;

use crate::ast::{Expr, FunctionDecl, NodeId, Stmt};
use crate::error::ResolveError;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>,
    resolutions: HashMap<NodeId, usize>,
    current_function: FunctionType,
    errors: Vec<ResolveError>,
}

pub struct ResolveOutcome {
    pub resolutions: HashMap<NodeId, usize>,
    pub errors: Vec<ResolveError>,
}

pub fn resolve(statements: &[Stmt]) -> ResolveOutcome {
    let mut resolver = Resolver::new();
    resolver.resolve_statements(statements);
    ResolveOutcome {
        resolutions: resolver.resolutions,
        errors: resolver.errors,
    }
}

impl Resolver {
    fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            resolutions: HashMap::new(),
            current_function: FunctionType::None,
            errors: Vec::new(),
        }
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body, increment } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
                if let Some(increment) = increment {
                    self.resolve_expr(increment);
                }
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors.push(ResolveError::Diagnostic {
                        token: keyword.clone(),
                        message: "Can't return from top-level code.".to_string(),
                    });
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            // `break`/`continue` outside a loop is a runtime error per
            // spec.md §4.4, checked by the evaluator's `loop_depth`
            // counter, not a static well-formedness rule here — §4.3's
            // list of resolver diagnostics doesn't include it.
            Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Grouping(inner) => self.resolve_expr(inner),
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.errors.push(ResolveError::Diagnostic {
                            token: name.clone(),
                            message: "Can't read local variable in its own initializer.".to_string(),
                        });
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            Expr::FunctionExpr { params, body } => {
                self.resolve_function_body(params, body, FunctionType::Function);
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        self.resolve_function_body(&decl.params, &decl.body, kind);
    }

    /// Shared by named function declarations and anonymous function
    /// expressions: push a function scope, declare+define parameters in
    /// it, resolve the body, then restore `current_function`.
    fn resolve_function_body(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(ResolveError::Diagnostic {
                    token: name.clone(),
                    message: "Multiple definition.".to_string(),
                });
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.resolutions.insert(id, i);
                return;
            }
        }
        // not found in any scope: treated as global, resolved at runtime
        // via the global environment directly.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    fn resolve_source(source: &str) -> ResolveOutcome {
        let tokens = lexer::scan(source).tokens;
        let parsed = parser::parse(tokens);
        assert!(parsed.errors.is_empty(), "unexpected parse errors: {:?}", parsed.errors);
        resolve(&parsed.statements)
    }

    #[test]
    fn resolves_local_variable_distance() {
        let outcome = resolve_source("{ var a = 1; { var b = a; } }");
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.resolutions.values().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn top_level_return_is_an_error() {
        let outcome = resolve_source("return 1;");
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn break_outside_loop_is_not_a_resolver_error() {
        // `break`/`continue` outside a loop is a runtime error caught by
        // the evaluator's `loop_depth` counter, not a static diagnostic.
        let outcome = resolve_source("break;");
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn if_resolves_both_branches() {
        // regression test for the historical bug where the else branch
        // was never visited and the then branch was visited twice.
        let outcome = resolve_source("if (true) { return 1; } else { return 2; }");
        // both branches produce a top-level-return diagnostic
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn ternary_resolves_all_three_arms() {
        let outcome = resolve_source("{ var a = 1; var b = 2; true ? a : b; }");
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.resolutions.len(), 2);
    }

    #[test]
    fn redeclaring_a_name_in_the_same_scope_is_an_error() {
        let outcome = resolve_source("{ var a = 1; var a = 2; }");
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn redeclaring_at_global_scope_is_not_an_error() {
        let outcome = resolve_source("var a = 1; var a = 2;");
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn function_expression_body_is_resolved() {
        let outcome = resolve_source("{ var a = 1; var f = fun () { return a; }; }");
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.resolutions.len(), 1);
    }

    #[test]
    fn for_loop_step_is_resolved() {
        // the step clause references `i`, declared by the for-loop's own
        // initializer, so it must resolve to a local distance.
        let outcome = resolve_source("for (var i = 0; i < 3; i = i + 1) { print i; }");
        assert!(outcome.errors.is_empty());
        assert!(!outcome.resolutions.is_empty());
    }
}
