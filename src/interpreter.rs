// ABOUTME: Tree-walking evaluator. Executes a resolved program against a
// chain of environments, using an explicit control-flow sum type instead
// of errors-as-signals for return/break/continue.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, LiteralValue, NodeId, Stmt};
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::token::{Token, TokenKind};
use crate::value::{Callable, LoxFunction, Value};

/// Outcome of executing a statement: either it ran to completion, or it
/// is carrying a non-local control transfer up to the nearest construct
/// that handles it (a loop for break/continue, a call frame for return).
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
    /// A `return` whose value expression was itself a call: the call is
    /// deferred to the enclosing call-frame's trampoline loop instead of
    /// being evaluated here, so tail-recursive Lox functions don't grow
    /// the Rust call stack.
    TailCall(Rc<LoxFunction>, Vec<Value>, Token),
}

pub struct Interpreter<'out> {
    globals: Rc<Environment>,
    resolutions: HashMap<NodeId, usize>,
    output: &'out mut dyn Write,
    /// Incremented on entry to a `while` and decremented on every exit
    /// path; `break`/`continue` check this rather than a static scope
    /// rule, since a loop body isn't lexically nested the way blocks are.
    loop_depth: usize,
}

impl<'out> Interpreter<'out> {
    pub fn new(resolutions: HashMap<NodeId, usize>, output: &'out mut dyn Write) -> Self {
        let globals = Environment::new();
        crate::builtins::install(&globals);
        Interpreter {
            globals,
            resolutions,
            output,
            loop_depth: 0,
        }
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        let globals = Rc::clone(&self.globals);
        for stmt in statements {
            match self.execute_stmt(stmt, &globals)? {
                // A bare return/break/continue surfacing at top level means
                // the resolver's diagnostics already halted the pipeline
                // before reaching here in the normal flow; tolerate it
                // rather than panicking.
                Flow::TailCall(func, args, paren) => {
                    self.call_user_function(func, args, &paren)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ----- statements -----

    fn execute_block(&mut self, statements: &[Stmt], env: &Rc<Environment>) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            match self.execute_stmt(stmt, env)? {
                Flow::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_stmt(&mut self, stmt: &Stmt, env: &Rc<Environment>) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr, env)?;
                writeln!(self.output, "{}", value).expect("writing to the configured output sink must not fail");
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                env.define(name.lexeme.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Block(statements) => {
                let child = Environment::with_parent(Rc::clone(env));
                self.execute_block(statements, &child)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute_stmt(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute_stmt(else_branch, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body, increment } => {
                // `loop_depth` is restored on every exit path below
                // (normal completion, break, or a propagated error),
                // not just the happy path.
                self.loop_depth += 1;
                let result = self.run_while_body(condition, body, increment.as_ref(), env);
                self.loop_depth -= 1;
                result
            }
            Stmt::Function(decl) => {
                let func = self.make_function(decl, env);
                env.define(decl.name.lexeme.clone(), Value::Callable(Callable::User(func)));
                Ok(Flow::Normal)
            }
            Stmt::Return { value, keyword } => match value {
                Some(Expr::Call {
                    callee,
                    paren,
                    arguments,
                }) => {
                    let callee_value = self.evaluate(callee, env)?;
                    let args = self.evaluate_arguments(arguments, env)?;
                    match callee_value {
                        Value::Callable(Callable::User(func)) => {
                            if args.len() != func.params.len() {
                                return Err(RuntimeError::new(
                                    paren.clone(),
                                    format!(
                                        "Expected {} arguments but got {}.",
                                        func.params.len(),
                                        args.len()
                                    ),
                                ));
                            }
                            Ok(Flow::TailCall(func, args, paren.clone()))
                        }
                        other => {
                            let result = self.call_value(other, args, paren)?;
                            Ok(Flow::Return(result))
                        }
                    }
                }
                Some(expr) => Ok(Flow::Return(self.evaluate(expr, env)?)),
                None => {
                    let _ = keyword;
                    Ok(Flow::Return(Value::Nil))
                }
            },
            Stmt::Break(keyword) => {
                if self.loop_depth == 0 {
                    return Err(RuntimeError::new(keyword.clone(), "'break' outside loop".to_string()));
                }
                Ok(Flow::Break)
            }
            Stmt::Continue(keyword) => {
                if self.loop_depth == 0 {
                    return Err(RuntimeError::new(keyword.clone(), "'continue' outside loop.".to_string()));
                }
                Ok(Flow::Continue)
            }
        }
    }

    /// Runs one `while`'s condition/body/step cycle. Factored out of
    /// `execute_stmt` so `loop_depth` can be decremented on every exit
    /// path (including a propagated runtime error) by the caller.
    fn run_while_body(
        &mut self,
        condition: &Expr,
        body: &Stmt,
        increment: Option<&Expr>,
        env: &Rc<Environment>,
    ) -> Result<Flow, RuntimeError> {
        while self.evaluate(condition, env)?.is_truthy() {
            match self.execute_stmt(body, env)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {
                    // The step clause runs after every iteration,
                    // `continue` included, and before the condition is
                    // re-checked; only `break` skips it.
                    if let Some(increment) = increment {
                        self.evaluate(increment, env)?;
                    }
                }
                other @ (Flow::Return(_) | Flow::TailCall(..)) => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn make_function(&self, decl: &Rc<FunctionDecl>, env: &Rc<Environment>) -> Rc<LoxFunction> {
        Rc::new(LoxFunction {
            name: Some(decl.name.lexeme.clone()),
            params: decl.params.clone(),
            body: Rc::from(decl.body.clone().into_boxed_slice()),
            closure: Rc::clone(env),
        })
    }

    // ----- expressions -----

    fn evaluate(&mut self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Grouping(inner) => self.evaluate(inner, env),
            Expr::Variable { id, name } => self.lookup_variable(*id, name, env),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value, env)?;
                match self.resolutions.get(id) {
                    Some(distance) => env.assign_at(*distance, name, value.clone()),
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right, env),
            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right, env),
            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right, env),
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.evaluate(then_branch, env)
                } else {
                    self.evaluate(else_branch, env)
                }
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee, env)?;
                let args = self.evaluate_arguments(arguments, env)?;
                self.call_value(callee_value, args, paren)
            }
            Expr::FunctionExpr { params, body } => {
                let func = Rc::new(LoxFunction {
                    name: None,
                    params: params.clone(),
                    body: Rc::clone(body),
                    closure: Rc::clone(env),
                });
                Ok(Value::Callable(Callable::User(func)))
            }
        }
    }

    fn evaluate_arguments(&mut self, arguments: &[Expr], env: &Rc<Environment>) -> Result<Vec<Value>, RuntimeError> {
        arguments.iter().map(|arg| self.evaluate(arg, env)).collect()
    }

    fn lookup_variable(&self, id: NodeId, name: &Token, env: &Rc<Environment>) -> Result<Value, RuntimeError> {
        match self.resolutions.get(&id) {
            Some(distance) => Ok(env.get_at(*distance, &name.lexeme)),
            None => self.globals.get_or_error(name),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr, env: &Rc<Environment>) -> Result<Value, RuntimeError> {
        let right = self.evaluate(right, env)?;
        match operator.kind {
            TokenKind::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(operator.clone(), "Operand must be a number.".to_string())),
            },
            TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("parser only produces Unary nodes for '-' and '!'"),
        }
    }

    fn evaluate_logical(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let left_value = self.evaluate(left, env)?;
        match operator.kind {
            TokenKind::Or if left_value.is_truthy() => Ok(left_value),
            TokenKind::And if !left_value.is_truthy() => Ok(left_value),
            _ => self.evaluate(right, env),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left, env)?;
        let right = self.evaluate(right, env)?;

        match operator.kind {
            TokenKind::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                // A string concatenated with a number coerces the number
                // side through the same minimal-decimal formatting `print`
                // uses, so `"n=" + 1` and `print 1;` agree on digits.
                (Value::String(a), Value::Number(b)) => {
                    Ok(Value::String(format!("{}{}", a, crate::value::stringify_number(*b))))
                }
                (Value::Number(a), Value::String(b)) => {
                    Ok(Value::String(format!("{}{}", crate::value::stringify_number(*a), b)))
                }
                _ => Err(RuntimeError::new(
                    operator.clone(),
                    "Operands must be numbers or strings.".to_string(),
                )),
            },
            TokenKind::Minus => {
                let (a, b) = numeric_operands(operator, &left, &right)?;
                Ok(Value::Number(a - b))
            }
            TokenKind::Star => {
                let (a, b) = numeric_operands(operator, &left, &right)?;
                Ok(Value::Number(a * b))
            }
            TokenKind::Slash => {
                let (a, b) = numeric_operands(operator, &left, &right)?;
                Ok(Value::Number(a / b))
            }
            TokenKind::Greater => {
                let (a, b) = numeric_operands(operator, &left, &right)?;
                Ok(Value::Bool(a > b))
            }
            TokenKind::GreaterEqual => {
                let (a, b) = numeric_operands(operator, &left, &right)?;
                Ok(Value::Bool(a >= b))
            }
            TokenKind::Less => {
                let (a, b) = numeric_operands(operator, &left, &right)?;
                Ok(Value::Bool(a < b))
            }
            TokenKind::LessEqual => {
                let (a, b) = numeric_operands(operator, &left, &right)?;
                Ok(Value::Bool(a <= b))
            }
            TokenKind::BangEqual => Ok(Value::Bool(!left.lox_equals(&right))),
            TokenKind::EqualEqual => Ok(Value::Bool(left.lox_equals(&right))),
            _ => unreachable!("parser only produces Binary nodes for the operators handled above"),
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> Result<Value, RuntimeError> {
        let callable = match callee {
            Value::Callable(c) => c,
            _ => {
                return Err(RuntimeError::new(
                    paren.clone(),
                    "Can only call functions and classes.".to_string(),
                ))
            }
        };

        if args.len() != callable.arity() {
            return Err(RuntimeError::new(
                paren.clone(),
                format!("Expected {} arguments but got {}.", callable.arity(), args.len()),
            ));
        }

        match callable {
            Callable::Native(native) => (native.func)(&args),
            Callable::User(func) => self.call_user_function(func, args, paren),
        }
    }

    /// Trampoline: loops instead of recursing when a function body's
    /// `return` is itself a call, so tail-recursive Lox programs run in
    /// constant Rust stack space.
    fn call_user_function(
        &mut self,
        mut func: Rc<LoxFunction>,
        mut args: Vec<Value>,
        call_site: &Token,
    ) -> Result<Value, RuntimeError> {
        loop {
            let call_env = Environment::with_parent(Rc::clone(&func.closure));
            for (param, arg) in func.params.iter().zip(args.into_iter()) {
                call_env.define(param.lexeme.clone(), arg);
            }

            match self.execute_block(&func.body, &call_env)? {
                Flow::Return(value) => return Ok(value),
                Flow::Normal => return Ok(Value::Nil),
                Flow::TailCall(next_func, next_args, _) => {
                    func = next_func;
                    args = next_args;
                    continue;
                }
                Flow::Break | Flow::Continue => {
                    return Err(RuntimeError::new(
                        call_site.clone(),
                        "Internal error: break/continue escaped a function body.".to_string(),
                    ))
                }
            }
        }
    }
}

fn literal_value(lit: &LiteralValue) -> Value {
    match lit {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Nil => Value::Nil,
    }
}

fn numeric_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(RuntimeError::new(operator.clone(), "Operands must be numbers.".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser, resolver};

    fn run(source: &str) -> String {
        let tokens = lexer::scan(source).tokens;
        let parsed = parser::parse(tokens);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        let resolved = resolver::resolve(&parsed.statements);
        assert!(resolved.errors.is_empty(), "resolve errors: {:?}", resolved.errors);

        let mut buf = Vec::new();
        {
            let mut interp = Interpreter::new(resolved.resolutions, &mut buf);
            interp.interpret(&parsed.statements).expect("program should run without a runtime error");
        }
        String::from_utf8(buf).unwrap()
    }

    fn run_err(source: &str) -> RuntimeError {
        let tokens = lexer::scan(source).tokens;
        let parsed = parser::parse(tokens);
        assert!(parsed.errors.is_empty());
        let resolved = resolver::resolve(&parsed.statements);
        assert!(resolved.errors.is_empty());
        let mut buf = Vec::new();
        let mut interp = Interpreter::new(resolved.resolutions, &mut buf);
        interp.interpret(&parsed.statements).expect_err("expected a runtime error")
    }

    #[test]
    fn recursive_fibonacci() {
        let out = run(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
        );
        assert_eq!(out, "55\n");
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let out = run(
            "fun makeCounter() { var i = 0; fun counter() { i = i + 1; return i; } return counter; } \
             var c = makeCounter(); print c(); print c(); print c();",
        );
        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn block_scoping_shadows_outer_variable() {
        let out = run("var a = \"global\"; { var a = \"inner\"; print a; } print a;");
        assert_eq!(out, "inner\nglobal\n");
    }

    #[test]
    fn logical_operators_short_circuit() {
        let out = run(
            "fun never() { print \"should not print\"; return true; } \
             print false and never(); \
             print true or never();",
        );
        assert_eq!(out, "false\ntrue\n");
    }

    #[test]
    fn while_loop_break_and_continue() {
        let out = run(
            "var i = 0; var sum = 0; while (i < 5) { i = i + 1; if (i == 2) continue; if (i == 4) break; sum = sum + i; } print sum;",
        );
        // i=1: sum=1; i=2: continue (skip); i=3: sum=4; i=4: break
        assert_eq!(out, "4\n");
    }

    #[test]
    fn string_plus_number_concatenates() {
        let out = run("print \"a\" + 1;");
        assert_eq!(out, "a1\n");
    }

    #[test]
    fn number_plus_string_concatenates() {
        let out = run("print 1 + \"a\";");
        assert_eq!(out, "1a\n");
    }

    #[test]
    fn bool_plus_number_is_a_runtime_error() {
        let err = run_err("true + 1;");
        assert!(err.to_string().contains("Operands must be numbers or strings"));
    }

    #[test]
    fn unary_minus_on_string_is_a_runtime_error() {
        let err = run_err("-\"a\";");
        assert!(err.to_string().contains("Operand must be a number"));
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let err = run_err("print nope;");
        assert!(err.to_string().contains("Undefined variable"));
    }

    #[test]
    fn deep_tail_recursion_does_not_overflow_the_stack() {
        let out = run(
            "fun countdown(n) { if (n <= 0) return 0; return countdown(n - 1); } print countdown(100000);",
        );
        assert_eq!(out, "0\n");
    }

    #[test]
    fn number_formatting_is_consistent_between_print_and_concatenation() {
        let out = run("print 1; print \"n=\" + 1;");
        assert_eq!(out, "1\nn=1\n");
    }

    #[test]
    fn for_loop_continue_still_runs_the_step_clause() {
        // a bug in an earlier draft folded the step into the body block,
        // so `continue` skipped it and the loop never advanced `i`.
        let out = run(
            "for (var i = 0; i < 5; i = i + 1) { \
               if (i == 2) continue; \
               if (i == 4) break; \
               print i; \
             }",
        );
        assert_eq!(out, "0\n1\n3\n");
    }

    #[test]
    fn postfix_increment_and_decrement_update_the_variable() {
        let out = run("var i = 0; i++; i++; i--; print i;");
        assert_eq!(out, "1\n");
    }

    #[test]
    fn break_outside_a_loop_is_a_runtime_error_not_a_resolver_diagnostic() {
        let err = run_err("break;");
        assert_eq!(err.to_string(), "'break' outside loop");
    }

    #[test]
    fn continue_outside_a_loop_is_a_runtime_error_not_a_resolver_diagnostic() {
        let err = run_err("continue;");
        assert_eq!(err.to_string(), "'continue' outside loop.");
    }

    #[test]
    fn break_inside_a_loop_still_works_after_moving_the_check_to_the_evaluator() {
        let out = run("while (true) { break; } print \"after\";");
        assert_eq!(out, "after\n");
    }

    #[test]
    fn anonymous_function_expression_is_callable() {
        let out = run("var square = fun (x) { return x * x; }; print square(5);");
        assert_eq!(out, "25\n");
    }

    #[test]
    fn anonymous_function_prints_as_fn_anonymous() {
        let out = run("print fun (x) { return x; };");
        assert_eq!(out, "<fn anonymous>\n");
    }
}
