//! Static resolution pass.
//!
//! A single AST walk between parsing and evaluation that:
//! 1. **Builds lexical scopes**: a stack of `HashMap<String, bool>` tracking
//!    declared (false) versus fully defined (true) names per block or
//!    function.
//! 2. **Enforces static rules**: duplicate declarations in a local scope,
//!    reading a variable inside its own initializer, `return` outside a
//!    function, and references to names no scope knows about.
//! 3. **Records binding distances**: every `Variable`/`Assign` occurrence
//!    that lands in a local scope is reported to the interpreter with the
//!    number of parent hops between its use site and its binding, enabling
//!    direct access at runtime.  Names found only in the outermost scope are
//!    left unrecorded and fall back to the global environment.
//!
//! The outermost scope is seeded from the interpreter's current global
//! bindings, so a prompt line can use names defined on earlier lines.  Its
//! rules are relaxed: redeclaring a global is permitted.
//!
//! Errors go through the reporter and the walk continues; the driver treats
//! any report as a compile failure.

use std::collections::HashMap;
use std::io::Write;

use log::{debug, info};

use crate::error::LoxError;
use crate::expr::{Expr, ExprId};
use crate::interpreter::Interpreter;
use crate::reporter::ErrorReporter;
use crate::stmt::Stmt;
use crate::token::Token;

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

pub struct Resolver<'a, W: Write> {
    interpreter: &'a mut Interpreter<W>,
    reporter: &'a ErrorReporter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
}

impl<'a, W: Write> Resolver<'a, W> {
    pub fn new(interpreter: &'a mut Interpreter<W>, reporter: &'a ErrorReporter) -> Self {
        Resolver {
            interpreter,
            reporter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        let mut global_scope: HashMap<String, bool> = HashMap::new();
        for name in self.interpreter.global_names() {
            global_scope.insert(name, true);
        }
        self.scopes.push(global_scope);

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.scopes.pop();
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function(decl) => {
                // Declared and defined up front so the body can recurse.
                self.declare(&decl.name);
                self.define(&decl.name);

                self.resolve_function(&decl.params, &decl.body);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.report(
                        keyword.line,
                        "can't return from top-level code (outside of function)",
                    );
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // Reading a name whose declaration is still in flight means
                // `var x = x;`.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.report(
                            name.line,
                            format!(
                                "can't read local variable '{}' in its own initializer",
                                name.lexeme
                            ),
                        );
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee);

                for arg in args {
                    self.resolve_expr(arg);
                }
            }
        }
    }

    /// Enter a fresh scope for a function's parameters and body.
    fn resolve_function(&mut self, params: &[Token], body: &[Stmt]) {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Function;

        self.begin_scope();

        for param in params {
            self.declare(param);
            self.define(param);
        }

        for stmt in body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if self.scopes.is_empty() {
            return;
        }

        let is_global = self.scopes.len() == 1;
        let already_declared = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&name.lexeme));

        if already_declared {
            if is_global {
                // Redeclaring a global rebinds it; the existing entry stays
                // visible to the initializer.
                return;
            }

            self.report(
                name.line,
                format!("variable '{}' already exists in this scope", name.lexeme),
            );
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Record this occurrence as a local at its depth; leave it absent when
    /// it lands in the outermost (global) scope.
    ///
    /// A name no scope knows about is a static error in top-level code.
    /// Inside a function body it stays a late-bound global (resolved against
    /// the global environment at call time), so a function may call another
    /// one declared further down the script.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                if depth + 1 == self.scopes.len() {
                    debug!("Resolved '{}' as global", name.lexeme);
                } else {
                    debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                    self.interpreter.resolve(id, depth);
                }
                return;
            }
        }

        if self.current_function == FunctionType::None {
            self.report(
                name.line,
                format!("undefined variable '{}'", name.lexeme),
            );
        }
    }

    fn report<S: Into<String>>(&self, line: usize, msg: S) {
        let _ = self.reporter.report(LoxError::resolve(line, msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;
    use crate::token::Token;

    fn resolve_source(source: &str) -> bool {
        let reporter = ErrorReporter::new();
        let tokens: Vec<Token> = Scanner::new(source.as_bytes().to_vec())
            .filter_map(|t| t.ok())
            .collect();
        let stmts = Parser::new(tokens, &reporter).parse();
        assert!(!reporter.had_error(), "parse error in {:?}", source);

        let mut interpreter = Interpreter::new(Vec::new());
        Resolver::new(&mut interpreter, &reporter).resolve(&stmts);
        reporter.had_error()
    }

    #[test]
    fn return_outside_function_is_an_error() {
        assert!(resolve_source("return 1;"));
        assert!(!resolve_source("func f() { return 1; }"));
    }

    #[test]
    fn duplicate_declaration_in_local_scope() {
        assert!(resolve_source("{ var a = 1; var a = 2; }"));
    }

    #[test]
    fn global_redeclaration_is_permitted() {
        assert!(!resolve_source("var a = 1; var a = 2;"));
    }

    #[test]
    fn reading_local_in_own_initializer() {
        assert!(resolve_source("{ var x = x; }"));
    }

    #[test]
    fn use_before_declaration_is_static() {
        assert!(resolve_source("print x; var x = 0;"));
        assert!(!resolve_source("var x = 0; print x;"));
    }

    #[test]
    fn duplicate_parameter_names() {
        assert!(resolve_source("func f(a, a) { print a; }"));
    }

    #[test]
    fn function_bodies_may_reference_later_globals() {
        let source = "
            func ping() { return pong(); }
            func pong() { return 1; }
            print ping();
        ";
        assert!(!resolve_source(source));
    }

    #[test]
    fn closures_resolve_cleanly() {
        let source = "func make() { var i = 0; func inc() { i = i + 1; return i; } return inc; }";
        assert!(!resolve_source(source));
    }

    #[test]
    fn shadowing_in_nested_blocks_is_fine() {
        assert!(!resolve_source("{ var a = 1; { var a = 2; print a; } print a; }"));
    }
}
