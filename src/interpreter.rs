//! Tree-walking evaluator.
//!
//! Dispatches on AST variants, manages the current-environment pointer and
//! the resolution side-table, and owns the output sink so program output is
//! observable in tests.  `return` travels as a typed completion value
//! (`Option<Value>`), never through the error channel.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::environment::{self, Environment};
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::{LoxFunction, Value};

pub struct Interpreter<W: Write> {
    output: W,
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    repl: bool,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            },
        );

        Interpreter {
            output,
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            repl: false,
        }
    }

    /// Record the scope distance of a variable reference.  Called by the
    /// resolver; references without an entry resolve against the globals.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        debug!("Recording resolution: {:?} at depth {}", id, depth);
        self.locals.insert(id, depth);
    }

    /// Names currently bound in the global scope.  The resolver seeds its
    /// outermost scope with these, so prompt lines see earlier definitions.
    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().names()
    }

    pub fn interpret(&mut self, statements: &[Stmt], repl: bool) -> Result<()> {
        self.repl = repl;

        for stmt in statements {
            // The resolver rejects top-level returns, so no completion value
            // can surface here.
            self.execute(stmt)?;
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Option<Value>> {
        match stmt {
            Stmt::Expression(expr) => {
                let value = self.evaluate(expr)?;

                if self.repl {
                    writeln!(self.output, "{}", value.stringify())?;
                }

                Ok(None)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value.stringify())?;

                Ok(None)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(None)
            }

            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(self.environment.clone());

                self.execute_block(statements, Rc::new(RefCell::new(env)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(None)
                }
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    if let Some(value) = self.execute(body)? {
                        return Ok(Some(value));
                    }
                }

                Ok(None)
            }

            Stmt::Function(decl) => {
                let function = Value::Function(Rc::new(LoxFunction {
                    declaration: decl.clone(),
                    closure: self.environment.clone(),
                }));

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, function);

                Ok(None)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };

                Ok(Some(value))
            }
        }
    }

    /// Run `statements` inside `env`, restoring the previous environment on
    /// every exit path, including error propagation and return unwinding.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<Option<Value>> {
        let previous: Rc<RefCell<Environment>> = self.environment.clone();

        self.environment = env;

        let mut completion: Result<Option<Value>> = Ok(None);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(None) => continue,

                other => {
                    completion = other;
                    break;
                }
            }
        }

        self.environment = previous;

        completion
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(token) => self.evaluate_literal(token),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { op, right } => self.evaluate_unary(op, right),

            Expr::Binary { left, op, right } => self.evaluate_binary(left, op, right),

            Expr::Logical { left, op, right } => self.evaluate_logical(left, op, right),

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id).copied() {
                    Some(distance) => environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => {
                        environment::assign(&self.globals, &name.lexeme, value.clone(), name.line)?
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                args,
            } => self.evaluate_call(callee, paren, args),
        }
    }

    fn evaluate_literal(&self, token: &Token) -> Result<Value> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),

            TokenType::STRING(s) => Ok(Value::String(s.clone())),

            TokenType::TRUE => Ok(Value::Bool(true)),

            TokenType::FALSE => Ok(Value::Bool(false)),

            TokenType::NULL => Ok(Value::Null),

            _ => Err(LoxError::runtime(token.line, "invalid literal")),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Result<Value> {
        let value: Value = self.evaluate(right)?;

        match op.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    op.line,
                    format!("operand for unary '{}' must be a number", op.lexeme),
                )),
            },

            // `not` is the keyword spelling of `!`.
            TokenType::BANG | TokenType::NOT => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(op.line, "invalid unary operator")),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;

        match op.token_type {
            TokenType::OR => {
                if is_truthy(&left_val) {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            TokenType::AND => {
                if !is_truthy(&left_val) {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            _ => Err(LoxError::runtime(op.line, "invalid logical operator")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                _ => Err(self.number_operands_error(op)),
            },

            TokenType::MINUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(self.number_operands_error(op)),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(self.number_operands_error(op)),
            },

            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(LoxError::runtime(op.line, "division by zero"))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(self.number_operands_error(op)),
            },

            TokenType::DOT_DOT => match (left_val, right_val) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    op.line,
                    format!("operands for binary '{}' must be strings", op.lexeme),
                )),
            },

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(self.number_operands_error(op)),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(self.number_operands_error(op)),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(self.number_operands_error(op)),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(self.number_operands_error(op)),
            },

            // `==` insists on matching operand types; `!=` is the bare
            // negation of the equality predicate.
            TokenType::EQUAL_EQUAL => {
                if have_same_type(&left_val, &right_val) {
                    Ok(Value::Bool(is_equal(&left_val, &right_val)))
                } else {
                    Err(LoxError::runtime(
                        op.line,
                        "operands for '==' must be of the same type",
                    ))
                }
            }

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            _ => Err(LoxError::runtime(op.line, "invalid binary operator")),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> Result<Value> {
        let callee_val = self.evaluate(callee)?;

        let mut arg_values: Vec<Value> = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.evaluate(arg)?);
        }

        match callee_val {
            Value::NativeFunction { arity, func, .. } => {
                if arg_values.len() != arity {
                    return Err(self.arity_error(arity, arg_values.len(), paren));
                }

                func(&arg_values).map_err(|msg| LoxError::runtime(paren.line, msg))
            }

            Value::Function(function) => {
                if arg_values.len() != function.arity() {
                    return Err(self.arity_error(function.arity(), arg_values.len(), paren));
                }

                self.call_function(&function, arg_values)
            }

            _ => Err(LoxError::runtime(paren.line, "can only call functions")),
        }
    }

    /// Invoke a user function: fresh scope whose parent is the function's
    /// *closure* (not the caller's scope), parameters bound in order.
    fn call_function(&mut self, function: &Rc<LoxFunction>, args: Vec<Value>) -> Result<Value> {
        let mut env = Environment::with_enclosing(function.closure.clone());

        for (param, arg) in function.declaration.params.iter().zip(args) {
            env.define(&param.lexeme, arg);
        }

        match self.execute_block(&function.declaration.body, Rc::new(RefCell::new(env)))? {
            Some(value) => Ok(value),

            None => Ok(Value::Null),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(distance) => {
                environment::get_at(&self.environment, *distance, &name.lexeme, name.line)
            }

            None => environment::get(&self.globals, &name.lexeme, name.line),
        }
    }

    fn number_operands_error(&self, op: &Token) -> LoxError {
        LoxError::runtime(
            op.line,
            format!("operands for binary '{}' must be numbers", op.lexeme),
        )
    }

    fn arity_error(&self, expected: usize, got: usize, paren: &Token) -> LoxError {
        LoxError::runtime(
            paren.line,
            format!("expected {} arguments but got {}", expected, got),
        )
    }
}

/// Condition coercion: null and false are falsy, empty strings and zero are
/// falsy, everything else (including any callable) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,

        Value::Bool(b) => *b,

        Value::Number(n) => *n != 0.0,

        Value::String(s) => !s.is_empty(),

        Value::NativeFunction { .. } | Value::Function(_) => true,
    }
}

/// Equality predicate: cross-type comparisons are unequal, `null` equals
/// only itself, callables compare by identity.
pub fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,

        (Value::Bool(a), Value::Bool(b)) => a == b,

        (Value::Number(a), Value::Number(b)) => a == b,

        (Value::String(a), Value::String(b)) => a == b,

        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),

        (Value::NativeFunction { func: a, .. }, Value::NativeFunction { func: b, .. }) => a == b,

        _ => false,
    }
}

fn have_same_type(left: &Value, right: &Value) -> bool {
    matches!(
        (left, right),
        (Value::Null, Value::Null)
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (
                Value::NativeFunction { .. } | Value::Function(_),
                Value::NativeFunction { .. } | Value::Function(_),
            )
    )
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
