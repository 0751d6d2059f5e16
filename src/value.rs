use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::stmt::FunctionDecl;

/// Signature of builtin functions.  Failures carry a bare message; the call
/// site attaches the line of the invoking parenthesis.
pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, String>;

/// A runtime value: exactly one of null, bool, number, string or callable.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    NativeFunction {
        name: String,
        arity: usize,
        func: NativeFn,
    },
    Function(Rc<LoxFunction>),
}

/// A user function: its declaration plus the scope in effect where it was
/// declared.  The closure link is what gives lexical capture semantics.
#[derive(Clone)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }
}

// The closure chain can be cyclic, so debug output stays shallow.
impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.declaration.name.lexeme)
            .field("arity", &self.arity())
            .finish()
    }
}

impl Value {
    /// The form `print` emits: strings are quoted, integral numbers drop the
    /// fraction, everything else matches `Display`.
    pub fn stringify(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s),

            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::NativeFunction { .. } => write!(f, "<native fn>"),

            Value::Function(func) => write!(f, "<fn {}>", func.declaration.name.lexeme),
        }
    }
}
