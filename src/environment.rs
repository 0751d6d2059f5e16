use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// One lexical scope: name bindings plus an optional parent link.
///
/// Scopes are shared through `Rc<RefCell<_>>` handles because closures keep
/// their defining scope alive past block exit.  A global function whose
/// closure is the global scope forms a reference cycle; those scopes are
/// reclaimed at process exit rather than eagerly.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        debug!("bind '{}' = {}", name, value);
        self.values.insert(name.to_string(), value);
    }

    /// Names bound in this scope itself.
    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Read `name` from the nearest scope in the chain that binds it.
pub fn get(env: &Rc<RefCell<Environment>>, name: &str, line: usize) -> Result<Value> {
    resolving_scope(env, name)
        .and_then(|scope| scope.borrow().values.get(name).cloned())
        .ok_or_else(|| undefined(name, line))
}

/// Write `name` in the nearest scope in the chain that binds it.
pub fn assign(env: &Rc<RefCell<Environment>>, name: &str, value: Value, line: usize) -> Result<()> {
    match resolving_scope(env, name) {
        Some(scope) => {
            scope.borrow_mut().values.insert(name.to_string(), value);
            Ok(())
        }

        None => Err(undefined(name, line)),
    }
}

/// Read `name` in the scope exactly `distance` parent hops away.
pub fn get_at(
    env: &Rc<RefCell<Environment>>,
    distance: usize,
    name: &str,
    line: usize,
) -> Result<Value> {
    let scope = ancestor(env, distance);
    let value = scope.borrow().values.get(name).cloned();

    value.ok_or_else(|| undefined(name, line))
}

/// Write `name` in the scope exactly `distance` parent hops away.
pub fn assign_at(
    env: &Rc<RefCell<Environment>>,
    distance: usize,
    name: &str,
    value: Value,
    line: usize,
) -> Result<()> {
    let scope = ancestor(env, distance);
    let mut bindings = scope.borrow_mut();

    if bindings.values.contains_key(name) {
        bindings.values.insert(name.to_string(), value);
        Ok(())
    } else {
        Err(undefined(name, line))
    }
}

/// Nearest scope, starting at `env` and following parent links, that binds
/// `name`.
fn resolving_scope(
    env: &Rc<RefCell<Environment>>,
    name: &str,
) -> Option<Rc<RefCell<Environment>>> {
    let mut scope = env.clone();

    loop {
        if scope.borrow().values.contains_key(name) {
            return Some(scope);
        }

        let parent = scope.borrow().enclosing.clone()?;
        scope = parent;
    }
}

fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
    let mut scope = env.clone();

    for _ in 0..distance {
        let parent = scope
            .borrow()
            .enclosing
            .clone()
            .expect("resolved distance exceeds environment chain");
        scope = parent;
    }

    scope
}

fn undefined(name: &str, line: usize) -> LoxError {
    LoxError::runtime(line, format!("undefined variable '{}'", name))
}
