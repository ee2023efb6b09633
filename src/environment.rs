use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// One link of the lexical scope chain.  Closures share ownership of
/// their defining environment, so links are handed around as
/// `Rc<RefCell<Environment>>` and only the `values` map ever mutates.
///
/// A `None` slot is the uninitialized sentinel: the name is declared but
/// reading it is an error until it is assigned.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Option<Value>>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), Some(value));
    }

    pub fn define_uninitialized(&mut self, name: &str) {
        self.values.insert(name.to_string(), None);
    }

    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(slot) = self.values.get(&name.lexeme) {
            match slot {
                Some(value) => Ok(value.clone()),

                None => Err(LoxError::runtime(
                    name,
                    format!("Variable '{}' is uninitialized.", name.lexeme),
                )),
            }
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), Some(value));
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Fetch from the scope exactly `distance` hops up the chain.
    ///
    /// Missing or uninitialized slots read as `Nil`.  Every call site is
    /// resolver-verified, which is why this does not error; it stays
    /// crate-private so user lookups keep going through [`Environment::get`].
    pub(crate) fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Value {
        let target = Self::ancestor(env, distance);
        let value = target.borrow().values.get(name).cloned();

        value.flatten().unwrap_or(Value::Nil)
    }

    /// Write into the scope exactly `distance` hops up the chain.
    pub(crate) fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
    ) {
        let target = Self::ancestor(env, distance);
        target.borrow_mut().values.insert(name.to_string(), Some(value));
    }

    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current = env.clone();

        for _ in 0..distance {
            let next = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver distance exceeds environment chain");

            current = next;
        }

        current
    }
}
