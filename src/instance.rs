use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::class::LoxClass;
use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// A live object: its class plus per-instance field storage, seeded
/// from the class's field declarations at construction.
#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Rc<RefCell<LoxInstance>> {
        let fields = class.field_declarations().clone();

        Rc::new(RefCell::new(LoxInstance { class, fields }))
    }

    pub fn class_name(&self) -> String {
        self.class.class_name().to_string()
    }

    /// Look up a non-static method and bind it to this instance.
    ///
    /// Takes the shared handle rather than `&self` because the bound
    /// method captures the instance.
    pub fn get_method(instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value> {
        let method = instance.borrow().class.find_method(&name.lexeme);

        match method {
            Some(method) if !method.is_static() => {
                Ok(Value::Function(Rc::new(method.bind(instance))))
            }

            _ => Err(LoxError::runtime(
                name,
                format!("Undefined method '{}'.", name.lexeme),
            )),
        }
    }

    pub fn get_field(&self, name: &Token) -> Result<Value> {
        match self.fields.get(&name.lexeme) {
            Some(value) => Ok(value.clone()),

            None => Err(LoxError::runtime(
                name,
                format!("Undefined field '{}'.", name.lexeme),
            )),
        }
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
