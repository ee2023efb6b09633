use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::callable::{Callable, CallableType, LoxFunction};
use crate::instance::LoxInstance;
use crate::interpreter::{Interpreter, Unwind};
use crate::value::Value;

/// A class value: method table, optional superclass, and the evaluated
/// field declarations that seed every new instance.
#[derive(Debug)]
pub struct LoxClass {
    name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
    fields: HashMap<String, Value>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
        fields: HashMap<String, Value>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
            fields,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn field_declarations(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    /// Look up a method on this class or its superclass chain.  Static
    /// methods are found on the declaring class only; they are not
    /// inherited.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        if let Some(superclass) = &self.superclass {
            let method = superclass.find_method(name)?;

            if method.is_static() {
                return None;
            }

            return Some(method);
        }

        None
    }

    /// Look up a static method for `Class.name()` access.
    pub fn find_static_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        let method = self.find_method(name)?;

        if method.is_static() {
            Some(method)
        } else {
            None
        }
    }
}

impl Callable for Rc<LoxClass> {
    fn arity(&self) -> usize {
        match self.find_method("init") {
            Some(initializer) => initializer.arity(),

            None => 0,
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn callable_type(&self) -> CallableType {
        CallableType::Class
    }

    /// Instantiation: build the instance, seed its fields, then run the
    /// bound `init` if the class declares one.
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        debug!("Instantiating class '{}'", self.name);

        let instance: Rc<RefCell<LoxInstance>> = LoxInstance::new(self.clone());

        if let Some(initializer) = self.find_method("init") {
            initializer.bind(&instance).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
