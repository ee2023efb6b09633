use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::environment::Environment;
use crate::error::LoxError;
use crate::instance::LoxInstance;
use crate::interpreter::{Interpreter, Unwind};
use crate::stmt::FunctionDecl;
use crate::value::Value;

/// What a callable is, as surfaced in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableType {
    Function,
    Method,
    Initializer,
    Class,
}

impl CallableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallableType::Function => "function",

            CallableType::Method => "method",

            CallableType::Initializer => "initializer",

            CallableType::Class => "class",
        }
    }
}

/// The call protocol shared by functions, classes, and natives.
pub trait Callable {
    fn arity(&self) -> usize;

    fn name(&self) -> String;

    fn callable_type(&self) -> CallableType;

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind>;
}

/// A user-declared function or method paired with the environment it
/// was created in.
#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
    kind: CallableType,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
        kind: CallableType,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
            kind,
        }
    }

    pub fn is_static(&self) -> bool {
        self.declaration.is_static
    }

    /// Produce a copy whose immediate enclosing scope binds `this` to
    /// the given instance.
    pub fn bind(&self, instance: &Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance.clone()));

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
            kind: self.kind,
        }
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn name(&self) -> String {
        self.declaration.name.lexeme.clone()
    }

    fn callable_type(&self) -> CallableType {
        self.kind
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        debug!("Calling {} '{}'", self.kind.as_str(), self.name());

        let environment = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        match interpreter.execute_block(&self.declaration.body, environment, false) {
            Err(Unwind::Return(value)) => {
                if self.is_initializer {
                    Ok(Environment::get_at(&self.closure, 0, "this"))
                } else {
                    Ok(value)
                }
            }

            Err(other) => Err(other),

            Ok(()) => {
                if self.is_initializer {
                    Ok(Environment::get_at(&self.closure, 0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

/// A host-provided builtin exposed through the same call protocol.
pub struct NativeFunction {
    name: &'static str,
    arity: usize,
    func: fn(&[Value]) -> Result<Value, LoxError>,
}

impl NativeFunction {
    pub fn new(
        name: &'static str,
        arity: usize,
        func: fn(&[Value]) -> Result<Value, LoxError>,
    ) -> Self {
        NativeFunction { name, arity, func }
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn name(&self) -> String {
        self.name.to_string()
    }

    fn callable_type(&self) -> CallableType {
        CallableType::Function
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        (self.func)(&arguments).map_err(Unwind::from)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// Seed value for the globals: the current time as milliseconds since
/// the epoch integer-divided by 1_000_000_000.  The arithmetic is odd
/// but existing scripts depend on it.
pub fn clock_native(_args: &[Value]) -> Result<Value, LoxError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LoxError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
        .as_millis();

    Ok(Value::Number((millis / 1_000_000_000) as f64))
}
