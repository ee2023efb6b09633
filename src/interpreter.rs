use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::callable::{clock_native, CallableType, LoxFunction, NativeFunction};
use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::LoxError;
use crate::expr::{Expr, ExprId, VarKind};
use crate::instance::LoxInstance;
use crate::reporter::Reporter;
use crate::stmt::{FieldDecl, FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Non-local exits from nested AST evaluation.
///
/// `return`, `break`, and `continue` ride the error track of `Result`
/// until the statement that structurally owns them; runtime errors ride
/// it all the way to the top level.
#[derive(Debug)]
pub enum Unwind {
    Return(Value),
    Break,
    Continue,
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(err: LoxError) -> Self {
        Unwind::Error(err)
    }
}

/// Tree-walking evaluator.
///
/// Holds the global environment, the current environment pointer, and
/// the resolver's side table of binding distances keyed by expression
/// id.  `print` output goes through an injectable writer so tests can
/// capture it.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, Option<usize>>,
    writer: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFunction::new("clock", 0, clock_native))),
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            writer,
        }
    }

    /// Run a resolved program.  A runtime error stops at the current
    /// top-level statement and is handed to the reporter.
    pub fn interpret(&mut self, statements: &[Stmt], reporter: &mut Reporter) {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(Unwind::Error(err)) => {
                    reporter.error(&err);
                    return;
                }

                // The parser and resolver reject return/break/continue
                // outside their structural sites.
                Err(other) => {
                    debug!("Stray unwind reached top level: {:?}", other);
                    return;
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Side table, written by the resolver
    // ─────────────────────────────────────────────────────────────────

    pub(crate) fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, Some(depth));
    }

    pub(crate) fn note_global(&mut self, id: ExprId) {
        self.locals.insert(id, None);
    }

    // ─────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.writer, "{}", value).map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                match initializer {
                    Some(expr) => {
                        let value = self.evaluate(expr)?;
                        self.environment.borrow_mut().define(&name.lexeme, value);
                    }

                    None => {
                        self.environment
                            .borrow_mut()
                            .define_uninitialized(&name.lexeme);
                    }
                }

                Ok(())
            }

            Stmt::Block {
                statements,
                is_loop_incrementer,
            } => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));

                self.execute_block(statements, environment, *is_loop_incrementer)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body) {
                        Ok(()) => {}

                        Err(Unwind::Break) => break,

                        Err(Unwind::Continue) => continue,

                        Err(other) => return Err(other),
                    }
                }

                Ok(())
            }

            Stmt::Break { .. } => Err(Unwind::Break),

            Stmt::Continue { .. } => Err(Unwind::Continue),

            Stmt::Function(declaration) => {
                let function = LoxFunction::new(
                    declaration.clone(),
                    self.environment.clone(),
                    false,
                    CallableType::Function,
                );

                // Function names bind into globals even when declared in
                // a nested scope; existing scripts rely on it.  The
                // closure still pins the declaration site.
                self.globals.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Function(Rc::new(function)),
                );

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,

                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                fields,
            } => self.execute_class(name, superclass.as_ref(), methods, fields),
        }
    }

    /// Run `statements` inside `environment`, restoring the previous
    /// environment on every exit path.
    ///
    /// When the block is a loop incrementer, a `continue` from the loop
    /// body is absorbed so the trailing increment still runs before the
    /// enclosing `while` re-tests its condition.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
        is_loop_incrementer: bool,
    ) -> Result<(), Unwind> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(());

        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}

                Err(Unwind::Continue) if is_loop_incrementer => continue,

                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        fields: &[FieldDecl],
    ) -> Result<(), Unwind> {
        // 1. Evaluate the superclass, which must itself be a class
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };

                    return Err(LoxError::runtime(token, "Superclass must be a class.").into());
                }
            },

            None => None,
        };

        // 2. Two-phase definition so methods can close over the name
        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        // 3. With a superclass, methods resolve `super` one scope out
        let previous = self.environment.clone();

        if let Some(superclass) = &superclass_value {
            let mut environment = Environment::with_enclosing(self.environment.clone());
            environment.define("super", Value::Class(superclass.clone()));

            self.environment = Rc::new(RefCell::new(environment));
        }

        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for method in methods {
            let is_initializer = method.name.lexeme == "init" && !method.is_static;

            let kind = if is_initializer {
                CallableType::Initializer
            } else {
                CallableType::Method
            };

            let function =
                LoxFunction::new(method.clone(), self.environment.clone(), is_initializer, kind);

            method_map.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        // 4. Field declarations evaluate once, at class definition time
        let field_result = self.evaluate_fields(fields);

        if superclass_value.is_some() {
            self.environment = previous;
        }

        let field_map = field_result?;

        let class = LoxClass::new(name.lexeme.clone(), superclass_value, method_map, field_map);

        debug!("Defined class '{}'", name.lexeme);

        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))?;

        Ok(())
    }

    fn evaluate_fields(&mut self, fields: &[FieldDecl]) -> Result<HashMap<String, Value>, Unwind> {
        let mut field_map: HashMap<String, Value> = HashMap::new();

        for field in fields {
            let value = self.evaluate(&field.initializer)?;
            field_map.insert(field.name.lexeme.clone(), value);
        }

        Ok(field_map)
    }

    // ─────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Unwind> {
        match expr {
            Expr::Literal(token) => Ok(self.evaluate_literal(token)?),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                // Short-circuit with the operand that decided the answer,
                // not a coerced boolean.
                if operator.token_type == TokenType::OR {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }

                self.evaluate(right)
            }

            Expr::Variable { id, name, .. } => Ok(self.look_up_variable(name, *id)?),

            Expr::This { id, keyword } => Ok(self.look_up_variable(keyword, *id)?),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(Some(distance)) => {
                        Environment::assign_at(
                            &self.environment,
                            *distance,
                            &name.lexeme,
                            value.clone(),
                        );
                    }

                    Some(None) => {
                        self.globals.borrow_mut().assign(name, value.clone())?;
                    }

                    None => {
                        self.environment.borrow_mut().assign(name, value.clone())?;
                    }
                }

                Ok(value)
            }

            Expr::GetField { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value = instance.borrow().get_field(name)?;
                        Ok(value)
                    }

                    _ => Err(LoxError::runtime(name, "Only instances have properties.").into()),
                }
            }

            Expr::GetMethod { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => Ok(LoxInstance::get_method(&instance, name)?),

                    Value::Class(class) => match class.find_static_method(&name.lexeme) {
                        Some(method) => Ok(Value::Function(method)),

                        None => Err(LoxError::runtime(
                            name,
                            format!("Undefined method '{}'.", name.lexeme),
                        )
                        .into()),
                    },

                    _ => Err(LoxError::runtime(name, "Only instances have properties.").into()),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(name, value.clone());

                        Ok(value)
                    }

                    _ => Err(LoxError::runtime(name, "Only instances have fields.").into()),
                }
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),
        }
    }

    fn evaluate_literal(&self, token: &Token) -> Result<Value, LoxError> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),

            TokenType::STRING(s) => Ok(Value::String(s.clone())),

            TokenType::TRUE => Ok(Value::Boolean(true)),

            TokenType::FALSE => Ok(Value::Boolean(false)),

            TokenType::NIL => Ok(Value::Nil),

            _ => Err(LoxError::runtime(token, "Invalid literal.")),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, Unwind> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Boolean(!value.is_truthy())),

            _ => Err(LoxError::runtime(operator, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, Unwind> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                _ => {
                    // String concatenation coerces the other operand.
                    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                        Ok(Value::String(format!("{}{}", left, right)))
                    } else {
                        Err(LoxError::runtime(
                            operator,
                            "Operands must be two numbers or two strings.",
                        )
                        .into())
                    }
                }
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left, &right)?;

                if b == 0.0 {
                    return Err(LoxError::runtime(operator, "Cannot divide by zero.").into());
                }

                Ok(Value::Number(a / b))
            }

            TokenType::MODULO => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a % b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Boolean(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Boolean(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Boolean(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Boolean(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Boolean(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Boolean(left != right)),

            _ => Err(LoxError::runtime(operator, "Invalid binary operator.").into()),
        }
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
    ) -> Result<Value, Unwind> {
        let distance = match self.locals.get(&id) {
            Some(Some(distance)) => *distance,

            _ => return Err(LoxError::runtime(keyword, "Couldn't resolve 'super'.").into()),
        };

        let this_distance = match distance.checked_sub(1) {
            Some(distance) => distance,

            None => return Err(LoxError::runtime(keyword, "Couldn't resolve 'super'.").into()),
        };

        let superclass = Environment::get_at(&self.environment, distance, "super");

        // `this` lives one scope inside the `super` binding.
        let instance = Environment::get_at(&self.environment, this_distance, "this");

        match (superclass, instance) {
            (Value::Class(superclass), Value::Instance(instance)) => {
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(&instance)))),

                    None => Err(LoxError::runtime(
                        method,
                        format!("Undefined property '{}'.", method.lexeme),
                    )
                    .into()),
                }
            }

            _ => Err(LoxError::runtime(keyword, "Couldn't resolve 'super'.").into()),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<Value, Unwind> {
        let callee_value = self.evaluate(callee)?;

        let mut argument_values: Vec<Value> = Vec::with_capacity(arguments.len());
        for argument in arguments {
            argument_values.push(self.evaluate(argument)?);
        }

        // The `new` discipline also holds for class values that reached
        // the call through an alias the parser could not see.
        let is_new = matches!(
            callee,
            Expr::Variable {
                kind: VarKind::Class,
                ..
            }
        );

        if matches!(callee_value, Value::Class(_)) {
            if !is_new {
                return Err(
                    LoxError::runtime(paren, "Expected 'new' before instantiation.").into(),
                );
            }
        } else if is_new {
            return Err(LoxError::runtime(paren, "Expected class name after 'new'.").into());
        }

        let callable = match callee_value.as_callable() {
            Some(callable) => callable,

            None => {
                return Err(LoxError::runtime(
                    paren,
                    format!(
                        "Can only call functions and classes but tried to call '{}'.",
                        callee_value
                    ),
                )
                .into())
            }
        };

        if argument_values.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {} for {} '{}'.",
                    callable.arity(),
                    argument_values.len(),
                    callable.callable_type().as_str(),
                    callable.name()
                ),
            )
            .into());
        }

        callable.call(self, argument_values)
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value, LoxError> {
        match self.locals.get(&id) {
            Some(Some(distance)) => Ok(Environment::get_at(
                &self.environment,
                *distance,
                &name.lexeme,
            )),

            Some(None) => self.globals.borrow().get(name),

            None => self.environment.borrow().get(name),
        }
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64), LoxError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),

        _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
    }
}
