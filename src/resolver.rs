//! Static resolution pass.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of maps keyed by
//!    `(name, NameKind)` tracking declared (false) and fully defined
//!    (true) names in each nested block, function, or class body.  The
//!    kind tag lets a method and a field share a name inside one class
//!    while duplicate declarations of the same kind stay an error.
//! 2. **Enforce static rules**: reading a variable in its own
//!    initializer, `return` outside functions, value-returning `return`
//!    inside an initializer, `this`/`super` outside their contexts,
//!    `this` inside static methods, `break`/`continue` outside loops.
//! 3. **Record binding distances**: for every `Variable`, `Assign`,
//!    `This`, and `Super` occurrence, notes in the interpreter's side
//!    table whether it is a local (and at what depth) or a global, so
//!    the runtime climbs exactly the right number of environment frames.
//!
//! Resolution halts on the first static error; the driver skips
//! interpretation when it sees one.

use std::collections::HashMap;

use log::{debug, info};

use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, VarKind};
use crate::interpreter::Interpreter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// Kind tag carried by every scope entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Variable,
    Function,
    Method,
    Class,
    Property,
}

impl NameKind {
    fn describe(&self) -> &'static str {
        match self {
            NameKind::Variable => "Variable",

            NameKind::Function => "Function",

            NameKind::Method => "Method",

            NameKind::Class => "Class",

            NameKind::Property => "Property",
        }
    }
}

/// Are we inside a user function?  Used to validate `return` and the
/// static-method restrictions on `this`/`super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    StaticMethod,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

type Scope = HashMap<(String, NameKind), bool>;

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<Scope>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
                fields,
            } => {
                // 1. Self-inheritance guard
                if let Some(Expr::Variable {
                    name: super_name, ..
                }) = superclass
                {
                    if super_name.lexeme == name.lexeme {
                        return Err(LoxError::resolve(
                            super_name,
                            "A class can't inherit from itself.",
                        ));
                    }
                }

                // 2. Declare & define the class name so methods can refer to it
                self.declare(name, NameKind::Class)?;
                self.define(name, NameKind::Class);

                // 3. Save and enter the class context
                let enclosing_class: ClassType = self.current_class;

                self.current_class = if superclass.is_some() {
                    ClassType::Subclass
                } else {
                    ClassType::Class
                };

                // 4. If there is a superclass, resolve it and bind `super`
                if let Some(superclass) = superclass {
                    self.resolve_expr(superclass)?;

                    self.begin_scope();
                    self.scopes
                        .last_mut()
                        .unwrap()
                        .insert(("super".to_string(), NameKind::Property), true);
                }

                // 5. Open the implicit `this` scope for the class body
                self.begin_scope();
                self.scopes
                    .last_mut()
                    .unwrap()
                    .insert(("this".to_string(), NameKind::Property), true);

                // 6. Fields first: they are evaluated when the class is,
                //    and may not collide with one another
                for field in fields {
                    self.declare(&field.name, NameKind::Property)?;
                    self.resolve_expr(&field.initializer)?;
                    self.define(&field.name, NameKind::Property);
                }

                // 7. Resolve each method in its own function context
                for method in methods {
                    self.declare(&method.name, NameKind::Method)?;
                    self.define(&method.name, NameKind::Method);

                    let kind = if method.name.lexeme == "init" && !method.is_static {
                        FunctionType::Initializer
                    } else if method.is_static {
                        FunctionType::StaticMethod
                    } else {
                        FunctionType::Method
                    };

                    self.resolve_function(kind, method)?;
                }

                // 8. Close the `this` scope, then the `super` scope if opened
                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                // 9. Restore the outer class context
                self.current_class = enclosing_class;
            }

            Stmt::Block { statements, .. } => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s)?;
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // Declare first so the initializer can be diagnosed if it
                // reads the name it is about to define.
                self.declare(name, NameKind::Variable)?;

                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }

                self.define(name, NameKind::Variable);
            }

            Stmt::Function(declaration) => {
                self.declare(&declaration.name, NameKind::Function)?;
                self.define(&declaration.name, NameKind::Function);

                self.resolve_function(FunctionType::Function, declaration)?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;

                self.loop_depth += 1;
                let result = self.resolve_stmt(body);
                self.loop_depth -= 1;

                result?;
            }

            Stmt::Break { keyword, .. } => {
                if self.loop_depth == 0 {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'break' outside of a loop.",
                    ));
                }
            }

            Stmt::Continue { keyword, .. } => {
                if self.loop_depth == 0 {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'continue' outside of a loop.",
                    ));
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't return from top-level code.",
                    ));
                }

                // In an initializer, only a bare `return;` is allowed.
                if self.current_function == FunctionType::Initializer && value.is_some() {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't return a value from an initializer.",
                    ));
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr)?;
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable { id, name, kind } => {
                // Prevent reading a variable in its own initializer
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&(name.lexeme.clone(), NameKind::Variable)) == Some(&false) {
                        return Err(LoxError::resolve(
                            name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }

                let hint = match kind {
                    VarKind::Class => NameKind::Class,

                    VarKind::Variable => NameKind::Variable,
                };

                self.resolve_local(*id, name, hint);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name, NameKind::Variable);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;

                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'this' outside of a class.",
                    ));
                }

                if self.current_function == FunctionType::StaticMethod {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'this' in a static method.",
                    ));
                }

                self.resolve_local(*id, keyword, NameKind::Property);
            }

            Expr::GetMethod { object, .. } | Expr::GetField { object, .. } => {
                self.resolve_expr(object)?;
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)?;
            }

            Expr::Super { id, keyword, .. } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'super' outside of a class.",
                    ));
                }

                if self.current_class != ClassType::Subclass {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                }

                if self.current_function == FunctionType::StaticMethod {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'super' in a static method.",
                    ));
                }

                self.resolve_local(*id, keyword, NameKind::Property);
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` distinguishes plain functions, methods, static methods,
    /// and initializers.  The loop depth resets: a `break` inside a
    /// function body never targets a loop outside it.
    fn resolve_function(&mut self, kind: FunctionType, declaration: &FunctionDecl) -> Result<()> {
        let enclosing = self.current_function;
        let enclosing_loop_depth = self.loop_depth;

        self.current_function = kind;
        self.loop_depth = 0;

        self.begin_scope();

        for param in &declaration.params {
            self.declare(param, NameKind::Variable)?;
            self.define(param, NameKind::Variable);
        }

        for stmt in &declaration.body {
            self.resolve_stmt(stmt)?;
        }

        self.end_scope();

        self.current_function = enclosing;
        self.loop_depth = enclosing_loop_depth;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token, kind: NameKind) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            let key = (name.lexeme.clone(), kind);

            if scope.contains_key(&key) {
                return Err(LoxError::resolve(
                    name,
                    format!(
                        "{} '{}' already declared in this scope.",
                        kind.describe(),
                        name.lexeme
                    ),
                ));
            }

            scope.insert(key, false);
        }
        Ok(())
    }

    fn define(&mut self, name: &Token, kind: NameKind) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert((name.lexeme.clone(), kind), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as either:
    ///  - a local at depth `d`,
    ///  - an explicit global, when the slot it hits is a function
    ///    declaration (function values bind into globals), or
    ///  - nothing at all, leaving the lookup to the runtime chain walk.
    fn resolve_local(&mut self, id: ExprId, name: &Token, hint: NameKind) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(kind) = lookup_name(scope, name, hint) {
                if kind == NameKind::Function {
                    debug!("Resolved '{}' as a global function", name.lexeme);
                    self.interpreter.note_global(id);
                } else {
                    debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                    self.interpreter.note_local(id, depth);
                }

                return;
            }
        }

        debug!("Left '{}' for runtime lookup", name.lexeme);
    }
}

/// Probe a scope for `name`, preferring the hinted kind before trying
/// the rest.
///
/// Only kinds with a runtime slot participate: methods and fields live
/// on class values, not in environments, so they never resolve a bare
/// name.  `this`/`super` carry the Property hint and match exactly.
fn lookup_name(scope: &Scope, name: &Token, hint: NameKind) -> Option<NameKind> {
    if hint == NameKind::Property {
        return scope
            .contains_key(&(name.lexeme.clone(), hint))
            .then_some(hint);
    }

    const ORDER: [NameKind; 3] = [NameKind::Variable, NameKind::Class, NameKind::Function];

    if scope.contains_key(&(name.lexeme.clone(), hint)) {
        return Some(hint);
    }

    ORDER
        .into_iter()
        .filter(|kind| *kind != hint)
        .find(|kind| scope.contains_key(&(name.lexeme.clone(), *kind)))
}
