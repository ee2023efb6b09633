use std::rc::Rc;

use crate::expr::Expr;
use crate::token::Token;

/// A function or method declaration.  Shared between the AST and any
/// function values closing over it.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
    pub is_static: bool,
}

/// A field declared in a class body (`name = initializer;`).
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Token,
    pub initializer: Expr,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block {
        statements: Vec<Stmt>,
        /// Marks the synthetic block a `for` loop wraps around its body
        /// and increment, so `continue` still runs the increment.
        is_loop_incrementer: bool,
    },

    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
        fields: Vec<FieldDecl>,
    },

    Expression(Expr),

    Function(Rc<FunctionDecl>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    Print(Expr),

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Break {
        keyword: Token,
        env_depth: usize,
    },

    Continue {
        keyword: Token,
        env_depth: usize,
    },
}
