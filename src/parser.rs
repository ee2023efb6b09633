use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, VarKind};
use crate::reporter::Reporter;
use crate::stmt::{FieldDecl, FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

/// Recursive-descent parser with panic-mode recovery at declaration
/// boundaries.  Errors are reported through the shared [`Reporter`];
/// the driver checks its flag before resolving or interpreting.
pub struct Parser<'r> {
    tokens: Vec<Token>,
    current: usize,
    next_expr_id: usize,
    classes: HashSet<String>,
    reporter: &'r mut Reporter,
}

impl<'r> Parser<'r> {
    pub fn new(tokens: Vec<Token>, reporter: &'r mut Reporter) -> Self {
        Parser {
            tokens,
            current: 0,
            next_expr_id: 0,
            classes: HashSet::new(),
            reporter,
        }
    }

    pub fn parse(&mut self) -> Vec<Stmt> {
        info!("Parsing {} token(s)", self.tokens.len());

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(err) => {
                    self.reporter.error(&err);
                    self.synchronize();
                }
            }
        }

        statements
    }

    // ─────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Result<Stmt> {
        if self.match_token(&TokenType::CLASS) {
            return self.class_declaration();
        }

        if self.match_token(&TokenType::FUN) {
            return Ok(Stmt::Function(self.function("function", false)?));
        }

        if self.match_token(&TokenType::VAR) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(&TokenType::IDENTIFIER, "Expect class name.")?;

        if !self.classes.insert(name.lexeme.clone()) {
            return Err(LoxError::parse(
                &name,
                format!("Class '{}' is already declared.", name.lexeme),
            ));
        }

        let superclass = if self.match_token(&TokenType::LESS) {
            let super_name = self.consume(&TokenType::IDENTIFIER, "Expect superclass name.")?;
            Some(self.variable_expr(super_name))
        } else {
            None
        };

        self.consume(&TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();
        let mut fields: Vec<FieldDecl> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if self.match_token(&TokenType::STATIC) {
                methods.push(self.function("method", true)?);
            } else if self.check(&TokenType::IDENTIFIER) && self.check_next(&TokenType::EQUAL) {
                // A member that opens with `name =` is a field, not a
                // method; retry the member as a var-style declaration.
                fields.push(self.field_declaration()?);
            } else {
                methods.push(self.function("method", false)?);
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        debug!(
            "Parsed class '{}' with {} method(s) and {} field(s)",
            name.lexeme,
            methods.len(),
            fields.len()
        );

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            fields,
        })
    }

    fn field_declaration(&mut self) -> Result<FieldDecl> {
        let name = self.consume(&TokenType::IDENTIFIER, "Expect field name.")?;
        self.consume(&TokenType::EQUAL, "Expect '=' after field name.")?;

        let initializer = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expect ';' after field declaration.")?;

        Ok(FieldDecl { name, initializer })
    }

    fn function(&mut self, kind: &str, is_static: bool) -> Result<Rc<FunctionDecl>> {
        let name = self.consume(&TokenType::IDENTIFIER, format!("Expect {} name.", kind))?;
        self.consume(
            &TokenType::LEFT_PAREN,
            format!("Expect '(' after {} name.", kind),
        )?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.reporter.error(&LoxError::parse(
                        &token,
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(self.consume(&TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.match_token(&TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        self.consume(
            &TokenType::LEFT_BRACE,
            format!("Expect '{{' before {} body.", kind),
        )?;

        let body = self.block_statements()?;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body,
            is_static,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(&TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer = if self.match_token(&TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            &TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ─────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_token(&TokenType::FOR) {
            return self.for_statement();
        }

        if self.match_token(&TokenType::IF) {
            return self.if_statement();
        }

        if self.match_token(&TokenType::PRINT) {
            return self.print_statement();
        }

        if self.match_token(&TokenType::RETURN) {
            return self.return_statement();
        }

        if self.match_token(&TokenType::WHILE) {
            return self.while_statement();
        }

        if self.match_token(&TokenType::BREAK) {
            return self.break_statement();
        }

        if self.match_token(&TokenType::CONTINUE) {
            return self.continue_statement();
        }

        if self.match_token(&TokenType::LEFT_BRACE) {
            return Ok(Stmt::Block {
                statements: self.block_statements()?,
                is_loop_incrementer: false,
            });
        }

        self.expression_statement()
    }

    /// `for` desugars into `{ init; while (cond) { body; incr; } }`.
    /// The inner block is marked as the loop incrementer so `continue`
    /// still runs the increment before the next condition check.
    fn for_statement(&mut self) -> Result<Stmt> {
        let for_line = self.previous().line;

        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(&TokenType::SEMICOLON) {
            None
        } else if self.match_token(&TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(&TokenType::SEMICOLON, "Expect ';' after for loop condition.")?;

        let increment = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after for loop clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression(increment)],
                is_loop_incrementer: true,
            };
        }

        let condition = condition
            .unwrap_or_else(|| Expr::Literal(Token::new(TokenType::TRUE, "true", for_line)));

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block {
                statements: vec![initializer, body],
                is_loop_incrementer: false,
            };
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after if.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.match_token(&TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        let value = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(&TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after while.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after while condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn break_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        let (env_depth, found) = self.calculate_depth();
        if !found {
            return Err(LoxError::parse(&keyword, "Expect 'break' in a loop."));
        }

        self.consume(&TokenType::SEMICOLON, "Expect ';' after break.")?;

        Ok(Stmt::Break { keyword, env_depth })
    }

    fn continue_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        let (env_depth, found) = self.calculate_depth();
        if !found {
            return Err(LoxError::parse(&keyword, "Expect 'continue' in a loop."));
        }

        self.consume(&TokenType::SEMICOLON, "Expect ';' after continue.")?;

        Ok(Stmt::Continue { keyword, env_depth })
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(err) => {
                    self.reporter.error(&err);
                    self.synchronize();
                }
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Expression(value))
    }

    // ─────────────────────────────────────────────────────────────────
    // Expressions, lowest precedence first
    // ─────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if self.match_tokens(&[
            TokenType::EQUAL,
            TokenType::PLUS_EQUAL,
            TokenType::MINUS_EQUAL,
            TokenType::PLUS_PLUS,
            TokenType::MINUS_MINUS,
        ]) {
            let operator = self.previous().clone();

            let value = match operator.token_type {
                // `x++` and `x--` have no right-hand side; they read as
                // adding or subtracting one.
                TokenType::PLUS_PLUS | TokenType::MINUS_MINUS => {
                    Expr::Literal(Token::new(TokenType::NUMBER(1.0), "1", operator.line))
                }

                _ => self.assignment()?,
            };

            return match expr {
                Expr::Variable { name, .. } => {
                    let read = self.variable_expr(name.clone());
                    let value = self.desugar_compound(&operator, read, value);

                    Ok(Expr::Assign {
                        id: self.next_id(),
                        name,
                        value: Box::new(value),
                    })
                }

                Expr::GetField { object, name } | Expr::GetMethod { object, name } => {
                    let read = Expr::GetField {
                        object: object.clone(),
                        name: name.clone(),
                    };
                    let value = self.desugar_compound(&operator, read, value);

                    Ok(Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                    })
                }

                _ => Err(LoxError::parse(&operator, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    /// Rewrite `target op= value` into `target = target op value`.
    /// Plain `=` passes the value through untouched.
    fn desugar_compound(&mut self, operator: &Token, read: Expr, value: Expr) -> Expr {
        let binary_op = match operator.token_type {
            TokenType::EQUAL => return value,

            TokenType::PLUS_EQUAL | TokenType::PLUS_PLUS => {
                Token::new(TokenType::PLUS, "+", operator.line)
            }

            _ => Token::new(TokenType::MINUS, "-", operator.line),
        };

        Expr::Binary {
            left: Box::new(read),
            operator: binary_op,
            right: Box::new(value),
        }
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while self.match_token(&TokenType::OR) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_token(&TokenType::AND) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.addition()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator = self.previous().clone();
            let right = self.addition()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn addition(&mut self) -> Result<Expr> {
        let mut expr = self.multiplication()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator = self.previous().clone();
            let right = self.multiplication()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn multiplication(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR, TokenType::MODULO]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let is_new = self.match_token(&TokenType::NEW);

        if is_new && (!self.check(&TokenType::IDENTIFIER) || !self.is_declared_class(&self.peek().lexeme))
        {
            let token = self.peek().clone();
            return Err(LoxError::parse(&token, "Expected class name after 'new'."));
        }

        let mut expr = self.primary()?;

        if is_new && !self.check(&TokenType::LEFT_PAREN) {
            let token = self.peek().clone();
            return Err(LoxError::parse(&token, "Expect '(' after class name."));
        }

        if !is_new {
            if let Expr::Variable {
                kind: VarKind::Class,
                ref name,
                ..
            } = expr
            {
                if self.check(&TokenType::LEFT_PAREN) {
                    return Err(LoxError::parse(name, "Expected 'new' before instantiation."));
                }
            }
        }

        loop {
            if self.match_token(&TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&TokenType::DOT) {
                let name =
                    self.consume(&TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                // Property access in call position binds a method; in
                // value position it reads a field.
                if self.check(&TokenType::LEFT_PAREN) {
                    expr = Expr::GetMethod {
                        object: Box::new(expr),
                        name,
                    };
                } else {
                    expr = Expr::GetField {
                        object: Box::new(expr),
                        name,
                    };
                }
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let token = self.peek().clone();
                    self.reporter.error(&LoxError::parse(
                        &token,
                        "Can't have more than 255 arguments.",
                    ));
                }

                arguments.push(self.expression()?);

                if !self.match_token(&TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren = self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[
            TokenType::TRUE,
            TokenType::FALSE,
            TokenType::NIL,
            TokenType::NUMBER(0.0),
            TokenType::STRING(String::new()),
        ]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_token(&TokenType::SUPER) {
            let keyword = self.previous().clone();
            self.consume(&TokenType::DOT, "Expect '.' after 'super'.")?;
            let method = self.consume(&TokenType::IDENTIFIER, "Expect superclass method name.")?;

            return Ok(Expr::Super {
                id: self.next_id(),
                keyword,
                method,
            });
        }

        if self.match_token(&TokenType::THIS) {
            let keyword = self.previous().clone();

            return Ok(Expr::This {
                id: self.next_id(),
                keyword,
            });
        }

        if self.match_token(&TokenType::IDENTIFIER) {
            let name = self.previous().clone();

            return Ok(self.variable_expr(name));
        }

        if self.match_token(&TokenType::LEFT_PAREN) {
            let expr = self.expression()?;
            self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(LoxError::parse(self.peek(), "Expect expression."))
    }

    fn variable_expr(&mut self, name: Token) -> Expr {
        let kind = if self.is_declared_class(&name.lexeme) {
            VarKind::Class
        } else {
            VarKind::Variable
        };

        Expr::Variable {
            id: self.next_id(),
            name,
            kind,
        }
    }

    fn is_declared_class(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    // ─────────────────────────────────────────────────────────────────
    // Break/continue depth
    // ─────────────────────────────────────────────────────────────────

    /// Scan backward from the keyword for the nearest unbalanced `{`
    /// belonging to a `for` or `while`.  The returned depth counts the
    /// enclosing blocks between the keyword and that loop.
    fn calculate_depth(&self) -> (usize, bool) {
        let mut curr: isize = self.current as isize - 1;
        let mut depth: usize = 0;
        let mut left_braces: usize = 0;
        let mut right_braces: usize = 0;

        while let Some(prev) = self.token_at(curr) {
            if prev.token_type == TokenType::RIGHT_BRACE {
                right_braces += 1;
            }

            if prev.token_type == TokenType::LEFT_BRACE {
                left_braces += 1;

                if left_braces > right_braces {
                    depth += 1;
                }
            }

            if left_braces > right_braces
                && (prev.token_type == TokenType::FOR || prev.token_type == TokenType::WHILE)
            {
                if prev.token_type == TokenType::FOR && self.for_has_var_initializer(curr + 1) {
                    // A 'var' initializer desugars into one more
                    // enclosing block around the loop.
                    depth += 1;
                }

                return (depth, true);
            }

            curr -= 1;
        }

        (depth, false)
    }

    fn for_has_var_initializer(&self, mut index: isize) -> bool {
        while let Some(token) = self.token_at(index) {
            match token.token_type {
                TokenType::SEMICOLON | TokenType::RIGHT_PAREN => return false,

                TokenType::VAR => return true,

                _ => index += 1,
            }
        }

        false
    }

    fn token_at(&self, index: isize) -> Option<&Token> {
        if index < 0 {
            return None;
        }

        let token = self.tokens.get(index as usize)?;

        if token.token_type == TokenType::EOF {
            None
        } else {
            Some(token)
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Token plumbing
    // ─────────────────────────────────────────────────────────────────

    fn next_id(&mut self) -> ExprId {
        let id = ExprId(self.next_expr_id);
        self.next_expr_id += 1;

        id
    }

    fn synchronize(&mut self) {
        debug!("Synchronizing after parse error at line {}", self.peek().line);

        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {
                    self.advance();
                }
            }
        }
    }

    fn consume(&mut self, token_type: &TokenType, message: impl Into<String>) -> Result<Token> {
        if self.check(token_type) {
            return Ok(self.advance().clone());
        }

        Err(LoxError::parse(self.peek(), message))
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            return true;
        }

        false
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.match_token(token_type) {
                return true;
            }
        }

        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == *token_type
    }

    fn check_next(&self, token_type: &TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) => token.token_type == *token_type,

            None => false,
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}
