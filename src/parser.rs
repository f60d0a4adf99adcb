use std::rc::Rc;

use tracing::debug;

use crate::{prelude::*, SharedErrorReporter};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    had_error: bool,
    error_reporter: Option<SharedErrorReporter>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0, had_error: false, error_reporter: None }
    }

    pub fn with_error_reporting(self, error_reporter: SharedErrorReporter) -> Self {
        Self { error_reporter: Some(error_reporter), ..self }
    }

    /// Parse the whole token stream. The bool is true when at least one
    /// syntax diagnostic was emitted; the statement vector holds every
    /// declaration that parsed cleanly, so callers can still inspect them.
    pub fn parse(&mut self) -> (Vec<Stmt>, bool) {
        let mut statements = vec![];
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        debug!(statements = statements.len(), had_error = self.had_error, "parsing finished");
        (statements, self.had_error)
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_tt(&[TokenType::Class]) {
            self.class_declaration()
        } else if self.match_tt(&[TokenType::Fun]) {
            self.function("function")
        } else if self.match_tt(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        if result.is_none() {
            self.synchronize();
        }

        result
    }

    fn class_declaration(&mut self) -> Option<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let superclass = if self.match_tt(&[TokenType::Less]) {
            let super_name = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Expr::Variable { id: ExprId::next(), name: super_name })
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = vec![];
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Some(Stmt::Class { name, superclass, methods })
    }

    fn var_declaration(&mut self) -> Option<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;

        let initializer = if self.match_tt(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;

        Some(Stmt::Var { name, initializer })
    }

    fn function(&mut self, kind: &str) -> Option<Stmt> {
        let name =
            self.consume(TokenType::Identifier, format!("Expect {} name.", kind).as_str())?;

        self.consume(
            TokenType::LeftParen,
            format!("Expect '(' after {} name.", kind).as_str(),
        )?;

        let mut parameters = vec![];
        if !self.check(&TokenType::RightParen) {
            loop {
                if parameters.len() >= 255 {
                    // Just report the error, but don't bail out
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 parameters.");
                }

                parameters.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LeftBrace,
            format!("Expect '{{' before {} body.", kind).as_str(),
        )?;

        let body = self.block()?.into_iter().map(Rc::new).collect::<Vec<_>>();

        Some(Stmt::Function { name, params: parameters, body })
    }

    fn statement(&mut self) -> Option<Stmt> {
        if self.match_tt(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_tt(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_tt(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_tt(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_tt(&[TokenType::Print]) {
            self.print_statement()
        } else if self.match_tt(&[TokenType::LeftBrace]) {
            Some(Stmt::Block { statements: self.block()? })
        } else {
            self.expression_statement()
        }
    }

    fn if_statement(&mut self) -> Option<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_tt(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Some(Stmt::If { condition, then_branch, else_branch })
    }

    fn while_statement(&mut self) -> Option<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after while condition.")?;

        let body = Box::new(self.statement()?);
        Some(Stmt::While { condition, body })
    }

    /// A 'for' loop has no statement of its own; it desugars into the
    /// equivalent block/while combination.
    fn for_statement(&mut self) -> Option<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_tt(&[TokenType::Semicolon]) {
            None
        } else if self.match_tt(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::Semicolon) {
            self.expression()?
        } else {
            Expr::Literal { value: Literal::Boolean(true) }
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(&TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expr: increment }],
            };
        }

        body = Stmt::While { condition, body: Box::new(body) };

        if let Some(initializer) = initializer {
            body = Stmt::Block { statements: vec![initializer, body] };
        }

        Some(body)
    }

    fn return_statement(&mut self) -> Option<Stmt> {
        let keyword = self.previous();
        let value = if !self.check(&TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Some(Stmt::Return { keyword, value })
    }

    fn print_statement(&mut self) -> Option<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Some(Stmt::Print { expr })
    }

    fn block(&mut self) -> Option<Vec<Stmt>> {
        let mut statements = vec![];

        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Some(statements)
    }

    fn expression_statement(&mut self) -> Option<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Some(Stmt::Expression { expr })
    }

    fn expression(&mut self) -> Option<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Option<Expr> {
        let expr = self.or()?;

        if self.match_tt(&[TokenType::Equal]) {
            let equals = self.previous();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => {
                    Some(Expr::Assignment { id: ExprId::next(), name, value })
                }
                Expr::Get { object, name } => Some(Expr::Set { object, name, value }),
                other => {
                    // Report, but keep the parsed left-hand side so parsing
                    // can continue past the '='.
                    self.error(&equals, "Invalid assignment target.");
                    Some(other)
                }
            };
        }

        Some(expr)
    }

    fn or(&mut self) -> Option<Expr> {
        let mut expr = self.and()?;

        while self.match_tt(&[TokenType::Or]) {
            let operator = self.previous();
            let right = self.and()?;
            expr = Expr::Logical { left: Box::new(expr), operator, right: Box::new(right) };
        }

        Some(expr)
    }

    fn and(&mut self) -> Option<Expr> {
        let mut expr = self.equality()?;

        while self.match_tt(&[TokenType::And]) {
            let operator = self.previous();
            let right = self.equality()?;
            expr = Expr::Logical { left: Box::new(expr), operator, right: Box::new(right) };
        }

        Some(expr)
    }

    fn equality(&mut self) -> Option<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tt(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous();
            let right = self.comparison()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Some(expr)
    }

    fn comparison(&mut self) -> Option<Expr> {
        let mut expr = self.term()?;

        while self.match_tt(&[
            TokenType::GreaterEqual,
            TokenType::Greater,
            TokenType::LessEqual,
            TokenType::Less,
        ]) {
            let operator = self.previous();
            let right = self.term()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Some(expr)
    }

    fn term(&mut self) -> Option<Expr> {
        let mut expr = self.factor()?;

        while self.match_tt(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous();
            let right = self.factor()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Some(expr)
    }

    fn factor(&mut self) -> Option<Expr> {
        let mut expr = self.unary()?;

        while self.match_tt(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous();
            let right = self.unary()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Some(expr)
    }

    fn unary(&mut self) -> Option<Expr> {
        if self.match_tt(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous();
            let right = self.unary()?;
            return Some(Expr::Unary { operator, right: Box::new(right) });
        }

        self.call()
    }

    fn call(&mut self) -> Option<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tt(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tt(&[TokenType::Dot]) {
                let name =
                    self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get { object: Box::new(expr), name };
            } else {
                break;
            }
        }

        Some(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Option<Expr> {
        let mut arguments = vec![];

        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    // Just report the error, but don't bail out
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 arguments.");
                }

                arguments.push(self.expression()?);

                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Some(Expr::Call { callee: Box::new(callee), paren, arguments })
    }

    fn primary(&mut self) -> Option<Expr> {
        if self.match_tt(&[TokenType::False]) {
            return Some(Expr::Literal { value: Literal::Boolean(false) });
        }
        if self.match_tt(&[TokenType::True]) {
            return Some(Expr::Literal { value: Literal::Boolean(true) });
        }
        if self.match_tt(&[TokenType::Nil]) {
            return Some(Expr::Literal { value: Literal::Null });
        }
        if self.match_tt(&[TokenType::Number, TokenType::StringLiteral]) {
            return Some(Expr::Literal {
                value: self.previous().literal.expect("expecting a number or string here"),
            });
        }
        if self.match_tt(&[TokenType::Super]) {
            let keyword = self.previous();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method =
                self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Some(Expr::Super { id: ExprId::next(), keyword, method });
        }
        if self.match_tt(&[TokenType::This]) {
            return Some(Expr::This { id: ExprId::next(), keyword: self.previous() });
        }
        if self.match_tt(&[TokenType::Identifier]) {
            return Some(Expr::Variable { id: ExprId::next(), name: self.previous() });
        }
        if self.match_tt(&[TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Some(Expr::Grouping { expr: Box::new(expr) });
        }

        // Error productions: a binary operator with no left operand. Report,
        // then parse and discard the right operand so later diagnostics stay
        // accurate. The surrounding declaration is dropped via synchronize().
        if self.match_tt(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous();
            self.error(&operator, "Missing left-hand operand.");
            let _ = self.equality();
            return None;
        }
        if self.match_tt(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous();
            self.error(&operator, "Missing left-hand operand.");
            let _ = self.comparison();
            return None;
        }
        if self.match_tt(&[TokenType::Plus]) {
            let operator = self.previous();
            self.error(&operator, "Missing left-hand operand.");
            let _ = self.term();
            return None;
        }
        if self.match_tt(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous();
            self.error(&operator, "Missing left-hand operand.");
            let _ = self.factor();
            return None;
        }

        let token = self.peek().clone();
        self.error(&token, "Expect expression.");
        None
    }

    /// Return the next token if its `token_type` matches the given type.
    /// Otherwise, report the error message and return `None`.
    fn consume(&mut self, token_type: TokenType, message: &str) -> Option<Token> {
        if self.check(&token_type) {
            return Some(self.advance());
        }

        let token = self.peek().clone();
        self.error(&token, message);
        None
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.had_error = true;
        if let Some(reporter) = &self.error_reporter {
            reporter.borrow_mut().token_error(token, message);
        }
    }

    fn match_tt(&mut self, types: &[TokenType]) -> bool {
        for tt in types {
            if self.check(tt) {
                self.advance();
                return true;
            }
        }

        false
    }

    /// Check to see if the next token's type matches the given `token_type`.
    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == *token_type
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap()
    }

    fn previous(&self) -> Token {
        self.tokens.get(self.current - 1).unwrap().clone()
    }

    fn synchronize(&mut self) {
        self.advance();

        // Move and discard tokens until we find a statement boundary
        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::AstPrinter;
    use crate::scanner::Scanner;

    fn parse_source(source: &str) -> (Vec<Stmt>, bool) {
        let mut scanner = Scanner::new(source);
        let (tokens, _) = scanner.scan_tokens();
        Parser::new(tokens).parse()
    }

    fn parse_expression(source: &str) -> Expr {
        let (mut stmts, had_error) = parse_source(source);
        assert!(!had_error, "unexpected parse error");
        match stmts.pop().expect("no statement was created") {
            Stmt::Expression { expr } => expr,
            other => panic!("statement is not an expression: {:?}", other),
        }
    }

    #[test]
    fn precedence_binds_factor_over_term() {
        let expr = parse_expression("1 + 2 * 3;");
        assert_eq!(AstPrinter::to_string(&expr), "(+ 1 (* 2 3))");
    }

    #[test]
    fn grouping_overrides_precedence() {
        let expr = parse_expression("(1 + 2) * 3;");
        assert_eq!(AstPrinter::to_string(&expr), "(* (group (+ 1 2)) 3)");
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse_expression("a = b = 1;");
        assert_eq!(AstPrinter::to_string(&expr), "(a = (b = 1))");
    }

    #[test]
    fn property_set_target() {
        let expr = parse_expression("obj.field = 1;");
        assert!(matches!(expr, Expr::Set { .. }));
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        let (_, had_error) = parse_source("1 + 2 = 3;");
        assert!(had_error);
    }

    #[test]
    fn for_loop_desugars_to_while() {
        let (stmts, had_error) = parse_source("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!had_error);
        assert_eq!(stmts.len(), 1);

        // Block([Var, While(cond, Block([body, increment]))])
        let Stmt::Block { statements } = &stmts[0] else {
            panic!("for did not desugar to a block");
        };
        assert!(matches!(statements[0], Stmt::Var { .. }));
        assert!(matches!(statements[1], Stmt::While { .. }));
    }

    #[test]
    fn class_with_superclass_and_methods() {
        let (stmts, had_error) = parse_source("class B < A { method() {} init(x) {} }");
        assert!(!had_error);
        let Stmt::Class { name, superclass, methods } = &stmts[0] else {
            panic!("expected a class declaration");
        };
        assert_eq!(name.lexeme, "B");
        assert!(superclass.is_some());
        assert_eq!(methods.len(), 2);
    }

    #[test]
    fn missing_left_operand_reports_and_recovers() {
        let (stmts, had_error) = parse_source("* 3; print 1;");
        assert!(had_error);
        // The malformed statement is dropped; the next one survives.
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Print { .. }));
    }

    #[test]
    fn parse_recovers_at_statement_boundary() {
        let (stmts, had_error) = parse_source("var = 1; var a = 2;");
        assert!(had_error);
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Var { .. }));
    }

    #[test]
    fn binding_expressions_get_distinct_ids() {
        let expr = parse_expression("a + a;");
        let Expr::Binary { left, right, .. } = expr else {
            panic!("expected a binary expression");
        };
        assert_ne!(left.unique_id(), right.unique_id());
    }
}
