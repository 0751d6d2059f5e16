//! Recursive-descent parser.
//!
//! Consumes the scanned token list and produces a statement list.  Errors go
//! through the reporter; after a failed declaration the parser synchronizes
//! to the next plausible statement boundary and keeps going, so one bad
//! statement does not hide the rest of the diagnostics.

use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::reporter::ErrorReporter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

/// Parameter and argument lists are capped; exceeding the cap is reported
/// but does not abort the parse.
const MAX_ARITY: usize = 255;

pub struct Parser<'r> {
    tokens: Vec<Token>,
    current: usize,
    reporter: &'r ErrorReporter,
}

impl<'r> Parser<'r> {
    pub fn new(tokens: Vec<Token>, reporter: &'r ErrorReporter) -> Self {
        Parser {
            tokens,
            current: 0,
            reporter,
        }
    }

    /// Parse the whole token stream.  Returns every statement that parsed
    /// cleanly; whether errors occurred lives in the reporter.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    debug!("Parse error, synchronizing: {}", e);
                    self.synchronize();
                }
            }
        }

        statements
    }

    fn declaration(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::VAR]) {
            return self.var_declaration();
        }
        if self.match_tokens(&[TokenType::FUNC]) {
            return self.function_declaration();
        }
        self.statement()
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self
            .consume(TokenType::IDENTIFIER, "expect variable name")?
            .clone();

        let initializer = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "expect ';' after variable declaration",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    fn function_declaration(&mut self) -> Result<Stmt> {
        let name = self
            .consume(TokenType::IDENTIFIER, "expect function name")?
            .clone();

        self.consume(TokenType::LEFT_PAREN, "expect '(' after function name")?;

        let mut params: Vec<Token> = Vec::new();
        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    let tok = self.peek().clone();
                    let _ = self.error(&tok, "can't have more than 255 parameters");
                }

                let param = self
                    .consume(TokenType::IDENTIFIER, "expect parameter name")?
                    .clone();
                params.push(param);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "expect ')' after parameters")?;
        self.consume(TokenType::LEFT_BRACE, "expect '{' before function body")?;

        let body = self.block(TokenType::RIGHT_BRACE, "}")?;

        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }
        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }
        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }
        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }
        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }
        if self.match_tokens(&[TokenType::DO]) {
            return Ok(Stmt::Block(self.block(TokenType::END, "end")?));
        }
        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block(TokenType::RIGHT_BRACE, "}")?));
        }
        self.expression_statement()
    }

    fn block(&mut self, limit: TokenType, limit_name: &str) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&limit) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(limit, &format!("expect '{}' after a block", limit_name))?;

        Ok(statements)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let condition = self.expression()?;

        self.consume(TokenType::THEN, "expect 'then' after if condition")?;

        let then_branch = Box::new(self.statement()?);

        let mut branch = "if";
        let else_branch = if self.match_tokens(&[TokenType::ELSE]) {
            branch = "else";
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        self.consume(
            TokenType::END,
            &format!("expect 'end' after {} branch body", branch),
        )?;

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "expect ';' after a value")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        let value = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "expect ';' after return value")?;

        Ok(Stmt::Return { keyword, value })
    }

    // The `do` is required but not consumed here: the body statement is the
    // `do ... end` block itself, which supplies both delimiters.
    fn while_statement(&mut self) -> Result<Stmt> {
        let condition = self.expression()?;

        if !self.check(&TokenType::DO) {
            let tok = self.peek().clone();
            return Err(self.error(&tok, "expect 'do' after while condition"));
        }

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    /// `for` is pure sugar: it parses into a `while` wrapped in blocks, so
    /// the resolver and evaluator never see a for-loop.
    fn for_statement(&mut self) -> Result<Stmt> {
        let for_line = self.previous().line;

        let initializer = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "expect ';' after loop condition")?;

        let increment = if !self.check(&TokenType::DO) {
            let increment = self.expression()?;
            if !self.check(&TokenType::DO) {
                let tok = self.peek().clone();
                return Err(self.error(&tok, "expect 'do' after for loop increment"));
            }
            Some(increment)
        } else {
            None
        };

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| {
            Expr::Literal(Token::new(TokenType::TRUE, "true".to_string(), for_line))
        });

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "expect ';' after a value")?;
        Ok(Stmt::Expression(value))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.logic_or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            match expr {
                Expr::Variable { name, .. } => {
                    return Ok(Expr::Assign {
                        id: ExprId::fresh(),
                        name,
                        value: Box::new(value),
                    });
                }

                other => {
                    // Reported, not raised: parsing carries on with the
                    // left-hand side so one bad target costs one diagnostic.
                    let _ = self.error(&equals, "invalid assignment target");
                    return Ok(other);
                }
            }
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr> {
        let mut expr = self.logic_and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let op = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.concat()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let op = self.previous().clone();
            let right = self.concat()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn concat(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::DOT_DOT]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS, TokenType::NOT]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        while self.match_tokens(&[TokenType::LEFT_PAREN]) {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut args: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if args.len() >= MAX_ARITY {
                    let tok = self.peek().clone();
                    let _ = self.error(&tok, "can't have more than 255 arguments");
                }

                args.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren = self
            .consume(TokenType::RIGHT_PAREN, "expect ')' after arguments")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            args,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::FALSE, TokenType::TRUE, TokenType::NULL]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::NUMBER(0.0), TokenType::STRING(String::new())]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: ExprId::fresh(),
                name: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "expect ')' after expression")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        let tok = self.peek().clone();
        let msg = if self.current == 0 {
            format!("unknown expression '{}'", tok.lexeme)
        } else {
            format!(
                "unknown expression '{}' after '{}'",
                tok.lexeme,
                self.previous().lexeme
            )
        };

        Err(self.reporter.report(LoxError::parse(tok.line, msg)))
    }

    /// Skip tokens until a plausible statement boundary: just past a `;`, or
    /// just before a keyword that starts a declaration or statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FOR
                | TokenType::WHILE
                | TokenType::FUNC
                | TokenType::IF
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::VAR => return,

                _ => {}
            }

            self.advance();
        }
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        &self.peek().token_type == token_type
    }

    fn consume(&mut self, token_type: TokenType, msg: &str) -> Result<&Token> {
        if self.check(&token_type) {
            return Ok(self.advance());
        }

        let tok = self.peek().clone();
        let full_msg = if tok.token_type == TokenType::EOF {
            format!("at end: {}", msg)
        } else {
            format!("at '{}': {}", tok.lexeme, msg)
        };

        Err(self.reporter.report(LoxError::parse(tok.line, full_msg)))
    }

    fn error(&self, token: &Token, msg: &str) -> LoxError {
        let full_msg = if token.token_type == TokenType::EOF {
            format!("at end: {}", msg)
        } else {
            format!("at '{}': {}", token.lexeme, msg)
        };

        self.reporter.report(LoxError::parse(token.line, full_msg))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_printer::AstPrinter;
    use crate::scanner::Scanner;

    fn parse_source(source: &str) -> (Vec<Stmt>, bool) {
        let reporter = ErrorReporter::new();
        let tokens: Vec<Token> = Scanner::new(source.as_bytes().to_vec())
            .filter_map(|t| t.ok())
            .collect();
        let stmts = Parser::new(tokens, &reporter).parse();
        (stmts, reporter.had_error())
    }

    fn parse_expr(source: &str) -> String {
        let (stmts, had_error) = parse_source(source);
        assert!(!had_error, "unexpected parse error in {:?}", source);
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Expression(expr) => AstPrinter.print(expr),
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(parse_expr("1 + 2 * 3;"), "(+ 1 (* 2 3))");
        assert_eq!(parse_expr("(1 + 2) * 3;"), "(* (group (+ 1 2)) 3)");
        assert_eq!(parse_expr("1 - 2 - 3;"), "(- (- 1 2) 3)");
    }

    #[test]
    fn concat_binds_tighter_than_factor() {
        assert_eq!(parse_expr("a * b .. c;"), "(* a (.. b c))");
        assert_eq!(parse_expr("a .. b .. c;"), "(.. (.. a b) c)");
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(parse_expr("1 < 2 == true;"), "(== (< 1 2) true)");
    }

    #[test]
    fn logical_operators() {
        assert_eq!(parse_expr("a or b and c;"), "(or a (and b c))");
    }

    #[test]
    fn unary_forms() {
        assert_eq!(parse_expr("!true;"), "(! true)");
        assert_eq!(parse_expr("not true;"), "(not true)");
        assert_eq!(parse_expr("--1;"), "(- (- 1))");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(parse_expr("a = b = 1;"), "(= a (= b 1))");
    }

    #[test]
    fn call_with_arguments() {
        assert_eq!(parse_expr("f(1, 2)(3);"), "(call (call f 1 2) 3)");
    }

    #[test]
    fn invalid_assignment_target_is_reported_not_fatal() {
        let (stmts, had_error) = parse_source("1 = 2;");
        assert!(had_error);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn if_then_else_end() {
        let (stmts, had_error) = parse_source("if x > 1 then print 1; else print 2; end");
        assert!(!had_error);
        assert!(matches!(
            &stmts[0],
            Stmt::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn while_requires_do_block() {
        let (stmts, had_error) = parse_source("while x < 3 do x = x + 1; end");
        assert!(!had_error);
        match &stmts[0] {
            Stmt::While { body, .. } => assert!(matches!(**body, Stmt::Block(_))),
            other => panic!("expected while, got {:?}", other),
        }

        let (_, had_error) = parse_source("while x < 3 print x;");
        assert!(had_error);
    }

    #[test]
    fn for_desugars_to_while_in_block() {
        let (stmts, had_error) = parse_source("for var i = 0; i < 3; i = i + 1 do print i; end");
        assert!(!had_error);
        match &stmts[0] {
            Stmt::Block(inner) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(inner[0], Stmt::Var { .. }));
                match &inner[1] {
                    Stmt::While { body, .. } => match &**body {
                        Stmt::Block(parts) => {
                            assert_eq!(parts.len(), 2);
                            assert!(matches!(parts[1], Stmt::Expression(Expr::Assign { .. })));
                        }
                        other => panic!("expected block body, got {:?}", other),
                    },
                    other => panic!("expected while, got {:?}", other),
                }
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn for_without_condition_defaults_to_true() {
        let (stmts, had_error) = parse_source("for ;; do print 1; end");
        assert!(!had_error);
        match &stmts[0] {
            Stmt::While { condition, .. } => match condition {
                Expr::Literal(tok) => assert_eq!(tok.token_type, TokenType::TRUE),
                other => panic!("expected literal condition, got {:?}", other),
            },
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn function_declaration_shape() {
        let (stmts, had_error) = parse_source("func add(a, b) { return a + b; }");
        assert!(!had_error);
        match &stmts[0] {
            Stmt::Function(decl) => {
                assert_eq!(decl.name.lexeme, "add");
                assert_eq!(decl.params.len(), 2);
                assert_eq!(decl.body.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn synchronize_recovers_at_statement_boundary() {
        let (stmts, had_error) = parse_source("var 1; print 2;");
        assert!(had_error);
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Print(_)));
    }

    #[test]
    fn do_end_block() {
        let (stmts, had_error) = parse_source("do var a = 1; print a; end");
        assert!(!had_error);
        match &stmts[0] {
            Stmt::Block(inner) => assert_eq!(inner.len(), 2),
            other => panic!("expected block, got {:?}", other),
        }
    }
}
