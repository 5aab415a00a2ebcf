use super::ast::{Expression, Statement};
use super::error::{Diagnostics, ParseError};
use super::token::{Literal, Token, TokenType};

type ParseResult<T> = Result<T, ParseError>;

// Deepest nesting of statements and subexpressions accepted.
pub const MAX_NESTING: usize = 64;

// Stands in for the EOF token when handed an empty token slice.
static END: Token<'static> = Token {
    tokentype: TokenType::EOF,
    lexeme: "",
    line: 1,
};

macro_rules! advance_if {
    ($self:expr, $($pattern:pat)|+) => {
        if matches!($self.peek().tokentype, $($pattern)|+) {
            Some($self.advance())
        } else {
            None
        }
    };
}

macro_rules! consume {
    ($self:expr, $pattern:pat, $message:expr) => {
        match $self.peek().tokentype {
            $pattern => Ok($self.advance()),
            _ => Err($self.error($message)),
        }
    };
}

/// Parses a token stream into statements. Syntax errors are reported to
/// `diagnostics`; malformed statements are skipped.
pub fn parse<'a>(tokens: &'a [Token<'a>], diagnostics: &mut Diagnostics) -> Vec<Statement<'a>> {
    let mut parser = Parser::new(tokens);
    let statements = parser.parse();
    for error in parser.errors.drain(..) {
        diagnostics.report(error);
    }
    tracing::debug!(count = statements.len(), "parsed statements");
    statements
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    current: usize,
    depth: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    /// `tokens` must end with an EOF token, as produced by the scanner.
    pub fn new(tokens: &'a [Token<'a>]) -> Parser<'a> {
        Parser {
            tokens,
            current: 0,
            depth: 0,
            errors: Vec::new(),
        }
    }
    pub fn parse(&mut self) -> Vec<Statement<'a>> {
        let mut statements: Vec<Statement<'a>> = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        statements
    }
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }
    fn declaration(&mut self) -> Option<Statement<'a>> {
        let result = if advance_if!(self, TokenType::Var).is_some() {
            self.var_declaration()
        } else {
            self.statement()
        };
        match result {
            Ok(statement) => Some(statement),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }
    fn var_declaration(&mut self) -> ParseResult<Statement<'a>> {
        let name = consume!(self, TokenType::Identifier, "Expect variable name.")?;
        let initializer = if advance_if!(self, TokenType::Equal).is_some() {
            Some(self.expression()?)
        } else {
            None
        };
        consume!(
            self,
            TokenType::Semicolon,
            "Expect ';' after variable declaration."
        )?;
        Ok(Statement::Var { name, initializer })
    }
    fn statement(&mut self) -> ParseResult<Statement<'a>> {
        self.nested(|parser| parser.bare_statement())
    }
    fn bare_statement(&mut self) -> ParseResult<Statement<'a>> {
        match self.peek().tokentype {
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::Print => {
                self.advance();
                self.print_statement()
            }
            TokenType::LeftBrace => {
                self.advance();
                Ok(Statement::Block(self.block()?))
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            _ => self.expression_statement(),
        }
    }
    fn for_statement(&mut self) -> ParseResult<Statement<'a>> {
        consume!(self, TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer = match self.peek().tokentype {
            TokenType::Semicolon => {
                self.advance();
                None
            }
            TokenType::Var => {
                self.advance();
                Some(self.var_declaration()?)
            }
            _ => Some(self.expression_statement()?),
        };

        let condition = match self.peek().tokentype {
            TokenType::Semicolon => Expression::Literal(Literal::Boolean(true)),
            _ => self.expression()?,
        };
        consume!(self, TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = match self.peek().tokentype {
            TokenType::RightParen => None,
            _ => Some(self.expression()?),
        };
        consume!(self, TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            body = Statement::Block(vec![body, Statement::Expression(increment)]);
        }
        body = Statement::While {
            condition,
            body: Box::new(body),
        };
        Ok(match initializer {
            None => body,
            Some(initializer) => Statement::Block(vec![initializer, body]),
        })
    }
    fn while_statement(&mut self) -> ParseResult<Statement<'a>> {
        consume!(self, TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        consume!(self, TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(Statement::While {
            condition,
            body: Box::new(body),
        })
    }
    fn if_statement(&mut self) -> ParseResult<Statement<'a>> {
        consume!(self, TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        consume!(self, TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        // Binds to the nearest `if`.
        let else_branch = match advance_if!(self, TokenType::Else) {
            Some(_) => Some(Box::new(self.statement()?)),
            None => None,
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }
    fn block(&mut self) -> ParseResult<Vec<Statement<'a>>> {
        let mut statements: Vec<Statement<'a>> = Vec::new();
        while !self.is_at_end() {
            if let TokenType::RightBrace = self.peek().tokentype {
                break;
            }
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        consume!(self, TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }
    fn print_statement(&mut self) -> ParseResult<Statement<'a>> {
        let expr = self.expression()?;
        consume!(self, TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Statement::Print(expr))
    }
    fn expression_statement(&mut self) -> ParseResult<Statement<'a>> {
        let expr = self.expression()?;
        consume!(self, TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Statement::Expression(expr))
    }
    pub fn expression(&mut self) -> ParseResult<Expression<'a>> {
        self.nested(|parser| parser.assignment())
    }
    fn assignment(&mut self) -> ParseResult<Expression<'a>> {
        let expr = self.comma()?;
        match advance_if!(self, TokenType::Equal) {
            Some(equals) => {
                let value = self.nested(|parser| parser.assignment())?;
                match expr {
                    Expression::Variable(name) => Ok(Expression::Assign {
                        name,
                        value: Box::new(value),
                    }),
                    _ => Err(ParseError::at(equals, "Invalid assignment target.")),
                }
            }
            None => Ok(expr),
        }
    }
    fn comma(&mut self) -> ParseResult<Expression<'a>> {
        let mut expr = self.conditional()?;
        while let Some(operator) = advance_if!(self, TokenType::Comma) {
            let right = self.conditional()?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn conditional(&mut self) -> ParseResult<Expression<'a>> {
        if let Some(question) = advance_if!(self, TokenType::Question) {
            // Reported but not fatal: parse the branches to stay in step.
            self.errors.push(ParseError::at(
                question,
                "Conditional operator cannot be used without a condition.",
            ));
            self.expression()?;
            consume!(
                self,
                TokenType::Colon,
                "Expect ':' after then branch of conditional expression."
            )?;
            return self.nested(|parser| parser.conditional());
        }

        let expr = self.or()?;
        if advance_if!(self, TokenType::Question).is_some() {
            let then_branch = self.expression()?;
            consume!(
                self,
                TokenType::Colon,
                "Expect ':' after then branch of conditional expression."
            )?;
            let else_branch = self.nested(|parser| parser.conditional())?;
            return Ok(Expression::Ternary {
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(expr)
    }
    fn or(&mut self) -> ParseResult<Expression<'a>> {
        let mut expr = self.and()?;
        while let Some(operator) = advance_if!(self, TokenType::Or) {
            let right = self.and()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn and(&mut self) -> ParseResult<Expression<'a>> {
        let mut expr = self.equality()?;
        while let Some(operator) = advance_if!(self, TokenType::And) {
            let right = self.equality()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn equality(&mut self) -> ParseResult<Expression<'a>> {
        let mut expr = self.comparison()?;
        while let Some(operator) = advance_if!(self, TokenType::BangEqual | TokenType::EqualEqual)
        {
            let right = self.comparison()?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn comparison(&mut self) -> ParseResult<Expression<'a>> {
        let mut expr = self.term()?;
        while let Some(operator) = advance_if!(
            self,
            TokenType::Greater | TokenType::GreaterEqual | TokenType::Less | TokenType::LessEqual
        ) {
            let right = self.term()?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn term(&mut self) -> ParseResult<Expression<'a>> {
        let mut expr = self.factor()?;
        while let Some(operator) = advance_if!(self, TokenType::Minus | TokenType::Plus) {
            let right = self.factor()?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn factor(&mut self) -> ParseResult<Expression<'a>> {
        let mut expr = self.unary()?;
        while let Some(operator) = advance_if!(self, TokenType::Slash | TokenType::Star) {
            let right = self.unary()?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn unary(&mut self) -> ParseResult<Expression<'a>> {
        match advance_if!(self, TokenType::Bang | TokenType::Minus) {
            Some(operator) => {
                let right = self.nested(|parser| parser.unary())?;
                Ok(Expression::Unary {
                    operator,
                    right: Box::new(right),
                })
            }
            None => self.primary(),
        }
    }
    fn primary(&mut self) -> ParseResult<Expression<'a>> {
        if let Some(literal) = self.peek().literal() {
            self.advance();
            return Ok(Expression::Literal(literal));
        }
        match self.peek().tokentype {
            TokenType::Identifier => Ok(Expression::Variable(self.advance())),
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                consume!(self, TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Expression::Grouping(Box::new(expr)))
            }
            _ => Err(self.error("Expect expression.")),
        }
    }
    fn nested<T>(
        &mut self,
        rule: impl FnOnce(&mut Parser<'a>) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("Too much nesting."));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if let TokenType::Semicolon = self.previous().tokentype {
                return;
            }
            match self.peek().tokentype {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => (),
            }
            self.advance();
        }
    }
    fn advance(&mut self) -> &'a Token<'a> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }
    fn peek(&self) -> &'a Token<'a> {
        let tokens: &'a [Token<'a>] = self.tokens;
        tokens
            .get(self.current)
            .or_else(|| tokens.last())
            .unwrap_or(&END)
    }
    fn previous(&self) -> &'a Token<'a> {
        let tokens: &'a [Token<'a>] = self.tokens;
        tokens.get(self.current.saturating_sub(1)).unwrap_or(&END)
    }
    fn error(&self, message: &str) -> ParseError {
        ParseError::at(self.peek(), message)
    }
}

#[cfg(test)]
mod parser_tests {
    use super::*;
    use crate::printer;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> (Vec<String>, Vec<String>) {
        let mut diagnostics = Diagnostics::new();
        let tokens = scanner::scan_tokens(source, &mut diagnostics);
        let statements = parse(&tokens, &mut diagnostics);
        let printed = statements.iter().map(printer::parenthesize).collect();
        let errors = diagnostics.iter().map(|e| e.to_string()).collect();
        (printed, errors)
    }

    fn parse_ok(source: &str) -> Vec<String> {
        let (printed, errors) = parse_source(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        printed
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        assert_eq!(parse_ok("1 + 2 * 3;"), vec!["(; (+ 1 (* 2 3)))"]);
        assert_eq!(parse_ok("1 - 2 - 3;"), vec!["(; (- (- 1 2) 3))"]);
    }

    #[test]
    fn full_precedence_ladder() {
        assert_eq!(
            parse_ok("print !a == b < -c or d and e;"),
            vec!["(print (or (== (! a) (< b (- c))) (and d e)))"]
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        assert_eq!(
            parse_ok("true ? 1 : false ? 2 : 3;"),
            vec!["(; (?: true 1 (?: false 2 3)))"]
        );
    }

    #[test]
    fn comma_is_looser_than_ternary() {
        assert_eq!(
            parse_ok("a ? b : c, d;"),
            vec!["(; (, (?: a b c) d))"]
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(parse_ok("a = b = 3;"), vec!["(; (= a (= b 3)))"]);
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        let (printed, errors) = parse_source("1 + a = 3; print 2;");
        assert_eq!(
            errors,
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
        assert_eq!(printed, vec!["(print 2)"]);
    }

    #[test]
    fn var_declarations() {
        assert_eq!(
            parse_ok("var a; var b = \"x\";"),
            vec!["(var a)", "(var b x)"]
        );
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        assert_eq!(
            parse_ok("if (a) if (b) print 1; else print 2;"),
            vec!["(if a (if b (print 1) (print 2)))"]
        );
    }

    #[test]
    fn for_loop_desugars_to_while() {
        assert_eq!(
            parse_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))"]
        );
        assert_eq!(parse_ok("for (;;) print 1;"), vec!["(while true (print 1))"]);
    }

    #[test]
    fn synchronizes_after_a_bad_statement() {
        let (printed, errors) = parse_source("var = 1;\nprint 2;\nprint 3;");
        assert_eq!(
            errors,
            vec!["[line 1] Error at '=': Expect variable name."]
        );
        assert_eq!(printed, vec!["(print 2)", "(print 3)"]);
    }

    #[test]
    fn bad_statement_inside_block_keeps_the_block() {
        let (printed, errors) = parse_source("{ print ; print 1; }");
        assert_eq!(errors, vec!["[line 1] Error at ';': Expect expression."]);
        assert_eq!(printed, vec!["(block (print 1))"]);
    }

    #[test]
    fn missing_semicolon_at_end() {
        let (_, errors) = parse_source("print 1");
        assert_eq!(errors, vec!["[line 1] Error at end: Expect ';' after value."]);
    }

    #[test]
    fn conditional_without_condition_is_reported_and_skipped() {
        let (printed, errors) = parse_source("print ? 1 : 2;\nprint 3;");
        assert_eq!(
            errors,
            vec!["[line 1] Error at '?': Conditional operator cannot be used without a condition."]
        );
        assert_eq!(printed, vec!["(print 2)", "(print 3)"]);
    }

    #[test]
    fn deep_grouping_is_a_syntax_error() {
        let source = format!("print {}1{};\nprint 2;", "(".repeat(200), ")".repeat(200));
        let (printed, errors) = parse_source(&source);
        assert_eq!(errors, vec!["[line 1] Error at '(': Too much nesting."]);
        assert_eq!(printed, vec!["(print 2)"]);

        let source = format!("print {}1{};", "(".repeat(40), ")".repeat(40));
        assert_eq!(parse_ok(&source).len(), 1);
    }

    #[test]
    fn deep_unary_and_blocks_are_syntax_errors() {
        let source = format!("{}true;", "!".repeat(200));
        let (printed, errors) = parse_source(&source);
        assert_eq!(errors, vec!["[line 1] Error at '!': Too much nesting."]);
        assert!(printed.is_empty());

        let source = format!("{}{}", "{".repeat(200), "}".repeat(200));
        let (_, errors) = parse_source(&source);
        assert_eq!(errors[0], "[line 1] Error at '{': Too much nesting.");
    }

    #[test]
    fn parser_over_borrowed_tokens() {
        let tokens = vec![
            Token {
                tokentype: TokenType::Bang,
                lexeme: "!",
                line: 1,
            },
            Token {
                tokentype: TokenType::True,
                lexeme: "true",
                line: 1,
            },
            Token {
                tokentype: TokenType::EOF,
                lexeme: "",
                line: 1,
            },
        ];
        let mut parser = Parser::new(&tokens);
        let expr = parser.expression().expect("valid expression");
        assert_eq!(
            expr,
            Expression::Unary {
                operator: &tokens[0],
                right: Box::new(Expression::Literal(Literal::Boolean(true))),
            }
        );
        assert!(parser.errors().is_empty());
    }
}
