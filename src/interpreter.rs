use crate::ast::{Expression, Statement, Visitor};
use crate::environment::Environment;
use crate::error::{Diagnostics, Error, Result, RuntimeError, RuntimeErrorKind};
use crate::token::{Token, TokenType};
use crate::value::Value;
use std::io::{self, Write};

/// Tree-walking evaluator. Program output goes to `writer`; the global scope
/// lives as long as the interpreter, so definitions carry over between calls
/// to `interpret`.
pub struct Interpreter<W> {
    environment: Environment,
    writer: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(writer: W) -> Interpreter<W> {
        Interpreter {
            environment: Environment::new(),
            writer,
        }
    }
    pub fn writer(&self) -> &W {
        &self.writer
    }
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }
    pub fn into_writer(self) -> W {
        self.writer
    }
    /// Runs each top-level statement in order. A runtime error is reported and
    /// abandons only the statement that raised it. Only a failure to write
    /// program output stops the run.
    pub fn interpret(
        &mut self,
        statements: &[Statement],
        diagnostics: &mut Diagnostics,
    ) -> io::Result<()> {
        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}
                Err(Error::Io(e)) => return Err(e),
                Err(e) => diagnostics.report(e),
            }
        }
        self.writer.flush()
    }
    pub fn evaluate(&mut self, expression: &Expression) -> Result<Value> {
        self.visit(expression)
    }
    fn execute(&mut self, statement: &Statement) -> Result<()> {
        tracing::trace!(?statement, "execute");
        self.visit(statement)
    }
    fn execute_block(&mut self, statements: &[Statement]) -> Result<()> {
        self.environment.push_scope();
        // The scope is popped on the error path too.
        let result = statements.iter().try_for_each(|s| self.execute(s));
        self.environment.pop_scope();
        result
    }
}

fn numeric_operand(operator: &Token, operand: Value) -> Result<f64> {
    match operand {
        Value::Number(x) => Ok(x),
        _ => Err(RuntimeError::new(operator, RuntimeErrorKind::OperandMustBeNumber).into()),
    }
}

fn compute_if_numbers<T, F>(operator: &Token, left: Value, right: Value, f: F) -> Result<Value>
where
    T: Into<Value>,
    F: Fn(f64, f64) -> T,
{
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(f(l, r).into()),
        _ => Err(RuntimeError::new(operator, RuntimeErrorKind::OperandsMustBeNumbers).into()),
    }
}

fn add(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
        (Value::String(mut l), r) => {
            l.push_str(&r.to_string());
            Ok(Value::String(l))
        }
        (l, Value::String(r)) => Ok(Value::String(format!("{}{}", l, r))),
        _ => Err(RuntimeError::new(
            operator,
            RuntimeErrorKind::OperandsMustBeNumbersOrStrings,
        )
        .into()),
    }
}

fn divide(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Number(_), Value::Number(r)) if r == 0.0 => {
            Err(RuntimeError::new(operator, RuntimeErrorKind::DivisionByZero).into())
        }
        (left, right) => compute_if_numbers(operator, left, right, |l, r| l / r),
    }
}

impl<'a, W: Write> Visitor<Expression<'a>, Result<Value>> for Interpreter<W> {
    fn visit(&mut self, n: &Expression<'a>) -> Result<Value> {
        match n {
            Expression::Literal(x) => Ok(Value::from(x)),
            Expression::Grouping(x) => self.evaluate(x),
            Expression::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::Minus => Ok(Value::Number(-numeric_operand(operator, right)?)),
                    TokenType::Bang => Ok(Value::Boolean(!right.is_truthy())),
                    _ => unreachable!("parser only builds unary '-' and '!'"),
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::Comma => Ok(right),
                    TokenType::Minus => compute_if_numbers(operator, left, right, |l, r| l - r),
                    TokenType::Plus => add(operator, left, right),
                    TokenType::Slash => divide(operator, left, right),
                    TokenType::Star => compute_if_numbers(operator, left, right, |l, r| l * r),
                    TokenType::Greater => compute_if_numbers(operator, left, right, |l, r| l > r),
                    TokenType::GreaterEqual => {
                        compute_if_numbers(operator, left, right, |l, r| l >= r)
                    }
                    TokenType::Less => compute_if_numbers(operator, left, right, |l, r| l < r),
                    TokenType::LessEqual => {
                        compute_if_numbers(operator, left, right, |l, r| l <= r)
                    }
                    TokenType::EqualEqual => Ok(Value::Boolean(left.equals(&right))),
                    TokenType::BangEqual => Ok(Value::Boolean(!left.equals(&right))),
                    _ => unreachable!("parser only builds binary operators it knows"),
                }
            }
            Expression::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match operator.tokentype {
                    TokenType::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            Expression::Variable(name) => Ok(self.environment.get(name)?),
            Expression::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment.assign(name, value.clone())?;
                Ok(value)
            }
        }
    }
}

impl<'a, W: Write> Visitor<Statement<'a>, Result<()>> for Interpreter<W> {
    fn visit(&mut self, n: &Statement<'a>) -> Result<()> {
        match n {
            Statement::Print(e) => {
                let value = self.evaluate(e)?;
                writeln!(self.writer, "{}", value)?;
            }
            Statement::Expression(e) => {
                self.evaluate(e)?;
            }
            Statement::Var { name, initializer } => match initializer {
                Some(e) => {
                    let value = self.evaluate(e)?;
                    self.environment.define(name.lexeme, value);
                }
                None => self.environment.declare(name.lexeme),
            },
            Statement::Block(statements) => self.execute_block(statements)?,
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }
            }
            Statement::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod interpreter_tests {
    use super::*;
    use crate::parser;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (String, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = scanner::scan_tokens(source, &mut diagnostics);
        let statements = parser::parse(&tokens, &mut diagnostics);
        assert!(!diagnostics.had_error(), "{:?}", diagnostics);
        let mut interpreter = Interpreter::new(Vec::new());
        interpreter.interpret(&statements, &mut diagnostics).unwrap();
        let output = String::from_utf8(interpreter.into_writer()).unwrap();
        (output, diagnostics)
    }

    fn runtime_errors(diagnostics: &Diagnostics) -> Vec<RuntimeErrorKind> {
        diagnostics
            .iter()
            .filter_map(|e| match e {
                Error::Runtime(e) => Some(e.kind.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn arithmetic_and_precedence() {
        let (output, _) = run("print 1 + 2 * 3; print (1 + 2) * 3; print -4 / 2; print 7 - 2 - 1;");
        assert_eq!(output, "7\n9\n-2\n4\n");
    }

    #[test]
    fn comparisons_and_equality() {
        let (output, _) = run(
            "print 1 < 2; print 2 <= 1; print 3 > 3; print 3 >= 3;\
             print nil == nil; print 1 == \"1\"; print \"a\" != \"b\";",
        );
        assert_eq!(output, "true\nfalse\nfalse\ntrue\ntrue\nfalse\ntrue\n");
    }

    #[test]
    fn plus_concatenates_with_display_text() {
        let (output, _) = run("print \"x=\" + 1; print 2.5 + \"!\"; print \"a\" + \"b\"; print \"t\" + true;");
        assert_eq!(output, "x=1\n2.5!\nab\nttrue\n");
    }

    #[test]
    fn plus_rejects_non_numbers_without_strings() {
        let (output, diagnostics) = run("print true + 1;");
        assert_eq!(output, "");
        assert_eq!(
            runtime_errors(&diagnostics),
            vec![RuntimeErrorKind::OperandsMustBeNumbersOrStrings]
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let (output, diagnostics) = run("print 1 / 0; print 0 / 1;");
        assert_eq!(output, "0\n");
        assert_eq!(runtime_errors(&diagnostics), vec![RuntimeErrorKind::DivisionByZero]);
        assert_eq!(diagnostics.iter().next().unwrap().to_string(), "Division by zero.\n[line 1]");
    }

    #[test]
    fn operand_type_errors() {
        let (_, diagnostics) = run("print -\"a\"; print 1 < \"b\"; print nil * 2;");
        assert_eq!(
            runtime_errors(&diagnostics),
            vec![
                RuntimeErrorKind::OperandMustBeNumber,
                RuntimeErrorKind::OperandsMustBeNumbers,
                RuntimeErrorKind::OperandsMustBeNumbers,
            ]
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        let (output, diagnostics) = run(
            "print false and (1/0); print true or (1/0); print nil or \"dflt\"; print 1 and 2;",
        );
        assert!(diagnostics.is_empty());
        assert_eq!(output, "false\ntrue\ndflt\n2\n");
    }

    #[test]
    fn ternary_evaluates_one_branch() {
        let (output, diagnostics) = run("print true ? 1 : 2; print false ? 1 : 2; print nil ? 1/0 : 3;");
        assert!(diagnostics.is_empty());
        assert_eq!(output, "1\n2\n3\n");
    }

    #[test]
    fn comma_yields_rightmost() {
        let (output, _) = run("print (1, 2 + 3); var a = (nil, \"last\"); print a;");
        assert_eq!(output, "5\nlast\n");
    }

    #[test]
    fn blocks_shadow_and_restore() {
        let (output, _) = run("var a = 1; { var a = 2; print a; } print a;");
        assert_eq!(output, "2\n1\n");
    }

    #[test]
    fn error_inside_block_restores_scope() {
        let (output, diagnostics) = run("var a = 1; { var a = 2; print 1/0; } print a;");
        assert_eq!(output, "1\n");
        assert_eq!(runtime_errors(&diagnostics), vec![RuntimeErrorKind::DivisionByZero]);
    }

    #[test]
    fn runtime_error_abandons_only_its_statement() {
        let (output, diagnostics) = run("print b; print 1;");
        assert_eq!(output, "1\n");
        assert_eq!(
            runtime_errors(&diagnostics),
            vec![RuntimeErrorKind::UndefinedVariable("b".to_string())]
        );
        assert_eq!(diagnostics.exit_status(), crate::error::ExitStatus::Software);
    }

    #[test]
    fn uninitialized_differs_from_nil() {
        let (output, diagnostics) = run("var x; print x; var y = nil; print y; x = 3; print x;");
        assert_eq!(output, "nil\n3\n");
        assert_eq!(
            runtime_errors(&diagnostics),
            vec![RuntimeErrorKind::UninitializedVariable("x".to_string())]
        );
    }

    #[test]
    fn loops() {
        let (for_output, _) = run("for (var i = 0; i < 3; i = i + 1) print i;");
        let (while_output, _) = run("var i = 0; while (i < 3) { print i; i = i + 1; }");
        assert_eq!(for_output, "0\n1\n2\n");
        assert_eq!(for_output, while_output);
    }

    #[test]
    fn if_else() {
        let (output, _) = run("if (1 > 2) print \"a\"; else print \"b\"; if (0) print \"zero\";");
        assert_eq!(output, "b\nzero\n");
    }

    #[test]
    fn globals_persist_between_runs() {
        let mut interpreter = Interpreter::new(Vec::<u8>::new());
        for source in &["var a = 1;", "a = a + 1;", "print a;"] {
            let mut diagnostics = Diagnostics::new();
            let tokens = scanner::scan_tokens(source, &mut diagnostics);
            let statements = parser::parse(&tokens, &mut diagnostics);
            interpreter.interpret(&statements, &mut diagnostics).unwrap();
            assert!(diagnostics.is_empty());
        }
        assert_eq!(interpreter.writer(), b"2\n");
    }
}
