//! Debug renderings of the syntax tree: Lisp-style prefix and postfix (RPN).

use crate::ast::{Expression, Statement, Visitor};
use crate::token::Literal;
use crate::value::Value;

/// Renders a node in parenthesized prefix form, e.g. `(* (- 123) (group 45.67))`.
pub fn parenthesize<T>(node: &T) -> String
where
    AstPrinter: Visitor<T, String>,
{
    AstPrinter {}.visit(node)
}

/// Renders a node in postfix form, e.g. `1 2 + 4 3 - *`.
pub fn rpn<T>(node: &T) -> String
where
    RpnPrinter: Visitor<T, String>,
{
    RpnPrinter {}.visit(node)
}

fn literal_text(literal: &Literal) -> String {
    Value::from(literal).to_string()
}

pub struct AstPrinter {}

impl AstPrinter {
    fn parenthesize(&mut self, name: &str, args: Vec<&Expression>) -> String {
        let mut x = String::from("(");
        x.push_str(name);
        for arg in args {
            x.push(' ');
            x.push_str(self.visit(arg).as_str());
        }
        x.push(')');
        x
    }
}

impl<'a> Visitor<Expression<'a>, String> for AstPrinter {
    fn visit(&mut self, n: &Expression<'a>) -> String {
        match n {
            Expression::Binary {
                left,
                operator,
                right,
            }
            | Expression::Logical {
                left,
                operator,
                right,
            } => self.parenthesize(operator.lexeme, vec![left.as_ref(), right.as_ref()]),
            Expression::Grouping(x) => self.parenthesize("group", vec![x.as_ref()]),
            Expression::Literal(x) => literal_text(x),
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => self.parenthesize(
                "?:",
                vec![condition.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
            ),
            Expression::Unary { operator, right } => {
                self.parenthesize(operator.lexeme, vec![right.as_ref()])
            }
            Expression::Variable(x) => x.lexeme.to_string(),
            Expression::Assign { name, value } => {
                format!("(= {} {})", name.lexeme, self.visit(value.as_ref()))
            }
        }
    }
}

impl<'a> Visitor<Statement<'a>, String> for AstPrinter {
    fn visit(&mut self, n: &Statement<'a>) -> String {
        match n {
            Statement::Print(e) => self.parenthesize("print", vec![e]),
            Statement::Expression(e) => self.parenthesize(";", vec![e]),
            Statement::Var { name, initializer } => match initializer {
                Some(e) => format!("(var {} {})", name.lexeme, self.visit(e)),
                None => format!("(var {})", name.lexeme),
            },
            Statement::Block(statements) => {
                let mut x = String::from("(block");
                for statement in statements {
                    x.push(' ');
                    x.push_str(self.visit(statement).as_str());
                }
                x.push(')');
                x
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut x = format!(
                    "(if {} {}",
                    self.visit(condition),
                    self.visit(then_branch.as_ref())
                );
                if let Some(else_branch) = else_branch {
                    x.push(' ');
                    x.push_str(self.visit(else_branch.as_ref()).as_str());
                }
                x.push(')');
                x
            }
            Statement::While { condition, body } => format!(
                "(while {} {})",
                self.visit(condition),
                self.visit(body.as_ref())
            ),
        }
    }
}

pub struct RpnPrinter {}

impl RpnPrinter {
    fn postfix(&mut self, operands: Vec<&Expression>, operator: &str) -> String {
        let mut parts: Vec<String> = operands.into_iter().map(|e| self.visit(e)).collect();
        parts.push(operator.to_string());
        parts.join(" ")
    }
}

impl<'a> Visitor<Expression<'a>, String> for RpnPrinter {
    fn visit(&mut self, n: &Expression<'a>) -> String {
        match n {
            Expression::Binary {
                left,
                operator,
                right,
            }
            | Expression::Logical {
                left,
                operator,
                right,
            } => self.postfix(vec![left.as_ref(), right.as_ref()], operator.lexeme),
            // Operator position already encodes the grouping.
            Expression::Grouping(x) => self.visit(x.as_ref()),
            Expression::Literal(x) => literal_text(x),
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => self.postfix(
                vec![condition.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
                "?:",
            ),
            Expression::Unary { operator, right } => {
                self.postfix(vec![right.as_ref()], operator.lexeme)
            }
            Expression::Variable(x) => x.lexeme.to_string(),
            Expression::Assign { name, value } => {
                format!("{} {} =", self.visit(value.as_ref()), name.lexeme)
            }
        }
    }
}

impl<'a> Visitor<Statement<'a>, String> for RpnPrinter {
    fn visit(&mut self, n: &Statement<'a>) -> String {
        match n {
            Statement::Print(e) => self.postfix(vec![e], "print"),
            Statement::Expression(e) => self.postfix(vec![e], ";"),
            Statement::Var { name, initializer } => match initializer {
                Some(e) => format!("{} {} var", self.visit(e), name.lexeme),
                None => format!("{} var", name.lexeme),
            },
            Statement::Block(statements) => {
                let mut parts = vec!["{".to_string()];
                parts.extend(statements.iter().map(|s| self.visit(s)));
                parts.push("}".to_string());
                parts.join(" ")
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "{} {} {} if-else",
                    self.visit(condition),
                    self.visit(then_branch.as_ref()),
                    self.visit(else_branch.as_ref())
                ),
                None => format!(
                    "{} {} if",
                    self.visit(condition),
                    self.visit(then_branch.as_ref())
                ),
            },
            Statement::While { condition, body } => format!(
                "{} {} while",
                self.visit(condition),
                self.visit(body.as_ref())
            ),
        }
    }
}
