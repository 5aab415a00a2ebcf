use crate::token::Token;
use num_enum::IntoPrimitive;
use std::io;
use std::result;
use std::slice;
use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("failed to write program output: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanErrorKind {
    #[error("Unexpected character '{0}'.")]
    UnexpectedCharacter(char),
    #[error("Unterminated string.")]
    UnterminatedString,
    #[error("Unterminated block comment.")]
    UnterminatedComment,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] Error: {kind}")]
pub struct ScanError {
    pub line: usize,
    pub kind: ScanErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub location: String,
    pub message: String,
}

impl ParseError {
    pub fn at(token: &Token, message: &str) -> ParseError {
        let location = if token.is_eof() {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        ParseError {
            line: token.line,
            location,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Uninitialized variable '{0}'.")]
    UninitializedVariable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}\n[line {line}]")]
pub struct RuntimeError {
    pub line: usize,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub fn new(token: &Token, kind: RuntimeErrorKind) -> RuntimeError {
        RuntimeError {
            line: token.line,
            kind,
        }
    }
}

/// Process exit codes for batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(i32)]
pub enum ExitStatus {
    Success = 0,
    Usage = 64,
    DataError = 65,
    Software = 70,
    IoError = 74,
}

/// Errors reported by one pass through the pipeline, in report order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics { errors: Vec::new() }
    }

    pub fn report<E: Into<Error>>(&mut self, error: E) {
        let error = error.into();
        tracing::debug!(%error, "diagnostic reported");
        self.errors.push(error);
    }

    /// True if a lexical or syntax error was reported.
    pub fn had_error(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, Error::Scan(_) | Error::Parse(_)))
    }

    pub fn had_runtime_error(&self) -> bool {
        self.errors.iter().any(|e| matches!(e, Error::Runtime(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.had_error() {
            ExitStatus::DataError
        } else if self.had_runtime_error() {
            ExitStatus::Software
        } else {
            ExitStatus::Success
        }
    }
}

impl<'d> IntoIterator for &'d Diagnostics {
    type Item = &'d Error;
    type IntoIter = slice::Iter<'d, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use crate::token::TokenType;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_follow_stage() {
        let scan = ScanError {
            line: 3,
            kind: ScanErrorKind::UnterminatedString,
        };
        assert_eq!(scan.to_string(), "[line 3] Error: Unterminated string.");

        let token = Token {
            tokentype: TokenType::Semicolon,
            lexeme: ";",
            line: 2,
        };
        let parse = ParseError::at(&token, "Expect expression.");
        assert_eq!(parse.to_string(), "[line 2] Error at ';': Expect expression.");

        let runtime = RuntimeError::new(&token, RuntimeErrorKind::DivisionByZero);
        assert_eq!(runtime.to_string(), "Division by zero.\n[line 2]");
    }

    #[test]
    fn parse_error_at_eof_says_at_end() {
        let eof = Token {
            tokentype: TokenType::EOF,
            lexeme: "",
            line: 7,
        };
        let e = ParseError::at(&eof, "Expect ';' after value.");
        assert_eq!(e.to_string(), "[line 7] Error at end: Expect ';' after value.");
    }

    #[test]
    fn exit_status_prefers_syntax_failures() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(diagnostics.exit_status(), ExitStatus::Success);

        diagnostics.report(RuntimeError {
            line: 1,
            kind: RuntimeErrorKind::DivisionByZero,
        });
        assert_eq!(diagnostics.exit_status(), ExitStatus::Software);

        diagnostics.report(ScanError {
            line: 1,
            kind: ScanErrorKind::UnexpectedCharacter('#'),
        });
        assert_eq!(diagnostics.exit_status(), ExitStatus::DataError);
        assert_eq!(i32::from(diagnostics.exit_status()), 65);
        assert_eq!(diagnostics.len(), 2);
    }
}
