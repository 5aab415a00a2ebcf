use crate::error::Diagnostics;
use crate::interpreter::Interpreter;
use crate::printer;
use crate::{parser, scanner};
use std::io::{self, Write};
use strum_macros::{Display, EnumString};

/// Intermediate form to write out before a source is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Dump {
    #[strum(serialize = "tokens")]
    Tokens,
    #[strum(serialize = "ast")]
    Ast,
    #[strum(serialize = "rpn")]
    Rpn,
}

/// One interpreter session. Every call to `run` shares the same globals, so a
/// REPL can feed it one line at a time.
pub struct Lox<W> {
    interpreter: Interpreter<W>,
    dump: Option<Dump>,
}

impl<W: Write> Lox<W> {
    pub fn new(out: W) -> Lox<W> {
        Lox {
            interpreter: Interpreter::new(out),
            dump: None,
        }
    }
    pub fn with_dump(mut self, dump: Option<Dump>) -> Lox<W> {
        self.dump = dump;
        self
    }
    pub fn output(&self) -> &W {
        self.interpreter.writer()
    }
    pub fn into_output(self) -> W {
        self.interpreter.into_writer()
    }
    /// Runs one line of interactive input. The line ending is dropped so a
    /// diagnostic at the end of the line reports that line. Returns `None`
    /// when the line asks to end the session.
    pub fn run_line(&mut self, line: &str) -> io::Result<Option<Diagnostics>> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if let "exit" | "quit" | ":q" = line.trim() {
            return Ok(None);
        }
        self.run(line).map(Some)
    }
    /// Scans, parses and, if neither stage reported an error, executes
    /// `source`. The returned diagnostics hold every error found on the way.
    pub fn run(&mut self, source: &str) -> io::Result<Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let tokens = scanner::scan_tokens(source, &mut diagnostics);
        if self.dump == Some(Dump::Tokens) {
            let out = self.interpreter.writer_mut();
            for token in &tokens {
                writeln!(out, "{} {} {}", token.line, token.tokentype, token.lexeme)?;
            }
        }

        let statements = parser::parse(&tokens, &mut diagnostics);
        if diagnostics.had_error() {
            tracing::debug!(errors = diagnostics.len(), "skipping execution");
            return Ok(diagnostics);
        }

        match self.dump {
            Some(Dump::Ast) => {
                let out = self.interpreter.writer_mut();
                for statement in &statements {
                    writeln!(out, "{}", printer::parenthesize(statement))?;
                }
            }
            Some(Dump::Rpn) => {
                let out = self.interpreter.writer_mut();
                for statement in &statements {
                    writeln!(out, "{}", printer::rpn(statement))?;
                }
            }
            _ => {}
        }

        self.interpreter.interpret(&statements, &mut diagnostics)?;
        Ok(diagnostics)
    }
}
