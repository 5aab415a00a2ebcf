pub mod ast;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod lox;
pub mod parser;
pub mod printer;
pub mod scanner;
pub mod token;
pub mod value;

pub use error::{Diagnostics, Error, ExitStatus};
pub use lox::{Dump, Lox};
