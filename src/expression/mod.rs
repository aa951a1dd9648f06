//! The embedded expression language: parsing, IO inference and evaluation.
//!
//! The analyzer and the engine share one parser, so the variables an
//! expression node declares are exactly the ones its program reads and writes.

mod engine;
mod io;
mod lexer;
mod parser;

pub use engine::{Scope, run};
pub use io::{ExpressionIO, analyze};
pub use parser::parse;
