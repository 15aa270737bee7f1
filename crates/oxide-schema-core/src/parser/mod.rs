//! Declaration parser.
//!
//! Recursive descent over the token stream. Errors are collected rather than
//! returned early: each block, field and attribute recovers at the next line so a
//! single pass reports as many problems as possible.

mod error;
#[allow(clippy::module_inception)]
mod parser;

pub use error::SyntaxError;
pub use parser::{parse, Parser};
