//! Declaration lexer.
//!
//! A hand-written lexer that turns schema declaration text into tokens. Line
//! comments (`//` and `///`) are skipped; newlines are not significant as tokens
//! but every token records its line so the parser can detect line-bound constructs.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Token, TokenKind};
pub use tokenizer::Lexer;
