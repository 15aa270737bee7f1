//! Parser error types.

use serde::Serialize;

use crate::lexer::{Span, TokenKind};

/// A syntax error with enough context to point at the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message} at line {}, column {}\n  | {line_text}", .span.line, .span.column)]
pub struct SyntaxError {
    /// The error message.
    pub message: String,
    /// The location of the error.
    pub span: Span,
    /// The full source line containing the error.
    pub line_text: String,
    /// Expected construct (if applicable).
    pub expected: Option<String>,
    /// Description of the token actually found.
    pub found: Option<String>,
}

impl SyntaxError {
    /// Creates a new syntax error, capturing the source line of `span`.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span, source: &str) -> Self {
        Self {
            message: message.into(),
            span,
            line_text: span.line_text(source).to_string(),
            expected: None,
            found: None,
        }
    }

    /// Creates an "unexpected token" error.
    #[must_use]
    pub fn unexpected(
        expected: impl Into<String>,
        found: &TokenKind,
        span: Span,
        source: &str,
    ) -> Self {
        let expected: String = expected.into();
        let found = found.describe();
        Self {
            message: format!("expected {expected}, found {found}"),
            span,
            line_text: span.line_text(source).to_string(),
            expected: Some(expected),
            found: Some(found),
        }
    }

    /// 1-based line of the error.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.span.line
    }
}
