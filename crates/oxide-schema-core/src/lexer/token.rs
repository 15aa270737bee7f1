//! Token definitions for the schema declaration language.

use super::Span;

/// The kind of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: keywords, type names, attribute names.
    Identifier(String),
    /// Double-quoted string with escapes resolved.
    String(String),
    /// Numeric literal, kept as written.
    Number(String),
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `=`
    Equals,
    /// `?`
    Question,
    /// `.`
    Dot,
    /// `@`
    At,
    /// `@@`
    AtAt,
    /// A character or construct the lexer could not make sense of.
    Error(String),
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Short human description used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Identifier(name) => format!("`{name}`"),
            Self::String(value) => format!("string \"{value}\""),
            Self::Number(value) => format!("number {value}"),
            Self::LeftBrace => "`{`".to_string(),
            Self::RightBrace => "`}`".to_string(),
            Self::LeftParen => "`(`".to_string(),
            Self::RightParen => "`)`".to_string(),
            Self::LeftBracket => "`[`".to_string(),
            Self::RightBracket => "`]`".to_string(),
            Self::Comma => "`,`".to_string(),
            Self::Colon => "`:`".to_string(),
            Self::Equals => "`=`".to_string(),
            Self::Question => "`?`".to_string(),
            Self::Dot => "`.`".to_string(),
            Self::At => "`@`".to_string(),
            Self::AtAt => "`@@`".to_string(),
            Self::Error(message) => message.clone(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The location in the source.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns the identifier text if this token is an identifier.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if the token is the given identifier.
    #[must_use]
    pub fn is_identifier(&self, expected: &str) -> bool {
        self.as_identifier() == Some(expected)
    }
}
