//! Declaration tokenizer implementation.

use super::{Span, Token, TokenKind};

/// A lexer that tokenizes schema declaration input.
pub struct Lexer<'a> {
    /// The input source text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// Current 1-based line.
    line: usize,
    /// Current 1-based column.
    column: usize,
    /// Byte position of the start of the current token.
    start: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            start: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skips whitespace and `//` comments (which also covers `///` doc comments).
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.peek() == Some('/') && self.peek_next() == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            break;
        }
    }

    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos, self.start_line, self.start_column)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Identifier(text.to_string()))
    }

    fn scan_number(&mut self) -> Token {
        if self.peek() == Some('-') {
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Number(text.to_string()))
    }

    /// Scans a double-quoted string. Strings may not span lines.
    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return self.make_token(TokenKind::String(value));
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(other) => value.push(other),
                        None => break,
                    }
                }
                Some('\n') | None => break,
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        self.make_token(TokenKind::Error("unterminated string literal".to_string()))
    }

    /// Returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(),
            '-' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
            '@' => {
                self.advance();
                if self.peek() == Some('@') {
                    self.advance();
                    self.make_token(TokenKind::AtAt)
                } else {
                    self.make_token(TokenKind::At)
                }
            }
            _ => {
                self.advance();
                let kind = match c {
                    '{' => TokenKind::LeftBrace,
                    '}' => TokenKind::RightBrace,
                    '(' => TokenKind::LeftParen,
                    ')' => TokenKind::RightParen,
                    '[' => TokenKind::LeftBracket,
                    ']' => TokenKind::RightBracket,
                    ',' => TokenKind::Comma,
                    ':' => TokenKind::Colon,
                    '=' => TokenKind::Equals,
                    '?' => TokenKind::Question,
                    '.' => TokenKind::Dot,
                    other => TokenKind::Error(format!("unexpected character `{other}`")),
                };
                self.make_token(kind)
            }
        }
    }

    /// Tokenizes the entire input, ending with an `Eof` token.
    #[must_use]
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.to_string())
    }

    #[test]
    fn test_field_line() {
        assert_eq!(
            kinds("email String? @unique"),
            vec![
                ident("email"),
                ident("String"),
                TokenKind::Question,
                TokenKind::At,
                ident("unique"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_block_attribute_and_list() {
        assert_eq!(
            kinds("@@index([a, b])"),
            vec![
                TokenKind::AtAt,
                ident("index"),
                TokenKind::LeftParen,
                TokenKind::LeftBracket,
                ident("a"),
                TokenKind::Comma,
                ident("b"),
                TokenKind::RightBracket,
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let input = "/// docs\nmodel // trailing\n{ }";
        assert_eq!(
            kinds(input),
            vec![
                ident("model"),
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_numbers() {
        assert_eq!(
            kinds(r#"url = "file:./dev.db" 42 -1 3.25"#),
            vec![
                ident("url"),
                TokenKind::Equals,
                TokenKind::String("file:./dev.db".to_string()),
                TokenKind::Number("42".to_string()),
                TokenKind::Number("-1".to_string()),
                TokenKind::Number("3.25".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"""#)[0],
            TokenKind::String("say \"hi\"".to_string())
        );
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = kinds("\"open\nmodel");
        assert!(matches!(tokens[0], TokenKind::Error(_)));
        assert_eq!(tokens[1], ident("model"));
    }

    #[test]
    fn test_dotted_attribute_name() {
        assert_eq!(
            kinds("@db.VarChar(255)"),
            vec![
                TokenKind::At,
                ident("db"),
                TokenKind::Dot,
                ident("VarChar"),
                TokenKind::LeftParen,
                TokenKind::Number("255".to_string()),
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_and_column_tracking() {
        let tokens = Lexer::new("model User {\n  id Int\n}").tokenize();
        let id = &tokens[3];
        assert!(id.is_identifier("id"));
        assert_eq!(id.span.line, 2);
        assert_eq!(id.span.column, 3);
        let close = &tokens[5];
        assert_eq!(close.kind, TokenKind::RightBrace);
        assert_eq!(close.span.line, 3);
        assert_eq!(close.span.column, 1);
    }

    #[test]
    fn test_unexpected_character() {
        let tokens = kinds("model ; User");
        assert_eq!(
            tokens[1],
            TokenKind::Error("unexpected character `;`".to_string())
        );
    }
}
