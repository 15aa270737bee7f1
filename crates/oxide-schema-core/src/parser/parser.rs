//! Recursive descent parser for schema declarations.

use tracing::debug;

use crate::ast::{
    Argument, Attribute, ConfigBlock, Enum, Field, FieldType, Model, Property, Scalar, Schema,
    Value,
};
use crate::lexer::{Lexer, Span, Token, TokenKind};

use super::SyntaxError;

const BLOCK_KEYWORDS: [&str; 4] = ["model", "enum", "datasource", "generator"];

/// Parses declaration text. A non-empty error list means the schema is
/// incomplete and must not be used for generation.
#[must_use]
pub fn parse(source: &str) -> (Schema, Vec<SyntaxError>) {
    Parser::new(source).parse()
}

/// Error raised inside an argument list; reported against the attribute.
struct ArgumentError {
    detail: String,
    span: Span,
}

/// Schema declaration parser.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    /// Creates a parser over the given source.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Lexer::new(source).tokenize(),
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Parses the whole input.
    #[must_use]
    pub fn parse(mut self) -> (Schema, Vec<SyntaxError>) {
        let mut schema = Schema::default();

        while !self.is_eof() {
            let token = self.current().clone();
            match &token.kind {
                TokenKind::Identifier(keyword) => match keyword.as_str() {
                    "model" => {
                        if let Some(model) = self.parse_model() {
                            schema.models.push(model);
                        }
                    }
                    "enum" => {
                        if let Some(enum_def) = self.parse_enum() {
                            schema.enums.push(enum_def);
                        }
                    }
                    "datasource" => {
                        if let Some(block) = self.parse_config_block() {
                            schema.datasources.push(block);
                        }
                    }
                    "generator" => {
                        if let Some(block) = self.parse_config_block() {
                            schema.generators.push(block);
                        }
                    }
                    other => {
                        self.error(format!("unrecognized block type `{other}`"), token.span);
                        self.skip_unknown_block();
                    }
                },
                TokenKind::RightBrace => {
                    self.error("unbalanced braces: unexpected `}`", token.span);
                    self.advance();
                }
                TokenKind::Error(message) => {
                    self.error(message.clone(), token.span);
                    self.advance();
                }
                other => {
                    self.errors.push(SyntaxError::unexpected(
                        "a block declaration",
                        other,
                        token.span,
                        self.source,
                    ));
                    self.skip_line(token.span.line);
                }
            }
        }

        debug!(
            models = schema.models.len(),
            enums = schema.enums.len(),
            errors = self.errors.len(),
            "Parsed schema declaration"
        );
        (schema, self.errors)
    }

    // ----- token helpers -----

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn is_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(SyntaxError::new(message, span, self.source));
    }

    /// Skips the remaining tokens on `line`, stopping before a closing brace.
    fn skip_line(&mut self, line: usize) {
        while !self.is_eof()
            && self.current().span.line == line
            && !self.check(&TokenKind::RightBrace)
        {
            self.advance();
        }
    }

    /// True when the current token starts a new top-level block.
    fn at_block_start(&self) -> bool {
        let keyword = self.current();
        let name = self.peek_at(1);
        let brace = self.peek_at(2);
        keyword
            .as_identifier()
            .is_some_and(|k| BLOCK_KEYWORDS.contains(&k))
            && name.as_identifier().is_some()
            && brace.kind == TokenKind::LeftBrace
            && brace.span.line == keyword.span.line
    }

    /// Skips an unknown block: its header line and, if it opens one, the whole
    /// brace-delimited body.
    fn skip_unknown_block(&mut self) {
        let header = self.advance();
        while !self.is_eof()
            && self.current().span.line == header.span.line
            && !self.check(&TokenKind::LeftBrace)
        {
            self.advance();
        }
        if !self.check(&TokenKind::LeftBrace) {
            return;
        }
        let open = self.advance();
        let mut depth = 1usize;
        while depth > 0 {
            let kind = self.current().kind.clone();
            match kind {
                TokenKind::Eof => {
                    self.error(
                        format!(
                            "unbalanced braces: block opened at line {} is never closed",
                            open.span.line
                        ),
                        open.span,
                    );
                    return;
                }
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    /// Parses `keyword NAME {` and returns the name and the opening brace span.
    fn parse_block_header(&mut self, what: &str) -> Option<(String, Span, Span)> {
        let keyword = self.advance();
        let name_token = self.current().clone();
        let Some(name) = name_token.as_identifier().map(str::to_string) else {
            self.errors.push(SyntaxError::unexpected(
                format!("a {what} name"),
                &name_token.kind,
                name_token.span,
                self.source,
            ));
            self.pos -= 1;
            self.skip_unknown_block();
            return None;
        };
        self.advance();

        if !self.check(&TokenKind::LeftBrace) {
            let found = self.current().clone();
            self.errors.push(SyntaxError::unexpected(
                format!("`{{` to open {what} `{name}`"),
                &found.kind,
                found.span,
                self.source,
            ));
            self.skip_line(keyword.span.line);
            return None;
        }
        let open = self.advance();
        Some((name, keyword.span, open.span))
    }

    /// Handles the end of a block body. Returns true when the body is finished.
    fn close_block(&mut self, what: &str, name: &str, open: Span) -> bool {
        if self.check(&TokenKind::RightBrace) {
            self.advance();
            return true;
        }
        if self.is_eof() || self.at_block_start() {
            self.error(
                format!(
                    "unbalanced braces: {what} `{name}` opened at line {} is never closed",
                    open.line
                ),
                open,
            );
            return true;
        }
        false
    }

    // ----- blocks -----

    fn parse_model(&mut self) -> Option<Model> {
        let (name, start, open) = self.parse_block_header("model")?;
        let mut fields = Vec::new();
        let mut attributes = Vec::new();

        while !self.close_block("model", &name, open) {
            let token = self.current().clone();
            match &token.kind {
                TokenKind::AtAt => {
                    if let Some(attribute) = self.parse_attribute() {
                        attributes.push(attribute);
                    }
                }
                TokenKind::Identifier(_) => {
                    if let Some(field) = self.parse_field() {
                        fields.push(field);
                    }
                }
                TokenKind::Error(message) => {
                    self.error(message.clone(), token.span);
                    self.advance();
                }
                other => {
                    self.errors.push(SyntaxError::unexpected(
                        "a field or block attribute",
                        other,
                        token.span,
                        self.source,
                    ));
                    self.advance();
                    self.skip_line(token.span.line);
                }
            }
        }

        Some(Model {
            name,
            fields,
            attributes,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_enum(&mut self) -> Option<Enum> {
        let (name, start, open) = self.parse_block_header("enum")?;
        let mut values = Vec::new();
        let mut attributes = Vec::new();

        while !self.close_block("enum", &name, open) {
            let token = self.current().clone();
            match &token.kind {
                TokenKind::AtAt => {
                    if let Some(attribute) = self.parse_attribute() {
                        attributes.push(attribute);
                    }
                }
                TokenKind::Identifier(value) => {
                    values.push(value.clone());
                    self.advance();
                    // Value-level attributes (`@map`) carry no structural meaning.
                    while self.check(&TokenKind::At) {
                        self.parse_attribute();
                    }
                    self.expect_line_end(token.span.line);
                }
                TokenKind::Error(message) => {
                    self.error(message.clone(), token.span);
                    self.advance();
                }
                other => {
                    self.errors.push(SyntaxError::unexpected(
                        "an enum value",
                        other,
                        token.span,
                        self.source,
                    ));
                    self.advance();
                    self.skip_line(token.span.line);
                }
            }
        }

        Some(Enum {
            name,
            values,
            attributes,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_config_block(&mut self) -> Option<ConfigBlock> {
        let kind = self.current().as_identifier().unwrap_or("block").to_string();
        let (name, start, open) = self.parse_block_header(&kind)?;
        let mut properties = Vec::new();

        while !self.close_block(&kind, &name, open) {
            let token = self.current().clone();
            let Some(key) = token.as_identifier().map(str::to_string) else {
                self.errors.push(SyntaxError::unexpected(
                    "a property name",
                    &token.kind,
                    token.span,
                    self.source,
                ));
                self.advance();
                self.skip_line(token.span.line);
                continue;
            };
            self.advance();

            if !self.check(&TokenKind::Equals) {
                let found = self.current().clone();
                self.errors.push(SyntaxError::unexpected(
                    format!("`=` after property `{key}`"),
                    &found.kind,
                    found.span,
                    self.source,
                ));
                self.skip_line(token.span.line);
                continue;
            }
            self.advance();

            match self.parse_value(token.span.line) {
                Ok(value) => {
                    properties.push(Property {
                        key,
                        value,
                        span: token.span.merge(self.previous_span()),
                    });
                    self.expect_line_end(token.span.line);
                }
                Err(err) => {
                    self.error(
                        format!("invalid value for property `{key}`: {}", err.detail),
                        err.span,
                    );
                    self.skip_line(token.span.line);
                }
            }
        }

        Some(ConfigBlock {
            name,
            properties,
            span: start.merge(self.previous_span()),
        })
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    /// Reports stray tokens left on a line after a complete construct.
    fn expect_line_end(&mut self, line: usize) {
        let token = self.current().clone();
        if token.span.line == line
            && !matches!(token.kind, TokenKind::RightBrace | TokenKind::Eof)
        {
            self.errors.push(SyntaxError::unexpected(
                "end of line",
                &token.kind,
                token.span,
                self.source,
            ));
            self.skip_line(line);
        }
    }

    // ----- fields and attributes -----

    fn parse_field(&mut self) -> Option<Field> {
        let name_token = self.advance();
        let name = name_token.as_identifier().unwrap_or_default().to_string();
        let line = name_token.span.line;

        let type_token = self.current().clone();
        let type_name = match type_token.as_identifier() {
            Some(type_name) if type_token.span.line == line => type_name.to_string(),
            _ => {
                if type_token.span.line == line {
                    self.errors.push(SyntaxError::unexpected(
                        format!("a type for field `{name}`"),
                        &type_token.kind,
                        type_token.span,
                        self.source,
                    ));
                    self.skip_line(line);
                } else {
                    self.error(format!("field `{name}` is missing a type"), name_token.span);
                }
                return None;
            }
        };
        self.advance();

        let mut field_type = FieldType {
            name: type_name,
            is_list: false,
            is_optional: false,
            unsupported: None,
        };

        if field_type.name == "Unsupported" && self.check(&TokenKind::LeftParen) {
            self.advance();
            let inner = self.current().clone();
            if let TokenKind::String(text) = &inner.kind {
                field_type.unsupported = Some(text.clone());
                self.advance();
            }
            if self.check(&TokenKind::RightParen) {
                self.advance();
            } else {
                self.error(
                    "malformed `Unsupported(\"...\")` type: expected a string argument",
                    inner.span,
                );
                self.skip_line(line);
                return None;
            }
        }

        if self.check(&TokenKind::LeftBracket) && self.peek_at(1).kind == TokenKind::RightBracket
        {
            self.advance();
            self.advance();
            field_type.is_list = true;
        }
        if self.check(&TokenKind::Question) {
            self.advance();
            field_type.is_optional = true;
        }

        let mut attributes = Vec::new();
        while self.check(&TokenKind::At) {
            if let Some(attribute) = self.parse_attribute() {
                attributes.push(attribute);
            }
        }
        self.expect_line_end(line);

        Some(Field {
            name,
            field_type,
            attributes,
            span: name_token.span.merge(self.previous_span()),
        })
    }

    /// Parses `@name`, `@@name`, `@db.Type` with an optional argument list.
    fn parse_attribute(&mut self) -> Option<Attribute> {
        let marker = self.advance();
        let prefix = if marker.kind == TokenKind::AtAt { "@@" } else { "@" };

        let mut name = match self.current().as_identifier() {
            Some(name) => name.to_string(),
            None => {
                let found = self.current().clone();
                self.errors.push(SyntaxError::unexpected(
                    format!("an attribute name after `{prefix}`"),
                    &found.kind,
                    found.span,
                    self.source,
                ));
                self.skip_line(marker.span.line);
                return None;
            }
        };
        self.advance();
        while self.check(&TokenKind::Dot) && self.peek_at(1).as_identifier().is_some() {
            self.advance();
            let part = self.advance();
            name.push('.');
            name.push_str(part.as_identifier().unwrap_or_default());
        }

        let mut arguments = Vec::new();
        if self.check(&TokenKind::LeftParen) && self.current().span.line == marker.span.line {
            self.advance();
            match self.parse_arguments(marker.span.line) {
                Ok(args) => arguments = args,
                Err(err) => {
                    self.error(
                        format!(
                            "malformed argument list for attribute `{prefix}{name}`: {}",
                            err.detail
                        ),
                        err.span,
                    );
                    self.skip_line(marker.span.line);
                    return None;
                }
            }
        }

        Some(Attribute {
            name,
            arguments,
            span: marker.span.merge(self.previous_span()),
        })
    }

    /// Argument lists must close on the line they open on.
    fn ensure_same_line(&self, line: usize) -> Result<(), ArgumentError> {
        if self.current().span.line == line {
            return Ok(());
        }
        Err(ArgumentError {
            detail: "argument list is not closed before the end of the line".to_string(),
            span: self.previous_span(),
        })
    }

    /// Parses arguments after an opening `(` up to and including `)`.
    fn parse_arguments(&mut self, line: usize) -> Result<Vec<Argument>, ArgumentError> {
        let mut arguments = Vec::new();
        loop {
            self.ensure_same_line(line)?;
            if self.check(&TokenKind::RightParen) {
                self.advance();
                return Ok(arguments);
            }

            let name = if self.current().as_identifier().is_some()
                && self.peek_at(1).kind == TokenKind::Colon
            {
                let name = self.advance();
                self.advance();
                name.as_identifier().map(str::to_string)
            } else {
                None
            };
            let value = self.parse_value(line)?;
            arguments.push(Argument { name, value });

            let token = self.current().clone();
            match token.kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RightParen => {}
                ref other => {
                    return Err(ArgumentError {
                        detail: format!("expected `,` or `)`, found {}", other.describe()),
                        span: token.span,
                    });
                }
            }
        }
    }

    fn parse_value(&mut self, line: usize) -> Result<Value, ArgumentError> {
        self.ensure_same_line(line)?;
        let token = self.current().clone();
        match &token.kind {
            TokenKind::String(text) => {
                self.advance();
                Ok(Value::Scalar(Scalar::String(text.clone())))
            }
            TokenKind::Number(text) => {
                self.advance();
                Ok(Value::Scalar(Scalar::Number(text.clone())))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LeftParen) {
                    self.advance();
                    let args = self.parse_arguments(line)?;
                    return Ok(Value::FunctionCall {
                        name: name.clone(),
                        args,
                    });
                }
                Ok(Value::Scalar(match name.as_str() {
                    "true" => Scalar::Boolean(true),
                    "false" => Scalar::Boolean(false),
                    _ => Scalar::Identifier(name.clone()),
                }))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                loop {
                    self.ensure_same_line(line)?;
                    if self.check(&TokenKind::RightBracket) {
                        self.advance();
                        return Ok(Value::List(items));
                    }
                    items.push(self.parse_value(line)?);
                    let token = self.current().clone();
                    match token.kind {
                        TokenKind::Comma => {
                            self.advance();
                        }
                        TokenKind::RightBracket => {}
                        ref other => {
                            return Err(ArgumentError {
                                detail: format!("expected `,` or `]`, found {}", other.describe()),
                                span: token.span,
                            });
                        }
                    }
                }
            }
            other => Err(ArgumentError {
                detail: format!("expected a value, found {}", other.describe()),
                span: token.span,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Schema {
        let (schema, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        schema
    }

    #[test]
    fn test_parse_model_with_fields() {
        let schema = parse_ok(
            r"
            model User {
              id    Int     @id @default(autoincrement())
              email String  @unique
              name  String?
              posts Post[]
            }
            ",
        );
        let user = &schema.models[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.fields.len(), 4);
        assert_eq!(user.fields[0].attributes.len(), 2);
        assert!(user.fields[2].field_type.is_optional);
        assert!(user.fields[3].field_type.is_list);

        let default = user.fields[0].attribute("default").unwrap();
        assert_eq!(
            default.positional(),
            Some(&Value::FunctionCall {
                name: "autoincrement".to_string(),
                args: vec![],
            })
        );
    }

    #[test]
    fn test_parse_datasource_and_generator() {
        let schema = parse_ok(
            r#"
            datasource db {
              provider = "postgresql"
              url      = env("DATABASE_URL")
            }
            generator client {
              provider = "oxide-client"
            }
            "#,
        );
        assert_eq!(schema.datasource_provider(), Some("postgresql"));
        assert_eq!(schema.datasource_url(), None);
        assert_eq!(schema.generators[0].name, "client");
        let url = schema.datasources[0].property("url").unwrap();
        assert_eq!(url.as_function().map(|(name, _)| name), Some("env"));
    }

    #[test]
    fn test_parse_enum() {
        let schema = parse_ok("enum Role {\n  USER\n  ADMIN @map(\"admin\")\n  @@map(\"roles\")\n}");
        let role = &schema.enums[0];
        assert_eq!(role.values, vec!["USER", "ADMIN"]);
        assert_eq!(role.attributes[0].name, "map");
    }

    #[test]
    fn test_parse_named_and_nested_arguments() {
        let schema = parse_ok(
            r"
            model Post {
              id       Int  @id
              authorId Int
              author   User @relation(fields: [authorId], references: [id], onDelete: Cascade)
              @@index([authorId(sort: Desc), id])
            }
            ",
        );
        let post = &schema.models[0];
        let relation = post.field("author").unwrap().attribute("relation").unwrap();
        assert_eq!(relation.arguments.len(), 3);
        assert_eq!(
            relation.named("onDelete").and_then(Value::as_identifier),
            Some("Cascade")
        );

        let index = post.attribute("index").unwrap();
        let items = index.positional().and_then(Value::as_list).unwrap();
        assert!(matches!(&items[0], Value::FunctionCall { name, .. } if name == "authorId"));
    }

    #[test]
    fn test_parse_native_type_attribute() {
        let schema = parse_ok("model A {\n  id Int @id\n  code String @db.VarChar(32)\n}");
        let code = schema.models[0].field("code").unwrap();
        let native = code.attribute("db.VarChar").unwrap();
        assert_eq!(
            native.positional(),
            Some(&Value::Scalar(Scalar::Number("32".to_string())))
        );
    }

    #[test]
    fn test_parse_unsupported_type() {
        let schema = parse_ok("model A {\n  id Int @id\n  geo Unsupported(\"geometry\")?\n}");
        let geo = &schema.models[0].fields[1].field_type;
        assert_eq!(geo.unsupported.as_deref(), Some("geometry"));
        assert!(geo.is_optional);
    }

    #[test]
    fn test_collects_multiple_errors() {
        let (schema, errors) = parse(
            "model A {\n  id Int @default(\n  name\n}\nview V {\n  x Int\n}\nmodel B {\n  id Int @id\n}",
        );
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].message.contains("malformed argument list"));
        assert!(errors[1].message.contains("missing a type"));
        assert!(errors[2].message.contains("unrecognized block type `view`"));
        assert_eq!(schema.models.len(), 2);
        assert_eq!(schema.models[1].name, "B");
    }

    #[test]
    fn test_unclosed_block_recovers_at_next_block() {
        let (schema, errors) = parse("model A {\n  id Int @id\n\nmodel B {\n  id Int @id\n}");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("never closed"));
        assert_eq!(errors[0].line(), 1);
        assert_eq!(schema.models.len(), 2);
    }
}
