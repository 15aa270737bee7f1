//! # oxide-schema-core
//!
//! Declarative schema engine: parses `datasource` / `generator` / `model` /
//! `enum` declarations, turns them into a provider-agnostic schema model,
//! diffs two models and renders the difference as provider-specific DDL.
//!
//! This crate performs no I/O. Database access (introspection, migration
//! history, applying scripts) lives in `oxide-schema-migrate`.
//!
//! ## Example
//!
//! ```rust
//! use oxide_schema_core::{compare, generate, load_schema, ProviderKind, SchemaModel};
//!
//! let desired = load_schema(
//!     r#"
//!     model User {
//!       id    Int     @id @default(autoincrement())
//!       email String  @unique
//!       name  String?
//!       @@map("users")
//!     }
//!     "#,
//!     ProviderKind::Sqlite,
//! )
//! .unwrap();
//!
//! let provider = ProviderKind::Sqlite.provider();
//! let changes = compare(&desired, &SchemaModel::new(), provider).unwrap();
//! let sql = generate(&changes, provider).unwrap();
//! assert!(sql.starts_with("-- CreateTable\nCREATE TABLE \"users\""));
//! ```

pub mod ast;
pub mod diff;
pub mod error;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod provider;
pub mod sqlgen;
pub mod validate;

pub use diff::{
    compare, compare_with, ChangeSet, ColumnModification, DestructiveChange, DiffOptions,
    IndexChange, PrimaryKeyChange, TableAlteration,
};
pub use error::{DiffError, GenerateError, SchemaError};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use model::{
    build_schema_model, ColumnInfo, DefaultValue, ForeignKeyInfo, IndexColumn, IndexInfo,
    ReferentialAction, SchemaModel, SortOrder, TableInfo,
};
pub use parser::{parse, Parser, SyntaxError};
pub use provider::{ColumnChangeStrategy, Provider, ProviderKind, TypeFamily};
pub use sqlgen::{generate, generate_statements, split_statements, Statement, StatementKind};
pub use validate::{validate, ValidationError};

/// Parses, validates and builds the desired-state model of a declaration.
///
/// # Errors
///
/// Returns [`SchemaError::Syntax`] if the declaration does not parse and
/// [`SchemaError::Validation`] if it is semantically invalid.
pub fn load_schema(source: &str, provider: ProviderKind) -> Result<SchemaModel, SchemaError> {
    let (schema, errors) = parse(source);
    if !errors.is_empty() {
        return Err(SchemaError::Syntax(errors));
    }
    build_schema_model(&schema, provider.provider())
}
