//! Error types for schema loading, diffing and SQL generation.

use crate::parser::SyntaxError;
use crate::provider::ProviderKind;
use crate::validate::ValidationError;

/// A declaration that could not be turned into a canonical model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// The declaration has syntax errors.
    #[error("{} syntax error(s):\n{}", .0.len(), join_lines(.0))]
    Syntax(Vec<SyntaxError>),

    /// The declaration parsed but is semantically invalid.
    #[error("{} validation error(s):\n{}", .0.len(), join_lines(.0))]
    Validation(Vec<ValidationError>),
}

/// Errors raised while comparing two schemas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// Two tables in one schema collapse to the same name after provider
    /// identifier normalisation.
    #[error("tables `{first}` and `{second}` have the same name on {provider}")]
    AmbiguousTableName {
        provider: ProviderKind,
        first: String,
        second: String,
    },

    /// Two columns in one table collapse to the same name.
    #[error("columns `{first}` and `{second}` of table `{table}` have the same name on {provider}")]
    AmbiguousColumnName {
        provider: ProviderKind,
        table: String,
        first: String,
        second: String,
    },
}

/// Errors raised while rendering a change-set to SQL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// The provider has no in-place form for this change.
    #[error("{provider} does not support {operation} on table `{table}`")]
    Unsupported {
        provider: ProviderKind,
        operation: String,
        table: String,
    },
}

fn join_lines<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
