//! Semantic validation of a parsed declaration.
//!
//! The parser accepts any identifier as a type; this pass resolves type
//! references, checks relation arguments and block attributes, and rejects
//! constructs the selected provider cannot represent. Errors are always
//! reported, never corrected.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::ast::{Attribute, Field, Model, Schema, Value};
use crate::lexer::Span;
use crate::provider::ProviderKind;

const FIELD_ATTRIBUTES: [&str; 7] = [
    "id",
    "unique",
    "default",
    "relation",
    "map",
    "updatedAt",
    "ignore",
];

const DEFAULT_FUNCTIONS: [&str; 9] = [
    "autoincrement",
    "sequence",
    "now",
    "dbgenerated",
    "uuid",
    "cuid",
    "nanoid",
    "ulid",
    "env",
];

const REFERENTIAL_ACTIONS: [&str; 5] = ["Cascade", "Restrict", "NoAction", "SetNull", "SetDefault"];

const BLOCK_ATTRIBUTES: [&str; 6] = ["id", "unique", "index", "map", "ignore", "schema"];

/// A semantic error in an otherwise well-formed declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message} (line {})", .span.line)]
pub struct ValidationError {
    pub message: String,
    pub span: Span,
}

impl ValidationError {
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Validates `schema` for `provider`.
#[must_use]
pub fn validate(schema: &Schema, provider: ProviderKind) -> Vec<ValidationError> {
    let mut validator = Validator {
        schema,
        provider,
        errors: Vec::new(),
    };
    validator.check_datasources();
    validator.check_names();
    for model in &schema.models {
        validator.check_model(model);
    }
    for enum_def in &schema.enums {
        if enum_def.values.is_empty() {
            validator.error(
                format!("enum `{}` must have at least one value", enum_def.name),
                enum_def.span,
            );
        }
        let mut seen = HashSet::new();
        for value in &enum_def.values {
            if !seen.insert(value) {
                validator.error(
                    format!("enum `{}` declares value `{value}` twice", enum_def.name),
                    enum_def.span,
                );
            }
        }
    }
    validator.errors
}

struct Validator<'a> {
    schema: &'a Schema,
    provider: ProviderKind,
    errors: Vec<ValidationError>,
}

impl Validator<'_> {
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ValidationError::new(message, span));
    }

    fn check_datasources(&mut self) {
        let schema = self.schema;
        if let Some(extra) = schema.datasources.get(1) {
            self.error("only one datasource block is allowed", extra.span);
        }
        if let Some(datasource) = schema.datasources.first() {
            match datasource.property("provider") {
                None => self.error(
                    format!("datasource `{}` is missing `provider`", datasource.name),
                    datasource.span,
                ),
                Some(value) => match value.as_str() {
                    Some(name) if ProviderKind::from_name(name).is_some() => {}
                    Some(name) => self.error(format!("unknown provider `{name}`"), datasource.span),
                    None => self.error(
                        "datasource `provider` must be a string literal",
                        datasource.span,
                    ),
                },
            }
        }
    }

    fn check_names(&mut self) {
        let schema = self.schema;
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for model in &schema.models {
            if seen.insert(&model.name, "model").is_some() {
                self.error(format!("`{}` is declared more than once", model.name), model.span);
            }
        }
        for enum_def in &schema.enums {
            if seen.insert(&enum_def.name, "enum").is_some() {
                self.error(
                    format!("`{}` is declared more than once", enum_def.name),
                    enum_def.span,
                );
            }
        }
    }

    fn check_model(&mut self, model: &Model) {
        let mut seen = HashSet::new();
        for field in &model.fields {
            if !seen.insert(field.name.as_str()) {
                self.error(
                    format!("field `{}` is declared twice in model `{}`", field.name, model.name),
                    field.span,
                );
            }
            self.check_field(model, field);
        }

        for attribute in &model.attributes {
            if !BLOCK_ATTRIBUTES.contains(&attribute.name.as_str()) {
                self.error(format!("unknown block attribute `@@{}`", attribute.name), attribute.span);
                continue;
            }
            if matches!(attribute.name.as_str(), "id" | "unique" | "index") {
                self.check_field_list(model, attribute);
            }
        }

        let has_identifier = model.attribute("id").is_some()
            || model.attribute("unique").is_some()
            || model.fields.iter().any(|f| {
                (f.has_attribute("id") || f.has_attribute("unique")) && !f.has_attribute("ignore")
            });
        if !has_identifier && model.attribute("ignore").is_none() {
            self.error(
                format!(
                    "model `{}` needs a unique identifier (`@id`, `@@id`, `@unique` or `@@unique`)",
                    model.name
                ),
                model.span,
            );
        }
    }

    fn check_field(&mut self, model: &Model, field: &Field) {
        let schema = self.schema;
        let ty = &field.field_type;
        let is_model = schema.model(&ty.name).is_some();
        let known = ty.scalar().is_some()
            || is_model
            || schema.enum_def(&ty.name).is_some()
            || ty.is_unsupported();

        if !known {
            self.error(
                format!(
                    "type `{}` of field `{}.{}` is neither a built-in scalar nor a declared model or enum",
                    ty.name, model.name, field.name
                ),
                field.span,
            );
        }
        if ty.is_list && ty.is_optional {
            self.error(
                format!("field `{}.{}`: optional lists are not supported", model.name, field.name),
                field.span,
            );
        }
        if ty.is_list && !is_model && self.provider != ProviderKind::Postgres {
            self.error(
                format!(
                    "field `{}.{}`: scalar lists are not supported on {}",
                    model.name, field.name, self.provider
                ),
                field.span,
            );
        }

        for attribute in &field.attributes {
            let native = attribute.name.starts_with("db.");
            if !native && !FIELD_ATTRIBUTES.contains(&attribute.name.as_str()) {
                self.error(format!("unknown field attribute `@{}`", attribute.name), attribute.span);
            }
            if attribute.name == "default" && attribute.positional().is_none() {
                self.error(
                    format!("`@default` on `{}.{}` needs a value", model.name, field.name),
                    attribute.span,
                );
            }
            if attribute.name == "default" {
                match attribute.positional() {
                    Some(Value::List(_)) => self.error(
                        format!(
                            "`@default` on `{}.{}`: list defaults are not supported",
                            model.name, field.name
                        ),
                        attribute.span,
                    ),
                    Some(Value::FunctionCall { name, .. })
                        if !DEFAULT_FUNCTIONS.contains(&name.as_str()) =>
                    {
                        self.error(
                            format!(
                                "`@default` on `{}.{}`: unknown function `{name}()`",
                                model.name, field.name
                            ),
                            attribute.span,
                        );
                    }
                    _ => {}
                }
            }
            if attribute.name == "id" && ty.is_optional {
                self.error(
                    format!("`@id` field `{}.{}` cannot be optional", model.name, field.name),
                    attribute.span,
                );
            }
            if attribute.name == "relation" {
                self.check_relation(model, field, attribute);
            }
        }
    }

    fn check_relation(&mut self, model: &Model, field: &Field, attribute: &Attribute) {
        let schema = self.schema;
        let Some(target) = schema.model(&field.field_type.name) else {
            self.error(
                format!(
                    "`@relation` on `{}.{}` must point to a model, found `{}`",
                    model.name, field.name, field.field_type.name
                ),
                attribute.span,
            );
            return;
        };

        for key in ["onDelete", "onUpdate"] {
            if let Some(value) = attribute.named(key) {
                let known = value
                    .as_identifier()
                    .is_some_and(|action| REFERENTIAL_ACTIONS.contains(&action));
                if !known {
                    self.error(
                        format!(
                            "`@relation` on `{}.{}`: `{key}` must be one of {}",
                            model.name,
                            field.name,
                            REFERENTIAL_ACTIONS.join(", ")
                        ),
                        attribute.span,
                    );
                }
            }
        }

        let fields = attribute.named("fields");
        let references = attribute.named("references");
        let (fields, references) = match (fields, references) {
            (None, None) => return,
            (Some(fields), Some(references)) => (fields, references),
            _ => {
                self.error(
                    format!(
                        "`@relation` on `{}.{}` needs both `fields` and `references`",
                        model.name, field.name
                    ),
                    attribute.span,
                );
                return;
            }
        };

        if field.field_type.is_list {
            self.error(
                format!(
                    "`@relation(fields: ...)` cannot be declared on list field `{}.{}`",
                    model.name, field.name
                ),
                attribute.span,
            );
        }

        let (Some(fields), Some(references)) = (identifier_list(fields), identifier_list(references))
        else {
            self.error(
                format!(
                    "`@relation` on `{}.{}`: `fields` and `references` must be lists of field names",
                    model.name, field.name
                ),
                attribute.span,
            );
            return;
        };

        if fields.len() != references.len() || fields.is_empty() {
            self.error(
                format!(
                    "`@relation` on `{}.{}`: `fields` and `references` must have the same non-zero length",
                    model.name, field.name
                ),
                attribute.span,
            );
        }
        for name in &fields {
            let scalar = model
                .field(name)
                .is_some_and(|f| schema.model(&f.field_type.name).is_none());
            if !scalar {
                self.error(
                    format!(
                        "`@relation` on `{}.{}` references unknown scalar field `{name}`",
                        model.name, field.name
                    ),
                    attribute.span,
                );
            }
        }
        for name in &references {
            if target.field(name).is_none() {
                self.error(
                    format!(
                        "`@relation` on `{}.{}` references unknown field `{}.{name}`",
                        model.name, field.name, target.name
                    ),
                    attribute.span,
                );
            }
        }
    }

    fn check_field_list(&mut self, model: &Model, attribute: &Attribute) {
        let Some(list) = attribute.named_or_positional("fields").and_then(Value::as_list) else {
            self.error(
                format!("`@@{}` on model `{}` needs a list of fields", attribute.name, model.name),
                attribute.span,
            );
            return;
        };
        for item in list {
            let name = match item {
                // `email(sort: Desc)` or `lower(email)`
                Value::FunctionCall { name, args } if model.field(name).is_none() => args
                    .iter()
                    .find(|a| a.name.is_none())
                    .and_then(|a| a.value.as_identifier()),
                Value::FunctionCall { name, .. } => Some(name.as_str()),
                other => other.as_identifier(),
            };
            match name {
                Some(name) if model.field(name).is_some() => {}
                Some(name) => self.error(
                    format!(
                        "`@@{}` on model `{}` references unknown field `{name}`",
                        attribute.name, model.name
                    ),
                    attribute.span,
                ),
                None => self.error(
                    format!(
                        "`@@{}` on model `{}` has a malformed field reference",
                        attribute.name, model.name
                    ),
                    attribute.span,
                ),
            }
        }
    }
}

/// Extracts `[a, b]` as identifier names.
pub(crate) fn identifier_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_list()?
        .iter()
        .map(|v| v.as_identifier().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn errors_for(source: &str, provider: ProviderKind) -> Vec<String> {
        let (schema, syntax) = parse(source);
        assert!(syntax.is_empty(), "{syntax:?}");
        validate(&schema, provider)
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_valid_schema() {
        let errors = errors_for(
            r#"
            datasource db {
              provider = "sqlite"
              url      = "file:./dev.db"
            }
            enum Role {
              USER
              ADMIN
            }
            model User {
              id    Int    @id @default(autoincrement())
              role  Role   @default(USER)
              posts Post[]
            }
            model Post {
              id       Int  @id
              authorId Int
              author   User @relation(fields: [authorId], references: [id])
              @@index([authorId])
            }
            "#,
            ProviderKind::Sqlite,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_unknown_type_reference() {
        let errors = errors_for(
            "model A {\n  id Int @id\n  owner Person\n}",
            ProviderKind::Postgres,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("type `Person`"));
    }

    #[test]
    fn test_malformed_relation_arguments() {
        let errors = errors_for(
            r"
            model User {
              id Int @id
            }
            model Post {
              id       Int  @id
              authorId Int
              author   User @relation(fields: [authorId])
              editor   User @relation(fields: [editorId], references: [uuid])
            }
            ",
            ProviderKind::Postgres,
        );
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].contains("needs both `fields` and `references`"));
        assert!(errors[1].contains("unknown scalar field `editorId`"));
        assert!(errors[2].contains("unknown field `User.uuid`"));
    }

    #[test]
    fn test_duplicates_and_missing_identifier() {
        let errors = errors_for(
            "model A {\n  name String\n  name String\n}\nenum A {\n  X\n}",
            ProviderKind::Postgres,
        );
        assert!(errors.iter().any(|e| e.contains("declared twice")));
        assert!(errors.iter().any(|e| e.contains("declared more than once")));
        assert!(errors.iter().any(|e| e.contains("needs a unique identifier")));
    }

    #[test]
    fn test_scalar_lists_depend_on_provider() {
        let source = "model A {\n  id Int @id\n  tags String[]\n}";
        assert!(errors_for(source, ProviderKind::Postgres).is_empty());
        let errors = errors_for(source, ProviderKind::MySql);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("scalar lists are not supported on mysql"));
    }

    #[test]
    fn test_unknown_provider_and_attributes() {
        let errors = errors_for(
            "datasource db {\n  provider = \"oracle\"\n}\nmodel A {\n  id Int @id @primary\n  @@fulltext([id])\n}",
            ProviderKind::Postgres,
        );
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].contains("unknown provider `oracle`"));
        assert!(errors[1].contains("unknown field attribute `@primary`"));
        assert!(errors[2].contains("unknown block attribute `@@fulltext`"));
    }

    #[test]
    fn test_default_functions_and_actions() {
        let errors = errors_for(
            r"
            model User {
              id    String  @id @default(guid())
              alias String? @unique
            }
            model Post {
              id       Int   @id @default(autoincrement())
              authorId String
              author   User  @relation(fields: [authorId], references: [id], onDelete: Explode)
            }
            ",
            ProviderKind::Sqlite,
        );
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].contains("unknown function `guid()`"));
        assert!(errors[1].contains("`onDelete` must be one of"));
    }

    #[test]
    fn test_index_field_references() {
        let errors = errors_for(
            "model A {\n  id Int @id\n  @@index([missing])\n  @@unique(fields: [id])\n}",
            ProviderKind::Sqlite,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unknown field `missing`"));
    }
}
