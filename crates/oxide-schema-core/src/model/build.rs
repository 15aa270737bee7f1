//! Construction of the canonical model from a validated declaration.

use tracing::debug;

use crate::ast::{Attribute, Field, Model, Scalar, Schema, Value};
use crate::error::SchemaError;
use crate::provider::Provider;
use crate::validate::{identifier_list, validate};

use super::{
    ColumnInfo, DefaultValue, ForeignKeyInfo, IndexColumn, IndexInfo, ReferentialAction,
    SchemaModel, TableInfo,
};

/// Builds the desired-state model of `schema` for `provider`.
///
/// Runs semantic validation first; a declaration with validation errors never
/// produces a model.
///
/// # Errors
///
/// Returns [`SchemaError::Validation`] with every problem found.
pub fn build_schema_model(
    schema: &Schema,
    provider: &dyn Provider,
) -> Result<SchemaModel, SchemaError> {
    let errors = validate(schema, provider.kind());
    if !errors.is_empty() {
        return Err(SchemaError::Validation(errors));
    }

    let builder = ModelBuilder { schema, provider };
    let mut model = SchemaModel::new();
    for declared in schema.models.iter().filter(|m| !is_ignored(m)) {
        let table = builder.table(declared);
        debug!(
            table = %table.name,
            columns = table.columns.len(),
            indexes = table.indexes.len(),
            foreign_keys = table.foreign_keys.len(),
            "built table"
        );
        model.add_table(table);
    }
    Ok(model)
}

/// Database table name of a model.
#[must_use]
pub fn table_name(model: &Model) -> &str {
    model
        .attribute("map")
        .and_then(|a| a.named_or_positional("name"))
        .and_then(Value::as_str)
        .unwrap_or(&model.name)
}

/// Database column name of a field.
#[must_use]
pub fn column_name(field: &Field) -> &str {
    field
        .attribute("map")
        .and_then(|a| a.named_or_positional("name"))
        .and_then(Value::as_str)
        .unwrap_or(&field.name)
}

fn is_ignored(model: &Model) -> bool {
    model.attribute("ignore").is_some()
}

fn map_argument(attribute: &Attribute) -> Option<&str> {
    attribute
        .named("map")
        .or_else(|| attribute.named("name"))
        .and_then(Value::as_str)
}

struct ModelBuilder<'a> {
    schema: &'a Schema,
    provider: &'a dyn Provider,
}

impl ModelBuilder<'_> {
    fn table(&self, model: &Model) -> TableInfo {
        let name = table_name(model).to_string();
        let mut table = TableInfo::new(&name);

        let composite_key: Vec<String> = model
            .attribute("id")
            .and_then(|a| a.named_or_positional("fields"))
            .and_then(identifier_list)
            .unwrap_or_default();

        for field in model.fields.iter().filter(|f| self.is_column(f)) {
            let mut column = self.column(field);
            if composite_key.contains(&field.name) {
                column = column.primary_key();
            }
            table.columns.push(column);
        }

        for attribute in &model.attributes {
            let unique = match attribute.name.as_str() {
                "unique" => true,
                "index" => false,
                _ => continue,
            };
            if let Some(index) = self.block_index(model, &name, attribute, unique) {
                table.push_index(index);
            }
        }

        for field in &model.fields {
            if let Some(fk) = self.foreign_key(model, &name, field) {
                table.foreign_keys.push(fk);
            }
        }

        table
    }

    fn is_column(&self, field: &Field) -> bool {
        !field.has_attribute("ignore") && self.schema.model(&field.field_type.name).is_none()
    }

    fn column(&self, field: &Field) -> ColumnInfo {
        let sql_type = self.column_type(field);
        let mut column = ColumnInfo::new(column_name(field), sql_type);
        column.nullable = field.field_type.is_optional;

        if field.has_attribute("id") {
            column = column.primary_key();
        } else if field.has_attribute("unique") {
            column = column.unique();
        }

        column.default = field
            .attribute("default")
            .and_then(Attribute::positional)
            .and_then(default_value);
        column
    }

    fn column_type(&self, field: &Field) -> String {
        let provider = self.provider;
        let ty = &field.field_type;

        let native = field
            .attributes
            .iter()
            .find_map(|a| a.name.strip_prefix("db.").map(|name| (name, a)));
        let element = if let Some((name, attribute)) = native {
            let args: Vec<String> = attribute
                .arguments
                .iter()
                .filter_map(|a| argument_text(&a.value))
                .collect();
            provider.native_type(name, &args)
        } else if let Some(raw) = &ty.unsupported {
            provider.normalize_type(raw)
        } else if let Some(scalar) = ty.scalar() {
            provider.map_type(scalar)
        } else if let Some(enum_def) = self.schema.enum_def(&ty.name) {
            provider.normalize_type(&provider.map_enum(&enum_def.values))
        } else {
            provider.normalize_type(&ty.name)
        };

        if ty.is_list {
            provider
                .list_type(&element)
                .map_or(element, |list| provider.normalize_type(&list))
        } else {
            element
        }
    }

    fn index_column(&self, model: &Model, value: &Value) -> Option<IndexColumn> {
        let field_column = |name: &str| model.field(name).map(|f| column_name(f).to_string());
        match value {
            Value::Scalar(Scalar::Identifier(name)) => field_column(name).map(IndexColumn::new),
            Value::FunctionCall { name, args } => {
                let descending = args.iter().any(|a| {
                    a.name.as_deref() == Some("sort")
                        && a.value.as_identifier() == Some("Desc")
                });
                let mut column = match args
                    .iter()
                    .find(|a| a.name.is_none())
                    .and_then(|a| a.value.as_identifier())
                {
                    // lower(email)
                    Some(inner) => IndexColumn::new(field_column(inner)?).wrapped(name),
                    // email(sort: Desc)
                    None => IndexColumn::new(field_column(name)?),
                };
                if descending {
                    column = column.descending();
                }
                Some(column)
            }
            _ => None,
        }
    }

    fn block_index(
        &self,
        model: &Model,
        table: &str,
        attribute: &Attribute,
        unique: bool,
    ) -> Option<IndexInfo> {
        let columns: Vec<IndexColumn> = attribute
            .named_or_positional("fields")
            .and_then(Value::as_list)?
            .iter()
            .filter_map(|v| self.index_column(model, v))
            .collect();
        if columns.is_empty() {
            return None;
        }
        let name = map_argument(attribute).map_or_else(
            || {
                let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
                let suffix = if unique { "key" } else { "idx" };
                format!("{table}_{}_{suffix}", names.join("_"))
            },
            str::to_string,
        );
        Some(IndexInfo {
            name,
            columns,
            unique,
        })
    }

    fn foreign_key(&self, model: &Model, table: &str, field: &Field) -> Option<ForeignKeyInfo> {
        let relation = field.attribute("relation")?;
        let target = self.schema.model(&field.field_type.name)?;
        if is_ignored(target) {
            return None;
        }
        let fields = relation.named("fields").and_then(identifier_list)?;
        let references = relation.named("references").and_then(identifier_list)?;

        let columns: Vec<String> = fields
            .iter()
            .filter_map(|f| model.field(f).map(|f| column_name(f).to_string()))
            .collect();
        let referenced_columns: Vec<String> = references
            .iter()
            .filter_map(|f| target.field(f).map(|f| column_name(f).to_string()))
            .collect();

        let action = |key: &str| {
            relation
                .named(key)
                .and_then(Value::as_identifier)
                .and_then(ReferentialAction::from_declaration)
        };
        let on_delete = action("onDelete").unwrap_or(if field.field_type.is_optional {
            ReferentialAction::SetNull
        } else {
            ReferentialAction::Restrict
        });
        let on_update = action("onUpdate").unwrap_or(ReferentialAction::Cascade);

        let name = relation
            .named("map")
            .and_then(Value::as_str)
            .map_or_else(|| format!("{table}_{}_fkey", columns.join("_")), str::to_string);

        Some(ForeignKeyInfo {
            name,
            columns,
            referenced_table: table_name(target).to_string(),
            referenced_columns,
            on_delete,
            on_update,
        })
    }
}

/// Database-level default for a `@default(...)` argument. Client-side
/// generators (`uuid()`, `cuid()`, ...) have no database default.
fn default_value(value: &Value) -> Option<DefaultValue> {
    match value {
        Value::Scalar(Scalar::String(s)) => Some(DefaultValue::String(s.clone())),
        Value::Scalar(Scalar::Number(n)) => Some(DefaultValue::Number(n.clone())),
        Value::Scalar(Scalar::Boolean(b)) => Some(DefaultValue::Boolean(*b)),
        // Enum value.
        Value::Scalar(Scalar::Identifier(id)) => Some(DefaultValue::String(id.clone())),
        Value::FunctionCall { name, args } => match name.as_str() {
            "autoincrement" | "sequence" => Some(DefaultValue::Autoincrement),
            "now" => Some(DefaultValue::Now),
            "dbgenerated" => args
                .first()
                .and_then(|a| a.value.as_str())
                .map(|e| DefaultValue::Expression(e.to_string())),
            _ => None,
        },
        Value::List(_) => None,
    }
}

fn argument_text(value: &Value) -> Option<String> {
    match value {
        Value::Scalar(Scalar::Number(n)) => Some(n.clone()),
        Value::Scalar(Scalar::Identifier(id) | Scalar::String(id)) => Some(id.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::provider::ProviderKind;

    fn build(source: &str, provider: ProviderKind) -> SchemaModel {
        let (schema, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        build_schema_model(&schema, provider.provider()).unwrap()
    }

    const BLOG: &str = r#"
        enum Role {
          USER
          ADMIN
        }

        model User {
          id        Int      @id @default(autoincrement())
          email     String   @unique
          name      String?
          role      Role     @default(USER)
          createdAt DateTime @default(now()) @map("created_at")
          token     String   @default(uuid())
          posts     Post[]

          @@map("users")
        }

        model Post {
          id       Int     @id @default(autoincrement())
          title    String  @db.VarChar(200)
          authorId Int?
          author   User?   @relation(fields: [authorId], references: [id])

          @@index([title(sort: Desc), authorId])
          @@unique([authorId, title], map: "post_author_title")
        }
    "#;

    #[test]
    fn test_users_table_columns() {
        let model = build(BLOG, ProviderKind::Postgres);
        let users = model.table("users").unwrap();
        assert_eq!(users.columns.len(), 6);

        let id = users.get_column("id").unwrap();
        assert!(id.primary_key && !id.nullable);
        assert_eq!(id.default, Some(DefaultValue::Autoincrement));
        assert_eq!(id.sql_type, "INTEGER");

        let email = users.get_column("email").unwrap();
        assert!(email.unique && !email.nullable);
        assert!(users.get_column("name").unwrap().nullable);

        let role = users.get_column("role").unwrap();
        assert_eq!(role.sql_type, "TEXT");
        assert_eq!(role.default, Some(DefaultValue::String("USER".to_string())));

        assert_eq!(
            users.get_column("created_at").unwrap().default,
            Some(DefaultValue::Now)
        );
        assert_eq!(users.get_column("token").unwrap().default, None);
        assert!(users.get_column("posts").is_none());
    }

    #[test]
    fn test_relations_and_indexes() {
        let model = build(BLOG, ProviderKind::Postgres);
        let posts = model.table("Post").unwrap();
        assert_eq!(posts.get_column("title").unwrap().sql_type, "VARCHAR(200)");

        let fk = &posts.foreign_keys[0];
        assert_eq!(fk.name, "Post_authorId_fkey");
        assert_eq!(fk.referenced_table, "users");
        assert_eq!(fk.referenced_columns, vec!["id"]);
        assert_eq!(fk.on_delete, ReferentialAction::SetNull);
        assert_eq!(fk.on_update, ReferentialAction::Cascade);

        assert_eq!(posts.indexes.len(), 2);
        let index = &posts.indexes[0];
        assert_eq!(index.name, "Post_title_authorId_idx");
        assert_eq!(index.columns[0], IndexColumn::new("title").descending());
        assert_eq!(posts.indexes[1].name, "post_author_title");
        assert!(posts.indexes[1].unique);
    }

    #[test]
    fn test_provider_type_mapping() {
        let model = build(BLOG, ProviderKind::MySql);
        let users = model.table("users").unwrap();
        assert_eq!(users.get_column("email").unwrap().sql_type, "VARCHAR(191)");
        assert_eq!(users.get_column("role").unwrap().sql_type, "ENUM('USER','ADMIN')");
        assert_eq!(users.get_column("created_at").unwrap().sql_type, "DATETIME(3)");

        let model = build(BLOG, ProviderKind::Sqlite);
        let users = model.table("users").unwrap();
        assert_eq!(users.get_column("id").unwrap().sql_type, "INTEGER");
        assert_eq!(users.get_column("created_at").unwrap().sql_type, "DATETIME");
    }

    #[test]
    fn test_composite_key_and_required_relation() {
        let model = build(
            r"
            model Group {
              id Int @id
            }
            model Member {
              userId  Int
              groupId Int
              group   Group @relation(fields: [groupId], references: [id], onDelete: Cascade)

              @@id([userId, groupId])
              @@unique([groupId])
            }
            ",
            ProviderKind::Sqlite,
        );
        let member = model.table("Member").unwrap();
        assert_eq!(member.primary_key(), vec!["userId", "groupId"]);
        assert_eq!(member.foreign_keys[0].on_delete, ReferentialAction::Cascade);
        assert!(member.indexes.is_empty());
        assert!(member.get_column("groupId").unwrap().unique);
    }

    #[test]
    fn test_single_column_unique_index_folds_into_column() {
        let model = build(
            "model A {\n  id Int @id\n  code String\n  @@unique([code])\n}",
            ProviderKind::Postgres,
        );
        let table = model.table("A").unwrap();
        assert!(table.indexes.is_empty());
        assert!(table.get_column("code").unwrap().unique);
    }

    #[test]
    fn test_function_index_and_ignored_model() {
        let model = build(
            r#"
            model Account {
              id    Int    @id
              email String
              notes String @ignore

              @@index([lower(email)])
            }
            model Legacy {
              code String @id
              @@ignore
            }
            model Audit {
              id   Int    @id
              note String @default(dbgenerated("gen_note()"))
            }
            "#,
            ProviderKind::Postgres,
        );
        assert!(model.table("Legacy").is_none());
        let account = model.table("Account").unwrap();
        assert!(account.get_column("notes").is_none());
        assert_eq!(account.indexes[0].columns[0], IndexColumn::new("email").wrapped("lower"));
        assert_eq!(
            model.table("Audit").unwrap().get_column("note").unwrap().default,
            Some(DefaultValue::Expression("gen_note()".to_string()))
        );
    }

    #[test]
    fn test_validation_errors_block_construction() {
        let (schema, _) = parse("model A {\n  id Int @id\n  b Missing\n}");
        let err = build_schema_model(&schema, ProviderKind::Postgres.provider()).unwrap_err();
        assert!(matches!(err, SchemaError::Validation(ref errors) if errors.len() == 1));
    }
}
