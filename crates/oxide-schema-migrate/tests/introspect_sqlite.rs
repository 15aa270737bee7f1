mod common;

use common::{diff, load, BLOG};
use oxide_schema_core::{
    generate, DefaultValue, IndexColumn, ProviderKind, ReferentialAction, SchemaModel, SortOrder,
};
use oxide_schema_migrate::{introspect, Database, MigrationExecutor, LEDGER_TABLE};

async fn database_with(sql: &str) -> Database {
    let database = Database::sqlite_memory()
        .await
        .expect("Failed to open in-memory SQLite database");
    MigrationExecutor::new(database.clone())
        .run_script("setup", sql)
        .await
        .unwrap_or_else(|e| panic!("Failed to run setup script: {e}"));
    database
}

#[tokio::test]
async fn test_generated_schema_round_trips() {
    let desired = load(BLOG);
    let sql = generate(&diff(&desired, &SchemaModel::new()), ProviderKind::Sqlite.provider())
        .unwrap();
    let database = database_with(&sql).await;

    let actual = introspect(&database).await.unwrap();
    let changes = diff(&desired, &actual);
    assert!(changes.is_empty(), "unexpected changes:\n{changes}");
}

#[tokio::test]
async fn test_columns_and_defaults() {
    let database = database_with(
        r#"
        CREATE TABLE "users" (
            "id" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            "email" TEXT NOT NULL,
            "nickname" TEXT,
            "active" BOOLEAN NOT NULL DEFAULT true,
            "score" INTEGER NOT NULL DEFAULT 0,
            "role" TEXT NOT NULL DEFAULT 'USER',
            "createdAt" DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .await;

    let schema = introspect(&database).await.unwrap();
    let users = schema.table("users").expect("users table");
    assert_eq!(users.primary_key(), vec!["id"]);

    let id = users.get_column("id").unwrap();
    assert_eq!(id.sql_type, "INTEGER");
    assert_eq!(id.default, Some(DefaultValue::Autoincrement));

    assert!(!users.get_column("email").unwrap().nullable);
    assert!(users.get_column("nickname").unwrap().nullable);
    assert_eq!(
        users.get_column("active").unwrap().default,
        Some(DefaultValue::Boolean(true))
    );
    assert_eq!(
        users.get_column("score").unwrap().default,
        Some(DefaultValue::Number("0".to_string()))
    );
    assert_eq!(
        users.get_column("role").unwrap().default,
        Some(DefaultValue::String("USER".to_string()))
    );
    assert_eq!(
        users.get_column("createdAt").unwrap().default,
        Some(DefaultValue::Now)
    );
}

#[tokio::test]
async fn test_indexes() {
    let database = database_with(
        r#"
        CREATE TABLE "users" (
            "id" INTEGER NOT NULL PRIMARY KEY,
            "email" TEXT NOT NULL UNIQUE,
            "name" TEXT,
            "age" INTEGER
        );
        CREATE INDEX "users_name_age_idx" ON "users" ("name", "age" DESC);
        CREATE UNIQUE INDEX "users_email_lower_key" ON "users" (lower("email"));
        "#,
    )
    .await;

    let schema = introspect(&database).await.unwrap();
    let users = schema.table("users").unwrap();

    assert!(users.get_column("email").unwrap().unique);

    let composite = users
        .indexes
        .iter()
        .find(|i| i.name == "users_name_age_idx")
        .expect("composite index");
    assert!(!composite.unique);
    assert_eq!(composite.column_names(), vec!["name", "age"]);
    assert_eq!(composite.columns[1].sort, Some(SortOrder::Desc));

    let lowered = users
        .indexes
        .iter()
        .find(|i| i.name == "users_email_lower_key")
        .expect("expression index");
    assert!(lowered.unique);
    assert_eq!(lowered.columns, vec![IndexColumn::new("email").wrapped("lower")]);
}

#[tokio::test]
async fn test_generated_function_index_round_trips() {
    let source = BLOG.replace(
        "  @@map(\"users\")",
        "  @@index([lower(name)])\n  @@index([createdAt(sort: Desc)])\n  @@map(\"users\")",
    );
    let desired = load(&source);
    let sql = generate(&diff(&desired, &SchemaModel::new()), ProviderKind::Sqlite.provider())
        .unwrap();
    assert!(sql.contains(r#"ON "users"(lower("name"))"#), "{sql}");
    let database = database_with(&sql).await;

    let actual = introspect(&database).await.unwrap();
    let users = actual.table("users").unwrap();
    assert!(users
        .indexes
        .iter()
        .any(|i| i.columns == vec![IndexColumn::new("name").wrapped("lower")]));
    let changes = diff(&desired, &actual);
    assert!(changes.is_empty(), "unexpected changes:\n{changes}");
}

#[tokio::test]
async fn test_non_ascii_expression_index() {
    let database = database_with(
        r#"
        CREATE TABLE "t" ("id" INTEGER NOT NULL PRIMARY KEY, "éé" TEXT);
        CREATE INDEX "t_idx" ON "t"(lower("éé"));
        "#,
    )
    .await;

    let schema = introspect(&database).await.unwrap();
    let index = &schema.table("t").unwrap().indexes[0];
    assert_eq!(index.columns, vec![IndexColumn::new("éé").wrapped("lower")]);
}

#[tokio::test]
async fn test_foreign_keys() {
    let database = database_with(
        r#"
        CREATE TABLE "users" ("id" INTEGER NOT NULL PRIMARY KEY);
        CREATE TABLE "Post" (
            "id" INTEGER NOT NULL PRIMARY KEY,
            "authorId" INTEGER NOT NULL,
            "editorId" INTEGER,
            CONSTRAINT "Post_authorId_fkey" FOREIGN KEY ("authorId") REFERENCES "users" ("id") ON DELETE CASCADE ON UPDATE CASCADE,
            FOREIGN KEY ("editorId") REFERENCES "users"
        );
        "#,
    )
    .await;

    let schema = introspect(&database).await.unwrap();
    let post = schema.table("Post").unwrap();
    assert_eq!(post.foreign_keys.len(), 2);

    let author = post
        .foreign_keys
        .iter()
        .find(|fk| fk.columns == ["authorId"])
        .unwrap();
    assert_eq!(author.name, "Post_authorId_fkey");
    assert_eq!(author.referenced_table, "users");
    assert_eq!(author.referenced_columns, vec!["id"]);
    assert_eq!(author.on_delete, ReferentialAction::Cascade);
    assert_eq!(author.on_update, ReferentialAction::Cascade);

    let editor = post
        .foreign_keys
        .iter()
        .find(|fk| fk.columns == ["editorId"])
        .unwrap();
    assert_eq!(editor.name, "Post_editorId_fkey");
    assert_eq!(editor.referenced_columns, vec!["id"]);
    assert_eq!(editor.on_delete, ReferentialAction::NoAction);
}

#[tokio::test]
async fn test_ledger_is_not_part_of_the_schema() {
    let database = database_with(&format!(
        "CREATE TABLE \"{LEDGER_TABLE}\" (\"migration_name\" TEXT); CREATE TABLE \"a\" (\"id\" INTEGER);"
    ))
    .await;

    let schema = introspect(&database).await.unwrap();
    let names: Vec<&str> = schema.table_names().collect();
    assert_eq!(names, vec!["a"]);
}
