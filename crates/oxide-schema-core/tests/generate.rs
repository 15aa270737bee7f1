mod common;

use common::*;
use oxide_schema_core::{
    generate_statements, split_statements, ProviderKind, SchemaModel, StatementKind,
};

const USERS: &str = r#"
model User {
  id    Int     @id @default(autoincrement())
  email String  @unique
  name  String?

  @@map("users")
}
"#;

fn position(sql: &str, needle: &str) -> usize {
    sql.find(needle)
        .unwrap_or_else(|| panic!("Expected `{needle}` in:\n{sql}"))
}

#[test]
fn test_users_table_on_postgres() {
    let sql = migration_sql(
        &load(USERS, ProviderKind::Postgres),
        &SchemaModel::new(),
        ProviderKind::Postgres,
    );
    assert_eq!(
        sql,
        "-- CreateTable\n\
         CREATE TABLE \"users\" (\n    \
         \"id\" INTEGER NOT NULL GENERATED BY DEFAULT AS IDENTITY,\n    \
         \"email\" TEXT NOT NULL UNIQUE,\n    \
         \"name\" TEXT,\n\n    \
         CONSTRAINT \"users_pkey\" PRIMARY KEY (\"id\")\n);\n"
    );
}

#[test]
fn test_users_table_on_mysql() {
    let sql = migration_sql(
        &load(USERS, ProviderKind::MySql),
        &SchemaModel::new(),
        ProviderKind::MySql,
    );
    assert!(sql.starts_with("-- CreateTable\nCREATE TABLE `users` (\n"));
    assert!(sql.contains("`id` INT NOT NULL AUTO_INCREMENT"));
    assert!(sql.contains("`email` VARCHAR(191) NOT NULL,"));
    assert!(sql.contains("PRIMARY KEY (`id`)"));
    assert!(sql.contains("UNIQUE INDEX `users_email_key`(`email`)"));
    assert!(sql.ends_with(") DEFAULT CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci;\n"));
}

#[test]
fn test_users_table_on_sqlite() {
    let sql = migration_sql(
        &load(USERS, ProviderKind::Sqlite),
        &SchemaModel::new(),
        ProviderKind::Sqlite,
    );
    assert!(sql.starts_with("-- CreateTable\nCREATE TABLE \"users\" (\n"));
    assert!(sql.contains("\"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT"));
    assert!(sql.contains("\"email\" TEXT NOT NULL UNIQUE"));
    assert!(!sql.contains("users_pkey"));
}

#[test]
fn test_blog_creates_referenced_tables_first() {
    for provider in [ProviderKind::Postgres, ProviderKind::MySql, ProviderKind::Sqlite] {
        let changes = diff(&load(BLOG, provider), &SchemaModel::new(), provider);
        let statements = generate_statements(&changes, provider.provider())
            .unwrap_or_else(|e| panic!("{provider}: {e}"));

        let kinds: Vec<StatementKind> = statements.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StatementKind::CreateTable,
                StatementKind::CreateTable,
                StatementKind::CreateTable,
                StatementKind::CreateIndex,
            ],
            "{provider}"
        );
        let users = provider.provider().quote_identifier("users");
        assert!(
            statements[0].sql.contains(&format!("CREATE TABLE {users}")),
            "{provider}: {}",
            statements[0].sql
        );
        assert!(statements[3].sql.contains("Post_authorId_title_idx"));
    }
}

#[test]
fn test_blog_foreign_keys_and_defaults_on_postgres() {
    let sql = migration_sql(
        &load(BLOG, ProviderKind::Postgres),
        &SchemaModel::new(),
        ProviderKind::Postgres,
    );
    assert!(position(&sql, "CREATE TABLE \"users\"") < position(&sql, "CREATE TABLE \"Post\""));
    assert!(position(&sql, "CREATE TABLE \"users\"") < position(&sql, "CREATE TABLE \"Profile\""));
    assert!(sql.contains(
        "CONSTRAINT \"Post_authorId_fkey\" FOREIGN KEY (\"authorId\") REFERENCES \"users\" (\"id\") ON DELETE RESTRICT ON UPDATE CASCADE"
    ));
    assert!(sql.contains(
        "CONSTRAINT \"Profile_userId_fkey\" FOREIGN KEY (\"userId\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE ON UPDATE CASCADE"
    ));
    assert!(sql.contains("\"role\" TEXT NOT NULL DEFAULT 'USER'"));
    assert!(sql.contains("\"createdAt\" TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP"));
    assert!(sql.contains("\"published\" BOOLEAN NOT NULL DEFAULT false"));
    assert!(sql.contains("\"userId\" INTEGER NOT NULL UNIQUE"));
    assert!(sql.ends_with(
        "-- CreateIndex\nCREATE INDEX \"Post_authorId_title_idx\" ON \"Post\"(\"authorId\", \"title\");\n"
    ));
}

#[test]
fn test_blog_on_mysql_uses_enum_type() {
    let sql = migration_sql(
        &load(BLOG, ProviderKind::MySql),
        &SchemaModel::new(),
        ProviderKind::MySql,
    );
    assert!(sql.contains("`role` ENUM('USER','ADMIN') NOT NULL DEFAULT 'USER'"));
    assert!(sql.contains("`createdAt` DATETIME(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3)"));
    assert!(sql.contains("`published` TINYINT(1) NOT NULL DEFAULT 0"));
    assert!(sql.contains("UNIQUE INDEX `Profile_userId_key`(`userId`)"));
}

#[test]
fn test_dropping_everything_drops_dependents_first() {
    let sql = migration_sql(
        &SchemaModel::new(),
        &load(BLOG, ProviderKind::Postgres),
        ProviderKind::Postgres,
    );
    assert!(position(&sql, "DROP TABLE \"Post\"") < position(&sql, "DROP TABLE \"users\""));
    assert!(position(&sql, "DROP TABLE \"Profile\"") < position(&sql, "DROP TABLE \"users\""));
    assert!(!sql.contains("DROP CONSTRAINT"));
}

#[test]
fn test_sqlite_foreign_key_change_redefines_table() {
    let desired = load(
        &BLOG.replace("onDelete: Cascade)", "onDelete: Restrict)"),
        ProviderKind::Sqlite,
    );
    let actual = load(BLOG, ProviderKind::Sqlite);
    let changes = diff(&desired, &actual, ProviderKind::Sqlite);
    let statements = generate_statements(&changes, ProviderKind::Sqlite.provider()).unwrap();

    assert!(statements
        .iter()
        .all(|s| s.kind == StatementKind::RedefineTables));
    assert_eq!(statements[0].sql, "PRAGMA defer_foreign_keys=ON");
    assert!(statements[2].sql.starts_with("CREATE TABLE \"new_Profile\""));
    assert!(statements[2].sql.contains("ON DELETE RESTRICT"));
    assert_eq!(
        statements[3].sql,
        "INSERT INTO \"new_Profile\" (\"id\", \"bio\", \"userId\") SELECT \"id\", \"bio\", \"userId\" FROM \"Profile\""
    );
    assert_eq!(statements.last().unwrap().sql, "PRAGMA defer_foreign_keys=OFF");
}

#[test]
fn test_added_relation_on_postgres() {
    let source = BLOG
        .replace(
            "  authorId  Int\n",
            "  authorId  Int\n  editorId  Int?\n  editor    User?    @relation(\"edits\", fields: [editorId], references: [id])\n",
        )
        .replace(
            "  author    User     @relation(fields: [authorId], references: [id])",
            "  author    User     @relation(\"authored\", fields: [authorId], references: [id])",
        )
        .replace(
            "  posts     Post[]\n",
            "  posts     Post[]   @relation(\"authored\")\n  edited    Post[]   @relation(\"edits\")\n",
        );
    let desired = load(&source, ProviderKind::Postgres);
    let actual = load(BLOG, ProviderKind::Postgres);
    let statements = generate_statements(
        &diff(&desired, &actual, ProviderKind::Postgres),
        ProviderKind::Postgres.provider(),
    )
    .unwrap();

    let sql: Vec<&str> = statements.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE \"Post\" ADD COLUMN \"editorId\" INTEGER",
            "ALTER TABLE \"Post\" ADD CONSTRAINT \"Post_editorId_fkey\" FOREIGN KEY (\"editorId\") REFERENCES \"users\" (\"id\") ON DELETE SET NULL ON UPDATE CASCADE",
        ]
    );
}

#[test]
fn test_generated_script_splits_into_statements() {
    for provider in [ProviderKind::Postgres, ProviderKind::MySql, ProviderKind::Sqlite] {
        let changes = diff(&load(BLOG, provider), &SchemaModel::new(), provider);
        let statements = generate_statements(&changes, provider.provider()).unwrap();
        let script = migration_sql(&load(BLOG, provider), &SchemaModel::new(), provider);

        let split = split_statements(&script);
        let expected: Vec<&str> = statements.iter().map(|s| s.sql.as_str()).collect();
        assert_eq!(split, expected, "{provider}");
    }
}
