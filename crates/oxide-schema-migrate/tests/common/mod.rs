#![allow(dead_code)]

use std::fs;
use std::path::Path;

use oxide_schema_core::{compare, ChangeSet, ProviderKind, SchemaModel};
use oxide_schema_migrate::directory::MIGRATION_FILE;
use oxide_schema_migrate::{Database, EngineConfig, MigrationManager};
use tempfile::TempDir;

pub const BLOG: &str = r#"
datasource db {
  provider = "sqlite"
  url      = "file:./dev.db"
}

enum Role {
  USER
  ADMIN
}

model User {
  id        Int      @id @default(autoincrement())
  email     String   @unique
  name      String?
  role      Role     @default(USER)
  createdAt DateTime @default(now())
  posts     Post[]
  profile   Profile?

  @@map("users")
}

model Profile {
  id     Int    @id @default(autoincrement())
  bio    String
  userId Int    @unique
  user   User   @relation(fields: [userId], references: [id], onDelete: Cascade)
}

model Post {
  id        Int      @id @default(autoincrement())
  title     String
  published Boolean  @default(false)
  authorId  Int
  author    User     @relation(fields: [authorId], references: [id])

  @@index([authorId, title])
}
"#;

/// The blog declaration without `User.name`.
pub fn blog_without_name() -> String {
    BLOG.replace("  name      String?\n", "")
}

/// The blog declaration with an extra optional column on `Post`.
pub fn blog_with_subtitle() -> String {
    BLOG.replace(
        "  title     String\n",
        "  title     String\n  subtitle  String?\n",
    )
}

pub fn load(source: &str) -> SchemaModel {
    oxide_schema_migrate::load_schema(source, ProviderKind::Sqlite)
        .unwrap_or_else(|e| panic!("Failed to load schema:\n{e}"))
}

pub fn diff(desired: &SchemaModel, actual: &SchemaModel) -> ChangeSet {
    compare(desired, actual, ProviderKind::Sqlite.provider())
        .unwrap_or_else(|e| panic!("Failed to compare schemas: {e}"))
}

pub fn config(dir: &TempDir) -> EngineConfig {
    EngineConfig::default().with_migrations_dir(dir.path().join("migrations"))
}

/// Manager over a fresh in-memory SQLite database and an empty migrations
/// directory inside `dir`.
pub async fn manager(dir: &TempDir) -> MigrationManager {
    manager_with(config(dir)).await
}

pub async fn manager_with(config: EngineConfig) -> MigrationManager {
    let database = Database::sqlite_memory()
        .await
        .expect("Failed to open in-memory SQLite database");
    MigrationManager::new(database, config)
}

pub fn write_migration(root: &Path, name: &str, sql: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("Failed to create migration directory");
    fs::write(dir.join(MIGRATION_FILE), sql).expect("Failed to write migration");
}

pub async fn table_names(manager: &MigrationManager) -> Vec<String> {
    let Database::Sqlite(pool) = manager.database() else {
        panic!("expected a SQLite pool");
    };
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .expect("Failed to list tables")
}
