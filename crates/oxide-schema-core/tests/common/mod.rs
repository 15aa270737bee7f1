#![allow(dead_code)]

use oxide_schema_core::{
    compare, generate, load_schema, parse, ChangeSet, ProviderKind, SchemaModel, SyntaxError,
};

pub const BLOG: &str = r#"
datasource db {
  provider = "postgresql"
  url      = env("DATABASE_URL")
}

generator client {
  provider = "oxide-client"
}

enum Role {
  USER
  ADMIN
}

/// Registered accounts.
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

pub fn load(source: &str, provider: ProviderKind) -> SchemaModel {
    load_schema(source, provider).unwrap_or_else(|e| panic!("Failed to load schema:\n{e}"))
}

pub fn syntax_errors(source: &str) -> Vec<SyntaxError> {
    let (_, errors) = parse(source);
    assert!(!errors.is_empty(), "Expected syntax errors for:\n{source}");
    errors
}

pub fn diff(desired: &SchemaModel, actual: &SchemaModel, provider: ProviderKind) -> ChangeSet {
    compare(desired, actual, provider.provider())
        .unwrap_or_else(|e| panic!("Failed to compare schemas: {e}"))
}

pub fn migration_sql(desired: &SchemaModel, actual: &SchemaModel, provider: ProviderKind) -> String {
    let changes = diff(desired, actual, provider);
    generate(&changes, provider.provider())
        .unwrap_or_else(|e| panic!("Failed to generate SQL: {e}"))
}
