mod common;

use std::fs;

use common::{
    blog_with_subtitle, blog_without_name, config, load, manager, manager_with, table_names,
    write_migration, BLOG,
};
use oxide_schema_core::{DestructiveChange, ProviderKind};
use oxide_schema_migrate::directory::{LOCK_FILE, MIGRATION_FILE};
use oxide_schema_migrate::{
    DevAction, DriftReason, MigrateError, MigrationLedger, MigrationState,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_dev_creates_and_applies_initial_migration() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let desired = load(BLOG);

    assert!(matches!(
        manager.diagnose(&desired).await.unwrap(),
        DevAction::Create { .. }
    ));

    let outcome = manager.dev(&desired, "init").await.unwrap();
    assert!(outcome.applied.is_empty());
    let created = outcome.created.expect("a migration");
    assert!(created.ends_with("_init"));

    let local = manager.local_migrations().unwrap();
    assert_eq!(local.len(), 1);
    assert!(local[0].sql.starts_with("-- CreateTable\n"));
    assert!(dir.path().join("migrations").join(LOCK_FILE).exists());

    let applied = manager.applied_migrations().await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].name, created);
    assert_eq!(applied[0].checksum, local[0].checksum);

    assert_eq!(
        table_names(&manager).await,
        vec!["Post", "Profile", "_oxide_schema_migrations", "users"]
    );
    assert_eq!(manager.diagnose(&desired).await.unwrap(), DevAction::NoChanges);
    assert_eq!(manager.diff_sql(&desired).await.unwrap(), "");
}

#[tokio::test]
async fn test_dev_with_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let desired = load(BLOG);
    manager.dev(&desired, "init").await.unwrap();

    let outcome = manager.dev(&desired, "again").await.unwrap();
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.created, None);
    assert_eq!(manager.local_migrations().unwrap().len(), 1);
}

#[tokio::test]
async fn test_dev_adds_column_in_second_migration() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    manager.dev(&load(BLOG), "init").await.unwrap();

    let desired = load(&blog_with_subtitle());
    let outcome = manager.dev(&desired, "add subtitle").await.unwrap();
    let created = outcome.created.expect("a migration");
    assert!(created.ends_with("_add_subtitle"));

    let local = manager.local_migrations().unwrap();
    assert_eq!(local.len(), 2);
    assert!(local[1].sql.contains("ADD COLUMN \"subtitle\" TEXT"));
    assert_eq!(manager.diagnose(&desired).await.unwrap(), DevAction::NoChanges);
}

#[tokio::test]
async fn test_dropping_a_column_requires_acceptance() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    manager.dev(&load(BLOG), "init").await.unwrap();

    let desired = load(&blog_without_name());
    match manager.dev(&desired, "drop name").await.unwrap_err() {
        MigrateError::DestructiveChange(changes) => assert_eq!(
            changes,
            vec![DestructiveChange::DropColumn {
                table: "users".to_string(),
                column: "name".to_string(),
            }]
        ),
        other => panic!("expected a destructive change error, got {other:?}"),
    }
    assert_eq!(manager.local_migrations().unwrap().len(), 1);
}

#[tokio::test]
async fn test_narrowing_type_change_requires_acceptance() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    manager.dev(&load(BLOG), "init").await.unwrap();

    let desired = load(&BLOG.replace("  title     String\n", "  title     Int\n"));
    match manager.dev(&desired, "numeric title").await.unwrap_err() {
        MigrateError::DestructiveChange(changes) => assert_eq!(
            changes,
            vec![DestructiveChange::TypeChange {
                table: "Post".to_string(),
                column: "title".to_string(),
                from: "TEXT".to_string(),
                to: "INTEGER".to_string(),
            }]
        ),
        other => panic!("expected a destructive change error, got {other:?}"),
    }
    assert_eq!(manager.local_migrations().unwrap().len(), 1);
}

#[tokio::test]
async fn test_case_only_table_rename_is_in_sync() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    manager.dev(&load(BLOG), "init").await.unwrap();

    let desired = load(&BLOG.replace("@@map(\"users\")", "@@map(\"Users\")"));
    assert_eq!(manager.diagnose(&desired).await.unwrap(), DevAction::NoChanges);
    let outcome = manager.dev(&desired, "rename").await.unwrap();
    assert_eq!(outcome.created, None);
    assert_eq!(manager.local_migrations().unwrap().len(), 1);
}

#[tokio::test]
async fn test_function_index_converges() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let desired = load(&BLOG.replace(
        "  @@map(\"users\")",
        "  @@index([lower(name)])\n  @@map(\"users\")",
    ));

    manager.dev(&desired, "init").await.unwrap();
    assert!(manager.local_migrations().unwrap()[0]
        .sql
        .contains(r#"ON "users"(lower("name"))"#));
    assert_eq!(manager.diagnose(&desired).await.unwrap(), DevAction::NoChanges);
    assert_eq!(manager.dev(&desired, "again").await.unwrap().created, None);
}

#[tokio::test]
async fn test_migration_that_fails_to_apply_is_removed() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    manager.dev(&load(BLOG), "init").await.unwrap();
    manager
        .database()
        .execute(
            "INSERT INTO \"users\" (\"id\", \"email\") VALUES (1, 'a@example.com'); \
             INSERT INTO \"Post\" (\"title\", \"authorId\") VALUES ('same', 1), ('same', 1)",
        )
        .await
        .unwrap();

    let desired = load(&BLOG.replace("  title     String\n", "  title     String   @unique\n"));
    assert!(matches!(
        manager.dev(&desired, "unique title").await.unwrap_err(),
        MigrateError::Apply { .. }
    ));

    let local = manager.local_migrations().unwrap();
    assert_eq!(local.len(), 1);
    assert!(local[0].name.ends_with("_init"));
    assert_eq!(manager.applied_migrations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_accepted_data_loss_rebuilds_the_table() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with(config(&dir).with_accept_data_loss(true)).await;
    manager.dev(&load(BLOG), "init").await.unwrap();
    manager
        .database()
        .execute("INSERT INTO \"users\" (\"email\", \"name\") VALUES ('a@example.com', 'A')")
        .await
        .unwrap();

    let desired = load(&blog_without_name());
    let outcome = manager.dev(&desired, "drop name").await.unwrap();
    assert!(outcome.created.is_some());

    let local = manager.local_migrations().unwrap();
    assert!(local[1].sql.contains("-- RedefineTables"));
    assert_eq!(manager.diagnose(&desired).await.unwrap(), DevAction::NoChanges);

    let users = manager.introspect().await.unwrap();
    assert!(users.table("users").unwrap().get_column("name").is_none());
}

#[tokio::test]
async fn test_ledger_entry_without_directory_requires_reset() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let ledger = MigrationLedger::new(manager.database().clone());
    ledger.ensure_table().await.unwrap();
    ledger
        .record_applied("20240101000000_init", "0000")
        .await
        .unwrap();

    let desired = load(BLOG);
    assert_eq!(
        manager.diagnose(&desired).await.unwrap(),
        DevAction::Reset {
            reason: DriftReason::MissingLocally {
                migration: "20240101000000_init".to_string()
            }
        }
    );
    assert!(matches!(
        manager.dev(&desired, "next").await.unwrap_err(),
        MigrateError::Drift(DriftReason::MissingLocally { .. })
    ));
    assert!(manager.local_migrations().unwrap().is_empty());
}

#[tokio::test]
async fn test_unexplained_table_is_schema_drift() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let desired = load(BLOG);
    manager.dev(&desired, "init").await.unwrap();
    manager
        .database()
        .execute("CREATE TABLE \"audit\" (\"id\" INTEGER)")
        .await
        .unwrap();

    match manager.diagnose(&desired).await.unwrap() {
        DevAction::Reset {
            reason: DriftReason::SchemaDrift { summary },
        } => assert!(summary.contains("audit"), "{summary}"),
        other => panic!("expected schema drift, got {other:?}"),
    }
    assert!(manager.check_drift().await.unwrap().is_some());

    let applied = manager.reset().await.unwrap();
    assert_eq!(applied.len(), 1);
    assert!(!table_names(&manager).await.contains(&"audit".to_string()));
    assert_eq!(manager.diagnose(&desired).await.unwrap(), DevAction::NoChanges);
}

#[tokio::test]
async fn test_pending_migrations_apply_in_order() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("migrations");
    write_migration(
        &root,
        "20240102000000_posts",
        "CREATE TABLE \"posts\" (\"id\" INTEGER NOT NULL PRIMARY KEY, \"userId\" INTEGER REFERENCES \"users\" (\"id\"));",
    );
    write_migration(
        &root,
        "20240101000000_users",
        "CREATE TABLE \"users\" (\"id\" INTEGER NOT NULL PRIMARY KEY);",
    );
    let manager = manager(&dir).await;

    let pending: Vec<String> = manager
        .pending_migrations()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(pending, vec!["20240101000000_users", "20240102000000_posts"]);

    let schema = manager.load_schema(
        "model User {\n  id Int @id\n  @@map(\"users\")\n}\n",
    );
    assert!(matches!(
        manager.diagnose(&schema.unwrap()).await.unwrap(),
        DevAction::Apply { pending: ref names } if names.len() == 2
    ));

    let applied = manager.deploy().await.unwrap();
    assert_eq!(applied, pending);
    assert!(manager.pending_migrations().await.unwrap().is_empty());
    assert!(manager.deploy().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deploy_refuses_edited_migration() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    manager.dev(&load(BLOG), "init").await.unwrap();

    let local = manager.local_migrations().unwrap();
    let migration = &local[0];
    fs::write(
        migration.path.join(MIGRATION_FILE),
        format!("{}\n-- edited\n", migration.sql),
    )
    .unwrap();

    match manager.deploy().await.unwrap_err() {
        MigrateError::Drift(DriftReason::ChecksumMismatch { migration: name }) => {
            assert_eq!(name, migration.name);
        }
        other => panic!("expected a checksum mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_out_of_order_migration() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("migrations");
    write_migration(&root, "20240101000000_a", "CREATE TABLE \"a\" (\"id\" INTEGER);");
    write_migration(&root, "20240102000000_b", "CREATE TABLE \"b\" (\"id\" INTEGER);");
    let manager = manager(&dir).await;

    manager.mark_applied("20240102000000_b").await.unwrap();
    assert!(matches!(
        manager.deploy().await.unwrap_err(),
        MigrateError::Drift(DriftReason::OutOfOrder { ref migration, .. })
            if migration == "20240101000000_a"
    ));
}

#[tokio::test]
async fn test_mark_applied_and_rolled_back() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("migrations");
    write_migration(&root, "20240101000000_a", "CREATE TABLE \"a\" (\"id\" INTEGER);");
    let manager = manager(&dir).await;

    manager.mark_applied("20240101000000_a").await.unwrap();
    assert!(manager.pending_migrations().await.unwrap().is_empty());
    assert!(!table_names(&manager).await.contains(&"a".to_string()));
    assert!(matches!(
        manager.mark_applied("20240101000000_a").await.unwrap_err(),
        MigrateError::InvalidLedgerEntry { .. }
    ));
    assert!(matches!(
        manager.mark_applied("20240109000000_missing").await.unwrap_err(),
        MigrateError::MigrationNotFound(_)
    ));

    manager.mark_rolled_back("20240101000000_a").await.unwrap();
    assert_eq!(manager.pending_migrations().await.unwrap().len(), 1);
    assert!(matches!(
        manager.mark_rolled_back("20240101000000_a").await.unwrap_err(),
        MigrateError::MigrationNotFound(_)
    ));

    let status = manager.status().await.unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].state, MigrationState::LocalOnly);
}

#[tokio::test]
async fn test_failed_migration_is_not_recorded() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("migrations");
    write_migration(
        &root,
        "20240101000000_broken",
        "CREATE TABLE \"a\" (\"id\" INTEGER);\nINSERT INTO \"missing\" VALUES (1);\n",
    );
    let manager = manager(&dir).await;

    match manager.deploy().await.unwrap_err() {
        MigrateError::Apply {
            migration,
            statement,
            ..
        } => {
            assert_eq!(migration, "20240101000000_broken");
            assert_eq!(statement, "INSERT INTO \"missing\" VALUES (1)");
        }
        other => panic!("expected an apply error, got {other:?}"),
    }
    assert!(manager.applied_migrations().await.unwrap().is_empty());
    assert!(!table_names(&manager).await.contains(&"a".to_string()));
}

#[tokio::test]
async fn test_create_migration_does_not_apply() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let desired = load(BLOG);

    let migration = manager
        .create_migration(&desired, "init")
        .await
        .unwrap()
        .expect("a migration");
    assert_eq!(manager.pending_migrations().await.unwrap(), vec![migration]);
    assert_eq!(table_names(&manager).await, vec!["_oxide_schema_migrations"]);

    // The replayed history already contains the change.
    assert!(manager
        .create_migration(&desired, "again")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_push_skips_the_ledger() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let desired = load(BLOG);

    let changes = manager.push(&desired).await.unwrap();
    assert_eq!(changes.create_tables.len(), 3);
    assert!(manager.push(&desired).await.unwrap().is_empty());
    assert!(manager.applied_migrations().await.unwrap().is_empty());
    assert!(manager.local_migrations().unwrap().is_empty());

    let err = manager.push(&load(&blog_without_name())).await.unwrap_err();
    assert!(matches!(err, MigrateError::DestructiveChange(_)));
}

#[tokio::test]
async fn test_provider_lock_mismatch() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("migrations");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join(LOCK_FILE), "provider = \"postgresql\"\n").unwrap();
    let manager = manager(&dir).await;

    assert!(matches!(
        manager.deploy().await.unwrap_err(),
        MigrateError::ProviderMismatch {
            expected: ProviderKind::Postgres,
            found: ProviderKind::Sqlite
        }
    ));
}

#[tokio::test]
async fn test_declaration_for_another_provider() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;
    let source = BLOG.replace("provider = \"sqlite\"", "provider = \"mysql\"");

    assert!(matches!(
        manager.load_schema(&source).unwrap_err(),
        MigrateError::ProviderMismatch {
            expected: ProviderKind::MySql,
            found: ProviderKind::Sqlite
        }
    ));
    assert!(matches!(
        manager.load_schema("model {").unwrap_err(),
        MigrateError::Syntax(_)
    ));
}
