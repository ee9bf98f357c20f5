//! Integration tests for dependency-ordered seeding

use std::sync::Arc;

use elif_database::backends::{DatabasePool, DatabaseValue};
use elif_database::{DatabaseError, SeedConfig, Seeder, SeederManager, SeederRegistry, SqlSeeder};
use elif_testing::{CallJournal, RecordingSeeder, TestDatabase};

fn manager(db: &TestDatabase, registry: &SeederRegistry, config: SeedConfig) -> SeederManager {
    SeederManager::new(db.pool(), registry, config).unwrap()
}

/// A, B(A), C(A, B), registered dependents first
fn chain(journal: &CallJournal) -> SeederRegistry {
    let registry = SeederRegistry::new();
    registry
        .register(RecordingSeeder::new("C", journal).depends_on(["A", "B"]).into_arc())
        .register(RecordingSeeder::new("B", journal).depends_on(["A"]).into_arc())
        .register(RecordingSeeder::new("A", journal).into_arc());
    registry
}

#[tokio::test]
async fn test_runs_dependencies_first() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let manager = manager(&db, &chain(&journal), SeedConfig::default());

    let result = manager.run_seeders(None).await.unwrap();

    assert_eq!(result.executed, vec!["A", "B", "C"]);
    assert!(result.is_success());
    assert_eq!(journal.calls_with_prefix("seed:"), vec!["A", "B", "C"]);
    assert_eq!(db.commit_count(), 3);
}

#[tokio::test]
async fn test_empty_name_runs_everything() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let manager = manager(&db, &chain(&journal), SeedConfig::default());

    let result = manager.run_seeders(Some("  ")).await.unwrap();

    assert_eq!(result.executed, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_no_seeders_registered() {
    let db = TestDatabase::new().await.unwrap();
    let manager = manager(&db, &SeederRegistry::new(), SeedConfig::default());

    let result = manager.run_seeders(None).await.unwrap();

    assert!(result.executed.is_empty());
    assert!(result.is_success());
}

#[tokio::test]
async fn test_targeted_run_includes_prerequisites_only() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let registry = chain(&journal);
    registry
        .register(RecordingSeeder::new("D", &journal).depends_on(["C"]).into_arc())
        .register(RecordingSeeder::new("E", &journal).into_arc());
    let manager = manager(&db, &registry, SeedConfig::default());

    let result = manager.run_seeders(Some("C")).await.unwrap();

    assert_eq!(result.executed, vec!["A", "B", "C"]);
    assert_eq!(journal.calls_with_prefix("seed:"), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_cycle_runs_nothing() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let registry = SeederRegistry::new();
    registry
        .register(RecordingSeeder::new("Z", &journal).into_arc())
        .register(RecordingSeeder::new("X", &journal).depends_on(["Y"]).into_arc())
        .register(RecordingSeeder::new("Y", &journal).depends_on(["X"]).into_arc());
    let manager = manager(&db, &registry, SeedConfig::default());

    let err = manager.run_seeders(None).await.unwrap_err();

    match &err {
        DatabaseError::Cycle(cycle) => {
            let mut members = cycle.members().to_vec();
            members.sort();
            assert_eq!(members, vec!["X", "Y"]);
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Circular dependency detected"));
    assert!(journal.calls().is_empty());
    assert_eq!(db.commit_count(), 0);
}

#[tokio::test]
async fn test_targeted_run_outside_cycle_succeeds() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let registry = SeederRegistry::new();
    registry
        .register(RecordingSeeder::new("Z", &journal).into_arc())
        .register(RecordingSeeder::new("X", &journal).depends_on(["Y"]).into_arc())
        .register(RecordingSeeder::new("Y", &journal).depends_on(["X"]).into_arc());
    let manager = manager(&db, &registry, SeedConfig::default());

    assert_eq!(manager.run_seeders(Some("Z")).await.unwrap().executed, vec!["Z"]);
    assert!(matches!(
        manager.run_seeders(Some("X")).await,
        Err(DatabaseError::Cycle(_))
    ));
}

#[tokio::test]
async fn test_missing_dependency_names_both_seeders() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let registry = SeederRegistry::new();
    registry
        .register(RecordingSeeder::new("roles", &journal).into_arc())
        .register(RecordingSeeder::new("posts", &journal).depends_on(["users"]).into_arc());
    let manager = manager(&db, &registry, SeedConfig::default());

    let err = manager.run_seeders(None).await.unwrap_err();

    assert!(matches!(err, DatabaseError::Registration(_)));
    let message = err.to_string();
    assert!(message.contains("'posts'"));
    assert!(message.contains("'users'"));
    assert!(journal.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_seeder_name() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let manager = manager(&db, &chain(&journal), SeedConfig::default());

    let err = manager.run_seeders(Some("nope")).await.unwrap_err();

    assert!(matches!(err, DatabaseError::Registration(_)));
    assert!(journal.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_seeder_names_are_rejected() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let registry = SeederRegistry::new();
    registry
        .register(RecordingSeeder::new("users", &journal).into_arc())
        .register(RecordingSeeder::new("users", &journal).into_arc());

    let result = SeederManager::new(db.pool(), &registry, SeedConfig::default());

    assert!(matches!(result, Err(DatabaseError::Registration(_))));
}

fn failing_middle(journal: &CallJournal) -> SeederRegistry {
    let registry = SeederRegistry::new();
    registry
        .register(
            RecordingSeeder::new("A", journal)
                .sql("INSERT INTO log (entry) VALUES ('A')")
                .into_arc(),
        )
        .register(
            RecordingSeeder::new("B", journal)
                .depends_on(["A"])
                .sql("INSERT INTO log (entry) VALUES ('B')")
                .failing()
                .into_arc(),
        )
        .register(
            RecordingSeeder::new("C", journal)
                .sql("INSERT INTO log (entry) VALUES ('C')")
                .into_arc(),
        );
    registry
}

async fn log_table(db: &TestDatabase) {
    db.execute("CREATE TABLE log (entry TEXT)", &[]).await.unwrap();
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let db = TestDatabase::new().await.unwrap();
    log_table(&db).await;
    let journal = CallJournal::new();
    let manager = manager(&db, &failing_middle(&journal), SeedConfig::default());

    let err = manager.run_seeders(None).await.unwrap_err();

    assert!(matches!(&err, DatabaseError::Execution { unit, .. } if unit == "B"));
    assert_eq!(journal.calls_with_prefix("seed:"), vec!["A", "B"]);
    assert_eq!(db.column_values("log", "entry").await.unwrap(), vec!["A"]);
    assert_eq!(db.rollback_count(), 1);
}

#[tokio::test]
async fn test_best_effort_continues_past_failures() {
    let db = TestDatabase::new().await.unwrap();
    log_table(&db).await;
    let journal = CallJournal::new();
    let manager = manager(&db, &failing_middle(&journal), SeedConfig::best_effort());

    let result = manager.run_seeders(None).await.unwrap();

    assert_eq!(result.executed, vec!["A", "C"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].name, "B");
    assert!(result.failed[0].error.contains("'B'"));
    assert!(!result.is_success());
    assert_eq!(db.column_values("log", "entry").await.unwrap(), vec!["A", "C"]);
}

#[tokio::test]
async fn test_running_twice_runs_twice() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let manager = manager(&db, &chain(&journal), SeedConfig::default());

    manager.run_seeders(None).await.unwrap();
    manager.run_seeders(None).await.unwrap();

    assert_eq!(journal.calls_with_prefix("seed:"), vec!["A", "B", "C", "A", "B", "C"]);
}

#[tokio::test]
async fn test_sql_seeders_bind_parameters() {
    let db = TestDatabase::new().await.unwrap();
    db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(255))", &[])
        .await
        .unwrap();
    db.execute("CREATE TABLE posts (author VARCHAR(255), title VARCHAR(255))", &[])
        .await
        .unwrap();

    let registry = SeederRegistry::new();
    registry
        .register(Arc::new(
            SqlSeeder::new("posts")
                .depends_on(["users"])
                .statement_with(
                    "INSERT INTO posts (author, title) VALUES (?, ?)",
                    vec!["ada".into(), "Notes".into()],
                ),
        ))
        .register(Arc::new(
            SqlSeeder::new("users").statement("INSERT INTO users (name) VALUES ('ada')"),
        ));
    let manager = manager(&db, &registry, SeedConfig::default());

    let result = manager.run_seeders(None).await.unwrap();

    assert_eq!(result.executed, vec!["users", "posts"]);
    assert_eq!(db.rows("users").await.unwrap()[0].get("id"), Some(&DatabaseValue::Int64(1)));
    assert_eq!(db.column_values("posts", "title").await.unwrap(), vec!["Notes"]);
}

#[tokio::test]
async fn test_deep_dependency_chain_resolves() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let registry = SeederRegistry::new();
    registry.register(RecordingSeeder::new("s0", &journal).into_arc());
    for i in 1..20_000 {
        registry.register(
            RecordingSeeder::new(format!("s{}", i), &journal)
                .depends_on([format!("s{}", i - 1)])
                .into_arc(),
        );
    }
    let manager = manager(&db, &registry, SeedConfig::default());

    let closure = manager.resolver().resolve_for("s19999").unwrap();
    assert_eq!(closure.len(), 20_000);
    assert_eq!(closure[0].name(), "s0");
    assert_eq!(closure[19_999].name(), "s19999");

    assert_eq!(manager.resolver().resolve_all().unwrap().len(), 20_000);
    assert!(manager.list_seeders().resolved);
}

#[tokio::test]
async fn test_list_seeders_in_run_order() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let manager = manager(&db, &chain(&journal), SeedConfig::default());

    let listing = manager.list_seeders();

    assert!(listing.resolved);
    assert!(listing.warning.is_none());
    let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(listing.entries[2].dependencies, vec!["A", "B"]);
    assert!(journal.calls().is_empty());
}

#[tokio::test]
async fn test_list_seeders_falls_back_to_registration_order() {
    let db = TestDatabase::new().await.unwrap();
    let journal = CallJournal::new();
    let registry = chain(&journal);
    registry.register(RecordingSeeder::new("posts", &journal).depends_on(["users"]).into_arc());
    let manager = manager(&db, &registry, SeedConfig::default());

    let listing = manager.list_seeders();

    assert!(!listing.resolved);
    assert!(listing.warning.as_deref().unwrap_or_default().contains("'users'"));
    let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["C", "B", "A", "posts"]);
}
