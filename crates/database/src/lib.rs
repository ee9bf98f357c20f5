//! # elif-database: Migrations and Seeding for elif.rs
//!
//! Transactional, ledger-backed schema migrations and dependency-ordered
//! database seeders.
//!
//! Migrations are applied in version order, one transaction each, and
//! recorded in a ledger table so later runs skip them. Rollback reverts the
//! most recently applied ones. Seeders declare the seeders they depend on and
//! run in an order where every dependency runs first; dependency cycles and
//! dangling references are reported before anything runs.
//!
//! Units are collected in explicit [`MigrationRegistry`] / [`SeederRegistry`]
//! values and executed through a [`DatabasePool`].

pub mod backends;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod registry;
pub mod seeding;

// Re-export core traits and types
pub use backends::{
    DatabaseBackendType, DatabasePool, DatabaseRow, DatabaseRowExt, DatabaseTransaction,
    DatabaseValue, PostgresPool, SqlDialect, SqlitePool,
};
pub use config::{DatabaseConfig, MigrationConfig, SeedConfig};
pub use console::{Console, DatabaseCli, DatabaseCommand};
pub use error::{CycleError, DatabaseError, DatabaseResult};
pub use logging::{init_logging, LoggingConfig};
pub use migrations::{
    Migration, MigrationRecord, MigrationRunResult, MigrationStatus, MigrationStatusEntry,
    MigrationStatusReport, Migrator, RollbackCount, RollbackResult, SqlMigration,
};
pub use registry::{MigrationRegistry, Registry, SeederRegistry};
pub use seeding::{
    DependencyGraph, SeedFailure, SeedRunResult, Seeder, SeederListEntry, SeederListing,
    SeederManager, SeederResolver, SqlSeeder,
};

// Units implement `Migration` and `Seeder` with `#[async_trait]`
pub use async_trait::async_trait;
