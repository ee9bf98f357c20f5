//! Operator console
//!
//! Parses `migrate`, `migrate:rollback`, `migrate:status` and `db:seed` and
//! renders their reports as text or JSON. Applications embed it in their own
//! binary, passing the registries they assembled at start-up.

use std::fmt::Write as _;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::backends::{DatabaseBackendType, DatabasePool, PostgresPool, SqlitePool};
use crate::config::{DatabaseConfig, MigrationConfig, SeedConfig};
use crate::error::{DatabaseError, DatabaseResult};
use crate::migrations::{
    MigrationRunResult, MigrationStatus, MigrationStatusReport, Migrator, RollbackCount,
    RollbackResult,
};
use crate::registry::{MigrationRegistry, SeederRegistry};
use crate::seeding::{SeedRunResult, SeederListing, SeederManager};

/// Seeder name that lists seeders instead of running one
pub const LIST_SEEDERS: &str = "list";

#[derive(Parser, Debug)]
#[command(name = "elif-db")]
#[command(about = "Run database migrations and seeders")]
pub struct DatabaseCli {
    #[command(subcommand)]
    pub command: DatabaseCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseCommand {
    /// Apply all pending migrations
    #[command(name = "migrate")]
    Migrate {
        #[arg(long)]
        json: bool,
    },
    /// Revert the most recently applied migrations
    #[command(name = "migrate:rollback")]
    Rollback {
        /// Number of migrations to revert, or "all"
        #[arg(long, default_value = "1")]
        count: RollbackCount,
        #[arg(long)]
        json: bool,
    },
    /// Show applied and pending migrations
    #[command(name = "migrate:status")]
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Run seeders; `--name=<seeder>` runs one seeder and its dependencies,
    /// `--name=list` lists seeders in run order
    #[command(name = "db:seed")]
    Seed {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

impl DatabaseCommand {
    fn json(&self) -> bool {
        match self {
            DatabaseCommand::Migrate { json }
            | DatabaseCommand::Rollback { json, .. }
            | DatabaseCommand::Status { json }
            | DatabaseCommand::Seed { json, .. } => *json,
        }
    }
}

/// Dispatches console commands to the migrator and the seeder manager
pub struct Console {
    migrator: Migrator,
    seeders: SeederManager,
}

impl Console {
    pub fn new(migrator: Migrator, seeders: SeederManager) -> Self {
        Self { migrator, seeders }
    }

    /// Build a console over one pool shared by both managers
    pub fn with_pool(
        pool: Arc<dyn DatabasePool>,
        migrations: &MigrationRegistry,
        seeders: &SeederRegistry,
        migration_config: MigrationConfig,
        seed_config: SeedConfig,
    ) -> DatabaseResult<Self> {
        let migrator = Migrator::new(Arc::clone(&pool), migrations, migration_config)?;
        let seeders = SeederManager::new(pool, seeders, seed_config)?;
        Ok(Self::new(migrator, seeders))
    }

    /// Connect using `DATABASE_URL`, `ELIF_MIGRATIONS_TABLE` and `ELIF_SEED_FAIL_FAST`
    pub async fn from_env(
        migrations: &MigrationRegistry,
        seeders: &SeederRegistry,
    ) -> DatabaseResult<Self> {
        let pool = connect(&DatabaseConfig::from_env()?).await?;

        Self::with_pool(
            pool,
            migrations,
            seeders,
            MigrationConfig::from_env()?,
            SeedConfig::from_env()?,
        )
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    pub fn seeders(&self) -> &SeederManager {
        &self.seeders
    }

    /// Run a command and return its rendered report
    pub async fn execute(&self, command: &DatabaseCommand) -> DatabaseResult<String> {
        let json = command.json();
        match command {
            DatabaseCommand::Migrate { .. } => {
                let result = self.migrator.run_migrations().await?;
                render(&result, json, render_run)
            }
            DatabaseCommand::Rollback { count, .. } => {
                let result = self.migrator.rollback_migrations(*count).await?;
                render(&result, json, render_rollback)
            }
            DatabaseCommand::Status { .. } => {
                let report = self.migrator.get_migration_status().await?;
                render(&report, json, render_status)
            }
            DatabaseCommand::Seed { name, .. } => match name.as_deref().map(str::trim) {
                Some(LIST_SEEDERS) => render(&self.seeders.list_seeders(), json, render_listing),
                name => {
                    let result = self.seeders.run_seeders(name).await?;
                    render(&result, json, render_seed)
                }
            },
        }
    }

    /// Parse command-line arguments (program name first) and run the command
    pub async fn run_args<I, T>(&self, args: I) -> DatabaseResult<String>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = DatabaseCli::try_parse_from(args)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;
        self.execute(&cli.command).await
    }
}

/// Open a pool for the configured backend
pub async fn connect(database: &DatabaseConfig) -> DatabaseResult<Arc<dyn DatabasePool>> {
    let pool: Arc<dyn DatabasePool> = match database.backend {
        DatabaseBackendType::PostgreSQL => {
            Arc::new(PostgresPool::connect(&database.url, database.max_connections).await?)
        }
        DatabaseBackendType::SQLite => {
            Arc::new(SqlitePool::connect(&database.url, database.max_connections).await?)
        }
        DatabaseBackendType::MySQL => {
            return Err(DatabaseError::Configuration(
                "No mysql backend is available; connect with PostgreSQL or SQLite".to_string(),
            ))
        }
    };
    tracing::info!(url = %database.masked_url(), backend = %database.backend, "Connected to database");
    Ok(pool)
}

fn render<T: Serialize>(value: &T, json: bool, text: fn(&T) -> String) -> DatabaseResult<String> {
    if json {
        serde_json::to_string_pretty(value)
            .map_err(|e| DatabaseError::Configuration(format!("Failed to render report: {}", e)))
    } else {
        Ok(text(value))
    }
}

fn render_run(result: &MigrationRunResult) -> String {
    if result.applied_count == 0 {
        return "Nothing to migrate".to_string();
    }
    let mut out = String::new();
    for version in &result.applied_migrations {
        let _ = writeln!(out, "Migrated: {}", version);
    }
    let _ = write!(
        out,
        "Applied {} migration(s) in {}ms",
        result.applied_count, result.execution_time_ms
    );
    out
}

fn render_rollback(result: &RollbackResult) -> String {
    if result.rolled_back_count == 0 {
        return "Nothing to roll back".to_string();
    }
    let mut out = String::new();
    for version in &result.rolled_back_migrations {
        let _ = writeln!(out, "Rolled back: {}", version);
    }
    let _ = write!(
        out,
        "Rolled back {} migration(s) in {}ms",
        result.rolled_back_count, result.execution_time_ms
    );
    out
}

fn render_status(report: &MigrationStatusReport) -> String {
    let mut out = String::from("Migration Status:\n================\n");
    if report.entries.is_empty() {
        out.push_str("No migrations registered\n");
    }
    for entry in &report.entries {
        let _ = match &entry.status {
            MigrationStatus::Applied { applied_at } => writeln!(
                out,
                "  [applied] {} {} ({})",
                entry.version, entry.description, applied_at
            ),
            MigrationStatus::Pending => {
                writeln!(out, "  [pending] {} {}", entry.version, entry.description)
            }
        };
    }
    for version in &report.orphaned {
        let _ = writeln!(out, "  [missing] {} (applied, not registered)", version);
    }
    let _ = write!(
        out,
        "{} applied, {} pending",
        report.applied_count, report.pending_count
    );
    out
}

fn render_seed(result: &SeedRunResult) -> String {
    let mut out = String::new();
    for name in &result.executed {
        let _ = writeln!(out, "Seeded: {}", name);
    }
    for failure in &result.failed {
        let _ = writeln!(out, "Failed: {} ({})", failure.name, failure.error);
    }
    let _ = write!(
        out,
        "{} seeder(s) run, {} failed in {}ms",
        result.executed.len(),
        result.failed.len(),
        result.execution_time_ms
    );
    out
}

fn render_listing(listing: &SeederListing) -> String {
    let mut out = String::new();
    if let Some(warning) = &listing.warning {
        let _ = writeln!(out, "Warning: {}", warning);
        out.push_str("Seeders (registration order):\n");
    } else {
        out.push_str("Seeders (run order):\n");
    }
    if listing.entries.is_empty() {
        out.push_str("  none registered\n");
    }
    for entry in &listing.entries {
        if entry.dependencies.is_empty() {
            let _ = writeln!(out, "  {}", entry.name);
        } else {
            let _ = writeln!(out, "  {} (after {})", entry.name, entry.dependencies.join(", "));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeding::{SeedFailure, SeederListEntry};

    fn parse(args: &[&str]) -> DatabaseCommand {
        let mut argv = vec!["elif-db"];
        argv.extend_from_slice(args);
        DatabaseCli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&["migrate"]), DatabaseCommand::Migrate { json: false });
        assert_eq!(
            parse(&["migrate:rollback"]),
            DatabaseCommand::Rollback { count: RollbackCount::Steps(1), json: false }
        );
        assert_eq!(
            parse(&["migrate:rollback", "--count=all", "--json"]),
            DatabaseCommand::Rollback { count: RollbackCount::All, json: true }
        );
        assert_eq!(
            parse(&["migrate:rollback", "--count", "3"]),
            DatabaseCommand::Rollback { count: RollbackCount::Steps(3), json: false }
        );
        assert_eq!(parse(&["migrate:status", "--json"]), DatabaseCommand::Status { json: true });
        assert_eq!(
            parse(&["db:seed", "--name=users"]),
            DatabaseCommand::Seed { name: Some("users".to_string()), json: false }
        );
    }

    #[test]
    fn test_parse_rejects_bad_count() {
        assert!(DatabaseCli::try_parse_from(["elif-db", "migrate:rollback", "--count=lots"]).is_err());
        assert!(DatabaseCli::try_parse_from(["elif-db", "migrate:rollback", "--count=0"]).is_err());
    }

    #[test]
    fn test_render_seed_with_failures() {
        let result = SeedRunResult {
            executed: vec!["users".to_string()],
            failed: vec![SeedFailure {
                name: "posts".to_string(),
                error: "boom".to_string(),
            }],
            execution_time_ms: 4,
        };
        let text = render_seed(&result);
        assert!(text.contains("Seeded: users"));
        assert!(text.contains("Failed: posts (boom)"));
        assert!(text.ends_with("1 seeder(s) run, 1 failed in 4ms"));
    }

    #[test]
    fn test_render_listing_fallback() {
        let listing = SeederListing {
            entries: vec![SeederListEntry {
                name: "posts".to_string(),
                dependencies: vec!["users".to_string()],
            }],
            resolved: false,
            warning: Some("missing users".to_string()),
        };
        let text = render_listing(&listing);
        assert!(text.starts_with("Warning: missing users"));
        assert!(text.contains("registration order"));
        assert!(text.contains("posts (after users)"));
    }

    #[test]
    fn test_render_json() {
        let result = RollbackResult::default();
        let json = render(&result, true, render_rollback).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rolled_back_count"], 0);
        assert_eq!(render(&result, false, render_rollback).unwrap(), "Nothing to roll back");
    }
}
