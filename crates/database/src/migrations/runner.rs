//! Migration Runner - Executes migrations against the database
//!
//! Each pending migration runs in its own transaction together with the
//! ledger insert that records it. The first failure rolls back that
//! migration's transaction and stops the run; migrations committed before it
//! stay applied, so running again resumes where the failed run stopped.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::config::MigrationConfig;
use crate::error::{DatabaseError, DatabaseResult};
use crate::registry::MigrationRegistry;

use super::definitions::{Migration, MigrationRecord, MigrationRunResult};
use super::format_applied_at;
use super::ledger::Ledger;

/// Source of the timestamps written to the ledger
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Migration runner that executes registered migrations against a database
pub struct Migrator {
    pool: Arc<dyn DatabasePool>,
    migrations: Vec<Arc<dyn Migration>>,
    ledger: Ledger,
    clock: Clock,
}

impl Migrator {
    /// Create a migrator over a snapshot of the registry
    ///
    /// Fails with a registration error when two migrations share a version.
    pub fn new(
        pool: Arc<dyn DatabasePool>,
        registry: &MigrationRegistry,
        config: MigrationConfig,
    ) -> DatabaseResult<Self> {
        config.validate()?;

        let mut migrations = registry.all();
        migrations.sort_by(|a, b| a.version().cmp(b.version()));

        if let Some(pair) = migrations.windows(2).find(|pair| pair[0].version() == pair[1].version()) {
            let version = pair[0].version();
            tracing::error!(version, "Duplicate migration version registered");
            return Err(DatabaseError::Registration(format!(
                "Migration version {} is registered more than once",
                version
            )));
        }

        let ledger = Ledger::new(&config, pool.sql_dialect());

        Ok(Self {
            pool,
            migrations,
            ledger,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the clock used to stamp ledger rows
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Registered migrations, ascending by version
    pub fn migrations(&self) -> &[Arc<dyn Migration>] {
        &self.migrations
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub(crate) fn pool(&self) -> &dyn DatabasePool {
        self.pool.as_ref()
    }

    pub(crate) fn find(&self, version: &str) -> Option<&Arc<dyn Migration>> {
        self.migrations
            .binary_search_by(|m| m.version().cmp(version))
            .ok()
            .map(|index| &self.migrations[index])
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> DatabaseResult<MigrationRunResult> {
        let start_time = std::time::Instant::now();

        self.ledger.ensure_table(self.pool()).await?;

        let applied = self.ledger.applied(self.pool()).await?;
        let applied_versions: HashSet<&str> = applied.iter().map(|r| r.version.as_str()).collect();
        self.warn_orphaned(&applied);

        let pending: Vec<&Arc<dyn Migration>> = self
            .migrations
            .iter()
            .filter(|m| !applied_versions.contains(m.version()))
            .collect();
        let skipped_count = self.migrations.len() - pending.len();

        if pending.is_empty() {
            tracing::info!("Nothing to migrate");
            return Ok(MigrationRunResult {
                applied_count: 0,
                applied_migrations: Vec::new(),
                skipped_count,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        tracing::info!(pending = pending.len(), "Running migrations");

        let mut applied_migrations = Vec::with_capacity(pending.len());
        for migration in pending {
            self.apply_migration(migration.as_ref()).await?;
            applied_migrations.push(migration.version().to_string());
        }

        Ok(MigrationRunResult {
            applied_count: applied_migrations.len(),
            applied_migrations,
            skipped_count,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Apply a single migration and record it, in one transaction
    async fn apply_migration(&self, migration: &dyn Migration) -> DatabaseResult<()> {
        let version = migration.version();
        tracing::info!(version, description = migration.description(), "Applying migration");

        let mut tx = self.pool.begin_transaction().await.map_err(|e| {
            tracing::error!(version, error = %e, "Failed to start migration transaction");
            DatabaseError::execution(version, e)
        })?;

        if let Err(e) = migration.up(tx.as_mut()).await {
            let err = DatabaseError::execution(version, e);
            return Err(abort(tx, err).await);
        }

        let record = MigrationRecord {
            version: version.to_string(),
            description: migration.description().to_string(),
            applied_at: format_applied_at(&(self.clock)()),
        };
        if let Err(e) = self.ledger.record(tx.as_mut(), &record).await {
            return Err(abort(tx, e).await);
        }

        tx.commit().await.map_err(|e| {
            let err = DatabaseError::Ledger(format!("Failed to commit migration {}: {}", version, e));
            tracing::error!(version, error = %err, "Migration failed");
            err
        })?;

        tracing::info!(version, "Migrated");
        Ok(())
    }

    fn warn_orphaned(&self, applied: &[MigrationRecord]) {
        for record in applied {
            if self.find(&record.version).is_none() {
                tracing::warn!(
                    version = record.version.as_str(),
                    "Ledger records a migration that is not registered"
                );
            }
        }
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("migrations", &self.migrations.len())
            .field("ledger", &self.ledger)
            .finish()
    }
}

/// Roll back a unit's transaction after `err`, log, and hand `err` back
pub(crate) async fn abort(tx: Box<dyn DatabaseTransaction>, err: DatabaseError) -> DatabaseError {
    tracing::error!(unit = err.unit().unwrap_or_default(), error = %err, "Rolling back failed unit");
    if let Err(rollback_err) = tx.rollback().await {
        tracing::warn!(error = %rollback_err, "Transaction rollback failed");
    }
    err
}
