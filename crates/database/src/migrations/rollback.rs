//! Migration Rollback - Handles rolling back applied migrations
//!
//! Reverts the most recently applied migrations, newest first, each in its
//! own transaction together with the removal of its ledger row.

use crate::error::{DatabaseError, DatabaseResult};

use super::definitions::{MigrationRecord, RollbackCount, RollbackResult};
use super::runner::{abort, Migrator};

impl Migrator {
    /// Roll back the `count` most recently applied migrations
    ///
    /// Stops at the first failure. Migrations reverted before the failure stay
    /// reverted.
    pub async fn rollback_migrations(&self, count: RollbackCount) -> DatabaseResult<RollbackResult> {
        let start_time = std::time::Instant::now();

        if let RollbackCount::Steps(n) = count {
            RollbackCount::steps(n)?;
        }

        self.ledger().ensure_table(self.pool()).await?;

        let targets = self.rollback_targets(count).await?;
        if targets.is_empty() {
            tracing::info!("Nothing to roll back");
            return Ok(RollbackResult {
                execution_time_ms: start_time.elapsed().as_millis(),
                ..RollbackResult::default()
            });
        }

        tracing::info!(count = targets.len(), "Rolling back migrations");

        let mut rolled_back_migrations = Vec::with_capacity(targets.len());
        for record in &targets {
            self.revert_migration(record).await?;
            rolled_back_migrations.push(record.version.clone());
        }

        Ok(RollbackResult {
            rolled_back_count: rolled_back_migrations.len(),
            rolled_back_migrations,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Ledger rows to revert, most recently applied first
    async fn rollback_targets(&self, count: RollbackCount) -> DatabaseResult<Vec<MigrationRecord>> {
        let mut applied = self.ledger().applied(self.pool()).await?;
        applied.reverse();

        if let Some(limit) = count.limit() {
            applied.truncate(limit);
        }
        Ok(applied)
    }

    /// Revert a single migration and remove its record, in one transaction
    async fn revert_migration(&self, record: &MigrationRecord) -> DatabaseResult<()> {
        let version = record.version.as_str();

        let migration = self.find(version).ok_or_else(|| {
            tracing::error!(version, "Cannot roll back a migration that is not registered");
            DatabaseError::UnregisteredMigration(version.to_string())
        })?;

        tracing::info!(version, description = migration.description(), "Rolling back migration");

        let mut tx = self.pool().begin_transaction().await.map_err(|e| {
            tracing::error!(version, error = %e, "Failed to start rollback transaction");
            DatabaseError::execution(version, e)
        })?;

        if let Err(e) = migration.down(tx.as_mut()).await {
            let err = DatabaseError::execution(version, e);
            return Err(abort(tx, err).await);
        }

        if let Err(e) = self.ledger().remove(tx.as_mut(), version).await {
            return Err(abort(tx, e).await);
        }

        tx.commit().await.map_err(|e| {
            let err = DatabaseError::Ledger(format!("Failed to commit rollback of {}: {}", version, e));
            tracing::error!(version, error = %err, "Rollback failed");
            err
        })?;

        tracing::info!(version, "Rolled back");
        Ok(())
    }
}
