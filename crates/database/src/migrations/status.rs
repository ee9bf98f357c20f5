//! Migration status reporting

use std::collections::HashMap;

use crate::error::DatabaseResult;

use super::definitions::{MigrationStatus, MigrationStatusEntry, MigrationStatusReport};
use super::runner::Migrator;

impl Migrator {
    /// Applied/pending state of every registered migration
    ///
    /// Creates the ledger table if it is missing but never touches its rows.
    pub async fn get_migration_status(&self) -> DatabaseResult<MigrationStatusReport> {
        self.ledger().ensure_table(self.pool()).await?;

        let applied = self.ledger().applied(self.pool()).await?;
        let mut applied_at: HashMap<&str, &str> = applied
            .iter()
            .map(|r| (r.version.as_str(), r.applied_at.as_str()))
            .collect();

        let mut report = MigrationStatusReport::default();
        for migration in self.migrations() {
            let status = match applied_at.remove(migration.version()) {
                Some(at) => {
                    report.applied_count += 1;
                    MigrationStatus::Applied {
                        applied_at: at.to_string(),
                    }
                }
                None => {
                    report.pending_count += 1;
                    MigrationStatus::Pending
                }
            };

            report.entries.push(MigrationStatusEntry {
                version: migration.version().to_string(),
                description: migration.description().to_string(),
                status,
            });
        }

        report.orphaned = applied_at.into_keys().map(str::to_string).collect();
        report.orphaned.sort();

        Ok(report)
    }
}
