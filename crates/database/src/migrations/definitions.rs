//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the migration unit contract, the ledger record, and the results
//! reported by the migrator.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backends::DatabaseTransaction;
use crate::error::{DatabaseError, DatabaseResult};

/// A versioned, reversible schema change
///
/// `version` must be unique and sort lexicographically in the order the
/// migrations were written, so generators should emit fixed-width,
/// zero-padded timestamps such as `2024_01_15_093000`.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique, sortable identifier
    fn version(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Apply the change inside the given transaction
    async fn up(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()>;

    /// Revert the change inside the given transaction
    async fn down(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()>;
}

/// A row of the migrations ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: String,
    pub description: String,
    /// UTC timestamp, formatted so that string order is time order
    pub applied_at: String,
}

/// Result of running migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationRunResult {
    /// Number of migrations that were applied
    pub applied_count: usize,
    /// Versions of migrations that were applied, in order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackResult {
    /// Number of migrations that were rolled back
    pub rolled_back_count: usize,
    /// Versions of migrations that were rolled back, most recent first
    pub rolled_back_migrations: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// How many applied migrations a rollback reverts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackCount {
    /// The N most recently applied migrations
    Steps(usize),
    /// Every applied migration
    All,
}

impl RollbackCount {
    pub fn steps(n: usize) -> DatabaseResult<Self> {
        if n == 0 {
            return Err(DatabaseError::Configuration(
                "Rollback count must be a positive integer or 'all'".to_string(),
            ));
        }
        Ok(RollbackCount::Steps(n))
    }

    /// Cap on the number of ledger rows to revert
    pub fn limit(&self) -> Option<usize> {
        match self {
            RollbackCount::Steps(n) => Some(*n),
            RollbackCount::All => None,
        }
    }
}

impl Default for RollbackCount {
    fn default() -> Self {
        RollbackCount::Steps(1)
    }
}

impl FromStr for RollbackCount {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(RollbackCount::All);
        }

        let n: usize = s.parse().map_err(|_| {
            DatabaseError::Configuration(format!(
                "Invalid rollback count '{}': expected a positive integer or 'all'",
                s
            ))
        })?;
        RollbackCount::steps(n)
    }
}

impl fmt::Display for RollbackCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackCount::Steps(n) => write!(f, "{}", n),
            RollbackCount::All => write!(f, "all"),
        }
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: String,
    },
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationStatus::Applied { .. })
    }
}

/// Status of one registered migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatusEntry {
    pub version: String,
    pub description: String,
    pub status: MigrationStatus,
}

/// Status of every registered migration, ascending by version
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatusReport {
    pub entries: Vec<MigrationStatusEntry>,
    pub applied_count: usize,
    pub pending_count: usize,
    /// Ledger versions with no registered migration
    pub orphaned: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_count_parsing() {
        assert_eq!("3".parse::<RollbackCount>().unwrap(), RollbackCount::Steps(3));
        assert_eq!(" 1 ".parse::<RollbackCount>().unwrap(), RollbackCount::Steps(1));
        assert_eq!("all".parse::<RollbackCount>().unwrap(), RollbackCount::All);
        assert_eq!("ALL".parse::<RollbackCount>().unwrap(), RollbackCount::All);
    }

    #[test]
    fn test_rollback_count_rejects_malformed() {
        for input in ["0", "-1", "two", "", "1.5"] {
            let err = input.parse::<RollbackCount>().unwrap_err();
            assert!(
                matches!(err, DatabaseError::Configuration(_)),
                "expected configuration error for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_rollback_count_limit_and_display() {
        assert_eq!(RollbackCount::Steps(2).limit(), Some(2));
        assert_eq!(RollbackCount::All.limit(), None);
        assert_eq!(RollbackCount::default(), RollbackCount::Steps(1));
        assert_eq!(RollbackCount::All.to_string(), "all");
    }

    #[test]
    fn test_status_serialization() {
        let status = MigrationStatus::Applied {
            applied_at: "2024-01-01T00:00:00.000000Z".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "applied");
        assert!(status.is_applied());
        assert!(!MigrationStatus::Pending.is_applied());
    }
}
