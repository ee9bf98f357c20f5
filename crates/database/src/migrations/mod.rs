//! Migration System
//!
//! Ledger-backed, transactional schema migrations:
//!
//! - [`Migrator::run_migrations`] applies every pending migration in version order
//! - [`Migrator::rollback_migrations`] reverts the most recently applied ones
//! - [`Migrator::get_migration_status`] reports applied/pending state

pub mod definitions;
pub mod ledger;
pub mod rollback;
pub mod runner;
pub mod sql;
pub mod status;

use chrono::{DateTime, Utc};

pub use definitions::*;
pub use ledger::Ledger;
pub use runner::{Clock, Migrator};
pub use sql::{split_sql_statements, SqlMigration};

/// Format a ledger timestamp
///
/// Fixed width with microseconds, so lexicographic order is chronological
/// order on every backend.
pub fn format_applied_at(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_applied_at_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();

        let a = format_applied_at(&earlier);
        let b = format_applied_at(&later);

        assert_eq!(a, "2024-01-09T23:59:59.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
