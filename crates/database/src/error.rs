//! Error types for migrations and seeding
//!
//! Every public operation of the engine returns [`DatabaseResult`]. Failures
//! are grouped by where they originate: configuration, unit registration,
//! unit execution, the migration ledger, the seeder dependency graph, and the
//! raw backend.

use std::fmt;
use thiserror::Error;

/// Result type alias for database engine operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error types for migration and seeding operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Malformed configuration value (rollback count, table name, URL)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Duplicate unit identity or a dependency on an unregistered unit
    #[error("Registration error: {0}")]
    Registration(String),

    /// A ledger row exists for a version with no registered migration
    #[error("Unregistered migration '{0}': the ledger records it as applied but no migration with this version is registered")]
    UnregisteredMigration(String),

    /// A unit's own `up`/`down`/`run` operation failed
    #[error("Execution of '{unit}' failed: {source}")]
    Execution {
        unit: String,
        #[source]
        source: Box<DatabaseError>,
    },

    /// Reading or writing the migrations ledger failed
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// The seeder dependency graph has no valid order
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Connection or pool error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error
    #[error("Query error: {0}")]
    Query(String),

    /// Transaction begin/commit/rollback error
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl DatabaseError {
    /// Wrap an error raised by a unit's own operation
    pub fn execution(unit: impl Into<String>, source: DatabaseError) -> Self {
        DatabaseError::Execution {
            unit: unit.into(),
            source: Box::new(source),
        }
    }

    /// Identity of the unit this error is attributed to, if any
    pub fn unit(&self) -> Option<&str> {
        match self {
            DatabaseError::Execution { unit, .. } => Some(unit),
            DatabaseError::UnregisteredMigration(version) => Some(version),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::Query(err.to_string())
    }
}

/// A dependency cycle, described by the nodes along it
///
/// The path starts and ends with the same node, e.g. `["a", "b", "a"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub path: Vec<String>,
}

impl CycleError {
    pub fn new(path: Vec<String>) -> Self {
        Self { path }
    }

    /// Nodes taking part in the cycle, without the repeated closing node
    pub fn members(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => &self.path,
        }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected: {}", self.path.join(" -> "))
    }
}

impl std::error::Error for CycleError {}
