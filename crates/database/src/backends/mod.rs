//! Database Backend Abstractions
//!
//! The transactional handle consumed by the migrator and the seeder manager,
//! plus its PostgreSQL and SQLite implementations.

pub mod core;
pub mod postgres;
pub mod sqlite;

// Re-export core traits and types
pub use core::*;
pub use postgres::{PostgresPool, PostgresTransaction};
pub use sqlite::{SqlitePool, SqliteTransaction};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect the backend from a database URL scheme
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Some(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("mysql://") {
            Some(DatabaseBackendType::MySQL)
        } else if url.starts_with("sqlite:") || url.starts_with("file:") {
            Some(DatabaseBackendType::SQLite)
        } else {
            None
        }
    }

    /// SQL dialect spoken by this backend
    pub fn dialect(&self) -> SqlDialect {
        match self {
            DatabaseBackendType::PostgreSQL => SqlDialect::PostgreSQL,
            DatabaseBackendType::MySQL => SqlDialect::MySQL,
            DatabaseBackendType::SQLite => SqlDialect::SQLite,
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::MySQL => write!(f, "mysql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "mysql" => Ok(DatabaseBackendType::MySQL),
            "sqlite" => Ok(DatabaseBackendType::SQLite),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_detection() {
        assert_eq!(
            DatabaseBackendType::from_url("postgres://localhost/app"),
            Some(DatabaseBackendType::PostgreSQL)
        );
        assert_eq!(
            DatabaseBackendType::from_url("mysql://localhost/app"),
            Some(DatabaseBackendType::MySQL)
        );
        assert_eq!(
            DatabaseBackendType::from_url("sqlite::memory:"),
            Some(DatabaseBackendType::SQLite)
        );
        assert_eq!(DatabaseBackendType::from_url("redis://localhost"), None);
        assert_eq!("Postgres".parse::<DatabaseBackendType>(), Ok(DatabaseBackendType::PostgreSQL));
        assert!("oracle".parse::<DatabaseBackendType>().is_err());
    }
}
