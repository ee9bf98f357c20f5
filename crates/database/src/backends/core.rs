//! Core Database Backend Traits
//!
//! The engine only needs a transactional handle: something that can begin a
//! transaction and, inside it, execute arbitrary statements, commit and roll
//! back. These traits are that capability; backends implement them and the
//! migrator and seeder manager receive an `Arc<dyn DatabasePool>` at
//! construction time.

use std::collections::HashMap;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use crate::error::{DatabaseError, DatabaseResult};

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Begin a transaction from the pool
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>>;

    /// Execute a statement directly on the pool and return affected rows count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a query directly on the pool and return the result rows
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>>;

    /// SQL dialect spoken by this pool
    fn sql_dialect(&self) -> SqlDialect;
}

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: Send + Sync {
    /// Execute a statement within the transaction
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a query and return result rows within the transaction
    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> DatabaseResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> DatabaseResult<()>;
}

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> DatabaseResult<DatabaseValue>;

    /// Get column names
    fn column_names(&self) -> Vec<String>;

    /// Convert row to HashMap
    fn to_map(&self) -> DatabaseResult<HashMap<String, DatabaseValue>> {
        self.column_names()
            .into_iter()
            .map(|name| {
                let value = self.get_by_name(&name)?;
                Ok((name, value))
            })
            .collect()
    }
}

/// Typed column access on rows
pub trait DatabaseRowExt {
    /// Get a column that must hold a non-null string
    fn get_string(&self, column: &str) -> DatabaseResult<String>;
}

impl<R: DatabaseRow + ?Sized> DatabaseRowExt for R {
    fn get_string(&self, column: &str) -> DatabaseResult<String> {
        match self.get_by_name(column)? {
            DatabaseValue::String(s) => Ok(s),
            DatabaseValue::DateTime(dt) => Ok(crate::migrations::format_applied_at(&dt)),
            DatabaseValue::Null => Err(DatabaseError::Query(format!("Column '{}' is NULL", column))),
            other => Ok(other.to_json().to_string()),
        }
    }
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    DateTime(chrono::DateTime<chrono::Utc>),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Borrow the value as a string slice when it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder for the zero-based parameter `index`
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Surrogate key column definition for this dialect
    pub fn surrogate_key(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "id SERIAL PRIMARY KEY",
            SqlDialect::MySQL => "id INTEGER PRIMARY KEY AUTO_INCREMENT",
            SqlDialect::SQLite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(2), "$3");
        assert_eq!(SqlDialect::MySQL.parameter_placeholder(2), "?");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(0), "?");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(DatabaseValue::from("users"), DatabaseValue::String("users".into()));
        assert_eq!(DatabaseValue::from(Option::<i32>::None), DatabaseValue::Null);
        assert_eq!(DatabaseValue::from(Some(7i64)), DatabaseValue::Int64(7));
        assert!(DatabaseValue::Null.is_null());
        assert_eq!(DatabaseValue::from("x").as_str(), Some("x"));
        assert_eq!(DatabaseValue::Int32(3).to_json(), serde_json::json!(3));
    }
}
