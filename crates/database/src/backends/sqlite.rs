//! SQLite Backend Implementation
//!
//! SQLite implementation of the database backend traits over sqlx. An
//! in-memory database lives as long as its connection, so `:memory:` URLs get
//! a pool of exactly one connection that is never recycled.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row, Sqlite, TypeInfo, ValueRef};
use crate::error::{DatabaseError, DatabaseResult};
use super::core::*;

/// SQLite connection pool implementation
#[derive(Clone)]
pub struct SqlitePool {
    pool: Arc<Pool<Sqlite>>,
}

impl SqlitePool {
    pub fn new(pool: Arc<Pool<Sqlite>>) -> Self {
        Self { pool }
    }

    /// Connect a new pool to the given database URL, creating the file if needed
    pub async fn connect(database_url: &str, max_connections: u32) -> DatabaseResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::Connection(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if database_url.contains(":memory:") || database_url.contains("mode=memory") {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to create SQLite pool: {}", e)))?;

        tracing::debug!(url = database_url, "Connected SQLite pool");
        Ok(Self::new(Arc::new(pool)))
    }

    /// A private, empty in-memory database
    pub async fn in_memory() -> DatabaseResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(SqliteTransaction::new(tx)))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&*self.pool)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(rows.into_iter().map(|row| Box::new(SqliteDatabaseRow::new(row)) as Box<dyn DatabaseRow>).collect())
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    // sqlx's SQLite transaction is Send but not Sync; every access goes through
    // `&mut self`, so the mutex is only ever reached via `get_mut`/`into_inner`.
    tx: Mutex<Option<sqlx::Transaction<'static, Sqlite>>>,
}

impl SqliteTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { tx: Mutex::new(Some(tx)) }
    }

    fn active(&mut self) -> DatabaseResult<&mut sqlx::Transaction<'static, Sqlite>> {
        self.tx.get_mut().unwrap_or_else(|e| e.into_inner()).as_mut().ok_or_else(|| DatabaseError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let tx = self.active()?;

        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut **tx)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        let tx = self.active()?;

        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(rows.into_iter().map(|row| Box::new(SqliteDatabaseRow::new(row)) as Box<dyn DatabaseRow>).collect())
    }

    async fn commit(mut self: Box<Self>) -> DatabaseResult<()> {
        let tx = self.tx.get_mut().unwrap_or_else(|e| e.into_inner()).take().ok_or_else(|| DatabaseError::Transaction("Transaction already completed".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> DatabaseResult<()> {
        let tx = self.tx.get_mut().unwrap_or_else(|e| e.into_inner()).take().ok_or_else(|| DatabaseError::Transaction("Transaction already completed".to_string()))?;

        tx.rollback()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

/// SQLite row implementation
pub struct SqliteDatabaseRow {
    row: SqliteRow,
}

impl SqliteDatabaseRow {
    pub fn new(row: SqliteRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for SqliteDatabaseRow {
    fn get_by_name(&self, name: &str) -> DatabaseResult<DatabaseValue> {
        let index = self.row.columns().iter().position(|col| col.name() == name)
            .ok_or_else(|| DatabaseError::Query(format!("Column '{}' not found", name)))?;

        sqlite_value_to_database_value(&self.row, index)
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

fn bind_all<'a>(
    mut query: sqlx::query::Query<'a, Sqlite, SqliteArguments<'a>>,
    params: &[DatabaseValue],
) -> sqlx::query::Query<'a, Sqlite, SqliteArguments<'a>> {
    for param in params {
        query = bind_database_value(query, param);
    }
    query
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Sqlite, SqliteArguments<'a>>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Sqlite, SqliteArguments<'a>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Json(j) => query.bind(j.to_string()),
    }
}

/// Convert a SQLite value to DatabaseValue by its storage class
fn sqlite_value_to_database_value(row: &SqliteRow, index: usize) -> DatabaseResult<DatabaseValue> {
    let raw = row.try_get_raw(index)
        .map_err(|e| DatabaseError::Query(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = raw.type_info().name().to_string();
    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => DatabaseValue::Int64(row.try_get(index)?),
        "REAL" => DatabaseValue::Float64(row.try_get(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            DatabaseValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => {
            let value: String = row.try_get(index).map_err(|e| {
                DatabaseError::Query(format!("Failed to get value as string for type '{}': {}", type_name, e))
            })?;
            DatabaseValue::String(value)
        }
    };

    Ok(value)
}
