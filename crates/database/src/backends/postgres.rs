//! PostgreSQL Backend Implementation
//!
//! This module provides the PostgreSQL-specific implementation of the database
//! backend traits using sqlx as the underlying database driver.

use std::sync::Arc;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Column, Pool, Postgres, Row, TypeInfo, ValueRef};
use serde_json::Value as JsonValue;
use crate::error::{DatabaseError, DatabaseResult};
use super::core::*;

/// PostgreSQL connection pool implementation
#[derive(Clone)]
pub struct PostgresPool {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresPool {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    /// Connect a new pool to the given database URL
    pub async fn connect(database_url: &str, max_connections: u32) -> DatabaseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Self::new(Arc::new(pool)))
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresTransaction::new(tx)))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let result = query.execute(&*self.pool)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let rows = query.fetch_all(&*self.pool)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(rows.into_iter().map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>).collect())
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let tx = self.tx.as_mut().ok_or_else(|| DatabaseError::Transaction("Transaction already completed".to_string()))?;

        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let result = query.execute(&mut **tx)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        let tx = self.tx.as_mut().ok_or_else(|| DatabaseError::Transaction("Transaction already completed".to_string()))?;

        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let rows = query.fetch_all(&mut **tx)
            .await
            .map_err(|e| DatabaseError::Query(format!("Query fetch failed: {}", e)))?;

        Ok(rows.into_iter().map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>).collect())
    }

    async fn commit(mut self: Box<Self>) -> DatabaseResult<()> {
        let tx = self.tx.take().ok_or_else(|| DatabaseError::Transaction("Transaction already completed".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> DatabaseResult<()> {
        let tx = self.tx.take().ok_or_else(|| DatabaseError::Transaction("Transaction already completed".to_string()))?;

        tx.rollback()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: sqlx::postgres::PgRow,
}

impl PostgresRow {
    pub fn new(row: sqlx::postgres::PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_name(&self, name: &str) -> DatabaseResult<DatabaseValue> {
        let index = self.row.columns().iter().position(|col| col.name() == name)
            .ok_or_else(|| DatabaseError::Query(format!("Column '{}' not found", name)))?;

        postgres_value_to_database_value(&self.row, index)
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &sqlx::postgres::PgRow, index: usize) -> DatabaseResult<DatabaseValue> {
    let raw = row.try_get_raw(index)
        .map_err(|e| DatabaseError::Query(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index)?),
        "INT2" => DatabaseValue::Int32(row.try_get::<i16, _>(index)? as i32),
        "INT4" => DatabaseValue::Int32(row.try_get(index)?),
        "INT8" => DatabaseValue::Int64(row.try_get(index)?),
        "FLOAT4" => DatabaseValue::Float64(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            DatabaseValue::DateTime(naive.and_utc())
        }
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index)?),
        _ => {
            let value: String = row.try_get(index).map_err(|e| {
                DatabaseError::Query(format!("Failed to get value as string for type '{}': {}", type_name, e))
            })?;
            DatabaseValue::String(value)
        }
    };

    Ok(value)
}
