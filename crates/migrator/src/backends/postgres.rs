//! PostgreSQL Backend Implementation
//!
//! PostgreSQL implementation of the backend traits on top of sqlx.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row as SqlxRow, TypeInfo};
use std::sync::Arc;
use std::time::Duration;

use super::core::*;
use crate::error::{MigrationError, MigrationResult};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 30,
        }
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresPool {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    /// Connect a new pool from a `postgres://` URL
    pub async fn connect(database_url: &str, config: &DatabasePoolConfig) -> MigrationResult<Self> {
        validate_database_url(database_url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(database_url)
            .await
            .map_err(|e| MigrationError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        tracing::debug!(
            "PostgreSQL pool created (max_connections={}, min_connections={})",
            config.max_connections,
            config.min_connections
        );
        Ok(Self::new(Arc::new(pool)))
    }

    /// Access the underlying sqlx pool
    pub fn inner(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

fn validate_database_url(url: &str) -> MigrationResult<()> {
    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
        return Err(MigrationError::Configuration(
            "Invalid PostgreSQL URL scheme".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl DatabasePool for PostgresPool {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let result = query
            .execute(&*self.pool)
            .await
            .map_err(|e| MigrationError::Database(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| MigrationError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Option<Box<dyn DatabaseRow>>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| MigrationError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(|r| Box::new(PostgresRow::new(r)) as Box<dyn DatabaseRow>))
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> MigrationResult<u64> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrationError::Database(format!("Failed to start transaction: {}", e)))?;

        let mut affected = 0;
        for statement in statements {
            if statement.trim().is_empty() {
                continue;
            }
            // Dropping the transaction on error rolls it back
            let result = sqlx::query(statement)
                .execute(&mut *transaction)
                .await
                .map_err(|e| MigrationError::Database(format!("Statement failed: {}", e)))?;
            affected += result.rows_affected();
        }

        transaction
            .commit()
            .await
            .map_err(|e| MigrationError::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(affected)
    }

    async fn close(&self) -> MigrationResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    pub fn new(row: PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_index(&self, index: usize) -> MigrationResult<DatabaseValue> {
        postgres_value_to_database_value(&self.row, index)
    }

    fn get_by_name(&self, name: &str) -> MigrationResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| MigrationError::Database(format!("Column '{}' not found", name)))?;

        postgres_value_to_database_value(&self.row, index)
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Postgres, PgArguments> {
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
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> MigrationResult<DatabaseValue> {
    let column = row
        .columns()
        .get(index)
        .ok_or_else(|| MigrationError::Database(format!("Column index {} out of range", index)))?;
    let type_name = column.type_info().name();

    let fetch_error =
        |e: sqlx::Error| MigrationError::Database(format!("Failed to read column '{}': {}", column.name(), e));

    let value: DatabaseValue = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index).map_err(fetch_error)?.into(),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(fetch_error)?
            .map(|v| v as i32)
            .into(),
        "INT4" => row.try_get::<Option<i32>, _>(index).map_err(fetch_error)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(index).map_err(fetch_error)?.into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map_err(fetch_error)?.into(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(fetch_error)?
            .into(),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map_err(fetch_error)?
            .map(|naive| naive.and_utc())
            .into(),
        "JSON" | "JSONB" => row.try_get::<Option<JsonValue>, _>(index).map_err(fetch_error)?.into(),
        _ => row.try_get::<Option<String>, _>(index).map_err(fetch_error)?.into(),
    };

    Ok(value)
}
