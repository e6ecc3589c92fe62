//! Core Database Backend Traits
//!
//! The migrator borrows a database handle owned by the host application.
//! These traits abstract that handle so the version store and SQL units work
//! against any backend that can run parameterized SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::error::{MigrationError, MigrationResult};

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// SQL dialect spoken by this pool
    fn dialect(&self) -> SqlDialect;

    /// Execute a query and return affected rows count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64>;

    /// Execute a query and return the result rows
    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row
    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Option<Box<dyn DatabaseRow>>>;

    /// Run unparameterized statements in order inside one transaction.
    ///
    /// Either every statement is committed or none is. Returns the total of
    /// affected rows.
    async fn execute_in_transaction(&self, statements: &[String]) -> MigrationResult<u64>;

    /// Close the pool
    async fn close(&self) -> MigrationResult<()>;
}

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by index
    fn get_by_index(&self, index: usize) -> MigrationResult<DatabaseValue>;

    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> MigrationResult<DatabaseValue>;

    /// Get column names
    fn column_names(&self) -> Vec<String>;
}

/// Simple in-memory row, used for literal result sets
#[derive(Debug, Clone, Default)]
pub struct MapRow {
    columns: Vec<String>,
    values: HashMap<String, DatabaseValue>,
}

impl MapRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        if !self.values.contains_key(column) {
            self.columns.push(column.to_string());
        }
        self.values.insert(column.to_string(), value.into());
        self
    }
}

impl DatabaseRow for MapRow {
    fn get_by_index(&self, index: usize) -> MigrationResult<DatabaseValue> {
        let name = self
            .columns
            .get(index)
            .ok_or_else(|| MigrationError::Database(format!("Column index {} out of range", index)))?;
        self.get_by_name(name)
    }

    fn get_by_name(&self, name: &str) -> MigrationResult<DatabaseValue> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| MigrationError::Database(format!("Column '{}' not found", name)))
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
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
    DateTime(DateTime<Utc>),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Read the value as text
    pub fn as_string(&self) -> MigrationResult<String> {
        match self {
            DatabaseValue::String(s) => Ok(s.clone()),
            DatabaseValue::Int32(i) => Ok(i.to_string()),
            DatabaseValue::Int64(i) => Ok(i.to_string()),
            other => Err(MigrationError::Database(format!(
                "Expected a text value, got {:?}",
                other
            ))),
        }
    }

    /// Read the value as an integer
    pub fn as_i64(&self) -> MigrationResult<i64> {
        match self {
            DatabaseValue::Int32(i) => Ok(*i as i64),
            DatabaseValue::Int64(i) => Ok(*i),
            DatabaseValue::String(s) => s
                .parse()
                .map_err(|e| MigrationError::Database(format!("Invalid integer '{}': {}", s, e))),
            other => Err(MigrationError::Database(format!(
                "Expected an integer value, got {:?}",
                other
            ))),
        }
    }

    /// Read the value as a UTC timestamp, accepting RFC 3339 text
    pub fn as_datetime(&self) -> MigrationResult<DateTime<Utc>> {
        match self {
            DatabaseValue::DateTime(dt) => Ok(*dt),
            DatabaseValue::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| MigrationError::Database(format!("Invalid timestamp '{}': {}", s, e))),
            other => Err(MigrationError::Database(format!(
                "Expected a timestamp value, got {:?}",
                other
            ))),
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

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect differences the migrator cares about
///
/// Only `PostgreSQL` ships with a pool. `MySQL` and `SQLite` are for
/// `DatabasePool` implementations provided by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Bind placeholder for the 1-based parameter `index`
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Auto-increment primary key column definition
    pub fn auto_increment_primary_key(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "BIGSERIAL PRIMARY KEY",
            SqlDialect::MySQL => "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
            SqlDialect::SQLite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Column type for UTC timestamps
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "TIMESTAMPTZ",
            SqlDialect::MySQL => "DATETIME(6)",
            SqlDialect::SQLite => "TEXT",
        }
    }

    /// Query returning a row when `table` exists, binding the name as parameter 1
    pub fn table_exists_sql(&self) -> String {
        match self {
            SqlDialect::PostgreSQL => {
                "SELECT 1 AS present FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
                    .to_string()
            }
            SqlDialect::MySQL => {
                "SELECT 1 AS present FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
                    .to_string()
            }
            SqlDialect::SQLite => {
                "SELECT 1 AS present FROM sqlite_master WHERE type = 'table' AND name = ?".to_string()
            }
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(3), "$3");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(3), "?");
        assert_eq!(SqlDialect::MySQL.parameter_placeholder(1), "?");
    }

    #[test]
    fn test_map_row_access() {
        let row = MapRow::new().with("version", "200").with("id", 7i64);
        assert_eq!(row.get_by_name("version").unwrap().as_string().unwrap(), "200");
        assert_eq!(row.get_by_index(1).unwrap().as_i64().unwrap(), 7);
        assert_eq!(row.column_names(), vec!["version", "id"]);
        assert!(row.get_by_name("missing").is_err());
    }

    #[test]
    fn test_value_conversions() {
        let ts = "2024-01-01T12:00:00Z";
        let parsed = DatabaseValue::from(ts).as_datetime().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T12:00:00+00:00");

        assert_eq!(DatabaseValue::from("42").as_i64().unwrap(), 42);
        assert!(DatabaseValue::from(Option::<String>::None).is_null());
        assert!(DatabaseValue::Bool(true).as_string().is_err());
    }
}
