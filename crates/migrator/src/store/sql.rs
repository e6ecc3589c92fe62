//! Version log kept in a control table of the application database

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;

use super::{validate_table_name, VersionLogEntry, VersionStore};
use crate::backends::{DatabasePool, DatabaseRow, DatabaseValue, SqlDialect};
use crate::config::DEFAULT_VERSION_TABLE;
use crate::error::{MigrationError, MigrationResult};
use crate::version::{Direction, Version, MAX_VERSION_LEN};

/// [`VersionStore`] over a shared [`DatabasePool`]
pub struct SqlVersionStore {
    pool: Arc<dyn DatabasePool>,
    table: String,
}

impl SqlVersionStore {
    pub fn new(pool: Arc<dyn DatabasePool>, table: &str) -> MigrationResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Store using the default `_db_versions` table
    pub fn with_default_table(pool: Arc<dyn DatabasePool>) -> Self {
        Self {
            pool,
            table: DEFAULT_VERSION_TABLE.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL to create the control table
    pub fn create_table_sql(&self) -> String {
        let dialect = self.pool.dialect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id {},\n    \
                version VARCHAR({}) NOT NULL,\n    \
                ts {} NOT NULL,\n    \
                action VARCHAR(4) NOT NULL,\n    \
                path TEXT NOT NULL\n\
            )",
            self.table,
            dialect.auto_increment_primary_key(),
            MAX_VERSION_LEN,
            dialect.timestamp_type()
        )
    }

    fn insert_sql(&self) -> String {
        let dialect = self.pool.dialect();
        let placeholders: Vec<String> = (1..=4).map(|i| dialect.parameter_placeholder(i)).collect();
        format!(
            "INSERT INTO {} (version, ts, action, path) VALUES ({})",
            self.table,
            placeholders.join(", ")
        )
    }

    fn timestamp_param(&self) -> DatabaseValue {
        let now = Utc::now();
        match self.pool.dialect() {
            // TEXT column; fixed precision keeps lexical order chronological
            SqlDialect::SQLite => now.to_rfc3339_opts(SecondsFormat::Micros, true).into(),
            _ => now.into(),
        }
    }
}

fn entry_from_row(row: &dyn DatabaseRow) -> MigrationResult<VersionLogEntry> {
    Ok(VersionLogEntry {
        id: row.get_by_name("id")?.as_i64()?,
        version: Version::parse(&row.get_by_name("version")?.as_string()?)?,
        timestamp: row.get_by_name("ts")?.as_datetime()?,
        action: row.get_by_name("action")?.as_string()?.parse()?,
        path: row.get_by_name("path")?.as_string()?,
    })
}

#[async_trait]
impl VersionStore for SqlVersionStore {
    async fn ensure_schema(&self) -> MigrationResult<()> {
        let probe = self.pool.dialect().table_exists_sql();
        let existing = self
            .pool
            .fetch_optional(&probe, &[self.table.as_str().into()])
            .await
            .map_err(|e| MigrationError::Schema(format!("Failed to probe {}: {}", self.table, e)))?;

        if existing.is_some() {
            return Ok(());
        }

        self.pool
            .execute(&self.create_table_sql(), &[])
            .await
            .map_err(|e| MigrationError::Schema(format!("Failed to create {}: {}", self.table, e)))?;

        tracing::info!("Created version table {}", self.table);
        Ok(())
    }

    async fn current_version(&self) -> MigrationResult<Option<Version>> {
        let sql = format!(
            "SELECT version FROM {} ORDER BY ts DESC, id DESC LIMIT 1",
            self.table
        );
        match self.pool.fetch_optional(&sql, &[]).await? {
            Some(row) => {
                let token = row.get_by_name("version")?.as_string()?;
                Ok(Some(Version::parse(&token)?))
            }
            None => Ok(None),
        }
    }

    async fn append(&self, version: &Version, action: Direction, path: &str) -> MigrationResult<()> {
        let params = [
            DatabaseValue::from(version.as_str()),
            self.timestamp_param(),
            DatabaseValue::from(action.as_str()),
            DatabaseValue::from(path),
        ];

        self.pool
            .execute(&self.insert_sql(), &params)
            .await
            .map_err(|e| {
                MigrationError::Persistence(format!(
                    "Failed to log {} of migration [{}]: {}",
                    action, version, e
                ))
            })?;
        Ok(())
    }

    async fn history(&self) -> MigrationResult<Vec<VersionLogEntry>> {
        let sql = format!(
            "SELECT id, version, ts, action, path FROM {} ORDER BY ts ASC, id ASC",
            self.table
        );
        let rows = self.pool.fetch_all(&sql, &[]).await?;
        rows.iter().map(|row| entry_from_row(&**row)).collect()
    }
}
