//! Version Store
//!
//! The append-only log of applied and reverted migrations. The latest entry
//! names the database's current version.

pub mod memory;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, MigrationResult};
use crate::version::{Direction, Version};

pub use memory::MemoryVersionStore;
pub use sql::SqlVersionStore;

/// One row of the version log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLogEntry {
    pub id: i64,
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub action: Direction,
    /// Source path of the unit the entry was written for
    pub path: String,
}

/// Persistence of the version log
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Create the control table when it does not exist yet
    async fn ensure_schema(&self) -> MigrationResult<()>;

    /// Version of the most recent entry, `None` when the log is empty
    async fn current_version(&self) -> MigrationResult<Option<Version>>;

    /// Append an entry stamped with the current UTC time.
    ///
    /// Failures are reported as [`MigrationError::Persistence`].
    async fn append(&self, version: &Version, action: Direction, path: &str) -> MigrationResult<()>;

    /// The whole log, oldest first
    async fn history(&self) -> MigrationResult<Vec<VersionLogEntry>>;
}

/// Control table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_table_name(name: &str) -> MigrationResult<()> {
    let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .map_err(|e| MigrationError::Configuration(e.to_string()))?;

    if identifier.is_match(name) {
        Ok(())
    } else {
        Err(MigrationError::Configuration(format!(
            "Invalid version table name '{}'",
            name
        )))
    }
}
