//! Migration Unit Contract
//!
//! Every migration implements [`MigrationUnit`]. The [`Migration`] wrapper
//! owns a unit together with its memoized version and the source path the
//! finder discovered it at.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backends::DatabasePool;
use crate::error::{MigrationError, MigrationResult};
use crate::version::Version;

/// Informational and error messages produced by one `up`/`down` attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitJournal {
    feedback: Vec<String>,
    errors: Vec<String>,
}

impl UnitJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational message
    pub fn feedback(&mut self, message: impl Into<String>) -> &mut Self {
        self.feedback.push(message.into());
        self
    }

    /// Record an error message
    pub fn error(&mut self, message: impl Into<String>) -> &mut Self {
        self.errors.push(message.into());
        self
    }

    pub fn feedback_lines(&self) -> &[String] {
        &self.feedback
    }

    pub fn error_lines(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.feedback, self.errors)
    }
}

/// A versioned schema change
///
/// `up` and `down` report progress through the journal. Returning `Err`
/// marks the attempt failed; the migrator captures the error instead of
/// propagating it, so one broken unit never aborts the run by itself.
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    /// Declared version token, e.g. `"20240101120000"`
    fn version(&self) -> &str;

    /// Short description of what the migration does
    fn description(&self) -> &str;

    /// Author of the migration
    fn author(&self) -> &str {
        ""
    }

    /// Apply the migration
    async fn up(&mut self, journal: &mut UnitJournal) -> MigrationResult<()>;

    /// Revert the migration
    ///
    /// The default refuses with [`MigrationError::Irreversible`].
    async fn down(&mut self, _journal: &mut UnitJournal) -> MigrationResult<()> {
        Err(MigrationError::Irreversible {
            version: self.version().to_string(),
        })
    }
}

/// Dependency bundle handed to unit constructors
#[derive(Clone)]
pub struct MigrationContext {
    pool: Arc<dyn DatabasePool>,
    base_path: PathBuf,
    extras: serde_json::Map<String, serde_json::Value>,
}

impl MigrationContext {
    pub fn new(pool: Arc<dyn DatabasePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            base_path: base_path.into(),
            extras: serde_json::Map::new(),
        }
    }

    /// Attach an extra value for constructors to read
    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extras.insert(key.to_string(), value);
        self
    }

    pub fn pool(&self) -> Arc<dyn DatabasePool> {
        Arc::clone(&self.pool)
    }

    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extras.get(key)
    }
}

impl fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationContext")
            .field("dialect", &self.pool.dialect())
            .field("base_path", &self.base_path)
            .field("extras", &self.extras)
            .finish()
    }
}

/// Plain description of a unit for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub version: Version,
    pub description: String,
    pub author: String,
    pub source_path: String,
}

/// A unit with its memoized version and discovered source path
pub struct Migration {
    version: Version,
    source_path: String,
    unit: Box<dyn MigrationUnit>,
}

impl Migration {
    /// Wrap a unit, validating its declared version once
    pub fn new(unit: Box<dyn MigrationUnit>) -> MigrationResult<Self> {
        let version = Version::parse(unit.version())?;
        Ok(Self {
            version,
            source_path: String::new(),
            unit,
        })
    }

    /// Set the location the unit was discovered at
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = path.into();
        self
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn description(&self) -> &str {
        self.unit.description()
    }

    pub fn author(&self) -> &str {
        self.unit.author()
    }

    pub fn info(&self) -> UnitInfo {
        UnitInfo {
            version: self.version.clone(),
            description: self.unit.description().to_string(),
            author: self.unit.author().to_string(),
            source_path: self.source_path.clone(),
        }
    }

    pub(crate) fn unit_mut(&mut self) -> &mut dyn MigrationUnit {
        self.unit.as_mut()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.unit.description())
            .field("source_path", &self.source_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str);

    #[async_trait]
    impl MigrationUnit for Noop {
        fn version(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "does nothing"
        }

        async fn up(&mut self, journal: &mut UnitJournal) -> MigrationResult<()> {
            journal.feedback("nothing to do");
            Ok(())
        }
    }

    #[test]
    fn test_migration_memoizes_version() {
        let migration = Migration::new(Box::new(Noop("20200101")))
            .unwrap()
            .with_source_path("migrations/Migration20200101.sql");

        assert_eq!(migration.version().as_str(), "20200101");
        assert_eq!(migration.author(), "");

        let info = migration.info();
        assert_eq!(info.description, "does nothing");
        assert_eq!(info.source_path, "migrations/Migration20200101.sql");
    }

    #[test]
    fn test_migration_rejects_invalid_version() {
        let err = Migration::new(Box::new(Noop("GenericMigration"))).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidVersion(_)));
    }

    #[tokio::test]
    async fn test_default_down_is_irreversible() {
        let mut unit = Noop("100");
        let mut journal = UnitJournal::new();

        unit.up(&mut journal).await.unwrap();
        assert_eq!(journal.feedback_lines(), ["nothing to do"]);

        let err = unit.down(&mut journal).await.unwrap_err();
        assert!(err.is_irreversible());
        assert!(!journal.has_errors());
    }
}
