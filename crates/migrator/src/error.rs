//! Error types for the migration engine
//!
//! Unit-level failures (`UnitExecution`, `Persistence`, `Irreversible`) are
//! collected per version by the migrator. Discovery, schema and store-read
//! failures propagate to the caller.

use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A matched migration source could not be turned into a unit
    #[error("Invalid migration '{path}': {reason}")]
    Discovery { path: String, reason: String },

    /// `down` was called on a unit that defines no reversal
    #[error("Migration [{version}] cannot be reverted")]
    Irreversible { version: String },

    /// The unit's own `up`/`down` logic failed
    #[error("Migration [{version}] failed: {message}")]
    UnitExecution { version: String, message: String },

    /// Writing the version log failed
    #[error("Failed to record version log entry: {0}")]
    Persistence(String),

    /// The control table could not be probed or created
    #[error("Schema error: {0}")]
    Schema(String),

    /// Database query error
    #[error("Database error: {0}")]
    Database(String),

    /// Connection or pool error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A version token failed validation
    #[error("Invalid version '{0}': expected 1 to 14 ASCII digits")]
    InvalidVersion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MigrationError {
    /// Build a `UnitExecution` error for a version
    pub fn unit(version: impl Into<String>, message: impl Into<String>) -> Self {
        MigrationError::UnitExecution {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Build a `Discovery` error for a source path
    pub fn discovery(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        MigrationError::Discovery {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this is the "cannot revert" failure kind
    pub fn is_irreversible(&self) -> bool {
        matches!(self, MigrationError::Irreversible { .. })
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                MigrationError::Connection(err.to_string())
            }
            other => MigrationError::Database(other.to_string()),
        }
    }
}
