//! # elif-migrator: Versioned Migrations for elif.rs
//!
//! Discovers migration units on disk, tracks the applied version in a
//! control table, and applies pending units in version order with
//! per-unit feedback and error capture.
//!
//! The [`Runner`] drives a [`Migrator`] under an injected [`RunDecider`], so
//! a terminal prompt, a web page or an automated deploy step share the same
//! core.

pub mod backends;
pub mod config;
pub mod error;
pub mod finder;
pub mod migrator;
pub mod registry;
pub mod runner;
pub mod sql_unit;
pub mod store;
pub mod unit;
pub mod version;

#[cfg(test)]
mod testing;

// Re-export core traits and types
pub use backends::{DatabasePool, DatabasePoolConfig, DatabaseRow, DatabaseValue, PostgresPool, SqlDialect};
pub use config::{DatabaseConfig, DiscoveryConfig, MigratorConfig, DEFAULT_VERSION_TABLE};
pub use error::{MigrationError, MigrationResult};
pub use finder::{DiscoveredFile, MigrationFinder};
pub use migrator::{ApplyReport, Migrator, UnitOutcome, UnitState};
pub use registry::UnitRegistry;
pub use runner::{AutoDecider, Decision, ProcessedUnit, RunDecider, RunSummary, Runner, UnitStatus};
pub use sql_unit::{SqlMigration, SqlScript};
pub use store::{MemoryVersionStore, SqlVersionStore, VersionLogEntry, VersionStore};
pub use unit::{Migration, MigrationContext, MigrationUnit, UnitInfo, UnitJournal};
pub use version::{display_version, Direction, Version};
