//! Migrator configuration
//!
//! Loaded from YAML; every field has a default so a minimal file (or none)
//! is enough.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MigrationError, MigrationResult};
use crate::store::validate_table_name;

/// Default control table name
pub const DEFAULT_VERSION_TABLE: &str = "_db_versions";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Application base directory; search roots and source paths are relative to it
    pub base_path: PathBuf,
    pub database: DatabaseConfig,
    pub migrations: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Environment variable holding the connection URL
    pub url_env: String,
    /// Control table name
    pub version_table: String,
    pub max_connections: u32,
}

/// Where and how the finder looks for migration units
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Search roots relative to the base path
    pub search_paths: Vec<String>,
    /// Vendored package directories; `*` matches one directory name
    pub vendor_roots: Vec<String>,
    /// File name glob (`*`, `?`)
    pub file_pattern: String,
    /// How many directory levels below a search root are scanned
    pub max_depth: usize,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            database: DatabaseConfig::default(),
            migrations: DiscoveryConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: "DATABASE_URL".to_string(),
            version_table: DEFAULT_VERSION_TABLE.to_string(),
            max_connections: 5,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_paths: vec!["migrations".to_string()],
            vendor_roots: vec!["vendor/*/*".to_string()],
            file_pattern: "Migration*".to_string(),
            max_depth: 4,
        }
    }
}

impl MigratorConfig {
    /// Load configuration from a YAML file
    ///
    /// A relative `base_path` is resolved against the file's directory.
    pub fn load(path: &Path) -> MigrationResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;

        if config.base_path.is_relative() {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            config.base_path = dir.join(&config.base_path);
        }
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> MigrationResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MigrationResult<()> {
        if self.migrations.search_paths.is_empty() {
            return Err(MigrationError::Configuration(
                "migrations.search_paths must not be empty".to_string(),
            ));
        }
        if self.migrations.file_pattern.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "migrations.file_pattern must not be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(MigrationError::Configuration(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        validate_table_name(&self.database.version_table)
    }

    /// Read the connection URL from the configured environment variable
    pub fn database_url(&self) -> MigrationResult<String> {
        std::env::var(&self.database.url_env).map_err(|_| {
            MigrationError::Configuration(format!(
                "environment variable {} is not set",
                self.database.url_env
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = MigratorConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.database.version_table, "_db_versions");
        assert_eq!(config.migrations.search_paths, vec!["migrations"]);
        assert_eq!(config.migrations.file_pattern, "Migration*");
        assert_eq!(config.migrations.max_depth, 4);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "database:\n  version_table: schema_log\nmigrations:\n  search_paths: [db/migrations, db/patches]\n  max_depth: 1\n";
        let config = MigratorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.database.version_table, "schema_log");
        assert_eq!(config.database.url_env, "DATABASE_URL");
        assert_eq!(config.migrations.search_paths.len(), 2);
        assert_eq!(config.migrations.max_depth, 1);
        assert_eq!(config.migrations.vendor_roots, vec!["vendor/*/*"]);
    }

    #[test]
    fn test_validation() {
        assert!(MigratorConfig::from_yaml_str("migrations:\n  search_paths: []\n").is_err());
        assert!(MigratorConfig::from_yaml_str("database:\n  version_table: \"drop table; --\"\n").is_err());
    }

    #[test]
    fn test_load_resolves_base_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrator.yaml");
        std::fs::write(&path, "base_path: app\n").unwrap();

        let config = MigratorConfig::load(&path).unwrap();
        assert_eq!(config.base_path, dir.path().join("app"));
    }

    #[test]
    #[serial]
    fn test_database_url_from_env() {
        let config = MigratorConfig {
            database: DatabaseConfig {
                url_env: "ELIF_MIGRATOR_TEST_URL".to_string(),
                ..DatabaseConfig::default()
            },
            ..MigratorConfig::default()
        };

        std::env::remove_var("ELIF_MIGRATOR_TEST_URL");
        assert!(config.database_url().is_err());

        std::env::set_var("ELIF_MIGRATOR_TEST_URL", "postgres://localhost/app");
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/app");
        std::env::remove_var("ELIF_MIGRATOR_TEST_URL");
    }
}
