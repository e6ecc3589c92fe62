//! Unit Registry
//!
//! Maps the identifier a discovered file resolves to onto a constructor.
//! Files without a registered constructor fall back to a loader chosen by
//! file extension; `.sql` files are loaded as [`SqlMigration`]s by default.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{MigrationError, MigrationResult};
use crate::sql_unit::SqlMigration;
use crate::unit::{MigrationContext, MigrationUnit};

/// Builds a unit registered under an identifier
pub type UnitConstructor =
    Arc<dyn Fn(&MigrationContext) -> MigrationResult<Box<dyn MigrationUnit>> + Send + Sync>;

/// Builds a unit from a discovered file
pub type FileLoader =
    Arc<dyn Fn(&Path, &MigrationContext) -> MigrationResult<Box<dyn MigrationUnit>> + Send + Sync>;

/// Registry of unit constructors and per-extension file loaders
#[derive(Clone)]
pub struct UnitRegistry {
    constructors: HashMap<String, UnitConstructor>,
    loaders: HashMap<String, FileLoader>,
}

impl UnitRegistry {
    /// Registry with no constructors and no loaders
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
            loaders: HashMap::new(),
        }
    }

    /// Register a constructor for a resolved identifier,
    /// e.g. `billing::Migration20240101120000_add_invoices`
    pub fn register<F>(&mut self, ident: &str, constructor: F) -> &mut Self
    where
        F: Fn(&MigrationContext) -> MigrationResult<Box<dyn MigrationUnit>> + Send + Sync + 'static,
    {
        self.constructors.insert(ident.to_string(), Arc::new(constructor));
        self
    }

    /// Register a loader for files with the given extension (without the dot)
    pub fn register_loader<F>(&mut self, extension: &str, loader: F) -> &mut Self
    where
        F: Fn(&Path, &MigrationContext) -> MigrationResult<Box<dyn MigrationUnit>> + Send + Sync + 'static,
    {
        self.loaders.insert(extension.to_lowercase(), Arc::new(loader));
        self
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.constructors.contains_key(ident)
    }

    /// Instantiate the unit for a discovered file
    pub fn create(
        &self,
        ident: &str,
        path: &Path,
        context: &MigrationContext,
    ) -> MigrationResult<Box<dyn MigrationUnit>> {
        if let Some(constructor) = self.constructors.get(ident) {
            return constructor(context);
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match self.loaders.get(&extension) {
            Some(loader) => loader(path, context),
            None => Err(MigrationError::Configuration(format!(
                "no migration unit registered for '{}'",
                ident
            ))),
        }
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_loader("sql", |path, context| {
            Ok(Box::new(SqlMigration::from_file(path, context)?) as Box<dyn MigrationUnit>)
        });
        registry
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut constructors: Vec<_> = self.constructors.keys().collect();
        constructors.sort();
        let mut loaders: Vec<_> = self.loaders.keys().collect();
        loaders.sort();

        f.debug_struct("UnitRegistry")
            .field("constructors", &constructors)
            .field("loaders", &loaders)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationResult;
    use crate::testing::RecordingPool;
    use crate::unit::UnitJournal;
    use async_trait::async_trait;
    use std::fs;

    struct SeedRoles;

    #[async_trait]
    impl MigrationUnit for SeedRoles {
        fn version(&self) -> &str {
            "20240301000000"
        }

        fn description(&self) -> &str {
            "Seed default roles"
        }

        async fn up(&mut self, _journal: &mut UnitJournal) -> MigrationResult<()> {
            Ok(())
        }
    }

    fn context(base: &Path) -> MigrationContext {
        MigrationContext::new(Arc::new(RecordingPool::new()), base)
    }

    #[test]
    fn test_constructor_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Migration20240301000000_seed.sql");
        fs::write(&path, "not a migration").unwrap();

        let mut registry = UnitRegistry::default();
        registry.register("Migration20240301000000_seed", |_| Ok(Box::new(SeedRoles)));

        let unit = registry
            .create("Migration20240301000000_seed", &path, &context(dir.path()))
            .unwrap();
        assert_eq!(unit.description(), "Seed default roles");
    }

    #[test]
    fn test_sql_loader_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Migration100.sql");
        fs::write(&path, "-- Version: 100\n-- Description: Hundred\n-- Up\nSELECT 1;").unwrap();

        let unit = UnitRegistry::default()
            .create("Migration100", &path, &context(dir.path()))
            .unwrap();
        assert_eq!(unit.version(), "100");
        assert_eq!(unit.description(), "Hundred");
    }

    #[test]
    fn test_unknown_identifier_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Migration100.rs");

        let result = UnitRegistry::default().create("Migration100", &path, &context(dir.path()));
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }
}
