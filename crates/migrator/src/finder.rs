//! Migration Finder
//!
//! Locates migration unit sources under the configured search roots and the
//! same roots inside vendored packages, and materializes each one through the
//! [`UnitRegistry`].

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::DiscoveryConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::registry::UnitRegistry;
use crate::unit::{Migration, MigrationContext};
use crate::version::Version;

/// A file matched by the finder, before instantiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute (or base-joined) location on disk
    pub path: PathBuf,
    /// Identifier the registry resolves, e.g. `billing::Migration20240101120000`
    pub ident: String,
    /// Location relative to the base directory, `/` separated
    pub source_path: String,
}

/// Finder for migration units on disk
pub struct MigrationFinder {
    base_path: PathBuf,
    config: DiscoveryConfig,
    file_pattern: Regex,
    registry: UnitRegistry,
    context: MigrationContext,
}

impl MigrationFinder {
    pub fn new(
        base_path: impl Into<PathBuf>,
        config: DiscoveryConfig,
        registry: UnitRegistry,
        context: MigrationContext,
    ) -> MigrationResult<Self> {
        let file_pattern = glob_to_regex(&config.file_pattern)?;
        Ok(Self {
            base_path: base_path.into(),
            config,
            file_pattern,
            registry,
            context,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Find and instantiate the units under the configured search paths
    pub fn find_configured(&self) -> MigrationResult<Vec<Migration>> {
        let paths = self.config.search_paths.clone();
        self.find_units(&paths)
    }

    /// Find and instantiate every unit under the given search paths.
    ///
    /// Fails as a whole with [`MigrationError::Discovery`] if any matched
    /// file cannot be turned into a unit, or if two files declare the same
    /// version.
    pub fn find_units(&self, paths: &[String]) -> MigrationResult<Vec<Migration>> {
        let files = self.find_files(paths)?;
        let mut seen: HashMap<Version, String> = HashMap::new();
        let mut units = Vec::with_capacity(files.len());

        for file in files {
            let unit = self
                .registry
                .create(&file.ident, &file.path, &self.context)
                .map_err(|e| MigrationError::discovery(&file.source_path, e))?;

            let migration = Migration::new(unit)
                .map_err(|e| MigrationError::discovery(&file.source_path, e))?
                .with_source_path(file.source_path.clone());

            if let Some(previous) = seen.get(migration.version()) {
                return Err(MigrationError::discovery(
                    &file.source_path,
                    format!("version {} is already declared by {}", migration.version(), previous),
                ));
            }
            seen.insert(migration.version().clone(), file.source_path.clone());

            tracing::debug!(
                "Discovered migration {} ({}) at {}",
                migration.version(),
                file.ident,
                file.source_path
            );
            units.push(migration);
        }

        Ok(units)
    }

    /// Match files without instantiating them, sorted by source path
    pub fn find_files(&self, paths: &[String]) -> MigrationResult<Vec<DiscoveredFile>> {
        let mut visited = HashSet::new();
        let mut files = Vec::new();

        for root in self.search_roots(paths)? {
            let mut matches = Vec::new();
            self.collect_matches(&root, 0, &mut matches)?;

            for path in matches {
                let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                if !visited.insert(key) {
                    continue;
                }
                files.push(DiscoveredFile {
                    ident: resolve_ident(&root, &path),
                    source_path: self.relative_to_base(&path),
                    path,
                });
            }
        }

        files.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        Ok(files)
    }

    /// Existing directories to search: `base/p` then `base/<vendor>/p` for every path
    pub fn search_roots(&self, paths: &[String]) -> MigrationResult<Vec<PathBuf>> {
        let mut vendor_dirs = Vec::new();
        for pattern in &self.config.vendor_roots {
            vendor_dirs.extend(expand_dir_pattern(&self.base_path, pattern)?);
        }

        let mut roots = Vec::new();
        for path in paths {
            let path = path.trim_matches('/');
            let candidates = std::iter::once(self.base_path.join(path))
                .chain(vendor_dirs.iter().map(|dir| dir.join(path)));

            for candidate in candidates {
                if candidate.is_dir() && !roots.contains(&candidate) {
                    roots.push(candidate);
                }
            }
        }
        Ok(roots)
    }

    fn collect_matches(&self, dir: &Path, depth: usize, out: &mut Vec<PathBuf>) -> MigrationResult<()> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| MigrationError::discovery(self.relative_to_base(dir), e))? {
            let entry = entry.map_err(|e| MigrationError::discovery(self.relative_to_base(dir), e))?;
            entries.push(entry.path());
        }
        entries.sort();

        for path in entries {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };

            if path.is_dir() {
                if depth < self.config.max_depth && !name.starts_with('.') {
                    self.collect_matches(&path, depth + 1, out)?;
                }
            } else if self.file_pattern.is_match(name) {
                out.push(path);
            }
        }
        Ok(())
    }

    fn relative_to_base(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.base_path).unwrap_or(path);
        join_components(relative, "/")
    }
}

/// `Migration*.sql` -> `^Migration[^/]*\.sql$`
pub fn glob_to_regex(pattern: &str) -> MigrationResult<Regex> {
    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push_str("[^/]"),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr)
        .map_err(|e| MigrationError::Configuration(format!("Invalid file pattern '{}': {}", pattern, e)))
}

/// Expand a relative directory pattern such as `vendor/*/*` under `base`
fn expand_dir_pattern(base: &Path, pattern: &str) -> MigrationResult<Vec<PathBuf>> {
    let mut current = vec![base.to_path_buf()];

    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();

        if segment.contains('*') || segment.contains('?') {
            let matcher = glob_to_regex(segment)?;
            for dir in &current {
                let Ok(entries) = fs::read_dir(dir) else {
                    continue;
                };
                let mut children = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(|e| MigrationError::discovery(dir.display().to_string(), e))?;
                    children.push(entry.path());
                }
                children.retain(|path| {
                    path.is_dir()
                        && path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| !n.starts_with('.') && matcher.is_match(n))
                });
                children.sort();
                next.extend(children);
            }
        } else {
            next.extend(
                current
                    .iter()
                    .map(|dir| dir.join(segment))
                    .filter(|path| path.is_dir()),
            );
        }

        current = next;
    }

    Ok(current)
}

/// Path below the search root, extension stripped, joined with `::`
fn resolve_ident(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.with_extension("");
    join_components(&relative, "::")
}

fn join_components(path: &Path, separator: &str) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(separator)
}
