//! Migrator
//!
//! Owns the ordered unit set, decides which units are pending against the
//! version log, and applies them one at a time. Unit failures are collected
//! per version; only store reads needed to compute the pending set propagate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{MigrationError, MigrationResult};
use crate::store::VersionStore;
use crate::unit::{Migration, UnitInfo, UnitJournal};
use crate::version::{Direction, Version};

/// Result of one unit's `up`/`down` attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub version: Version,
    pub feedback: Vec<String>,
    pub errors: Vec<String>,
    /// Whether a log entry was written for the attempt
    pub logged: bool,
    /// The unit refused to revert
    pub irreversible: bool,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcomes of an `up` or `down` call, in application order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub direction: Direction,
    pub outcomes: Vec<UnitOutcome>,
}

impl ApplyReport {
    pub fn has_errors(&self) -> bool {
        self.outcomes.iter().any(|outcome| !outcome.is_success())
    }

    pub fn versions(&self) -> Vec<&Version> {
        self.outcomes.iter().map(|outcome| &outcome.version).collect()
    }
}

/// A known unit and whether it is still pending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub info: UnitInfo,
    pub pending: bool,
}

/// Store snapshot taken the first time pending units are asked for
#[derive(Debug, Clone)]
struct PendingSnapshot {
    current: Option<Version>,
    versions: Vec<Version>,
}

/// Applies migration units in version order and records them in the log
pub struct Migrator {
    store: Arc<dyn VersionStore>,
    units: Vec<Migration>,
    pending: Option<PendingSnapshot>,
    feedback: BTreeMap<Version, Vec<String>>,
    errors: BTreeMap<Version, Vec<String>>,
}

impl Migrator {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            units: Vec::new(),
            pending: None,
            feedback: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_units(mut self, units: impl IntoIterator<Item = Migration>) -> Self {
        self.add_units(units);
        self
    }

    /// Every known unit, ascending by version
    pub fn all_units(&self) -> &[Migration] {
        &self.units
    }

    /// Merge units into the set.
    ///
    /// A version that is already known keeps its first registration.
    pub fn add_units(&mut self, units: impl IntoIterator<Item = Migration>) {
        for unit in units {
            let existing = self.units.iter().find(|known| known.version() == unit.version());
            match existing {
                Some(known) => {
                    if known.source_path() != unit.source_path() {
                        tracing::warn!(
                            "Ignoring migration {} from {}: already registered from {}",
                            unit.version(),
                            unit.source_path(),
                            known.source_path()
                        );
                    }
                }
                None => self.units.push(unit),
            }
        }
        self.units.sort_by(|a, b| a.version().cmp(b.version()));

        if mixed_version_widths(&self.units) {
            tracing::warn!("Migration versions have different widths; they are ordered as strings");
        }
    }

    /// Units newer than the current version, ascending.
    ///
    /// Computed once per migrator; later calls reuse the first result.
    pub async fn pending_units(&mut self) -> MigrationResult<Vec<&Migration>> {
        self.load_pending().await?;
        let versions = self.pending_versions_cached();
        Ok(self
            .units
            .iter()
            .filter(|unit| versions.contains(unit.version()))
            .collect())
    }

    /// Versions of [`Migrator::pending_units`]
    pub async fn pending_versions(&mut self) -> MigrationResult<Vec<Version>> {
        self.load_pending().await?;
        Ok(self.pending_versions_cached().to_vec())
    }

    /// Current version as read when the pending set was computed
    pub async fn current_version(&mut self) -> MigrationResult<Option<Version>> {
        self.load_pending().await?;
        Ok(self.pending.as_ref().and_then(|snapshot| snapshot.current.clone()))
    }

    /// Every known unit with its pending flag
    pub async fn status(&mut self) -> MigrationResult<Vec<UnitState>> {
        self.load_pending().await?;
        let versions = self.pending_versions_cached();
        Ok(self
            .units
            .iter()
            .map(|unit| UnitState {
                info: unit.info(),
                pending: versions.contains(unit.version()),
            })
            .collect())
    }

    pub fn unit(&self, version: &Version) -> Option<&Migration> {
        self.units.iter().find(|unit| unit.version() == version)
    }

    /// Apply pending units, all of them when `versions` is empty
    pub async fn up(&mut self, versions: &[Version]) -> MigrationResult<ApplyReport> {
        self.apply(Direction::Up, versions).await
    }

    /// Revert pending units in descending order, all of them when `versions` is empty
    pub async fn down(&mut self, versions: &[Version]) -> MigrationResult<ApplyReport> {
        self.apply(Direction::Down, versions).await
    }

    /// Feedback accumulated for a version across every attempt
    pub fn feedback_for(&self, version: &Version) -> &[String] {
        self.feedback.get(version).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_feedback(&self) -> &BTreeMap<Version, Vec<String>> {
        &self.feedback
    }

    /// Errors accumulated for a version across every attempt
    pub fn errors_for(&self, version: &Version) -> &[String] {
        self.errors.get(version).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_errors(&self) -> &BTreeMap<Version, Vec<String>> {
        &self.errors
    }

    async fn load_pending(&mut self) -> MigrationResult<()> {
        if self.pending.is_some() {
            return Ok(());
        }

        self.store.ensure_schema().await?;
        let current = self.store.current_version().await?;

        let versions: Vec<Version> = self
            .units
            .iter()
            .map(|unit| unit.version())
            .filter(|version| current.as_ref().map_or(true, |current| *version > current))
            .cloned()
            .collect();

        tracing::debug!(
            "{} of {} migrations pending",
            versions.len(),
            self.units.len()
        );
        self.pending = Some(PendingSnapshot { current, versions });
        Ok(())
    }

    fn pending_versions_cached(&self) -> &[Version] {
        self.pending
            .as_ref()
            .map(|snapshot| snapshot.versions.as_slice())
            .unwrap_or(&[])
    }

    async fn apply(&mut self, direction: Direction, versions: &[Version]) -> MigrationResult<ApplyReport> {
        let mut targets = self.pending_versions().await?;
        if !versions.is_empty() {
            targets.retain(|version| versions.contains(version));
        }
        if direction == Direction::Down {
            targets.reverse();
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for version in targets {
            if let Some(outcome) = self.apply_unit(&version, direction).await {
                outcomes.push(outcome);
            }
        }

        Ok(ApplyReport { direction, outcomes })
    }

    async fn apply_unit(&mut self, version: &Version, direction: Direction) -> Option<UnitOutcome> {
        let migration = self.units.iter_mut().find(|unit| unit.version() == version)?;
        let source_path = migration.source_path().to_string();
        let mut journal = UnitJournal::new();

        tracing::info!("Running {} for migration {} ({})", direction, version, source_path);

        let unit = migration.unit_mut();
        let result = match direction {
            Direction::Up => unit.up(&mut journal).await,
            Direction::Down => unit.down(&mut journal).await,
        };

        let mut irreversible = false;
        if let Err(err) = result {
            let err = match err {
                err @ (MigrationError::UnitExecution { .. } | MigrationError::Irreversible { .. }) => err,
                other => MigrationError::unit(version.as_str(), other.to_string()),
            };
            irreversible = err.is_irreversible();
            journal.error(err.to_string());
        }

        if journal.has_errors() {
            tracing::warn!(
                "Migration {} reported errors during {}: {}",
                version,
                direction,
                journal.error_lines().join("; ")
            );
        }

        // Failed attempts are logged too; only a refused revert leaves no entry
        let mut logged = false;
        if !irreversible {
            match self.store.append(version, direction, &source_path).await {
                Ok(()) => logged = true,
                Err(err) => {
                    tracing::warn!("Could not log {} of migration {}: {}", direction, version, err);
                    journal.error(err.to_string());
                }
            }
        }

        let (feedback, errors) = journal.into_parts();
        self.feedback
            .entry(version.clone())
            .or_default()
            .extend(feedback.iter().cloned());
        if !errors.is_empty() {
            self.errors
                .entry(version.clone())
                .or_default()
                .extend(errors.iter().cloned());
        }

        Some(UnitOutcome {
            version: version.clone(),
            feedback,
            errors,
            logged,
            irreversible,
        })
    }
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("units", &self.units)
            .field("pending", &self.pending)
            .field("feedback", &self.feedback)
            .field("errors", &self.errors)
            .finish()
    }
}

/// Versions compare as strings, so `"99"` sorts after `"100"`
fn mixed_version_widths(units: &[Migration]) -> bool {
    let mut widths = units.iter().map(|unit| unit.version().as_str().len());
    match widths.next() {
        Some(first) => widths.any(|width| width != first),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryVersionStore;
    use crate::unit::MigrationUnit;
    use async_trait::async_trait;

    struct Noop(&'static str);

    #[async_trait]
    impl MigrationUnit for Noop {
        fn version(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "noop"
        }

        async fn up(&mut self, journal: &mut UnitJournal) -> MigrationResult<()> {
            journal.feedback(format!("up {}", self.0));
            Ok(())
        }
    }

    fn unit(version: &'static str, path: &str) -> Migration {
        Migration::new(Box::new(Noop(version)))
            .unwrap()
            .with_source_path(path)
    }

    fn versions(units: &[Migration]) -> Vec<&str> {
        units.iter().map(|u| u.version().as_str()).collect()
    }

    #[test]
    fn test_add_units_sorts_and_keeps_first() {
        let mut migrator = Migrator::new(Arc::new(MemoryVersionStore::new()));
        migrator.add_units(vec![unit("300", "c"), unit("100", "a")]);
        migrator.add_units(vec![unit("200", "b"), unit("100", "other/a")]);

        assert_eq!(versions(migrator.all_units()), vec!["100", "200", "300"]);
        assert_eq!(migrator.all_units()[0].source_path(), "a");
    }

    #[test]
    fn test_mixed_version_widths_detected() {
        assert!(mixed_version_widths(&[unit("99", "a"), unit("100", "b")]));
        assert!(!mixed_version_widths(&[unit("100", "a"), unit("200", "b")]));
        assert!(!mixed_version_widths(&[]));

        let mut migrator = Migrator::new(Arc::new(MemoryVersionStore::new()));
        migrator.add_units(vec![unit("99", "a"), unit("100", "b")]);
        assert_eq!(versions(migrator.all_units()), vec!["100", "99"]);
    }

    #[tokio::test]
    async fn test_pending_is_cached() {
        let store = Arc::new(MemoryVersionStore::new());
        let mut migrator = Migrator::new(store.clone()).with_units(vec![unit("100", "a")]);

        assert_eq!(migrator.pending_versions().await.unwrap().len(), 1);

        store
            .append(&Version::parse("100").unwrap(), Direction::Up, "a")
            .await
            .unwrap();
        migrator.add_units(vec![unit("200", "b")]);

        let pending = migrator.pending_versions().await.unwrap();
        assert_eq!(pending, vec![Version::parse("100").unwrap()]);
        assert_eq!(migrator.current_version().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_status_flags() {
        let store = Arc::new(MemoryVersionStore::new());
        store
            .append(&Version::parse("100").unwrap(), Direction::Up, "a")
            .await
            .unwrap();
        let mut migrator = Migrator::new(store).with_units(vec![unit("100", "a"), unit("200", "b")]);

        let status = migrator.status().await.unwrap();
        assert!(!status[0].pending);
        assert!(status[1].pending);
        assert_eq!(status[1].info.source_path, "b");
    }

    #[tokio::test]
    async fn test_unknown_versions_are_ignored() {
        let mut migrator =
            Migrator::new(Arc::new(MemoryVersionStore::new())).with_units(vec![unit("100", "a")]);

        let report = migrator.up(&[Version::parse("999").unwrap()]).await.unwrap();
        assert!(report.outcomes.is_empty());
        assert!(migrator.all_feedback().is_empty());
    }
}
