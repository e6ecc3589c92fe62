#![allow(dead_code)]

use async_trait::async_trait;
use elif_migrator::backends::{DatabasePool, DatabaseRow, DatabaseValue, SqlDialect};
use elif_migrator::{
    Direction, MemoryVersionStore, Migration, MigrationError, MigrationResult, MigrationUnit,
    UnitJournal, Version, VersionLogEntry, VersionStore,
};
use std::sync::{Arc, Mutex};

/// Shared record of which unit methods ran, e.g. `"up 100"`
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    /// Push an error line to the journal and return Ok
    ReportError,
    /// Return Err from the method
    Fail,
}

/// Test unit whose behavior is chosen per direction
pub struct ScriptedUnit {
    version: String,
    up: Behavior,
    down: Option<Behavior>,
    calls: CallLog,
}

impl ScriptedUnit {
    pub fn new(version: &str, calls: &CallLog) -> Self {
        Self {
            version: version.to_string(),
            up: Behavior::Succeed,
            down: Some(Behavior::Succeed),
            calls: calls.clone(),
        }
    }

    pub fn up_behavior(mut self, behavior: Behavior) -> Self {
        self.up = behavior;
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.down = None;
        self
    }

    pub fn into_migration(self) -> Migration {
        let path = format!("migrations/Migration{}.rs", self.version);
        Migration::new(Box::new(self)).unwrap().with_source_path(path)
    }

    fn run(&self, direction: &str, behavior: Behavior, journal: &mut UnitJournal) -> MigrationResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", direction, self.version));

        match behavior {
            Behavior::Succeed => {
                journal.feedback(format!("{} {} done", direction, self.version));
                Ok(())
            }
            Behavior::ReportError => {
                journal.error(format!("{} {} reported a problem", direction, self.version));
                Ok(())
            }
            Behavior::Fail => Err(MigrationError::Database(format!(
                "{} {} exploded",
                direction, self.version
            ))),
        }
    }
}

#[async_trait]
impl MigrationUnit for ScriptedUnit {
    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        "scripted test unit"
    }

    fn author(&self) -> &str {
        "tests"
    }

    async fn up(&mut self, journal: &mut UnitJournal) -> MigrationResult<()> {
        self.run("up", self.up, journal)
    }

    async fn down(&mut self, journal: &mut UnitJournal) -> MigrationResult<()> {
        match self.down {
            Some(behavior) => self.run("down", behavior, journal),
            None => Err(MigrationError::Irreversible {
                version: self.version.clone(),
            }),
        }
    }
}

pub fn calls() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn v(token: &str) -> Version {
    Version::parse(token).unwrap()
}

pub fn units(versions: &[&str], calls: &CallLog) -> Vec<Migration> {
    versions
        .iter()
        .map(|version| ScriptedUnit::new(version, calls).into_migration())
        .collect()
}

pub fn log_of(history: &[VersionLogEntry]) -> Vec<(String, Direction)> {
    history
        .iter()
        .map(|entry| (entry.version.to_string(), entry.action))
        .collect()
}

/// Memory store whose appends fail for one version
pub struct FailingStore {
    inner: MemoryVersionStore,
    reject: Version,
}

impl FailingStore {
    pub fn rejecting(version: &str) -> Self {
        Self {
            inner: MemoryVersionStore::new(),
            reject: v(version),
        }
    }
}

#[async_trait]
impl VersionStore for FailingStore {
    async fn ensure_schema(&self) -> MigrationResult<()> {
        self.inner.ensure_schema().await
    }

    async fn current_version(&self) -> MigrationResult<Option<Version>> {
        self.inner.current_version().await
    }

    async fn append(&self, version: &Version, action: Direction, path: &str) -> MigrationResult<()> {
        if *version == self.reject {
            return Err(MigrationError::Persistence(format!(
                "duplicate key value for version {}",
                version
            )));
        }
        self.inner.append(version, action, path).await
    }

    async fn history(&self) -> MigrationResult<Vec<VersionLogEntry>> {
        self.inner.history().await
    }
}

/// Pool that accepts every statement and returns no rows
pub struct NullPool;

#[async_trait]
impl DatabasePool for NullPool {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn execute(&self, _sql: &str, _params: &[DatabaseValue]) -> MigrationResult<u64> {
        Ok(0)
    }

    async fn fetch_all(
        &self,
        _sql: &str,
        _params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>> {
        Ok(Vec::new())
    }

    async fn fetch_optional(
        &self,
        _sql: &str,
        _params: &[DatabaseValue],
    ) -> MigrationResult<Option<Box<dyn DatabaseRow>>> {
        Ok(None)
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> MigrationResult<u64> {
        Ok(statements.len() as u64)
    }

    async fn close(&self) -> MigrationResult<()> {
        Ok(())
    }
}
