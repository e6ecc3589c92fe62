//! In-process version log

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{VersionLogEntry, VersionStore};
use crate::error::MigrationResult;
use crate::version::{Direction, Version};

/// [`VersionStore`] holding the log in memory
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    entries: Mutex<Vec<VersionLogEntry>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with existing entries
    pub fn with_entries(entries: Vec<VersionLogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn ensure_schema(&self) -> MigrationResult<()> {
        Ok(())
    }

    async fn current_version(&self) -> MigrationResult<Option<Version>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .max_by_key(|entry| (entry.timestamp, entry.id))
            .map(|entry| entry.version.clone()))
    }

    async fn append(&self, version: &Version, action: Direction, path: &str) -> MigrationResult<()> {
        let mut entries = self.entries.lock().await;
        let id = entries.iter().map(|entry| entry.id).max().unwrap_or(0) + 1;
        entries.push(VersionLogEntry {
            id,
            version: version.clone(),
            timestamp: Utc::now(),
            action,
            path: path.to_string(),
        });
        Ok(())
    }

    async fn history(&self) -> MigrationResult<Vec<VersionLogEntry>> {
        let mut entries = self.entries.lock().await.clone();
        entries.sort_by_key(|entry| (entry.timestamp, entry.id));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn version(token: &str) -> Version {
        Version::parse(token).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_is_uninitialized() {
        let store = MemoryVersionStore::new();
        store.ensure_schema().await.unwrap();
        assert_eq!(store.current_version().await.unwrap(), None);
        assert!(store.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_entry_wins() {
        let store = MemoryVersionStore::new();
        store.append(&version("100"), Direction::Up, "a").await.unwrap();
        store.append(&version("200"), Direction::Up, "b").await.unwrap();
        store.append(&version("200"), Direction::Down, "b").await.unwrap();
        store.append(&version("100"), Direction::Down, "a").await.unwrap();

        assert_eq!(store.current_version().await.unwrap(), Some(version("100")));

        let ids: Vec<i64> = store.history().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_ordering_uses_timestamp_before_id() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryVersionStore::with_entries(vec![
            VersionLogEntry {
                id: 1,
                version: version("300"),
                timestamp: earlier + Duration::hours(1),
                action: Direction::Up,
                path: "c".to_string(),
            },
            VersionLogEntry {
                id: 2,
                version: version("100"),
                timestamp: earlier,
                action: Direction::Up,
                path: "a".to_string(),
            },
        ]);

        assert_eq!(store.current_version().await.unwrap(), Some(version("300")));
        assert_eq!(store.history().await.unwrap()[0].version, version("100"));
    }
}
