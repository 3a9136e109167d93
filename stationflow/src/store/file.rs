//! Durable state store on the local filesystem.
//!
//! Layout: `<root>/<session id>/<station id>.json`. Writes go to a temporary
//! sibling first and are renamed into place, so readers never observe a
//! partially written payload.

use super::StateStore;
use crate::core::{Payload, SessionId};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const EXTENSION: &str = "json";

/// A state store that keeps one JSON file per (session, station) key.
#[derive(Debug)]
pub struct FileStateStore {
    root: PathBuf,
    // Serializes the check-then-write in `put`.
    write_lock: Mutex<()>,
}

impl FileStateStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session: SessionId) -> PathBuf {
        self.root.join(session.to_string())
    }

    fn entry_path(&self, session: SessionId, station: &str) -> PathBuf {
        self.session_dir(session).join(format!("{station}.{EXTENSION}"))
    }

    async fn read_entry(&self, session: SessionId, station: &str) -> Result<Option<Payload>, StoreError> {
        match fs::read(self.entry_path(session, station)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn put(&self, session: SessionId, station: &str, payload: Payload) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.read_entry(session, station).await? {
            if existing == payload {
                return Ok(());
            }
            return Err(StoreError::Conflict {
                session,
                station: station.to_string(),
            });
        }

        fs::create_dir_all(self.session_dir(session)).await?;

        let path = self.entry_path(session, station);
        let staging = path.with_extension(format!("{EXTENSION}.tmp"));
        let bytes = serde_json::to_vec_pretty(&payload)?;
        fs::write(&staging, bytes).await?;
        fs::rename(&staging, &path).await?;

        tracing::trace!(session = %session, station = station, path = %path.display(), "Wrote station output");
        Ok(())
    }

    async fn get(&self, session: SessionId, station: &str) -> Result<Payload, StoreError> {
        self.read_entry(session, station)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                session,
                station: station.to_string(),
            })
    }

    async fn contains(&self, session: SessionId, station: &str) -> Result<bool, StoreError> {
        Ok(fs::try_exists(self.entry_path(session, station)).await?)
    }

    async fn session_entries(&self, session: SessionId) -> Result<BTreeMap<String, Payload>, StoreError> {
        let mut entries = BTreeMap::new();
        let mut dir = match fs::read_dir(self.session_dir(session)).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(entries),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(station) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = fs::read(&path).await?;
            entries.insert(station.to_string(), serde_json::from_slice(&bytes)?);
        }

        Ok(entries)
    }

    async fn purge_session(&self, session: SessionId) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let count = self.session_entries(session).await?.len();

        match fs::remove_dir_all(self.session_dir(session)).await {
            Ok(()) => Ok(count),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_writes_json_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let session = SessionId::new();

        store.put(session, "energy", json!({"ratings": [1, 2]})).await.unwrap();

        let path = dir.path().join(session.to_string()).join("energy.json");
        assert!(path.exists());
        assert_eq!(store.get(session, "energy").await.unwrap(), json!({"ratings": [1, 2]}));
        assert!(store.contains(session, "energy").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let session = SessionId::new();

        assert!(!store.contains(session, "a").await.unwrap());
        assert!(matches!(
            store.get(session, "a").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(store.session_entries(session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conflicting_write_keeps_original() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let session = SessionId::new();

        store.put(session, "a", json!("first")).await.unwrap();
        store.put(session, "a", json!("first")).await.unwrap();
        assert!(matches!(
            store.put(session, "a", json!("second")).await.unwrap_err(),
            StoreError::Conflict { .. }
        ));
        assert_eq!(store.get(session, "a").await.unwrap(), json!("first"));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let session = SessionId::new();

        {
            let store = FileStateStore::new(dir.path());
            store.put(session, "a", json!(1)).await.unwrap();
            store.put(session, "b", json!(2)).await.unwrap();
        }

        let reopened = FileStateStore::new(dir.path());
        let entries = reopened.session_entries(session).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["a"], json!(1));
        assert_eq!(entries["b"], json!(2));
    }

    #[tokio::test]
    async fn test_purge_session() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let kept = SessionId::new();
        let purged = SessionId::new();

        store.put(kept, "a", json!(1)).await.unwrap();
        store.put(purged, "a", json!(1)).await.unwrap();

        assert_eq!(store.purge_session(purged).await.unwrap(), 1);
        assert_eq!(store.purge_session(purged).await.unwrap(), 0);
        assert!(store.contains(kept, "a").await.unwrap());
    }
}
