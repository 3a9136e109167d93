//! In-memory state store.

use super::StateStore;
use crate::core::{Payload, SessionId};
use crate::errors::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

/// A state store backed by a concurrent map of per-session partitions.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    sessions: DashMap<SessionId, HashMap<String, Payload>>,
}

impl InMemoryStateStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of sessions with at least one entry.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, session: SessionId, station: &str, payload: Payload) -> Result<(), StoreError> {
        let mut partition = self.sessions.entry(session).or_default();

        if let Some(existing) = partition.get(station) {
            if *existing == payload {
                return Ok(());
            }
            return Err(StoreError::Conflict {
                session,
                station: station.to_string(),
            });
        }

        partition.insert(station.to_string(), payload);
        Ok(())
    }

    async fn get(&self, session: SessionId, station: &str) -> Result<Payload, StoreError> {
        self.sessions
            .get(&session)
            .and_then(|partition| partition.get(station).cloned())
            .ok_or_else(|| StoreError::NotFound {
                session,
                station: station.to_string(),
            })
    }

    async fn contains(&self, session: SessionId, station: &str) -> Result<bool, StoreError> {
        Ok(self
            .sessions
            .get(&session)
            .is_some_and(|partition| partition.contains_key(station)))
    }

    async fn session_entries(&self, session: SessionId) -> Result<BTreeMap<String, Payload>, StoreError> {
        Ok(self
            .sessions
            .get(&session)
            .map(|partition| {
                partition
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn purge_session(&self, session: SessionId) -> Result<usize, StoreError> {
        Ok(self
            .sessions
            .remove(&session)
            .map_or(0, |(_, partition)| partition.len()))
    }
}
