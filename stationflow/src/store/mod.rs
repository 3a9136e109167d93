//! Per-session storage of station outputs.
//!
//! The key space is partitioned by session id. Each (session, station) key
//! is written exactly once, when the station succeeds; repeating the write
//! with an identical payload is a no-op and a different payload is a
//! conflict.

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::InMemoryStateStore;

use crate::core::{Payload, SessionId};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Storage backend for station outputs.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Writes a station's output.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a different payload is already
    /// stored under the key.
    async fn put(&self, session: SessionId, station: &str, payload: Payload) -> Result<(), StoreError>;

    /// Reads a station's output.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored under the key.
    async fn get(&self, session: SessionId, station: &str) -> Result<Payload, StoreError>;

    /// Returns true if an output is stored under the key.
    async fn contains(&self, session: SessionId, station: &str) -> Result<bool, StoreError>;

    /// Returns every output stored for the session, keyed by station id.
    async fn session_entries(&self, session: SessionId) -> Result<BTreeMap<String, Payload>, StoreError>;

    /// Removes every output stored for the session. Returns how many were removed.
    async fn purge_session(&self, session: SessionId) -> Result<usize, StoreError>;
}
