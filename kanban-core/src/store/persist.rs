//! Snapshot persistence for stores mirrored to device storage
//!
//! Snapshots are wrapped as `{ "version": N, "state": ... }`. Anything that
//! does not parse as the current version is dropped and the store starts
//! empty.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::DomainResult;
use crate::repository::KeyValueStore;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, S> {
    version: u32,
    state: &'a S,
}

#[derive(Deserialize)]
struct Envelope<S> {
    version: u32,
    state: S,
}

pub struct PersistedSlot<S> {
    key: &'static str,
    storage: Arc<dyn KeyValueStore>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: Serialize + DeserializeOwned> PersistedSlot<S> {
    pub fn new(key: &'static str, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            key,
            storage,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub async fn load(&self) -> Option<S> {
        let raw = match self.storage.get(self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "failed to read snapshot");
                return None;
            }
        };

        match serde_json::from_str::<Envelope<S>>(&raw) {
            Ok(envelope) if envelope.version == SNAPSHOT_VERSION => Some(envelope.state),
            Ok(envelope) => {
                tracing::warn!(key = self.key, version = envelope.version, "discarding snapshot from another version");
                None
            }
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "discarding unreadable snapshot");
                None
            }
        }
    }

    pub async fn save(&self, state: &S) -> DomainResult<()> {
        let raw = serde_json::to_string(&EnvelopeRef {
            version: SNAPSHOT_VERSION,
            state,
        })?;
        self.storage.set(self.key, &raw).await
    }
}
