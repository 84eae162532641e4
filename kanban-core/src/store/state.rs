//! Shared store plumbing: loading/error status, change feed, simulated latency

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::{DomainError, DomainResult};

/// `isLoading` / `error` pair every store exposes to the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub is_loading: bool,
    pub error: Option<String>,
}

impl StoreStatus {
    /// Record how an action ended; success clears the previous error
    pub fn finish<T>(&mut self, result: &DomainResult<T>) {
        self.is_loading = false;
        self.error = result.as_ref().err().map(ToString::to_string);
    }
}

/// Marks a latency-bound action as running.
///
/// Only one action runs at a time; the marker is released when the
/// returned guard drops, including when the action future is cancelled.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    pub fn enter(&self) -> DomainResult<InFlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DomainError::Conflict("operation already in progress".to_string()))?;
        Ok(InFlightGuard(&self.0))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[must_use = "the action counts as running only while the guard is alive"]
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Monotonic change counter observers can wait on
pub struct ChangeFeed {
    tx: watch::Sender<u64>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    pub fn bump(&self) {
        self.tx.send_modify(|version| *version += 1);
    }

    pub fn version(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed delay standing in for network round-trips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Latency(Duration);

impl Latency {
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub fn none() -> Self {
        Self(Duration::ZERO)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub async fn wait(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}
