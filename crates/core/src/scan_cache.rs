//! In-memory recent-scan cache
//!
//! Process-wide fast path for "what has this device seen happen to a guest",
//! fed by local scans and network broadcasts. Never persisted; the Local
//! Store remains the durable source. Entries live for the process lifetime,
//! bounded by the guest list size of the event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// The most recently observed check-in state for one guest
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedScan {
    pub used_entries: u32,
    pub total_entries: u32,
    pub status: String,
    pub observed_at: DateTime<Utc>,
}

/// Shared handle to the scan cache.
///
/// Explicitly owned and cloned into every component that needs it (scan flow
/// and network handlers) rather than living as ambient global state. Each
/// update path writes through `record`; everything else is read-only.
#[derive(Debug, Clone, Default)]
pub struct ScanCache {
    inner: Arc<DashMap<String, ObservedScan>>,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed check-in, unconditionally overwriting any previous
    /// entry and stamping the current time.
    pub fn record(&self, guest_id: &str, used_entries: u32, total_entries: u32, status: &str) {
        self.inner.insert(
            guest_id.to_string(),
            ObservedScan {
                used_entries,
                total_entries,
                status: status.to_string(),
                observed_at: Utc::now(),
            },
        );
    }

    /// Most recent observation for a guest, if any
    pub fn get(&self, guest_id: &str) -> Option<ObservedScan> {
        self.inner.get(guest_id).map(|entry| entry.clone())
    }

    /// Number of guests observed so far
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
