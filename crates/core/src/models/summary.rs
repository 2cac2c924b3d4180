//! Per-event dashboard aggregates

use serde::{Deserialize, Serialize};

/// Read-only aggregates over the cached tickets of one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: i64,
    pub total_guests: u64,
    pub checked_in_guests: u64,
    pub total_entries: u64,
    pub used_entries: u64,
}
