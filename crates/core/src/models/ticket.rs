//! Cached guest/ticket record

use serde::{Deserialize, Serialize};

/// Canonical status for a guest who has not been admitted yet
pub const STATUS_REGISTERED: &str = "registered";

/// Canonical status for a guest with at least one consumed entry
pub const STATUS_CHECKED_IN: &str = "checked_in";

/// A single admission right, cached locally from the remote catalog.
///
/// `qr_code` is the guest-scoped UUID encoded in the guest's QR code and is
/// unique within the store. `synced` is false whenever the row carries a
/// local mutation the remote API has not acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub event_id: i64,
    pub guest_id: i64,
    pub ticket_id: i64,
    pub qr_code: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: String,
    pub total_entries: u32,
    pub used_entries: u32,
    pub synced: bool,
}

impl Ticket {
    /// True when every entry on this ticket has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.used_entries >= self.total_entries
    }

    /// Entries still available on this ticket
    pub fn remaining_entries(&self) -> u32 {
        self.total_entries.saturating_sub(self.used_entries)
    }
}
