//! Per-guest facility sub-entitlement

use serde::{Deserialize, Serialize};

/// A sub-entitlement attached to a guest (meal pass, parking, ...) with its
/// own usage counter, scoped to guest + event + ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub guest_uuid: String,
    pub event_id: i64,
    pub ticket_id: i64,
    pub facility_id: i64,
    pub name: String,
    pub available_scans: u32,
    pub check_in: u32,
    pub synced: bool,
}

impl Facility {
    /// True when no scans remain on this facility
    pub fn is_exhausted(&self) -> bool {
        self.check_in >= self.available_scans
    }
}
