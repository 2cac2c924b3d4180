//! Pending check-in event log entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A locally recorded check-in awaiting upload to the remote API.
///
/// At most one pending event exists per guest UUID (insert-if-absent);
/// `synced` flips to true only after the API explicitly confirms the upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinEvent {
    pub event_id: i64,
    pub qr_guest_uuid: String,
    pub qr_ticket_id: i64,
    pub check_in_count: u32,
    pub given_check_in_time: DateTime<Utc>,
    pub synced: bool,
}

impl CheckinEvent {
    pub fn new(event_id: i64, qr_guest_uuid: String, qr_ticket_id: i64, check_in_count: u32) -> Self {
        Self {
            event_id,
            qr_guest_uuid,
            qr_ticket_id,
            check_in_count,
            given_check_in_time: Utc::now(),
            synced: false,
        }
    }
}
