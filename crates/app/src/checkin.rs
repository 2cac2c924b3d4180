//! Offline scan flow
//!
//! The local path from a scanned QR code to a recorded, cached, announced
//! check-in. Also implements the validation seam host mode hands to the
//! session server, so network scans run through the exact same mutation
//! point as local ones.

use std::sync::{Arc, Mutex};

use gatecheck_core::{
    CheckInOutcome, CheckinEvent, Database, FacilityOutcome, ScanCache, Ticket,
};
use gatecheck_net::{NetTicket, ScanOutcome, ScanRequest, ScanValidator};
use tracing::{info, warn};

use crate::error::Result;
use crate::events::{AppEvent, EventBus};
use crate::state::lock_store;

/// Executes check-ins against the local store
pub struct CheckinFlow {
    db: Arc<Mutex<Database>>,
    cache: ScanCache,
    bus: EventBus,
}

impl CheckinFlow {
    pub fn new(db: Arc<Mutex<Database>>, cache: ScanCache, bus: EventBus) -> Self {
        Self { db, cache, bus }
    }

    /// Validate and apply one scan.
    ///
    /// On admission the pending check-in is recorded for upload, the scan
    /// cache updated, and an event emitted. Rejections leave no trace beyond
    /// a log line.
    pub fn scan(&self, qr_code: &str) -> Result<CheckInOutcome> {
        let db = lock_store(&self.db)?;
        let outcome = db.tickets().check_in(qr_code)?;

        if let CheckInOutcome::Admitted(ticket) = &outcome {
            let event = CheckinEvent::new(
                ticket.event_id,
                ticket.qr_code.clone(),
                ticket.ticket_id,
                ticket.used_entries,
            );
            db.checkins().record(&event)?;
            drop(db);

            self.cache.record(
                &ticket.qr_code,
                ticket.used_entries,
                ticket.total_entries,
                &ticket.status,
            );
            self.bus.emit(AppEvent::ManualCheckIn {
                guest_uuid: ticket.qr_code.clone(),
                used_entries: ticket.used_entries,
                total_entries: ticket.total_entries,
            });
            info!(guest = %ticket.qr_code, used = ticket.used_entries, "Check-in recorded");
        }

        Ok(outcome)
    }

    /// Validate and consume one facility scan for a guest.
    ///
    /// Same check-then-increment discipline as entry scans; granted uses are
    /// marked unsynced for the next upload.
    pub fn use_facility(
        &self,
        guest_uuid: &str,
        event_id: i64,
        facility_id: i64,
    ) -> Result<FacilityOutcome> {
        let db = lock_store(&self.db)?;
        let outcome = db.facilities().record_use(guest_uuid, event_id, facility_id)?;

        if let FacilityOutcome::Granted(f) = &outcome {
            info!(
                guest = %f.guest_uuid,
                facility = f.facility_id,
                used = f.check_in,
                "Facility scan recorded"
            );
        }

        Ok(outcome)
    }
}

impl ScanValidator for CheckinFlow {
    fn validate_scan(&self, request: &ScanRequest) -> ScanOutcome {
        match self.scan(&request.guest_uuid) {
            Ok(CheckInOutcome::Admitted(t)) => ScanOutcome::Admitted(to_net_ticket(&t)),
            Ok(CheckInOutcome::AlreadyScanned(t)) => ScanOutcome::AlreadyScanned(to_net_ticket(&t)),
            Ok(CheckInOutcome::NotFound) => ScanOutcome::NotFound,
            Err(e) => {
                warn!(guest = %request.guest_uuid, error = %e, "Scan validation failed");
                ScanOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Ticket state as shared over the session protocol
pub fn to_net_ticket(ticket: &Ticket) -> NetTicket {
    NetTicket {
        event_id: ticket.event_id,
        guest_id: ticket.guest_id,
        ticket_id: ticket.ticket_id,
        qr_code: ticket.qr_code.clone(),
        name: ticket.name.clone(),
        email: ticket.email.clone(),
        phone: ticket.phone.clone(),
        status: ticket.status.clone(),
        total_entries: ticket.total_entries,
        used_entries: ticket.used_entries,
    }
}

/// Local ticket row from a broadcast. Validation already happened on the
/// host, so the row counts as synced state, not a pending change.
pub fn from_net_ticket(ticket: &NetTicket) -> Ticket {
    Ticket {
        event_id: ticket.event_id,
        guest_id: ticket.guest_id,
        ticket_id: ticket.ticket_id,
        qr_code: ticket.qr_code.clone(),
        name: ticket.name.clone(),
        email: ticket.email.clone(),
        phone: ticket.phone.clone(),
        status: ticket.status.clone(),
        total_entries: ticket.total_entries,
        used_entries: ticket.used_entries,
        synced: true,
    }
}
