//! SQLite storage layer for GateCheck

mod checkins;
mod facilities;
mod migrations;
mod parse;
mod tickets;
mod traits;

use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

use crate::error::Result;
use crate::models::{CheckinEvent, EventSummary, Facility, Ticket};

pub use checkins::CheckinStore;
pub use facilities::{FacilityOutcome, FacilityStore};
pub use tickets::{CheckInOutcome, TicketStore};
pub use traits::{CheckinRepository, FacilityRepository, Storage, TicketRepository};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        migrations::get_current_version(&self.conn).unwrap_or(0)
    }

    /// Get ticket store
    pub fn tickets(&self) -> TicketStore<'_> {
        TicketStore::new(&self.conn)
    }

    /// Get check-in event store
    pub fn checkins(&self) -> CheckinStore<'_> {
        CheckinStore::new(&self.conn)
    }

    /// Get facility store
    pub fn facilities(&self) -> FacilityStore<'_> {
        FacilityStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl TicketRepository for Database {
    fn bulk_replace_tickets(&self, event_id: i64, tickets: &[Ticket]) -> Result<usize> {
        self.tickets().bulk_replace(event_id, tickets)
    }

    fn find_ticket_by_qr_code(&self, qr_code: &str) -> Result<Option<Ticket>> {
        self.tickets().find_by_qr_code(qr_code)
    }

    fn check_in_ticket(&self, qr_code: &str) -> Result<CheckInOutcome> {
        self.tickets().check_in(qr_code)
    }

    fn apply_observed_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.tickets().apply_observed(ticket)
    }

    fn list_tickets_for_event(&self, event_id: i64) -> Result<Vec<Ticket>> {
        self.tickets().list_for_event(event_id)
    }

    fn event_summary(&self, event_id: i64) -> Result<EventSummary> {
        self.tickets().event_summary(event_id)
    }
}

impl CheckinRepository for Database {
    fn record_check_in(&self, event: &CheckinEvent) -> Result<bool> {
        self.checkins().record(event)
    }

    fn list_unsynced_checkins(&self, event_id: i64) -> Result<Vec<CheckinEvent>> {
        self.checkins().list_unsynced(event_id)
    }

    fn mark_checkins_synced(&self, guest_uuids: &[String]) -> Result<usize> {
        self.checkins().mark_synced(guest_uuids)
    }
}

impl FacilityRepository for Database {
    fn replace_facilities_for_guest(
        &self,
        guest_uuid: &str,
        event_id: i64,
        ticket_id: i64,
        facilities: &[Facility],
    ) -> Result<()> {
        self.facilities()
            .replace_for_guest(guest_uuid, event_id, ticket_id, facilities)
    }

    fn record_facility_use(
        &self,
        guest_uuid: &str,
        event_id: i64,
        facility_id: i64,
    ) -> Result<FacilityOutcome> {
        self.facilities().record_use(guest_uuid, event_id, facility_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.schema_version() >= 2);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatecheck.db");

        {
            let db = Database::open(&path).unwrap();
            db.tickets()
                .bulk_replace(
                    1,
                    &[Ticket {
                        event_id: 1,
                        guest_id: 1,
                        ticket_id: 1,
                        qr_code: "persist".into(),
                        name: "Guest".into(),
                        email: String::new(),
                        phone: String::new(),
                        status: "registered".into(),
                        total_entries: 1,
                        used_entries: 0,
                        synced: true,
                    }],
                )
                .unwrap();
        }

        // Reopen and verify durability
        let db = Database::open(&path).unwrap();
        assert!(db.tickets().find_by_qr_code("persist").unwrap().is_some());
    }
}
