//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, future network backend).

use crate::error::Result;
use crate::models::{CheckinEvent, EventSummary, Facility, Ticket};

use super::facilities::FacilityOutcome;
use super::tickets::CheckInOutcome;

/// Ticket catalog operations
pub trait TicketRepository {
    /// Replace an event's cached catalog; returns the stale-row prune count
    fn bulk_replace_tickets(&self, event_id: i64, tickets: &[Ticket]) -> Result<usize>;

    /// Find a ticket by QR code
    fn find_ticket_by_qr_code(&self, qr_code: &str) -> Result<Option<Ticket>>;

    /// Validate and apply one check-in
    fn check_in_ticket(&self, qr_code: &str) -> Result<CheckInOutcome>;

    /// Apply a host-authoritative broadcast (monotonic)
    fn apply_observed_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// List cached tickets for an event
    fn list_tickets_for_event(&self, event_id: i64) -> Result<Vec<Ticket>>;

    /// Dashboard aggregates for an event
    fn event_summary(&self, event_id: i64) -> Result<EventSummary>;
}

/// Pending check-in log operations
pub trait CheckinRepository {
    /// Record a pending check-in (insert-if-absent); true when inserted
    fn record_check_in(&self, event: &CheckinEvent) -> Result<bool>;

    /// List pending check-ins for an event
    fn list_unsynced_checkins(&self, event_id: i64) -> Result<Vec<CheckinEvent>>;

    /// Mark the given guests' check-ins as confirmed by the remote API
    fn mark_checkins_synced(&self, guest_uuids: &[String]) -> Result<usize>;
}

/// Facility sub-entitlement operations
pub trait FacilityRepository {
    /// Refresh a guest's facilities from a remote snapshot
    fn replace_facilities_for_guest(
        &self,
        guest_uuid: &str,
        event_id: i64,
        ticket_id: i64,
        facilities: &[Facility],
    ) -> Result<()>;

    /// Validate and consume one facility scan
    fn record_facility_use(
        &self,
        guest_uuid: &str,
        event_id: i64,
        facility_id: i64,
    ) -> Result<FacilityOutcome>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or network.
pub trait Storage: TicketRepository + CheckinRepository + FacilityRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: TicketRepository + CheckinRepository + FacilityRepository {}
