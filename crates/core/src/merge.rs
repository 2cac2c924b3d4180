//! Reconciliation of remote, local, and recently-observed guest state
//!
//! Three sources can disagree about a guest: the remote API (authoritative
//! for identity, possibly stale on counts), the local cached ticket
//! (authoritative for offline mutations), and the in-process scan cache
//! (ahead of both under propagation lag). `merge_guest` folds them into the
//! single view the UI renders. Max entry count wins and the merge never
//! decreases `used_entries` below any source.

use crate::models::{Ticket, STATUS_CHECKED_IN};
use crate::remote::RemoteGuest;
use crate::scan_cache::ObservedScan;

/// The authoritative guest view after reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct GuestView {
    pub guest_id: i64,
    pub ticket_id: i64,
    pub qr_code: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: String,
    pub total_entries: u32,
    pub used_entries: u32,
}

/// Merge the three sources into one guest view.
///
/// Identity and contact fields come from `remote`. Entry counts follow the
/// max-wins rule; status follows whichever source produced the winning
/// count, and becomes checked-in if any contributing source says so.
pub fn merge_guest(
    remote: &RemoteGuest,
    local: Option<&Ticket>,
    cached: Option<&ObservedScan>,
) -> GuestView {
    let mut used_entries = remote.used_entries;
    let mut total_entries = remote.total_entries;
    let mut status = remote.status.clone();

    // The in-process cache has seen a newer check-in than the server reports
    if let Some(scan) = cached {
        if scan.used_entries > used_entries {
            used_entries = scan.used_entries;
            status = scan.status.clone();
            if scan.total_entries > 0 {
                total_entries = scan.total_entries;
            }
        }
    }

    if let Some(ticket) = local {
        let local_checked_in =
            ticket.used_entries > 0 || ticket.status == STATUS_CHECKED_IN;
        if local_checked_in && ticket.used_entries > used_entries {
            used_entries = ticket.used_entries;
            status = ticket.status.clone();
            if ticket.total_entries > 0 {
                total_entries = ticket.total_entries;
            }
        }
        if local_checked_in && status != STATUS_CHECKED_IN && used_entries > 0 {
            status = STATUS_CHECKED_IN.to_string();
        }
    }

    GuestView {
        guest_id: remote.guest_id,
        ticket_id: remote.ticket_id,
        qr_code: remote.qr_code.clone(),
        name: remote.name.clone(),
        email: remote.email.clone(),
        phone: remote.phone.clone(),
        status,
        total_entries,
        used_entries,
    }
}
