//! Ticket storage operations
//!
//! The cached copy of the remote guest catalog, plus the single mutation
//! point every check-in path goes through.

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::error::Result;
use crate::models::{EventSummary, Ticket, STATUS_CHECKED_IN};

use super::parse::OptionalExt;

/// Outcome of running a scan through the validation/mutation point
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    /// An entry was consumed; carries the updated ticket
    Admitted(Ticket),
    /// Every entry already consumed; carries the unchanged ticket
    AlreadyScanned(Ticket),
    /// No ticket with that QR code exists locally
    NotFound,
}

pub struct TicketStore<'a> {
    conn: &'a Connection,
}

impl<'a> TicketStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Replace the cached catalog for an event from a remote snapshot.
    ///
    /// Transactional: rows are upserted keyed by `qr_code`, and rows of this
    /// event whose `qr_code` is absent from the snapshot are pruned. Returns
    /// the number of stale rows removed. Any failure rolls back the whole
    /// batch, leaving prior state intact.
    pub fn bulk_replace(&self, event_id: i64, tickets: &[Ticket]) -> Result<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let removed = if tickets.is_empty() {
            tx.execute("DELETE FROM tickets WHERE event_id = ?1", params![event_id])?
        } else {
            let placeholders = vec!["?"; tickets.len()].join(", ");
            let sql = format!(
                "DELETE FROM tickets WHERE event_id = ?1 AND qr_code NOT IN ({placeholders})"
            );
            let mut stmt = tx.prepare(&sql)?;
            let mut args: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(tickets.len() + 1);
            args.push(&event_id);
            for t in tickets {
                args.push(&t.qr_code);
            }
            stmt.execute(args.as_slice())?
        };

        for t in tickets {
            tx.execute(
                "INSERT OR REPLACE INTO tickets
                 (event_id, guest_id, ticket_id, name, email, phone, qr_code,
                  status, total_entries, used_entries, synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    t.event_id,
                    t.guest_id,
                    t.ticket_id,
                    t.name,
                    t.email,
                    t.phone,
                    t.qr_code,
                    t.status,
                    t.total_entries,
                    t.used_entries,
                    t.synced as i32,
                ],
            )?;
        }

        tx.commit()?;
        debug!(event_id, upserted = tickets.len(), removed, "Catalog replaced");
        Ok(removed)
    }

    /// Look up a ticket by its QR code (guest UUID)
    pub fn find_by_qr_code(&self, qr_code: &str) -> Result<Option<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, guest_id, ticket_id, name, email, phone, qr_code,
                    status, total_entries, used_entries, synced
             FROM tickets WHERE qr_code = ?1",
        )?;

        let ticket = stmt
            .query_row(params![qr_code], map_ticket)
            .optional()?;

        Ok(ticket)
    }

    /// Validate and apply one check-in. The single mutation point shared by
    /// the offline scan path and the host scan handler.
    ///
    /// The check-then-increment pair runs inside an IMMEDIATE transaction so
    /// admission stays at-most-once even when scans arrive from concurrent
    /// connections on a multi-threaded runtime.
    pub fn check_in(&self, qr_code: &str) -> Result<CheckInOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let ticket = tx
            .query_row(
                "SELECT event_id, guest_id, ticket_id, name, email, phone, qr_code,
                        status, total_entries, used_entries, synced
                 FROM tickets WHERE qr_code = ?1",
                params![qr_code],
                map_ticket,
            )
            .optional()?;

        let mut ticket = match ticket {
            None => {
                debug!(qr_code, "Scan for unknown QR code");
                return Ok(CheckInOutcome::NotFound);
            }
            Some(t) if t.is_exhausted() => {
                debug!(qr_code, used = t.used_entries, "Ticket already fully scanned");
                return Ok(CheckInOutcome::AlreadyScanned(t));
            }
            Some(t) => t,
        };

        tx.execute(
            "UPDATE tickets
             SET used_entries = used_entries + 1, status = ?1, synced = 0
             WHERE qr_code = ?2",
            params![STATUS_CHECKED_IN, qr_code],
        )?;
        tx.commit()?;

        ticket.used_entries += 1;
        ticket.status = STATUS_CHECKED_IN.to_string();
        ticket.synced = false;
        debug!(qr_code, used = ticket.used_entries, total = ticket.total_entries, "Entry consumed");
        Ok(CheckInOutcome::Admitted(ticket))
    }

    /// Apply a host-authoritative broadcast to the local row.
    ///
    /// Monotonic: `used_entries` never decreases. Used by the client side of
    /// the session protocol, where validation already happened on the host.
    pub fn apply_observed(&self, ticket: &Ticket) -> Result<()> {
        self.conn.execute(
            "UPDATE tickets
             SET used_entries = MAX(used_entries, ?1),
                 total_entries = ?2,
                 status = ?3
             WHERE qr_code = ?4",
            params![
                ticket.used_entries,
                ticket.total_entries,
                ticket.status,
                ticket.qr_code,
            ],
        )?;
        Ok(())
    }

    /// List all cached tickets for an event
    pub fn list_for_event(&self, event_id: i64) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, guest_id, ticket_id, name, email, phone, qr_code,
                    status, total_entries, used_entries, synced
             FROM tickets WHERE event_id = ?1 ORDER BY name",
        )?;

        let tickets = stmt
            .query_map(params![event_id], map_ticket)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tickets)
    }

    /// Read-only aggregates for the event dashboard
    pub fn event_summary(&self, event_id: i64) -> Result<EventSummary> {
        let summary = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN used_entries > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(total_entries), 0),
                    COALESCE(SUM(used_entries), 0)
             FROM tickets WHERE event_id = ?1",
            params![event_id],
            |row| {
                Ok(EventSummary {
                    event_id,
                    total_guests: row.get::<_, i64>(0)? as u64,
                    checked_in_guests: row.get::<_, i64>(1)? as u64,
                    total_entries: row.get::<_, i64>(2)? as u64,
                    used_entries: row.get::<_, i64>(3)? as u64,
                })
            },
        )?;
        Ok(summary)
    }
}

fn map_ticket(row: &rusqlite::Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        event_id: row.get(0)?,
        guest_id: row.get(1)?,
        ticket_id: row.get(2)?,
        name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        qr_code: row.get(6)?,
        status: row.get(7)?,
        total_entries: row.get(8)?,
        used_entries: row.get(9)?,
        synced: row.get::<_, i32>(10)? != 0,
    })
}
