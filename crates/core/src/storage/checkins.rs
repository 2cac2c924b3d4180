//! Check-in event log operations
//!
//! Append-only until synced; one pending row per guest UUID.

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::Result;
use crate::models::CheckinEvent;
use crate::storage::parse::parse_datetime;

pub struct CheckinStore<'a> {
    conn: &'a Connection,
}

impl<'a> CheckinStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record a pending check-in event, insert-if-absent keyed by guest UUID.
    ///
    /// Returns true when a row was inserted, false when one already existed
    /// for that guest. This is the sole dedup mechanism for offline
    /// check-ins; a second legitimate entry on a multi-entry ticket does not
    /// produce a second row.
    pub fn record(&self, event: &CheckinEvent) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO checkins
             (event_id, qr_guest_uuid, qr_ticket_id, check_in_count, given_check_in_time, synced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.event_id,
                event.qr_guest_uuid,
                event.qr_ticket_id,
                event.check_in_count,
                event.given_check_in_time.to_rfc3339(),
                event.synced as i32,
            ],
        )?;
        if inserted == 0 {
            debug!(guest = %event.qr_guest_uuid, "Pending check-in already recorded");
        }
        Ok(inserted > 0)
    }

    /// List pending (unsynced) check-ins for an event, oldest first
    pub fn list_unsynced(&self, event_id: i64) -> Result<Vec<CheckinEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, qr_guest_uuid, qr_ticket_id, check_in_count,
                    given_check_in_time, synced
             FROM checkins WHERE event_id = ?1 AND synced = 0
             ORDER BY given_check_in_time",
        )?;

        let events = stmt
            .query_map(params![event_id], map_checkin)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Bulk-flip `synced` for the given guest UUIDs.
    ///
    /// Called only after the remote API explicitly confirmed the upload.
    /// No-op on an empty list; returns the number of rows updated.
    pub fn mark_synced(&self, guest_uuids: &[String]) -> Result<usize> {
        if guest_uuids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; guest_uuids.len()].join(", ");
        let sql = format!(
            "UPDATE checkins SET synced = 1 WHERE qr_guest_uuid IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let args: Vec<&dyn rusqlite::ToSql> =
            guest_uuids.iter().map(|u| u as &dyn rusqlite::ToSql).collect();
        let updated = stmt.execute(args.as_slice())?;

        debug!(updated, "Check-ins marked synced");
        Ok(updated)
    }
}

fn map_checkin(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckinEvent> {
    Ok(CheckinEvent {
        event_id: row.get(0)?,
        qr_guest_uuid: row.get(1)?,
        qr_ticket_id: row.get(2)?,
        check_in_count: row.get(3)?,
        given_check_in_time: parse_datetime(&row.get::<_, String>(4)?)?,
        synced: row.get::<_, i32>(5)? != 0,
    })
}
