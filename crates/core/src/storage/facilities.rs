//! Facility sub-entitlement storage operations

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::error::Result;
use crate::models::Facility;

use super::parse::OptionalExt;

/// Outcome of consuming a facility scan
#[derive(Debug, Clone, PartialEq)]
pub enum FacilityOutcome {
    /// A scan was consumed; carries the updated record
    Granted(Facility),
    /// No scans remain; carries the unchanged record
    Exhausted(Facility),
    /// No such facility for that guest
    NotFound,
}

pub struct FacilityStore<'a> {
    conn: &'a Connection,
}

impl<'a> FacilityStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Refresh a guest's facility records from a remote snapshot.
    ///
    /// Transactional: upserts the given records and removes facilities no
    /// longer present for that guest/event/ticket scope.
    pub fn replace_for_guest(
        &self,
        guest_uuid: &str,
        event_id: i64,
        ticket_id: i64,
        facilities: &[Facility],
    ) -> Result<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        if facilities.is_empty() {
            tx.execute(
                "DELETE FROM facilities
                 WHERE guest_uuid = ?1 AND event_id = ?2 AND ticket_id = ?3",
                params![guest_uuid, event_id, ticket_id],
            )?;
        } else {
            let placeholders = vec!["?"; facilities.len()].join(", ");
            let sql = format!(
                "DELETE FROM facilities
                 WHERE guest_uuid = ?1 AND event_id = ?2 AND ticket_id = ?3
                   AND facility_id NOT IN ({placeholders})"
            );
            let mut stmt = tx.prepare(&sql)?;
            let mut args: Vec<&dyn rusqlite::ToSql> = vec![&guest_uuid, &event_id, &ticket_id];
            for f in facilities {
                args.push(&f.facility_id);
            }
            stmt.execute(args.as_slice())?;
        }

        for f in facilities {
            tx.execute(
                "INSERT OR REPLACE INTO facilities
                 (guest_uuid, event_id, ticket_id, facility_id, name,
                  available_scans, check_in, synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    guest_uuid,
                    event_id,
                    ticket_id,
                    f.facility_id,
                    f.name,
                    f.available_scans,
                    f.check_in,
                    f.synced as i32,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// List facilities for a guest within an event
    pub fn list_for_guest(&self, guest_uuid: &str, event_id: i64) -> Result<Vec<Facility>> {
        let mut stmt = self.conn.prepare(
            "SELECT guest_uuid, event_id, ticket_id, facility_id, name,
                    available_scans, check_in, synced
             FROM facilities WHERE guest_uuid = ?1 AND event_id = ?2
             ORDER BY facility_id",
        )?;

        let facilities = stmt
            .query_map(params![guest_uuid, event_id], map_facility)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(facilities)
    }

    /// Validate and consume one facility scan. Same check-then-increment
    /// discipline as the ticket mutation point.
    pub fn record_use(
        &self,
        guest_uuid: &str,
        event_id: i64,
        facility_id: i64,
    ) -> Result<FacilityOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let facility = tx
            .query_row(
                "SELECT guest_uuid, event_id, ticket_id, facility_id, name,
                        available_scans, check_in, synced
                 FROM facilities
                 WHERE guest_uuid = ?1 AND event_id = ?2 AND facility_id = ?3",
                params![guest_uuid, event_id, facility_id],
                map_facility,
            )
            .optional()?;

        let mut facility = match facility {
            None => return Ok(FacilityOutcome::NotFound),
            Some(f) if f.is_exhausted() => {
                debug!(guest_uuid, facility_id, "Facility scans exhausted");
                return Ok(FacilityOutcome::Exhausted(f));
            }
            Some(f) => f,
        };

        tx.execute(
            "UPDATE facilities SET check_in = check_in + 1, synced = 0
             WHERE guest_uuid = ?1 AND event_id = ?2 AND facility_id = ?3",
            params![guest_uuid, event_id, facility_id],
        )?;
        tx.commit()?;

        facility.check_in += 1;
        facility.synced = false;
        Ok(FacilityOutcome::Granted(facility))
    }

    /// Remove facility rows of guests absent from an event snapshot.
    ///
    /// Companion to the ticket catalog prune; a guest dropped from the
    /// snapshot must not keep consumable entitlements behind. Returns the
    /// number of rows removed.
    pub fn prune_absent_guests(&self, event_id: i64, keep: &[String]) -> Result<usize> {
        let removed = if keep.is_empty() {
            self.conn.execute(
                "DELETE FROM facilities WHERE event_id = ?1",
                params![event_id],
            )?
        } else {
            let placeholders = vec!["?"; keep.len()].join(", ");
            let sql = format!(
                "DELETE FROM facilities
                 WHERE event_id = ?1 AND guest_uuid NOT IN ({placeholders})"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut args: Vec<&dyn rusqlite::ToSql> = vec![&event_id];
            for u in keep {
                args.push(u);
            }
            stmt.execute(args.as_slice())?
        };

        if removed > 0 {
            debug!(event_id, removed, "Stale guest facilities pruned");
        }
        Ok(removed)
    }

    /// List unsynced facility usage for an event
    pub fn list_unsynced(&self, event_id: i64) -> Result<Vec<Facility>> {
        let mut stmt = self.conn.prepare(
            "SELECT guest_uuid, event_id, ticket_id, facility_id, name,
                    available_scans, check_in, synced
             FROM facilities WHERE event_id = ?1 AND synced = 0
             ORDER BY guest_uuid, facility_id",
        )?;

        let facilities = stmt
            .query_map(params![event_id], map_facility)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(facilities)
    }

    /// Flip `synced` for the given guests' facility rows within an event
    pub fn mark_synced(&self, event_id: i64, guest_uuids: &[String]) -> Result<usize> {
        if guest_uuids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; guest_uuids.len()].join(", ");
        let sql = format!(
            "UPDATE facilities SET synced = 1
             WHERE event_id = ?1 AND guest_uuid IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut args: Vec<&dyn rusqlite::ToSql> = vec![&event_id];
        for u in guest_uuids {
            args.push(u);
        }
        Ok(stmt.execute(args.as_slice())?)
    }
}

fn map_facility(row: &rusqlite::Row<'_>) -> rusqlite::Result<Facility> {
    Ok(Facility {
        guest_uuid: row.get(0)?,
        event_id: row.get(1)?,
        ticket_id: row.get(2)?,
        facility_id: row.get(3)?,
        name: row.get(4)?,
        available_scans: row.get(5)?,
        check_in: row.get(6)?,
        synced: row.get::<_, i32>(7)? != 0,
    })
}
