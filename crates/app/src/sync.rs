//! Sync service between the remote API and the local store
//!
//! Download replaces the cached catalog from a remote snapshot; upload
//! pushes pending check-ins and facility usage, marking rows synced only
//! on an explicit acknowledgement. Both directions are idempotent:
//! re-running with no change in between has no further effect and upload
//! makes no API call when nothing is pending.

use std::sync::{Arc, Mutex};

use gatecheck_core::{CheckinEvent, Database, Facility, RemoteGuest, SyncAck};
use tracing::info;

use crate::error::{Error, Result};
use crate::state::lock_store;

/// Remote operations the sync service depends on
pub trait RemoteApi {
    async fn fetch_guest_snapshot(&self, event_id: i64) -> Result<Vec<RemoteGuest>>;
    async fn push_checkins(
        &self,
        event_id: i64,
        checkins: &[CheckinEvent],
        facilities: &[Facility],
    ) -> Result<SyncAck>;
}

impl<A: RemoteApi> RemoteApi for &A {
    async fn fetch_guest_snapshot(&self, event_id: i64) -> Result<Vec<RemoteGuest>> {
        (**self).fetch_guest_snapshot(event_id).await
    }

    async fn push_checkins(
        &self,
        event_id: i64,
        checkins: &[CheckinEvent],
        facilities: &[Facility],
    ) -> Result<SyncAck> {
        (**self).push_checkins(event_id, checkins, facilities).await
    }
}

/// Counts reported back to the user after a sync action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub uploaded: usize,
    pub uploaded_facilities: usize,
}

/// Drives snapshot downloads and check-in uploads
pub struct SyncService<A> {
    api: A,
    db: Arc<Mutex<Database>>,
}

impl<A: RemoteApi> SyncService<A> {
    pub fn new(api: A, db: Arc<Mutex<Database>>) -> Self {
        Self { api, db }
    }

    /// Replace the local catalog with the remote snapshot.
    ///
    /// Upserts every guest, prunes guests absent from the snapshot, and
    /// refreshes facility entitlements per guest.
    pub async fn download_snapshot(&self, event_id: i64) -> Result<SyncReport> {
        let guests = self.api.fetch_guest_snapshot(event_id).await?;
        let tickets: Vec<_> = guests.iter().map(|g| g.to_ticket(event_id)).collect();

        let removed = {
            let db = lock_store(&self.db)?;
            let removed = db.tickets().bulk_replace(event_id, &tickets)?;

            let keep: Vec<String> = guests.iter().map(|g| g.qr_code.clone()).collect();
            db.facilities().prune_absent_guests(event_id, &keep)?;

            for guest in &guests {
                let rows = guest.to_facilities(event_id);
                db.facilities()
                    .replace_for_guest(&guest.qr_code, event_id, guest.ticket_id, &rows)?;
            }
            removed
        };

        info!(event_id, added = tickets.len(), removed, "Snapshot downloaded");
        Ok(SyncReport {
            added: tickets.len(),
            removed,
            uploaded: 0,
            uploaded_facilities: 0,
        })
    }

    /// Upload pending check-ins and facility usage.
    ///
    /// Rows flip to synced only after the API explicitly acknowledged the
    /// batch; a rejected or failed upload leaves everything pending.
    pub async fn upload_pending(&self, event_id: i64) -> Result<SyncReport> {
        let (pending, facilities) = {
            let db = lock_store(&self.db)?;
            (
                db.checkins().list_unsynced(event_id)?,
                db.facilities().list_unsynced(event_id)?,
            )
        };

        if pending.is_empty() && facilities.is_empty() {
            info!(event_id, "Nothing pending to upload");
            return Ok(SyncReport::default());
        }

        let ack = self.api.push_checkins(event_id, &pending, &facilities).await?;
        if !ack.success {
            return Err(Error::SyncRejected(
                ack.message.unwrap_or_else(|| "No reason given".into()),
            ));
        }

        let uuids: Vec<String> = pending.iter().map(|c| c.qr_guest_uuid.clone()).collect();
        let facility_uuids: Vec<String> =
            facilities.iter().map(|f| f.guest_uuid.clone()).collect();
        let marked = {
            let db = lock_store(&self.db)?;
            let marked = db.checkins().mark_synced(&uuids)?;
            db.facilities().mark_synced(event_id, &facility_uuids)?;
            marked
        };

        info!(
            event_id,
            uploaded = pending.len(),
            facilities = facilities.len(),
            marked,
            "Pending rows uploaded"
        );
        Ok(SyncReport {
            uploaded: pending.len(),
            uploaded_facilities: facilities.len(),
            ..SyncReport::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatecheck_core::{RemoteFacility, Ticket};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockApi {
        guests: Vec<RemoteGuest>,
        ack: SyncAck,
        fetch_calls: AtomicUsize,
        push_calls: AtomicUsize,
    }

    impl MockApi {
        fn new(guests: Vec<RemoteGuest>) -> Self {
            Self {
                guests,
                ack: SyncAck {
                    success: true,
                    message: None,
                },
                fetch_calls: AtomicUsize::new(0),
                push_calls: AtomicUsize::new(0),
            }
        }
    }

    impl RemoteApi for MockApi {
        async fn fetch_guest_snapshot(&self, _event_id: i64) -> Result<Vec<RemoteGuest>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.guests.clone())
        }

        async fn push_checkins(
            &self,
            _event_id: i64,
            checkins: &[CheckinEvent],
            facilities: &[Facility],
        ) -> Result<SyncAck> {
            self.push_calls.fetch_add(1, Ordering::SeqCst);
            assert!(
                !checkins.is_empty() || !facilities.is_empty(),
                "Empty batches must never be pushed"
            );
            Ok(self.ack.clone())
        }
    }

    fn remote_guest(qr: &str, total: u32) -> RemoteGuest {
        RemoteGuest {
            guest_id: 1,
            ticket_id: 10,
            qr_code: qr.into(),
            name: format!("Guest {qr}"),
            total_entries: total,
            ..RemoteGuest::default()
        }
    }

    fn mem_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_download_replaces_catalog() {
        let db = mem_db();
        let api = MockApi::new(vec![remote_guest("a", 1), remote_guest("b", 2)]);
        let service = SyncService::new(&api, db.clone());

        let report = service.download_snapshot(1).await.unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(report.removed, 0);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);

        let guard = db.lock().unwrap();
        let ticket = guard.tickets().find_by_qr_code("b").unwrap().unwrap();
        assert_eq!(ticket.total_entries, 2);
        assert!(ticket.synced);
    }

    #[tokio::test]
    async fn test_download_prunes_stale_guests() {
        let db = mem_db();
        {
            let guard = db.lock().unwrap();
            let seed: Vec<Ticket> = ["a", "b", "c"]
                .iter()
                .map(|qr| remote_guest(qr, 1).to_ticket(1))
                .collect();
            guard.tickets().bulk_replace(1, &seed).unwrap();
        }

        let api = MockApi::new(vec![remote_guest("a", 1)]);
        let report = SyncService::new(&api, db.clone())
            .download_snapshot(1)
            .await
            .unwrap();

        assert_eq!(report.removed, 2);
        let guard = db.lock().unwrap();
        assert!(guard.tickets().find_by_qr_code("b").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_refreshes_facilities() {
        let mut guest = remote_guest("a", 1);
        guest.facilities = vec![RemoteFacility {
            facility_id: 5,
            name: "Meal".into(),
            available_scans: 2,
            used: 0,
        }];

        let db = mem_db();
        let api = MockApi::new(vec![guest]);
        SyncService::new(&api, db.clone())
            .download_snapshot(1)
            .await
            .unwrap();

        let guard = db.lock().unwrap();
        let rows = guard.facilities().list_for_guest("a", 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Meal");
        assert_eq!(rows[0].available_scans, 2);
    }

    #[tokio::test]
    async fn test_download_removes_stale_guest_facilities() {
        let mut guest = remote_guest("gone", 1);
        guest.facilities = vec![RemoteFacility {
            facility_id: 5,
            name: "Meal".into(),
            available_scans: 1,
            used: 0,
        }];

        let db = mem_db();
        let api = MockApi::new(vec![guest]);
        SyncService::new(&api, db.clone())
            .download_snapshot(1)
            .await
            .unwrap();

        // Next snapshot no longer lists the guest
        let api = MockApi::new(vec![remote_guest("a", 1)]);
        SyncService::new(&api, db.clone())
            .download_snapshot(1)
            .await
            .unwrap();

        let guard = db.lock().unwrap();
        assert!(guard.tickets().find_by_qr_code("gone").unwrap().is_none());
        assert!(guard.facilities().list_for_guest("gone", 1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_includes_facility_usage() {
        let db = mem_db();
        {
            let guard = db.lock().unwrap();
            guard
                .facilities()
                .replace_for_guest(
                    "a",
                    1,
                    10,
                    &[Facility {
                        guest_uuid: "a".into(),
                        event_id: 1,
                        ticket_id: 10,
                        facility_id: 5,
                        name: "Meal".into(),
                        available_scans: 2,
                        check_in: 0,
                        synced: true,
                    }],
                )
                .unwrap();
            guard.facilities().record_use("a", 1, 5).unwrap();
        }

        let api = MockApi::new(vec![]);
        let service = SyncService::new(&api, db.clone());

        // Facility usage alone is enough to trigger an upload
        let report = service.upload_pending(1).await.unwrap();
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.uploaded_facilities, 1);
        assert_eq!(api.push_calls.load(Ordering::SeqCst), 1);

        // Acked rows stay synced, so the second run makes no API call
        let report = service.upload_pending(1).await.unwrap();
        assert_eq!(report.uploaded_facilities, 0);
        assert_eq!(api.push_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_is_idempotent() {
        let db = mem_db();
        {
            let guard = db.lock().unwrap();
            guard
                .tickets()
                .bulk_replace(1, &[remote_guest("a", 1).to_ticket(1)])
                .unwrap();
            guard.tickets().check_in("a").unwrap();
            guard
                .checkins()
                .record(&CheckinEvent::new(1, "a".into(), 10, 1))
                .unwrap();
        }

        let api = MockApi::new(vec![]);
        let service = SyncService::new(&api, db.clone());

        let report = service.upload_pending(1).await.unwrap();
        assert_eq!(report.uploaded, 1);
        assert_eq!(api.push_calls.load(Ordering::SeqCst), 1);

        // Nothing pending anymore, so the second run makes no API call
        let report = service.upload_pending(1).await.unwrap();
        assert_eq!(report.uploaded, 0);
        assert_eq!(api.push_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_rejected_keeps_rows_pending() {
        let db = mem_db();
        {
            let guard = db.lock().unwrap();
            guard
                .checkins()
                .record(&CheckinEvent::new(1, "a".into(), 10, 1))
                .unwrap();
        }

        let mut api = MockApi::new(vec![]);
        api.ack = SyncAck {
            success: false,
            message: Some("quota exceeded".into()),
        };
        let service = SyncService::new(&api, db.clone());

        assert!(matches!(
            service.upload_pending(1).await,
            Err(Error::SyncRejected(_))
        ));

        let guard = db.lock().unwrap();
        assert_eq!(guard.checkins().list_unsynced(1).unwrap().len(), 1);
    }
}
