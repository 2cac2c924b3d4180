//! GateCheck Core Library
//!
//! Models, SQLite storage, scan cache, reconciliation, and remote payload
//! normalization for the GateCheck check-in platform.

pub mod error;
pub mod merge;
pub mod models;
pub mod remote;
pub mod scan_cache;
pub mod storage;

pub use error::{Error, Result};
pub use merge::{merge_guest, GuestView};
pub use models::*;
pub use remote::{
    normalize_guest_list, parse_page_meta, parse_sync_ack, PageMeta, RemoteFacility, RemoteGuest,
    SyncAck,
};
pub use scan_cache::{ObservedScan, ScanCache};
pub use storage::{
    CheckInOutcome, CheckinRepository, CheckinStore, Database, FacilityOutcome, FacilityRepository,
    FacilityStore, Storage, TicketRepository, TicketStore,
};
