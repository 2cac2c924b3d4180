//! Local-network session layer for live check-in sharing
//!
//! One device hosts a scanning session; other scanners join it with a
//! 4-digit code. Scans are validated on the host against the local store and
//! every admitted check-in is fanned out to all joined scanners, so entry
//! counts stay consistent across devices without any internet connectivity.

pub mod client;
pub mod error;
pub mod line;
pub mod protocol;
pub mod server;

pub use client::{Client, SessionEvent, SessionState};
pub use error::{Error, Result};
pub use line::{read_message, write_message};
pub use protocol::{Message, NetTicket, ScanStatus};
pub use server::{generate_session_code, Host, ScanOutcome, ScanRequest, ScanValidator};
