//! Data models for GateCheck

mod checkin;
mod facility;
mod summary;
mod ticket;

pub use checkin::CheckinEvent;
pub use facility::Facility;
pub use summary::EventSummary;
pub use ticket::{Ticket, STATUS_CHECKED_IN, STATUS_REGISTERED};
