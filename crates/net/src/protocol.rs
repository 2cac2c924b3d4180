//! Session protocol message types
//!
//! One tagged JSON envelope per newline-delimited line on the wire.

use serde::{Deserialize, Serialize};

/// Ticket state transmitted over the network (mirrors the core ticket but
/// keeps this crate decoupled from storage)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetTicket {
    pub event_id: i64,
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

/// Scan reply status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Error,
}

/// Session protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Client asks to join a session
    JoinRequest { session_code: String },

    /// Host accepts the join
    JoinAccept,

    /// Host rejects the join; the socket closes afterwards
    JoinReject { reason: String },

    /// A scanned QR code submitted for validation
    Scan {
        guest_uuid: String,
        event_id: i64,
        ticket_id: i64,
        check_in_count: u32,
    },

    /// Host's reply to the originating scanner
    ScanResult {
        status: ScanStatus,
        message: String,
        data: Option<NetTicket>,
    },

    /// Host's fan-out of an admitted check-in to every joined peer
    BroadcastUpdate { data: NetTicket },
}

impl Message {
    /// Serialize message to a JSON line (without the trailing newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize message from a JSON line
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> NetTicket {
        NetTicket {
            event_id: 1,
            guest_id: 7,
            ticket_id: 70,
            qr_code: "abc".into(),
            name: "Ada".into(),
            email: String::new(),
            phone: String::new(),
            status: "checked_in".into(),
            total_entries: 2,
            used_entries: 1,
        }
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = Message::BroadcastUpdate { data: ticket() };
        let line = msg.to_line().unwrap();
        let decoded = Message::from_line(&line).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_kind_tags_are_stable() {
        let line = Message::JoinRequest {
            session_code: "1234".into(),
        }
        .to_line()
        .unwrap();
        assert!(line.contains(r#""kind":"join_request""#));

        let line = Message::JoinAccept.to_line().unwrap();
        assert!(line.contains(r#""kind":"join_accept""#));

        let line = Message::ScanResult {
            status: ScanStatus::Error,
            message: "Already Scanned".into(),
            data: Some(ticket()),
        }
        .to_line()
        .unwrap();
        assert!(line.contains(r#""kind":"scan_result""#));
        assert!(line.contains(r#""status":"error""#));

        let line = Message::BroadcastUpdate { data: ticket() }.to_line().unwrap();
        assert!(line.contains(r#""kind":"broadcast_update""#));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Message::from_line(r#"{"kind":"mystery"}"#).is_err());
        assert!(Message::from_line("not json at all").is_err());
    }
}
