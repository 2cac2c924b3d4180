//! Normalization boundary for remote API payloads
//!
//! The remote API is loose about shapes: guest lists arrive as an array, an
//! index-keyed object, or a paginated envelope, and several fields go by
//! more than one name. Everything entering the system passes through one of
//! the functions here and comes out as a plain record with explicit
//! defaults. Malformed individual records are skipped, never fatal.

use serde_json::Value;
use tracing::warn;

use crate::models::{Facility, Ticket, STATUS_REGISTERED};

/// A guest record as reported by the remote API, normalized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteGuest {
    pub guest_id: i64,
    pub ticket_id: i64,
    pub qr_code: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: String,
    pub total_entries: u32,
    pub used_entries: u32,
    pub facilities: Vec<RemoteFacility>,
}

/// A facility entitlement as reported by the remote API, normalized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteFacility {
    pub facility_id: i64,
    pub name: String,
    pub available_scans: u32,
    pub used: u32,
}

/// Acknowledgement of a check-in upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncAck {
    pub success: bool,
    pub message: Option<String>,
}

/// Pagination metadata on listing endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub total: u64,
}

impl RemoteGuest {
    /// Convert into a cacheable ticket row for the given event
    pub fn to_ticket(&self, event_id: i64) -> Ticket {
        Ticket {
            event_id,
            guest_id: self.guest_id,
            ticket_id: self.ticket_id,
            qr_code: self.qr_code.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            status: if self.status.is_empty() {
                STATUS_REGISTERED.to_string()
            } else {
                self.status.clone()
            },
            total_entries: self.total_entries,
            used_entries: self.used_entries,
            synced: true,
        }
    }

    /// Convert facility entitlements into cacheable rows
    pub fn to_facilities(&self, event_id: i64) -> Vec<Facility> {
        self.facilities
            .iter()
            .map(|f| Facility {
                guest_uuid: self.qr_code.clone(),
                event_id,
                ticket_id: self.ticket_id,
                facility_id: f.facility_id,
                name: f.name.clone(),
                available_scans: f.available_scans,
                check_in: f.used,
                synced: true,
            })
            .collect()
    }
}

/// Normalize a guest-list payload into records.
///
/// Accepted shapes: a bare array, `{"guests_list": [...]}`, an index-keyed
/// `{"guests_list": {"0": {...}, ...}}`, and the paginated
/// `{"data": [...], "meta": {...}}`. Anything else yields an empty list
/// with a warning.
pub fn normalize_guest_list(payload: &Value) -> Vec<RemoteGuest> {
    let items: Vec<&Value> = if let Some(arr) = payload.as_array() {
        arr.iter().collect()
    } else if let Some(list) = payload.get("guests_list") {
        match list {
            Value::Array(arr) => arr.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => {
                warn!("Unrecognized guests_list shape; treating as empty");
                Vec::new()
            }
        }
    } else if let Some(Value::Array(arr)) = payload.get("data") {
        arr.iter().collect()
    } else {
        warn!("Unrecognized guest list payload shape; treating as empty");
        Vec::new()
    };

    items.into_iter().filter_map(normalize_guest).collect()
}

/// Normalize one guest object. Returns None (and warns) when the record has
/// no usable QR identity.
fn normalize_guest(value: &Value) -> Option<RemoteGuest> {
    let qr_code = match str_field(value, &["qr_code", "uuid", "guest_uuid"]) {
        Some(code) if !code.is_empty() => code,
        _ => {
            warn!("Skipping guest record without a QR identity");
            return None;
        }
    };

    let facilities = value
        .get("facilities")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(normalize_facility).collect())
        .unwrap_or_default();

    Some(RemoteGuest {
        guest_id: int_field(value, &["guest_id", "id"]),
        ticket_id: int_field(value, &["ticket_id", "qrTicketId"]),
        qr_code,
        name: str_field(value, &["name"]).unwrap_or_default(),
        email: str_field(value, &["email"]).unwrap_or_default(),
        phone: str_field(value, &["phone"]).unwrap_or_default(),
        status: str_field(value, &["status"]).unwrap_or_default(),
        total_entries: count_field(value, &["total_entries", "entries"]),
        used_entries: count_field(value, &["used_entries", "scanned"]),
        facilities,
    })
}

fn normalize_facility(value: &Value) -> Option<RemoteFacility> {
    // A facility without an id cannot be tracked
    let facility_id = match value.get("id").or_else(|| value.get("facility_id")) {
        Some(v) => as_i64(v)?,
        None => return None,
    };

    Some(RemoteFacility {
        facility_id,
        name: str_field(value, &["name"]).unwrap_or_default(),
        available_scans: count_field(value, &["quantity", "total_scans"]),
        used: count_field(value, &["scanned_count", "used_count"]),
    })
}

/// Parse the upload acknowledgement shape `{success, message?}`
pub fn parse_sync_ack(payload: &Value) -> SyncAck {
    SyncAck {
        success: payload.get("success").and_then(Value::as_bool).unwrap_or(false),
        message: str_field(payload, &["message"]),
    }
}

/// Parse pagination metadata from a `meta` object, if present
pub fn parse_page_meta(payload: &Value) -> Option<PageMeta> {
    let meta = payload.get("meta")?;
    Some(PageMeta {
        current_page: count_field(meta, &["current_page"]),
        last_page: count_field(meta, &["last_page"]),
        total: meta.get("total").and_then(as_i64).unwrap_or(0).max(0) as u64,
    })
}

/// First present string value among the aliased field names
fn str_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| value.get(name))
        .find_map(|v| v.as_str().map(str::to_string))
}

/// First present integer among the aliased field names, defaulting to 0.
/// Tolerates numbers serialized as strings.
fn int_field(value: &Value, names: &[&str]) -> i64 {
    names
        .iter()
        .filter_map(|name| value.get(name))
        .find_map(as_i64)
        .unwrap_or(0)
}

fn count_field(value: &Value, names: &[&str]) -> u32 {
    int_field(value, names).max(0) as u32
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guest(qr: &str) -> Value {
        json!({
            "guest_id": 7,
            "ticket_id": 70,
            "qr_code": qr,
            "name": "Ada",
            "email": "ada@example.com",
            "total_entries": 2,
            "used_entries": 1,
        })
    }

    #[test]
    fn test_normalize_array_shape() {
        let payload = json!({ "guests_list": [guest("a"), guest("b")] });
        let guests = normalize_guest_list(&payload);
        assert_eq!(guests.len(), 2);
        assert_eq!(guests[0].qr_code, "a");
        assert_eq!(guests[0].total_entries, 2);
        assert_eq!(guests[0].used_entries, 1);
    }

    #[test]
    fn test_index_keyed_object_matches_array() {
        let array = json!({ "guests_list": [guest("a"), guest("b")] });
        let object = json!({ "guests_list": { "0": guest("a"), "1": guest("b") } });
        assert_eq!(normalize_guest_list(&array), normalize_guest_list(&object));
    }

    #[test]
    fn test_bare_array_and_paginated_shapes() {
        let bare = json!([guest("a")]);
        assert_eq!(normalize_guest_list(&bare).len(), 1);

        let paginated = json!({
            "data": [guest("a"), guest("b")],
            "meta": { "current_page": 1, "last_page": 3, "total": 42 }
        });
        assert_eq!(normalize_guest_list(&paginated).len(), 2);
        let meta = parse_page_meta(&paginated).unwrap();
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.total, 42);
    }

    #[test]
    fn test_field_aliases() {
        let payload = json!({ "guests_list": [{
            "guest_uuid": "via-alias",
            "qrTicketId": "99",
            "entries": "3",
            "scanned": 2,
        }]});
        let guests = normalize_guest_list(&payload);
        assert_eq!(guests.len(), 1);
        assert_eq!(guests[0].qr_code, "via-alias");
        assert_eq!(guests[0].ticket_id, 99);
        assert_eq!(guests[0].total_entries, 3);
        assert_eq!(guests[0].used_entries, 2);
    }

    #[test]
    fn test_records_without_identity_are_skipped() {
        let payload = json!({ "guests_list": [
            { "name": "No Code" },
            guest("kept"),
        ]});
        let guests = normalize_guest_list(&payload);
        assert_eq!(guests.len(), 1);
        assert_eq!(guests[0].qr_code, "kept");
    }

    #[test]
    fn test_unknown_shape_is_empty() {
        assert!(normalize_guest_list(&json!({"surprise": true})).is_empty());
        assert!(normalize_guest_list(&json!("just a string")).is_empty());
    }

    #[test]
    fn test_facilities_normalized_with_aliases() {
        let payload = json!({ "guests_list": [{
            "qr_code": "g",
            "facilities": [
                { "id": 1, "name": "Meal", "quantity": 3, "scanned_count": 1 },
                { "id": 2, "name": "Parking", "total_scans": 1, "used_count": 0 },
                { "name": "no id, dropped" },
            ],
        }]});
        let guests = normalize_guest_list(&payload);
        assert_eq!(guests[0].facilities.len(), 2);
        assert_eq!(guests[0].facilities[0].available_scans, 3);
        assert_eq!(guests[0].facilities[1].available_scans, 1);

        let rows = guests[0].to_facilities(5);
        assert_eq!(rows[0].guest_uuid, "g");
        assert_eq!(rows[0].event_id, 5);
        assert_eq!(rows[0].check_in, 1);
    }

    #[test]
    fn test_to_ticket_defaults() {
        let guests = normalize_guest_list(&json!({ "guests_list": [{ "qr_code": "g" }] }));
        let ticket = guests[0].to_ticket(9);
        assert_eq!(ticket.event_id, 9);
        assert_eq!(ticket.status, "registered");
        assert_eq!(ticket.total_entries, 0);
        assert!(ticket.synced);
    }

    #[test]
    fn test_parse_sync_ack() {
        let ok = parse_sync_ack(&json!({ "success": true, "message": "5 synced" }));
        assert!(ok.success);
        assert_eq!(ok.message.as_deref(), Some("5 synced"));

        let bad = parse_sync_ack(&json!({ "error": "boom" }));
        assert!(!bad.success);
        assert!(bad.message.is_none());
    }
}
