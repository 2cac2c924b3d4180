//! Remote API client
//!
//! Thin HTTP layer over the guest and check-in endpoints. Responses go
//! straight through the normalization boundary; nothing here interprets
//! payload shapes itself. Transient failures surface to the user as
//! retriable errors and are never retried automatically.

use gatecheck_core::{
    normalize_guest_list, parse_sync_ack, CheckinEvent, Facility, RemoteGuest, SyncAck,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::sync::RemoteApi;

/// Remote API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl ApiConfig {
    /// Read `GATECHECK_API_URL` (required) and `GATECHECK_API_TOKEN`
    /// (optional) from the environment
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("GATECHECK_API_URL")
            .map_err(|_| Error::Config("GATECHECK_API_URL is not set".into()))?;
        let token = std::env::var("GATECHECK_API_TOKEN").ok();

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

/// HTTP client for the remote check-in API
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl RemoteApi for ApiClient {
    /// Fetch the full guest snapshot for an event
    async fn fetch_guest_snapshot(&self, event_id: i64) -> Result<Vec<RemoteGuest>> {
        let url = format!("{}/events/{}/guests", self.config.base_url, event_id);
        debug!(url = %url, "Fetching guest snapshot");

        let payload: Value = self
            .authorize(self.http.get(&url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let guests = normalize_guest_list(&payload);
        info!(event_id, guests = guests.len(), "Guest snapshot fetched");
        Ok(guests)
    }

    /// Upload pending check-ins and facility usage. The returned ack covers
    /// the whole batch.
    async fn push_checkins(
        &self,
        event_id: i64,
        checkins: &[CheckinEvent],
        facilities: &[Facility],
    ) -> Result<SyncAck> {
        let url = format!("{}/events/{}/checkins", self.config.base_url, event_id);
        let items: Vec<Value> = checkins
            .iter()
            .map(|c| {
                json!({
                    "qr_guest_uuid": c.qr_guest_uuid,
                    "qr_ticket_id": c.qr_ticket_id,
                    "check_in_count": c.check_in_count,
                    "given_check_in_time": c.given_check_in_time.to_rfc3339(),
                })
            })
            .collect();
        let facility_items: Vec<Value> = facilities
            .iter()
            .map(|f| {
                json!({
                    "guest_uuid": f.guest_uuid,
                    "ticket_id": f.ticket_id,
                    "facility_id": f.facility_id,
                    "scanned_count": f.check_in,
                })
            })
            .collect();

        debug!(
            url = %url,
            checkins = items.len(),
            facilities = facility_items.len(),
            "Uploading pending rows"
        );

        let body = json!({ "checkins": items, "facilities": facility_items });
        let payload: Value = self
            .authorize(self.http.post(&url).json(&body))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_sync_ack(&payload))
    }
}
