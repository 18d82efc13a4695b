//! PostgREST-style data API implementation of `EventStore`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sheet_sync_reconciler::{
    EventId, EventStore, EventView, RegistrationView, StoreError, StoreResult, SyncMetadataPatch,
    SyncState, UpdateType,
};
use tracing::{debug, warn};

use crate::error::{check_response, HttpError, HttpResult};

const EVENT_COLUMNS: &str = "id,title,description,venue,starts_at,organizer,capacity,is_paid";
const SYNC_COLUMNS: &str = "sheet_id,sheet_url,auto_sync_enabled,last_sync_at,last_sync_type,\
                            last_sync_error,sheet_creation_error";
const REGISTRATION_COLUMNS: &str = "id,event_id,name,email,phone,roll_number,registered_at,\
                                    attended,checked_in_at,payment_status";

/// Event store backed by the hosted data API.
///
/// Reads `events` and `registrations`; writes only the sync columns of `events`.
#[derive(Clone)]
pub struct RestEventStore {
    http_client: reqwest::Client,
    api_url: String,
    service_key: String,
}

impl RestEventStore {
    /// Create a store client.
    ///
    /// # Arguments
    /// * `api_url` - The project API URL (e.g., `https://xyz.example.co`)
    /// * `service_key` - Key sent as both `apikey` and bearer token
    pub fn new(
        api_url: impl Into<String>,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> HttpResult<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    async fn select<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> HttpResult<Vec<T>> {
        let response = self
            .http_client
            .get(self.rest_url(table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .query(query)
            .send()
            .await?;
        let response = check_response(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// PATCH rows matching `filter`; returns how many rows were touched.
    async fn patch<T: Serialize>(
        &self,
        table: &str,
        filter: &[(&str, String)],
        body: &T,
    ) -> HttpResult<usize> {
        let response = self
            .http_client
            .patch(self.rest_url(table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
            .query(filter)
            .json(body)
            .send()
            .await?;
        let response = check_response(response).await?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&response.text().await?)?;
        Ok(rows.len())
    }
}

#[async_trait]
impl EventStore for RestEventStore {
    async fn get_event(&self, event_id: &EventId) -> StoreResult<EventView> {
        let rows: Vec<EventView> = self
            .select(
                "events",
                &[
                    ("id", eq(event_id)),
                    ("select", EVENT_COLUMNS.to_string()),
                ],
            )
            .await
            .map_err(backend)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))
    }

    async fn list_registrations(&self, event_id: &EventId) -> StoreResult<Vec<RegistrationView>> {
        let rows: Vec<RegistrationView> = self
            .select(
                "registrations",
                &[
                    ("event_id", eq(event_id)),
                    ("select", REGISTRATION_COLUMNS.to_string()),
                    ("order", "registered_at.asc".to_string()),
                ],
            )
            .await
            .map_err(backend)?;
        debug!(event_id = %event_id, count = rows.len(), "Loaded registrations");
        Ok(rows)
    }

    async fn load_sync_state(&self, event_id: &EventId) -> StoreResult<Option<SyncState>> {
        let rows: Vec<SyncColumns> = self
            .select(
                "events",
                &[("id", eq(event_id)), ("select", SYNC_COLUMNS.to_string())],
            )
            .await
            .map_err(backend)?;
        let columns = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))?;
        Ok(columns.into_state(event_id))
    }

    async fn patch_sync_metadata(
        &self,
        event_id: &EventId,
        patch: &SyncMetadataPatch,
    ) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let touched = self
            .patch("events", &[("id", eq(event_id))], &SyncColumnsPatch::from(patch))
            .await
            .map_err(backend)?;
        if touched == 0 {
            return Err(StoreError::EventNotFound(event_id.to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RestEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestEventStore")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

fn eq(event_id: &EventId) -> String {
    format!("eq.{event_id}")
}

fn backend(error: HttpError) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// Sync columns as stored on the `events` table.
#[derive(Debug, Default, Deserialize)]
struct SyncColumns {
    sheet_id: Option<String>,
    sheet_url: Option<String>,
    auto_sync_enabled: Option<bool>,
    last_sync_at: Option<DateTime<Utc>>,
    last_sync_type: Option<String>,
    last_sync_error: Option<String>,
    sheet_creation_error: Option<String>,
}

impl SyncColumns {
    fn into_state(self, event_id: &EventId) -> Option<SyncState> {
        let untouched = self.sheet_id.is_none()
            && self.sheet_url.is_none()
            && self.auto_sync_enabled.is_none()
            && self.last_sync_at.is_none()
            && self.last_sync_type.is_none()
            && self.last_sync_error.is_none()
            && self.sheet_creation_error.is_none();
        if untouched {
            return None;
        }

        let last_sync_type = self.last_sync_type.and_then(|raw| {
            raw.parse::<UpdateType>()
                .map_err(|e| warn!(event_id = %event_id, error = %e, "Ignoring stored sync type"))
                .ok()
        });
        let defaults = SyncState::default();
        Some(SyncState {
            sheet_id: self.sheet_id,
            sheet_url: self.sheet_url,
            auto_sync_enabled: self.auto_sync_enabled.unwrap_or(defaults.auto_sync_enabled),
            last_sync_at: self.last_sync_at,
            last_sync_type,
            last_error: self.last_sync_error,
            creation_error: self.sheet_creation_error,
        })
    }
}

/// PATCH body. Absent fields are left untouched; `Some(None)` writes null.
#[derive(Debug, Serialize)]
struct SyncColumnsPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sheet_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sheet_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_sync_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync_type: Option<UpdateType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync_error: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sheet_creation_error: Option<Option<&'a str>>,
}

impl<'a> From<&'a SyncMetadataPatch> for SyncColumnsPatch<'a> {
    fn from(patch: &'a SyncMetadataPatch) -> Self {
        Self {
            sheet_id: patch.sheet_id.as_deref(),
            sheet_url: patch.sheet_url.as_deref(),
            auto_sync_enabled: patch.auto_sync_enabled,
            last_sync_at: patch.last_sync_at,
            last_sync_type: patch.last_sync_type,
            last_sync_error: patch.last_error.as_ref().map(|e| e.as_deref()),
            sheet_creation_error: patch.creation_error.as_ref().map(|e| e.as_deref()),
        }
    }
}
