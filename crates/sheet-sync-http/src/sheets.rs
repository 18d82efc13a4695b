//! REST client for the spreadsheet backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sheet_sync_reconciler::{
    EventView, PaymentStatus, RegistrationView, SheetClientError, SheetClientResult, SheetHandle,
    SheetSyncClient,
};
use tracing::{debug, warn};
use url::Url;

use crate::error::{check_response, HttpError, HttpResult};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the spreadsheet service.
///
/// Endpoints:
/// - `POST {base}/sheets` creates a sheet and writes the initial rows
/// - `PUT {base}/sheets/{id}` upserts rows keyed by registration id
/// - `GET {base}/health` liveness probe
#[derive(Clone)]
pub struct SheetBackendClient {
    http_client: Client,
    base_url: Url,
    token: Option<String>,
}

impl std::fmt::Debug for SheetBackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetBackendClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SheetBackendClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> HttpResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(HttpError::Config(format!(
                "sheets URL cannot be a base: {base_url}"
            )));
        }
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            token,
        })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> HttpResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HttpError::Config("sheets URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_sheet(&self, payload: &SheetPayload<'_>) -> HttpResult<CreateSheetResponse> {
        let url = self.endpoint(&["sheets"])?;
        debug!(url = %url, rows = payload.rows.len(), "Creating sheet");
        let response = self
            .authorized(self.http_client.post(url))
            .json(payload)
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn put_sheet(&self, spreadsheet_id: &str, payload: &SheetPayload<'_>) -> HttpResult<()> {
        let url = self.endpoint(&["sheets", spreadsheet_id])?;
        debug!(url = %url, rows = payload.rows.len(), "Upserting sheet rows");
        let response = self
            .authorized(self.http_client.put(url))
            .json(payload)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl SheetSyncClient for SheetBackendClient {
    async fn create(
        &self,
        event: &EventView,
        rows: &[RegistrationView],
    ) -> SheetClientResult<SheetHandle> {
        let payload = SheetPayload::new(event, rows);
        let created = self
            .post_sheet(&payload)
            .await
            .map_err(|e| to_client_error(e, SheetClientError::Create))?;
        Ok(SheetHandle {
            spreadsheet_id: created.spreadsheet_id,
            url: created.url,
        })
    }

    async fn update(
        &self,
        spreadsheet_id: &str,
        event: &EventView,
        rows: &[RegistrationView],
    ) -> SheetClientResult<()> {
        let payload = SheetPayload::new(event, rows);
        self.put_sheet(spreadsheet_id, &payload)
            .await
            .map_err(|e| to_client_error(e, SheetClientError::Update))
    }

    async fn health_check(&self) -> bool {
        let url = match self.endpoint(&["health"]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.authorized(self.http_client.get(url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Sheet backend health check failed");
                false
            }
        }
    }
}

fn to_client_error(error: HttpError, wrap: fn(String) -> SheetClientError) -> SheetClientError {
    if error.is_unreachable() {
        SheetClientError::Unavailable(error.to_string())
    } else {
        wrap(error.to_string())
    }
}

/// Request body shared by create and upsert.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetPayload<'a> {
    title: &'a str,
    event_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    venue: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    starts_at: Option<DateTime<Utc>>,
    key_column: &'static str,
    rows: Vec<SheetRow<'a>>,
}

impl<'a> SheetPayload<'a> {
    fn new(event: &'a EventView, rows: &'a [RegistrationView]) -> Self {
        Self {
            title: &event.title,
            event_id: event.id.as_str(),
            venue: event.venue.as_deref(),
            starts_at: event.starts_at,
            key_column: "registrationId",
            rows: rows.iter().map(|r| SheetRow::new(r, event.is_paid)).collect(),
        }
    }
}

/// One spreadsheet row, keyed by `registrationId`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetRow<'a> {
    registration_id: &'a str,
    name: &'a str,
    email: &'a str,
    phone: Option<&'a str>,
    roll_number: Option<&'a str>,
    registered_at: Option<DateTime<Utc>>,
    attended: bool,
    checked_in_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_status: Option<PaymentStatus>,
}

impl<'a> SheetRow<'a> {
    fn new(registration: &'a RegistrationView, is_paid: bool) -> Self {
        Self {
            registration_id: &registration.id,
            name: &registration.name,
            email: &registration.email,
            phone: registration.phone.as_deref(),
            roll_number: registration.roll_number.as_deref(),
            registered_at: registration.registered_at,
            attended: registration.attended,
            checked_in_at: registration.checked_in_at,
            // Free events carry no payment column
            payment_status: is_paid.then_some(registration.payment_status),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSheetResponse {
    spreadsheet_id: String,
    url: String,
}
