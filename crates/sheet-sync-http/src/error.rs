//! Error types for the HTTP adapters.

use thiserror::Error;
use tracing::error;

/// Errors raised while talking to the spreadsheet backend or the data store.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or transport-level error from reqwest.
    ///
    /// Includes connection failures, timeouts, and TLS errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// A request body could not be serialized or a response did not match
    /// the expected schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configured URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid client setup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HttpError {
    /// Whether the remote end could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        match self {
            HttpError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Result type alias for HTTP adapter operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Map non-success responses to [`HttpError::Api`].
pub(crate) async fn check_response(response: reqwest::Response) -> HttpResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let message = response.text().await.unwrap_or_default();
    error!(status = status.as_u16(), url = %url, body = %message, "Request failed");
    Err(HttpError::Api {
        status: status.as_u16(),
        message,
    })
}
