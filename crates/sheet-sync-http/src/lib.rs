//! HTTP adapters for the sheet sync reconciler.
//!
//! This crate provides:
//! - SheetBackendClient: `SheetSyncClient` over the spreadsheet service's REST API
//! - RestEventStore: `EventStore` over a PostgREST-style data API

mod error;
mod sheets;
mod store;

pub use error::{HttpError, HttpResult};
pub use sheets::{SheetBackendClient, DEFAULT_REQUEST_TIMEOUT};
pub use store::RestEventStore;
