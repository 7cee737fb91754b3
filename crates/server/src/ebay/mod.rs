//! eBay API client.
//!
//! Talks to two generations of eBay APIs:
//!
//! - the Buy Browse API for listing search and item detail, authenticated
//!   with a cached OAuth client-credentials token;
//! - the legacy Shopping API for vehicle compatibility lists, which the
//!   Browse API still does not expose.
//!
//! The catalog sweep consumes this module through the [`CatalogApi`] seam so
//! tests can script responses without a network.

pub mod auth;
pub mod client;
pub mod description;
pub mod pagination;
pub mod types;

pub use client::{CatalogApi, EbayClient};
pub use description::{VehicleData, extract_vehicle_data};
pub use pagination::search_all;
pub use types::{CompatibilityRow, ItemDetail, ItemSummary, SearchPage};

use thiserror::Error;

/// Errors that can occur when interacting with the eBay APIs.
#[derive(Debug, Error)]
pub enum EbayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token endpoint rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Browse API returned a non-2xx response.
    #[error("eBay API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// An item id was required but empty.
    #[error("Item ID is required")]
    MissingItemId,

    /// Shopping API acknowledged the call with a failure.
    #[error("Compatibility lookup failed: {0}")]
    Compatibility(String),
}
