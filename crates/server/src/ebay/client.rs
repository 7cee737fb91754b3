//! Browse and Shopping API client with a shared token cache.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::EbayConfig;

use super::EbayError;
use super::auth::{Token, fetch_token};
use super::types::{CompatibilityRow, ItemDetail, ItemSummary, SearchPage};

const BROWSE_ENDPOINT: &str = "https://api.ebay.com/buy/browse/v1";
const SHOPPING_ENDPOINT: &str = "https://open.api.ebay.com/shopping";
const MARKETPLACE_HEADER: &str = "X-EBAY-C-MARKETPLACE-ID";
const IAF_TOKEN_HEADER: &str = "X-EBAY-API-IAF-TOKEN";

/// Catalog operations the sweep engine consumes.
///
/// [`EbayClient`] is the production implementation; tests substitute scripted
/// fakes.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetches one page of the seller's listings matching `query`.
    async fn search_page(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchPage, EbayError>;

    /// Fetches the full record for one listing.
    async fn item_detail(&self, item_id: &str) -> Result<ItemDetail, EbayError>;

    /// Fetches the vehicle compatibility list for a legacy item id.
    async fn compatibility(
        &self,
        legacy_item_id: &str,
    ) -> Result<Vec<CompatibilityRow>, EbayError>;
}

/// eBay API client.
///
/// Cheap to clone; clones share one HTTP connection pool and one cached
/// token.
#[derive(Clone)]
pub struct EbayClient {
    inner: Arc<EbayClientInner>,
}

struct EbayClientInner {
    client: reqwest::Client,
    config: EbayConfig,
    token: RwLock<Option<Token>>,
}

impl EbayClient {
    /// Creates a new client. No network traffic happens until the first
    /// call needs a token.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be created.
    #[must_use]
    pub fn new(config: EbayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(EbayClientInner {
                client,
                config,
                token: RwLock::new(None),
            }),
        }
    }

    /// Returns a valid access token, refreshing the cached one when it is
    /// missing or inside the expiry buffer.
    async fn access_token(&self) -> Result<String, EbayError> {
        let now = Utc::now();

        {
            let guard = self.inner.token.read().await;
            if let Some(token) = guard.as_ref()
                && !token.is_expired(now)
            {
                return Ok(token.access_token.expose_secret().to_string());
            }
        }

        let mut guard = self.inner.token.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref()
            && !token.is_expired(now)
        {
            return Ok(token.access_token.expose_secret().to_string());
        }

        debug!("Refreshing eBay access token");
        let token = fetch_token(
            &self.inner.client,
            &self.inner.config.client_id,
            &self.inner.config.client_secret,
            now,
        )
        .await?;
        let access = token.access_token.expose_secret().to_string();
        *guard = Some(token);
        Ok(access)
    }
}

#[async_trait]
impl CatalogApi for EbayClient {
    #[instrument(skip(self))]
    async fn search_page(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchPage, EbayError> {
        let token = self.access_token().await?;
        let params = [
            ("q", query.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            (
                "filter",
                format!("sellers:{{{}}}", self.inner.config.seller_id),
            ),
        ];

        let response = self
            .inner
            .client
            .get(format!("{BROWSE_ENDPOINT}/item_summary/search"))
            .query(&params)
            .bearer_auth(&token)
            .header(MARKETPLACE_HEADER, &self.inner.config.marketplace)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: SearchResponse = response.json().await?;
        let total = body
            .total
            .unwrap_or_else(|| u32::try_from(body.item_summaries.len()).unwrap_or(u32::MAX));
        Ok(SearchPage {
            items: body.item_summaries,
            total,
        })
    }

    #[instrument(skip(self))]
    async fn item_detail(&self, item_id: &str) -> Result<ItemDetail, EbayError> {
        if item_id.is_empty() {
            return Err(EbayError::MissingItemId);
        }

        let token = self.access_token().await?;
        let response = self
            .inner
            .client
            .get(format!("{BROWSE_ENDPOINT}/item/{item_id}"))
            .bearer_auth(&token)
            .header(MARKETPLACE_HEADER, &self.inner.config.marketplace)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    async fn compatibility(
        &self,
        legacy_item_id: &str,
    ) -> Result<Vec<CompatibilityRow>, EbayError> {
        if legacy_item_id.is_empty() {
            return Err(EbayError::MissingItemId);
        }

        let token = self.access_token().await?;
        let params = [
            ("callname", "GetSingleItem"),
            ("responseencoding", "JSON"),
            ("siteid", "0"),
            ("version", "967"),
            ("ItemID", legacy_item_id),
            ("IncludeSelector", "Compatibility"),
        ];

        let response = self
            .inner
            .client
            .get(SHOPPING_ENDPOINT)
            .query(&params)
            .header(IAF_TOKEN_HEADER, &token)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: ShoppingResponse = response.json().await?;
        if body.ack.as_deref() != Some("Success") {
            let message = body
                .errors
                .into_iter()
                .next()
                .and_then(|e| e.long_message.or(e.short_message))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(EbayError::Compatibility(message));
        }

        Ok(flatten_compatibility(body.item))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EbayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(EbayError::Api {
        status: status.as_u16(),
        body,
    })
}

fn flatten_compatibility(item: Option<ShoppingItem>) -> Vec<CompatibilityRow> {
    let entries = item
        .and_then(|i| i.item_compatibility_list)
        .map(|l| l.compatibility)
        .unwrap_or_default();

    entries
        .into_iter()
        .map(|entry| {
            let values = entry
                .name_value_list
                .into_iter()
                .filter_map(|nv| Some((nv.name?.to_lowercase(), nv.value?)))
                .collect();
            CompatibilityRow {
                values,
                notes: entry.compatibility_notes,
            }
        })
        .collect()
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    item_summaries: Vec<ItemSummary>,
    #[serde(default)]
    total: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShoppingResponse {
    #[serde(default)]
    ack: Option<String>,
    #[serde(default)]
    errors: Vec<ShoppingError>,
    #[serde(default)]
    item: Option<ShoppingItem>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShoppingError {
    #[serde(default)]
    long_message: Option<String>,
    #[serde(default)]
    short_message: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShoppingItem {
    #[serde(default)]
    item_compatibility_list: Option<CompatibilityList>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompatibilityList {
    #[serde(default)]
    compatibility: Vec<CompatibilityEntry>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompatibilityEntry {
    #[serde(default)]
    name_value_list: Vec<NameValue>,
    #[serde(default)]
    compatibility_notes: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NameValue {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn shopping_response_flattens_to_rows() {
        let body: ShoppingResponse = serde_json::from_value(serde_json::json!({
            "Ack": "Success",
            "Item": {
                "ItemCompatibilityList": {
                    "Compatibility": [
                        {
                            "NameValueList": [
                                { "Name": "Year", "Value": "2009" },
                                { "Name": "Make", "Value": "Chevrolet" },
                                { "Name": "Model", "Value": "Tahoe" }
                            ],
                            "CompatibilityNotes": "5.3L only"
                        },
                        {
                            "NameValueList": [
                                { "Name": "Year", "Value": "2010" },
                                { "Name": "Make", "Value": "GMC" },
                                { "Name": "Model", "Value": "Yukon" }
                            ]
                        }
                    ]
                }
            }
        }))
        .unwrap();

        let rows = flatten_compatibility(body.item);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("year"), Some("2009"));
        assert_eq!(rows[0].get("make"), Some("Chevrolet"));
        assert_eq!(rows[0].notes.as_deref(), Some("5.3L only"));
        assert_eq!(rows[1].get("model"), Some("Yukon"));
        assert_eq!(rows[1].notes, None);
    }

    #[test]
    fn nameless_pairs_are_dropped() {
        let rows = flatten_compatibility(Some(ShoppingItem {
            item_compatibility_list: Some(CompatibilityList {
                compatibility: vec![CompatibilityEntry {
                    name_value_list: vec![
                        NameValue {
                            name: None,
                            value: Some("2009".to_string()),
                        },
                        NameValue {
                            name: Some("Make".to_string()),
                            value: Some("Ford".to_string()),
                        },
                    ],
                    compatibility_notes: None,
                }],
            }),
        }));

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values.len(), 1);
        assert_eq!(rows[0].get("make"), Some("Ford"));
    }

    #[test]
    fn missing_item_yields_no_rows() {
        assert!(flatten_compatibility(None).is_empty());
    }

    #[test]
    fn search_response_tolerates_missing_fields() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(body.item_summaries.is_empty());
        assert_eq!(body.total, None);
    }
}
