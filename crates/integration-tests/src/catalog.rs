//! Scripted eBay catalog and an in-memory product store for sweep tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use partsmith_server::db::RepositoryError;
use partsmith_server::ebay::{
    CatalogApi, CompatibilityRow, EbayError, ItemDetail, ItemSummary, SearchPage,
};
use partsmith_server::models::{RemoteProductPayload, StockView, UpsertOutcome};
use partsmith_server::sync::ProductSync;

/// Serves scripted search pages and detail records, recording every call.
///
/// Unknown seeds return an empty page so the sweep moves on; unknown item
/// ids fail the detail fetch, which is what the real API does for a listing
/// that vanished between search and fetch.
#[derive(Default)]
pub struct ScriptedCatalog {
    pages: Mutex<HashMap<String, Vec<SearchPage>>>,
    details: Mutex<HashMap<String, ItemDetail>>,
    compatibility: Mutex<HashMap<String, Vec<CompatibilityRow>>>,
    failing_seeds: Mutex<HashSet<String>>,
    failing_details: Mutex<HashSet<String>>,
    failing_compatibility: Mutex<HashSet<String>>,
    search_calls: Mutex<Vec<(String, u32)>>,
    detail_calls: Mutex<Vec<String>>,
    compatibility_calls: Mutex<Vec<String>>,
}

impl ScriptedCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the search pages served for a seed, in order.
    pub fn script_pages(&self, seed: &str, pages: Vec<Vec<ItemSummary>>) {
        let pages = pages
            .into_iter()
            .map(|items| {
                let total = u32::try_from(items.len()).unwrap();
                SearchPage { items, total }
            })
            .collect();
        self.pages.lock().unwrap().insert(seed.to_string(), pages);
    }

    /// Serve this detail record for its item id.
    pub fn script_detail(&self, detail: ItemDetail) {
        self.details.lock().unwrap().insert(detail.item_id.clone(), detail);
    }

    /// Serve these fitment rows for a legacy item id.
    pub fn script_compatibility(&self, legacy_id: &str, rows: Vec<CompatibilityRow>) {
        self.compatibility.lock().unwrap().insert(legacy_id.to_string(), rows);
    }

    /// Make every search for this seed fail.
    pub fn fail_seed(&self, seed: &str) {
        self.failing_seeds.lock().unwrap().insert(seed.to_string());
    }

    /// Make the detail fetch for this item id fail.
    pub fn fail_detail(&self, item_id: &str) {
        self.failing_details.lock().unwrap().insert(item_id.to_string());
    }

    /// Make the compatibility lookup for this legacy id fail.
    pub fn fail_compatibility(&self, legacy_id: &str) {
        self.failing_compatibility.lock().unwrap().insert(legacy_id.to_string());
    }

    /// Item ids whose detail record was fetched, in order.
    #[must_use]
    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }

    /// `(seed, offset)` pairs, in request order.
    #[must_use]
    pub fn search_calls(&self) -> Vec<(String, u32)> {
        self.search_calls.lock().unwrap().clone()
    }

    /// Legacy ids the compatibility endpoint was asked about, in order.
    #[must_use]
    pub fn compatibility_calls(&self) -> Vec<String> {
        self.compatibility_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogApi for ScriptedCatalog {
    async fn search_page(
        &self,
        query: &str,
        _limit: u32,
        offset: u32,
    ) -> Result<SearchPage, EbayError> {
        self.search_calls.lock().unwrap().push((query.to_string(), offset));
        if self.failing_seeds.lock().unwrap().contains(query) {
            return Err(EbayError::Api {
                status: 503,
                body: "scripted outage".to_string(),
            });
        }
        let mut pages = self.pages.lock().unwrap();
        Ok(match pages.get_mut(query) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => SearchPage {
                items: Vec::new(),
                total: 0,
            },
        })
    }

    async fn item_detail(&self, item_id: &str) -> Result<ItemDetail, EbayError> {
        self.detail_calls.lock().unwrap().push(item_id.to_string());
        if self.failing_details.lock().unwrap().contains(item_id) {
            return Err(EbayError::Api {
                status: 500,
                body: "scripted outage".to_string(),
            });
        }
        self.details
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or(EbayError::MissingItemId)
    }

    async fn compatibility(
        &self,
        legacy_item_id: &str,
    ) -> Result<Vec<CompatibilityRow>, EbayError> {
        self.compatibility_calls.lock().unwrap().push(legacy_item_id.to_string());
        if self.failing_compatibility.lock().unwrap().contains(legacy_item_id) {
            return Err(EbayError::Compatibility("scripted failure".to_string()));
        }
        Ok(self
            .compatibility
            .lock()
            .unwrap()
            .get(legacy_item_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory store side of the sweep.
///
/// Seed it with [`StockView`]s for already-imported listings. Upserts are
/// recorded and update the stored view, so a second sweep reads what the
/// first one wrote.
#[derive(Default)]
pub struct MemoryProducts {
    views: Mutex<HashMap<String, StockView>>,
    upserts: Mutex<Vec<RemoteProductPayload>>,
}

impl MemoryProducts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend this listing was imported earlier.
    pub fn seed(&self, ebay_item_id: &str, view: StockView) {
        self.views.lock().unwrap().insert(ebay_item_id.to_string(), view);
    }

    /// Every payload written, in order.
    #[must_use]
    pub fn upserts(&self) -> Vec<RemoteProductPayload> {
        self.upserts.lock().unwrap().clone()
    }

    /// Item ids of the payloads written, in order.
    #[must_use]
    pub fn upserted_ids(&self) -> Vec<String> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .map(|payload| payload.ebay_item_id.clone())
            .collect()
    }
}

#[async_trait]
impl ProductSync for MemoryProducts {
    async fn stock_view(
        &self,
        ebay_item_id: &str,
    ) -> Result<Option<StockView>, RepositoryError> {
        Ok(self.views.lock().unwrap().get(ebay_item_id).copied())
    }

    async fn upsert_remote(
        &self,
        payload: &RemoteProductPayload,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let mut views = self.views.lock().unwrap();
        let outcome = match views.get(&payload.ebay_item_id) {
            Some(view) if view.is_manual => return Ok(UpsertOutcome::SkippedManual),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        views.insert(
            payload.ebay_item_id.clone(),
            StockView {
                is_manual: false,
                ebay_stock: payload.ebay_stock,
                count: Some(payload.count),
            },
        );
        self.upserts.lock().unwrap().push(payload.clone());
        Ok(outcome)
    }
}

/// Search summary with an optional availability block.
#[must_use]
pub fn summary(item_id: &str, stock: Option<i32>) -> ItemSummary {
    let mut object = json!({ "itemId": item_id });
    if let Some(stock) = stock {
        object["estimatedAvailabilities"] = json!([{ "estimatedAvailableQuantity": stock }]);
    }
    serde_json::from_value(object).unwrap()
}

/// Detail record with a title, a price, and an availability block. Tests
/// that need more set the public fields directly.
#[must_use]
pub fn detail(item_id: &str, title: &str, price: &str, stock: i32) -> ItemDetail {
    serde_json::from_value(json!({
        "itemId": item_id,
        "title": title,
        "price": { "value": price, "currency": "USD" },
        "estimatedAvailabilities": [{ "estimatedAvailableQuantity": stock }],
    }))
    .unwrap()
}

/// Shopping API fitment row with lower-cased names, as the client flattens
/// them.
#[must_use]
pub fn fitment(year: &str, make: &str, model: &str) -> CompatibilityRow {
    CompatibilityRow {
        values: HashMap::from([
            ("year".to_string(), year.to_string()),
            ("make".to_string(), make.to_string()),
            ("model".to_string(), model.to_string()),
        ]),
        notes: None,
    }
}
