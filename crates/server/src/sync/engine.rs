//! Sweep engine: enumerate listings, decide, fetch, upsert.

use std::collections::HashSet;
use std::pin::pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures::StreamExt;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use crate::config::EbayConfig;
use crate::db::{ProductRepository, RepositoryError};
use crate::ebay::{
    CatalogApi, CompatibilityRow, ItemDetail, ItemSummary, VehicleData, extract_vehicle_data,
    search_all,
};
use crate::models::{RemoteProductPayload, StockView, UpsertOutcome};

use super::SyncError;

/// Longest slug prefix kept when building a product link.
const SLUG_MAX_LEN: usize = 60;

/// Store operations the sweep needs.
#[async_trait]
pub trait ProductSync: Send + Sync {
    /// Stock-relevant columns of an already-imported listing, if any.
    async fn stock_view(&self, ebay_item_id: &str)
    -> Result<Option<StockView>, RepositoryError>;

    /// Creates or updates the mirrored product for a payload.
    async fn upsert_remote(
        &self,
        payload: &RemoteProductPayload,
    ) -> Result<UpsertOutcome, RepositoryError>;
}

#[async_trait]
impl ProductSync for PgPool {
    async fn stock_view(
        &self,
        ebay_item_id: &str,
    ) -> Result<Option<StockView>, RepositoryError> {
        ProductRepository::new(self).stock_view(ebay_item_id).await
    }

    async fn upsert_remote(
        &self,
        payload: &RemoteProductPayload,
    ) -> Result<UpsertOutcome, RepositoryError> {
        ProductRepository::new(self).upsert_remote(payload).await
    }
}

/// Sweep parameters, lifted out of [`EbayConfig`] so tests can construct
/// them directly.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Search seeds that together cover the seller's catalog.
    pub query_seeds: Vec<String>,
    /// Browse API page size.
    pub page_size: u32,
    /// Whether to consult the Shopping API when a listing has no fitment.
    pub compatibility_enabled: bool,
}

impl From<&EbayConfig> for SweepConfig {
    fn from(config: &EbayConfig) -> Self {
        Self {
            query_seeds: config.query_seeds.clone(),
            page_size: config.page_size,
            compatibility_enabled: config.compatibility_enabled,
        }
    }
}

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Unique listings seen across all seeds.
    pub seen: usize,
    /// Listings whose detail record was fetched and written.
    pub fetched: usize,
    /// New rows inserted.
    pub created: usize,
    /// Existing rows updated in place.
    pub updated: usize,
    /// Listings left alone (fresh stock or manual rows).
    pub skipped: usize,
    /// Listings whose reconciliation failed.
    pub failed: usize,
}

/// Whether a listing's detail record is worth fetching.
///
/// A listing never imported always is. A manual row never is. Otherwise the
/// summary's stock hint has to disagree with the stored reading
/// (`ebay_stock`, falling back to `count`, then 0), or the hint is unknown
/// while no reading was ever stored. A hint that goes unknown after stock
/// was recorded does not trigger a fetch.
#[must_use]
pub fn needs_detail(summary_stock: Option<i32>, local: Option<&StockView>) -> bool {
    let Some(view) = local else {
        return true;
    };
    if view.is_manual {
        return false;
    }
    match summary_stock {
        None => view.ebay_stock.is_none() && view.count.is_none(),
        Some(hint) => hint != view.ebay_stock.or(view.count).unwrap_or(0),
    }
}

/// Builds a URL slug: lowercase, non-alphanumeric runs collapsed to `-`,
/// dashes trimmed, capped at 60 characters.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(SLUG_MAX_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Builds the upsert payload for one fetched listing.
#[must_use]
pub fn build_product_payload(detail: &ItemDetail, vehicle: &VehicleData) -> RemoteProductPayload {
    let title = detail.title.as_deref().filter(|t| !t.is_empty());

    let description = detail
        .description
        .clone()
        .or_else(|| detail.short_description.clone())
        .unwrap_or_default();

    let price = detail
        .price
        .as_ref()
        .and_then(|p| p.value.as_deref())
        .and_then(|v| Decimal::from_str(v.trim()).ok())
        .unwrap_or(Decimal::ZERO);

    let images: Vec<String> = detail
        .image
        .iter()
        .chain(detail.additional_images.iter())
        .filter_map(|image| image.image_url.clone())
        .collect();

    let stock = detail.stock_hint();

    let legacy_id = detail
        .legacy_item_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| {
            detail
                .item_id
                .split('|')
                .nth(1)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
        });

    let link_tail = legacy_id
        .clone()
        .or_else(|| Some(detail.item_id.clone()).filter(|id| !id.is_empty()))
        .unwrap_or_else(|| "unknown".to_string());
    let link = format!("{}-{}", slugify(title.unwrap_or("ebay-item")), link_tail);

    let category_path: Vec<String> = detail
        .category_path
        .as_deref()
        .unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    let category = category_path.last().cloned();

    RemoteProductPayload {
        ebay_item_id: detail.item_id.clone(),
        name: title.unwrap_or("eBay item").to_string(),
        description,
        price,
        old_price: price,
        images,
        count: stock.unwrap_or(0),
        ebay_stock: stock,
        ebay_legacy_id: legacy_id,
        link,
        ebay_category: category,
        ebay_category_path: category_path,
        ebay_vin: non_empty(&vehicle.vin),
        ebay_year: non_empty(&vehicle.year),
        ebay_model: non_empty(&vehicle.model),
        ebay_vehicle_info: non_empty(&vehicle.vehicle_info),
        ebay_notes: non_empty(&vehicle.notes),
        ebay_also_fits: vehicle.also_fits.clone(),
        ebay_also_fits_raw: vehicle.also_fits_raw.clone(),
        ebay_aspects: serde_json::json!({
            "localizedAspects": detail.localized_aspects,
        }),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Renders Shopping-API compatibility rows into interchange entries
/// (`year make model`, plus trim when present).
fn render_compatibility(rows: &[CompatibilityRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| {
            let entry = ["year", "make", "model", "trim"]
                .iter()
                .filter_map(|name| row.get(name))
                .collect::<Vec<_>>()
                .join(" ");
            (!entry.is_empty()).then_some(entry)
        })
        .collect()
}

/// Runs one full catalog sweep.
///
/// Drains every seed query page-by-page, deduplicates listings across seeds
/// (the Browse API cannot enumerate a seller's catalog in one query, so the
/// seeds are a best-effort cover), then reconciles each unique listing.
/// Per-listing failures are logged and tallied; the sweep always finishes.
#[instrument(skip_all)]
pub async fn run_sweep<C, S>(catalog: &C, store: &S, config: &SweepConfig) -> SweepSummary
where
    C: CatalogApi + ?Sized,
    S: ProductSync + ?Sized,
{
    let mut seen_ids = HashSet::new();
    let mut summaries: Vec<ItemSummary> = Vec::new();

    for seed in &config.query_seeds {
        let mut pages = pin!(search_all(catalog, seed, config.page_size));
        while let Some(page) = pages.next().await {
            match page {
                Ok(items) => {
                    for item in items {
                        if seen_ids.insert(item.item_id.clone()) {
                            summaries.push(item);
                        }
                    }
                }
                Err(error) => {
                    warn!(seed = %seed, error = %error, "Search failed; abandoning seed");
                    break;
                }
            }
        }
    }
    debug!(unique = summaries.len(), "Collected listings across seeds");

    let mut summary = SweepSummary {
        seen: summaries.len(),
        ..SweepSummary::default()
    };

    for item in &summaries {
        match sync_item(catalog, store, config, item).await {
            Ok(None) => summary.skipped += 1,
            Ok(Some(outcome)) => {
                summary.fetched += 1;
                match outcome {
                    UpsertOutcome::Created => summary.created += 1,
                    UpsertOutcome::Updated => summary.updated += 1,
                    UpsertOutcome::SkippedManual => summary.skipped += 1,
                }
            }
            Err(error) => {
                summary.failed += 1;
                warn!(item_id = %item.item_id, error = %error, "Listing reconciliation failed");
            }
        }
    }

    summary
}

/// Reconciles one listing. `Ok(None)` means the listing was fresh enough to
/// leave alone without a detail fetch.
async fn sync_item<C, S>(
    catalog: &C,
    store: &S,
    config: &SweepConfig,
    item: &ItemSummary,
) -> Result<Option<UpsertOutcome>, SyncError>
where
    C: CatalogApi + ?Sized,
    S: ProductSync + ?Sized,
{
    let local = store.stock_view(&item.item_id).await?;
    if !needs_detail(item.stock_hint(), local.as_ref()) {
        return Ok(None);
    }

    let detail = catalog.item_detail(&item.item_id).await?;
    let vehicle = extract_vehicle_data(detail.description.as_deref().unwrap_or(""));
    let mut payload = build_product_payload(&detail, &vehicle);

    if config.compatibility_enabled
        && payload.ebay_also_fits.is_empty()
        && let Some(legacy_id) = payload.ebay_legacy_id.clone()
    {
        // A missing fitment list is not worth failing the whole item over.
        match catalog.compatibility(&legacy_id).await {
            Ok(rows) => payload.ebay_also_fits = render_compatibility(&rows),
            Err(error) => {
                warn!(item_id = %item.item_id, error = %error, "Compatibility fetch failed");
            }
        }
    }

    let outcome = store.upsert_remote(&payload).await?;
    Ok(Some(outcome))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::ebay::{EbayError, SearchPage};

    use super::*;

    fn view(is_manual: bool, ebay_stock: Option<i32>, count: Option<i32>) -> StockView {
        StockView {
            is_manual,
            ebay_stock,
            count,
        }
    }

    #[test]
    fn unknown_listing_needs_detail() {
        assert!(needs_detail(Some(5), None));
        assert!(needs_detail(None, None));
    }

    #[test]
    fn manual_rows_are_never_fetched() {
        let local = view(true, None, None);
        assert!(!needs_detail(Some(5), Some(&local)));
        assert!(!needs_detail(None, Some(&local)));
    }

    #[test]
    fn matching_stock_skips_the_fetch() {
        assert!(!needs_detail(Some(5), Some(&view(false, Some(5), None))));
        // ebay_stock missing, count stands in
        assert!(!needs_detail(Some(3), Some(&view(false, None, Some(3)))));
        // neither reading recorded, hint of zero matches the fallback
        assert!(!needs_detail(Some(0), Some(&view(false, None, None))));
    }

    #[test]
    fn differing_stock_forces_a_fetch() {
        assert!(needs_detail(Some(2), Some(&view(false, Some(5), None))));
        assert!(needs_detail(Some(1), Some(&view(false, None, Some(3)))));
        assert!(needs_detail(Some(4), Some(&view(false, None, None))));
    }

    #[test]
    fn unknown_hint_fetches_only_when_nothing_was_recorded() {
        assert!(needs_detail(None, Some(&view(false, None, None))));
        assert!(!needs_detail(None, Some(&view(false, Some(2), None))));
        assert!(!needs_detail(None, Some(&view(false, None, Some(0)))));
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(
            slugify("2015 Chevy Silverado 5.3L Engine!!"),
            "2015-chevy-silverado-5-3l-engine"
        );
        assert_eq!(slugify("--Tail Light (LH)--"), "tail-light-lh");
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn slugify_caps_length_without_a_trailing_dash() {
        let long = "a b".repeat(40);
        let slug = slugify(&long);
        assert!(slug.len() <= 60);
        assert!(!slug.ends_with('-'));
    }

    fn detail_from(value: serde_json::Value) -> ItemDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn payload_from_a_full_detail_record() {
        let detail = detail_from(serde_json::json!({
            "itemId": "v1|254582474636|0",
            "title": "Engine Assembly 5.3L",
            "description": "<p>runs great</p>",
            "price": { "value": "1249.99", "currency": "USD" },
            "image": { "imageUrl": "https://img/1.jpg" },
            "additionalImages": [
                { "imageUrl": "https://img/2.jpg" },
                {}
            ],
            "categoryPath": "eBay Motors|Parts & Accessories|Engines",
            "estimatedAvailabilities": [{ "estimatedAvailableQuantity": 2 }],
            "localizedAspects": [{ "name": "Brand", "value": "GM" }]
        }));
        let vehicle = VehicleData {
            year: "2015".to_string(),
            vin: "3GCUKREC5FG123456".to_string(),
            also_fits: vec!["2015 Tahoe".to_string()],
            also_fits_raw: "2015 Tahoe".to_string(),
            ..VehicleData::default()
        };

        let payload = build_product_payload(&detail, &vehicle);
        assert_eq!(payload.ebay_item_id, "v1|254582474636|0");
        assert_eq!(payload.name, "Engine Assembly 5.3L");
        assert_eq!(payload.price, Decimal::new(124_999, 2));
        assert_eq!(payload.old_price, payload.price);
        assert_eq!(payload.images, ["https://img/1.jpg", "https://img/2.jpg"]);
        assert_eq!(payload.count, 2);
        assert_eq!(payload.ebay_stock, Some(2));
        assert_eq!(payload.ebay_legacy_id.as_deref(), Some("254582474636"));
        assert_eq!(payload.link, "engine-assembly-5-3l-254582474636");
        assert_eq!(payload.ebay_category.as_deref(), Some("Engines"));
        assert_eq!(
            payload.ebay_category_path,
            ["eBay Motors", "Parts & Accessories", "Engines"]
        );
        assert_eq!(payload.ebay_year.as_deref(), Some("2015"));
        assert_eq!(payload.ebay_model, None);
        assert_eq!(payload.ebay_also_fits, ["2015 Tahoe"]);
        assert_eq!(
            payload.ebay_aspects["localizedAspects"][0]["name"],
            "Brand"
        );
    }

    #[test]
    fn payload_falls_back_field_by_field() {
        let detail = detail_from(serde_json::json!({
            "itemId": "abc",
            "shortDescription": "short",
            "price": { "value": "not-a-number" }
        }));

        let payload = build_product_payload(&detail, &VehicleData::default());
        assert_eq!(payload.name, "eBay item");
        assert_eq!(payload.description, "short");
        assert_eq!(payload.price, Decimal::ZERO);
        assert_eq!(payload.count, 0);
        assert_eq!(payload.ebay_stock, None);
        assert_eq!(payload.ebay_legacy_id, None);
        assert_eq!(payload.link, "ebay-item-abc");
        assert_eq!(payload.ebay_category, None);
        assert!(payload.ebay_category_path.is_empty());
    }

    #[test]
    fn compatibility_rows_render_to_entries() {
        let mut full = CompatibilityRow::default();
        full.values.insert("year".to_string(), "2009".to_string());
        full.values.insert("make".to_string(), "Chevrolet".to_string());
        full.values.insert("model".to_string(), "Tahoe".to_string());
        full.values.insert("trim".to_string(), "LT".to_string());

        let mut partial = CompatibilityRow::default();
        partial.values.insert("make".to_string(), "GMC".to_string());
        partial.values.insert("model".to_string(), "Yukon".to_string());

        let rows = vec![full, partial, CompatibilityRow::default()];
        assert_eq!(
            render_compatibility(&rows),
            ["2009 Chevrolet Tahoe LT", "GMC Yukon"]
        );
    }

    /// Scripted remote side: one flat item list per seed, detail records and
    /// compatibility rows by id.
    #[derive(Default)]
    struct FakeCatalog {
        pages: HashMap<String, Vec<ItemSummary>>,
        details: HashMap<String, ItemDetail>,
        compatibility: HashMap<String, Vec<CompatibilityRow>>,
        detail_calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CatalogApi for FakeCatalog {
        async fn search_page(
            &self,
            query: &str,
            limit: u32,
            offset: u32,
        ) -> Result<SearchPage, EbayError> {
            let items = self.pages.get(query).cloned().unwrap_or_default();
            let start = offset as usize;
            let end = usize::min(start + limit as usize, items.len());
            let page = if start < items.len() {
                items[start..end].to_vec()
            } else {
                Vec::new()
            };
            Ok(SearchPage {
                total: u32::try_from(items.len()).unwrap(),
                items: page,
            })
        }

        async fn item_detail(&self, item_id: &str) -> Result<ItemDetail, EbayError> {
            self.detail_calls.lock().unwrap().push(item_id.to_string());
            self.details.get(item_id).cloned().ok_or(EbayError::Api {
                status: 404,
                body: "no such item".to_string(),
            })
        }

        async fn compatibility(
            &self,
            legacy_item_id: &str,
        ) -> Result<Vec<CompatibilityRow>, EbayError> {
            Ok(self
                .compatibility
                .get(legacy_item_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    /// In-memory store that tracks stock views and records every upsert.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<String, StockView>>,
        upserts: Mutex<Vec<RemoteProductPayload>>,
    }

    #[async_trait]
    impl ProductSync for MemoryStore {
        async fn stock_view(
            &self,
            ebay_item_id: &str,
        ) -> Result<Option<StockView>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(ebay_item_id).copied())
        }

        async fn upsert_remote(
            &self,
            payload: &RemoteProductPayload,
        ) -> Result<UpsertOutcome, RepositoryError> {
            self.upserts.lock().unwrap().push(payload.clone());
            let mut rows = self.rows.lock().unwrap();
            let outcome = match rows.get(&payload.ebay_item_id) {
                Some(existing) if existing.is_manual => return Ok(UpsertOutcome::SkippedManual),
                Some(_) => UpsertOutcome::Updated,
                None => UpsertOutcome::Created,
            };
            rows.insert(
                payload.ebay_item_id.clone(),
                StockView {
                    is_manual: false,
                    ebay_stock: payload.ebay_stock,
                    count: Some(payload.count),
                },
            );
            Ok(outcome)
        }
    }

    fn summary_with_stock(item_id: &str, stock: Option<i32>) -> ItemSummary {
        let availabilities = stock
            .map(|s| vec![serde_json::json!({ "estimatedAvailableQuantity": s })])
            .unwrap_or_default();
        serde_json::from_value(serde_json::json!({
            "itemId": item_id,
            "estimatedAvailabilities": availabilities,
        }))
        .unwrap()
    }

    fn plain_detail(item_id: &str, title: &str, stock: i32) -> ItemDetail {
        detail_from(serde_json::json!({
            "itemId": item_id,
            "title": title,
            "price": { "value": "10.00" },
            "estimatedAvailabilities": [{ "estimatedAvailableQuantity": stock }],
        }))
    }

    fn sweep_config(seeds: &[&str]) -> SweepConfig {
        SweepConfig {
            query_seeds: seeds.iter().map(|s| (*s).to_string()).collect(),
            page_size: 2,
            compatibility_enabled: true,
        }
    }

    #[tokio::test]
    async fn sweep_reconciles_only_what_changed() {
        let mut catalog = FakeCatalog::default();
        catalog.pages.insert(
            "a".to_string(),
            vec![
                summary_with_stock("fresh", Some(5)),
                summary_with_stock("stale", Some(3)),
            ],
        );
        catalog.pages.insert(
            "b".to_string(),
            vec![
                summary_with_stock("stale", Some(3)),
                summary_with_stock("manual", Some(9)),
                summary_with_stock("broken", Some(1)),
            ],
        );
        catalog
            .details
            .insert("stale".to_string(), plain_detail("stale", "Axle", 3));

        let store = MemoryStore::default();
        {
            let mut rows = store.rows.lock().unwrap();
            rows.insert("fresh".to_string(), view(false, Some(5), None));
            rows.insert("manual".to_string(), view(true, None, Some(1)));
        }

        let summary = run_sweep(&catalog, &store, &sweep_config(&["a", "b"])).await;

        assert_eq!(
            summary,
            SweepSummary {
                seen: 4,
                fetched: 1,
                created: 1,
                updated: 0,
                skipped: 2,
                failed: 1,
            }
        );
        assert_eq!(*catalog.detail_calls.lock().unwrap(), ["stale", "broken"]);

        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].name, "Axle");
        assert_eq!(upserts[0].count, 3);
    }

    #[tokio::test]
    async fn second_sweep_with_unchanged_stock_is_quiet() {
        let mut catalog = FakeCatalog::default();
        catalog
            .pages
            .insert("a".to_string(), vec![summary_with_stock("x", Some(7))]);
        catalog
            .details
            .insert("x".to_string(), plain_detail("x", "Hub", 7));
        let store = MemoryStore::default();
        let config = sweep_config(&["a"]);

        let first = run_sweep(&catalog, &store, &config).await;
        assert_eq!(first.created, 1);

        let second = run_sweep(&catalog, &store, &config).await;
        assert_eq!(second.skipped, 1);
        assert_eq!(second.fetched, 0);
        assert_eq!(*catalog.detail_calls.lock().unwrap(), ["x"]);
    }

    #[tokio::test]
    async fn missing_fitment_is_filled_from_compatibility() {
        let mut catalog = FakeCatalog::default();
        catalog
            .pages
            .insert("a".to_string(), vec![summary_with_stock("v1|77|0", Some(1))]);
        catalog
            .details
            .insert("v1|77|0".to_string(), plain_detail("v1|77|0", "Mirror", 1));

        let mut row = CompatibilityRow::default();
        row.values.insert("year".to_string(), "2012".to_string());
        row.values.insert("make".to_string(), "Ford".to_string());
        row.values.insert("model".to_string(), "F-150".to_string());
        catalog.compatibility.insert("77".to_string(), vec![row]);

        let store = MemoryStore::default();
        run_sweep(&catalog, &store, &sweep_config(&["a"])).await;

        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts[0].ebay_also_fits, ["2012 Ford F-150"]);
    }
}
