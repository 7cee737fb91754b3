//! Integration tests for the catalog reconciliation sweep.
//!
//! These run the real sweep engine against a scripted catalog and an
//! in-memory store, covering the fetch-decision policy, seed handling, and
//! failure isolation.

use rust_decimal::Decimal;

use partsmith_integration_tests::catalog::{
    MemoryProducts, ScriptedCatalog, detail, fitment, summary,
};
use partsmith_server::models::StockView;
use partsmith_server::sync::{SweepConfig, run_sweep};

fn config(seeds: &[&str], page_size: u32) -> SweepConfig {
    SweepConfig {
        query_seeds: seeds.iter().map(ToString::to_string).collect(),
        page_size,
        compatibility_enabled: false,
    }
}

// =============================================================================
// Fetch Decision
// =============================================================================

#[tokio::test]
async fn test_new_listings_are_fetched_and_created() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|100|0", Some(3))]]);
    catalog.script_detail(detail("v1|100|0", "Brake Caliper Front Left", "49.99", 3));

    let tally = run_sweep(&catalog, &store, &config(&["a"], 50)).await;

    assert_eq!(tally.seen, 1);
    assert_eq!(tally.fetched, 1);
    assert_eq!(tally.created, 1);
    assert_eq!(tally.failed, 0);

    let upserts = store.upserts();
    assert_eq!(upserts.len(), 1);
    let payload = &upserts[0];
    assert_eq!(payload.ebay_item_id, "v1|100|0");
    assert_eq!(payload.name, "Brake Caliper Front Left");
    assert_eq!(payload.price, Decimal::new(4999, 2));
    assert_eq!(payload.count, 3);
    assert_eq!(payload.ebay_stock, Some(3));
    // No legacyItemId on the detail, so the id's middle segment serves.
    assert_eq!(payload.link, "brake-caliper-front-left-100");
}

#[tokio::test]
async fn test_fresh_listings_skip_the_detail_fetch() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|100|0", Some(5))]]);
    store.seed(
        "v1|100|0",
        StockView {
            is_manual: false,
            ebay_stock: Some(5),
            count: Some(5),
        },
    );

    let tally = run_sweep(&catalog, &store, &config(&["a"], 50)).await;

    assert_eq!(tally.skipped, 1);
    assert_eq!(tally.fetched, 0);
    assert!(catalog.detail_calls().is_empty(), "stock agrees, no fetch");
    assert!(store.upserts().is_empty());
}

#[tokio::test]
async fn test_stock_drift_triggers_a_refetch() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|100|0", Some(2))]]);
    catalog.script_detail(detail("v1|100|0", "Brake Caliper", "49.99", 2));
    store.seed(
        "v1|100|0",
        StockView {
            is_manual: false,
            ebay_stock: Some(5),
            count: Some(5),
        },
    );

    let tally = run_sweep(&catalog, &store, &config(&["a"], 50)).await;

    assert_eq!(tally.fetched, 1);
    assert_eq!(tally.updated, 1);
    assert_eq!(store.upserts()[0].ebay_stock, Some(2));
}

#[tokio::test]
async fn test_manual_rows_are_never_touched() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|100|0", Some(0))]]);
    store.seed(
        "v1|100|0",
        StockView {
            is_manual: true,
            ebay_stock: None,
            count: Some(12),
        },
    );

    let tally = run_sweep(&catalog, &store, &config(&["a"], 50)).await;

    assert_eq!(tally.skipped, 1);
    assert!(catalog.detail_calls().is_empty(), "manual rows never fetch");
    assert!(store.upserts().is_empty());
}

#[tokio::test]
async fn test_a_second_sweep_leaves_fresh_rows_alone() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|100|0", Some(3))]]);
    catalog.script_detail(detail("v1|100|0", "Brake Caliper", "49.99", 3));

    let first = run_sweep(&catalog, &store, &config(&["a"], 50)).await;
    assert_eq!(first.created, 1);

    // Same listing, same stock, next sweep.
    catalog.script_pages("a", vec![vec![summary("v1|100|0", Some(3))]]);
    let second = run_sweep(&catalog, &store, &config(&["a"], 50)).await;

    assert_eq!(second.skipped, 1);
    assert_eq!(second.fetched, 0);
    assert_eq!(store.upserts().len(), 1, "the first sweep's write satisfied the second");
}

// =============================================================================
// Seeds and Pagination
// =============================================================================

#[tokio::test]
async fn test_seeds_deduplicate_shared_listings() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|100|0", Some(1))]]);
    catalog.script_pages("e", vec![vec![summary("v1|100|0", Some(1))]]);
    catalog.script_detail(detail("v1|100|0", "Brake Caliper", "49.99", 1));

    let tally = run_sweep(&catalog, &store, &config(&["a", "e"], 50)).await;

    assert_eq!(tally.seen, 1, "the listing counts once across seeds");
    assert_eq!(catalog.detail_calls().len(), 1);
    assert_eq!(store.upserts().len(), 1);
}

#[tokio::test]
async fn test_pagination_walks_full_pages() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages(
        "a",
        vec![
            vec![summary("v1|1|0", Some(1)), summary("v1|2|0", Some(1))],
            vec![summary("v1|3|0", Some(1))],
        ],
    );
    for id in ["v1|1|0", "v1|2|0", "v1|3|0"] {
        catalog.script_detail(detail(id, "Part", "10.00", 1));
    }

    let tally = run_sweep(&catalog, &store, &config(&["a"], 2)).await;

    assert_eq!(tally.seen, 3);
    assert_eq!(
        catalog.search_calls(),
        vec![("a".to_string(), 0), ("a".to_string(), 2)],
        "the short second page ends the walk"
    );
}

// =============================================================================
// Failure Isolation
// =============================================================================

#[tokio::test]
async fn test_a_failing_seed_abandons_only_that_seed() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.fail_seed("a");
    catalog.script_pages("e", vec![vec![summary("v1|200|0", Some(1))]]);
    catalog.script_detail(detail("v1|200|0", "Tail Light", "25.00", 1));

    let tally = run_sweep(&catalog, &store, &config(&["a", "e"], 50)).await;

    assert_eq!(tally.seen, 1, "the healthy seed still contributed");
    assert_eq!(tally.created, 1);
    assert_eq!(store.upserted_ids(), vec!["v1|200|0".to_string()]);
}

#[tokio::test]
async fn test_a_failing_detail_fetch_is_tallied_not_fatal() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages(
        "a",
        vec![vec![summary("v1|300|0", Some(1)), summary("v1|301|0", Some(1))]],
    );
    catalog.fail_detail("v1|300|0");
    catalog.script_detail(detail("v1|301|0", "Mirror", "15.00", 1));

    let tally = run_sweep(&catalog, &store, &config(&["a"], 50)).await;

    assert_eq!(tally.failed, 1);
    assert_eq!(tally.created, 1);
    assert_eq!(store.upserted_ids(), vec!["v1|301|0".to_string()]);
}

// =============================================================================
// Compatibility Backfill
// =============================================================================

fn compat_config(seeds: &[&str]) -> SweepConfig {
    SweepConfig {
        compatibility_enabled: true,
        ..config(seeds, 50)
    }
}

#[tokio::test]
async fn test_missing_fitment_is_backfilled_from_the_shopping_api() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|400|0", Some(1))]]);
    let mut record = detail("v1|400|0", "Door Handle", "19.99", 1);
    record.legacy_item_id = Some("400".to_string());
    catalog.script_detail(record);
    catalog.script_compatibility(
        "400",
        vec![fitment("2015", "Ford", "F-150"), fitment("2016", "Ford", "F-150")],
    );

    let tally = run_sweep(&catalog, &store, &compat_config(&["a"])).await;

    assert_eq!(tally.created, 1);
    assert_eq!(catalog.compatibility_calls(), vec!["400".to_string()]);
    assert_eq!(
        store.upserts()[0].ebay_also_fits,
        vec!["2015 Ford F-150".to_string(), "2016 Ford F-150".to_string()]
    );
}

#[tokio::test]
async fn test_listings_with_inline_fitment_skip_the_shopping_api() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|401|0", Some(1))]]);
    let mut record = detail("v1|401|0", "Door Handle", "19.99", 1);
    record.legacy_item_id = Some("401".to_string());
    record.description = Some(
        "<ul><li id=\"cpcm_info-interchange\"><span class=\"cpcm_label-content\">\
         2015 Ford F-150<br>2016 Ford F-150</span></li></ul>"
            .to_string(),
    );
    catalog.script_detail(record);

    let tally = run_sweep(&catalog, &store, &compat_config(&["a"])).await;

    assert_eq!(tally.created, 1);
    assert!(
        catalog.compatibility_calls().is_empty(),
        "the description already carried the interchange list"
    );
    assert_eq!(
        store.upserts()[0].ebay_also_fits,
        vec!["2015 Ford F-150".to_string(), "2016 Ford F-150".to_string()]
    );
}

#[tokio::test]
async fn test_compatibility_failures_do_not_lose_the_listing() {
    let catalog = ScriptedCatalog::new();
    let store = MemoryProducts::new();
    catalog.script_pages("a", vec![vec![summary("v1|402|0", Some(1))]]);
    let mut record = detail("v1|402|0", "Door Handle", "19.99", 1);
    record.legacy_item_id = Some("402".to_string());
    catalog.script_detail(record);
    catalog.fail_compatibility("402");

    let tally = run_sweep(&catalog, &store, &compat_config(&["a"])).await;

    assert_eq!(tally.created, 1, "the listing lands without its fitment list");
    assert_eq!(tally.failed, 0);
    assert!(store.upserts()[0].ebay_also_fits.is_empty());
}
