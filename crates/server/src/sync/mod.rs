//! Catalog reconciliation against eBay.
//!
//! A sweep enumerates the store's listings through seed queries, decides per
//! listing whether the expensive detail fetch is worthwhile, and reconciles
//! mirrored products in the database. Manual products are never touched.
//!
//! # Architecture
//!
//! The engine is generic over two seams: [`crate::ebay::CatalogApi`] for the
//! remote side and [`ProductSync`] for the store side, so the whole decision
//! logic runs in tests against scripted fakes. `job.rs` wires the real
//! client and pool onto a tokio interval.

pub mod engine;
pub mod job;

pub use engine::{
    ProductSync, SweepConfig, SweepSummary, build_product_payload, needs_detail, run_sweep,
    slugify,
};
pub use job::spawn_sync_job;

use thiserror::Error;

use crate::db::RepositoryError;
use crate::ebay::EbayError;

/// Failure of a single listing's reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The catalog API call failed.
    #[error(transparent)]
    Catalog(#[from] EbayError),

    /// The store read or write failed.
    #[error(transparent)]
    Store(#[from] RepositoryError),
}
