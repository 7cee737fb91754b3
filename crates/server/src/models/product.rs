//! Product domain types.
//!
//! Products enter the catalog two ways: rows created by hand (`is_manual`),
//! and rows mirrored from the store's eBay listings by the catalog sweep.
//! The sweep never writes a manual row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use partsmith_core::ProductId;

/// A catalog product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// URL slug, unique across the catalog.
    pub link: String,
    /// Display name.
    pub name: String,
    /// Long description (may contain listing HTML).
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Strike-through price, when the listing advertises one.
    pub old_price: Option<Decimal>,
    /// Units in stock; `None` means never observed.
    pub count: Option<i32>,
    /// Shipping weight.
    pub weight: Option<Decimal>,
    /// Image URLs, primary first.
    pub images: Vec<String>,
    /// Operator-created row; off for mirrored listings.
    pub is_manual: bool,
    /// Soft-delete flag; retired rows keep their order history.
    pub is_deleted: bool,
    /// Browse API item id (`v1|...|0`) for mirrored rows.
    pub ebay_item_id: Option<String>,
    /// Numeric legacy id used by the Shopping API and seller URLs.
    pub ebay_legacy_id: Option<String>,
    /// Stock reported by eBay at the last sweep; `None` means unknown.
    pub ebay_stock: Option<i32>,
    /// Leaf category name.
    pub ebay_category: Option<String>,
    /// Full category path, root first.
    pub ebay_category_path: Vec<String>,
    /// VIN of the donor vehicle, when the listing names one.
    pub ebay_vin: Option<String>,
    /// Donor vehicle year.
    pub ebay_year: Option<String>,
    /// Donor vehicle model.
    pub ebay_model: Option<String>,
    /// Free-form donor vehicle description.
    pub ebay_vehicle_info: Option<String>,
    /// Seller notes from the listing.
    pub ebay_notes: Option<String>,
    /// Other vehicles the part fits, one entry per vehicle.
    pub ebay_also_fits: Vec<String>,
    /// The interchange text before splitting, newline-joined.
    pub ebay_also_fits_raw: String,
    /// Raw localized aspects from the Browse API.
    pub ebay_aspects: Option<serde_json::Value>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

/// Stock-relevant columns of a product, keyed by eBay item id.
///
/// The sweep reads this before deciding whether a listing needs a detail
/// fetch at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct StockView {
    /// Operator-created row; the sweep must leave it untouched.
    pub is_manual: bool,
    /// Stock recorded from eBay, if any.
    pub ebay_stock: Option<i32>,
    /// Local stock count, if any.
    pub count: Option<i32>,
}

/// Write payload the catalog sweep produces for one remote listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProductPayload {
    /// Browse API item id; the upsert key.
    pub ebay_item_id: String,
    /// Display name.
    pub name: String,
    /// Listing description HTML.
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Mirrors `price`; the storefront renders discounts from the gap.
    pub old_price: Decimal,
    /// Image URLs, primary first.
    pub images: Vec<String>,
    /// Stock to record locally; unknown hints are coerced to 0.
    pub count: i32,
    /// The raw stock hint, `None` preserved.
    pub ebay_stock: Option<i32>,
    /// Numeric legacy id, when derivable.
    pub ebay_legacy_id: Option<String>,
    /// URL slug.
    pub link: String,
    /// Leaf category name.
    pub ebay_category: Option<String>,
    /// Full category path, root first.
    pub ebay_category_path: Vec<String>,
    /// Donor VIN.
    pub ebay_vin: Option<String>,
    /// Donor vehicle year.
    pub ebay_year: Option<String>,
    /// Donor vehicle model.
    pub ebay_model: Option<String>,
    /// Free-form donor vehicle description.
    pub ebay_vehicle_info: Option<String>,
    /// Seller notes.
    pub ebay_notes: Option<String>,
    /// Other vehicles the part fits.
    pub ebay_also_fits: Vec<String>,
    /// The interchange text before splitting.
    pub ebay_also_fits_raw: String,
    /// Raw localized aspects as JSON.
    pub ebay_aspects: serde_json::Value,
}

/// What an upsert did with a remote payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was inserted.
    Created,
    /// An existing mirrored row was updated in place.
    Updated,
    /// The item id belongs to a manual row; nothing was written.
    SkippedManual,
}
