//! Wire types for the Browse and Shopping APIs.
//!
//! Every field eBay may omit is `Option` or defaulted; listings routinely
//! arrive with holes in them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One entry from a Browse API search page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    /// Browse API item id, e.g. `v1|254582474636|0`.
    pub item_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub estimated_availabilities: Vec<Availability>,
    #[serde(default)]
    pub estimated_available_quantity: Option<i32>,
    #[serde(default)]
    pub localized_aspects: Vec<Aspect>,
}

impl ItemSummary {
    /// Best-effort stock reading for this summary. See [`stock_hint`].
    #[must_use]
    pub fn stock_hint(&self) -> Option<i32> {
        stock_hint(
            &self.estimated_availabilities,
            self.estimated_available_quantity,
            &self.localized_aspects,
        )
    }
}

/// Full Browse API item record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    pub item_id: String,
    #[serde(default)]
    pub legacy_item_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Seller-authored HTML; the vehicle extractor mines this.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub image: Option<Image>,
    #[serde(default)]
    pub additional_images: Vec<Image>,
    /// Pipe-separated breadcrumb, e.g. `eBay Motors|Parts|Engines`.
    #[serde(default)]
    pub category_path: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub estimated_availabilities: Vec<Availability>,
    #[serde(default)]
    pub estimated_available_quantity: Option<i32>,
    #[serde(default)]
    pub localized_aspects: Vec<Aspect>,
}

impl ItemDetail {
    /// Best-effort stock reading for this detail record. See [`stock_hint`].
    #[must_use]
    pub fn stock_hint(&self) -> Option<i32> {
        stock_hint(
            &self.estimated_availabilities,
            self.estimated_available_quantity,
            &self.localized_aspects,
        )
    }
}

/// Availability block nested under a summary or detail record.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    #[serde(default)]
    pub estimated_available_quantity: Option<i32>,
}

/// A localized item aspect (name/value pair).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aspect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Monetary amount as the Browse API sends it (value is a decimal string).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One page of search results, with the total normalized.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<ItemSummary>,
    /// Reported result count across all pages; falls back to the page's own
    /// item count when eBay omits it.
    pub total: u32,
}

/// One vehicle from a Shopping API compatibility list, its `NameValueList`
/// flattened with lower-cased names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatibilityRow {
    pub values: HashMap<String, String>,
    pub notes: Option<String>,
}

impl CompatibilityRow {
    /// Looks up a flattened value by its lower-cased name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Extracts a stock count from the places eBay may hide one, in order of
/// trustworthiness: nested availability blocks, then the top-level quantity,
/// then a literal `stock` aspect. Returns `None` when no reading parses.
#[must_use]
pub fn stock_hint(
    availabilities: &[Availability],
    top_level: Option<i32>,
    aspects: &[Aspect],
) -> Option<i32> {
    if let Some(quantity) = availabilities
        .iter()
        .find_map(|a| a.estimated_available_quantity)
    {
        return Some(quantity);
    }

    if let Some(quantity) = top_level {
        return Some(quantity);
    }

    aspects
        .iter()
        .find(|aspect| {
            let named = |n: &Option<String>| {
                n.as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case("stock"))
            };
            named(&aspect.name) || named(&aspect.localized_name)
        })
        .and_then(|aspect| aspect.value.as_deref())
        .and_then(|value| value.trim().parse().ok())
}
