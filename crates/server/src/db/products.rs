//! Product repository.
//!
//! Serves two callers with different needs: checkout loads full rows by id,
//! and the catalog sweep reads stock snapshots and upserts mirrored listings
//! keyed on `ebay_item_id`. Manual rows (`is_manual`) are never written by
//! the sweep; the guard here is the last line of defense behind the sweep's
//! own skip.

use sqlx::PgPool;
use uuid::Uuid;

use partsmith_core::ProductId;

use super::RepositoryError;
use crate::models::{Product, RemoteProductPayload, StockView, UpsertOutcome};

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

const PRODUCT_COLUMNS: &str = "id, link, name, description, price, old_price, count, weight, \
     images, is_manual, is_deleted, ebay_item_id, ebay_legacy_id, ebay_stock, ebay_category, \
     ebay_category_path, ebay_vin, ebay_year, ebay_model, ebay_vehicle_info, ebay_notes, \
     ebay_also_fits, ebay_also_fits_raw, ebay_aspects, created_at, updated_at";

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get several products by ID in one query. Missing ids are simply
    /// absent from the result; the caller decides whether that matters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(|id| id.as_i32()).collect();

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Stock snapshot for a mirrored listing, keyed by eBay item id.
    ///
    /// Includes soft-deleted rows: the sweep must still recognize them as
    /// existing or an insert would trip the `ebay_item_id` unique index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_view(&self, ebay_item_id: &str) -> Result<Option<StockView>, RepositoryError> {
        let view = sqlx::query_as::<_, StockView>(
            "SELECT is_manual, ebay_stock, count FROM products WHERE ebay_item_id = $1",
        )
        .bind(ebay_item_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(view)
    }

    /// Insert or update a mirrored listing.
    ///
    /// Updates the existing row in place when the item id is already known
    /// and the row is not manual; inserts otherwise. Manual rows are left
    /// byte-for-byte untouched and reported as `SkippedManual`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails (including a
    /// `link` collision on insert).
    pub async fn upsert_remote(
        &self,
        payload: &RemoteProductPayload,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let existing = sqlx::query_as::<_, (i32, bool)>(
            "SELECT id, is_manual FROM products WHERE ebay_item_id = $1",
        )
        .bind(&payload.ebay_item_id)
        .fetch_optional(self.pool)
        .await?;

        match existing {
            Some((_, true)) => Ok(UpsertOutcome::SkippedManual),
            Some((id, false)) => {
                sqlx::query(
                    "UPDATE products SET \
                         link = $2, name = $3, description = $4, price = $5, old_price = $6, \
                         count = $7, images = $8, ebay_stock = $9, ebay_legacy_id = $10, \
                         ebay_category = $11, ebay_category_path = $12, ebay_vin = $13, \
                         ebay_year = $14, ebay_model = $15, ebay_vehicle_info = $16, \
                         ebay_notes = $17, ebay_also_fits = $18, ebay_also_fits_raw = $19, \
                         ebay_aspects = $20, updated_at = NOW() \
                     WHERE id = $1 AND is_manual = FALSE",
                )
                .bind(id)
                .bind(&payload.link)
                .bind(&payload.name)
                .bind(&payload.description)
                .bind(payload.price)
                .bind(payload.old_price)
                .bind(payload.count)
                .bind(&payload.images)
                .bind(payload.ebay_stock)
                .bind(&payload.ebay_legacy_id)
                .bind(&payload.ebay_category)
                .bind(&payload.ebay_category_path)
                .bind(&payload.ebay_vin)
                .bind(&payload.ebay_year)
                .bind(&payload.ebay_model)
                .bind(&payload.ebay_vehicle_info)
                .bind(&payload.ebay_notes)
                .bind(&payload.ebay_also_fits)
                .bind(&payload.ebay_also_fits_raw)
                .bind(&payload.ebay_aspects)
                .execute(self.pool)
                .await?;

                Ok(UpsertOutcome::Updated)
            }
            None => {
                sqlx::query(
                    "INSERT INTO products \
                         (link, name, description, price, old_price, count, images, is_manual, \
                          ebay_item_id, ebay_stock, ebay_legacy_id, ebay_category, \
                          ebay_category_path, ebay_vin, ebay_year, ebay_model, \
                          ebay_vehicle_info, ebay_notes, ebay_also_fits, ebay_also_fits_raw, \
                          ebay_aspects) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9, $10, $11, $12, $13, \
                             $14, $15, $16, $17, $18, $19, $20)",
                )
                .bind(&payload.link)
                .bind(&payload.name)
                .bind(&payload.description)
                .bind(payload.price)
                .bind(payload.old_price)
                .bind(payload.count)
                .bind(&payload.images)
                .bind(&payload.ebay_item_id)
                .bind(payload.ebay_stock)
                .bind(&payload.ebay_legacy_id)
                .bind(&payload.ebay_category)
                .bind(&payload.ebay_category_path)
                .bind(&payload.ebay_vin)
                .bind(&payload.ebay_year)
                .bind(&payload.ebay_model)
                .bind(&payload.ebay_vehicle_info)
                .bind(&payload.ebay_notes)
                .bind(&payload.ebay_also_fits)
                .bind(&payload.ebay_also_fits_raw)
                .bind(&payload.ebay_aspects)
                .execute(self.pool)
                .await?;

                Ok(UpsertOutcome::Created)
            }
        }
    }

    /// Set the local stock count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_count(&self, id: ProductId, count: i32) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET count = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(count)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Soft-delete a product.
    ///
    /// The row is preserved for order history; the slug is replaced with a
    /// random token so the old URL can be reused.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product exists.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let freed_slug = format!("retired-{}", Uuid::new_v4());

        let result = sqlx::query(
            "UPDATE products SET is_deleted = TRUE, link = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(&freed_slug)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
