//! Cart repository.
//!
//! Rows are keyed by a rendered owner key (`u:{id}` for users, `s:{token}`
//! for anonymous sessions) so one table serves both. The quantity rules
//! (when to insert, bump, or delete) live in `services::cart`; this module
//! only moves rows.

use sqlx::PgPool;

use partsmith_core::{CartLineId, ProductId};

use super::RepositoryError;
use crate::models::{CartItem, CartLine};

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

const LINE_COLUMNS: &str = "id, owner_key, product_id, selector_value, count, created_at";

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the line for `(owner, product, selector)`, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_line(
        &self,
        owner_key: &str,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let line = sqlx::query_as::<_, CartLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM cart_products \
             WHERE owner_key = $1 AND product_id = $2 AND selector_value = $3"
        ))
        .bind(owner_key)
        .bind(product_id)
        .bind(selector_value)
        .fetch_optional(self.pool)
        .await?;

        Ok(line)
    }

    /// All lines for the given owner keys joined with product display data,
    /// oldest line first. Soft-deleted products are filtered out.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, owner_keys: &[String]) -> Result<Vec<CartItem>, RepositoryError> {
        let items = sqlx::query_as::<_, CartItem>(
            "SELECT cp.id AS line_id, cp.product_id, p.name, p.price, p.old_price, \
                    p.images, cp.count, cp.selector_value \
             FROM cart_products cp \
             JOIN products p ON p.id = cp.product_id \
             WHERE cp.owner_key = ANY($1) AND p.is_deleted = FALSE \
             ORDER BY cp.created_at",
        )
        .bind(owner_keys)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Insert a new line with `count = 1`.
    ///
    /// A concurrent insert of the same key bumps the existing row instead,
    /// so two racing "add" calls net a count of 2 rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_line(
        &self,
        owner_key: &str,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<CartLine, RepositoryError> {
        let line = sqlx::query_as::<_, CartLine>(&format!(
            "INSERT INTO cart_products (owner_key, product_id, selector_value, count) \
             VALUES ($1, $2, $3, 1) \
             ON CONFLICT (owner_key, product_id, selector_value) \
             DO UPDATE SET count = cart_products.count + 1 \
             RETURNING {LINE_COLUMNS}"
        ))
        .bind(owner_key)
        .bind(product_id)
        .bind(selector_value)
        .fetch_one(self.pool)
        .await?;

        Ok(line)
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails (including the
    /// `count >= 1` check constraint; callers delete instead of writing 0).
    pub async fn set_count(&self, line_id: CartLineId, count: i32) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE cart_products SET count = $2 WHERE id = $1")
            .bind(line_id)
            .bind(count)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Delete a single line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_line(&self, line_id: CartLineId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_products WHERE id = $1")
            .bind(line_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Delete every line belonging to an owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_owner(&self, owner_key: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_products WHERE owner_key = $1")
            .bind(owner_key)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Move an anonymous session's lines to a user's cart.
    ///
    /// Lines the user already holds are merged by summing counts, so the
    /// unique key survives adoption.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// committed in that case.
    pub async fn adopt_session(
        &self,
        session_key: &str,
        user_key: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE cart_products u SET count = u.count + s.count \
             FROM cart_products s \
             WHERE u.owner_key = $2 AND s.owner_key = $1 \
               AND u.product_id = s.product_id AND u.selector_value = s.selector_value",
        )
        .bind(session_key)
        .bind(user_key)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM cart_products s USING cart_products u \
             WHERE s.owner_key = $1 AND u.owner_key = $2 \
               AND u.product_id = s.product_id AND u.selector_value = s.selector_value",
        )
        .bind(session_key)
        .bind(user_key)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE cart_products SET owner_key = $2 WHERE owner_key = $1")
            .bind(session_key)
            .bind(user_key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
