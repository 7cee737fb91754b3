//! Cart quantity rules.
//!
//! The repository only moves rows; the decisions live here. Adding an item
//! either inserts a line at quantity 1 or bumps the existing one, removing
//! decrements and deletes the line at zero, and fetching merges the user's
//! cart with whatever their anonymous session accumulated before login.

use async_trait::async_trait;
use sqlx::PgPool;

use partsmith_core::{CartLineId, CartOwner, ProductId};

use crate::db::{CartRepository, RepositoryError};
use crate::models::{CartItem, CartLine};

/// Storage the cart rules run against.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_line(
        &self,
        owner_key: &str,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Insert a line at quantity 1, or bump an existing line by 1.
    async fn insert_line(
        &self,
        owner_key: &str,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<CartLine, RepositoryError>;

    async fn set_count(&self, line_id: CartLineId, count: i32) -> Result<(), RepositoryError>;

    async fn delete_line(&self, line_id: CartLineId) -> Result<(), RepositoryError>;

    /// Lines for all given owner keys, oldest first.
    async fn lines(&self, owner_keys: &[String]) -> Result<Vec<CartItem>, RepositoryError>;

    /// Move a session's lines under a user key, merging duplicates.
    async fn adopt_session(&self, session_key: &str, user_key: &str)
    -> Result<(), RepositoryError>;

    /// Delete every line under an owner key; returns how many went.
    async fn clear_owner(&self, owner_key: &str) -> Result<u64, RepositoryError>;
}

#[async_trait]
impl CartStore for PgPool {
    async fn find_line(
        &self,
        owner_key: &str,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<Option<CartLine>, RepositoryError> {
        CartRepository::new(self).find_line(owner_key, product_id, selector_value).await
    }

    async fn insert_line(
        &self,
        owner_key: &str,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<CartLine, RepositoryError> {
        CartRepository::new(self).insert_line(owner_key, product_id, selector_value).await
    }

    async fn set_count(&self, line_id: CartLineId, count: i32) -> Result<(), RepositoryError> {
        CartRepository::new(self).set_count(line_id, count).await
    }

    async fn delete_line(&self, line_id: CartLineId) -> Result<(), RepositoryError> {
        CartRepository::new(self).delete_line(line_id).await
    }

    async fn lines(&self, owner_keys: &[String]) -> Result<Vec<CartItem>, RepositoryError> {
        CartRepository::new(self).lines(owner_keys).await
    }

    async fn adopt_session(
        &self,
        session_key: &str,
        user_key: &str,
    ) -> Result<(), RepositoryError> {
        CartRepository::new(self).adopt_session(session_key, user_key).await
    }

    async fn clear_owner(&self, owner_key: &str) -> Result<u64, RepositoryError> {
        CartRepository::new(self).clear_owner(owner_key).await
    }
}

/// Cart operations for one owner at a time.
pub struct CartService<S> {
    store: S,
}

impl<S: CartStore> CartService<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Add one unit of a product to the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn add(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<CartLine, RepositoryError> {
        self.store.insert_line(&owner.key(), product_id, selector_value).await
    }

    /// Remove one unit of a product from the owner's cart.
    ///
    /// Quantity 1 deletes the line; a missing line is a no-op, so removing
    /// twice from a stale page does not error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn remove(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        selector_value: &str,
    ) -> Result<(), RepositoryError> {
        let Some(line) = self.store.find_line(&owner.key(), product_id, selector_value).await?
        else {
            return Ok(());
        };

        if line.count > 1 {
            self.store.set_count(line.id, line.count - 1).await
        } else {
            self.store.delete_line(line.id).await
        }
    }

    /// The owner's cart contents, oldest line first.
    ///
    /// For a logged-in user who still carries an anonymous session token,
    /// the session's lines are included so nothing vanishes at login before
    /// [`Self::adopt_session`] runs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn fetch(
        &self,
        owner: &CartOwner,
        session_token: Option<&str>,
    ) -> Result<Vec<CartItem>, RepositoryError> {
        let mut keys = vec![owner.key()];
        if let (CartOwner::User(_), Some(token)) = (owner, session_token) {
            keys.push(CartOwner::Session(token.to_owned()).key());
        }

        self.store.lines(&keys).await
    }

    /// Fold an anonymous session's cart into a user's cart at login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn adopt_session(
        &self,
        session_token: &str,
        user: &CartOwner,
    ) -> Result<(), RepositoryError> {
        let session_key = CartOwner::Session(session_token.to_owned()).key();
        self.store.adopt_session(&session_key, &user.key()).await
    }

    /// Empty the owner's cart outright.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn clear(&self, owner: &CartOwner) -> Result<u64, RepositoryError> {
        self.store.clear_owner(&owner.key()).await
    }
}
