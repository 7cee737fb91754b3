//! User domain types.

use chrono::{DateTime, Utc};

use partsmith_core::{Email, UserId};

/// A registered buyer.
///
/// Account issuance is handled elsewhere; this service only requires that an
/// order's `user_id` points at an existing row.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name used on orders.
    pub full_name: String,
    /// The user's email address.
    pub mail: Email,
    /// Contact phone, if provided.
    pub phone: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}
