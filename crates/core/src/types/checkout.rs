//! Cart ownership and delivery method.

use serde::{Deserialize, Serialize};

use crate::types::id::UserId;

/// Who a cart line belongs to.
///
/// Anonymous visitors get an opaque session token before they can add to the
/// cart; logging in adopts those lines onto the user. Rows are stored under
/// the rendered [`key`](Self::key) so the two namespaces cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartOwner {
    User(UserId),
    Session(String),
}

impl CartOwner {
    /// Stable storage key: `u:{id}` for users, `s:{token}` for sessions.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::User(id) => format!("u:{id}"),
            Self::Session(token) => format!("s:{token}"),
        }
    }
}

/// How the buyer wants the order delivered.
///
/// The wire value is free-form (the storefront sends whatever the delivery
/// picker offers); only `ups` carries extra requirements, so the type keeps
/// the raw string and answers the one question checkout asks of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryMethod(String);

impl DeliveryMethod {
    /// Wrap a raw delivery method string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Shipped orders need a full address (validated at checkout) and have
    /// their address collected again by the payment gateway for tax.
    #[must_use]
    pub fn requires_shipping(&self) -> bool {
        self.0.eq_ignore_ascii_case("ups")
    }

    /// The raw wire value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeliveryMethod {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
