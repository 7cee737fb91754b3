//! Domain models.
//!
//! These types represent validated domain objects shared by routes, services,
//! and repositories. Database row conversion lives in `crate::db`.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{CartItem, CartLine};
pub use order::{NewOrder, NewOrderLine, Order, OrderLineDetail};
pub use product::{Product, RemoteProductPayload, StockView, UpsertOutcome};
pub use user::User;
