//! Test support for the service-level integration tests.
//!
//! The server keeps its edges behind traits: the catalog sweep runs against
//! `CatalogApi` and `ProductSync`, the webhook pipeline against
//! `OrderStateStore`, `SessionSource`, and `OrderNotifier`. Everything in
//! this crate is an in-memory implementation of one of those seams, plus
//! fixture builders for orders, listings, and gateway events. The tests in
//! `tests/` drive the real services end to end without a database, a
//! payment gateway, or an SMTP relay.

#![cfg_attr(not(test), forbid(unsafe_code))]
// Fakes and fixtures panic on misuse instead of returning errors.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod catalog;
pub mod events;
pub mod orders;
