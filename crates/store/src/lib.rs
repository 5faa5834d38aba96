//! Persistence for the storefront.
//!
//! Products, carts and orders are stored as versioned records. Carts and
//! orders are saved with optimistic concurrency: a save succeeds only if the
//! stored version still matches the version the caller loaded. Stock is only
//! ever changed through atomic conditional adjustments.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::OrderQuery;
pub use store::{CartStore, CommerceStore, OrderStore, ProductStore, StockAdjustment};
