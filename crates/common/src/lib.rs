//! Shared types for the storefront workspace.
//!
//! Typed identifiers keep users, products and orders from being mixed up,
//! [`Money`] carries decimal amounts at full precision, and [`Version`]
//! drives optimistic concurrency for carts and orders.

pub mod money;
pub mod types;
pub mod version;

pub use money::Money;
pub use types::{OrderId, ProductId, UserId};
pub use version::Version;
