//! Domain layer for the storefront.
//!
//! This crate provides the core business types:
//! - Product records as seen by checkout
//! - The per-user Cart aggregate
//! - The Order aggregate with its status state machine and numbering
//! - The pricing policy used to total orders
//! - The acting user and their role

pub mod actor;
pub mod cart;
pub mod order;
pub mod pricing;
pub mod product;

pub use actor::{Actor, Role};
pub use cart::{Cart, CartError, CartItem};
pub use order::{
    BillingAddress, MAX_NOTES_LEN, MAX_REASON_LEN, Order, OrderDraft, OrderError, OrderItem,
    OrderNumber, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, StatusChange,
};
pub use pricing::{OrderTotals, PricingPolicy};
pub use product::Product;
