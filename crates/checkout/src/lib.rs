//! Checkout and order lifecycle services.
//!
//! This crate turns carts into orders and manages what happens to orders
//! afterwards:
//! - [`CartService`] applies cart mutations with optimistic concurrency
//! - [`CheckoutCoordinator`] runs checkout as an all-or-nothing saga:
//!   reserve stock for every line, clear the cart, insert the order, and
//!   compensate in reverse order if any step fails
//! - [`OrderStatusManager`] handles cancellation, admin status updates and
//!   authorized reads, restoring stock when an order is cancelled

pub mod cart;
pub mod coordinator;
pub mod error;
pub mod state;
pub mod status;

pub use cart::CartService;
pub use coordinator::{CheckoutCoordinator, CheckoutRequest};
pub use error::{CheckoutError, Result};
pub use state::CheckoutState;
pub use status::{ListOrders, OrderStatusManager, StatusUpdate};
