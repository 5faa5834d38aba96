//! Order aggregate and related types.

mod aggregate;
mod number;
mod status;
mod value_objects;

pub use aggregate::{MAX_NOTES_LEN, MAX_REASON_LEN, Order, OrderDraft, StatusChange};
pub use number::OrderNumber;
pub use status::{OrderStatus, PaymentMethod, PaymentStatus};
pub use value_objects::{BillingAddress, OrderItem, ShippingAddress};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A required address field is blank.
    #[error("Shipping address {field} is required")]
    InvalidAddress { field: &'static str },

    #[error("Notes cannot exceed {max} characters (got {len})")]
    NotesTooLong { len: usize, max: usize },

    #[error("Cancellation reason cannot exceed {max} characters (got {len})")]
    ReasonTooLong { len: usize, max: usize },

    /// The order has progressed past the point where it can be cancelled.
    #[error("Order cannot be cancelled in {status} status")]
    NotCancellable { status: OrderStatus },

    /// Terminal orders accept no further status changes.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A line or order total is too large to represent.
    #[error("Order amount is out of range")]
    AmountOverflow,

    #[error("Unknown order status: {0}")]
    InvalidStatus(String),
}
