//! Checkout error types.

use common::{OrderId, ProductId};
use domain::{CartError, OrderError, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during checkout and order management.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was attempted with no cart or an empty one.
    #[error("Cart is empty")]
    EmptyCart,

    /// A product is missing, inactive or deleted.
    #[error("Product {product} is not available")]
    ProductUnavailable {
        product_id: ProductId,
        product: String,
    },

    /// A product does not have enough stock for the requested quantity.
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product: String,
        requested: u32,
        available: u32,
    },

    #[error("Order cannot be cancelled in {status} status")]
    NotCancellable { status: OrderStatus },

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The record changed concurrently; the caller may reload and retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Order error: {0}")]
    Order(OrderError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl CheckoutError {
    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::ProductUnavailable { .. } => "product_unavailable",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::NotCancellable { .. } => "not_cancellable",
            CheckoutError::NotAuthorized(_) => "not_authorized",
            CheckoutError::OrderNotFound(_) => "order_not_found",
            CheckoutError::ProductNotFound(_) => "product_not_found",
            CheckoutError::Validation(_) => "validation",
            CheckoutError::Conflict(_) => "conflict",
            CheckoutError::Cart(_) => "cart",
            CheckoutError::Order(_) => "order",
            CheckoutError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        if err.is_conflict() {
            CheckoutError::Conflict(err.to_string())
        } else {
            CheckoutError::Store(err)
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotCancellable { status } => CheckoutError::NotCancellable { status },
            other => CheckoutError::Order(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
