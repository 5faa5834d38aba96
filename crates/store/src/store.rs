use async_trait::async_trait;
use common::{OrderId, ProductId, UserId, Version};
use domain::{Cart, Order, OrderDraft, Product};

use crate::{OrderQuery, Result};

/// Outcome of an atomic stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAdjustment {
    /// The adjustment was applied; `remaining` is the new stock level.
    Applied { remaining: u32 },

    /// Not enough stock; nothing was changed.
    Insufficient { available: u32 },

    /// The product is inactive or deleted; nothing was changed.
    Unavailable,

    /// No such product.
    NotFound,
}

/// Product catalog persistence.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts or replaces a product record.
    async fn insert_product(&self, product: Product) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Decrements stock by `quantity` only if the product is available and
    /// has at least that much stock. Check and write happen atomically.
    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<StockAdjustment>;

    /// Increments stock by `quantity`. Availability is not checked: stock
    /// returned from a cancelled order goes back regardless.
    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<StockAdjustment>;
}

/// Cart persistence, one cart per user.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, owner_id: UserId) -> Result<Option<Cart>>;

    /// Saves the cart if the stored version still equals `cart.version()`
    /// (`Version::initial()` for a cart never saved before).
    ///
    /// Returns the new version; fails with `ConcurrencyConflict` otherwise.
    async fn save_cart(&self, cart: &Cart) -> Result<Version>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order, assigning its id, its order number and version 1.
    ///
    /// The order number is allocated from a per-day counter in the same
    /// atomic step as the insert.
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Saves the order if the stored version still equals `order.version()`.
    ///
    /// Returns the new version; fails with `ConcurrencyConflict` otherwise.
    async fn save_order(&self, order: &Order) -> Result<Version>;

    /// Returns matching orders, newest first.
    async fn find_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;
}

/// Everything checkout needs from persistence.
pub trait CommerceStore: ProductStore + CartStore + OrderStore {}

impl<T> CommerceStore for T where T: ProductStore + CartStore + OrderStore {}
