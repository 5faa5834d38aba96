use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{OrderId, ProductId, UserId, Version};
use domain::{Cart, Order, OrderDraft, OrderNumber, Product};
use tokio::sync::RwLock;

use crate::{
    OrderQuery, Result, StoreError,
    store::{CartStore, OrderStore, ProductStore, StockAdjustment},
};

#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    /// Last order number sequence handed out per calendar day.
    sequences: HashMap<NaiveDate, u32>,
}

/// In-memory store implementation.
///
/// Provides the same guarantees as the PostgreSQL implementation: each table
/// sits behind its own lock, so stock adjustments and order number
/// allocation happen under a single write guard.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
    orders: Arc<RwLock<OrderTable>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.orders.len()
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<StockAdjustment> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(StockAdjustment::NotFound);
        };
        if !product.is_available() {
            return Ok(StockAdjustment::Unavailable);
        }
        if !product.has_stock_for(quantity) {
            return Ok(StockAdjustment::Insufficient {
                available: product.stock,
            });
        }

        product.stock -= quantity;
        product.updated_at = chrono::Utc::now();
        Ok(StockAdjustment::Applied {
            remaining: product.stock,
        })
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<StockAdjustment> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(StockAdjustment::NotFound);
        };

        product.stock = product.stock.saturating_add(quantity);
        product.updated_at = chrono::Utc::now();
        Ok(StockAdjustment::Applied {
            remaining: product.stock,
        })
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, owner_id: UserId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&owner_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Version> {
        let mut carts = self.carts.write().await;

        let current = carts
            .get(&cart.owner_id())
            .map(Cart::version)
            .unwrap_or(Version::initial());
        if current != cart.version() {
            return Err(StoreError::conflict(
                "cart",
                cart.owner_id(),
                cart.version(),
                current,
            ));
        }

        let next = current.next();
        let mut stored = cart.clone();
        stored.set_version(next);
        carts.insert(cart.owner_id(), stored);
        Ok(next)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order> {
        let mut table = self.orders.write().await;

        let day = draft.calendar_day();
        let sequence = table.sequences.entry(day).or_insert(0);
        *sequence += 1;
        let number = OrderNumber::new(day, *sequence);

        if table
            .orders
            .values()
            .any(|order| order.order_number() == &number)
        {
            return Err(StoreError::DuplicateOrderNumber(number.to_string()));
        }

        let mut order = Order::from_draft(draft, OrderId::new(), number);
        order.set_version(Version::first());
        table.orders.insert(order.id(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.orders.get(&id).cloned())
    }

    async fn save_order(&self, order: &Order) -> Result<Version> {
        let mut table = self.orders.write().await;

        let current = table
            .orders
            .get(&order.id())
            .map(Order::version)
            .unwrap_or(Version::initial());
        if current != order.version() || !current.is_persisted() {
            return Err(StoreError::conflict(
                "order",
                order.id(),
                order.version(),
                current,
            ));
        }

        let next = current.next();
        let mut stored = order.clone();
        stored.set_version(next);
        table.orders.insert(order.id(), stored);
        Ok(next)
    }

    async fn find_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let table = self.orders.read().await;
        let mut orders: Vec<_> = table
            .orders
            .values()
            .filter(|order| query.matches(order))
            .cloned()
            .collect();

        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.order_number().cmp(a.order_number()))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }
}
