//! Order status management: cancellation, admin updates and reads.

use common::OrderId;
use domain::{Actor, MAX_REASON_LEN, Order, OrderStatus};
use serde::Deserialize;
use store::{CommerceStore, OrderQuery, StockAdjustment};

use crate::error::{CheckoutError, Result};

/// Default page size for a user's own orders.
pub const DEFAULT_OWNER_LIMIT: usize = 10;
/// Largest page a user may request for their own orders.
pub const MAX_OWNER_LIMIT: usize = 50;
/// Default page size for the admin listing.
pub const DEFAULT_ADMIN_LIMIT: usize = 20;
/// Largest page an admin may request.
pub const MAX_ADMIN_LIMIT: usize = 100;

/// An admin status change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status,
            tracking_number: None,
            notes: None,
        }
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Filters and paging for order listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListOrders {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl ListOrders {
    fn into_query(
        self,
        query: OrderQuery,
        default_limit: usize,
        max_limit: usize,
    ) -> Result<OrderQuery> {
        let limit = self.limit.unwrap_or(default_limit);
        if limit == 0 || limit > max_limit {
            return Err(CheckoutError::Validation(format!(
                "limit must be between 1 and {max_limit}"
            )));
        }

        let mut query = query.limit(limit).offset(self.offset.unwrap_or(0));
        if let Some(status) = self.status {
            query = query.status(status);
        }
        Ok(query)
    }
}

/// Applies status transitions to persisted orders and their side effects.
///
/// Every save is guarded by the order version, so an owner cancelling while
/// an admin ships the same order cannot both succeed.
pub struct OrderStatusManager<S>
where
    S: CommerceStore,
{
    store: S,
}

impl<S> OrderStatusManager<S>
where
    S: CommerceStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order the actor owns, or any order for an admin.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        let order = self.load(order_id).await?;
        if !actor.can_read(order.owner_id()) {
            return Err(CheckoutError::NotAuthorized(
                "order belongs to another user".to_string(),
            ));
        }
        Ok(order)
    }

    /// Lists the actor's own orders, newest first.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn list_orders(&self, actor: &Actor, params: ListOrders) -> Result<Vec<Order>> {
        let query = params.into_query(
            OrderQuery::for_owner(actor.user_id),
            DEFAULT_OWNER_LIMIT,
            MAX_OWNER_LIMIT,
        )?;
        Ok(self.store.find_orders(query).await?)
    }

    /// Lists every order, newest first. Admin only.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn list_all_orders(&self, actor: &Actor, params: ListOrders) -> Result<Vec<Order>> {
        require_admin(actor)?;
        let query = params.into_query(OrderQuery::new(), DEFAULT_ADMIN_LIMIT, MAX_ADMIN_LIMIT)?;
        Ok(self.store.find_orders(query).await?)
    }

    /// Cancels an order on behalf of its owner and puts its stock back.
    #[tracing::instrument(skip(self, reason), fields(user_id = %actor.user_id))]
    pub async fn cancel_order(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        if order.owner_id() != actor.user_id {
            return Err(CheckoutError::NotAuthorized(
                "only the order owner can cancel it".to_string(),
            ));
        }

        order.cancel(reason)?;
        let version = self.store.save_order(&order).await?;
        order.set_version(version);

        metrics::counter!("orders_cancelled_total").increment(1);
        let restored = self.restore_stock(&order).await;
        tracing::info!(
            order_number = %order.order_number(),
            restored,
            "order cancelled by owner"
        );
        Ok(order)
    }

    /// Applies an admin status change.
    ///
    /// Moving a live order into `Cancelled` restores its stock.
    #[tracing::instrument(
        skip(self, update),
        fields(user_id = %actor.user_id, status = %update.status)
    )]
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        update: StatusUpdate,
    ) -> Result<Order> {
        require_admin(actor)?;
        let mut order = self.load(order_id).await?;

        // Notes may run longer than a cancellation reason is allowed to.
        let reason = update.notes.as_deref().map(|notes| {
            notes
                .trim()
                .chars()
                .take(MAX_REASON_LEN)
                .collect::<String>()
        });
        if let Some(notes) = update.notes {
            order.set_notes(notes)?;
        }
        if let Some(tracking_number) = update.tracking_number {
            order.set_tracking_number(tracking_number);
        }
        let change = order.update_status(update.status, reason)?;

        let version = self.store.save_order(&order).await?;
        order.set_version(version);

        metrics::counter!("order_status_updates_total", "status" => update.status.as_str())
            .increment(1);
        tracing::info!(
            order_number = %order.order_number(),
            from = %change.from,
            to = %change.to,
            "order status updated"
        );

        if change.is_cancellation() {
            metrics::counter!("orders_cancelled_total").increment(1);
            let restored = self.restore_stock(&order).await;
            tracing::info!(order_number = %order.order_number(), restored, "stock restored");
        }
        Ok(order)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// Returns each line's quantity to stock. Failures are logged and the
    /// remaining lines are still processed.
    async fn restore_stock(&self, order: &Order) -> usize {
        let mut restored = 0;
        for item in order.items() {
            match self
                .store
                .increment_stock(item.product_id, item.quantity)
                .await
            {
                Ok(StockAdjustment::Applied { remaining }) => {
                    restored += 1;
                    tracing::debug!(product_id = %item.product_id, remaining, "stock restored");
                }
                Ok(outcome) => {
                    metrics::counter!("stock_restore_failures_total").increment(1);
                    tracing::error!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        ?outcome,
                        "stock not restored"
                    );
                }
                Err(e) => {
                    metrics::counter!("stock_restore_failures_total").increment(1);
                    tracing::error!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "stock not restored"
                    );
                }
            }
        }
        restored
    }
}

fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(CheckoutError::NotAuthorized("admin role required".to_string()))
    }
}
