//! Checkout coordinator: turns a cart into an order.

use std::time::Instant;

use chrono::Utc;
use common::{ProductId, UserId, Version};
use domain::{
    BillingAddress, Cart, MAX_NOTES_LEN, Order, OrderDraft, OrderItem, PaymentMethod,
    PricingPolicy, Product, ShippingAddress,
};
use serde::Deserialize;
use store::{CommerceStore, StockAdjustment};

use crate::error::{CheckoutError, Result};
use crate::state::CheckoutState;

/// Everything the customer supplies at checkout besides the cart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub billing_address: Option<BillingAddress>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn new(shipping_address: ShippingAddress, payment_method: PaymentMethod) -> Self {
        Self {
            shipping_address,
            billing_address: None,
            payment_method,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_billing_address(mut self, billing_address: BillingAddress) -> Self {
        self.billing_address = Some(billing_address);
        self
    }

    /// Checks the request before any store access.
    pub fn validate(&self) -> Result<()> {
        self.shipping_address
            .validate()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        if let Some(notes) = &self.notes {
            let len = notes.trim().chars().count();
            if len > MAX_NOTES_LEN {
                return Err(CheckoutError::Validation(format!(
                    "Notes cannot exceed {MAX_NOTES_LEN} characters (got {len})"
                )));
            }
        }
        Ok(())
    }
}

/// Side effects performed so far, in the order they happened.
#[derive(Debug, Default)]
struct CheckoutProgress {
    state: CheckoutState,

    /// Stock lines successfully decremented.
    reserved: Vec<(ProductId, u32)>,

    /// The emptied cart as saved, kept so its items can be put back.
    cleared_cart: Option<(Cart, Version)>,
}

/// Orchestrates checkout as a saga with compensating actions.
///
/// Steps:
/// 1. Reserve stock for each cart line with an atomic conditional decrement
/// 2. Clear the cart, guarded by the cart version
/// 3. Insert the order, which allocates its number
///
/// If any step fails, completed steps are undone in reverse order and the
/// original error is returned. Compensation failures are logged.
pub struct CheckoutCoordinator<S>
where
    S: CommerceStore,
{
    store: S,
    pricing: PricingPolicy,
}

impl<S> CheckoutCoordinator<S>
where
    S: CommerceStore,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: S, pricing: PricingPolicy) -> Self {
        Self { store, pricing }
    }

    /// Checks out the user's cart.
    ///
    /// On success the order is persisted, the stock of every line is
    /// decremented and the cart is empty. On failure none of that happened.
    #[tracing::instrument(skip(self, request), fields(user_id = %owner_id))]
    pub async fn checkout(&self, owner_id: UserId, request: CheckoutRequest) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = Instant::now();

        let result = self.run(owner_id, request).await;

        match &result {
            Ok(order) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %order.id(),
                    order_number = %order.order_number(),
                    total = %order.total(),
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());

        result
    }

    async fn run(&self, owner_id: UserId, request: CheckoutRequest) -> Result<Order> {
        request.validate()?;

        let cart = self
            .store
            .get_cart(owner_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(CheckoutError::EmptyCart)?;

        let mut progress = CheckoutProgress {
            state: CheckoutState::ReservingStock,
            ..Default::default()
        };

        match self.execute_steps(&mut progress, &cart, request).await {
            Ok(order) => {
                progress.state = CheckoutState::Completed;
                tracing::debug!(
                    state = %progress.state,
                    lines = progress.reserved.len(),
                    "checkout steps finished"
                );
                Ok(order)
            }
            Err(e) => {
                self.compensate(&mut progress, &cart).await;
                Err(e)
            }
        }
    }

    async fn execute_steps(
        &self,
        progress: &mut CheckoutProgress,
        cart: &Cart,
        request: CheckoutRequest,
    ) -> Result<Order> {
        // Step 1: reserve stock line by line
        let mut items = Vec::with_capacity(cart.items().len());
        for line in cart.items() {
            let product = self.resolve_product(line.product_id).await?;
            if !product.has_stock_for(line.quantity) {
                return Err(insufficient(&product, line.quantity, product.stock));
            }
            let item =
                OrderItem::new(product.id, product.name.clone(), line.quantity, product.price)?;

            match self.store.decrement_stock(product.id, line.quantity).await? {
                StockAdjustment::Applied { remaining } => {
                    tracing::debug!(product_id = %product.id, remaining, "stock reserved");
                    progress.reserved.push((product.id, line.quantity));
                }
                StockAdjustment::Insufficient { available } => {
                    return Err(insufficient(&product, line.quantity, available));
                }
                StockAdjustment::Unavailable | StockAdjustment::NotFound => {
                    return Err(unavailable(product.id, &product.name));
                }
            }
            items.push(item);
        }

        let draft = OrderDraft::new(
            cart.owner_id(),
            items,
            request.shipping_address,
            request.billing_address,
            request.payment_method,
            request.notes,
            &self.pricing,
            Utc::now(),
        )?;

        // Step 2: clear the cart; a concurrent checkout of the same cart loses here
        let mut emptied = cart.clone();
        emptied.clear();
        let version = self.store.save_cart(&emptied).await?;
        progress.cleared_cart = Some((emptied, version));
        progress.state = CheckoutState::CartCleared;

        // Step 3: insert the order
        let order = self.store.insert_order(draft).await?;
        Ok(order)
    }

    async fn resolve_product(&self, product_id: ProductId) -> Result<Product> {
        match self.store.get_product(product_id).await? {
            Some(product) if product.is_available() => Ok(product),
            Some(product) => Err(unavailable(product.id, &product.name)),
            None => Err(unavailable(product_id, &product_id.to_string())),
        }
    }

    /// Undoes completed steps in reverse order.
    async fn compensate(&self, progress: &mut CheckoutProgress, original: &Cart) {
        if !progress.state.can_compensate() {
            return;
        }
        let had_cleared_cart = progress.state.has_cleared_cart();
        progress.state = CheckoutState::Compensating;

        if progress.reserved.is_empty() && !had_cleared_cart {
            progress.state = CheckoutState::Failed;
            return;
        }
        metrics::counter!("checkout_compensations_total").increment(1);

        if let Some((mut cart, version)) = progress.cleared_cart.take() {
            cart.set_version(version);
            let restored = match cart.replace_items(original.items().to_vec()) {
                Ok(()) => self.store.save_cart(&cart).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match restored {
                Ok(_) => tracing::info!(user_id = %cart.owner_id(), "cart restored"),
                Err(e) => tracing::error!(
                    user_id = %cart.owner_id(),
                    error = %e,
                    "failed to restore cart during compensation"
                ),
            }
        }

        for (product_id, quantity) in progress.reserved.iter().rev() {
            match self.store.increment_stock(*product_id, *quantity).await {
                Ok(StockAdjustment::Applied { .. }) => {}
                Ok(outcome) => {
                    metrics::counter!("stock_restore_failures_total").increment(1);
                    tracing::error!(%product_id, quantity, ?outcome, "stock not restored");
                }
                Err(e) => {
                    metrics::counter!("stock_restore_failures_total").increment(1);
                    tracing::error!(%product_id, quantity, error = %e, "stock not restored");
                }
            }
        }

        progress.state = CheckoutState::Failed;
        tracing::warn!(
            lines = progress.reserved.len(),
            state = %progress.state,
            "checkout compensated"
        );
    }
}

fn unavailable(product_id: ProductId, name: &str) -> CheckoutError {
    CheckoutError::ProductUnavailable {
        product_id,
        product: name.to_string(),
    }
}

fn insufficient(product: &Product, requested: u32, available: u32) -> CheckoutError {
    CheckoutError::InsufficientStock {
        product_id: product.id,
        product: product.name.clone(),
        requested,
        available,
    }
}
