//! Integration tests for checkout and order status management.

use std::sync::Arc;

use async_trait::async_trait;
use checkout::{
    CartService, CheckoutCoordinator, CheckoutError, CheckoutRequest, ListOrders,
    OrderStatusManager, StatusUpdate,
};
use common::{Money, OrderId, ProductId, UserId, Version};
use domain::{
    Actor, Cart, CartError, MAX_REASON_LEN, Order, OrderDraft, OrderError, OrderStatus,
    PaymentMethod, PricingPolicy, Product, ShippingAddress,
};
use store::{
    CartStore, InMemoryStore, OrderQuery, OrderStore, ProductStore, StockAdjustment, StoreError,
};
use rust_decimal::Decimal;
use tokio::sync::Barrier;

struct TestHarness {
    store: InMemoryStore,
    carts: CartService<InMemoryStore>,
    coordinator: CheckoutCoordinator<InMemoryStore>,
    orders: OrderStatusManager<InMemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        Self {
            carts: CartService::new(store.clone()),
            coordinator: CheckoutCoordinator::new(store.clone(), PricingPolicy::default()),
            orders: OrderStatusManager::new(store.clone()),
            store,
        }
    }

    async fn product(&self, name: &str, price: Money, stock: u32) -> ProductId {
        self.store
            .insert_product(Product::new(name, price, stock))
            .await
            .unwrap()
            .id
    }

    async fn stock_of(&self, product_id: ProductId) -> u32 {
        self.store
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn add(&self, owner: UserId, product_id: ProductId, quantity: u32) -> Cart {
        self.carts.add_item(owner, product_id, quantity).await.unwrap()
    }

    async fn place_order(&self, owner: UserId, lines: &[(ProductId, u32)]) -> Order {
        for (product_id, quantity) in lines {
            self.add(owner, *product_id, *quantity).await;
        }
        self.coordinator.checkout(owner, request()).await.unwrap()
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        street: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip_code: "62701".to_string(),
        country: "US".to_string(),
        phone: "555-0100".to_string(),
    }
}

fn request() -> CheckoutRequest {
    CheckoutRequest::new(address(), PaymentMethod::CreditCard)
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn checkout_without_cart_fails_with_empty_cart() {
    let h = TestHarness::new();

    let result = h.coordinator.checkout(UserId::new(), request()).await;

    assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn checkout_of_cleared_cart_fails_with_empty_cart() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(5), 10).await;
    h.add(owner, widget, 1).await;
    h.carts.clear(owner).await.unwrap();

    let result = h.coordinator.checkout(owner, request()).await;

    assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    assert_eq!(h.stock_of(widget).await, 10);
}

#[tokio::test]
async fn checkout_prices_order_with_free_shipping() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let a = h.product("A", Money::from_major(60), 5).await;
    let b = h.product("B", Money::from_major(50), 5).await;

    let order = h.place_order(owner, &[(a, 1), (b, 1)]).await;

    let totals = order.totals();
    assert_eq!(totals.subtotal, Money::from_major(110));
    assert_eq!(totals.tax, Money::from_major(11));
    assert_eq!(totals.shipping_cost, Money::zero());
    assert_eq!(totals.discount, Money::zero());
    assert_eq!(totals.total, Money::from_major(121));

    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.owner_id(), owner);
    assert_eq!(order.version(), Version::first());
    assert_eq!(order.items().len(), 2);
    assert_eq!(order.items()[0].product_name, "A");
    assert!(order.order_number().as_str().starts_with("ORD"));
    assert!(order.estimated_delivery() > order.created_at());

    assert_eq!(h.stock_of(a).await, 4);
    assert_eq!(h.stock_of(b).await, 4);
    assert!(h.carts.get_cart(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_charges_flat_shipping_below_threshold() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let c = h.product("C", Money::from_major(20), 5).await;

    let order = h.place_order(owner, &[(c, 2)]).await;

    let totals = order.totals();
    assert_eq!(totals.subtotal, Money::from_major(40));
    assert_eq!(totals.tax, Money::from_major(4));
    assert_eq!(totals.shipping_cost, Money::from_major(10));
    assert_eq!(totals.total, Money::from_major(54));
    assert_eq!(order.items()[0].line_total, Money::from_major(40));
    assert_eq!(h.stock_of(c).await, 3);
}

#[tokio::test]
async fn checkout_uses_current_product_price() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    h.add(owner, widget, 1).await;

    let mut repriced = h.store.get_product(widget).await.unwrap().unwrap();
    repriced.price = Money::from_major(12);
    h.store.insert_product(repriced).await.unwrap();

    let order = h.coordinator.checkout(owner, request()).await.unwrap();
    assert_eq!(order.items()[0].unit_price, Money::from_major(12));
    assert_eq!(order.subtotal(), Money::from_major(12));
}

#[tokio::test]
async fn insufficient_stock_leaves_everything_untouched() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let plenty = h.product("Plenty", Money::from_major(5), 5).await;
    let scarce = h.product("Scarce", Money::from_major(5), 1).await;
    h.add(owner, plenty, 1).await;
    let cart_before = h.add(owner, scarce, 2).await;

    let result = h.coordinator.checkout(owner, request()).await;

    match result {
        Err(CheckoutError::InsufficientStock {
            product_id,
            product,
            requested,
            available,
        }) => {
            assert_eq!(product_id, scarce);
            assert_eq!(product, "Scarce");
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.stock_of(plenty).await, 5);
    assert_eq!(h.stock_of(scarce).await, 1);
    let cart_after = h.carts.get_cart(owner).await.unwrap();
    assert_eq!(cart_after, cart_before);
}

#[tokio::test]
async fn unavailable_product_fails_checkout() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let first = h.product("First", Money::from_major(5), 5).await;
    let retired = h.product("Retired", Money::from_major(5), 5).await;
    h.add(owner, first, 2).await;
    h.add(owner, retired, 1).await;

    let mut product = h.store.get_product(retired).await.unwrap().unwrap();
    product.is_deleted = true;
    h.store.insert_product(product).await.unwrap();

    let result = h.coordinator.checkout(owner, request()).await;

    assert!(matches!(
        result,
        Err(CheckoutError::ProductUnavailable { product_id, .. }) if product_id == retired
    ));
    assert_eq!(h.stock_of(first).await, 5);
    assert_eq!(h.carts.get_cart(owner).await.unwrap().item_count(), 3);
}

#[tokio::test]
async fn invalid_request_is_rejected_before_touching_stock() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(5), 5).await;
    h.add(owner, widget, 1).await;

    let mut addr = address();
    addr.zip_code = String::new();
    let result = h
        .coordinator
        .checkout(owner, CheckoutRequest::new(addr, PaymentMethod::PayPal))
        .await;

    assert!(matches!(result, Err(CheckoutError::Validation(_))));
    assert_eq!(h.stock_of(widget).await, 5);
}

#[tokio::test]
async fn orders_on_the_same_day_get_increasing_numbers() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(5), 10).await;

    let first = h.place_order(owner, &[(widget, 1)]).await;
    let second = h.place_order(owner, &[(widget, 1)]).await;

    let first_number = first.order_number().as_str();
    let second_number = second.order_number().as_str();
    assert_eq!(first_number.len(), 13);
    assert_eq!(first_number[..9], second_number[..9]);
    assert!(second.order_number().sequence() > first.order_number().sequence());
}

/// Delegates to an in-memory store but refuses to insert orders.
#[derive(Clone)]
struct FailingOrderStore {
    inner: InMemoryStore,
}

#[async_trait]
impl ProductStore for FailingOrderStore {
    async fn insert_product(&self, product: Product) -> store::Result<Product> {
        self.inner.insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> store::Result<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> store::Result<StockAdjustment> {
        self.inner.decrement_stock(id, quantity).await
    }

    async fn increment_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> store::Result<StockAdjustment> {
        self.inner.increment_stock(id, quantity).await
    }
}

#[async_trait]
impl CartStore for FailingOrderStore {
    async fn get_cart(&self, owner_id: UserId) -> store::Result<Option<Cart>> {
        self.inner.get_cart(owner_id).await
    }

    async fn save_cart(&self, cart: &Cart) -> store::Result<Version> {
        self.inner.save_cart(cart).await
    }
}

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn insert_order(&self, _draft: OrderDraft) -> store::Result<Order> {
        Err(StoreError::DuplicateOrderNumber("ORD0000000001".to_string()))
    }

    async fn get_order(&self, id: OrderId) -> store::Result<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn save_order(&self, order: &Order) -> store::Result<Version> {
        self.inner.save_order(order).await
    }

    async fn find_orders(&self, query: OrderQuery) -> store::Result<Vec<Order>> {
        self.inner.find_orders(query).await
    }
}

#[tokio::test]
async fn failed_order_insert_compensates_cart_and_stock() {
    let inner = InMemoryStore::new();
    let store = FailingOrderStore {
        inner: inner.clone(),
    };
    let carts = CartService::new(store.clone());
    let coordinator = CheckoutCoordinator::new(store, PricingPolicy::default());

    let owner = UserId::new();
    let a = inner
        .insert_product(Product::new("A", Money::from_major(7), 3))
        .await
        .unwrap()
        .id;
    let b = inner
        .insert_product(Product::new("B", Money::from_major(9), 4))
        .await
        .unwrap()
        .id;
    carts.add_item(owner, a, 2).await.unwrap();
    carts.add_item(owner, b, 1).await.unwrap();

    let result = coordinator.checkout(owner, request()).await;

    assert!(matches!(result, Err(CheckoutError::Store(_))));
    assert_eq!(inner.get_product(a).await.unwrap().unwrap().stock, 3);
    assert_eq!(inner.get_product(b).await.unwrap().unwrap().stock, 4);

    let cart = inner.get_cart(owner).await.unwrap().unwrap();
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.total(), Money::from_major(23));
    assert_eq!(inner.order_count().await, 0);
}

// ---------------------------------------------------------------------------
// Order status management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_cancels_pending_order_and_stock_is_restored() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let a = h.product("A", Money::from_major(10), 5).await;
    let b = h.product("B", Money::from_major(3), 5).await;
    let order = h.place_order(owner, &[(a, 2), (b, 3)]).await;
    assert_eq!(h.stock_of(a).await, 3);
    assert_eq!(h.stock_of(b).await, 2);

    let cancelled = h
        .orders
        .cancel_order(
            &Actor::customer(owner),
            order.id(),
            Some("ordered by mistake".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at().is_some());
    assert_eq!(cancelled.cancellation_reason(), Some("ordered by mistake"));
    assert_eq!(cancelled.version(), Version::new(2));
    assert_eq!(h.stock_of(a).await, 5);
    assert_eq!(h.stock_of(b).await, 5);

    let stored = h
        .orders
        .get_order(&Actor::customer(owner), order.id())
        .await
        .unwrap();
    assert_eq!(stored.status(), OrderStatus::Cancelled);
}

#[tokio::test]
async fn shipped_order_is_not_cancellable() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let admin = Actor::admin(UserId::new());
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    h.orders
        .update_status(&admin, order.id(), StatusUpdate::new(OrderStatus::Shipped))
        .await
        .unwrap();

    let result = h
        .orders
        .cancel_order(&Actor::customer(owner), order.id(), None)
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::NotCancellable {
            status: OrderStatus::Shipped
        })
    ));
    assert_eq!(h.stock_of(widget).await, 4);
}

#[tokio::test]
async fn only_the_owner_may_cancel() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    let stranger = h
        .orders
        .cancel_order(&Actor::customer(UserId::new()), order.id(), None)
        .await;
    assert!(matches!(stranger, Err(CheckoutError::NotAuthorized(_))));

    let admin = h
        .orders
        .cancel_order(&Actor::admin(UserId::new()), order.id(), None)
        .await;
    assert!(matches!(admin, Err(CheckoutError::NotAuthorized(_))));
}

#[tokio::test]
async fn cancellation_reason_is_limited() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    let result = h
        .orders
        .cancel_order(&Actor::customer(owner), order.id(), Some("x".repeat(201)))
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::Order(OrderError::ReasonTooLong { .. }))
    ));
    assert_eq!(h.stock_of(widget).await, 4);
}

#[tokio::test]
async fn admin_updates_status_with_tracking_and_notes() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let admin = Actor::admin(UserId::new());
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    let shipped = h
        .orders
        .update_status(
            &admin,
            order.id(),
            StatusUpdate::new(OrderStatus::Shipped)
                .with_tracking_number("1Z999")
                .with_notes("left the warehouse"),
        )
        .await
        .unwrap();

    assert_eq!(shipped.status(), OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number(), Some("1Z999"));
    assert_eq!(shipped.notes(), Some("left the warehouse"));

    let delivered = h
        .orders
        .update_status(&admin, order.id(), StatusUpdate::new(OrderStatus::Delivered))
        .await
        .unwrap();
    assert!(delivered.delivered_at().is_some());
    assert_eq!(delivered.version(), Version::new(3));
}

#[tokio::test]
async fn customers_cannot_update_status() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    let result = h
        .orders
        .update_status(
            &Actor::customer(owner),
            order.id(),
            StatusUpdate::new(OrderStatus::Delivered),
        )
        .await;

    assert!(matches!(result, Err(CheckoutError::NotAuthorized(_))));
}

#[tokio::test]
async fn admin_cancellation_restores_stock_once() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let admin = Actor::admin(UserId::new());
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 2)]).await;

    let cancelled = h
        .orders
        .update_status(
            &admin,
            order.id(),
            StatusUpdate::new(OrderStatus::Cancelled).with_notes("fraud check"),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.cancellation_reason(), Some("fraud check"));
    assert_eq!(h.stock_of(widget).await, 5);

    // Setting Cancelled again changes nothing.
    h.orders
        .update_status(&admin, order.id(), StatusUpdate::new(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(h.stock_of(widget).await, 5);
}

#[tokio::test]
async fn admin_cancellation_keeps_long_notes() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let admin = Actor::admin(UserId::new());
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;
    let notes = "n".repeat(300);

    let cancelled = h
        .orders
        .update_status(
            &admin,
            order.id(),
            StatusUpdate::new(OrderStatus::Cancelled).with_notes(notes.clone()),
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert_eq!(cancelled.notes(), Some(notes.as_str()));
    assert_eq!(cancelled.cancellation_reason(), Some(&notes[..MAX_REASON_LEN]));
    assert_eq!(h.stock_of(widget).await, 5);
}

#[tokio::test]
async fn terminal_orders_cannot_move() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let admin = Actor::admin(UserId::new());
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    h.orders
        .cancel_order(&Actor::customer(owner), order.id(), None)
        .await
        .unwrap();

    let result = h
        .orders
        .update_status(&admin, order.id(), StatusUpdate::new(OrderStatus::Processing))
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::Order(OrderError::InvalidStatusTransition { .. }))
    ));
}

#[tokio::test]
async fn stale_order_save_is_a_conflict() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    // An admin ships the order after the owner loaded it.
    let mut stale = order.clone();
    h.orders
        .update_status(
            &Actor::admin(UserId::new()),
            order.id(),
            StatusUpdate::new(OrderStatus::Shipped),
        )
        .await
        .unwrap();

    stale.cancel(None).unwrap();
    let err = h.store.save_order(&stale).await.unwrap_err();
    assert!(matches!(CheckoutError::from(err), CheckoutError::Conflict(_)));
}

#[tokio::test]
async fn order_reads_are_authorized() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(10), 5).await;
    let order = h.place_order(owner, &[(widget, 1)]).await;

    assert!(
        h.orders
            .get_order(&Actor::customer(owner), order.id())
            .await
            .is_ok()
    );
    assert!(
        h.orders
            .get_order(&Actor::admin(UserId::new()), order.id())
            .await
            .is_ok()
    );
    assert!(matches!(
        h.orders
            .get_order(&Actor::customer(UserId::new()), order.id())
            .await,
        Err(CheckoutError::NotAuthorized(_))
    ));
    assert!(matches!(
        h.orders
            .get_order(&Actor::customer(owner), OrderId::new())
            .await,
        Err(CheckoutError::OrderNotFound(_))
    ));
}

#[tokio::test]
async fn listing_orders() {
    let h = TestHarness::new();
    let alice = UserId::new();
    let bob = UserId::new();
    let admin = Actor::admin(UserId::new());
    let widget = h.product("Widget", Money::from_major(10), 50).await;

    let first = h.place_order(alice, &[(widget, 1)]).await;
    let second = h.place_order(alice, &[(widget, 1)]).await;
    h.place_order(bob, &[(widget, 1)]).await;
    h.orders
        .cancel_order(&Actor::customer(alice), first.id(), None)
        .await
        .unwrap();

    let mine = h
        .orders
        .list_orders(&Actor::customer(alice), ListOrders::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id(), second.id());
    assert_eq!(mine[1].id(), first.id());

    let cancelled = h
        .orders
        .list_orders(
            &Actor::customer(alice),
            ListOrders {
                status: Some(OrderStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id(), first.id());

    let all = h
        .orders
        .list_all_orders(&admin, ListOrders::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let denied = h
        .orders
        .list_all_orders(&Actor::customer(alice), ListOrders::default())
        .await;
    assert!(matches!(denied, Err(CheckoutError::NotAuthorized(_))));
}

// ---------------------------------------------------------------------------
// Cart service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cart_add_merges_lines_at_current_price() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let widget = h.product("Widget", Money::from_major(10), 5).await;

    h.add(owner, widget, 1).await;
    let mut product = h.store.get_product(widget).await.unwrap().unwrap();
    product.price = Money::from_major(8);
    h.store.insert_product(product).await.unwrap();
    let cart = h.add(owner, widget, 2).await;

    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.total(), Money::from_major(24));
    assert_eq!(cart.version(), Version::new(2));
}

#[tokio::test]
async fn cart_add_rejects_unknown_and_unavailable_products() {
    let h = TestHarness::new();
    let owner = UserId::new();

    let unknown = h.carts.add_item(owner, ProductId::new(), 1).await;
    assert!(matches!(unknown, Err(CheckoutError::ProductNotFound(_))));

    let mut inactive = Product::new("Hidden", Money::from_major(1), 5);
    inactive.is_active = false;
    let hidden = h.store.insert_product(inactive).await.unwrap().id;
    let result = h.carts.add_item(owner, hidden, 1).await;
    assert!(matches!(result, Err(CheckoutError::ProductUnavailable { .. })));

    let widget = h.product("Widget", Money::from_major(1), 5).await;
    let zero = h.carts.add_item(owner, widget, 0).await;
    assert!(matches!(
        zero,
        Err(CheckoutError::Cart(CartError::InvalidQuantity { .. }))
    ));
}

#[tokio::test]
async fn cart_update_and_remove() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let a = h.product("A", Money::from_major(2), 5).await;
    let b = h.product("B", Money::from_major(3), 5).await;
    h.add(owner, a, 1).await;
    h.add(owner, b, 1).await;

    let cart = h.carts.update_quantity(owner, a, 4).await.unwrap();
    assert_eq!(cart.item_count(), 5);
    assert_eq!(cart.total(), Money::from_major(11));

    let cart = h.carts.update_quantity(owner, a, 0).await.unwrap();
    assert!(cart.get_item(a).is_none());

    let missing = h.carts.update_quantity(owner, a, 2).await;
    assert!(matches!(
        missing,
        Err(CheckoutError::Cart(CartError::ItemNotFound { .. }))
    ));

    let once = h.carts.remove_item(owner, b).await.unwrap();
    let twice = h.carts.remove_item(owner, b).await.unwrap();
    assert!(once.is_empty());
    assert_eq!(once, twice);
}

#[tokio::test]
async fn cart_amount_overflow_is_rejected() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let half_max = Money::new(Decimal::MAX / Decimal::from(2));
    let pricey = h.product("Pricey", half_max, 10).await;

    let result = h.carts.add_item(owner, pricey, 3).await;

    assert!(matches!(
        result,
        Err(CheckoutError::Cart(CartError::AmountOverflow { .. }))
    ));
    assert!(h.carts.get_cart(owner).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_checkouts_never_oversell() {
    let h = Arc::new(TestHarness::new());
    let widget = h.product("Widget", Money::from_major(5), 3).await;
    let buyers: Vec<UserId> = (0..20).map(|_| UserId::new()).collect();
    for buyer in &buyers {
        h.add(*buyer, widget, 1).await;
    }

    let handles: Vec<_> = buyers
        .iter()
        .map(|&buyer| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.coordinator.checkout(buyer, request()).await })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(e) => assert!(
                matches!(e, CheckoutError::InsufficientStock { .. }),
                "unexpected error: {e}"
            ),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(h.stock_of(widget).await, 0);
    assert_eq!(h.store.order_count().await, 3);
}

/// Delegates to an in-memory store but holds every cart read until a second
/// reader has loaded the same cart.
#[derive(Clone)]
struct RendezvousStore {
    inner: InMemoryStore,
    barrier: Arc<Barrier>,
}

#[async_trait]
impl ProductStore for RendezvousStore {
    async fn insert_product(&self, product: Product) -> store::Result<Product> {
        self.inner.insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> store::Result<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> store::Result<StockAdjustment> {
        self.inner.decrement_stock(id, quantity).await
    }

    async fn increment_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> store::Result<StockAdjustment> {
        self.inner.increment_stock(id, quantity).await
    }
}

#[async_trait]
impl CartStore for RendezvousStore {
    async fn get_cart(&self, owner_id: UserId) -> store::Result<Option<Cart>> {
        let cart = self.inner.get_cart(owner_id).await;
        self.barrier.wait().await;
        cart
    }

    async fn save_cart(&self, cart: &Cart) -> store::Result<Version> {
        self.inner.save_cart(cart).await
    }
}

#[async_trait]
impl OrderStore for RendezvousStore {
    async fn insert_order(&self, draft: OrderDraft) -> store::Result<Order> {
        self.inner.insert_order(draft).await
    }

    async fn get_order(&self, id: OrderId) -> store::Result<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn save_order(&self, order: &Order) -> store::Result<Version> {
        self.inner.save_order(order).await
    }

    async fn find_orders(&self, query: OrderQuery) -> store::Result<Vec<Order>> {
        self.inner.find_orders(query).await
    }
}

#[tokio::test]
async fn double_checkout_of_one_cart_places_one_order() {
    let inner = InMemoryStore::new();
    let owner = UserId::new();
    let widget = inner
        .insert_product(Product::new("Widget", Money::from_major(5), 10))
        .await
        .unwrap()
        .id;
    CartService::new(inner.clone())
        .add_item(owner, widget, 2)
        .await
        .unwrap();

    let store = RendezvousStore {
        inner: inner.clone(),
        barrier: Arc::new(Barrier::new(2)),
    };
    let coordinator = CheckoutCoordinator::new(store, PricingPolicy::default());

    let (first, second) = tokio::join!(
        coordinator.checkout(owner, request()),
        coordinator.checkout(owner, request())
    );

    let (placed, lost): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
    assert_eq!(placed.len(), 1);
    assert!(matches!(lost.as_slice(), [Err(CheckoutError::Conflict(_))]));

    assert_eq!(inner.get_product(widget).await.unwrap().unwrap().stock, 8);
    assert!(inner.get_cart(owner).await.unwrap().unwrap().is_empty());
    assert_eq!(inner.order_count().await, 1);
}
