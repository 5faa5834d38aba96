//! Checkout and order management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CheckoutRequest, ListOrders, StatusUpdate};
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{BillingAddress, Order, OrderItem, ShippingAddress};
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use crate::AppState;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::extract::{JsonBody, OptionalJsonBody, QueryParams};
use crate::routes::parse_id;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub owner_id: String,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    pub items: Vec<OrderItemResponse>,
    pub item_count: u64,
    pub shipping_address: ShippingAddress,
    pub billing_address: BillingAddress,
    pub subtotal: String,
    pub tax: String,
    pub shipping_cost: String,
    pub discount: String,
    pub total: String,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.display_amount(),
            line_total: item.line_total.display_amount(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let totals = order.totals();
        Self {
            id: order.id().to_string(),
            order_number: order.order_number().to_string(),
            owner_id: order.owner_id().to_string(),
            status: order.status().to_string(),
            payment_method: order.payment_method().to_string(),
            payment_status: order.payment_status().to_string(),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
            item_count: order.item_count(),
            shipping_address: order.shipping_address().clone(),
            billing_address: order.billing_address().clone(),
            subtotal: totals.subtotal.display_amount(),
            tax: totals.tax.display_amount(),
            shipping_cost: totals.shipping_cost.display_amount(),
            discount: totals.discount.display_amount(),
            total: totals.total.display_amount(),
            notes: order.notes().map(str::to_string),
            tracking_number: order.tracking_number().map(str::to_string),
            cancellation_reason: order.cancellation_reason().map(str::to_string),
            estimated_delivery: order.estimated_delivery(),
            delivered_at: order.delivered_at(),
            cancelled_at: order.cancelled_at(),
            is_active: order.is_active(),
            version: order.version().as_i64(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

fn to_responses(orders: &[Order]) -> Vec<OrderResponse> {
    orders.iter().map(OrderResponse::from).collect()
}

// -- Handlers --

/// POST /orders: check out the current user's cart.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.0.user_id))]
pub async fn create<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.checkout.checkout(actor.0.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the current user's orders, newest first.
#[tracing::instrument(skip(state), fields(user_id = %actor.0.user_id))]
pub async fn list<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    QueryParams(params): QueryParams<ListOrders>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(&actor.0, params).await?;
    Ok(Json(to_responses(&orders)))
}

/// GET /orders/admin/all: every order, newest first (admin only).
#[tracing::instrument(skip(state), fields(user_id = %actor.0.user_id))]
pub async fn list_all<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    QueryParams(params): QueryParams<ListOrders>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    actor.require_admin()?;
    let orders = state.orders.list_all_orders(&actor.0, params).await?;
    Ok(Json(to_responses(&orders)))
}

/// GET /orders/{id}: an order owned by the user, or any order for admins.
#[tracing::instrument(skip(state), fields(user_id = %actor.0.user_id))]
pub async fn get<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.get_order(&actor.0, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/cancel: cancel an order the user owns.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.0.user_id))]
pub async fn cancel<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(id): Path<String>,
    OptionalJsonBody(req): OptionalJsonBody<CancelRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state
        .orders
        .cancel_order(&actor.0, order_id, req.reason)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/status: change an order's status (admin only).
#[tracing::instrument(skip(state, req), fields(user_id = %actor.0.user_id))]
pub async fn update_status<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<StatusUpdate>,
) -> Result<Json<OrderResponse>, ApiError> {
    actor.require_admin()?;
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.update_status(&actor.0, order_id, req).await?;
    Ok(Json(OrderResponse::from(&order)))
}
