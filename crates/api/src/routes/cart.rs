//! Cart endpoints for the current user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::ProductId;
use domain::{Cart, CartItem};
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use crate::AppState;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::routes::parse_id;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub owner_id: String,
    pub items: Vec<CartItemResponse>,
    pub total: String,
    pub item_count: u32,
    pub version: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
    pub added_at: DateTime<Utc>,
}

impl From<&CartItem> for CartItemResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            price: item.price.display_amount(),
            line_total: item.line_total.display_amount(),
            added_at: item.added_at,
        }
    }
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            owner_id: cart.owner_id().to_string(),
            items: cart.items().iter().map(CartItemResponse::from).collect(),
            total: cart.total().display_amount(),
            item_count: cart.item_count(),
            version: cart.version().as_i64(),
            last_updated: cart.last_updated(),
        }
    }
}

// -- Handlers --

/// GET /cart: the current user's cart, empty if they have none.
#[tracing::instrument(skip(state), fields(user_id = %actor.0.user_id))]
pub async fn get<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(actor.0.user_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// POST /cart/items: add a product at its current price.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.0.user_id))]
pub async fn add_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &req.product_id)?;
    let cart = state
        .carts
        .add_item(actor.0.user_id, product_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// PUT /cart/items/{product_id}: set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, req), fields(user_id = %actor.0.user_id))]
pub async fn update_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(product_id): Path<String>,
    JsonBody(req): JsonBody<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let cart = state
        .carts
        .update_quantity(actor.0.user_id, product_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart/items/{product_id}: remove a line.
#[tracing::instrument(skip(state), fields(user_id = %actor.0.user_id))]
pub async fn remove_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let cart = state
        .carts
        .remove_item(actor.0.user_id, product_id)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart: empty the cart.
#[tracing::instrument(skip(state), fields(user_id = %actor.0.user_id))]
pub async fn clear<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.clear(actor.0.user_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}
