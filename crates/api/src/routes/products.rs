//! Product registration and lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use domain::Product;
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use crate::AppState;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::routes::parse_id;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price: String,
    pub stock: u32,
    pub is_active: bool,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.display_amount(),
            stock: product.stock,
            is_active: product.is_active,
            is_available: product.is_available(),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// POST /products: register a product (admin only).
#[tracing::instrument(skip(state, req), fields(user_id = %actor.0.user_id))]
pub async fn create<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    actor.require_admin()?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Product name is required".to_string()));
    }
    if req.price.is_negative() {
        return Err(ApiError::BadRequest(
            "Product price cannot be negative".to_string(),
        ));
    }

    let mut product = Product::new(name, req.price, req.stock);
    product.is_active = req.is_active;
    let product = state.store.insert_product(product).await?;

    tracing::info!(product_id = %product.id, "product registered");
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

/// GET /products/{id}: load a product.
#[tracing::instrument(skip(state))]
pub async fn get<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {product_id}")))?;

    Ok(Json(ProductResponse::from(&product)))
}
