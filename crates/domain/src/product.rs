//! Catalog product record as seen by carts and checkout.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A product in the catalog.
///
/// Only the fields the order lifecycle depends on are modelled here. Stock is
/// never negative; it is decremented by checkout and incremented by
/// cancellation or restock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product with a fresh ID.
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            stock,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the product can be bought.
    pub fn is_available(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    /// Returns true if at least `quantity` units are in stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}
