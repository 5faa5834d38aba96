//! Cart aggregate.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while mutating a cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The product is not in the cart.
    #[error("Item not found in cart: {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// Quantities must be at least one and fit in a `u32`, per line and in total.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// A line or cart total is too large to represent.
    #[error("Amount for product {product_id} is out of range")]
    AmountOverflow { product_id: ProductId },
}

/// A line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,

    /// Price captured when the item was last added.
    pub price: Money,

    /// `price * quantity`, recomputed by every cart mutation.
    pub line_total: Money,

    pub added_at: DateTime<Utc>,
}

/// A user's cart.
///
/// Holds at most one line per product. `total` and `item_count` are derived
/// from the items and recomputed by every mutator, so a cart is always
/// consistent when it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    owner_id: UserId,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    items: Vec<CartItem>,
    total: Money,
    item_count: u32,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

// Query methods
impl Cart {
    /// Creates an empty, never-persisted cart for a user.
    pub fn new(owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            owner_id,
            version: Version::initial(),
            items: Vec::new(),
            total: Money::zero(),
            item_count: 0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the version after a successful save.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Returns the items in the order they were first added.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get_item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Returns the sum of all line totals.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Returns the sum of all quantities.
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

// Mutators
//
// Each mutator builds the new item list, prices it with checked arithmetic
// and only then replaces the current state, so a failed mutation leaves the
// cart untouched.
impl Cart {
    /// Adds `quantity` units of a product.
    ///
    /// If the product is already in the cart its quantity grows and its price
    /// is replaced by `unit_price`. Stock is not checked here.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity: 0 });
        }

        let mut items = self.items.clone();
        match items.iter_mut().find(|item| item.product_id == product_id) {
            Some(existing) => {
                let merged = i64::from(existing.quantity) + i64::from(quantity);
                existing.quantity = u32::try_from(merged)
                    .map_err(|_| CartError::InvalidQuantity { quantity: merged })?;
                existing.price = unit_price;
            }
            None => items.push(CartItem {
                product_id,
                quantity,
                price: unit_price,
                line_total: Money::zero(),
                added_at: Utc::now(),
            }),
        }

        self.apply(items)
    }

    /// Sets the quantity of a product already in the cart.
    ///
    /// A quantity of zero or less removes the line.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), CartError> {
        let position = self
            .items
            .iter()
            .position(|item| item.product_id == product_id)
            .ok_or(CartError::ItemNotFound { product_id })?;

        let mut items = self.items.clone();
        if quantity <= 0 {
            items.remove(position);
        } else {
            let quantity =
                u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity { quantity })?;
            if let Some(item) = items.get_mut(position) {
                item.quantity = quantity;
            }
        }

        self.apply(items)
    }

    /// Removes a product from the cart. Removing an absent product is a no-op.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), CartError> {
        let items = self
            .items
            .iter()
            .filter(|item| item.product_id != product_id)
            .cloned()
            .collect();
        self.apply(items)
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total = Money::zero();
        self.item_count = 0;
        self.last_updated = Utc::now();
    }

    /// Replaces all lines, e.g. to put back items after a failed checkout.
    pub fn replace_items(&mut self, items: Vec<CartItem>) -> Result<(), CartError> {
        self.apply(items)
    }

    fn apply(&mut self, mut items: Vec<CartItem>) -> Result<(), CartError> {
        let mut total = Money::zero();
        let mut item_count: u32 = 0;
        for item in &mut items {
            let product_id = item.product_id;
            let overflow = move || CartError::AmountOverflow { product_id };
            item.line_total = item
                .price
                .checked_multiply(item.quantity)
                .ok_or_else(overflow)?;
            total = total.checked_add(item.line_total).ok_or_else(overflow)?;

            let requested = i64::from(item_count) + i64::from(item.quantity);
            item_count = u32::try_from(requested)
                .map_err(|_| CartError::InvalidQuantity { quantity: requested })?;
        }

        self.items = items;
        self.total = total;
        self.item_count = item_count;
        self.last_updated = Utc::now();
        Ok(())
    }
}
