//! Persisted cart operations.

use common::{ProductId, UserId};
use domain::Cart;
use store::CommerceStore;

use crate::error::{CheckoutError, Result};

/// Loads a user's cart, applies one mutation and saves it.
///
/// Saves are guarded by the cart version; a concurrent writer makes the
/// later save fail with [`CheckoutError::Conflict`].
pub struct CartService<S>
where
    S: CommerceStore,
{
    store: S,
}

impl<S> CartService<S>
where
    S: CommerceStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the user's cart, or a new empty one if they have none yet.
    pub async fn get_cart(&self, owner_id: UserId) -> Result<Cart> {
        Ok(self
            .store
            .get_cart(owner_id)
            .await?
            .unwrap_or_else(|| Cart::new(owner_id)))
    }

    /// Adds `quantity` of a product at its current price.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound(product_id))?;
        if !product.is_available() {
            return Err(CheckoutError::ProductUnavailable {
                product_id,
                product: product.name,
            });
        }

        let mut cart = self.get_cart(owner_id).await?;
        cart.add_item(product_id, quantity, product.price)?;
        self.save(cart).await
    }

    /// Sets a line's quantity; zero or less removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart> {
        let mut cart = self.get_cart(owner_id).await?;
        cart.update_quantity(product_id, quantity)?;
        self.save(cart).await
    }

    /// Removes a line. Removing an absent product is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, owner_id: UserId, product_id: ProductId) -> Result<Cart> {
        let mut cart = self.get_cart(owner_id).await?;
        if cart.get_item(product_id).is_none() {
            return Ok(cart);
        }
        cart.remove_item(product_id)?;
        self.save(cart).await
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner_id: UserId) -> Result<Cart> {
        let mut cart = self.get_cart(owner_id).await?;
        cart.clear();
        self.save(cart).await
    }

    async fn save(&self, mut cart: Cart) -> Result<Cart> {
        let version = self.store.save_cart(&cart).await?;
        cart.set_version(version);
        tracing::debug!(
            user_id = %cart.owner_id(),
            items = cart.item_count(),
            %version,
            "cart saved"
        );
        Ok(cart)
    }
}
