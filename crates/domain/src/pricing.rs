//! Order totals: tax, shipping and delivery estimate.

use chrono::{DateTime, Duration, Utc};
use common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::OrderError;

/// Rules used to price an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Tax rate applied to the subtotal (0.10 = 10%).
    pub tax_rate: Decimal,

    /// Subtotals strictly above this amount ship for free.
    pub free_shipping_threshold: Money,

    /// Shipping charged when the subtotal is at or below the threshold.
    pub flat_shipping_cost: Money,

    /// Days from order placement to the estimated delivery date.
    pub delivery_window_days: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(10, 2),
            free_shipping_threshold: Money::from_major(100),
            flat_shipping_cost: Money::from_major(10),
            delivery_window_days: 7,
        }
    }
}

impl PricingPolicy {
    /// Computes the totals for an order with the given subtotal.
    pub fn totals_for(&self, subtotal: Money) -> Result<OrderTotals, OrderError> {
        let tax = subtotal
            .checked_apply_rate(self.tax_rate)
            .ok_or(OrderError::AmountOverflow)?;
        let shipping_cost = if subtotal > self.free_shipping_threshold {
            Money::zero()
        } else {
            self.flat_shipping_cost
        };
        OrderTotals::new(subtotal, tax, shipping_cost, Money::zero())
            .ok_or(OrderError::AmountOverflow)
    }

    /// Returns the estimated delivery time for an order placed at `placed_at`.
    pub fn estimated_delivery(&self, placed_at: DateTime<Utc>) -> DateTime<Utc> {
        placed_at + Duration::days(self.delivery_window_days)
    }
}

/// The monetary summary of an order.
///
/// `total` is always `subtotal + tax + shipping_cost - discount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Returns `None` if the total is out of range.
    pub fn new(subtotal: Money, tax: Money, shipping_cost: Money, discount: Money) -> Option<Self> {
        let total = subtotal
            .checked_add(tax)?
            .checked_add(shipping_cost)?
            .checked_sub(discount)?;
        Some(Self {
            subtotal,
            tax,
            shipping_cost,
            discount,
            total,
        })
    }
}
