//! Order aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::{Money, OrderId, UserId, Version};
use serde::{Deserialize, Serialize};

use crate::pricing::{OrderTotals, PricingPolicy};

use super::{
    BillingAddress, OrderError, OrderItem, OrderNumber, OrderStatus, PaymentMethod,
    PaymentStatus, ShippingAddress,
};

/// Maximum length of order notes, in characters.
pub const MAX_NOTES_LEN: usize = 500;

/// Maximum length of a cancellation reason, in characters.
pub const MAX_REASON_LEN: usize = 200;

/// A fully priced order that has not been persisted yet.
///
/// Drafts carry no id or order number: both are assigned by the order store
/// when the draft is inserted, which turns it into an [`Order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub owner_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub billing_address: BillingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub totals: OrderTotals,
    pub estimated_delivery: DateTime<Utc>,
    pub placed_at: DateTime<Utc>,
}

impl OrderDraft {
    /// Prices `items` with `policy` and validates the order details.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        billing_address: Option<BillingAddress>,
        payment_method: PaymentMethod,
        notes: Option<String>,
        policy: &PricingPolicy,
        placed_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        shipping_address.validate()?;
        let notes = normalize_notes(notes)?;

        let subtotal = Money::checked_sum(items.iter().map(|item| item.line_total))
            .ok_or(OrderError::AmountOverflow)?;
        let totals = policy.totals_for(subtotal)?;
        let billing_address =
            billing_address.unwrap_or_else(|| BillingAddress::from(&shipping_address));

        Ok(Self {
            owner_id,
            items,
            shipping_address,
            billing_address,
            payment_method,
            notes,
            totals,
            estimated_delivery: policy.estimated_delivery(placed_at),
            placed_at,
        })
    }

    /// The UTC calendar day the order number is allocated against.
    pub fn calendar_day(&self) -> NaiveDate {
        self.placed_at.date_naive()
    }
}

/// Trims notes, treating blank notes as absent, and enforces the length limit.
pub(crate) fn normalize_notes(notes: Option<String>) -> Result<Option<String>, OrderError> {
    let Some(notes) = notes else {
        return Ok(None);
    };
    let trimmed = notes.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let len = trimmed.chars().count();
    if len > MAX_NOTES_LEN {
        return Err(OrderError::NotesTooLong {
            len,
            max: MAX_NOTES_LEN,
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// The outcome of [`Order::update_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl StatusChange {
    /// Returns true if the status actually changed.
    pub fn is_transition(&self) -> bool {
        self.from != self.to
    }

    /// Returns true if this change moved a live order into `Cancelled`.
    pub fn is_cancellation(&self) -> bool {
        self.is_transition() && self.to == OrderStatus::Cancelled
    }
}

/// Order aggregate root.
///
/// Created from an [`OrderDraft`] by the order store. Items and monetary
/// totals never change after creation; only the status, tracking number and
/// notes do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    owner_id: UserId,
    order_number: OrderNumber,
    items: Vec<OrderItem>,
    shipping_address: ShippingAddress,
    billing_address: BillingAddress,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    status: OrderStatus,
    subtotal: Money,
    tax: Money,
    shipping_cost: Money,
    discount: Money,
    total: Money,
    notes: Option<String>,
    estimated_delivery: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    tracking_number: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// Query methods
impl Order {
    /// Materializes a draft with the identity assigned by the store.
    pub fn from_draft(draft: OrderDraft, id: OrderId, order_number: OrderNumber) -> Self {
        let OrderTotals {
            subtotal,
            tax,
            shipping_cost,
            discount,
            total,
        } = draft.totals;

        Self {
            id,
            version: Version::initial(),
            owner_id: draft.owner_id,
            order_number,
            items: draft.items,
            shipping_address: draft.shipping_address,
            billing_address: draft.billing_address,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Pending,
            subtotal,
            tax,
            shipping_cost,
            discount,
            total,
            notes: draft.notes,
            estimated_delivery: draft.estimated_delivery,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            tracking_number: None,
            is_active: true,
            created_at: draft.placed_at,
            updated_at: draft.placed_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the total quantity across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &BillingAddress {
        &self.billing_address
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            shipping_cost: self.shipping_cost,
            discount: self.discount,
            total: self.total,
        }
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn estimated_delivery(&self) -> DateTime<Utc> {
        self.estimated_delivery
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the order may still be cancelled.
    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_be_cancelled()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Order {
    /// Moves the order to `status`.
    ///
    /// `Delivered` stamps `delivered_at`; `Cancelled` stamps `cancelled_at`
    /// and records `notes` as the cancellation reason. Setting the current
    /// status again changes nothing. Terminal orders cannot move elsewhere.
    pub fn update_status(
        &mut self,
        status: OrderStatus,
        notes: Option<String>,
    ) -> Result<StatusChange, OrderError> {
        let change = StatusChange {
            from: self.status,
            to: status,
        };
        if !change.is_transition() {
            return Ok(change);
        }
        if self.status.is_terminal() {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: status,
            });
        }

        let now = Utc::now();
        match status {
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => {
                self.cancellation_reason = normalize_reason(notes)?;
                self.cancelled_at = Some(now);
            }
            _ => {}
        }
        self.status = status;
        self.updated_at = now;
        Ok(change)
    }

    /// Cancels the order on behalf of its owner.
    pub fn cancel(&mut self, reason: Option<String>) -> Result<StatusChange, OrderError> {
        if !self.can_be_cancelled() {
            return Err(OrderError::NotCancellable {
                status: self.status,
            });
        }
        self.update_status(OrderStatus::Cancelled, reason)
    }

    pub fn set_tracking_number(&mut self, tracking_number: impl Into<String>) {
        self.tracking_number = Some(tracking_number.into());
        self.updated_at = Utc::now();
    }

    /// Replaces the order notes. Blank notes clear them.
    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), OrderError> {
        self.notes = normalize_notes(Some(notes.into()))?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn normalize_reason(reason: Option<String>) -> Result<Option<String>, OrderError> {
    let Some(reason) = reason else {
        return Ok(None);
    };
    let trimmed = reason.trim();
    let len = trimmed.chars().count();
    if len > MAX_REASON_LEN {
        return Err(OrderError::ReasonTooLong {
            len,
            max: MAX_REASON_LEN,
        });
    }
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}
