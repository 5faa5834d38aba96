//! Checkout saga state machine.

/// The progress of a single checkout.
///
/// State transitions:
/// ```text
/// NotStarted ──► ReservingStock ──► CartCleared ──► Completed
///                      │                 │
///                      └────────┬────────┘
///                               ▼
///                         Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutState {
    #[default]
    NotStarted,

    /// Stock is being decremented line by line.
    ReservingStock,

    /// All stock is reserved and the cart has been emptied.
    CartCleared,

    /// A step failed and side effects are being undone.
    Compensating,

    /// The order was created (terminal state).
    Completed,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl CheckoutState {
    /// Returns true if side effects may exist that need undoing.
    pub fn can_compensate(&self) -> bool {
        matches!(
            self,
            CheckoutState::ReservingStock | CheckoutState::CartCleared
        )
    }

    /// Returns true if the cart was emptied by this checkout.
    pub fn has_cleared_cart(&self) -> bool {
        matches!(self, CheckoutState::CartCleared)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "NotStarted",
            CheckoutState::ReservingStock => "ReservingStock",
            CheckoutState::CartCleared => "CartCleared",
            CheckoutState::Compensating => "Compensating",
            CheckoutState::Completed => "Completed",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
