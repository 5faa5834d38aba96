//! Human-readable order numbers.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// An order number of the form `ORD{YY}{MM}{DD}{NNNN}`.
///
/// `NNNN` is the position of the order within its calendar day, starting at
/// 1 and zero-padded to four digits. Numbers are allocated by the order store
/// together with the insert, so every persisted order carries its final
/// number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "ORD";

    /// Builds the number for the `sequence`-th order placed on `day`.
    pub fn new(day: NaiveDate, sequence: u32) -> Self {
        Self(format!(
            "{}{}{:04}",
            Self::PREFIX,
            Self::day_code(day),
            sequence
        ))
    }

    /// Returns the `ORD{YY}{MM}{DD}` prefix shared by all orders of a day.
    pub fn day_prefix(day: NaiveDate) -> String {
        format!("{}{}", Self::PREFIX, Self::day_code(day))
    }

    fn day_code(day: NaiveDate) -> String {
        format!(
            "{:02}{:02}{:02}",
            day.year().rem_euclid(100),
            day.month(),
            day.day()
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the per-day sequence encoded in the number.
    pub fn sequence(&self) -> Option<u32> {
        self.0.get(9..).and_then(|digits| digits.parse().ok())
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format() {
        assert_eq!(OrderNumber::new(day(2026, 3, 7), 1).as_str(), "ORD2603070001");
        assert_eq!(OrderNumber::new(day(2031, 12, 31), 42).as_str(), "ORD3112310042");
    }

    #[test]
    fn test_day_prefix() {
        let number = OrderNumber::new(day(2026, 10, 17), 9);
        assert!(number.as_str().starts_with(&OrderNumber::day_prefix(day(2026, 10, 17))));
    }

    #[test]
    fn test_sequence() {
        assert_eq!(OrderNumber::new(day(2026, 1, 2), 17).sequence(), Some(17));
        assert_eq!(OrderNumber::new(day(2026, 1, 2), 12345).sequence(), Some(12345));
    }

    #[test]
    fn test_numbers_sort_by_sequence_within_a_day() {
        let first = OrderNumber::new(day(2026, 1, 2), 1);
        let second = OrderNumber::new(day(2026, 1, 2), 2);
        assert!(first < second);
    }
}
