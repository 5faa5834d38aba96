use serde::{Deserialize, Serialize};

/// Revision of a stored cart or order.
///
/// Unsaved records sit at 0 and each successful save bumps the revision by
/// one. A save carries the revision the caller loaded; the store rejects it
/// if the stored revision has moved on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Revision of a record that has never been saved.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Revision after the first save.
    pub fn first() -> Self {
        Self(1)
    }

    /// The revision a successful save produces.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns true once the record has been saved at least once.
    pub fn is_persisted(&self) -> bool {
        self.0 > 0
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
