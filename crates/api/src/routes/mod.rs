//! HTTP route handlers.

pub mod cart;
pub mod ops;
pub mod orders;
pub mod products;

use crate::error::ApiError;

/// Parses a path segment into a typed id.
pub(crate) fn parse_id<T>(kind: &str, raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} ID format: {e}")))
}
