//! HTTP route handlers.

pub mod escalations;
pub mod health;
pub mod metrics;
pub mod prescriptions;
pub mod schedules;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path identifier, answering 400 on malformed input.
pub(crate) fn parse_id<T>(kind: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} id '{raw}': {e}")))
}
