//! Bearer-token gate for uploads.
//!
//! Auth is opt-in: with no configured token every request is allowed. When
//! a token is configured it gates PUT only; reads and preflight are never
//! checked.

use crate::error::ApiError;

/// Check an upload's `Authorization` header against the configured token.
///
/// Accepts either the raw token or `Bearer <token>`; anything else is a 401.
pub fn authorize(configured: Option<&str>, header: Option<&str>) -> Result<(), ApiError> {
    let token = match configured {
        Some(t) => t,
        None => return Ok(()),
    };

    match header {
        Some(value) if value == token => Ok(()),
        Some(value) if value.strip_prefix("Bearer ") == Some(token) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}
