//! API error types and their HTTP mapping

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::error;

use blossom_store::StoreError;

/// Errors surfaced to HTTP clients.
///
/// Every handler error is converted to a response here; nothing escapes the
/// router boundary. A malformed digest and an absent digest both map to
/// `NotFound` on reads, so clients cannot distinguish rejected input from a
/// miss.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Computed digest of the body does not match the digest in the path
    #[error("Hash mismatch")]
    HashMismatch,

    /// PUT target is not a 64-char lowercase hex digest
    #[error("Invalid hash")]
    InvalidHash,

    /// Missing or wrong Authorization on a write
    #[error("Unauthorized")]
    Unauthorized,

    /// Blob absent, or the requested path never validated as a digest
    #[error("Not found")]
    NotFound,

    /// Upload exceeds the configured size limit
    #[error("Blob too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: u64, max: u64 },

    /// Storage failure; internal detail is logged, never sent to the client
    #[error("Internal server error")]
    Storage(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::DigestMismatch { .. } => Self::HashMismatch,
            StoreError::BlobTooLarge { size, max } => Self::TooLarge { size, max },
            other => Self::Storage(other),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::HashMismatch | Self::InvalidHash => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Storage(inner) = self {
            error!("Storage failure: {}", inner);
        }

        // Error responses bypass the response middleware chain, so the CORS
        // headers the wire contract requires on every response are set here
        // as well.
        let mut builder = HttpResponse::build(self.status_code());
        for (name, value) in crate::api::CORS_HEADERS {
            builder.insert_header((name, value));
        }
        builder.json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }))
    }
}
