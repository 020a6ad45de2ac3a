//! Error types for the generation gateway client.
//!
//! Defines [`GenerationError`] with variants for rate limiting, API errors,
//! content-policy rejections and network failures. Uses `thiserror` to derive
//! `Display` and `Error` from the `#[error(...)]` attributes.
//!
//! Every variant is an item-level failure: the scheduler records it on the
//! item and keeps going, it never aborts the job.

use thiserror::Error;

/// Errors that can occur while executing a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The gateway returned HTTP 429. `retry_after_ms` says how long to wait
    /// before retrying.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other HTTP error from the gateway (4xx/5xx) with the response body.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The gateway rejected the request on content-policy grounds (HTTP 422).
    #[error("content rejected: {0}")]
    ContentRejected(String),

    /// Underlying network failure (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
