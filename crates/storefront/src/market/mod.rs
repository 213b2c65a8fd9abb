//! Marketplace REST API client.
//!
//! # Architecture
//!
//! - The marketplace backend is the source of truth - NO local sync, direct API calls
//! - JSON request/response bodies via `reqwest` + `serde`
//! - In-memory caching via `moka` for unauthenticated catalog reads (5 minute TTL)
//! - Authenticated calls replay the backend session cookie captured at login
//!
//! # Example
//!
//! ```rust,ignore
//! use soko_safi_storefront::market::MarketClient;
//!
//! let client = MarketClient::new(&config.market)?;
//!
//! // Sign in and keep the backend session token
//! let (user, token) = client.login("wanjiku", "hunter-green-42").await?;
//!
//! // Browse the catalog (cached)
//! let products = client.products().await?;
//!
//! // Place an order for the session cart
//! let order = client.place_order(&token, &lines).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::MarketClient;
pub use types::*;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the marketplace API.
#[derive(Debug, Error)]
pub enum MarketError {
    /// HTTP request failed (connection refused, timeout, etc.).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No valid backend session (HTTP 401).
    #[error("Not signed in to the marketplace")]
    Unauthorized,

    /// Backend refused the operation for this account (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Backend rejected the request as invalid (HTTP 4xx with an error body).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Login or signup succeeded but no session cookie came back.
    #[error("marketplace response did not set a session cookie")]
    MissingSessionCookie,

    /// Any other non-success response.
    #[error("Marketplace API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

impl MarketError {
    /// Classify a non-success response by status code and body.
    ///
    /// The backend reports failures as `{"error": "..."}`; that message is
    /// carried into the variant so handlers can surface it verbatim.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let message = error_body_message(body);
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            s if s.is_client_error() => Self::Rejected(message),
            s => Self::Api {
                status: s.as_u16(),
                message,
            },
        }
    }
}

/// Extract the `error` field from a backend error body, falling back to a
/// truncated copy of the raw body.
fn error_body_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "(no error details provided)".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_error_display() {
        let err = MarketError::NotFound("Product not found".to_string());
        assert_eq!(err.to_string(), "Not found: Product not found");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = MarketError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_from_response_unauthorized() {
        let err = MarketError::from_response(
            StatusCode::UNAUTHORIZED,
            r#"{"error": "User not logged in"}"#,
        );
        assert!(matches!(err, MarketError::Unauthorized));
    }

    #[test]
    fn test_from_response_forbidden_carries_message() {
        let err = MarketError::from_response(
            StatusCode::FORBIDDEN,
            r#"{"error": "Only vendors can create products"}"#,
        );
        match err {
            MarketError::Forbidden(message) => {
                assert_eq!(message, "Only vendors can create products");
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_not_found() {
        let err =
            MarketError::from_response(StatusCode::NOT_FOUND, r#"{"error": "Vendor not found"}"#);
        match err {
            MarketError::NotFound(message) => assert_eq!(message, "Vendor not found"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_bad_request_is_rejected() {
        let err =
            MarketError::from_response(StatusCode::BAD_REQUEST, r#"{"error": "Cart is empty"}"#);
        match err {
            MarketError::Rejected(message) => assert_eq!(message, "Cart is empty"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_server_error() {
        let err = MarketError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        match err {
            MarketError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_error_body_message_fallbacks() {
        assert_eq!(error_body_message(""), "(no error details provided)");
        assert_eq!(error_body_message("not json"), "not json");
        assert_eq!(
            error_body_message(r#"{"error": "Username already taken"}"#),
            "Username already taken"
        );
    }
}
