//! Error types for the REST gateway.

use thiserror::Error;

/// Errors raised while talking to the YepCode REST API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when the API answers with a non-success status code.
    #[error("HTTP error {status} in endpoint {method} {endpoint}: {message}")]
    Http {
        /// Status code returned by the API.
        status: u16,
        /// HTTP method of the failed call.
        method: String,
        /// Endpoint path relative to the team REST root.
        endpoint: String,
        /// Message extracted from the response body or the reason phrase.
        message: String,
    },
    /// Raised when the client credentials cannot be exchanged for a token.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Raised when the client configuration is unusable.
    #[error("invalid client configuration: {0}")]
    Config(String),
    /// Raised when the request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// Raised when a request body cannot be serialised.
    #[error("failed to encode request for {endpoint}: {message}")]
    Encode {
        /// Endpoint the body was meant for.
        endpoint: String,
        /// Serialiser message.
        message: String,
    },
    /// Raised when a response body does not have the expected shape.
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode {
        /// Endpoint whose response could not be decoded.
        endpoint: String,
        /// Decoder message.
        message: String,
    },
    /// Raised when an execution date filter is not `YYYY-MM-DDTHH:MM:SS`.
    #[error(
        "invalid date format '{0}': it must be a valid ISO 8601 date (ie: 2025-01-01T00:00:00)"
    )]
    InvalidDate(String),
}

impl ApiError {
    /// Returns the HTTP status code when the error came from an API response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for a `404 Not Found` API response.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Builds a `404 Not Found` error for `endpoint`.
    ///
    /// Gateways without an HTTP layer use this to report missing resources
    /// the same way the REST client does.
    #[must_use]
    pub fn not_found(method: &str, endpoint: &str) -> Self {
        Self::Http {
            status: 404,
            method: method.to_owned(),
            endpoint: endpoint.to_owned(),
            message: String::from("Not Found"),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}
