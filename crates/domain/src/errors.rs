//! Error types used throughout the recorder host

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for MindHit
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MindhitError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for MindHit operations
pub type Result<T> = std::result::Result<T, MindhitError>;

/// Categories of delivery failures, used for log labels and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorCategory {
    /// No bearer token was available, or the server rejected it
    Authentication,
    /// 429 responses
    RateLimit,
    /// 5xx responses
    Server,
    /// 4xx responses other than auth and rate limiting
    Client,
    /// Connection failures and timeouts
    Network,
    /// The batch could not be encoded
    Serialization,
}

/// Failure of a single batch delivery attempt.
///
/// Every variant counts as a failed attempt for the retry budget; the
/// category only drives logging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("No bearer token available")]
    AuthMissing,

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DeliveryError {
    /// Get the error category for this error
    pub fn category(&self) -> DeliveryErrorCategory {
        match self {
            Self::AuthMissing | Self::Auth(_) => DeliveryErrorCategory::Authentication,
            Self::RateLimit(_) => DeliveryErrorCategory::RateLimit,
            Self::Server(_) => DeliveryErrorCategory::Server,
            Self::Client(_) => DeliveryErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => DeliveryErrorCategory::Network,
            Self::Serialization(_) => DeliveryErrorCategory::Serialization,
        }
    }

    /// Stable label suitable for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AuthMissing => "auth_missing",
            Self::Auth(_) => "auth",
            Self::RateLimit(_) => "rate_limit",
            Self::Server(_) => "server",
            Self::Client(_) => "client",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<DeliveryError> for MindhitError {
    fn from(err: DeliveryError) -> Self {
        match err.category() {
            DeliveryErrorCategory::Authentication => Self::Auth(err.to_string()),
            DeliveryErrorCategory::Serialization => Self::InvalidInput(err.to_string()),
            _ => Self::Network(err.to_string()),
        }
    }
}
