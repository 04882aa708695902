//! Error types for vmctl operations.
//!
//! Every fault a command can hit maps onto one of these variants and is
//! converted to the JSON failure envelope at the dispatcher boundary;
//! nothing propagates as a panic.

use thiserror::Error;

/// Main error type for provider operations.
///
/// Variants whose display is `{0}` carry a complete, caller-facing message
/// built at the call site (often the provider's message verbatim).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Resource or snapshot id unknown to the provider
    #[error("{0}")]
    NotFound(String),

    /// Bad resource-kind tag or malformed positional value
    #[error("{0}")]
    InvalidArgument(String),

    /// Credential problem reported by the provider
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Network-level failure talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Polling exceeded its budget
    #[error("{0}")]
    Timeout(String),

    /// Terminal status outside the known set
    #[error("{0}")]
    UnexpectedState(String),

    /// Error reported in a provider response body
    #[error("{0}")]
    Api(String),

    /// Failed to decode a provider response
    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    /// Malformed base URL or request path
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Client could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or surplus CLI arguments; carries the usage line verbatim
    #[error("{0}")]
    Usage(String),
}

/// Specialized result type for vmctl operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::AuthFailed(_) => "AUTH_FAILED",
            Self::Transport(_) => "TRANSPORT",
            Self::Timeout(_) => "TIMEOUT",
            Self::UnexpectedState(_) => "UNEXPECTED_STATE",
            Self::Api(_) => "API_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Usage(_) => "USAGE",
        }
    }

    /// Returns true for argument-validation errors, which exit non-zero
    /// instead of being reported as a logical failure.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_) | Self::InvalidArgument(_))
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("Request timed out: {err}"))
        } else if err.is_connect() {
            Self::Transport(format!("Connection failed: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
