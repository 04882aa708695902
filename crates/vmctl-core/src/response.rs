//! The command response envelope.
//!
//! Every invocation prints exactly one of these as a pretty JSON document.
//! Logical success and failure share the shape; `data` payloads are typed
//! structs serialized here, once, at the boundary.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Standardized JSON response printed to stdout by every command.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandResponse {
    /// Whether the operation succeeded
    pub success: bool,

    /// Time the response was produced (RFC 3339 / ISO-8601)
    pub timestamp: DateTime<Utc>,

    /// Operation payload, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Human-readable error message, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Supplementary human-readable note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResponse {
    /// Build a success response carrying a typed payload.
    ///
    /// A payload that cannot be serialized (which would indicate a bug in
    /// the payload type) degrades to a failure response rather than a panic.
    pub fn success<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                timestamp: Utc::now(),
                data: Some(value),
                error: None,
                message: None,
            },
            Err(err) => {
                warn!("failed to serialize response payload: {err}");
                Self::failure(format!("Internal error serializing response: {err}"))
            }
        }
    }

    /// Build a failure response from an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            timestamp: Utc::now(),
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    /// Attach a top-level message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Serialize to the pretty-printed JSON document printed on stdout.
    #[must_use]
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|err| {
            // The envelope itself only holds already-validated values, so
            // this path is unreachable in practice.
            format!("{{\"success\": false, \"error\": \"{err}\"}}")
        })
    }
}

impl From<&Error> for CommandResponse {
    fn from(err: &Error) -> Self {
        Self::failure(err.to_string())
    }
}
