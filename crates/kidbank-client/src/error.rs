//! # Client Error Types
//!
//! What a screen receives when a service call fails.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Client                             │
//! │                                                                         │
//! │  Screen handler                Services                                 │
//! │  ──────────────                ────────                                 │
//! │                                                                         │
//! │  bank.add_money(..).await                                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Result<T, ClientError>                                          │  │
//! │  │         │                                                        │  │
//! │  │  Gateway failure? ── GatewayError::Unavailable ──┐               │  │
//! │  │  Auth failure?    ── AuthError::WrongPassword ───┤               │  │
//! │  │  Rule violation?  ── CoreError::Insufficient… ───┼─► ClientError │  │
//! │  │  Bad input?       ── ValidationError ────────────┘    {code,msg} │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  notifier.error(err.message)   ← never a panic, never a blank screen   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kidbank_core::gateway::GatewayError;
use kidbank_core::identity::AuthError;
use kidbank_core::{CoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Client Error
// =============================================================================

/// Structured failure of a service call.
///
/// ```json
/// { "code": "INSUFFICIENT_FUNDS", "message": "Insufficient balance" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ClientError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable message, safe to show in a toast
    pub message: String,
}

/// Error codes for service results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Action needs a signed-in parent
    NotAuthenticated,

    /// Action needs an active kid session
    NotInKidMode,

    NotFound,

    ValidationError,

    InsufficientFunds,

    /// Request already approved/denied
    Conflict,

    /// Identity provider refused
    AuthFailed,

    /// Remote store failure
    GatewayError,

    Internal,
}

impl ClientError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ClientError {
            code,
            message: message.into(),
        }
    }

    pub fn not_authenticated() -> Self {
        ClientError::new(ErrorCode::NotAuthenticated, "Please sign in first")
    }

    pub fn not_in_kid_mode() -> Self {
        ClientError::new(ErrorCode::NotInKidMode, "No kid is logged in")
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ClientError::new(ErrorCode::NotFound, format!("{resource} not found: {id}"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ClientError::new(ErrorCode::Internal, message)
    }
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        ClientError::validation(err.to_string())
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::KidNotFound(id) => ClientError::not_found("Kid", &id),
            CoreError::RequestNotFound(id) => ClientError::not_found("Request", &id),
            CoreError::InsufficientFunds { .. } => {
                ClientError::new(ErrorCode::InsufficientFunds, "Insufficient balance")
            }
            CoreError::RequestAlreadyResolved { status, .. } => ClientError::new(
                ErrorCode::Conflict,
                format!("This request was already {status}"),
            ),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { collection, id } => {
                ClientError::not_found(collection.as_str(), &id)
            }
            GatewayError::Conflict(message) => ClientError::new(ErrorCode::Conflict, message),
            GatewayError::PermissionDenied(_) => ClientError::new(
                ErrorCode::GatewayError,
                "You don't have permission to do that",
            ),
            GatewayError::Unavailable(e) => {
                tracing::error!("Gateway unavailable: {}", e);
                ClientError::new(
                    ErrorCode::GatewayError,
                    "Network error. Please check your connection.",
                )
            }
            GatewayError::InvalidMutation(e) | GatewayError::Backend(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Gateway operation failed: {}", e);
                ClientError::new(ErrorCode::GatewayError, "Something went wrong. Please try again.")
            }
        }
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        if let AuthError::Other(code) = &err {
            tracing::warn!(code = %code, "Unmapped identity provider error");
        }
        ClientError::new(ErrorCode::AuthFailed, err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

// =============================================================================
// View Error
// =============================================================================

/// A screen could not be built or rendered.
///
/// Caught at the router boundary and turned into a generic toast.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("View {0} is already mounted")]
    AlreadyMounted(&'static str),

    #[error("Invalid route parameter for {view}: {reason}")]
    InvalidParams { view: &'static str, reason: String },

    #[error("Render failed: {0}")]
    Render(String),
}

// =============================================================================
// Config Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kidbank_core::gateway::Collection;
    use kidbank_core::Money;

    #[test]
    fn test_insufficient_funds_maps_to_short_message() {
        let err: ClientError = CoreError::InsufficientFunds {
            available: Money::from_cents(100),
            requested: Money::from_cents(500),
        }
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientFunds);
        assert_eq!(err.message, "Insufficient balance");
    }

    #[test]
    fn test_gateway_errors_hide_internals() {
        let err: ClientError = GatewayError::Backend("disk I/O error".to_string()).into();
        assert_eq!(err.code, ErrorCode::GatewayError);
        assert!(!err.message.contains("disk"));

        let err: ClientError = GatewayError::not_found(Collection::Kids, "k9").into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.to_string(), "kids not found: k9");
    }

    #[test]
    fn test_serializes_screaming_code() {
        let err = ClientError::not_authenticated();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_AUTHENTICATED");
    }
}
