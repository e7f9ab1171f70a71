//! # Identity Provider Contract
//!
//! Authentication is delegated. The client consumes two things: the
//! "auth state changed" stream and a handful of account operations.
//!
//! ```text
//! startup ──► on_auth_state_changed(cb) ──► cb(None | Some(user))   (once)
//! sign_in ─────────────────────────────────► cb(Some(user))
//! sign_out ────────────────────────────────► cb(None)
//! ```

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::ListenerRegistration;
use crate::types::User;

/// Identity provider failures. `Display` is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("This email is already registered. Try signing in instead.")]
    EmailAlreadyInUse,

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("This sign-in method is not enabled.")]
    OperationNotAllowed,

    #[error("Password should be at least 6 characters.")]
    WeakPassword,

    #[error("This account has been disabled.")]
    UserDisabled,

    #[error("No account found with this email.")]
    UserNotFound,

    #[error("Incorrect password. Please try again.")]
    WrongPassword,

    #[error("Invalid email or password.")]
    InvalidCredential,

    #[error("Too many failed attempts. Please try again later.")]
    TooManyRequests,

    #[error("Network error. Please check your connection.")]
    NetworkRequestFailed,

    #[error("Please sign in again to complete this action.")]
    RequiresRecentLogin,

    /// Anything the provider reports that has no dedicated variant.
    #[error("An error occurred. Please try again.")]
    Other(String),
}

impl AuthError {
    /// Maps a provider error code (`auth/wrong-password`) to a variant.
    pub fn from_code(code: &str) -> Self {
        match code.trim_start_matches("auth/") {
            "email-already-in-use" => AuthError::EmailAlreadyInUse,
            "invalid-email" => AuthError::InvalidEmail,
            "operation-not-allowed" => AuthError::OperationNotAllowed,
            "weak-password" => AuthError::WeakPassword,
            "user-disabled" => AuthError::UserDisabled,
            "user-not-found" => AuthError::UserNotFound,
            "wrong-password" => AuthError::WrongPassword,
            "invalid-credential" => AuthError::InvalidCredential,
            "too-many-requests" => AuthError::TooManyRequests,
            "network-request-failed" => AuthError::NetworkRequestFailed,
            "requires-recent-login" => AuthError::RequiresRecentLogin,
            other => AuthError::Other(other.to_string()),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Stable account id for an email address (case and whitespace ignored).
/// Local backends use it so a seeded household and a later sign-in agree.
pub fn account_id(email: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, email.trim().to_lowercase().as_bytes()).to_string()
}

/// The external authentication service.
#[async_trait(?Send)]
pub trait IdentityProvider {
    /// Registers `callback` for auth transitions. It fires once with the
    /// current state right after registration, then on every change.
    fn on_auth_state_changed(&self, callback: Box<dyn Fn(Option<User>)>) -> ListenerRegistration;

    fn current_user(&self) -> Option<User>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<User>;

    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>)
        -> AuthResult<User>;

    async fn sign_out(&self) -> AuthResult<()>;

    async fn reset_password(&self, email: &str) -> AuthResult<()>;
}
