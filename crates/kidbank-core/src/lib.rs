//! # kidbank-core: Pure Domain Model for EasyKidsBank
//!
//! This crate holds everything about a household bank that can be stated
//! without touching a disk, a socket or a screen.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        KidBank Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 kidbank-client (Store/Router/Views)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Gateway / IdentityProvider traits      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kidbank-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  gateway  │  │ validation│  │   │
//! │  │   │    Kid    │  │   Money   │  │   Query   │  │   rules   │  │   │
//! │  │   │  Request  │  │  parsing  │  │  Mutation │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • CONTRACTS ONLY           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ implemented by                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        kidbank-db (SQLite)  /  kidbank-client::memory           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (User, Kid, Transaction, DepositRequest, CustomTheme)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Form field rules (names, PINs, amounts)
//! - [`gateway`] - Remote Data Gateway contract (queries, mutations, snapshots)
//! - [`identity`] - Identity provider contract
//!
//! ## Example Usage
//!
//! ```rust
//! use kidbank_core::money::Money;
//!
//! let allowance: Money = "12.50".parse().unwrap();
//! assert_eq!(allowance.cents(), 1250);
//! assert_eq!(allowance.to_string(), "$12.50");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod gateway;
pub mod identity;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Theme applied to new kids and restored after sign-out.
pub const DEFAULT_THEME_ID: &str = "default";

/// Avatar given to a kid when the parent does not pick one.
pub const DEFAULT_AVATAR: &str = "😊";

/// Avatars offered by the add/edit kid forms.
pub const AVATAR_CHOICES: [&str; 12] = [
    "😊", "😎", "🦊", "🐱", "🐶", "🦁", "🐼", "🐨", "🐰", "🦄", "🐸", "🐙",
];

/// Number of transactions kept in a kid's live history.
pub const TRANSACTION_HISTORY_LIMIT: usize = 50;
