//! # Domain Types
//!
//! Records exchanged between the gateway, the store and the views.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │       Kid       │   │  Transaction    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  parent_id      │◄──│  kid_id         │       │
//! │  │  email          │   │  name, pin      │   │  type, amount   │       │
//! │  │  display_name   │   │  balance        │   │  requested_by   │       │
//! │  └─────────────────┘   │  theme          │   └─────────────────┘       │
//! │                        │  custom_themes ─┼──► CustomTheme              │
//! │                        └────────▲────────┘                              │
//! │                                 │                                       │
//! │                        ┌────────┴────────┐                              │
//! │                        │ DepositRequest  │  Pending → Approved | Denied │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All records compare structurally (`PartialEq`): the store relies on it to
//! skip notifications when a snapshot delivers an unchanged record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// User
// =============================================================================

/// The signed-in parent as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl User {
    /// Builds a user, deriving the display name from the email when the
    /// provider has none (`jo@home.net` → `jo`).
    pub fn new(id: impl Into<String>, email: impl Into<String>, display_name: Option<String>) -> Self {
        let email = email.into();
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        Self {
            id: id.into(),
            email,
            display_name,
            avatar_url: None,
        }
    }
}

// =============================================================================
// Parent Profile
// =============================================================================

/// The parent's own document, created on first sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ParentProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ParentProfile {
    pub fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Theme Colors
// =============================================================================

/// Palette of a custom theme. Values are `#rrggbb` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub background: String,
    pub surface: String,
    pub text: String,
    pub text_secondary: String,
    pub accent: String,
    pub success: String,
    pub warning: String,
    pub error: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            primary: "#4a90d9".to_string(),
            secondary: "#a29bfe".to_string(),
            background: "#f0f4f8".to_string(),
            surface: "#ffffff".to_string(),
            text: "#2d3436".to_string(),
            text_secondary: "#636e72".to_string(),
            accent: "#00cec9".to_string(),
            success: "#00b894".to_string(),
            warning: "#fdcb6e".to_string(),
            error: "#e17055".to_string(),
        }
    }
}

/// A theme designed by a kid, stored on the kid's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomTheme {
    /// Always starts with `custom-`.
    pub id: String,
    pub name: String,
    pub colors: ThemeColors,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Kid
// =============================================================================

/// A child account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Kid {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    /// Four digits, checked when a kid logs in on a parent's device.
    pub pin: String,
    pub balance: Money,
    /// Active theme id (built-in or `custom-…`).
    pub theme: String,
    pub custom_themes: Vec<CustomTheme>,
    pub avatar_emoji: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,
}

impl Kid {
    /// Looks up one of this kid's custom themes.
    pub fn custom_theme(&self, id: &str) -> Option<&CustomTheme> {
        self.custom_themes.iter().find(|theme| theme.id == id)
    }
}

/// Input of the "Add kid" form once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKid {
    pub name: String,
    pub pin: String,
    pub avatar_emoji: String,
    pub initial_balance: Money,
}

/// Partial update of a kid record.
///
/// `None` leaves a field untouched. The same patch is sent to the gateway
/// and, once the write lands, to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct KidPatch {
    pub name: Option<String>,
    pub pin: Option<String>,
    pub avatar_emoji: Option<String>,
    pub theme: Option<String>,
    pub balance: Option<Money>,
    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,
}

impl KidPatch {
    pub fn balance(balance: Money) -> Self {
        Self {
            balance: Some(balance),
            ..Self::default()
        }
    }

    pub fn theme(theme: impl Into<String>) -> Self {
        Self {
            theme: Some(theme.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the patch into `kid`. Returns whether anything changed.
    pub fn apply_to(&self, kid: &mut Kid) -> bool {
        let before = kid.clone();
        if let Some(name) = &self.name {
            kid.name = name.clone();
        }
        if let Some(pin) = &self.pin {
            kid.pin = pin.clone();
        }
        if let Some(avatar) = &self.avatar_emoji {
            kid.avatar_emoji = avatar.clone();
        }
        if let Some(theme) = &self.theme {
            kid.theme = theme.clone();
        }
        if let Some(balance) = self.balance {
            kid.balance = balance;
        }
        if let Some(last_login) = self.last_login {
            kid.last_login = Some(last_login);
        }
        *kid != before
    }
}

// =============================================================================
// Transaction Type
// =============================================================================

/// What moved money in or out of a kid's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Reward,
    Penalty,
}

impl TransactionType {
    /// Deposits and rewards add to the balance.
    pub const fn is_credit(self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::Reward)
    }

    /// Label used as the default description.
    pub const fn label(self) -> &'static str {
        match self {
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::Reward => "Reward",
            TransactionType::Penalty => "Penalty",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Reward => "reward",
            TransactionType::Penalty => "penalty",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "reward" => Ok(TransactionType::Reward),
            "penalty" => Ok(TransactionType::Penalty),
            other => Err(format!("Unknown transaction type: {other}")),
        }
    }
}

/// Who asked for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum RequestedBy {
    Parent,
    Kid,
}

// =============================================================================
// Transaction
// =============================================================================

/// A completed ledger entry. `amount` is always positive; the direction
/// comes from `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub kid_id: String,
    pub parent_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Money,
    pub description: String,
    pub requested_by: RequestedBy,
    /// Parent who performed or approved it.
    pub processed_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Balance delta: positive for credits, negative for debits.
    pub fn signed_amount(&self) -> Money {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

// =============================================================================
// Deposit Request
// =============================================================================

/// Lifecycle of a deposit request.
///
/// ```text
/// Pending ──approve──► Approved
///    │
///    └──────deny─────► Denied
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
        }
    }
}

impl Default for RequestStatus {
    fn default() -> Self {
        RequestStatus::Pending
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "denied" => Ok(RequestStatus::Denied),
            other => Err(format!("Unknown request status: {other}")),
        }
    }
}

/// A kid asking a parent to add money.
///
/// Name and avatar are copied from the kid when the request is made so the
/// parent's list renders without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub id: String,
    pub kid_id: String,
    pub kid_name: String,
    pub kid_avatar: String,
    pub parent_id: String,
    pub amount: Money,
    pub description: String,
    pub status: RequestStatus,
    pub parent_note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kid() -> Kid {
        let now = Utc::now();
        Kid {
            id: "k1".to_string(),
            parent_id: "p1".to_string(),
            name: "Sam".to_string(),
            pin: "4826".to_string(),
            balance: Money::from_cents(1000),
            theme: "default".to_string(),
            custom_themes: Vec::new(),
            avatar_emoji: "🦊".to_string(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[test]
    fn test_user_display_name_falls_back_to_email() {
        let user = User::new("u1", "jo@home.net", None);
        assert_eq!(user.display_name, "jo");

        let user = User::new("u1", "jo@home.net", Some("  ".to_string()));
        assert_eq!(user.display_name, "jo");

        let user = User::new("u1", "jo@home.net", Some("Jo".to_string()));
        assert_eq!(user.display_name, "Jo");
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut sam = kid();
        let patch = KidPatch {
            name: Some("Samantha".to_string()),
            balance: Some(Money::from_cents(1500)),
            ..KidPatch::default()
        };

        assert!(patch.apply_to(&mut sam));
        assert_eq!(sam.name, "Samantha");
        assert_eq!(sam.balance.cents(), 1500);
        assert_eq!(sam.pin, "4826");
        assert_eq!(sam.theme, "default");
    }

    #[test]
    fn test_patch_reports_no_change() {
        let mut sam = kid();
        assert!(!KidPatch::theme("default").apply_to(&mut sam));
        assert!(KidPatch::default().is_empty());
        assert!(!KidPatch::theme("x").is_empty());
    }

    #[test]
    fn test_transaction_direction() {
        assert!(TransactionType::Deposit.is_credit());
        assert!(TransactionType::Reward.is_credit());
        assert!(!TransactionType::Withdrawal.is_credit());
        assert!(!TransactionType::Penalty.is_credit());
        assert_eq!("Penalty".parse::<TransactionType>(), Ok(TransactionType::Penalty));
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_transaction_serializes_kind_as_type() {
        let tx = Transaction {
            id: "t1".to_string(),
            kid_id: "k1".to_string(),
            parent_id: "p1".to_string(),
            kind: TransactionType::Penalty,
            amount: Money::from_cents(200),
            description: "Late for dinner".to_string(),
            requested_by: RequestedBy::Parent,
            processed_by: Some("p1".to_string()),
            created_at: Utc::now(),
        };
        assert_eq!(tx.signed_amount().cents(), -200);

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "penalty");
        assert_eq!(json["kidId"], "k1");
        assert_eq!(json["requestedBy"], "parent");
    }

    #[test]
    fn test_request_status_round_trip_text() {
        for status in [RequestStatus::Pending, RequestStatus::Approved, RequestStatus::Denied] {
            assert_eq!(status.to_string().parse::<RequestStatus>(), Ok(status));
        }
        assert_eq!(RequestStatus::default(), RequestStatus::Pending);
    }
}
