//! State snapshot, keys and tagged values.
//!
//! A [`StateValue`] carries its own key, so a value of the wrong shape can
//! never be written under a key.

use kidbank_core::{DepositRequest, Kid, Transaction, User, DEFAULT_THEME_ID};
use std::fmt;
use std::str::FromStr;

/// Route name the app starts on and returns to after sign-out.
pub const INITIAL_VIEW: &str = "landing";

// =============================================================================
// App State
// =============================================================================

/// Full content of the store at a point in time.
///
/// ## Invariants
/// - `is_authenticated == user.is_some()`
/// - `is_kid_mode` implies `current_kid.is_some()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub current_kid: Option<Kid>,
    pub is_kid_mode: bool,
    /// Newest first, as delivered by the gateway.
    pub kids: Vec<Kid>,
    /// Active kid's history, newest first.
    pub transactions: Vec<Transaction>,
    pub pending_requests: Vec<DepositRequest>,
    pub current_theme: String,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_initialized: bool,
    pub current_view: String,
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            user: None,
            is_authenticated: false,
            current_kid: None,
            is_kid_mode: false,
            kids: Vec::new(),
            transactions: Vec::new(),
            pending_requests: Vec::new(),
            current_theme: DEFAULT_THEME_ID.to_string(),
            is_loading: false,
            error: None,
            is_initialized: false,
            current_view: INITIAL_VIEW.to_string(),
        }
    }
}

impl AppState {
    pub fn kid(&self, id: &str) -> Option<&Kid> {
        self.kids.iter().find(|kid| kid.id == id)
    }

    /// Checks both state invariants.
    pub fn is_consistent(&self) -> bool {
        self.is_authenticated == self.user.is_some() && (!self.is_kid_mode || self.current_kid.is_some())
    }
}

// =============================================================================
// State Key
// =============================================================================

/// Names of the store's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    User,
    IsAuthenticated,
    CurrentKid,
    IsKidMode,
    Kids,
    Transactions,
    PendingRequests,
    CurrentTheme,
    IsLoading,
    Error,
    IsInitialized,
    CurrentView,
}

impl StateKey {
    pub const ALL: [StateKey; 12] = [
        StateKey::User,
        StateKey::IsAuthenticated,
        StateKey::CurrentKid,
        StateKey::IsKidMode,
        StateKey::Kids,
        StateKey::Transactions,
        StateKey::PendingRequests,
        StateKey::CurrentTheme,
        StateKey::IsLoading,
        StateKey::Error,
        StateKey::IsInitialized,
        StateKey::CurrentView,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            StateKey::User => "user",
            StateKey::IsAuthenticated => "isAuthenticated",
            StateKey::CurrentKid => "currentKid",
            StateKey::IsKidMode => "isKidMode",
            StateKey::Kids => "kids",
            StateKey::Transactions => "transactions",
            StateKey::PendingRequests => "pendingRequests",
            StateKey::CurrentTheme => "currentTheme",
            StateKey::IsLoading => "isLoading",
            StateKey::Error => "error",
            StateKey::IsInitialized => "isInitialized",
            StateKey::CurrentView => "currentView",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("Unknown state key: {s}"))
    }
}

// =============================================================================
// State Value
// =============================================================================

/// A value for exactly one [`StateKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    User(Option<User>),
    IsAuthenticated(bool),
    CurrentKid(Option<Kid>),
    IsKidMode(bool),
    Kids(Vec<Kid>),
    Transactions(Vec<Transaction>),
    PendingRequests(Vec<DepositRequest>),
    CurrentTheme(String),
    IsLoading(bool),
    Error(Option<String>),
    IsInitialized(bool),
    CurrentView(String),
}

impl StateValue {
    pub fn key(&self) -> StateKey {
        match self {
            StateValue::User(_) => StateKey::User,
            StateValue::IsAuthenticated(_) => StateKey::IsAuthenticated,
            StateValue::CurrentKid(_) => StateKey::CurrentKid,
            StateValue::IsKidMode(_) => StateKey::IsKidMode,
            StateValue::Kids(_) => StateKey::Kids,
            StateValue::Transactions(_) => StateKey::Transactions,
            StateValue::PendingRequests(_) => StateKey::PendingRequests,
            StateValue::CurrentTheme(_) => StateKey::CurrentTheme,
            StateValue::IsLoading(_) => StateKey::IsLoading,
            StateValue::Error(_) => StateKey::Error,
            StateValue::IsInitialized(_) => StateKey::IsInitialized,
            StateValue::CurrentView(_) => StateKey::CurrentView,
        }
    }

    /// Clones the value stored under `key`.
    pub fn read(state: &AppState, key: StateKey) -> StateValue {
        match key {
            StateKey::User => StateValue::User(state.user.clone()),
            StateKey::IsAuthenticated => StateValue::IsAuthenticated(state.is_authenticated),
            StateKey::CurrentKid => StateValue::CurrentKid(state.current_kid.clone()),
            StateKey::IsKidMode => StateValue::IsKidMode(state.is_kid_mode),
            StateKey::Kids => StateValue::Kids(state.kids.clone()),
            StateKey::Transactions => StateValue::Transactions(state.transactions.clone()),
            StateKey::PendingRequests => StateValue::PendingRequests(state.pending_requests.clone()),
            StateKey::CurrentTheme => StateValue::CurrentTheme(state.current_theme.clone()),
            StateKey::IsLoading => StateValue::IsLoading(state.is_loading),
            StateKey::Error => StateValue::Error(state.error.clone()),
            StateKey::IsInitialized => StateValue::IsInitialized(state.is_initialized),
            StateKey::CurrentView => StateValue::CurrentView(state.current_view.clone()),
        }
    }

    /// Whether `state` already holds this value.
    pub fn is_current(&self, state: &AppState) -> bool {
        match self {
            StateValue::User(v) => state.user == *v,
            StateValue::IsAuthenticated(v) => state.is_authenticated == *v,
            StateValue::CurrentKid(v) => state.current_kid == *v,
            StateValue::IsKidMode(v) => state.is_kid_mode == *v,
            StateValue::Kids(v) => state.kids == *v,
            StateValue::Transactions(v) => state.transactions == *v,
            StateValue::PendingRequests(v) => state.pending_requests == *v,
            StateValue::CurrentTheme(v) => state.current_theme == *v,
            StateValue::IsLoading(v) => state.is_loading == *v,
            StateValue::Error(v) => state.error == *v,
            StateValue::IsInitialized(v) => state.is_initialized == *v,
            StateValue::CurrentView(v) => state.current_view == *v,
        }
    }

    /// Stores the value and returns the one it replaced.
    pub(crate) fn write(self, state: &mut AppState) -> StateValue {
        match self {
            StateValue::User(v) => StateValue::User(std::mem::replace(&mut state.user, v)),
            StateValue::IsAuthenticated(v) => {
                StateValue::IsAuthenticated(std::mem::replace(&mut state.is_authenticated, v))
            }
            StateValue::CurrentKid(v) => {
                StateValue::CurrentKid(std::mem::replace(&mut state.current_kid, v))
            }
            StateValue::IsKidMode(v) => {
                StateValue::IsKidMode(std::mem::replace(&mut state.is_kid_mode, v))
            }
            StateValue::Kids(v) => StateValue::Kids(std::mem::replace(&mut state.kids, v)),
            StateValue::Transactions(v) => {
                StateValue::Transactions(std::mem::replace(&mut state.transactions, v))
            }
            StateValue::PendingRequests(v) => {
                StateValue::PendingRequests(std::mem::replace(&mut state.pending_requests, v))
            }
            StateValue::CurrentTheme(v) => {
                StateValue::CurrentTheme(std::mem::replace(&mut state.current_theme, v))
            }
            StateValue::IsLoading(v) => {
                StateValue::IsLoading(std::mem::replace(&mut state.is_loading, v))
            }
            StateValue::Error(v) => StateValue::Error(std::mem::replace(&mut state.error, v)),
            StateValue::IsInitialized(v) => {
                StateValue::IsInitialized(std::mem::replace(&mut state.is_initialized, v))
            }
            StateValue::CurrentView(v) => {
                StateValue::CurrentView(std::mem::replace(&mut state.current_view, v))
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::IsAuthenticated(v)
            | StateValue::IsKidMode(v)
            | StateValue::IsLoading(v)
            | StateValue::IsInitialized(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_kids(&self) -> Option<&[Kid]> {
        match self {
            StateValue::Kids(kids) => Some(kids),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<Option<&User>> {
        match self {
            StateValue::User(user) => Some(user.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in StateKey::ALL {
            assert_eq!(key.as_str().parse::<StateKey>(), Ok(key));
        }
        assert!("*".parse::<StateKey>().is_err());
    }

    #[test]
    fn test_read_write_preserve_key() {
        let mut state = AppState::default();
        for key in StateKey::ALL {
            let value = StateValue::read(&state, key);
            assert_eq!(value.key(), key);
            assert!(value.is_current(&state));
            let old = value.clone().write(&mut state);
            assert_eq!(old, value);
        }
    }

    #[test]
    fn test_initial_state() {
        let state = AppState::default();
        assert!(state.is_consistent());
        assert_eq!(state.current_theme, "default");
        assert_eq!(state.current_view, "landing");
        assert!(!state.is_initialized);
    }
}
