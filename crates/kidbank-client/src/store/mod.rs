//! # Store
//!
//! Single source of truth for cross-view state, with push notification.
//!
//! ## Notification Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  store.set(StateValue::Kids(kids))                                      │
//! │      │                                                                  │
//! │      ├── equal to current? ──► return false (no notification)          │
//! │      │                                                                  │
//! │      ├── write into AppState (borrow released before any callback)      │
//! │      │                                                                  │
//! │      ├── "kids" listeners     cb(&new, &old)         registration order │
//! │      │                                                                  │
//! │      └── wildcard listeners   cb(&state, key, &new, &old)               │
//! │                                                                         │
//! │  A panicking callback is caught, logged and counted; the others still  │
//! │  run and `set` still returns normally.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//! - [`Store::batch_update`] is NOT atomic: each value is set (and its
//!   listeners run) before the next one is written.
//! - The domain mutators (`set_user`, `enter_kid_mode`, `update_kid`, …)
//!   write all of their values first and then notify key by key, so every
//!   listener observes `is_authenticated == user.is_some()` and
//!   `is_kid_mode ⇒ current_kid.is_some()`.
//! - A listener may call back into the store; the nested change is fully
//!   delivered before the outer notification continues.
//!
//! ## Example
//! ```rust
//! use kidbank_client::store::{StateKey, StateValue, Store};
//!
//! let store = Store::new();
//! let sub = store.subscribe(StateKey::IsLoading, |new, _old| {
//!     println!("loading: {:?}", new.as_bool());
//! });
//! store.set_loading(true);
//! sub.unsubscribe();
//! sub.unsubscribe(); // no-op
//! ```

mod state;

pub use state::{AppState, StateKey, StateValue, INITIAL_VIEW};

use kidbank_core::{DepositRequest, Kid, KidPatch, Transaction, User};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

// =============================================================================
// Listeners
// =============================================================================

type KeyCallback = Rc<dyn Fn(&StateValue, &StateValue)>;
type AnyCallback = Rc<dyn Fn(&AppState, StateKey, &StateValue, &StateValue)>;

#[derive(Clone)]
enum Callback {
    Key(StateKey, KeyCallback),
    Any(AnyCallback),
}

#[derive(Clone)]
struct Listener {
    id: u64,
    /// Cleared by `unsubscribe`; checked before every call so a listener
    /// removed mid-notification never fires again.
    alive: Rc<Cell<bool>>,
    callback: Callback,
}

/// Handle returned by [`Store::subscribe`].
///
/// Removes exactly its own registration. Calling it more than once is a
/// no-op. It is NOT released on drop: the owner unsubscribes explicitly,
/// normally from `unmount`.
#[must_use = "keep the handle and call unsubscribe() when done"]
pub struct Unsubscribe {
    store: Weak<StoreInner>,
    id: u64,
    alive: Rc<Cell<bool>>,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if !self.alive.replace(false) {
            return;
        }
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.borrow_mut().retain(|l| l.id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.alive.get()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// Store
// =============================================================================

struct StoreInner {
    state: RefCell<AppState>,
    listeners: RefCell<Vec<Listener>>,
    next_id: Cell<u64>,
    failures: Cell<u64>,
}

/// Observable application state. Cloning shares the same state.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.inner.state.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Store {
    pub fn new() -> Self {
        Store::with_state(AppState::default())
    }

    /// Starts from a given snapshot. Inconsistent snapshots are repaired:
    /// the auth flag is recomputed and kid mode is dropped without a kid.
    pub fn with_state(mut state: AppState) -> Self {
        state.is_authenticated = state.user.is_some();
        if state.current_kid.is_none() {
            state.is_kid_mode = false;
        }
        Store {
            inner: Rc::new(StoreInner {
                state: RefCell::new(state),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                failures: Cell::new(0),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn get(&self, key: StateKey) -> StateValue {
        StateValue::read(&self.inner.state.borrow(), key)
    }

    /// Shallow copy of the whole state.
    pub fn snapshot(&self) -> AppState {
        self.inner.state.borrow().clone()
    }

    /// Reads without cloning. `f` must not write to the store.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    pub fn user(&self) -> Option<User> {
        self.read(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|s| s.is_authenticated)
    }

    pub fn current_kid(&self) -> Option<Kid> {
        self.read(|s| s.current_kid.clone())
    }

    pub fn is_kid_mode(&self) -> bool {
        self.read(|s| s.is_kid_mode)
    }

    pub fn kids(&self) -> Vec<Kid> {
        self.read(|s| s.kids.clone())
    }

    pub fn kid(&self, id: &str) -> Option<Kid> {
        self.read(|s| s.kid(id).cloned())
    }

    pub fn current_theme(&self) -> String {
        self.read(|s| s.current_theme.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.read(|s| s.is_initialized)
    }

    pub fn pending_count(&self) -> usize {
        self.read(|s| s.pending_requests.len())
    }

    /// Number of live registrations, key and wildcard.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Callbacks that panicked since the store was created.
    pub fn failed_notifications(&self) -> u64 {
        self.inner.failures.get()
    }

    // -------------------------------------------------------------------------
    // Generic writes
    // -------------------------------------------------------------------------

    /// Writes one value. Returns `false` when the value equals the current
    /// one (nothing is notified) or when the write was refused.
    ///
    /// ## Refused writes
    /// - `IsAuthenticated(_)`: derived from `user`, never set on its own
    /// - `IsKidMode(true)` while there is no `current_kid`
    /// - `CurrentKid(None)` while in kid mode (use [`exit_kid_mode`](Self::exit_kid_mode))
    ///
    /// `User(_)` is routed through [`set_user`](Self::set_user).
    pub fn set(&self, value: StateValue) -> bool {
        match value {
            StateValue::User(user) => self.set_user(user),
            StateValue::IsAuthenticated(_) => {
                warn!("Refused direct write to isAuthenticated; it follows user");
                false
            }
            StateValue::IsKidMode(true) if self.read(|s| s.current_kid.is_none()) => {
                warn!("Refused to enter kid mode without a current kid");
                false
            }
            StateValue::CurrentKid(None) if self.is_kid_mode() => {
                warn!("Refused to clear currentKid while in kid mode");
                false
            }
            value => self.apply(value),
        }
    }

    /// Sets each value in order, notifying after each one. Returns how many
    /// values changed.
    pub fn batch_update(&self, values: impl IntoIterator<Item = StateValue>) -> usize {
        values.into_iter().filter(|value| self.set(value.clone())).count()
    }

    /// Registers `callback` for changes of `key`, called with `(new, old)`.
    pub fn subscribe(
        &self,
        key: StateKey,
        callback: impl Fn(&StateValue, &StateValue) + 'static,
    ) -> Unsubscribe {
        self.register(Callback::Key(key, Rc::new(callback)))
    }

    /// Registers a wildcard listener, called with `(state, key, new, old)`
    /// for every change.
    pub fn subscribe_all(
        &self,
        callback: impl Fn(&AppState, StateKey, &StateValue, &StateValue) + 'static,
    ) -> Unsubscribe {
        self.register(Callback::Any(Rc::new(callback)))
    }

    fn register(&self, callback: Callback) -> Unsubscribe {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let alive = Rc::new(Cell::new(true));
        self.inner.listeners.borrow_mut().push(Listener {
            id,
            alive: alive.clone(),
            callback,
        });
        Unsubscribe {
            store: Rc::downgrade(&self.inner),
            id,
            alive,
        }
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Sets the signed-in user and the derived auth flag.
    pub fn set_user(&self, user: Option<User>) -> bool {
        let authenticated = user.is_some();
        self.commit(vec![
            StateValue::User(user),
            StateValue::IsAuthenticated(authenticated),
        ])
    }

    /// Restores every session-scoped key to its initial value.
    ///
    /// `current_theme` and `is_initialized` survive: the theme was chosen
    /// on this device and startup has already resolved.
    pub fn reset(&self) {
        let initial = AppState::default();
        self.commit(vec![StateValue::IsKidMode(false), StateValue::CurrentKid(None)]);
        self.commit(vec![StateValue::IsAuthenticated(false), StateValue::User(None)]);
        self.apply_each(vec![
            StateValue::Kids(initial.kids),
            StateValue::Transactions(initial.transactions),
            StateValue::PendingRequests(initial.pending_requests),
            StateValue::IsLoading(false),
            StateValue::Error(None),
            StateValue::CurrentView(initial.current_view),
        ]);
    }

    pub fn enter_kid_mode(&self, kid: Kid) -> bool {
        debug!(kid_id = %kid.id, "Entering kid mode");
        self.commit(vec![
            StateValue::CurrentKid(Some(kid)),
            StateValue::IsKidMode(true),
        ])
    }

    /// Leaves kid mode and drops the kid's transaction history.
    pub fn exit_kid_mode(&self) -> bool {
        debug!("Exiting kid mode");
        self.commit(vec![
            StateValue::IsKidMode(false),
            StateValue::CurrentKid(None),
            StateValue::Transactions(Vec::new()),
        ])
    }

    // -------------------------------------------------------------------------
    // Kids
    // -------------------------------------------------------------------------

    /// Replaces the kid list. If the active kid is in the new list, its
    /// record is refreshed too.
    pub fn set_kids(&self, kids: Vec<Kid>) -> bool {
        let refreshed = self.read(|s| {
            let current = s.current_kid.as_ref()?;
            let fresh = kids.iter().find(|k| k.id == current.id)?;
            (fresh != current).then(|| fresh.clone())
        });

        let mut values = vec![StateValue::Kids(kids)];
        if let Some(kid) = refreshed {
            values.push(StateValue::CurrentKid(Some(kid)));
        }
        self.commit(values)
    }

    /// Adds a kid at the front (newest first), or replaces it if present.
    pub fn add_kid(&self, kid: Kid) -> bool {
        let mut kids = self.kids();
        match kids.iter_mut().find(|k| k.id == kid.id) {
            Some(existing) => *existing = kid,
            None => kids.insert(0, kid),
        }
        self.set_kids(kids)
    }

    /// Patches a kid in the list and, if it is the active kid, `current_kid`.
    pub fn update_kid(&self, kid_id: &str, patch: &KidPatch) -> bool {
        let (kids, current) = self.read(|s| {
            let mut kids = s.kids.clone();
            if let Some(kid) = kids.iter_mut().find(|k| k.id == kid_id) {
                patch.apply_to(kid);
            }
            let current = s.current_kid.clone().filter(|k| k.id == kid_id).map(|mut k| {
                patch.apply_to(&mut k);
                k
            });
            (kids, current)
        });

        let mut values = vec![StateValue::Kids(kids)];
        if let Some(kid) = current {
            values.push(StateValue::CurrentKid(Some(kid)));
        }
        self.commit(values)
    }

    /// Removes a kid. Removing the active kid also leaves kid mode.
    pub fn remove_kid(&self, kid_id: &str) -> bool {
        let (kids, was_current) = self.read(|s| {
            let kids: Vec<Kid> = s.kids.iter().filter(|k| k.id != kid_id).cloned().collect();
            let was_current = s.current_kid.as_ref().is_some_and(|k| k.id == kid_id);
            (kids, was_current)
        });

        let mut values = Vec::new();
        if was_current {
            values.extend([
                StateValue::IsKidMode(false),
                StateValue::CurrentKid(None),
                StateValue::Transactions(Vec::new()),
            ]);
        }
        values.push(StateValue::Kids(kids));
        self.commit(values)
    }

    // -------------------------------------------------------------------------
    // Ledger & requests
    // -------------------------------------------------------------------------

    pub fn set_transactions(&self, transactions: Vec<Transaction>) -> bool {
        self.apply(StateValue::Transactions(transactions))
    }

    /// Puts a transaction at the top of the history.
    pub fn add_transaction(&self, transaction: Transaction) -> bool {
        let mut transactions = self.read(|s| s.transactions.clone());
        if transactions.iter().any(|t| t.id == transaction.id) {
            return false;
        }
        transactions.insert(0, transaction);
        self.apply(StateValue::Transactions(transactions))
    }

    pub fn set_pending_requests(&self, requests: Vec<DepositRequest>) -> bool {
        self.apply(StateValue::PendingRequests(requests))
    }

    pub fn remove_request(&self, request_id: &str) -> bool {
        let requests = self.read(|s| {
            s.pending_requests
                .iter()
                .filter(|r| r.id != request_id)
                .cloned()
                .collect()
        });
        self.apply(StateValue::PendingRequests(requests))
    }

    // -------------------------------------------------------------------------
    // UI signals
    // -------------------------------------------------------------------------

    pub fn set_theme(&self, theme_id: impl Into<String>) -> bool {
        self.apply(StateValue::CurrentTheme(theme_id.into()))
    }

    pub fn set_loading(&self, loading: bool) -> bool {
        self.apply(StateValue::IsLoading(loading))
    }

    pub fn set_error(&self, error: Option<String>) -> bool {
        self.apply(StateValue::Error(error))
    }

    pub fn set_current_view(&self, name: impl Into<String>) -> bool {
        self.apply(StateValue::CurrentView(name.into()))
    }

    pub fn mark_initialized(&self) -> bool {
        self.apply(StateValue::IsInitialized(true))
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Unchecked single write + notification.
    fn apply(&self, value: StateValue) -> bool {
        let key = value.key();
        let old = {
            let mut state = self.inner.state.borrow_mut();
            if value.is_current(&state) {
                return false;
            }
            value.clone().write(&mut state)
        };
        debug!(key = %key, "State changed");
        self.notify(key, &value, &old);
        true
    }

    /// Unchecked sequential writes, each notified before the next.
    fn apply_each(&self, values: Vec<StateValue>) -> usize {
        values.into_iter().filter(|value| self.apply(value.clone())).count()
    }

    /// Writes every changed value, then notifies them in order.
    fn commit(&self, values: Vec<StateValue>) -> bool {
        let mut changes: Vec<(StateValue, StateValue)> = Vec::with_capacity(values.len());
        {
            let mut state = self.inner.state.borrow_mut();
            for value in values {
                if value.is_current(&state) {
                    continue;
                }
                let old = value.clone().write(&mut state);
                changes.push((value, old));
            }
        }

        for (new, old) in &changes {
            debug!(key = %new.key(), "State changed");
            self.notify(new.key(), new, old);
        }
        !changes.is_empty()
    }

    fn notify(&self, key: StateKey, new: &StateValue, old: &StateValue) {
        // Snapshot the registrations so callbacks may (un)subscribe freely.
        let (keyed, wildcard): (Vec<Listener>, Vec<Listener>) = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|l| match &l.callback {
                Callback::Key(k, _) => *k == key,
                Callback::Any(_) => true,
            })
            .cloned()
            .partition(|l| matches!(l.callback, Callback::Key(..)));

        for listener in keyed.iter().chain(wildcard.iter()) {
            if !listener.alive.get() {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| match &listener.callback {
                Callback::Key(_, callback) => callback(new, old),
                Callback::Any(callback) => {
                    let state = self.snapshot();
                    callback(&state, key, new, old)
                }
            }));
            if let Err(payload) = outcome {
                self.inner.failures.set(self.inner.failures.get() + 1);
                error!(
                    key = %key,
                    listener = listener.id,
                    panic = %panic_message(payload.as_ref()),
                    "Store listener panicked"
                );
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kidbank_core::Money;

    fn kid(id: &str, name: &str) -> Kid {
        let now = Utc::now();
        Kid {
            id: id.to_string(),
            parent_id: "u1".to_string(),
            name: name.to_string(),
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

    fn user() -> User {
        User::new("u1", "a@b.com", None)
    }

    fn counter(store: &Store, key: StateKey) -> (Rc<Cell<usize>>, Unsubscribe) {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let sub = store.subscribe(key, move |_, _| c.set(c.get() + 1));
        (calls, sub)
    }

    #[test]
    fn test_equal_set_is_noop() {
        let store = Store::new();
        let samples = vec![
            StateValue::Kids(vec![kid("k1", "Sam")]),
            StateValue::CurrentTheme("ocean-blue".to_string()),
            StateValue::IsLoading(true),
            StateValue::Error(Some("boom".to_string())),
            StateValue::CurrentView("parent-login".to_string()),
        ];

        for value in samples {
            let (calls, sub) = counter(&store, value.key());
            assert!(store.set(value.clone()));
            assert!(!store.set(value.clone()));
            assert_eq!(calls.get(), 1, "key {}", value.key());
            sub.unsubscribe();
        }
    }

    #[test]
    fn test_set_user_notifies_with_old_value() {
        let store = Store::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let sub = store.subscribe(StateKey::User, move |new, old| {
            log.borrow_mut().push((new.clone(), old.clone()));
        });

        assert!(store.set_user(Some(user())));

        assert!(store.is_authenticated());
        assert_eq!(
            *seen.borrow(),
            vec![(StateValue::User(Some(user())), StateValue::User(None))]
        );
        sub.unsubscribe();
    }

    #[test]
    fn test_listeners_see_consistent_auth_state() {
        let store = Store::new();
        let consistent = Rc::new(Cell::new(true));
        let flag = consistent.clone();
        let sub = store.subscribe_all(move |state, _, _, _| {
            if !state.is_consistent() {
                flag.set(false);
            }
        });

        store.set_user(Some(user()));
        store.enter_kid_mode(kid("k1", "Sam"));
        store.set_user(None);
        store.reset();

        assert!(consistent.get());
        sub.unsubscribe();
    }

    #[test]
    fn test_is_authenticated_is_not_writable() {
        let store = Store::new();
        assert!(!store.set(StateValue::IsAuthenticated(true)));
        assert!(!store.is_authenticated());

        assert!(store.set(StateValue::User(Some(user()))));
        assert!(store.is_authenticated());
        assert_eq!(store.batch_update([StateValue::User(None)]), 1);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_kid_mode_requires_a_kid() {
        let store = Store::new();
        assert!(!store.set(StateValue::IsKidMode(true)));
        assert!(!store.is_kid_mode());

        store.enter_kid_mode(kid("k1", "Sam"));
        assert!(!store.set(StateValue::CurrentKid(None)));
        assert!(store.current_kid().is_some());
    }

    #[test]
    fn test_exit_kid_mode_clears_kid_and_history() {
        let store = Store::new();
        store.enter_kid_mode(kid("k1", "Sam"));
        store.set_transactions(Vec::new());
        store.exit_kid_mode();

        let state = store.snapshot();
        assert!(state.current_kid.is_none());
        assert!(!state.is_kid_mode);
        assert!(state.transactions.is_empty());
    }

    #[test]
    fn test_independent_subscribers_get_same_value() {
        let store = Store::new();
        let first = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (first.clone(), second.clone());
        let sub_a = store.subscribe(StateKey::Kids, move |new, _| a.borrow_mut().push(new.clone()));
        let sub_b = store.subscribe(StateKey::Kids, move |new, _| b.borrow_mut().push(new.clone()));

        store.set_kids(vec![kid("k1", "Sam")]);

        assert_eq!(first.borrow().len(), 1);
        assert_eq!(*first.borrow(), *second.borrow());
        sub_a.unsubscribe();
        sub_b.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let store = Store::new();
        let (calls, sub) = counter(&store, StateKey::IsLoading);
        let (other_calls, other) = counter(&store, StateKey::IsLoading);
        assert_eq!(store.listener_count(), 2);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(store.listener_count(), 1);

        store.set_loading(true);
        store.set_loading(false);
        assert_eq!(calls.get(), 0);
        assert_eq!(other_calls.get(), 2);
        other.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_mid_notification_stops_sibling() {
        let store = Store::new();
        let later_calls = Rc::new(Cell::new(0));
        let holder: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));

        let h = holder.clone();
        let first = store.subscribe(StateKey::IsLoading, move |_, _| {
            if let Some(sub) = h.borrow().as_ref() {
                sub.unsubscribe();
            }
        });
        let c = later_calls.clone();
        *holder.borrow_mut() = Some(store.subscribe(StateKey::IsLoading, move |_, _| {
            c.set(c.get() + 1)
        }));

        store.set_loading(true);

        assert_eq!(later_calls.get(), 0);
        assert_eq!(store.listener_count(), 1);
        first.unsubscribe();
    }

    #[test]
    fn test_wildcard_receives_state_and_key() {
        let store = Store::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let sub = store.subscribe_all(move |state, key, new, old| {
            log.borrow_mut()
                .push((key, state.current_theme.clone(), new.clone(), old.clone()));
        });

        store.set_theme("mint-fresh");

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, StateKey::CurrentTheme);
        assert_eq!(seen[0].1, "mint-fresh");
        assert_eq!(seen[0].3, StateValue::CurrentTheme("default".to_string()));
        sub.unsubscribe();
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let store = Store::new();
        let bad = store.subscribe(StateKey::IsLoading, |_, _| panic!("listener bug"));
        let (calls, good) = counter(&store, StateKey::IsLoading);

        assert!(store.set_loading(true));

        assert_eq!(calls.get(), 1);
        assert_eq!(store.failed_notifications(), 1);
        assert!(store.read(|s| s.is_loading));
        bad.unsubscribe();
        good.unsubscribe();
    }

    #[test]
    fn test_listener_may_write_to_store() {
        let store = Store::new();
        let writer = store.clone();
        let sub = store.subscribe(StateKey::IsLoading, move |new, _| {
            if new.as_bool() == Some(false) {
                writer.set_error(None);
            } else {
                writer.set_error(Some("busy".to_string()));
            }
        });

        store.set_loading(true);
        assert_eq!(store.read(|s| s.error.clone()), Some("busy".to_string()));
        sub.unsubscribe();
    }

    #[test]
    fn test_update_kid_refreshes_current_kid() {
        let store = Store::new();
        store.set_kids(vec![kid("k1", "Sam"), kid("k2", "Ava")]);
        store.enter_kid_mode(kid("k1", "Sam"));

        store.update_kid("k1", &KidPatch::balance(Money::from_cents(2500)));

        assert_eq!(store.kid("k1").unwrap().balance.cents(), 2500);
        assert_eq!(store.current_kid().unwrap().balance.cents(), 2500);
        assert_eq!(store.kid("k2").unwrap().balance.cents(), 1000);
    }

    #[test]
    fn test_set_kids_refreshes_current_kid() {
        let store = Store::new();
        store.enter_kid_mode(kid("k1", "Sam"));
        let (calls, sub) = counter(&store, StateKey::CurrentKid);

        let mut renamed = kid("k1", "Samuel");
        renamed.created_at = store.current_kid().unwrap().created_at;
        renamed.updated_at = renamed.created_at;
        store.set_kids(vec![renamed]);

        assert_eq!(store.current_kid().unwrap().name, "Samuel");
        assert_eq!(calls.get(), 1);
        sub.unsubscribe();
    }

    #[test]
    fn test_remove_current_kid_exits_kid_mode() {
        let store = Store::new();
        let sam = kid("k1", "Sam");
        store.set_kids(vec![sam.clone()]);
        store.enter_kid_mode(sam);

        store.remove_kid("k1");

        let state = store.snapshot();
        assert!(state.kids.is_empty());
        assert!(!state.is_kid_mode);
        assert!(state.current_kid.is_none());
    }

    #[test]
    fn test_add_kid_goes_first() {
        let store = Store::new();
        store.add_kid(kid("k1", "Sam"));
        store.add_kid(kid("k2", "Ava"));
        store.add_kid(kid("k1", "Sammy"));

        let names: Vec<String> = store.kids().into_iter().map(|k| k.name).collect();
        assert_eq!(names, vec!["Ava", "Sammy"]);
    }

    #[test]
    fn test_reset_keeps_theme_and_initialized() {
        let store = Store::new();
        store.set_user(Some(user()));
        store.set_theme("berry-pink");
        store.mark_initialized();
        store.set_kids(vec![kid("k1", "Sam")]);
        store.enter_kid_mode(kid("k1", "Sam"));
        store.set_current_view("kid-dashboard");

        store.reset();

        let state = store.snapshot();
        assert!(state.user.is_none());
        assert!(!state.is_authenticated);
        assert!(state.kids.is_empty());
        assert!(!state.is_kid_mode);
        assert_eq!(state.current_view, "landing");
        assert_eq!(state.current_theme, "berry-pink");
        assert!(state.is_initialized);
    }

    #[test]
    fn test_batch_update_notifies_in_order() {
        let store = Store::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let log = order.clone();
        let sub = store.subscribe_all(move |_, key, _, _| log.borrow_mut().push(key));

        let changed = store.batch_update([
            StateValue::IsLoading(true),
            StateValue::IsLoading(true),
            StateValue::Error(Some("x".to_string())),
            StateValue::CurrentTheme("default".to_string()),
        ]);

        assert_eq!(changed, 2);
        assert_eq!(*order.borrow(), vec![StateKey::IsLoading, StateKey::Error]);
        sub.unsubscribe();
    }

    #[test]
    fn test_pending_requests() {
        use kidbank_core::{DepositRequest, RequestStatus};
        let request = |id: &str| DepositRequest {
            id: id.to_string(),
            kid_id: "k1".to_string(),
            kid_name: "Sam".to_string(),
            kid_avatar: "🦊".to_string(),
            parent_id: "u1".to_string(),
            amount: Money::from_cents(300),
            description: "Deposit request".to_string(),
            status: RequestStatus::Pending,
            parent_note: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        let store = Store::new();
        store.set_pending_requests(vec![request("r1"), request("r2")]);
        assert_eq!(store.pending_count(), 2);
        assert!(store.remove_request("r1"));
        assert!(!store.remove_request("r1"));
        assert_eq!(store.pending_count(), 1);
    }

    /// Deterministic LCG rolls.
    fn rolls(mut seed: u64) -> impl FnMut() -> usize {
        move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        }
    }

    fn random_session_step(store: &Store, next: &mut impl FnMut() -> usize) {
        match next() % 7 {
            0 => {
                store.set_user(Some(user()));
            }
            1 => {
                store.set_user(None);
            }
            2 => {
                store.enter_kid_mode(kid("k1", "Sam"));
            }
            3 => {
                store.exit_kid_mode();
            }
            4 => store.reset(),
            5 => {
                store.remove_kid("k1");
            }
            _ => {
                let on = next() % 2 == 0;
                store.set(StateValue::IsKidMode(on));
            }
        }
    }

    #[test]
    fn test_invariants_hold_for_any_sequence() {
        let mut next = rolls(0x5eed);
        for _ in 0..50 {
            let store = Store::new();
            for _ in 0..40 {
                random_session_step(&store, &mut next);
                let state = store.snapshot();
                assert_eq!(state.is_authenticated, state.user.is_some());
                assert!(!state.is_kid_mode || state.current_kid.is_some());
            }
        }
    }

    #[test]
    fn test_reset_never_exposes_half_signed_out_state() {
        let store = Store::new();
        store.set_user(Some(user()));
        store.enter_kid_mode(kid("k1", "Sam"));

        let broken = Rc::new(Cell::new(0));
        let b = broken.clone();
        let _sub = store.subscribe_all(move |state, _, _, _| {
            let auth_ok = state.is_authenticated == state.user.is_some();
            let kid_ok = !state.is_kid_mode || state.current_kid.is_some();
            if !auth_ok || !kid_ok {
                b.set(b.get() + 1);
            }
        });

        store.reset();
        assert_eq!(broken.get(), 0);
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
    }
}
