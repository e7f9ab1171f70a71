//! # Session Coordinator
//!
//! Bridges the identity provider and the gateway's live queries into the
//! store.
//!
//! ## Auth Event Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  identity.on_auth_state_changed(user?)                                  │
//! │      │  epoch += 1, spawn_local                                         │
//! │      ▼                                                                  │
//! │  Some(user)                          None                               │
//! │  ─────────                           ────                               │
//! │  store.set_user(user)                release live queries               │
//! │  ensure parents/{uid} exists         store.reset()                      │
//! │  live: kids of uid      → kids                                          │
//! │  live: pending requests → pendingRequests                               │
//! │      │                                  │                               │
//! │      └──────────────┬───────────────────┘                               │
//! │                     ▼                                                   │
//! │           store.mark_initialized()                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A handler that finds the epoch moved on after an `await` stops and
//! releases whatever it acquired; the newer event owns the session.
//!
//! The coordinator spawns onto the current `LocalSet`.

use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use kidbank_core::gateway::{
    Collection, Document, Gateway, GatewayError, ListenerRegistration, Mutation, Query,
    SnapshotListener,
};
use kidbank_core::identity::IdentityProvider;
use kidbank_core::validation::{
    validate_display_name, validate_email, validate_password, validate_password_confirm,
};
use kidbank_core::{Kid, KidPatch, ParentProfile, User, ValidationError};

use crate::error::{ClientError, ClientResult};
use crate::notify::Notifier;
use crate::store::{StateKey, Store};
use crate::theme::ThemeService;

/// Toast shown when a live query stops.
pub const LIVE_UPDATES_FAILED: &str = "Live updates stopped. Please refresh.";

struct SessionInner {
    identity: Rc<dyn IdentityProvider>,
    gateway: Rc<dyn Gateway>,
    store: Store,
    notifier: Notifier,
    themes: ThemeService,
    history_limit: usize,
    auth_registration: RefCell<Option<ListenerRegistration>>,
    parent_listeners: RefCell<Vec<ListenerRegistration>>,
    kid_listener: RefCell<Option<ListenerRegistration>>,
    auth_epoch: Cell<u64>,
    kid_epoch: Cell<u64>,
}

#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Rc<SessionInner>,
}

impl SessionCoordinator {
    pub fn new(
        identity: Rc<dyn IdentityProvider>,
        gateway: Rc<dyn Gateway>,
        store: Store,
        notifier: Notifier,
        themes: ThemeService,
        history_limit: usize,
    ) -> Self {
        SessionCoordinator {
            inner: Rc::new(SessionInner {
                identity,
                gateway,
                store,
                notifier,
                themes,
                history_limit,
                auth_registration: RefCell::new(None),
                parent_listeners: RefCell::new(Vec::new()),
                kid_listener: RefCell::new(None),
                auth_epoch: Cell::new(0),
                kid_epoch: Cell::new(0),
            }),
        }
    }

    /// Subscribes to the auth-state stream. Calling it again does nothing.
    pub fn start(&self) {
        if self.inner.auth_registration.borrow().is_some() {
            debug!("Session already started");
            return;
        }

        let weak: Weak<SessionInner> = Rc::downgrade(&self.inner);
        let registration = self
            .inner
            .identity
            .on_auth_state_changed(Box::new(move |user| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let epoch = inner.auth_epoch.get() + 1;
                inner.auth_epoch.set(epoch);
                let session = SessionCoordinator { inner };
                tokio::task::spawn_local(async move {
                    session.handle_auth_change(user, epoch).await;
                });
            }));
        *self.inner.auth_registration.borrow_mut() = Some(registration);
        info!("Session started");
    }

    /// Stops listening to auth changes and releases every live query.
    pub fn stop(&self) {
        if let Some(registration) = self.inner.auth_registration.borrow_mut().take() {
            registration.cancel();
        }
        self.stop_listeners();
        self.stop_kid_listener();
    }

    /// Resolves once the first auth event has been handled.
    ///
    /// Returns `false` if `timeout` expired first; the store is then marked
    /// initialized anyway so the router can start.
    pub async fn wait_until_initialized(&self, timeout: Duration) -> bool {
        let store = &self.inner.store;
        if store.is_initialized() {
            return true;
        }

        let (tx, rx) = oneshot::channel::<()>();
        let tx = RefCell::new(Some(tx));
        let subscription = store.subscribe(StateKey::IsInitialized, move |new, _| {
            if new.as_bool() == Some(true) {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(());
                }
            }
        });

        let resolved = tokio::time::timeout(timeout, rx).await.is_ok();
        subscription.unsubscribe();

        if !resolved {
            warn!(timeout_ms = timeout.as_millis() as u64, "Auth state not resolved in time");
            store.mark_initialized();
        }
        resolved
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.auth_epoch.get() == epoch
    }

    async fn handle_auth_change(&self, user: Option<User>, epoch: u64) {
        let store = &self.inner.store;
        match user {
            Some(user) => {
                debug!(user_id = %user.id, "Auth state: signed in");
                store.set_user(Some(user.clone()));
                self.ensure_profile(&user).await;
                if !self.is_current(epoch) {
                    return;
                }
                self.start_parent_listeners(&user, epoch).await;
            }
            None => {
                debug!("Auth state: signed out");
                self.stop_listeners();
                self.stop_kid_listener();
                store.reset();
            }
        }

        if self.is_current(epoch) {
            store.mark_initialized();
        }
    }

    async fn ensure_profile(&self, user: &User) {
        let gateway = &self.inner.gateway;
        match gateway.get_document(Collection::Parents, &user.id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let profile = ParentProfile::for_user(user, Utc::now());
                match gateway
                    .mutate(vec![Mutation::Insert(Document::Parent(profile))])
                    .await
                {
                    Ok(()) => info!(user_id = %user.id, "Parent profile created"),
                    Err(GatewayError::Conflict(_)) => {}
                    Err(e) => warn!(user_id = %user.id, error = %e, "Could not create parent profile"),
                }
            }
            Err(e) => warn!(user_id = %user.id, error = %e, "Could not read parent profile"),
        }
    }

    // =========================================================================
    // Live Queries
    // =========================================================================

    /// Builds a listener whose snapshots reach the store only while
    /// `still_current` holds.
    fn listener(
        &self,
        what: &'static str,
        still_current: impl Fn(&SessionInner) -> bool + 'static,
        on_docs: impl Fn(&Store, Vec<Document>) + 'static,
    ) -> SnapshotListener {
        let weak: Weak<SessionInner> = Rc::downgrade(&self.inner);
        let notifier = self.inner.notifier.clone();
        let live = Rc::new(still_current);
        let on_error_live = live.clone();
        let on_error_weak = weak.clone();
        SnapshotListener::new(
            move |docs| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !(*live)(&*inner) {
                    debug!(query = what, "Dropping snapshot from an earlier session");
                    return;
                }
                on_docs(&inner.store, docs);
            },
            move |err| {
                if !on_error_weak.upgrade().is_some_and(|inner| (*on_error_live)(&*inner)) {
                    return;
                }
                error!(query = what, error = %err, "Live query failed");
                notifier.error(LIVE_UPDATES_FAILED);
            },
        )
    }

    async fn start_parent_listeners(&self, user: &User, epoch: u64) {
        self.stop_listeners();

        let kids = self.listener(
            "kids",
            move |inner| inner.auth_epoch.get() == epoch,
            |store, docs| {
                store.set_kids(docs.into_iter().filter_map(Document::into_kid).collect());
            },
        );
        let requests = self.listener(
            "pendingRequests",
            move |inner| inner.auth_epoch.get() == epoch,
            |store, docs| {
                store.set_pending_requests(docs.into_iter().filter_map(Document::into_request).collect());
            },
        );

        for (query, listener) in [
            (Query::kids_of(&user.id), kids),
            (Query::pending_requests_for(&user.id), requests),
        ] {
            let collection = query.collection;
            match self.inner.gateway.subscribe(query, listener).await {
                Ok(registration) if self.is_current(epoch) => {
                    self.inner.parent_listeners.borrow_mut().push(registration);
                }
                Ok(registration) => {
                    registration.cancel();
                    return;
                }
                Err(e) => {
                    error!(collection = %collection, error = %e, "Could not start live query");
                    self.inner.notifier.error(LIVE_UPDATES_FAILED);
                }
            }
        }
        debug!(count = self.inner.parent_listeners.borrow().len(), "Parent live queries running");
    }

    fn stop_listeners(&self) {
        let listeners: Vec<ListenerRegistration> =
            self.inner.parent_listeners.borrow_mut().drain(..).collect();
        for registration in listeners {
            registration.cancel();
        }
    }

    fn stop_kid_listener(&self) {
        self.inner.kid_epoch.set(self.inner.kid_epoch.get() + 1);
        if let Some(registration) = self.inner.kid_listener.borrow_mut().take() {
            registration.cancel();
        }
    }

    // =========================================================================
    // Kid Mode
    // =========================================================================

    /// Starts a kid session on this device.
    ///
    /// ## Rules
    /// - The kid's theme is applied without being saved as the device theme
    /// - The kid's latest transactions stream into `transactions`
    /// - `lastLogin` is recorded on a best-effort basis
    pub async fn enter_kid_mode(&self, kid: Kid) -> ClientResult<()> {
        let inner = &self.inner;
        if !inner.store.is_authenticated() {
            return Err(ClientError::not_authenticated());
        }

        self.stop_kid_listener();
        let epoch = inner.kid_epoch.get();
        inner.themes.apply_temporary(&kid.theme);
        inner.store.enter_kid_mode(kid.clone());
        info!(kid_id = %kid.id, "Kid mode entered");

        let kid_id = kid.id.clone();
        let listener = self.listener(
            "transactions",
            move |inner| inner.kid_epoch.get() == epoch,
            move |store, docs| {
                if store.current_kid().is_some_and(|current| current.id == kid_id) {
                    store.set_transactions(docs.into_iter().filter_map(Document::into_transaction).collect());
                }
            },
        );
        let query = Query::transactions_of(&kid.id, inner.history_limit);
        match inner.gateway.subscribe(query, listener).await {
            Ok(registration) if inner.kid_epoch.get() == epoch => {
                *inner.kid_listener.borrow_mut() = Some(registration);
            }
            Ok(registration) => registration.cancel(),
            Err(e) => {
                error!(kid_id = %kid.id, error = %e, "Could not load transactions");
                inner.notifier.error(LIVE_UPDATES_FAILED);
            }
        }

        let patch = KidPatch {
            last_login: Some(Utc::now()),
            ..KidPatch::default()
        };
        if let Err(e) = inner
            .gateway
            .mutate(vec![Mutation::UpdateKid {
                kid_id: kid.id.clone(),
                patch,
            }])
            .await
        {
            warn!(kid_id = %kid.id, error = %e, "Could not record last login");
        }
        Ok(())
    }

    /// Leaves kid mode and restores the device theme.
    pub fn exit_kid_mode(&self) {
        self.stop_kid_listener();
        if self.inner.store.exit_kid_mode() {
            info!("Kid mode exited");
        }
        self.inner.themes.load_saved();
    }

    /// Checks a PIN typed on the kid login pad.
    pub fn verify_kid_pin(&self, kid_id: &str, pin: &str) -> bool {
        self.inner
            .store
            .kid(kid_id)
            .is_some_and(|kid| kid.pin == pin)
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<User> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::Required {
                field: "Password".to_string(),
            }
            .into());
        }

        let user = self
            .with_loading(self.inner.identity.sign_in(&email, password))
            .await?;
        self.inner.store.set_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
        display_name: &str,
    ) -> ClientResult<User> {
        let email = validate_email(email)?;
        validate_password(password)?;
        validate_password_confirm(password, confirm)?;
        let display_name = if display_name.trim().is_empty() {
            None
        } else {
            Some(validate_display_name(display_name)?)
        };

        let user = self
            .with_loading(
                self.inner
                    .identity
                    .sign_up(&email, password, display_name.as_deref()),
            )
            .await?;
        self.inner.store.set_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_out(&self) -> ClientResult<()> {
        if self.inner.store.is_kid_mode() {
            self.exit_kid_mode();
        }
        self.inner.identity.sign_out().await?;
        // Anything the signed-in session still has in flight is now stale.
        self.inner.auth_epoch.set(self.inner.auth_epoch.get() + 1);
        self.stop_listeners();
        self.stop_kid_listener();
        self.inner.store.reset();
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> ClientResult<()> {
        let email = validate_email(email)?;
        self.with_loading(self.inner.identity.reset_password(&email))
            .await?;
        Ok(())
    }

    async fn with_loading<T, E>(&self, work: impl std::future::Future<Output = Result<T, E>>) -> Result<T, E> {
        self.inner.store.set_loading(true);
        let result = work.await;
        self.inner.store.set_loading(false);
        result
    }

    pub fn live_query_count(&self) -> usize {
        self.inner.parent_listeners.borrow().len()
            + usize::from(self.inner.kid_listener.borrow().is_some())
    }
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("started", &self.inner.auth_registration.borrow().is_some())
            .field("live_queries", &self.live_query_count())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::memory::{MemoryGateway, MemoryIdentity};
    use crate::theme::MemoryPreferences;
    use async_trait::async_trait;
    use kidbank_core::gateway::GatewayResult;
    use kidbank_core::{Money, Transaction, TransactionType, RequestedBy};
    use tokio::task::LocalSet;

    struct Fixture {
        identity: Rc<MemoryIdentity>,
        gateway: Rc<MemoryGateway>,
        store: Store,
        notifier: Notifier,
        session: SessionCoordinator,
    }

    fn fixture() -> Fixture {
        fixture_with(|gateway| gateway)
    }

    /// A fixture whose session talks to `front`, wrapped around the
    /// fixture's memory gateway.
    fn fixture_with(front: impl FnOnce(Rc<MemoryGateway>) -> Rc<dyn Gateway>) -> Fixture {
        let identity = Rc::new(MemoryIdentity::new());
        let gateway = Rc::new(MemoryGateway::new());
        let store = Store::new();
        let notifier = Notifier::default();
        let themes = ThemeService::new(store.clone(), Rc::new(MemoryPreferences::with_theme("mint-fresh")), "default");
        let session = SessionCoordinator::new(
            identity.clone(),
            front(gateway.clone()),
            store.clone(),
            notifier.clone(),
            themes,
            50,
        );
        Fixture {
            identity,
            gateway,
            store,
            notifier,
            session,
        }
    }

    /// Holds the first `subscribe` until the gate opens.
    struct GatedGateway {
        inner: Rc<MemoryGateway>,
        gate: RefCell<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait(?Send)]
    impl Gateway for GatedGateway {
        async fn subscribe(
            &self,
            query: Query,
            listener: SnapshotListener,
        ) -> GatewayResult<ListenerRegistration> {
            let gate = self.gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.subscribe(query, listener).await
        }

        async fn fetch(&self, query: &Query) -> GatewayResult<Vec<Document>> {
            self.inner.fetch(query).await
        }

        async fn get_document(
            &self,
            collection: Collection,
            id: &str,
        ) -> GatewayResult<Option<Document>> {
            self.inner.get_document(collection, id).await
        }

        async fn mutate(&self, batch: Vec<Mutation>) -> GatewayResult<()> {
            self.inner.mutate(batch).await
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn kid(id: &str, parent: &str) -> Kid {
        let now = Utc::now();
        Kid {
            id: id.into(),
            parent_id: parent.into(),
            name: "Sam".into(),
            pin: "4826".into(),
            balance: Money::from_cents(500),
            theme: "ocean-blue".into(),
            custom_themes: Vec::new(),
            avatar_emoji: "🦊".into(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[tokio::test]
    async fn test_signed_out_start_initializes() {
        LocalSet::new()
            .run_until(async {
                let f = fixture();
                f.session.start();
                assert!(f.session.wait_until_initialized(Duration::from_secs(5)).await);
                assert!(f.store.is_initialized());
                assert!(!f.store.is_authenticated());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialization_times_out() {
        let f = fixture();
        assert!(!f.session.wait_until_initialized(Duration::from_millis(100)).await);
        assert!(f.store.is_initialized());
        assert_eq!(f.store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_sign_in_loads_household() {
        LocalSet::new()
            .run_until(async {
                let f = fixture();
                let user = f.identity.add_account("pat@example.com", "secret1", Some("Pat"));
                f.gateway.insert(Document::Kid(kid("k1", &user.id)));
                f.gateway.insert(Document::Kid(kid("k2", "someone-else")));
                f.session.start();
                settle().await;

                f.session.sign_in("pat@example.com", "secret1").await.unwrap();
                assert!(f.store.is_authenticated());
                settle().await;

                assert_eq!(f.store.kids().len(), 1);
                assert!(f.gateway.document(Collection::Parents, &user.id).is_some());
                assert_eq!(f.session.live_query_count(), 2);
                assert!(!f.store.read(|s| s.is_loading));
            })
            .await;
    }

    #[tokio::test]
    async fn test_sign_in_errors_are_user_messages() {
        LocalSet::new()
            .run_until(async {
                let f = fixture();
                f.identity.add_account("pat@example.com", "secret1", None);

                let err = f.session.sign_in("pat@example.com", "wrong!").await.unwrap_err();
                assert_eq!(err.code, ErrorCode::AuthFailed);
                assert_eq!(err.message, "Incorrect password. Please try again.");

                let err = f.session.sign_in("not-an-email", "x").await.unwrap_err();
                assert_eq!(err.code, ErrorCode::ValidationError);
                assert!(!f.store.is_authenticated());
            })
            .await;
    }

    #[tokio::test]
    async fn test_sign_out_releases_everything() {
        LocalSet::new()
            .run_until(async {
                let f = fixture();
                let user = f.identity.add_account("pat@example.com", "secret1", None);
                f.gateway.insert(Document::Kid(kid("k1", &user.id)));
                f.session.start();
                f.session.sign_in("pat@example.com", "secret1").await.unwrap();
                settle().await;

                let sam = f.store.kid("k1").unwrap();
                f.session.enter_kid_mode(sam).await.unwrap();
                assert!(f.store.is_kid_mode());

                f.session.sign_out().await.unwrap();
                settle().await;
                assert!(!f.store.is_authenticated());
                assert!(!f.store.is_kid_mode());
                assert!(f.store.kids().is_empty());
                assert_eq!(f.gateway.watcher_count(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_kid_mode_streams_transactions() {
        LocalSet::new()
            .run_until(async {
                let f = fixture();
                let user = f.identity.add_account("pat@example.com", "secret1", None);
                f.gateway.insert(Document::Kid(kid("k1", &user.id)));
                f.gateway.insert(Document::Transaction(Transaction {
                    id: "t1".into(),
                    kid_id: "k1".into(),
                    parent_id: user.id.clone(),
                    kind: TransactionType::Reward,
                    amount: Money::from_cents(100),
                    description: "Chores".into(),
                    requested_by: RequestedBy::Parent,
                    processed_by: Some(user.id.clone()),
                    created_at: Utc::now(),
                }));
                f.session.start();
                f.session.sign_in("pat@example.com", "secret1").await.unwrap();
                settle().await;

                let sam = f.store.kid("k1").unwrap();
                assert!(f.session.verify_kid_pin("k1", "4826"));
                assert!(!f.session.verify_kid_pin("k1", "4827"));

                f.session.enter_kid_mode(sam).await.unwrap();
                assert_eq!(f.store.current_theme(), "ocean-blue");
                assert_eq!(f.store.read(|s| s.transactions.len()), 1);
                assert!(f.store.current_kid().unwrap().last_login.is_some());

                f.session.exit_kid_mode();
                assert_eq!(f.store.current_theme(), "mint-fresh");
                assert!(f.store.read(|s| s.transactions.is_empty()));
                assert_eq!(f.session.live_query_count(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn test_late_snapshot_after_sign_out_is_dropped() {
        LocalSet::new()
            .run_until(async {
                let (open, gate) = oneshot::channel();
                let f = fixture_with(|memory| {
                    Rc::new(GatedGateway {
                        inner: memory,
                        gate: RefCell::new(Some(gate)),
                    })
                });
                let user = f.identity.add_account("pat@example.com", "secret1", None);
                f.gateway.insert(Document::Kid(kid("k1", &user.id)));
                f.session.start();
                settle().await;

                f.session.sign_in("pat@example.com", "secret1").await.unwrap();
                settle().await;
                assert!(f.store.kids().is_empty());

                f.session.sign_out().await.unwrap();
                settle().await;

                open.send(()).unwrap();
                settle().await;
                assert!(!f.store.is_authenticated());
                assert!(f.store.kids().is_empty());
                assert_eq!(f.session.live_query_count(), 0);
                assert_eq!(f.gateway.watcher_count(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_subscription_failure_is_toasted() {
        LocalSet::new()
            .run_until(async {
                let f = fixture();
                f.identity.add_account("pat@example.com", "secret1", None);
                f.gateway
                    .fail_subscriptions(Some(GatewayError::PermissionDenied("rules".into())));
                f.session.start();
                f.session.sign_in("pat@example.com", "secret1").await.unwrap();
                settle().await;

                assert!(f.store.is_authenticated());
                assert!(f.store.is_initialized());
                assert_eq!(f.notifier.last().unwrap().message, LIVE_UPDATES_FAILED);
            })
            .await;
    }
}
