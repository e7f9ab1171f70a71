//! # Router
//!
//! Turns a navigation intent into exactly one mounted view.
//!
//! ## Transition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  navigate(route, opts) / handle_address("#x/y") / back()               │
//! │      │                                                                  │
//! │      ▼  location updated (push | replace)                              │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ 1. parse address                                                 │  │
//! │  │ 2. unknown route?              ──► replace #landing      ─┐      │  │
//! │  │ 3. needs auth, signed out?     ──► replace #parent-login  ├─► 1. │  │
//! │  │ 4. needs kid mode, not in it?  ──► replace #parent-dash.. ─┘      │  │
//! │  │ 5. title, current route, store.currentView                       │  │
//! │  │ 6. old_view.unmount()           (completes before 7)             │  │
//! │  │ 7. container = surface.begin_mount()                             │  │
//! │  │ 8. new_view.mount(container, params)                             │  │
//! │  │       Err / panic ──► toast, surface cleared, view released      │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Re-entrant Navigation
//! A navigation requested while a transition runs (a view redirecting from
//! its first render, a store listener reacting to `currentView`) only moves
//! the location and raises a flag. The running transition finishes, then the
//! loop transitions again to wherever the location points now. The last
//! request wins.

mod location;
mod routes;

pub use location::Location;
pub use routes::{Address, Route, RouteDef};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, warn};

use crate::notify::Notifier;
use crate::store::Store;
use crate::view::{Surface, View};

/// Toast shown when a view fails to mount.
pub const MOUNT_FAILED_MESSAGE: &str = "Something went wrong. Please try again.";

/// Upper bound on back-to-back redirects in one navigation.
const MAX_REDIRECTS: usize = 16;

// =============================================================================
// Options & Registry
// =============================================================================

/// How a navigation touches history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavOptions {
    /// Overwrite the current history entry instead of pushing.
    pub replace: bool,
    pub params: Vec<String>,
}

impl NavOptions {
    pub fn push() -> Self {
        NavOptions::default()
    }

    pub fn replace() -> Self {
        NavOptions {
            replace: true,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }
}

type ViewFactory = dyn Fn(Route, RouterHandle) -> Box<dyn View>;

/// Builds the view for a route. Resolved once, when the router is created.
pub struct ViewRegistry {
    factory: Box<ViewFactory>,
}

impl ViewRegistry {
    pub fn new(factory: impl Fn(Route, RouterHandle) -> Box<dyn View> + 'static) -> Self {
        ViewRegistry {
            factory: Box::new(factory),
        }
    }

    pub fn build(&self, route: Route, router: RouterHandle) -> Box<dyn View> {
        (self.factory)(route, router)
    }
}

// =============================================================================
// Router
// =============================================================================

struct RouterInner {
    store: Store,
    notifier: Notifier,
    registry: ViewRegistry,
    app_name: String,
    surface: Surface,
    location: RefCell<Location>,
    mounted: RefCell<Option<Box<dyn View>>>,
    current: RefCell<Option<(Route, Vec<String>)>>,
    title: RefCell<String>,
    transitioning: Cell<bool>,
    pending: Cell<bool>,
}

/// Resets the transition flag even if a transition unwinds.
struct TransitionGuard<'a>(&'a Cell<bool>);

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Clone)]
pub struct Router {
    inner: Rc<RouterInner>,
}

impl Router {
    pub fn new(
        store: Store,
        notifier: Notifier,
        registry: ViewRegistry,
        app_name: impl Into<String>,
    ) -> Self {
        Router {
            inner: Rc::new(RouterInner {
                store,
                notifier,
                registry,
                app_name: app_name.into(),
                surface: Surface::new(),
                location: RefCell::new(Location::new(Address::new(Route::DEFAULT, Vec::new()))),
                mounted: RefCell::new(None),
                current: RefCell::new(None),
                title: RefCell::new(String::new()),
                transitioning: Cell::new(false),
                pending: Cell::new(false),
            }),
        }
    }

    pub fn handle(&self) -> RouterHandle {
        RouterHandle(Rc::downgrade(&self.inner))
    }

    /// Mounts whatever `address` points to. Called once at startup.
    pub fn start(&self, address: &str) {
        let address = Address::parse(address);
        info!(address = %address, "Router starting");
        self.inner.location.borrow_mut().replace(address);
        self.process();
    }

    /// Programmatic navigation.
    ///
    /// Navigating to the address already mounted is a no-op.
    pub fn navigate(&self, route: Route, options: NavOptions) {
        let address = Address::new(route, options.params);
        if self.is_settled_at(&address) {
            debug!(address = %address, "Already there");
            return;
        }

        debug!(address = %address, replace = options.replace, "Navigate");
        {
            let mut location = self.inner.location.borrow_mut();
            if options.replace {
                location.replace(address);
            } else {
                location.push(address);
            }
        }
        self.process();
    }

    pub fn go(&self, route: Route) {
        self.navigate(route, NavOptions::push());
    }

    /// External address change (typed `#route/params`, a link, history).
    pub fn handle_address(&self, token: &str) {
        let address = Address::parse(token);
        if self.is_settled_at(&address) {
            return;
        }
        debug!(address = %address, "Address changed");
        self.inner.location.borrow_mut().push(address);
        self.process();
    }

    /// Goes one history entry back. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        let moved = self.inner.location.borrow_mut().back();
        if moved {
            self.process();
        }
        moved
    }

    /// Kid dashboard in kid mode, parent dashboard when signed in, landing
    /// otherwise.
    pub fn redirect_to_home(&self) {
        self.go(self.home_route());
    }

    pub fn home_route(&self) -> Route {
        let store = &self.inner.store;
        if store.is_kid_mode() {
            Route::KidDashboard
        } else if store.is_authenticated() {
            Route::ParentDashboard
        } else {
            Route::Landing
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn current_route(&self) -> Option<Route> {
        self.inner.current.borrow().as_ref().map(|(route, _)| *route)
    }

    pub fn params(&self) -> Vec<String> {
        self.inner
            .current
            .borrow()
            .as_ref()
            .map(|(_, params)| params.clone())
            .unwrap_or_default()
    }

    pub fn is_route(&self, route: Route) -> bool {
        self.current_route() == Some(route)
    }

    pub fn address(&self) -> Address {
        self.inner.location.borrow().current().clone()
    }

    pub fn can_go_back(&self) -> bool {
        self.inner.location.borrow().can_go_back()
    }

    pub fn document_title(&self) -> String {
        self.inner.title.borrow().clone()
    }

    pub fn surface(&self) -> Surface {
        self.inner.surface.clone()
    }

    /// Name of the mounted view, if a mount succeeded.
    pub fn mounted_view(&self) -> Option<&'static str> {
        self.inner.mounted.borrow().as_ref().map(|view| view.name())
    }

    pub fn is_transitioning(&self) -> bool {
        self.inner.transitioning.get()
    }

    // -------------------------------------------------------------------------
    // Transition
    // -------------------------------------------------------------------------

    fn is_settled_at(&self, address: &Address) -> bool {
        !self.inner.transitioning.get()
            && self.inner.mounted.borrow().is_some()
            && self.inner.location.borrow().current() == address
    }

    fn process(&self) {
        let inner = &self.inner;
        if inner.transitioning.get() {
            inner.pending.set(true);
            return;
        }

        inner.transitioning.set(true);
        let _guard = TransitionGuard(&inner.transitioning);

        for _ in 0..MAX_REDIRECTS {
            inner.pending.set(false);
            self.transition();
            if !inner.pending.get() {
                return;
            }
        }
        error!(address = %self.address(), "Too many redirects, giving up");
    }

    fn redirect(&self, route: Route) {
        self.inner
            .location
            .borrow_mut()
            .replace(Address::new(route, Vec::new()));
        self.inner.pending.set(true);
    }

    fn transition(&self) {
        let inner = &self.inner;
        let address = self.address();

        let Some(route) = address.route() else {
            warn!(address = %address, "Unknown route, redirecting to {}", Route::DEFAULT);
            self.redirect(Route::DEFAULT);
            return;
        };

        let store = &inner.store;
        if route.requires_auth() && !store.is_authenticated() {
            warn!(route = %route, "Not signed in, redirecting to {}", Route::LOGIN);
            self.redirect(Route::LOGIN);
            return;
        }
        if route.requires_kid_mode() && !store.is_kid_mode() {
            warn!(route = %route, "Not in kid mode, redirecting to {}", Route::HOME);
            self.redirect(Route::HOME);
            return;
        }

        *inner.title.borrow_mut() = format!("{} | {}", route.title(), inner.app_name);
        *inner.current.borrow_mut() = Some((route, address.params.clone()));
        store.set_current_view(route.name());

        let previous = inner.mounted.borrow_mut().take();
        if let Some(view) = previous {
            release(view);
        }

        let container = inner.surface.begin_mount();
        let handle = self.handle();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut view = inner.registry.build(route, handle);
            let result = view.mount(container, &address.params);
            (view, result)
        }));

        match outcome {
            Ok((view, Ok(()))) => {
                debug!(route = %route, view = view.name(), "Mounted");
                *inner.mounted.borrow_mut() = Some(view);
            }
            Ok((view, Err(err))) => {
                error!(route = %route, error = %err, "Mount failed");
                release(view);
                self.mount_failed();
            }
            Err(payload) => {
                error!(route = %route, panic = ?payload_message(&*payload), "View panicked during mount");
                self.mount_failed();
            }
        }
    }

    fn mount_failed(&self) {
        self.inner.surface.clear();
        self.inner.notifier.error(MOUNT_FAILED_MESSAGE);
    }
}

/// Unmounts a view, containing any panic.
fn release(mut view: Box<dyn View>) {
    let name = view.name();
    if catch_unwind(AssertUnwindSafe(|| view.unmount())).is_err() {
        error!(view = name, "View panicked during unmount");
    }
}

fn payload_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("address", &self.address())
            .field("current", &self.current_route())
            .field("mounted", &self.mounted_view())
            .finish()
    }
}

// =============================================================================
// Router Handle
// =============================================================================

/// Non-owning router reference held by views.
#[derive(Clone)]
pub struct RouterHandle(Weak<RouterInner>);

impl RouterHandle {
    /// A handle to no router; navigation through it does nothing.
    pub fn detached() -> Self {
        RouterHandle(Weak::new())
    }

    pub fn upgrade(&self) -> Option<Router> {
        self.0.upgrade().map(|inner| Router { inner })
    }

    pub fn navigate(&self, route: Route, options: NavOptions) {
        match self.upgrade() {
            Some(router) => router.navigate(route, options),
            None => debug!(route = %route, "Navigation without a router ignored"),
        }
    }

    pub fn back(&self) -> bool {
        self.upgrade().is_some_and(|router| router.back())
    }

    pub fn redirect_to_home(&self) {
        if let Some(router) = self.upgrade() {
            router.redirect_to_home();
        }
    }

    pub fn current_route(&self) -> Option<Route> {
        self.upgrade().and_then(|router| router.current_route())
    }
}

impl fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RouterHandle")
            .field(&self.0.strong_count())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewError;
    use crate::view::Container;
    use chrono::Utc;
    use kidbank_core::{Kid, Money, User};
    use std::collections::BTreeMap;

    /// What a recording view should do on mount.
    #[derive(Clone)]
    enum Behavior {
        Render,
        Fail,
        Panic,
        Redirect(Route),
    }

    struct Recorder {
        route: Route,
        behavior: Behavior,
        log: Rc<RefCell<Vec<String>>>,
        router: RouterHandle,
    }

    impl View for Recorder {
        fn name(&self) -> &'static str {
            self.route.name()
        }

        fn mount(&mut self, container: Container, params: &[String]) -> Result<(), ViewError> {
            self.log
                .borrow_mut()
                .push(format!("mount {} {}", self.route, params.join(",")).trim_end().to_string());
            match &self.behavior {
                Behavior::Render => {
                    container.replace(vec![self.route.title().to_string()], BTreeMap::new());
                    Ok(())
                }
                Behavior::Fail => {
                    container.replace(vec!["half".to_string()], BTreeMap::new());
                    Err(ViewError::Render("boom".to_string()))
                }
                Behavior::Panic => panic!("view bug"),
                Behavior::Redirect(to) => {
                    self.router.navigate(*to, NavOptions::replace());
                    Ok(())
                }
            }
        }

        fn unmount(&mut self) {
            self.log.borrow_mut().push(format!("unmount {}", self.route));
        }
    }

    struct Harness {
        store: Store,
        notifier: Notifier,
        router: Router,
        log: Rc<RefCell<Vec<String>>>,
    }

    fn harness(overrides: Vec<(Route, Behavior)>) -> Harness {
        let store = Store::new();
        let notifier = Notifier::new(5);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let overrides: BTreeMap<&'static str, Behavior> = overrides
            .into_iter()
            .map(|(route, behavior)| (route.name(), behavior))
            .collect();
        let registry = ViewRegistry::new(move |route, router| {
            Box::new(Recorder {
                route,
                behavior: overrides.get(route.name()).cloned().unwrap_or(Behavior::Render),
                log: l.clone(),
                router,
            })
        });
        let router = Router::new(store.clone(), notifier.clone(), registry, "EasyKidsBank");
        Harness {
            store,
            notifier,
            router,
            log,
        }
    }

    fn sign_in(store: &Store) {
        store.set_user(Some(User::new("u1", "a@b.com", None)));
    }

    fn kid() -> Kid {
        let now = Utc::now();
        Kid {
            id: "k1".into(),
            parent_id: "u1".into(),
            name: "Sam".into(),
            pin: "4826".into(),
            balance: Money::zero(),
            theme: "default".into(),
            custom_themes: Vec::new(),
            avatar_emoji: "🦊".into(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[test]
    fn test_signed_out_visitor_lands_on_login() {
        let h = harness(vec![]);
        h.router.start("");
        h.router.go(Route::ManageKids);

        assert_eq!(h.router.current_route(), Some(Route::ParentLogin));
        assert_eq!(h.store.read(|s| s.current_view.clone()), "parent-login");
        assert_eq!(h.router.document_title(), "Parent Login | EasyKidsBank");
        assert!(!h.log.borrow().iter().any(|line| line.contains("manage-kids")));
    }

    #[test]
    fn test_every_protected_route_redirects_when_signed_out() {
        for route in Route::ALL.into_iter().filter(|r| r.requires_auth()) {
            let h = harness(vec![]);
            h.router.start("#landing");
            h.router.go(route);
            assert_eq!(h.router.current_route(), Some(Route::LOGIN), "{route}");
            assert_eq!(h.router.mounted_view(), Some("parent-login"));
        }
    }

    #[test]
    fn test_kid_routes_need_kid_mode() {
        let h = harness(vec![]);
        sign_in(&h.store);
        h.router.start("#kid-dashboard");
        assert_eq!(h.router.current_route(), Some(Route::ParentDashboard));

        h.store.enter_kid_mode(kid());
        h.router.go(Route::KidDashboard);
        assert_eq!(h.router.current_route(), Some(Route::KidDashboard));
    }

    #[test]
    fn test_unknown_route_goes_to_landing() {
        let h = harness(vec![]);
        h.router.start("#does-not-exist/1");
        assert_eq!(h.router.current_route(), Some(Route::Landing));
        assert_eq!(h.router.address().to_string(), "#landing");
    }

    #[test]
    fn test_unmount_runs_once_before_next_mount() {
        let h = harness(vec![]);
        sign_in(&h.store);
        h.router.start("#parent-dashboard");
        h.router.go(Route::ManageKids);
        h.router.go(Route::PendingRequests);

        assert_eq!(
            *h.log.borrow(),
            vec![
                "mount parent-dashboard",
                "unmount parent-dashboard",
                "mount manage-kids",
                "unmount manage-kids",
                "mount pending-requests",
            ]
        );
    }

    #[test]
    fn test_params_reach_the_view() {
        let h = harness(vec![]);
        sign_in(&h.store);
        h.router.start("");
        h.router.navigate(Route::KidLogin, NavOptions::push().with_param("k1"));

        assert_eq!(h.router.params(), vec!["k1"]);
        assert_eq!(h.log.borrow().last().unwrap(), "mount kid-login k1");
        assert_eq!(h.router.address().to_string(), "#kid-login/k1");
    }

    #[test]
    fn test_mount_error_clears_surface_and_toasts() {
        let h = harness(vec![(Route::ParentLogin, Behavior::Fail)]);
        h.router.start("#parent-login");

        assert!(h.router.surface().is_empty());
        assert_eq!(h.router.mounted_view(), None);
        assert_eq!(h.notifier.last().unwrap().message, MOUNT_FAILED_MESSAGE);
        // The failed view released what it acquired.
        assert_eq!(h.log.borrow().last().unwrap(), "unmount parent-login");

        // Still navigable.
        h.router.go(Route::Landing);
        assert_eq!(h.router.surface().lines(), vec!["Welcome"]);
    }

    #[test]
    fn test_mount_panic_is_contained() {
        let h = harness(vec![(Route::Landing, Behavior::Panic)]);
        h.router.start("");

        assert!(h.router.surface().is_empty());
        assert!(!h.router.is_transitioning());
        assert_eq!(h.notifier.len(), 1);

        h.router.go(Route::ParentLogin);
        assert_eq!(h.router.mounted_view(), Some("parent-login"));
    }

    #[test]
    fn test_redirect_during_mount_runs_after_it() {
        let h = harness(vec![(Route::KidLogin, Behavior::Redirect(Route::ManageKids))]);
        sign_in(&h.store);
        h.router.start("#parent-dashboard");
        h.router.go(Route::KidLogin);

        assert_eq!(h.router.current_route(), Some(Route::ManageKids));
        assert_eq!(
            h.log.borrow()[1..].to_vec(),
            vec![
                "unmount parent-dashboard",
                "mount kid-login",
                "unmount kid-login",
                "mount manage-kids",
            ]
        );
        // Replace: back skips the redirecting route.
        assert!(h.router.back());
        assert_eq!(h.router.current_route(), Some(Route::ParentDashboard));
    }

    #[test]
    fn test_redirect_loop_is_bounded() {
        let h = harness(vec![
            (Route::ManageKids, Behavior::Redirect(Route::PendingRequests)),
            (Route::PendingRequests, Behavior::Redirect(Route::ManageKids)),
        ]);
        sign_in(&h.store);
        h.router.start("#manage-kids");
        assert!(!h.router.is_transitioning());
    }

    #[test]
    fn test_same_address_is_noop() {
        let h = harness(vec![]);
        h.router.start("#landing");
        h.router.go(Route::Landing);
        h.router.handle_address("#landing");
        assert_eq!(h.log.borrow().len(), 1);
    }

    #[test]
    fn test_guard_redirect_does_not_pollute_history() {
        let h = harness(vec![]);
        h.router.start("#landing");
        h.router.handle_address("#manage-kids");
        assert_eq!(h.router.current_route(), Some(Route::ParentLogin));

        assert!(h.router.back());
        assert_eq!(h.router.current_route(), Some(Route::Landing));
        assert!(!h.router.can_go_back());
    }

    #[test]
    fn test_home_route_follows_session() {
        let h = harness(vec![]);
        assert_eq!(h.router.home_route(), Route::Landing);
        sign_in(&h.store);
        assert_eq!(h.router.home_route(), Route::ParentDashboard);
        h.store.enter_kid_mode(kid());
        assert_eq!(h.router.home_route(), Route::KidDashboard);
    }
}
