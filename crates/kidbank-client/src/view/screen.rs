//! # Screen Lifecycle
//!
//! [`ScreenView`] implements [`View`] once for every [`Screen`].
//!
//! ## Entry Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  mount ─────────┐                                                       │
//! │  watched key ───┤                                                       │
//! │  one-shot wait ─┼──► screen work ──► flush()                            │
//! │  ui event ──────┤                      │                                │
//! │  ui.update ─────┘                      ├─ handler still running? wait   │
//! │                                        ├─ navigation queued?  navigate  │
//! │                                        └─ render requested?   render    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - `prepare` and `render` only read: they run while the store state is
//!   borrowed
//! - A render is always followed by a full handler rebind (the container
//!   takes both at once)
//! - A render or navigation requested while a handler of the same screen is
//!   running waits until the handler returns
//! - After `unmount`, nothing reaches the container or the router

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

use super::container::{Container, Handler, UiEvent};
use super::View;
use crate::app::AppContext;
use crate::error::ViewError;
use crate::notify::Notifier;
use crate::router::{NavOptions, Route, RouterHandle, MOUNT_FAILED_MESSAGE};
use crate::store::{AppState, StateKey, Store, Unsubscribe};

// =============================================================================
// Screen Trait
// =============================================================================

/// Outcome of [`Screen::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    Ready,
    /// Show `placeholder` until `key` changes, then prepare again.
    WaitFor {
        key: StateKey,
        placeholder: String,
    },
    /// Required state is missing; replace the address with `Route`.
    Redirect(Route),
}

/// Outcome of [`Screen::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    Done,
    Redirect(Route),
}

/// The content of one screen.
pub trait Screen: Sized + 'static {
    const NAME: &'static str;

    /// Store keys whose change re-renders the screen.
    fn watches() -> &'static [StateKey] {
        &[]
    }

    fn prepare(&mut self, _state: &AppState, _params: &[String]) -> Result<Mount, ViewError> {
        Ok(Mount::Ready)
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render;
}

// =============================================================================
// Frame
// =============================================================================

/// Lines and handlers produced by one render.
pub struct Frame<S: Screen> {
    lines: Vec<String>,
    handlers: BTreeMap<String, Handler>,
    ui: Ui<S>,
}

impl<S: Screen> Frame<S> {
    fn new(ui: Ui<S>) -> Self {
        Frame {
            lines: Vec::new(),
            handlers: BTreeMap::new(),
            ui,
        }
    }

    pub fn line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn lines<I, L>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    /// Binds `action` for this render.
    pub fn on(
        &mut self,
        action: impl Into<String>,
        handler: impl Fn(&mut S, &UiEvent, &Ui<S>) + 'static,
    ) -> &mut Self {
        let ui = self.ui.clone();
        let handler = Rc::new(handler);
        self.handlers.insert(
            action.into(),
            Rc::new(move |event: &UiEvent| ui.dispatch(event, &*handler)),
        );
        self
    }

    pub fn ui(&self) -> &Ui<S> {
        &self.ui
    }

    fn finish(self) -> (Vec<String>, BTreeMap<String, Handler>) {
        (self.lines, self.handlers)
    }
}

// =============================================================================
// Screen View
// =============================================================================

enum Navigation {
    To(Route, NavOptions),
    Back,
}

struct ScreenInner<S: Screen> {
    ctx: AppContext,
    router: RouterHandle,
    screen: RefCell<S>,
    container: RefCell<Option<Container>>,
    params: RefCell<Vec<String>>,
    subscriptions: RefCell<Vec<Unsubscribe>>,
    waiting: RefCell<Option<Unsubscribe>>,
    mounted: Cell<bool>,
    render_requested: Cell<bool>,
    navigation: RefCell<Option<Navigation>>,
    renders: Cell<u64>,
}

impl<S: Screen> ScreenInner<S> {
    fn ui(self: &Rc<Self>) -> Ui<S> {
        Ui {
            inner: Rc::downgrade(self),
            ctx: self.ctx.clone(),
            router: self.router.clone(),
        }
    }

    fn start(self: &Rc<Self>) -> Result<(), ViewError> {
        self.stop_waiting();
        let params = self.params.borrow().clone();
        let mount = {
            let mut screen = self
                .screen
                .try_borrow_mut()
                .map_err(|_| ViewError::Render(format!("{} is busy", S::NAME)))?;
            self.ctx.store.read(|state| screen.prepare(state, &params))?
        };

        match mount {
            Mount::Ready => {
                self.watch();
                self.render_and_bind();
            }
            Mount::WaitFor { key, placeholder } => {
                debug!(view = S::NAME, key = %key, "Waiting for data");
                self.show(vec![placeholder]);
                let weak = Rc::downgrade(self);
                let subscription = self.ctx.store.subscribe(key, move |_, _| {
                    if let Some(inner) = weak.upgrade() {
                        inner.resume();
                    }
                });
                *self.waiting.borrow_mut() = Some(subscription);
            }
            Mount::Redirect(route) => {
                debug!(view = S::NAME, to = %route, "Required state missing");
                self.request(Navigation::To(route, NavOptions::replace()));
            }
        }
        Ok(())
    }

    fn resume(self: &Rc<Self>) {
        if !self.mounted.get() {
            return;
        }
        if let Err(err) = self.start() {
            self.fail(&err);
        }
        self.flush();
    }

    fn watch(self: &Rc<Self>) {
        if !self.subscriptions.borrow().is_empty() {
            return;
        }
        let subscriptions: Vec<Unsubscribe> = S::watches()
            .iter()
            .map(|&key| {
                let weak = Rc::downgrade(self);
                self.ctx.store.subscribe(key, move |_, _| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_change();
                    }
                })
            })
            .collect();
        *self.subscriptions.borrow_mut() = subscriptions;
    }

    fn on_change(self: &Rc<Self>) {
        if !self.mounted.get() || self.waiting.borrow().is_some() {
            return;
        }
        self.render_requested.set(true);
        self.flush();
    }

    /// Full render plus handler rebind.
    fn render_and_bind(self: &Rc<Self>) {
        if !self.mounted.get() {
            return;
        }
        let Ok(screen) = self.screen.try_borrow() else {
            self.render_requested.set(true);
            return;
        };
        self.render_requested.set(false);

        let mut frame = Frame::new(self.ui());
        let outcome = self.ctx.store.read(|state| screen.render(state, &mut frame));
        drop(screen);

        match outcome {
            Render::Done => {
                let (lines, handlers) = frame.finish();
                let written = self
                    .container
                    .borrow()
                    .as_ref()
                    .is_some_and(|container| container.replace(lines, handlers));
                if written {
                    self.renders.set(self.renders.get() + 1);
                } else {
                    debug!(view = S::NAME, "Render into a superseded container dropped");
                }
            }
            Render::Redirect(route) => {
                debug!(view = S::NAME, to = %route, "Render redirected");
                self.request(Navigation::To(route, NavOptions::replace()));
            }
        }
    }

    fn show(&self, lines: Vec<String>) {
        if let Some(container) = self.container.borrow().as_ref() {
            container.replace(lines, BTreeMap::new());
        }
    }

    fn request(&self, navigation: Navigation) {
        *self.navigation.borrow_mut() = Some(navigation);
    }

    /// Runs queued navigation and rendering, unless a handler of this screen
    /// is still running (it flushes when it returns).
    fn flush(self: &Rc<Self>) {
        if self.screen.try_borrow_mut().is_err() {
            return;
        }
        if !self.mounted.get() {
            self.navigation.borrow_mut().take();
            self.render_requested.set(false);
            return;
        }

        let navigation = self.navigation.borrow_mut().take();
        match navigation {
            Some(Navigation::To(route, options)) => self.router.navigate(route, options),
            Some(Navigation::Back) => {
                self.router.back();
            }
            None => {}
        }

        if self.mounted.get() && self.render_requested.get() {
            self.render_and_bind();
            if let Some(Navigation::To(route, options)) = self.navigation.borrow_mut().take() {
                self.router.navigate(route, options);
            }
        }
    }

    fn fail(&self, err: &ViewError) {
        error!(view = S::NAME, error = %err, "Screen failed");
        if let Some(container) = self.container.borrow().as_ref() {
            container.clear();
        }
        self.ctx.notifier.error(MOUNT_FAILED_MESSAGE);
    }

    fn stop_waiting(&self) {
        if let Some(subscription) = self.waiting.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }

    fn teardown(&self) {
        let was_mounted = self.mounted.replace(false);
        let subscriptions: Vec<Unsubscribe> = self.subscriptions.borrow_mut().drain(..).collect();
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        self.stop_waiting();
        self.navigation.borrow_mut().take();
        self.render_requested.set(false);
        self.container.borrow_mut().take();
        if was_mounted {
            debug!(view = S::NAME, "Unmounted");
        }
    }
}

/// A [`Screen`] with the shared mount/unmount lifecycle.
pub struct ScreenView<S: Screen> {
    inner: Rc<ScreenInner<S>>,
}

impl<S: Screen> ScreenView<S> {
    pub fn new(ctx: AppContext, router: RouterHandle, screen: S) -> Self {
        ScreenView {
            inner: Rc::new(ScreenInner {
                ctx,
                router,
                screen: RefCell::new(screen),
                container: RefCell::new(None),
                params: RefCell::new(Vec::new()),
                subscriptions: RefCell::new(Vec::new()),
                waiting: RefCell::new(None),
                mounted: Cell::new(false),
                render_requested: Cell::new(false),
                navigation: RefCell::new(None),
                renders: Cell::new(0),
            }),
        }
    }

    /// Boxed for a [`ViewRegistry`](crate::router::ViewRegistry) factory.
    pub fn boxed(ctx: &AppContext, router: RouterHandle, screen: S) -> Box<dyn View> {
        Box::new(ScreenView::new(ctx.clone(), router, screen))
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Completed renders since construction.
    pub fn render_count(&self) -> u64 {
        self.inner.renders.get()
    }

    pub fn ui(&self) -> Ui<S> {
        self.inner.ui()
    }
}

impl<S: Screen> View for ScreenView<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn mount(&mut self, container: Container, params: &[String]) -> Result<(), ViewError> {
        let inner = &self.inner;
        if inner.mounted.get() {
            return Err(ViewError::AlreadyMounted(S::NAME));
        }
        *inner.container.borrow_mut() = Some(container);
        *inner.params.borrow_mut() = params.to_vec();
        inner.mounted.set(true);
        debug!(view = S::NAME, ?params, "Mounting");

        if let Err(err) = inner.start() {
            inner.teardown();
            return Err(err);
        }
        inner.flush();
        Ok(())
    }

    fn unmount(&mut self) {
        self.inner.teardown();
    }
}

impl<S: Screen> Drop for ScreenView<S> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<S: Screen> fmt::Debug for ScreenView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenView")
            .field("screen", &S::NAME)
            .field("mounted", &self.is_mounted())
            .field("renders", &self.render_count())
            .finish()
    }
}

// =============================================================================
// Ui Handle
// =============================================================================

/// What a handler or a spawned task may do to its screen.
///
/// Holds the screen weakly: once the screen is gone or unmounted every call
/// is ignored.
pub struct Ui<S: Screen> {
    inner: Weak<ScreenInner<S>>,
    ctx: AppContext,
    router: RouterHandle,
}

impl<S: Screen> Clone for Ui<S> {
    fn clone(&self) -> Self {
        Ui {
            inner: self.inner.clone(),
            ctx: self.ctx.clone(),
            router: self.router.clone(),
        }
    }
}

impl<S: Screen> Ui<S> {
    pub fn ctx(&self) -> &AppContext {
        &self.ctx
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.ctx.notifier
    }

    pub fn router(&self) -> &RouterHandle {
        &self.router
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.upgrade().is_some_and(|inner| inner.mounted.get())
    }

    pub fn params(&self) -> Vec<String> {
        self.inner
            .upgrade()
            .map(|inner| inner.params.borrow().clone())
            .unwrap_or_default()
    }

    /// Requests a full render.
    pub fn rerender(&self) {
        if let Some(inner) = self.live() {
            inner.render_requested.set(true);
            inner.flush();
        }
    }

    pub fn navigate(&self, route: Route) {
        self.navigate_with(route, NavOptions::push());
    }

    pub fn navigate_with(&self, route: Route, options: NavOptions) {
        if let Some(inner) = self.live() {
            inner.request(Navigation::To(route, options));
            inner.flush();
        }
    }

    pub fn back(&self) {
        if let Some(inner) = self.live() {
            inner.request(Navigation::Back);
            inner.flush();
        }
    }

    /// Runs `task` on the local task set. The task must check
    /// [`Ui::is_mounted`] (or use [`Ui::update`]) before touching the screen.
    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        tokio::task::spawn_local(task);
    }

    /// Mutates the screen and re-renders it. Returns `false` if the screen
    /// is gone, unmounted or busy.
    pub fn update(&self, f: impl FnOnce(&mut S, &Ui<S>)) -> bool {
        let Some(inner) = self.live() else {
            return false;
        };
        {
            let Ok(mut screen) = inner.screen.try_borrow_mut() else {
                warn!(view = S::NAME, "Screen busy, update dropped");
                return false;
            };
            f(&mut screen, self);
        }
        inner.render_requested.set(true);
        inner.flush();
        true
    }

    fn live(&self) -> Option<Rc<ScreenInner<S>>> {
        let inner = self.inner.upgrade()?;
        if inner.mounted.get() {
            Some(inner)
        } else {
            debug!(view = S::NAME, "Ignoring call on unmounted screen");
            None
        }
    }

    fn dispatch(&self, event: &UiEvent, handler: &dyn Fn(&mut S, &UiEvent, &Ui<S>)) {
        let Some(inner) = self.live() else {
            return;
        };
        {
            let Ok(mut screen) = inner.screen.try_borrow_mut() else {
                warn!(view = S::NAME, action = %event.action, "Nested event dropped");
                return;
            };
            debug!(view = S::NAME, action = %event.action, "Event");
            handler(&mut screen, event, self);
        }
        inner.render_requested.set(true);
        inner.flush();
    }
}

impl<S: Screen> fmt::Debug for Ui<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ui")
            .field("screen", &S::NAME)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing;
    use crate::view::Surface;

    #[derive(Default)]
    struct Counter {
        count: u32,
    }

    impl Screen for Counter {
        const NAME: &'static str = "counter";

        fn watches() -> &'static [StateKey] {
            &[StateKey::IsLoading]
        }

        fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
            frame.line(format!("count: {}", self.count));
            frame.line(format!("loading: {}", state.is_loading));
            frame.on("inc", |screen, _, _| screen.count += 1);
            frame.on("load", |screen, _, ui| {
                screen.count += 10;
                ui.store().set_loading(true);
            });
            Render::Done
        }
    }

    /// Waits for a kid named in the params.
    struct KidCard;

    impl Screen for KidCard {
        const NAME: &'static str = "kid-card";

        fn watches() -> &'static [StateKey] {
            &[StateKey::Kids]
        }

        fn prepare(&mut self, state: &AppState, params: &[String]) -> Result<Mount, ViewError> {
            let id = params.first().ok_or_else(|| ViewError::InvalidParams {
                view: Self::NAME,
                reason: "missing kid id".into(),
            })?;
            if state.kids.iter().any(|kid| &kid.id == id) {
                Ok(Mount::Ready)
            } else {
                Ok(Mount::WaitFor {
                    key: StateKey::Kids,
                    placeholder: "Loading...".into(),
                })
            }
        }

        fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
            frame.line(format!("kids: {}", state.kids.len()));
            Render::Done
        }
    }

    fn mounted<S: Screen>(screen: S, params: &[&str]) -> (ScreenView<S>, Surface, testing::TestApp) {
        let app = testing::app();
        let surface = Surface::new();
        let mut view = ScreenView::new(app.ctx.clone(), RouterHandle::detached(), screen);
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        view.mount(surface.begin_mount(), &params).unwrap();
        (view, surface, app)
    }

    #[test]
    fn test_mount_renders_and_binds() {
        let (view, surface, _app) = mounted(Counter::default(), &[]);
        assert_eq!(surface.lines(), vec!["count: 0", "loading: false"]);
        assert_eq!(surface.actions(), vec!["inc", "load"]);
        assert_eq!(view.render_count(), 1);
    }

    #[test]
    fn test_handlers_survive_rerender() {
        let (view, surface, app) = mounted(Counter::default(), &[]);
        assert!(surface.dispatch(&UiEvent::new("inc")));
        app.ctx.store.set_loading(true);
        assert!(surface.dispatch(&UiEvent::new("inc")));
        assert_eq!(surface.lines()[0], "count: 2");
        assert_eq!(surface.lines()[1], "loading: true");
        assert_eq!(view.render_count(), 4);
    }

    #[test]
    fn test_render_during_handler_is_deferred() {
        let (view, surface, _app) = mounted(Counter::default(), &[]);
        assert!(surface.dispatch(&UiEvent::new("load")));
        assert_eq!(surface.lines(), vec!["count: 10", "loading: true"]);
        assert_eq!(view.render_count(), 2);
    }

    #[test]
    fn test_unmounted_view_ignores_store() {
        let (mut view, surface, app) = mounted(Counter::default(), &[]);
        let listeners = app.ctx.store.listener_count();
        view.unmount();
        view.unmount();
        assert_eq!(app.ctx.store.listener_count(), listeners - 1);

        app.ctx.store.set_loading(true);
        assert_eq!(view.render_count(), 1);
        assert_eq!(surface.lines()[1], "loading: false");
    }

    #[test]
    fn test_stale_ui_cannot_touch_new_mount() {
        let (mut view, surface, _app) = mounted(Counter::default(), &[]);
        let ui = view.ui();
        view.unmount();
        let next = surface.begin_mount();
        next.replace(vec!["next".into()], BTreeMap::new());

        ui.rerender();
        assert!(!ui.update(|screen, _| screen.count = 99));
        assert_eq!(surface.lines(), vec!["next"]);
    }

    #[test]
    fn test_wait_until_ready() {
        let (view, surface, app) = mounted(KidCard, &["k1"]);
        assert_eq!(surface.lines(), vec!["Loading..."]);
        assert!(surface.actions().is_empty());
        assert_eq!(view.render_count(), 0);

        app.ctx.store.set_kids(vec![testing::kid("k2")]);
        assert_eq!(surface.lines(), vec!["Loading..."]);

        app.ctx.store.set_kids(vec![testing::kid("k2"), testing::kid("k1")]);
        assert_eq!(surface.lines(), vec!["kids: 2"]);

        // one-shot released, one watch subscription left
        assert_eq!(app.ctx.store.listener_count(), app.baseline_listeners + 1);
        app.ctx.store.set_kids(vec![testing::kid("k1")]);
        assert_eq!(surface.lines(), vec!["kids: 1"]);
    }

    #[test]
    fn test_prepare_error_fails_mount() {
        let app = testing::app();
        let surface = Surface::new();
        let mut view = ScreenView::new(app.ctx.clone(), RouterHandle::detached(), KidCard);
        let err = view.mount(surface.begin_mount(), &[]).unwrap_err();
        assert!(matches!(err, ViewError::InvalidParams { .. }));
        assert!(!view.is_mounted());
        assert_eq!(app.ctx.store.listener_count(), app.baseline_listeners);
    }

    #[test]
    fn test_double_mount_is_refused() {
        let (mut view, surface, _app) = mounted(Counter::default(), &[]);
        let err = view.mount(surface.begin_mount(), &[]).unwrap_err();
        assert!(matches!(err, ViewError::AlreadyMounted("counter")));
    }
}
