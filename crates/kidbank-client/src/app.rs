//! # Application Wiring
//!
//! Builds every service around one store and starts them in order.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. themes.load_saved()            local preference → currentTheme      │
//! │  2. session.start()                auth stream subscribed               │
//! │  3. wait_until_initialized(t)      first auth event handled (or t)      │
//! │  4. router.start(address)          guards see the resolved session      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{error, info};

use kidbank_core::gateway::Gateway;
use kidbank_core::identity::IdentityProvider;

use crate::bank::BankService;
use crate::config::ClientConfig;
use crate::notify::{Notifier, Toast};
use crate::router::{Router, MOUNT_FAILED_MESSAGE};
use crate::session::SessionCoordinator;
use crate::store::Store;
use crate::theme::{PreferenceStore, ThemeService};
use crate::view::{screens, UiEvent};

/// Services shared by every screen. Clones share state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Rc<ClientConfig>,
    pub store: Store,
    pub notifier: Notifier,
    pub session: SessionCoordinator,
    pub bank: BankService,
    pub themes: ThemeService,
}

impl AppContext {
    pub fn new(
        config: ClientConfig,
        gateway: Rc<dyn Gateway>,
        identity: Rc<dyn IdentityProvider>,
        preferences: Rc<dyn PreferenceStore>,
    ) -> Self {
        let store = Store::new();
        let notifier = Notifier::new(config.ui.max_toasts);
        let themes = ThemeService::new(store.clone(), preferences, config.app.default_theme.clone());
        let session = SessionCoordinator::new(
            identity,
            gateway.clone(),
            store.clone(),
            notifier.clone(),
            themes.clone(),
            config.app.transaction_history_limit,
        );
        let bank = BankService::new(gateway, store.clone());
        AppContext {
            config: Rc::new(config),
            store,
            notifier,
            session,
            bank,
            themes,
        }
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("store", &self.store)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// What the shell prints after every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenOutput {
    pub title: String,
    pub address: String,
    pub lines: Vec<String>,
    pub actions: Vec<String>,
}

pub struct App {
    ctx: AppContext,
    router: Router,
}

impl App {
    pub fn new(ctx: AppContext) -> Self {
        let registry = screens::registry(ctx.clone());
        let router = Router::new(
            ctx.store.clone(),
            ctx.notifier.clone(),
            registry,
            ctx.config.app.name.clone(),
        );
        App { ctx, router }
    }

    /// Runs the startup sequence and mounts `address`. Must run inside a
    /// `LocalSet`.
    pub async fn start(&self, address: &str) {
        self.ctx.themes.load_saved();
        self.ctx.session.start();
        let resolved = self
            .ctx
            .session
            .wait_until_initialized(self.ctx.config.auth_timeout())
            .await;
        info!(resolved, authenticated = self.ctx.store.is_authenticated(), "Session ready");
        self.router.start(address);
    }

    pub fn ctx(&self) -> &AppContext {
        &self.ctx
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Fires `event` at the mounted screen. Returns `false` if no handler is
    /// bound to the action.
    pub fn dispatch(&self, event: &UiEvent) -> bool {
        let surface = self.router.surface();
        match catch_unwind(AssertUnwindSafe(|| surface.dispatch(event))) {
            Ok(handled) => handled,
            Err(_) => {
                error!(action = %event.action, "Event handler panicked");
                self.ctx.notifier.error(MOUNT_FAILED_MESSAGE);
                true
            }
        }
    }

    pub fn output(&self) -> ScreenOutput {
        let surface = self.router.surface();
        ScreenOutput {
            title: self.router.document_title(),
            address: self.router.address().to_string(),
            lines: surface.lines(),
            actions: surface.actions(),
        }
    }

    pub fn drain_toasts(&self) -> Vec<Toast> {
        self.ctx.notifier.drain()
    }

    pub fn shutdown(&self) {
        self.ctx.session.stop();
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App").field("router", &self.router).finish()
    }
}
