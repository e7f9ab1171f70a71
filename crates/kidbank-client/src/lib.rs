//! # kidbank-client: Reactive Client for EasyKidsBank
//!
//! The state container, the hash router and the screen lifecycle, plus the
//! services screens call into.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         kidbank-client                                  │
//! │                                                                         │
//! │   address "#manage-kids"                                                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌──────────┐  guards read   ┌──────────┐  subscribe/set  ┌──────────┐  │
//! │  │  Router  │ ─────────────► │  Store   │ ◄─────────────► │ Screens  │  │
//! │  └────┬─────┘                └────▲─────┘                 └────┬─────┘  │
//! │       │ mount/unmount             │ set_kids, set_user…        │        │
//! │       ▼                           │                            ▼        │
//! │  ┌──────────┐              ┌──────┴──────┐            ┌─────────────┐   │
//! │  │ Surface  │              │  Session    │            │ BankService │   │
//! │  │ lines +  │              │ Coordinator │            │ ThemeService│   │
//! │  │ handlers │              └──────┬──────┘            └──────┬──────┘   │
//! │  └──────────┘                     │                          │          │
//! │                     IdentityProvider                  Gateway           │
//! │                     (memory)                   (memory / kidbank-db)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread. Async work is spawned with
//! `tokio::task::spawn_local`, so an [`App`] lives inside a
//! `tokio::task::LocalSet`.
//!
//! ## Modules
//!
//! - [`store`] - Observable application state
//! - [`router`] - Routes, guards, history
//! - [`view`] - View contract, screen lifecycle, the nine screens
//! - [`session`] - Auth stream and live queries into the store
//! - [`bank`] - Gateway mutations behind every money action
//! - [`theme`] - Built-in themes, custom palettes, device preference
//! - [`memory`] - In-process gateway and identity provider
//! - [`config`] - TOML configuration
//! - [`notify`] - Toast queue

pub mod app;
pub mod bank;
pub mod config;
pub mod error;
pub mod memory;
pub mod notify;
pub mod router;
pub mod session;
pub mod store;
pub mod theme;
pub mod view;

pub use app::{App, AppContext, ScreenOutput};
pub use config::{Backend, ClientConfig};
pub use error::{ClientError, ClientResult, ConfigError, ErrorCode, ViewError};
pub use notify::{Notifier, Toast, ToastKind};
pub use router::{NavOptions, Route, Router};
pub use store::{AppState, StateKey, StateValue, Store};
pub use view::UiEvent;
