//! # Views
//!
//! Everything the router can mount satisfies [`View`]. Concrete screens
//! implement the smaller [`Screen`] trait and are wrapped in a
//! [`ScreenView`], which carries the shared lifecycle:
//!
//! ```text
//! mount(container, params)
//!   │
//!   ├── prepare()  ── Ready ─────► render + bind ──► subscribe watches()
//!   │              ── WaitFor(k) ► placeholder   ──► one-shot on k ──► prepare()
//!   │              ── Redirect ──► router.navigate(.., replace)
//!   │
//! store change on a watched key ──► render + bind (full, no patching)
//!   │
//! unmount()  ── every subscription released once, container dropped
//! ```

mod container;
mod screen;
pub mod screens;
pub mod widgets;

pub use container::{Container, Handler, Surface, UiEvent};
pub use screen::{Frame, Mount, Render, Screen, ScreenView, Ui};

use crate::error::ViewError;

/// What the router needs from a mounted screen.
pub trait View {
    fn name(&self) -> &'static str;

    /// Renders into an empty `container`, binds handlers and subscribes to
    /// the store.
    fn mount(&mut self, container: Container, params: &[String]) -> Result<(), ViewError>;

    /// Releases every subscription and the container. Safe to call twice.
    fn unmount(&mut self);
}
