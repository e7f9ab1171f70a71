//! # Surface & Container
//!
//! The surface is the one region of the screen a view draws into. Each mount
//! gets a [`Container`] tied to a mount epoch.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  router: surface.begin_mount()  ──► epoch 7, content cleared            │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  Container { epoch: 7 } ──► replace(lines, handlers)   ✓ written        │
//! │                                                                         │
//! │  router: surface.begin_mount()  ──► epoch 8                             │
//! │                                                                         │
//! │  late callback of the old view:                                         │
//! │  Container { epoch: 7 } ──► replace(..)                ✗ ignored        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines and handlers are replaced together, so a render can never leave
//! handlers from a previous render bound.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

// =============================================================================
// UI Event
// =============================================================================

/// A user action fired at the mounted view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiEvent {
    pub action: String,
    pub fields: BTreeMap<String, String>,
}

impl UiEvent {
    pub fn new(action: impl Into<String>) -> Self {
        UiEvent {
            action: action.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The field's value, or `""` when absent.
    pub fn text(&self, name: &str) -> &str {
        self.field(name).unwrap_or_default()
    }
}

pub type Handler = Rc<dyn Fn(&UiEvent)>;

// =============================================================================
// Surface
// =============================================================================

#[derive(Default)]
struct SurfaceInner {
    epoch: Cell<u64>,
    lines: RefCell<Vec<String>>,
    handlers: RefCell<BTreeMap<String, Handler>>,
}

/// The display region. Clones share it.
#[derive(Clone, Default)]
pub struct Surface {
    inner: Rc<SurfaceInner>,
}

impl Surface {
    pub fn new() -> Self {
        Surface::default()
    }

    /// Clears the surface and hands out a container for a new mount.
    pub fn begin_mount(&self) -> Container {
        let epoch = self.bump();
        Container {
            surface: Rc::downgrade(&self.inner),
            epoch,
        }
    }

    /// Empties the surface and invalidates every container handed out.
    pub fn clear(&self) {
        self.bump();
    }

    fn bump(&self) -> u64 {
        let epoch = self.inner.epoch.get() + 1;
        self.inner.epoch.set(epoch);
        self.inner.lines.borrow_mut().clear();
        self.inner.handlers.borrow_mut().clear();
        epoch
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.get()
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner.lines.borrow().clone()
    }

    /// Names of the currently bound actions.
    pub fn actions(&self) -> Vec<String> {
        self.inner.handlers.borrow().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lines.borrow().is_empty() && self.inner.handlers.borrow().is_empty()
    }

    /// Runs the handler bound to `event.action`. Returns `false` if none is.
    pub fn dispatch(&self, event: &UiEvent) -> bool {
        let handler = self.inner.handlers.borrow().get(&event.action).cloned();
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("epoch", &self.epoch())
            .field("lines", &self.inner.lines.borrow().len())
            .field("actions", &self.actions())
            .finish()
    }
}

// =============================================================================
// Container
// =============================================================================

/// Write access to the surface for one mount.
#[derive(Clone)]
pub struct Container {
    surface: Weak<SurfaceInner>,
    epoch: u64,
}

impl Container {
    /// A container attached to nothing; every write is ignored.
    pub fn detached() -> Self {
        Container {
            surface: Weak::new(),
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether this container still owns the surface.
    pub fn is_live(&self) -> bool {
        self.surface
            .upgrade()
            .is_some_and(|surface| surface.epoch.get() == self.epoch)
    }

    /// Replaces content and handlers. Returns `false` if superseded.
    pub fn replace(&self, lines: Vec<String>, handlers: BTreeMap<String, Handler>) -> bool {
        let Some(surface) = self.surface.upgrade() else {
            return false;
        };
        if surface.epoch.get() != self.epoch {
            return false;
        }
        *surface.lines.borrow_mut() = lines;
        *surface.handlers.borrow_mut() = handlers;
        true
    }

    pub fn clear(&self) -> bool {
        self.replace(Vec::new(), BTreeMap::new())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("epoch", &self.epoch)
            .field("live", &self.is_live())
            .finish()
    }
}
