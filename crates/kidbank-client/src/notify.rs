//! Toast notifications.
//!
//! A bounded queue of short messages. The oldest toast is dropped when the
//! queue is full; the shell drains and prints it after every command.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

impl ToastKind {
    pub fn icon(self) -> &'static str {
        match self {
            ToastKind::Success => "✓",
            ToastKind::Error => "✗",
            ToastKind::Info => "ℹ",
            ToastKind::Warning => "⚠",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.icon(), self.message)
    }
}

/// Shared toast queue.
#[derive(Clone)]
pub struct Notifier {
    queue: Rc<RefCell<VecDeque<Toast>>>,
    max_toasts: usize,
}

impl Notifier {
    pub fn new(max_toasts: usize) -> Self {
        Notifier {
            queue: Rc::new(RefCell::new(VecDeque::new())),
            max_toasts: max_toasts.max(1),
        }
    }

    pub fn show(&self, kind: ToastKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            ToastKind::Error | ToastKind::Warning => warn!(kind = ?kind, "{}", message),
            _ => info!(kind = ?kind, "{}", message),
        }

        let mut queue = self.queue.borrow_mut();
        queue.push_back(Toast { kind, message });
        while queue.len() > self.max_toasts {
            queue.pop_front();
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(ToastKind::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(ToastKind::Error, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.show(ToastKind::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.show(ToastKind::Warning, message);
    }

    /// Removes and returns every queued toast, oldest first.
    pub fn drain(&self) -> Vec<Toast> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn last(&self) -> Option<Toast> {
        self.queue.borrow().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Notifier::new(5)
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("queued", &self.len())
            .field("max_toasts", &self.max_toasts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_bounded() {
        let notifier = Notifier::new(2);
        notifier.info("one");
        notifier.success("two");
        notifier.error("three");

        let toasts = notifier.drain();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].message, "two");
        assert_eq!(toasts[1].to_string(), "✗ three");
        assert!(notifier.is_empty());
    }
}
