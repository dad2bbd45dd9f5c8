//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the runtime registers the current computation as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context stack. Entering a
//! computation pushes its subscriber ID; the returned guard pops it again,
//! so the previous computation becomes current once a nested computation
//! finishes. An `untrack` scope pushes `None`, which hides the enclosing
//! computation from signal reads.

use std::cell::RefCell;

use super::SubscriberId;

/// Stack of running computations for one runtime.
#[derive(Debug, Default)]
pub struct ContextStack {
    entries: RefCell<Vec<Option<SubscriberId>>>,
}

impl ContextStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a context for the given subscriber (or an untracked scope).
    ///
    /// The context is exited when the returned guard is dropped, including
    /// during unwinding.
    pub fn enter(&self, subscriber_id: Option<SubscriberId>) -> ContextGuard<'_> {
        self.entries.borrow_mut().push(subscriber_id);
        ContextGuard {
            stack: self,
            subscriber_id,
        }
    }

    /// The computation that signal reads should currently register with.
    pub fn current(&self) -> Option<SubscriberId> {
        self.entries.borrow().last().copied().flatten()
    }

    /// Check if any context (tracked or untracked) is active.
    pub fn is_active(&self) -> bool {
        !self.entries.borrow().is_empty()
    }

    /// Number of nested contexts.
    pub fn depth(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Guard that pops the context when dropped.
pub struct ContextGuard<'a> {
    stack: &'a ContextStack,
    subscriber_id: Option<SubscriberId>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.entries.borrow_mut().pop();

        // Catches guards dropped out of order.
        debug_assert_eq!(
            popped,
            Some(self.subscriber_id),
            "ReactiveContext mismatch: expected {:?}, got {:?}",
            self.subscriber_id,
            popped
        );
    }
}
