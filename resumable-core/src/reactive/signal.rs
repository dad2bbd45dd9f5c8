//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a running computation, the signal
//!    registers that computation as a subscriber (and the computation
//!    records the signal as one of its sources).
//!
//! 2. When a signal is written with a value different from the current one,
//!    all subscribers are notified through the runtime.
//!
//! 3. Writing the value the signal already holds notifies nobody.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind a `RefCell`
//! - An insertion-ordered set of subscriber IDs
//! - A weak handle to the owning runtime

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use super::runtime::{Runtime, RuntimeInner, Source};
use super::SubscriberId;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct SignalNode<T> {
    id: u64,
    value: RefCell<T>,
    /// Notification happens in registration order.
    subscribers: RefCell<IndexSet<SubscriberId>>,
}

impl<T> Source for SignalNode<T> {
    fn source_id(&self) -> u64 {
        self.id
    }

    fn subscribe(&self, subscriber: SubscriberId) {
        self.subscribers.borrow_mut().insert(subscriber);
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&subscriber);
    }
}

/// A reactive signal holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use resumable_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// assert_eq!(count.get(), 0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    node: Rc<SignalNode<T>>,
    runtime: Weak<RuntimeInner>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal owned by `runtime`.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self::with_runtime(Rc::downgrade(runtime.inner()), value)
    }

    pub(crate) fn with_runtime(runtime: Weak<RuntimeInner>, value: T) -> Self {
        Self {
            node: Rc::new(SignalNode {
                id: next_signal_id(),
                value: RefCell::new(value),
                subscribers: RefCell::new(IndexSet::new()),
            }),
            runtime,
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.node.id
    }

    /// Borrow the current value, tracking the read.
    ///
    /// The signal must not be written from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.node.value.borrow())
    }

    /// Borrow the current value without tracking the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.node.value.borrow())
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.node.subscribers.borrow().len()
    }

    fn track(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track(Rc::clone(&self.node) as Rc<dyn Source>);
        }
    }

    fn notify(&self) {
        let subscribers: Vec<SubscriberId> =
            self.node.subscribers.borrow().iter().copied().collect();
        if subscribers.is_empty() {
            return;
        }
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.notify(&subscribers);
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a running computation, this also registers the
    /// computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.node.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and notify subscribers if it differs from the
    /// current one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.node.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.notify();
        true
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.node.value.borrow());
        self.set(next)
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
            runtime: Weak::clone(&self.runtime),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.node.id)
            .field("value", &*self.node.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl Runtime {
    /// Create a signal owned by this runtime.
    pub fn signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal::new(self, value)
    }
}
