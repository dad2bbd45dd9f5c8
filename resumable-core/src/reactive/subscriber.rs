//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: derived
//! (computed) values and effects, including the view effect of a mounted
//! component.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Each computation gets a unique ID when created. Signals store these IDs
/// rather than the computations themselves, so a signal never keeps a
/// computation alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two flavours of computation.
///
/// Derived computations feed a memoized value and are run ahead of effects
/// when both are notified by the same write, so effects never observe a
/// derived value that lags behind its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationKind {
    /// Recomputes a [`Computed`](super::Computed) value.
    Derived,
    /// Produces side effects (DOM updates, logging, ...).
    Effect,
}

impl ComputationKind {
    /// Effects run after derived computations within one notification pass.
    pub fn is_eager(&self) -> bool {
        matches!(self, ComputationKind::Effect)
    }
}
