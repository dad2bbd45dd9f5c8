//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs (immediately, or when
//!    the enclosing batch ends).
//!
//! 3. Before re-running, the effect drops its old subscriptions and tracks
//!    new ones during execution.
//!
//! # Failures
//!
//! A failing run (an `Err` from [`Runtime::try_effect`] bodies, or a panic)
//! is caught at the effect boundary and reported on the runtime's error
//! channel. The effect keeps its previous subscriptions, so the next valid
//! update still reaches it.

use std::fmt;
use std::panic;
use std::rc::{Rc, Weak};

use super::error::ComputationError;
use super::runtime::{Body, Computation, Runtime, RuntimeInner};
use super::subscriber::{ComputationKind, SubscriberId};

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use resumable_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// let c = count.clone();
/// let effect = rt.effect(move || {
///     println!("Count is: {}", c.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    node: Rc<Computation>,
    runtime: Weak<RuntimeInner>,
}

impl Effect {
    pub(crate) fn from_node(node: Rc<Computation>, runtime: &Rc<RuntimeInner>) -> Self {
        Self {
            node,
            runtime: Rc::downgrade(runtime),
        }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.node.id
    }

    /// Re-run the effect now, as if a dependency had changed.
    ///
    /// Failures are reported on the error channel.
    pub fn run(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.run_reporting(&self.node);
        }
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.dispose(self.node.id);
        }
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed() || self.runtime.strong_count() == 0
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.node.run_count()
    }

    /// Get the number of sources read during the latest run.
    pub fn dependency_count(&self) -> usize {
        self.node.dependency_count()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Runtime {
    /// Create an effect and run it once.
    ///
    /// A panic during this first run propagates to the caller after the
    /// effect has been disposed.
    pub fn effect<F>(&self, f: F) -> Effect
    where
        F: Fn() + 'static,
    {
        let body: Body = Rc::new(move || {
            f();
            Ok(())
        });
        match self.inner().create(ComputationKind::Effect, body) {
            Ok(node) => Effect::from_node(node, self.inner()),
            Err(ComputationError::Panicked { message, .. }) => panic::resume_unwind(Box::new(message)),
            Err(error) => {
                // Only the nested update limit can land here; the effect is
                // already disposed, hand back an inert handle.
                let node = self.inner().register(ComputationKind::Effect, Rc::new(|| Ok(())));
                self.inner().dispose(node.id);
                self.inner().report(&node, &error);
                Effect::from_node(node, self.inner())
            }
        }
    }

    /// Create an effect whose body can fail.
    ///
    /// A failure during the first run is returned; later failures go to the
    /// error channel.
    pub fn try_effect<F, E>(&self, f: F) -> Result<Effect, ComputationError>
    where
        F: Fn() -> Result<(), E> + 'static,
        E: fmt::Display,
    {
        let body: Body = Rc::new(move || f().map_err(|e| e.to_string()));
        let node = self.inner().create(ComputationKind::Effect, body)?;
        Ok(Effect::from_node(node, self.inner()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
