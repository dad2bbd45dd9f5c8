//! Computed Implementation
//!
//! A Computed is a memoized derived value: a pure function of other
//! reactive values, recomputed exactly once per dependency change and
//! cached between changes.
//!
//! # How Computed Values Work
//!
//! 1. On creation, a derived computation runs the function and stores the
//!    result in a private signal.
//!
//! 2. Reads go to the private signal, so they are cheap and are tracked
//!    like any other signal read.
//!
//! 3. When a dependency changes, the derived computation re-runs and writes
//!    the new result into the private signal. An equal result notifies
//!    nobody.
//!
//! 4. Derived computations settle before any effect of the same
//!    notification pass runs, so an effect reading several values derived
//!    from one signal sees all of them up to date, and runs once.
//!
//! The private signal is never exposed: a computed value cannot be written.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::panic;
use std::rc::Rc;

use super::effect::Effect;
use super::error::ComputationError;
use super::runtime::{Body, Runtime};
use super::signal::Signal;
use super::subscriber::{ComputationKind, SubscriberId};

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use resumable_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(2);
/// let c = count.clone();
/// let doubled = rt.computed(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: 'static> {
    signal: Signal<T>,
    computation: Effect,
}

impl<T: 'static> Computed<T> {
    /// The subscriber ID of the derived computation.
    pub fn id(&self) -> SubscriberId {
        self.computation.id()
    }

    /// Borrow the cached value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// How many times the function has been evaluated.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Number of computations reading this value.
    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.computation.is_disposed()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            computation: self.computation.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("value", &self.signal)
            .field("run_count", &self.run_count())
            .finish()
    }
}

impl Runtime {
    /// Create a computed value.
    ///
    /// The function runs immediately; a panic during that first run
    /// propagates to the caller. Later panics are reported on the error
    /// channel and the previous value is kept.
    pub fn computed<T, F>(&self, f: F) -> Computed<T>
    where
        T: PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        match self.build_computed(move || Ok(f())) {
            Ok(computed) => computed,
            Err(error) => panic::resume_unwind(Box::new(error.to_string())),
        }
    }

    /// Create a computed value from a fallible function.
    ///
    /// A failure during the first run is returned. Later failures are
    /// reported on the error channel and the previous value is kept.
    pub fn try_computed<T, F, E>(&self, f: F) -> Result<Computed<T>, ComputationError>
    where
        T: PartialEq + 'static,
        F: Fn() -> Result<T, E> + 'static,
        E: fmt::Display,
    {
        self.build_computed(move || f().map_err(|e| e.to_string()))
    }

    fn build_computed<T, F>(&self, f: F) -> Result<Computed<T>, ComputationError>
    where
        T: PartialEq + 'static,
        F: Fn() -> Result<T, String> + 'static,
    {
        let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::new(RefCell::new(None));
        let runtime = Rc::downgrade(self.inner());

        let body: Body = {
            let slot = Rc::clone(&slot);
            Rc::new(move || {
                let value = f()?;
                let existing = slot.borrow().clone();
                match existing {
                    Some(signal) => {
                        signal.set(value);
                    }
                    None => {
                        *slot.borrow_mut() = Some(Signal::with_runtime(runtime.clone(), value));
                    }
                }
                Ok(())
            })
        };

        let node = self.inner().create(ComputationKind::Derived, body)?;
        let signal = slot.borrow().clone();
        match signal {
            Some(signal) => Ok(Computed {
                signal,
                computation: Effect::from_node(node, self.inner()),
            }),
            None => Err(ComputationError::Failed {
                id: node.id,
                message: "computed produced no value".to_string(),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn computed_evaluates_on_creation() {
        let rt = Runtime::new();
        let call_count = Rc::new(Cell::new(0));
        let c = call_count.clone();

        let computed = rt.computed(move || {
            c.set(c.get() + 1);
            42
        });

        assert_eq!(call_count.get(), 1);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.run_count(), 1);
    }

    #[test]
    fn computed_caches_between_changes() {
        let rt = Runtime::new();
        let source = rt.signal(1);
        let call_count = Rc::new(Cell::new(0));

        let s = source.clone();
        let c = call_count.clone();
        let computed = rt.computed(move || {
            c.set(c.get() + 1);
            s.get() + 1
        });

        for _ in 0..100 {
            assert_eq!(computed.get(), 2);
        }
        assert_eq!(call_count.get(), 1);

        source.set(10);
        assert_eq!(computed.get(), 11);
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn computed_depends_on_computed() {
        let rt = Runtime::new();
        let base = rt.signal(5);

        let b = base.clone();
        let doubled = rt.computed(move || b.get() * 2);
        let d = doubled.clone();
        let plus_ten = rt.computed(move || d.get() + 10);

        assert_eq!(plus_ten.get(), 20);
        base.set(10);
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn equal_result_does_not_notify_readers() {
        let rt = Runtime::new();
        let source = rt.signal(3);
        let s = source.clone();
        let parity = rt.computed(move || s.get() % 2);

        let runs = Rc::new(Cell::new(0));
        let p = parity.clone();
        let r = runs.clone();
        let _effect = rt.effect(move || {
            p.get();
            r.set(r.get() + 1);
        });

        source.set(5);
        assert_eq!(runs.get(), 1);
        source.set(6);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn failing_recompute_keeps_last_good_value() {
        let rt = Runtime::new();
        let errors = Rc::new(Cell::new(0));
        let e = errors.clone();
        rt.set_error_handler(move |_| e.set(e.get() + 1));

        let source = rt.signal(4);
        let s = source.clone();
        let halved = rt
            .try_computed(move || {
                let v = s.get();
                if v % 2 == 0 {
                    Ok(v / 2)
                } else {
                    Err(format!("{v} is odd"))
                }
            })
            .unwrap();

        source.set(7);
        assert_eq!(halved.get(), 2);
        assert_eq!(errors.get(), 1);

        // Still subscribed: a valid value flows through again.
        source.set(8);
        assert_eq!(halved.get(), 4);
    }

    #[test]
    fn disposed_computed_keeps_value() {
        let rt = Runtime::new();
        let source = rt.signal(1);
        let s = source.clone();
        let computed = rt.computed(move || s.get());

        computed.dispose();
        source.set(2);
        assert!(computed.is_disposed());
        assert_eq!(computed.get(), 1);
    }
}
