//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computed
//! values, effects and batching. These primitives drive every template
//! update in Resumable.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a running computation, the signal registers that computation as a
//! dependent. When the value changes, all dependents are notified.
//!
//! ## Computed values
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes and cannot be written.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. A mounted component's view is rendered by one.
//!
//! ## Batches
//!
//! [`Runtime::batch`] coalesces writes: each affected computation runs once,
//! after every write in the batch has been applied.
//!
//! # Implementation Notes
//!
//! All state lives in an explicit [`Runtime`]. Execution is single-threaded
//! and synchronous; propagation is depth-first and bounded by
//! [`RuntimeConfig::max_update_depth`].

mod context;
mod effect;
mod error;
mod memo;
mod runtime;
mod signal;
mod subscriber;

pub use context::{ContextGuard, ContextStack};
pub use effect::Effect;
pub use error::{
    clear_default_error_handler, set_default_error_handler, ComputationError, ErrorHandler,
};
pub use memo::Computed;
pub use runtime::{Runtime, RuntimeConfig, Source, WeakRuntime};
pub use signal::Signal;
pub use subscriber::{ComputationKind, SubscriberId};
