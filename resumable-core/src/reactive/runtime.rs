//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computed
//! values and effects. It owns the dependency bookkeeping and decides when
//! computations run.
//!
//! # How It Works
//!
//! 1. Every computation (effect or computed) registers with the runtime and
//!    receives a [`SubscriberId`].
//!
//! 2. While a computation runs, its ID sits on top of the runtime's context
//!    stack. Any signal read during that window subscribes the computation.
//!
//! 3. Before each run, the computation drops every subscription from its
//!    previous run, so the dependency set always matches the latest run.
//!
//! 4. When a signal's value changes, the runtime either propagates the change
//!    immediately or, inside a [`batch`](Runtime::batch), queues the
//!    subscribers in a deduplicated pending set that is flushed when the
//!    outermost batch ends.
//!
//! 5. Propagation settles derived computations first. Effects notified while
//!    derived values are still being recomputed wait until every derived
//!    value is current, then run once each, in subscription order. A write
//!    made by an effect propagates nested, before the effect's writer
//!    resumes.
//!
//! # Isolation
//!
//! There is no global "current computation". Each runtime carries its own
//! context stack, so independent reactive graphs (one per test, one per
//! mounted application) never observe each other.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::ContextStack;
use super::error::{report_to_default, ComputationError, ErrorHandler};
use super::subscriber::{ComputationKind, SubscriberId};

/// Something a computation can depend on.
///
/// Implemented by signal storage; computations keep `Rc<dyn Source>` handles
/// so they can unsubscribe from everything they read.
pub trait Source {
    /// Stable identifier of the source.
    fn source_id(&self) -> u64;

    /// Add a subscriber. Adding an existing subscriber is a no-op.
    fn subscribe(&self, subscriber: SubscriberId);

    /// Remove a subscriber.
    fn unsubscribe(&self, subscriber: SubscriberId);
}

/// Type-erased computation body.
pub(crate) type Body = Rc<dyn Fn() -> Result<(), String>>;

/// Tunables for a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum nesting of computations triggered from within other
    /// computations before the runtime reports
    /// [`ComputationError::DepthExceeded`] instead of recursing further.
    pub max_update_depth: usize,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_UPDATE_DEPTH: usize = 100;

    /// Set the nested update limit.
    pub fn with_max_update_depth(mut self, depth: usize) -> Self {
        self.max_update_depth = depth;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_update_depth: Self::DEFAULT_MAX_UPDATE_DEPTH,
        }
    }
}

/// A registered effect or derived computation.
pub(crate) struct Computation {
    pub(crate) id: SubscriberId,
    pub(crate) kind: ComputationKind,
    body: Body,
    /// Sources read during the most recent run, keyed by source ID.
    sources: RefCell<IndexMap<u64, Rc<dyn Source>>>,
    disposed: Cell<bool>,
    /// Logical tick at which the most recent run started.
    last_run: Cell<u64>,
    run_count: Cell<usize>,
    /// Handler captured from the creating scope, if any.
    error_handler: Option<ErrorHandler>,
}

impl Computation {
    pub(crate) fn run_count(&self) -> usize {
        self.run_count.get()
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.sources.borrow().len()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn release_sources(&self) {
        let sources = std::mem::take(&mut *self.sources.borrow_mut());
        for source in sources.values() {
            source.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    context: ContextStack,
    computations: RefCell<HashMap<SubscriberId, Rc<Computation>>>,
    batch_depth: Cell<usize>,
    /// Computations queued during a batch, with the tick of the latest write
    /// that queued them.
    pending: RefCell<IndexMap<SubscriberId, u64>>,
    clock: Cell<u64>,
    update_depth: Cell<usize>,
    error_handler: RefCell<Option<ErrorHandler>>,
    handler_scope: RefCell<Vec<ErrorHandler>>,
    /// Notifications collected while derived computations settle, one map
    /// per propagation pass in progress.
    settling: RefCell<Vec<IndexMap<SubscriberId, u64>>>,
}

/// Handle to a reactive graph.
///
/// Cloning the handle shares the graph. Signals and computations only keep
/// weak references to it; dropping the last `Runtime` drops every
/// registered computation.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning runtime handle, for capture inside closures the runtime owns.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    /// Upgrade to a strong handle if the runtime is still alive.
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }

    /// Run `f` inside a batch, or directly if the runtime is gone.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.inner.upgrade() {
            Some(inner) => inner.batch(f),
            None => f(),
        }
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: ContextStack::new(),
                computations: RefCell::new(HashMap::new()),
                batch_depth: Cell::new(0),
                pending: RefCell::new(IndexMap::new()),
                clock: Cell::new(0),
                update_depth: Cell::new(0),
                error_handler: RefCell::new(None),
                handler_scope: RefCell::new(Vec::new()),
                settling: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    /// Get a weak handle to this runtime.
    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn inner(&self) -> &Rc<RuntimeInner> {
        &self.inner
    }

    /// Run `f` with effect execution suspended.
    ///
    /// Every computation notified during `f` is queued once; the queue is
    /// flushed after the outermost batch returns. Nested batches join the
    /// outermost one. The suspension is lifted even if `f` panics, in which
    /// case the queued computations are discarded.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch(f)
    }

    /// Run `f` without registering signal reads as dependencies.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ctx = self.inner.context.enter(None);
        f()
    }

    /// Whether a batch is currently open.
    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0
    }

    /// The computation currently collecting dependencies, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current()
    }

    /// Number of live (registered, not disposed) computations.
    pub fn computation_count(&self) -> usize {
        self.inner.computations.borrow().len()
    }

    /// Number of computations waiting for the current batch to end.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Dispose a computation: unsubscribe it everywhere and prevent future
    /// runs. Safe to call from inside the computation itself, from another
    /// computation, or from outside all computations.
    pub fn dispose(&self, id: SubscriberId) {
        self.inner.dispose(id);
    }

    /// Install the runtime-wide error handler.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&ComputationError) + 'static,
    {
        *self.inner.error_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Create computations inside `f` that report to `handler` instead of
    /// the runtime-wide handler.
    pub fn with_error_handler<R>(&self, handler: ErrorHandler, f: impl FnOnce() -> R) -> R {
        self.inner.handler_scope.borrow_mut().push(handler);
        let _scope = HandlerScope {
            scope: &self.inner.handler_scope,
        };
        f()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("computations", &self.computation_count())
            .field("batch_depth", &self.inner.batch_depth.get())
            .finish()
    }
}

struct HandlerScope<'a> {
    scope: &'a RefCell<Vec<ErrorHandler>>,
}

impl Drop for HandlerScope<'_> {
    fn drop(&mut self) {
        self.scope.borrow_mut().pop();
    }
}

struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

struct SettleGuard<'a> {
    settling: &'a RefCell<Vec<IndexMap<SubscriberId, u64>>>,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.settling.borrow_mut().pop();
    }
}

struct BatchGuard<'a> {
    runtime: &'a RuntimeInner,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = self.runtime.batch_depth.get() - 1;
        self.runtime.batch_depth.set(depth);
        if depth > 0 {
            return;
        }
        if std::thread::panicking() {
            self.runtime.pending.borrow_mut().clear();
        } else {
            self.runtime.flush();
        }
    }
}

impl RuntimeInner {
    fn tick(&self) -> u64 {
        let next = self.clock.get() + 1;
        self.clock.set(next);
        next
    }

    pub(crate) fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.batch_depth.set(self.batch_depth.get() + 1);
        let _guard = BatchGuard { runtime: self };
        f()
    }

    /// Register a computation without running it.
    pub(crate) fn register(&self, kind: ComputationKind, body: Body) -> Rc<Computation> {
        let error_handler = self.handler_scope.borrow().last().cloned();
        let node = Rc::new(Computation {
            id: SubscriberId::new(),
            kind,
            body,
            sources: RefCell::new(IndexMap::new()),
            disposed: Cell::new(false),
            last_run: Cell::new(0),
            run_count: Cell::new(0),
            error_handler,
        });
        self.computations
            .borrow_mut()
            .insert(node.id, Rc::clone(&node));
        node
    }

    /// Register and run a computation for the first time.
    ///
    /// A failing first run disposes the computation and hands the error
    /// back to the caller.
    pub(crate) fn create(
        &self,
        kind: ComputationKind,
        body: Body,
    ) -> Result<Rc<Computation>, ComputationError> {
        let node = self.register(kind, body);
        match self.run(&node) {
            Ok(()) => Ok(node),
            Err(error) => {
                self.dispose(node.id);
                Err(error)
            }
        }
    }

    /// Record that the current computation read `source`.
    pub(crate) fn track(&self, source: Rc<dyn Source>) {
        let Some(observer) = self.context.current() else {
            return;
        };
        let node = self.computations.borrow().get(&observer).cloned();
        let Some(node) = node else {
            return;
        };
        if node.disposed.get() {
            return;
        }

        let id = source.source_id();
        let mut sources = node.sources.borrow_mut();
        if !sources.contains_key(&id) {
            source.subscribe(observer);
            sources.insert(id, source);
        }
    }

    /// React to a write that changed a source read by `subscribers`.
    pub(crate) fn notify(&self, subscribers: &[SubscriberId]) {
        let tick = self.tick();
        let entries: Vec<(SubscriberId, u64)> = subscribers.iter().map(|id| (*id, tick)).collect();

        if let Some(collector) = self.settling.borrow_mut().last_mut() {
            collector.extend(entries);
            return;
        }
        if self.batch_depth.get() > 0 {
            self.pending.borrow_mut().extend(entries);
            return;
        }
        self.propagate(entries);
    }

    /// Settle every derived computation reachable from `entries`, then run
    /// the notified effects once each.
    fn propagate(&self, entries: Vec<(SubscriberId, u64)>) {
        for (node, tick) in self.settle(entries) {
            // A run that started after the write already observed it.
            if node.disposed.get() || node.last_run.get() > tick {
                continue;
            }
            self.run_reporting(&node);
        }
    }

    /// Run queued derived computations until none is left.
    ///
    /// Writes made while settling, including each derived computation's
    /// write into its own value, are collected instead of propagated. Derived
    /// computations run oldest first: a computed can only read values that
    /// existed when it was created, so this is a topological order. Effects
    /// are returned in notification order, deduplicated.
    fn settle(&self, entries: Vec<(SubscriberId, u64)>) -> Vec<(Rc<Computation>, u64)> {
        self.settling.borrow_mut().push(IndexMap::new());
        let _guard = SettleGuard {
            settling: &self.settling,
        };

        let limit = self.config.max_update_depth;
        let mut derived: BTreeMap<SubscriberId, (Rc<Computation>, u64)> = BTreeMap::new();
        let mut effects: IndexMap<SubscriberId, (Rc<Computation>, u64)> = IndexMap::new();
        let mut runs: HashMap<SubscriberId, usize> = HashMap::new();
        let mut incoming = entries;

        loop {
            {
                let computations = self.computations.borrow();
                for (id, tick) in incoming.drain(..) {
                    let Some(node) = computations.get(&id) else {
                        continue;
                    };
                    match node.kind {
                        ComputationKind::Derived => {
                            derived.insert(id, (Rc::clone(node), tick));
                        }
                        ComputationKind::Effect => {
                            effects.insert(id, (Rc::clone(node), tick));
                        }
                    }
                }
            }

            let Some((id, (node, tick))) = derived.pop_first() else {
                break;
            };
            if !node.disposed.get() && node.last_run.get() <= tick {
                let count = runs.entry(id).or_insert(0);
                *count += 1;
                if *count > limit {
                    self.report(&node, &ComputationError::DepthExceeded { id, limit });
                } else {
                    self.run_reporting(&node);
                }
            }

            if let Some(collector) = self.settling.borrow_mut().last_mut() {
                incoming.extend(collector.drain(..));
            }
        }

        effects.into_values().collect()
    }

    fn flush(&self) {
        loop {
            let entries: Vec<(SubscriberId, u64)> = self.pending.borrow_mut().drain(..).collect();
            if entries.is_empty() {
                break;
            }
            self.propagate(entries);
        }
    }

    pub(crate) fn run_reporting(&self, node: &Rc<Computation>) {
        if let Err(error) = self.run(node) {
            self.report(node, &error);
        }
    }

    /// Run one computation, rebuilding its dependency set.
    ///
    /// On failure the subscriptions of the previous run are restored, so the
    /// computation keeps reacting to the values it depended on.
    pub(crate) fn run(&self, node: &Rc<Computation>) -> Result<(), ComputationError> {
        if node.disposed.get() {
            return Ok(());
        }
        let limit = self.config.max_update_depth;
        if self.update_depth.get() >= limit {
            return Err(ComputationError::DepthExceeded { id: node.id, limit });
        }
        let _depth = DepthGuard::enter(&self.update_depth);

        let previous = std::mem::take(&mut *node.sources.borrow_mut());
        for source in previous.values() {
            source.unsubscribe(node.id);
        }

        node.last_run.set(self.tick());
        node.run_count.set(node.run_count.get() + 1);

        let body = Rc::clone(&node.body);
        let outcome = {
            let _ctx = self.context.enter(Some(node.id));
            panic::catch_unwind(AssertUnwindSafe(|| body()))
        };

        if node.disposed.get() {
            node.release_sources();
            return Ok(());
        }

        let error = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(message)) => ComputationError::Failed { id: node.id, message },
            Err(payload) => ComputationError::from_panic(node.id, payload.as_ref()),
        };

        let mut sources = node.sources.borrow_mut();
        for (id, source) in previous {
            if let indexmap::map::Entry::Vacant(slot) = sources.entry(id) {
                source.subscribe(node.id);
                slot.insert(source);
            }
        }
        Err(error)
    }

    pub(crate) fn report(&self, node: &Computation, error: &ComputationError) {
        if let Some(handler) = &node.error_handler {
            handler(error);
            return;
        }
        let handler = self.error_handler.borrow().clone();
        match handler {
            Some(handler) => handler(error),
            None => report_to_default(error),
        }
    }

    pub(crate) fn dispose(&self, id: SubscriberId) {
        let node = self.computations.borrow_mut().remove(&id);
        self.pending.borrow_mut().shift_remove(&id);
        if let Some(node) = node {
            node.disposed.set(true);
            node.release_sources();
        }
    }
}
