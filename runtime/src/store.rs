//! The root store and the surface shared by every store.
//!
//! [`Store`] owns its state, applies its reducer and drives its epics.
//! [`StateStore`] is the surface both [`Store`] and
//! [`SubStore`](crate::sub_store::SubStore) expose, so code that only needs to
//! dispatch, observe or scope works against either.

use crate::StoreConfig;
use crate::error::StoreError;
use crate::metrics::{DISPATCH_TOTAL, EPICS_ACTIVE, REDUCER_DURATION};
use crate::sub_store::SubStore;
use epicstore_core::epic::{Epic, StateStream};
use epicstore_core::reducer::{BoxedReducer, Reducer};
use epicstore_core::stream::{Stream, Subject, Subscription};
use epicstore_core::Action;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Operations common to [`Store`] and [`SubStore`].
///
/// All handles are cheap to clone and refer to the same underlying store.
pub trait StateStore: Clone + Send + Sync + 'static {
    /// The state held by the store
    type State: Clone + Send + Sync + 'static;

    /// The actions the store accepts
    type Action: Action;

    /// Non-owning handle to the store
    type Handle: Clone + Send + Sync + 'static;

    /// Reduce `action`, publish the new state, then publish `action` to epics.
    ///
    /// Nested dispatches made by subscribers or epics complete before this
    /// call returns.
    fn dispatch(&self, action: Self::Action);

    /// Snapshot of the current state.
    fn state(&self) -> Self::State;

    /// Snapshot accessor and change stream for the state.
    fn state_stream(&self) -> StateStream<Self::State>;

    /// Every action this store publishes to its epics.
    fn actions(&self) -> Stream<Self::Action>;

    /// Wire an epic into this store.
    ///
    /// The epic's output, filtered by its `dispatch_back` flag, is dispatched
    /// back into the store. Dropping the returned token unsubscribes this epic
    /// only.
    fn register(&self, epic: Epic<Self::State, Self::Action>) -> Subscription;

    /// Label used in logs and metrics.
    fn label(&self) -> &str;

    /// Create a handle that does not keep the store alive.
    fn downgrade(&self) -> Self::Handle;

    /// Recover a store from a handle, if it is still alive.
    fn upgrade(handle: &Self::Handle) -> Option<Self>;

    /// Attach an observer to the raw state stream.
    ///
    /// The observer sees every published state, including repeats.
    fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Self::State) + Send + Sync + 'static,
    {
        self.state_stream().changes().subscribe(observer)
    }

    /// Deduplicated projection of the state.
    ///
    /// Emits `selector(state)` on subscription, then again only when the
    /// projected value changes.
    fn select<V, F>(&self, selector: F) -> Stream<V>
    where
        V: Clone + PartialEq + Send + 'static,
        F: Fn(&Self::State) -> V + Send + Sync + 'static,
    {
        self.state_stream().select(selector)
    }

    /// Scope a derived store to `projection` of this store's state.
    ///
    /// Actions dispatched to the sub-store are passed through `lift` and
    /// dispatched here; the sub-store then mirrors `projection` of the
    /// resulting state. `epics` run against the sub-store for its whole
    /// lifetime.
    fn sub_store<C, CA, P, L>(
        &self,
        projection: P,
        lift: L,
        epics: Vec<Epic<C, CA>>,
    ) -> SubStore<Self, C, CA>
    where
        C: Clone + Send + Sync + 'static,
        CA: Action,
        P: Fn(&Self::State) -> C + Send + Sync + 'static,
        L: Fn(CA) -> Self::Action + Send + Sync + 'static,
    {
        let config = StoreConfig::new(format!("{}/sub", self.label()));
        SubStore::with_config(self, projection, lift, epics, config)
    }
}

/// Decrements the dispatch depth when a dispatch unwinds.
pub(crate) struct DepthGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

/// State cell, publication subjects and lifetime registrations.
///
/// Shared by [`Store`] and [`SubStore`]; only the way a new state is
/// computed differs between them.
pub(crate) struct StoreCore<S, A> {
    config: StoreConfig,
    state: Arc<RwLock<S>>,
    changes: Subject<S>,
    actions: Subject<A>,
    lifetime: Mutex<Vec<Subscription>>,
    depth: AtomicUsize,
}

impl<S, A> StoreCore<S, A> {
    pub(crate) fn label(&self) -> &str {
        &self.config.label
    }
}

impl<S, A> StoreCore<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    pub(crate) fn new(initial_state: S, config: StoreConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(initial_state)),
            changes: Subject::new(),
            actions: Subject::new(),
            lifetime: Mutex::new(Vec::new()),
            depth: AtomicUsize::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> S {
        self.state.read().clone()
    }

    /// The snapshot closure holds the state cell, never the core itself.
    pub(crate) fn state_stream(&self) -> StateStream<S> {
        let state = Arc::clone(&self.state);
        StateStream::new(move || state.read().clone(), self.changes.stream())
    }

    pub(crate) fn actions(&self) -> Stream<A> {
        self.actions.stream()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.changes.observer_count()
    }

    /// Enter a dispatch, warning once the configured depth is reached.
    pub(crate) fn enter(&self) -> (DepthGuard<'_>, usize) {
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
        if depth == self.config.depth_warning {
            tracing::warn!(
                store = %self.config.label,
                depth,
                "Nested dispatch depth reached warning threshold; check for epics that re-dispatch unconditionally"
            );
        }
        (DepthGuard { depth: &self.depth }, depth)
    }

    /// Run `reduce` under the write lock and return the resulting state.
    ///
    /// The lock is released before the caller publishes anything.
    pub(crate) fn reduce_with<F>(&self, reduce: F) -> S
    where
        F: FnOnce(&mut S),
    {
        let mut state = self.state.write();
        let start = Instant::now();
        reduce(&mut state);
        metrics::histogram!(REDUCER_DURATION, "store" => self.config.label.clone())
            .record(start.elapsed().as_secs_f64());
        tracing::trace!("Reducer completed");
        state.clone()
    }

    /// Overwrite the state and return a copy for publication.
    pub(crate) fn replace(&self, next: S) -> S {
        let mut state = self.state.write();
        *state = next;
        state.clone()
    }

    pub(crate) fn publish_state(&self, state: S) {
        tracing::trace!(
            subscribers = self.changes.observer_count(),
            "Publishing state"
        );
        self.changes.publish(state);
    }

    pub(crate) fn publish_action(&self, action: A) {
        tracing::trace!(?action, "Publishing action to epics");
        self.actions.publish(action);
    }

    /// Subscribe `epic`'s filtered output to `feedback`.
    pub(crate) fn wire_epic<F>(&self, epic: &Epic<S, A>, feedback: F) -> Subscription
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let label = self.config.label.clone();
        tracing::debug!(
            store = %label,
            dispatch_back = epic.dispatch_back(),
            "Registering epic"
        );

        let output = epic
            .output(&self.state_stream(), &self.actions())
            .subscribe(feedback);
        metrics::gauge!(EPICS_ACTIVE, "store" => label.clone()).increment(1.0);

        Subscription::composite([
            output,
            Subscription::new(move || {
                metrics::gauge!(EPICS_ACTIVE, "store" => label.clone()).decrement(1.0);
                tracing::debug!(store = %label, "Epic cancelled");
            }),
        ])
    }

    /// Keep `subscription` alive until the core is dropped.
    pub(crate) fn retain(&self, subscription: Subscription) {
        self.lifetime.lock().push(subscription);
    }
}

struct StoreInner<S, A> {
    core: StoreCore<S, A>,
    reducer: BoxedReducer<S, A>,
}

/// The root container: owns state, applies the reducer, drives epics.
///
/// `Store` is a handle; clones share the same state. The store is torn down,
/// and its construction-time epics cancelled, when the last handle is
/// dropped.
///
/// # Example
///
/// ```
/// use epicstore_core::composition::reducer_fn;
/// use epicstore_runtime::{StateStore, Store};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Add(i32);
///
/// let store = Store::new(0, reducer_fn(|sum: &mut i32, Add(n): &Add| *sum += n), Vec::new());
///
/// let sums = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&sums);
/// let _subscription = store.subscribe(move |sum| sink.lock().unwrap().push(sum));
///
/// store.dispatch(Add(2));
/// store.dispatch(Add(3));
/// assert_eq!(*sums.lock().unwrap(), vec![2, 5]);
/// ```
pub struct Store<S, A> {
    inner: Arc<StoreInner<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A> fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("label", &self.inner.core.config.label)
            .finish_non_exhaustive()
    }
}

impl<S, A> Store<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    /// Create a store with the default configuration.
    ///
    /// `epics` are registered immediately and stay active for the store's
    /// whole lifetime.
    pub fn new<R>(initial_state: S, reducer: R, epics: Vec<Epic<S, A>>) -> Self
    where
        R: Reducer<State = S, Action = A> + Send + Sync + 'static,
    {
        Self::with_config(initial_state, reducer, epics, StoreConfig::default())
    }

    /// Create a store with an explicit configuration.
    pub fn with_config<R>(
        initial_state: S,
        reducer: R,
        epics: Vec<Epic<S, A>>,
        config: StoreConfig,
    ) -> Self
    where
        R: Reducer<State = S, Action = A> + Send + Sync + 'static,
    {
        let store = Self {
            inner: Arc::new(StoreInner {
                core: StoreCore::new(initial_state, config),
                reducer: Box::new(reducer),
            }),
        };

        tracing::debug!(
            store = %store.label(),
            epics = epics.len(),
            "Creating store"
        );
        for epic in epics {
            let registration = store.register(epic);
            store.inner.core.retain(registration);
        }

        store
    }

    /// Reduce `action` and publish the result.
    ///
    /// The reducer runs under the state write lock, so a reducer must never
    /// dispatch or read the store it belongs to.
    pub fn dispatch(&self, action: A) {
        let core = &self.inner.core;
        let (_guard, depth) = core.enter();
        let span = tracing::debug_span!("store_dispatch", store = %core.label(), depth);
        let _enter = span.enter();

        metrics::counter!(DISPATCH_TOTAL, "store" => core.config.label.clone()).increment(1);

        let state = core.reduce_with(|state| self.inner.reducer.reduce(state, &action));
        core.publish_state(state);
        core.publish_action(action);
    }

    /// Number of observers on the raw state stream.
    ///
    /// Includes `select` streams, epics watching state and sub-store mirrors.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.core.subscriber_count()
    }

    /// Create a handle that does not keep the store alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakStore<S, A> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<S, A> StateStore for Store<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    type State = S;
    type Action = A;
    type Handle = WeakStore<S, A>;

    fn dispatch(&self, action: A) {
        Self::dispatch(self, action);
    }

    fn state(&self) -> S {
        self.inner.core.snapshot()
    }

    fn state_stream(&self) -> StateStream<S> {
        self.inner.core.state_stream()
    }

    fn actions(&self) -> Stream<A> {
        self.inner.core.actions()
    }

    fn register(&self, epic: Epic<S, A>) -> Subscription {
        let store = Self::downgrade(self);
        self.inner.core.wire_epic(&epic, move |action| {
            if let Err(error) = store.dispatch(action) {
                tracing::debug!(%error, "Discarding epic output");
            }
        })
    }

    fn label(&self) -> &str {
        self.inner.core.label()
    }

    fn downgrade(&self) -> WeakStore<S, A> {
        Self::downgrade(self)
    }

    fn upgrade(handle: &WeakStore<S, A>) -> Option<Self> {
        handle.upgrade()
    }
}

/// Non-owning handle to a [`Store`].
pub struct WeakStore<S, A> {
    inner: Weak<StoreInner<S, A>>,
}

impl<S, A> Clone for WeakStore<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S, A> fmt::Debug for WeakStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<S, A> WeakStore<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Action,
{
    /// The store, if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Store<S, A>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }

    /// Dispatch through the handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreDropped`] if the store no longer exists.
    pub fn dispatch(&self, action: A) -> Result<(), StoreError> {
        let store = self.upgrade().ok_or(StoreError::StoreDropped)?;
        store.dispatch(action);
        Ok(())
    }
}
