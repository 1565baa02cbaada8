//! Epics: long-lived effect processors.
//!
//! An [`Epic`] observes a store's state and action streams and produces a
//! stream of further actions. Whether those actions are routed back into the
//! store is controlled by the epic's `dispatch_back` flag: an epic with
//! `dispatch_back = false` still runs (its side effects happen) but everything
//! it emits is discarded before it reaches a store.
//!
//! Epics are registered once and run until their registration is cancelled.
//! They must never let a failure escape into their output; use
//! [`Stream::recover`] on fallible sources inside the epic.
//!
//! # Example
//!
//! ```
//! use epicstore_core::epic::{combine_epics, effect, StateStream};
//! use epicstore_core::stream::{Stream, Subject};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Action {
//!     Ping,
//!     Pong,
//! }
//!
//! let pong = effect(true, |_state: &StateStream<u32>, actions: &Stream<Action>| {
//!     actions
//!         .filter(|action| *action == Action::Ping)
//!         .map(|_| Action::Pong)
//! });
//! let combined = combine_epics(true, vec![pong]);
//!
//! let state = Subject::new();
//! let actions = Subject::new();
//! let output = combined.output(&StateStream::new(|| 0, state.stream()), &actions.stream());
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let _subscription = output.subscribe(move |action| sink.lock().unwrap().push(action));
//!
//! actions.publish(Action::Ping);
//! assert_eq!(*seen.lock().unwrap(), vec![Action::Pong]);
//! ```

use crate::stream::{Observer, Stream};
use std::fmt;
use std::sync::Arc;

/// Snapshot accessor paired with a live change stream for a store's state.
pub struct StateStream<S> {
    current: Arc<dyn Fn() -> S + Send + Sync>,
    changes: Stream<S>,
}

impl<S> Clone for StateStream<S> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            changes: self.changes.clone(),
        }
    }
}

impl<S> fmt::Debug for StateStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStream").finish_non_exhaustive()
    }
}

impl<S: Clone + Send + Sync + 'static> StateStream<S> {
    /// Pair a snapshot accessor with a change stream.
    pub fn new<F>(current: F, changes: Stream<S>) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self {
            current: Arc::new(current),
            changes,
        }
    }

    /// The current state.
    #[must_use]
    pub fn value(&self) -> S {
        (self.current)()
    }

    /// Every state published after subscription, one per reduction.
    #[must_use]
    pub const fn changes(&self) -> &Stream<S> {
        &self.changes
    }

    /// The current state on subscription, followed by every change.
    ///
    /// The change subscription is in place before the snapshot is emitted,
    /// so a dispatch made by the observer while handling the snapshot is
    /// still delivered.
    #[must_use]
    pub fn with_current(&self) -> Stream<S> {
        let current = Arc::clone(&self.current);
        let changes = self.changes.clone();
        Stream::new(move |observer: Observer<S>| {
            let subscription = changes.subscribe_observer(Arc::clone(&observer));
            observer(current());
            subscription
        })
    }

    /// Derived, deduplicated projection of the state.
    ///
    /// Emits `selector(state)` once on subscription and afterwards only when
    /// the projected value differs from the previous emission.
    #[must_use]
    pub fn select<V, F>(&self, selector: F) -> Stream<V>
    where
        V: Clone + PartialEq + Send + 'static,
        F: Fn(&S) -> V + Send + Sync + 'static,
    {
        self.with_current()
            .map(move |state| selector(&state))
            .distinct_until_changed()
    }
}

type EffectFn<S, A> = dyn Fn(&StateStream<S>, &Stream<A>) -> Stream<A> + Send + Sync;

/// An effect processor: `{ dispatch_back, effect }`.
pub struct Epic<S, A> {
    dispatch_back: bool,
    effect: Arc<EffectFn<S, A>>,
}

impl<S, A> Clone for Epic<S, A> {
    fn clone(&self) -> Self {
        Self {
            dispatch_back: self.dispatch_back,
            effect: Arc::clone(&self.effect),
        }
    }
}

impl<S, A> fmt::Debug for Epic<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Epic")
            .field("dispatch_back", &self.dispatch_back)
            .finish_non_exhaustive()
    }
}

impl<S, A> Epic<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Wrap an effect function.
    pub fn new<F>(dispatch_back: bool, effect: F) -> Self
    where
        F: Fn(&StateStream<S>, &Stream<A>) -> Stream<A> + Send + Sync + 'static,
    {
        Self {
            dispatch_back,
            effect: Arc::new(effect),
        }
    }

    /// An epic that ignores its inputs and never emits.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(false, |_, _| Stream::empty())
    }

    /// Whether this epic's emissions are routed back into the store.
    #[must_use]
    pub const fn dispatch_back(&self) -> bool {
        self.dispatch_back
    }

    /// Invoke the effect function, unfiltered.
    #[must_use]
    pub fn run(&self, state: &StateStream<S>, actions: &Stream<A>) -> Stream<A> {
        (self.effect)(state, actions)
    }

    /// Invoke the effect function and apply this epic's `dispatch_back`
    /// policy to its output.
    ///
    /// The effect's stream is still subscribed when `dispatch_back` is false,
    /// so any work done inside it happens; only the emissions are dropped.
    #[must_use]
    pub fn output(&self, state: &StateStream<S>, actions: &Stream<A>) -> Stream<A> {
        let dispatch_back = self.dispatch_back;
        self.run(state, actions).filter(move |_| dispatch_back)
    }
}

/// Construct an epic from an action-stream-to-action-stream function.
pub fn effect<S, A, F>(dispatch_back: bool, f: F) -> Epic<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    F: Fn(&StateStream<S>, &Stream<A>) -> Stream<A> + Send + Sync + 'static,
{
    Epic::new(dispatch_back, f)
}

/// Construct a no-op epic.
#[must_use]
pub fn empty_effect<S, A>() -> Epic<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    Epic::empty()
}

/// Merge several epics into one.
///
/// Every input epic is invoked with the same state and action streams, its
/// output is filtered by *its own* `dispatch_back` flag, and the survivors are
/// merged. The merge preserves each epic's internal order but defines no
/// interleaving across epics. The returned epic carries the outer
/// `dispatch_back` flag, applied again by whoever registers it.
#[must_use]
pub fn combine_epics<S, A>(dispatch_back: bool, epics: Vec<Epic<S, A>>) -> Epic<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    Epic::new(dispatch_back, move |state, actions| {
        Stream::merge_all(
            epics
                .iter()
                .map(|epic| epic.output(state, actions))
                .collect(),
        )
    })
}
