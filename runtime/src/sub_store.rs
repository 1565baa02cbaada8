//! Derived stores scoped to a projection of a parent.
//!
//! A [`SubStore`] never reduces anything itself. Its state changes along two
//! paths:
//!
//! - **local dispatch** ([`SubStore::try_dispatch`]): the action is lifted into
//!   the parent's action type and dispatched there, then the sub-store
//!   re-projects the parent's resulting state and publishes the action to its
//!   own epics.
//! - **parent sync** ([`SubStore::sync_from_parent`]): every state the parent
//!   publishes is projected and published here, with no action.
//!
//! The parent holds the mirroring registration in its subscriber list, but
//! that entry refers to the sub-store weakly and is removed when the
//! sub-store is dropped. The sub-store holds the parent weakly too, so neither
//! keeps the other alive.
//!
//! Because a local dispatch goes through the parent, subscribers to the raw
//! state stream of a sub-store see the new state twice per local dispatch:
//! once from parent sync and once from the re-projection. Use
//! [`StateStore::select`] where repeats matter.

use crate::StoreConfig;
use crate::error::StoreError;
use crate::metrics::{DISPATCH_TOTAL, PARENT_SYNC_TOTAL};
use crate::store::{StateStore, StoreCore};
use epicstore_core::epic::{Epic, StateStream};
use epicstore_core::stream::{Stream, Subscription};
use epicstore_core::Action;
use std::fmt;
use std::sync::{Arc, Weak};

type Projection<P, C> = Box<dyn Fn(&<P as StateStore>::State) -> C + Send + Sync>;
type Lift<P, CA> = Box<dyn Fn(CA) -> <P as StateStore>::Action + Send + Sync>;

struct SubStoreInner<P: StateStore, C, CA> {
    core: StoreCore<C, CA>,
    parent: P::Handle,
    projection: Projection<P, C>,
    lift: Lift<P, CA>,
}

/// A store scoped to `projection(parent.state)`.
///
/// Created with [`StateStore::sub_store`]. Clones share the same sub-store.
///
/// # Example
///
/// ```
/// use epicstore_core::composition::reducer_fn;
/// use epicstore_runtime::{StateStore, Store};
///
/// #[derive(Clone, Debug, Default)]
/// struct App {
///     clicks: u32,
///     title: String,
/// }
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum AppAction {
///     Click,
///     Rename(String),
/// }
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Click;
///
/// let app = Store::new(
///     App::default(),
///     reducer_fn(|app: &mut App, action: &AppAction| match action {
///         AppAction::Click => app.clicks += 1,
///         AppAction::Rename(title) => app.title.clone_from(title),
///     }),
///     Vec::new(),
/// );
///
/// let clicks = app.sub_store(|app: &App| app.clicks, |_: Click| AppAction::Click, Vec::new());
///
/// clicks.dispatch(Click);
/// app.dispatch(AppAction::Click);
/// assert_eq!(clicks.state(), 2);
/// assert_eq!(app.state().clicks, 2);
/// ```
pub struct SubStore<P: StateStore, C, CA> {
    inner: Arc<SubStoreInner<P, C, CA>>,
}

impl<P: StateStore, C, CA> Clone for SubStore<P, C, CA> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: StateStore, C, CA> fmt::Debug for SubStore<P, C, CA> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubStore")
            .field("label", &self.inner.core.label())
            .finish_non_exhaustive()
    }
}

impl<P, C, CA> SubStore<P, C, CA>
where
    P: StateStore,
    C: Clone + Send + Sync + 'static,
    CA: Action,
{
    /// Scope a sub-store with an explicit configuration.
    ///
    /// [`StateStore::sub_store`] calls this with the label `"<parent>/sub"`.
    pub fn with_config<Pr, L>(
        parent: &P,
        projection: Pr,
        lift: L,
        epics: Vec<Epic<C, CA>>,
        config: StoreConfig,
    ) -> Self
    where
        Pr: Fn(&P::State) -> C + Send + Sync + 'static,
        L: Fn(CA) -> P::Action + Send + Sync + 'static,
    {
        let initial_state = projection(&parent.state());

        let inner = Arc::new_cyclic(|mirror: &Weak<SubStoreInner<P, C, CA>>| {
            let mirror = Weak::clone(mirror);
            let parent_sync = parent.subscribe(move |published| {
                let Some(inner) = mirror.upgrade() else {
                    return;
                };
                // A nested parent dispatch may already have superseded the
                // published value, so mirror the parent's current state.
                let current = P::upgrade(&inner.parent).map_or(published, |parent| parent.state());
                Self { inner }.sync_from_parent(&current);
            });

            let core = StoreCore::new(initial_state, config);
            core.retain(parent_sync);

            SubStoreInner {
                core,
                parent: parent.downgrade(),
                projection: Box::new(projection),
                lift: Box::new(lift),
            }
        });
        let store = Self { inner };

        tracing::debug!(
            store = %store.label(),
            parent = %parent.label(),
            epics = epics.len(),
            "Creating sub-store"
        );
        for epic in epics {
            let registration = store.register(epic);
            store.inner.core.retain(registration);
        }

        store
    }

    /// Forward `action` to the parent, then mirror the parent's new state.
    ///
    /// After this returns, `self.state() == projection(parent.state())`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ParentDropped`] if the parent no longer exists.
    /// Nothing is published in that case.
    pub fn try_dispatch(&self, action: CA) -> Result<(), StoreError> {
        let core = &self.inner.core;
        let parent = P::upgrade(&self.inner.parent).ok_or_else(|| StoreError::ParentDropped {
            label: core.label().to_owned(),
        })?;

        let (_guard, depth) = core.enter();
        let span = tracing::debug_span!("store_dispatch", store = %core.label(), depth);
        let _enter = span.enter();

        metrics::counter!(DISPATCH_TOTAL, "store" => core.label().to_owned()).increment(1);

        parent.dispatch((self.inner.lift)(action.clone()));

        let state = core.replace((self.inner.projection)(&parent.state()));
        core.publish_state(state);
        core.publish_action(action);
        Ok(())
    }

    /// Forward `action` to the parent; a detached sub-store ignores it.
    pub fn dispatch(&self, action: CA) {
        if let Err(error) = self.try_dispatch(action) {
            tracing::warn!(%error, "Ignoring dispatch to detached sub-store");
        }
    }

    /// Mirror a parent state into this sub-store.
    ///
    /// Projects `parent_state`, stores it and publishes it. No action is
    /// published and the sub-store's epics see only the state change. The
    /// parent's mirroring registration runs this on each emission, passing
    /// the parent's state as of delivery rather than the emitted value.
    pub fn sync_from_parent(&self, parent_state: &P::State) {
        let core = &self.inner.core;
        let state = core.replace((self.inner.projection)(parent_state));
        metrics::counter!(PARENT_SYNC_TOTAL, "store" => core.label().to_owned()).increment(1);
        core.publish_state(state);
    }

    /// The parent store, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<P> {
        P::upgrade(&self.inner.parent)
    }

    /// Whether the parent is still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.parent().is_some()
    }

    /// Number of observers on this sub-store's raw state stream.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.core.subscriber_count()
    }

    /// Create a handle that does not keep the sub-store alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakSubStore<P, C, CA> {
        WeakSubStore {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<P, C, CA> StateStore for SubStore<P, C, CA>
where
    P: StateStore,
    C: Clone + Send + Sync + 'static,
    CA: Action,
{
    type State = C;
    type Action = CA;
    type Handle = WeakSubStore<P, C, CA>;

    fn dispatch(&self, action: CA) {
        Self::dispatch(self, action);
    }

    fn state(&self) -> C {
        self.inner.core.snapshot()
    }

    fn state_stream(&self) -> StateStream<C> {
        self.inner.core.state_stream()
    }

    fn actions(&self) -> Stream<CA> {
        self.inner.core.actions()
    }

    fn register(&self, epic: Epic<C, CA>) -> Subscription {
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

    fn downgrade(&self) -> WeakSubStore<P, C, CA> {
        Self::downgrade(self)
    }

    fn upgrade(handle: &WeakSubStore<P, C, CA>) -> Option<Self> {
        handle.upgrade()
    }
}

/// Non-owning handle to a [`SubStore`].
pub struct WeakSubStore<P: StateStore, C, CA> {
    inner: Weak<SubStoreInner<P, C, CA>>,
}

impl<P: StateStore, C, CA> Clone for WeakSubStore<P, C, CA> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<P: StateStore, C, CA> fmt::Debug for WeakSubStore<P, C, CA> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSubStore")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<P, C, CA> WeakSubStore<P, C, CA>
where
    P: StateStore,
    C: Clone + Send + Sync + 'static,
    CA: Action,
{
    /// The sub-store, if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<SubStore<P, C, CA>> {
        self.inner.upgrade().map(|inner| SubStore { inner })
    }

    /// Dispatch through the handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreDropped`] if the sub-store no longer exists,
    /// or [`StoreError::ParentDropped`] if its parent is gone.
    pub fn dispatch(&self, action: CA) -> Result<(), StoreError> {
        self.upgrade()
            .ok_or(StoreError::StoreDropped)?
            .try_dispatch(action)
    }
}
