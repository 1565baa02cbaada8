//! # Counter Demo
//!
//! A counter embedded in a small application, showing how the epicstore
//! pieces fit together.
//!
//! This demo showcases:
//! - A feature reducer lifted into the app with `for_key` and `typed_reducer`
//! - `#[derive(Action)]` generating the routing prism for `AppAction::Counter`
//! - A [`SubStore`] that sees only the counter and dispatches only counter actions
//! - Epics: one reading the state stream, one logging without feedback, one
//!   using an async delay
//!
//! ## Example
//!
//! ```
//! use counter::{AppAction, CounterAction, app_store, counter_store};
//! use epicstore_runtime::StateStore;
//!
//! let app = app_store();
//! let counter = counter_store(&app);
//!
//! counter.dispatch(CounterAction::Increment);
//! app.dispatch(AppAction::Counter(CounterAction::Increment));
//!
//! assert_eq!(counter.state().count, 2);
//! assert_eq!(app.state().counter.count, 2);
//! ```

use epicstore_core::composition::{CombinedReducer, combine_reducers, for_key, reducer_fn, typed_reducer};
use epicstore_core::epic::{Epic, StateStream, effect};
use epicstore_core::lens;
use epicstore_core::reducer::{BoxedReducer, Reducer};
use epicstore_core::stream::Stream;
use epicstore_macros::Action;
use epicstore_runtime::sources::AsyncStreamExt;
use epicstore_runtime::{StateStore, Store, StoreConfig, SubStore};
use std::time::Duration;

/// Delay applied to [`CounterAction::IncrementLater`]
pub const INCREMENT_DELAY: Duration = Duration::from_millis(50);

/// Every multiple of this count is written to the app log
pub const MILESTONE: i64 = 10;

/// Counter state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterState {
    /// Current count value
    pub count: i64,
}

/// Counter actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    /// Increment the counter by 1
    Increment,
    /// Decrement the counter by 1
    Decrement,
    /// Reset the counter to 0
    Reset,
    /// Increment after [`INCREMENT_DELAY`]; handled by an epic, not the reducer
    IncrementLater,
}

/// Counter reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterReducer;

impl Reducer for CounterReducer {
    type State = CounterState;
    type Action = CounterAction;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        match action {
            CounterAction::Increment => state.count += 1,
            CounterAction::Decrement => state.count -= 1,
            CounterAction::Reset => state.count = 0,
            CounterAction::IncrementLater => {},
        }
    }
}

/// Application state: the counter plus a log of milestones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    /// The embedded counter
    pub counter: CounterState,
    /// Messages appended by [`AppAction::Log`]
    pub log: Vec<String>,
}

/// Application actions
#[derive(Action, Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// An action for the embedded counter
    Counter(CounterAction),
    /// Append a message to the log
    Log(String),
}

/// The application store
pub type AppStore = Store<AppState, AppAction>;

/// The counter scoped out of [`AppStore`]
pub type CounterStore = SubStore<AppStore, CounterState, CounterAction>;

/// Builds the application reducer from the counter reducer and a log reducer.
#[must_use]
pub fn app_reducer() -> CombinedReducer<AppState, AppAction> {
    let counter: BoxedReducer<AppState, AppAction> = Box::new(for_key(
        lens!(AppState, counter),
        typed_reducer(AppAction::COUNTER, CounterReducer),
    ));
    let log: BoxedReducer<AppState, AppAction> =
        Box::new(reducer_fn(|state: &mut AppState, action: &AppAction| {
            if let AppAction::Log(message) = action {
                state.log.push(message.clone());
            }
        }));

    combine_reducers(vec![counter, log])
}

/// Logs a line whenever the count reaches a non-zero multiple of [`MILESTONE`].
#[must_use]
pub fn milestone_epic() -> Epic<AppState, AppAction> {
    effect(true, |state: &StateStream<AppState>, _: &Stream<AppAction>| {
        state
            .select(|state: &AppState| state.counter.count)
            .filter(|count| *count != 0 && count % MILESTONE == 0)
            .map(|count| AppAction::Log(format!("reached {count}")))
    })
}

/// Traces every app action; its output is never dispatched.
#[must_use]
pub fn audit_epic() -> Epic<AppState, AppAction> {
    effect(false, |_, actions: &Stream<AppAction>| {
        actions.inspect(|action| {
            tracing::info!(action = action.variant_name(), "app action");
        })
    })
}

/// Turns [`CounterAction::IncrementLater`] into a delayed `Increment`.
///
/// Needs a tokio runtime; without one the delayed value is dropped.
#[must_use]
pub fn delayed_increment_epic() -> Epic<CounterState, CounterAction> {
    effect(true, |_, actions: &Stream<CounterAction>| {
        actions
            .filter(|action| *action == CounterAction::IncrementLater)
            .delay(INCREMENT_DELAY)
            .map(|_| CounterAction::Increment)
    })
}

/// Creates the application store with its epics registered.
#[must_use]
pub fn app_store() -> AppStore {
    Store::with_config(
        AppState::default(),
        app_reducer(),
        vec![audit_epic(), milestone_epic()],
        StoreConfig::new("app"),
    )
}

/// Scopes the counter out of `app`.
#[must_use]
pub fn counter_store(app: &AppStore) -> CounterStore {
    SubStore::with_config(
        app,
        |state: &AppState| state.counter.clone(),
        AppAction::COUNTER.embedder(),
        vec![delayed_increment_epic()],
        StoreConfig::new(format!("{}/counter", app.label())),
    )
}
