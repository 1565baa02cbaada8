//! # Epicstore Core
//!
//! Core traits and types for the epicstore architecture.
//!
//! This crate provides the pure building blocks of a unidirectional state
//! container. It has no runtime of its own; the `Store` that drives these
//! pieces lives in `epicstore-runtime`.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state owned by exactly one store
//! - **Action**: A closed enum of "something happened" values
//! - **Reducer**: Pure function `(State, Action) → State`, expressed as in-place mutation
//! - **Epic**: Long-lived effect processor `(StateStream, Actions) → Actions`
//! - **Optics**: [`Prism`](optics::Prism) and [`Lens`](optics::Lens) for type-safe routing
//! - **Stream**: Minimal push-based stream used to wire all of the above
//!
//! ## Architecture Principles
//!
//! - Unidirectional data flow
//! - Reducers are pure; side effects live in epics
//! - Synchronous, depth-first delivery
//! - Explicit ownership of subscriptions
//!
//! ## Example
//!
//! ```
//! use epicstore_core::composition::{combine_reducers, reducer_fn};
//! use epicstore_core::reducer::Reducer;
//!
//! #[derive(Clone, Debug, Default)]
//! struct AppState {
//!     count: i64,
//!     label: String,
//! }
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum AppAction {
//!     Increment,
//!     Rename(String),
//! }
//!
//! let reducer = combine_reducers(vec![
//!     Box::new(reducer_fn(|state: &mut AppState, action: &AppAction| {
//!         if matches!(action, AppAction::Increment) {
//!             state.count += 1;
//!         }
//!     })),
//!     Box::new(reducer_fn(|state: &mut AppState, action: &AppAction| {
//!         if let AppAction::Rename(label) = action {
//!             state.label.clone_from(label);
//!         }
//!     })),
//! ]);
//!
//! let mut state = AppState::default();
//! reducer.reduce(&mut state, &AppAction::Increment);
//! reducer.reduce(&mut state, &AppAction::Rename("clicks".into()));
//! assert_eq!(state.count, 1);
//! assert_eq!(state.label, "clicks");
//! ```

/// Reducer composition utilities
pub mod composition;

/// Epics, the effect abstraction, and their composition
pub mod epic;

/// Declarative macros for building optics
pub mod optics_macros;

/// Prisms and lenses for type-safe action and state routing
pub mod optics;

/// Minimal push-based stream primitive
pub mod stream;

/// Action module - the input vocabulary of a store
///
/// Actions are plain values: a closed `enum` per application, compared
/// structurally. The container never downcasts them; narrowing to a single
/// variant goes through a [`Prism`](crate::optics::Prism).
pub mod action {
    use std::fmt::Debug;

    /// Capability bound for every action type.
    ///
    /// Blanket-implemented for any type that is cloneable, comparable,
    /// debuggable and thread-safe. Deriving `Clone, Debug, PartialEq` on an
    /// action enum is all that is required.
    pub trait Action: Clone + PartialEq + Debug + Send + Sync + 'static {}

    impl<T> Action for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}
}

/// Reducer module - the core trait for business logic
///
/// Reducers are pure functions: `(State, Action) → State`.
///
/// They hold all state-transition logic, are deterministic, and perform no
/// I/O. Anything effectful belongs in an [`Epic`](crate::epic::Epic).
pub mod reducer {
    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    ///
    /// # Example
    ///
    /// ```
    /// use epicstore_core::reducer::Reducer;
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// enum CounterAction {
    ///     Increment,
    ///     Decrement,
    /// }
    ///
    /// struct CounterReducer;
    ///
    /// impl Reducer for CounterReducer {
    ///     type State = i64;
    ///     type Action = CounterAction;
    ///
    ///     fn reduce(&self, state: &mut i64, action: &CounterAction) {
    ///         match action {
    ///             CounterAction::Increment => *state += 1,
    ///             CounterAction::Decrement => *state -= 1,
    ///         }
    ///     }
    /// }
    ///
    /// let mut count = 0;
    /// CounterReducer.reduce(&mut count, &CounterAction::Increment);
    /// assert_eq!(count, 1);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Reduce an action into the held state
        ///
        /// Must be total and free of side effects: the result may depend
        /// only on `state` and `action`.
        fn reduce(&self, state: &mut Self::State, action: &Self::Action);
    }

    /// A type-erased reducer, as accepted by
    /// [`combine_reducers`](crate::composition::combine_reducers) and the store.
    pub type BoxedReducer<S, A> = Box<dyn Reducer<State = S, Action = A> + Send + Sync>;

    impl<S, A> Reducer for BoxedReducer<S, A> {
        type State = S;
        type Action = A;

        fn reduce(&self, state: &mut S, action: &A) {
            (**self).reduce(state, action);
        }
    }
}

// Re-export commonly used types
pub use action::Action;
pub use epic::{Epic, StateStream, combine_epics, effect, empty_effect};
pub use optics::{Lens, Prism};
pub use reducer::{BoxedReducer, Reducer};
pub use stream::{Observer, Stream, Subject, Subscription};
