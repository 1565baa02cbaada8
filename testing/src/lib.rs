//! # Epicstore Testing
//!
//! Testing utilities and helpers for the epicstore architecture.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then assertions for reducers
//! - [`Recorder`]: capture what a stream or store emits
//! - Property-based testing strategies for action sequences
//! - Tracing setup for tests
//!
//! ## Example
//!
//! ```
//! use epicstore_core::composition::reducer_fn;
//! use epicstore_runtime::{StateStore, Store};
//! use epicstore_testing::Recorder;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Action {
//!     Add(u32),
//! }
//!
//! let store = Store::new(0, reducer_fn(|sum: &mut u32, Action::Add(n): &Action| *sum += n), Vec::new());
//! let states = Recorder::states(&store);
//! let actions = Recorder::actions(&store);
//!
//! store.dispatch(Action::Add(2));
//! store.dispatch(Action::Add(3));
//!
//! states.assert_recorded(&[2, 5]);
//! actions.assert_recorded(&[Action::Add(2), Action::Add(3)]);
//! ```

/// Recording stream and store emissions
pub mod recorder;


/// Test helpers and utilities
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every
    /// test; only the first call installs anything.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use epicstore_core::reducer::Reducer;
    use proptest::collection::vec;
    use proptest::strategy::Strategy;

    /// Strategy for sequences of up to `max_len` actions drawn from `action`.
    pub fn action_sequence<S>(action: S, max_len: usize) -> impl Strategy<Value = Vec<S::Value>>
    where
        S: Strategy,
    {
        vec(action, 0..=max_len)
    }

    /// Fold `actions` through `reducer`, starting from `initial`.
    ///
    /// The reference result a store must agree with after dispatching the
    /// same actions.
    pub fn replay<R>(reducer: &R, initial: R::State, actions: &[R::Action]) -> R::State
    where
        R: Reducer,
    {
        let mut state = initial;
        for action in actions {
            reducer.reduce(&mut state, action);
        }
        state
    }
}

// Re-export commonly used items
pub use helpers::init_tracing;
pub use properties::{action_sequence, replay};
pub use recorder::Recorder;
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use epicstore_core::composition::reducer_fn;

    #[test]
    fn test_replay_folds_in_order() {
        let reducer = reducer_fn(|log: &mut String, c: &char| log.push(*c));
        assert_eq!(replay(&reducer, String::new(), &['a', 'b', 'c']), "abc");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
