//! # Epicstore Runtime
//!
//! Runtime implementation for the epicstore architecture.
//!
//! This crate provides the [`Store`] that owns state and drives reducers and
//! epics, and the [`SubStore`] that mirrors a projection of a parent store.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, applies the reducer, publishes state then action
//! - **SubStore**: Forwards its actions to a parent and mirrors the parent's state
//! - **Async sources**: Tokio-backed bridges that let epics wait on timers and futures
//!
//! ## Dispatch Model
//!
//! `dispatch` is synchronous. The reducer runs under the state write lock,
//! the lock is released, the new state is published to subscribers in
//! subscription order, and then the action is published to epics. If any of
//! those observers dispatches again, the nested dispatch completes fully
//! before the outer one resumes (depth-first).
//!
//! ## Example
//!
//! ```
//! use epicstore_core::composition::reducer_fn;
//! use epicstore_runtime::{StateStore, Store};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! let store = Store::new(
//!     0_i64,
//!     reducer_fn(|count: &mut i64, action: &CounterAction| match action {
//!         CounterAction::Increment => *count += 1,
//!         CounterAction::Decrement => *count -= 1,
//!     }),
//!     Vec::new(),
//! );
//!
//! store.dispatch(CounterAction::Increment);
//! store.dispatch(CounterAction::Increment);
//! store.dispatch(CounterAction::Decrement);
//! assert_eq!(store.state(), 1);
//! ```

/// Metric names and registration
pub mod metrics;

/// Tokio-backed async sources for epics
pub mod sources;

/// The root store and the shared store surface
pub mod store;

/// Derived stores scoped to a projection of a parent
pub mod sub_store;

/// Error types for the store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur when dispatching through an indirect handle
    ///
    /// `Store::dispatch` itself never fails; these surface only where a
    /// dispatch has to reach a store it does not own.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// A weak store handle outlived its store
        ///
        /// Returned by `WeakStore::dispatch` once every strong handle is gone.
        #[error("Store has been dropped")]
        StoreDropped,

        /// A sub-store's parent has been dropped
        ///
        /// The sub-store can no longer reduce anything: its reducer is the
        /// parent. Returned by `SubStore::try_dispatch`.
        #[error("Parent of sub-store `{label}` has been dropped")]
        ParentDropped {
            /// Label of the detached sub-store
            label: String,
        },
    }
}

pub use error::StoreError;
pub use store::{StateStore, Store, WeakStore};
pub use sub_store::{SubStore, WeakSubStore};

/// Default nested dispatch depth at which a warning is logged
pub const DEFAULT_DEPTH_WARNING: usize = 32;

/// Configuration for Store behavior
///
/// Groups the diagnostic knobs of a store. None of them change dispatch
/// semantics.
///
/// # Example
///
/// ```
/// use epicstore_runtime::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_label("checkout")
///     .with_depth_warning(8);
///
/// assert_eq!(config.label, "checkout");
/// assert_eq!(config.depth_warning, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Identifies the store in logs and metric labels
    pub label: String,
    /// Nested dispatch depth at which a warning is logged
    ///
    /// Re-entrant dispatch is not bounded; this only makes runaway
    /// epic → dispatch → epic chains visible before the stack overflows.
    pub depth_warning: usize,
}

impl StoreConfig {
    /// Create a configuration with the given label and default thresholds
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            depth_warning: DEFAULT_DEPTH_WARNING,
        }
    }

    /// Set the label used in logs and metrics
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the nested dispatch depth that triggers a warning
    ///
    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_depth_warning(mut self, depth: usize) -> Self {
        self.depth_warning = depth.max(1);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.label, "store");
        assert_eq!(config.depth_warning, DEFAULT_DEPTH_WARNING);
    }

    #[test]
    fn test_depth_warning_is_clamped() {
        let config = StoreConfig::new("orders").with_depth_warning(0);
        assert_eq!(config.depth_warning, 1);
        assert_eq!(config.label, "orders");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(StoreError::StoreDropped.to_string(), "Store has been dropped");
        assert_eq!(
            StoreError::ParentDropped {
                label: "store/sub".into()
            }
            .to_string(),
            "Parent of sub-store `store/sub` has been dropped"
        );
    }
}
