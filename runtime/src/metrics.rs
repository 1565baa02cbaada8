//! Metric names and descriptions for the store runtime.
//!
//! The runtime records through the [`metrics`] facade only; installing a
//! recorder or exporter is left to the application. Without one, every
//! recording below is a no-op.
//!
//! # Example
//!
//! ```
//! use epicstore_runtime::metrics;
//!
//! // Attach descriptions once, after installing a recorder.
//! metrics::register_metrics();
//! ```

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Actions dispatched, labelled by `store`.
pub const DISPATCH_TOTAL: &str = "epicstore_dispatch_total";

/// Reducer execution time per dispatch, labelled by `store`.
pub const REDUCER_DURATION: &str = "epicstore_reducer_duration_seconds";

/// Epics currently registered, labelled by `store`.
pub const EPICS_ACTIVE: &str = "epicstore_epics_active";

/// Parent state emissions mirrored into a sub-store, labelled by `store`.
pub const PARENT_SYNC_TOTAL: &str = "epicstore_parent_sync_total";

/// Describe every runtime metric to the installed recorder.
pub fn register_metrics() {
    // Dispatch Metrics
    describe_counter!(
        DISPATCH_TOTAL,
        Unit::Count,
        "Total number of actions dispatched to a store"
    );
    describe_histogram!(
        REDUCER_DURATION,
        Unit::Seconds,
        "Time taken to run the reducer for a single action"
    );

    // Epic Metrics
    describe_gauge!(
        EPICS_ACTIVE,
        Unit::Count,
        "Number of epics currently registered with a store"
    );

    // Sub-store Metrics
    describe_counter!(
        PARENT_SYNC_TOTAL,
        Unit::Count,
        "Total number of parent state changes mirrored into a sub-store"
    );
}
