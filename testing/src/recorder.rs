//! Recording stream and store emissions for assertions.

use epicstore_core::stream::{Stream, Subscription};
use epicstore_runtime::StateStore;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Collects every value a stream emits while the recorder is alive.
///
/// Dropping the recorder unsubscribes it.
///
/// # Example
///
/// ```
/// use epicstore_core::stream::Subject;
/// use epicstore_testing::Recorder;
///
/// let subject = Subject::new();
/// let recorder = Recorder::record(&subject.stream());
///
/// subject.publish(1);
/// subject.publish(2);
///
/// recorder.assert_recorded(&[1, 2]);
/// ```
pub struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
    _subscription: Subscription,
}

impl<T> fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("recorded", &self.values.lock().len())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    /// Subscribe to `stream` and start recording.
    #[must_use]
    pub fn record(stream: &Stream<T>) -> Self {
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&values);
        let subscription = stream.subscribe(move |value| sink.lock().push(value));
        Self {
            values,
            _subscription: subscription,
        }
    }

    /// Record every action `store` publishes to its epics.
    #[must_use]
    pub fn actions<St>(store: &St) -> Self
    where
        St: StateStore<Action = T>,
    {
        Self::record(&store.actions())
    }

    /// Record every state `store` publishes, repeats included.
    #[must_use]
    pub fn states<St>(store: &St) -> Self
    where
        T: Sync,
        St: StateStore<State = T>,
    {
        Self::record(store.state_stream().changes())
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<T> {
        self.values.lock().clone()
    }

    /// Number of recorded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Forget everything recorded so far and keep recording.
    pub fn clear(&self) {
        self.values.lock().clear();
    }

    /// Assert the exact recorded sequence
    ///
    /// # Panics
    ///
    /// Panics if the recorded values differ from `expected`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_recorded(&self, expected: &[T])
    where
        T: PartialEq + fmt::Debug,
    {
        let recorded = self.recorded();
        assert_eq!(recorded, expected, "Recorded values did not match");
    }

    /// Assert that `value` was never recorded
    ///
    /// # Panics
    ///
    /// Panics if `value` was recorded.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_never(&self, value: &T)
    where
        T: PartialEq + fmt::Debug,
    {
        let recorded = self.recorded();
        assert!(
            !recorded.contains(value),
            "Expected {value:?} never to be recorded, got {recorded:?}"
        );
    }
}
