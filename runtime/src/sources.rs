//! Tokio-backed async sources for epics.
//!
//! Epics are plain stream transformations, so anything that waits (a timer, a
//! request, an async stream) has to run outside the dispatch call chain. The
//! helpers here spawn that work on the ambient tokio runtime and deliver the
//! results back as ordinary stream emissions, which a registered epic then
//! dispatches synchronously.
//!
//! Every source stops emitting when its [`Subscription`] is dropped; pending
//! tasks are aborted. When no tokio runtime is available the work cannot be
//! started: the value is dropped and an error is logged.
//!
//! # Example
//!
//! ```
//! use epicstore_core::epic::{effect, Epic, StateStream};
//! use epicstore_core::stream::Stream;
//! use epicstore_runtime::sources::AsyncStreamExt;
//! use std::time::Duration;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Action {
//!     Start,
//!     Tick,
//! }
//!
//! let tick_later: Epic<u32, Action> = effect(true, |_: &StateStream<u32>, actions: &Stream<Action>| {
//!     actions
//!         .filter(|action| *action == Action::Start)
//!         .delay(Duration::from_millis(10))
//!         .map(|_| Action::Tick)
//! });
//! assert!(tick_later.dispatch_back());
//! ```

use epicstore_core::stream::{Observer, Stream, Subscription};
use futures::StreamExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Tasks spawned on behalf of one subscription.
#[derive(Default)]
struct Tasks {
    cancelled: AtomicBool,
    handles: Mutex<Vec<AbortHandle>>,
}

impl Tasks {
    fn is_live(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }

    /// Spawn `future` on the current runtime, or log and drop it.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_live() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::error!("No tokio runtime available; dropping async source value");
            return;
        };

        let handle = runtime.spawn(future).abort_handle();
        let mut handles = self.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
    }

    /// Every spawned task has run to completion, or none could be spawned.
    fn is_finished(&self) -> bool {
        self.handles.lock().iter().all(AbortHandle::is_finished)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

/// Deliver `value` unless the owning subscription has been cancelled.
fn deliver<T>(tasks: &Tasks, observer: &Observer<T>, value: T) {
    if tasks.is_live() {
        observer(value);
    }
}

/// Subscription for a one-shot source: finished once its task is done.
fn completion(tasks: Arc<Tasks>) -> Subscription {
    let status = Arc::clone(&tasks);
    Subscription::with_completion(move || tasks.cancel(), move || status.is_finished())
}

/// Async operators on [`Stream`].
pub trait AsyncStreamExt<T> {
    /// Re-emit every value after `duration`.
    ///
    /// Values are delayed independently, so their relative order is kept
    /// only when they arrive further apart than the timer resolution.
    #[must_use]
    fn delay(&self, duration: Duration) -> Stream<T>;

    /// Run `f` for every value on the tokio runtime and emit each `Some`
    /// result.
    ///
    /// Results are emitted in completion order. Returning `None` drops the
    /// value, which is how a failed request is discarded inside an epic.
    #[must_use]
    fn map_async<U, F, Fut>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<U>> + Send + 'static;
}

impl<T: Send + 'static> AsyncStreamExt<T> for Stream<T> {
    fn delay(&self, duration: Duration) -> Stream<T> {
        self.map_async(move |value| async move {
            tokio::time::sleep(duration).await;
            Some(value)
        })
    }

    fn map_async<U, F, Fut>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<U>> + Send + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let tasks = Arc::new(Tasks::default());
            let f = Arc::clone(&f);
            let spawner = Arc::clone(&tasks);
            let upstream = source.subscribe(move |value| {
                let future = f(value);
                let observer = Arc::clone(&observer);
                let owner = Arc::clone(&spawner);
                spawner.spawn(async move {
                    if let Some(output) = future.await {
                        deliver(&owner, &observer, output);
                    }
                });
            });

            Subscription::new(move || {
                drop(upstream);
                tasks.cancel();
            })
        })
    }
}

/// Emit `value` once, `duration` after each subscription.
#[must_use]
pub fn timer<T>(duration: Duration, value: T) -> Stream<T>
where
    T: Clone + Send + Sync + 'static,
{
    Stream::new(move |observer: Observer<T>| {
        let tasks = Arc::new(Tasks::default());
        let owner = Arc::clone(&tasks);
        let value = value.clone();
        tasks.spawn(async move {
            tokio::time::sleep(duration).await;
            deliver(&owner, &observer, value);
        });
        completion(tasks)
    })
}

/// Drive a fresh async stream for every subscription and emit its items.
///
/// A fallible source should yield `Result`s and be finished with
/// [`Stream::recover`] before it joins an epic's output.
#[must_use]
pub fn from_async_stream<T, S, F>(factory: F) -> Stream<T>
where
    T: Send + 'static,
    S: futures::Stream<Item = T> + Send + 'static,
    F: Fn() -> S + Send + Sync + 'static,
{
    Stream::new(move |observer: Observer<T>| {
        let tasks = Arc::new(Tasks::default());
        let owner = Arc::clone(&tasks);
        let items = factory();
        tasks.spawn(async move {
            let mut items = Box::pin(items);
            while let Some(item) = items.next().await {
                if !owner.is_live() {
                    break;
                }
                deliver(&owner, &observer, item);
            }
        });
        completion(tasks)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record<T: Clone + Send + 'static>(stream: &Stream<T>) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = stream.subscribe(move |value| sink.lock().push(value));
        (seen, subscription)
    }

    #[tokio::test]
    async fn test_timer_emits_once_after_duration() {
        let (seen, _subscription) = record(&timer(Duration::from_millis(50), "done"));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(seen.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*seen.lock(), vec!["done"]);
    }

    #[tokio::test]
    async fn test_cancelled_timer_never_fires() {
        let (seen, subscription) = record(&timer(Duration::from_millis(10), 1));

        subscription.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_one_shot_sources_report_finished() {
        let (fired, timer_subscription) = record(&timer(Duration::from_millis(5), 1));
        let (items, stream_subscription) =
            record(&from_async_stream(|| futures::stream::iter(vec![1, 2])));
        assert!(!timer_subscription.is_finished());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*fired.lock(), vec![1]);
        assert_eq!(*items.lock(), vec![1, 2]);
        assert!(timer_subscription.is_finished());
        assert!(stream_subscription.is_finished());
    }

    #[tokio::test]
    async fn test_map_async_never_reports_finished() {
        let source = Stream::from_values(vec![1]);
        let (_seen, subscription) = record(&source.map_async(|n| async move { Some(n) }));

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!subscription.is_finished());
    }

    #[tokio::test]
    async fn test_map_async_drops_none() {
        let source = Stream::from_values(vec![1, 2, 3, 4]);
        let evens = source.map_async(|n| async move { (n % 2 == 0).then_some(n * 10) });
        let (seen, _subscription) = record(&evens);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![20, 40]);
    }

    #[tokio::test]
    async fn test_from_async_stream_replays_per_subscription() {
        let numbers = from_async_stream(|| futures::stream::iter(vec![1, 2, 3]));
        let (first, _a) = record(&numbers);
        let (second, _b) = record(&numbers);

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*first.lock(), vec![1, 2, 3]);
        assert_eq!(*second.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_delay_inside_block_on() {
        tokio_test::block_on(async {
            let delayed = Stream::from_values(vec!["a", "b"]).delay(Duration::from_millis(5));
            let (seen, _subscription) = record(&delayed);

            tokio::time::sleep(Duration::from_millis(50)).await;

            let mut seen = seen.lock().clone();
            seen.sort_unstable();
            assert_eq!(seen, vec!["a", "b"]);
        });
    }

    #[test]
    fn test_without_runtime_values_are_dropped() {
        let (seen, _subscription) = record(&timer(Duration::from_millis(1), 7));
        assert!(seen.lock().is_empty());
    }
}
