//! Minimal push-based stream primitive.
//!
//! Everything in epicstore is wired with three types:
//!
//! - [`Subject`]: a hot multicast source. `publish` delivers a value to every
//!   current observer, synchronously, in subscription order.
//! - [`Stream`]: a cold description of "how to subscribe". Operators such as
//!   [`Stream::map`] build a new description; nothing runs until someone
//!   subscribes, and each subscription gets its own operator state.
//! - [`Subscription`]: an RAII cancellation token. Dropping it detaches the
//!   observer.
//!
//! Streams never fail. Fallible sources are converted into plain values with
//! [`Stream::recover`] before they reach a store. Most streams never complete
//! either; one-shot sources report completion through
//! [`Subscription::is_finished`] so that [`Stream::flat_map`] can release them.
//!
//! # Re-entrancy
//!
//! No lock is held while an observer runs. An observer may publish into the
//! same subject it is observing; the nested value is delivered depth-first
//! before the outer delivery resumes.
//!
//! # Example
//!
//! ```
//! use epicstore_core::stream::Subject;
//! use std::sync::{Arc, Mutex};
//!
//! let subject = Subject::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let _subscription = subject
//!     .stream()
//!     .map(|n: i32| n * 10)
//!     .distinct_until_changed()
//!     .subscribe(move |n| sink.lock().unwrap().push(n));
//!
//! subject.publish(1);
//! subject.publish(1);
//! subject.publish(2);
//! assert_eq!(*seen.lock().unwrap(), vec![10, 20]);
//! ```

use crate::optics::Prism;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Callback receiving every value a stream emits.
pub type Observer<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Cancellation token for a stream subscription.
///
/// Cancelling (or dropping) the token stops future deliveries to the
/// observer. A value already being delivered when the token is dropped may
/// still reach the observer; nothing is rolled back.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
    finished: Option<Box<dyn Fn() -> bool + Send>>,
}

impl Subscription {
    /// Create a subscription that runs `cancel` exactly once when cancelled
    /// or dropped.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
            finished: None,
        }
    }

    /// Like [`Subscription::new`], for a source that eventually stops
    /// emitting on its own. `finished` reports whether it has.
    pub fn with_completion<F, D>(cancel: F, finished: D) -> Self
    where
        F: FnOnce() + Send + 'static,
        D: Fn() -> bool + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
            finished: Some(Box::new(finished)),
        }
    }

    /// A subscription with nothing to cancel.
    pub const fn empty() -> Self {
        Self {
            cancel: None,
            finished: None,
        }
    }

    /// Whether the source is known to emit nothing more.
    ///
    /// An empty subscription is finished. One built with
    /// [`Subscription::new`] never reports itself finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.finished {
            Some(finished) => finished(),
            None => self.cancel.is_none(),
        }
    }

    /// Bundle several subscriptions into one; cancelling it cancels all of
    /// them in order.
    pub fn composite<I>(subscriptions: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let subscriptions: Vec<Self> = subscriptions.into_iter().collect();
        Self::new(move || drop(subscriptions))
    }

    /// Cancel the subscription now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct ObserverList<T> {
    next_id: u64,
    entries: Vec<(u64, Observer<T>)>,
}

/// Hot multicast source.
///
/// Cloning a `Subject` yields another handle to the same observer list.
pub struct Subject<T> {
    observers: Arc<Mutex<ObserverList<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.observers.lock().entries.len())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// Create a subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Arc::new(Mutex::new(ObserverList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Deliver `value` to every current observer, in subscription order.
    ///
    /// The observer list is snapshotted first, so observers added or removed
    /// during delivery take effect from the next publish.
    pub fn publish(&self, value: T) {
        let observers: SmallVec<[Observer<T>; 4]> = self
            .observers
            .lock()
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        let Some((last, rest)) = observers.split_last() else {
            return;
        };
        for observer in rest {
            observer(value.clone());
        }
        last(value);
    }

    /// Attach an observer closure.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_observer(Arc::new(observer))
    }

    /// Attach an already shared observer.
    ///
    /// The returned subscription removes the entry by key; it holds only a
    /// weak reference to the subject, so it never keeps the subject alive.
    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        let id = {
            let mut list = self.observers.lock();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, observer));
            id
        };

        let observers = Arc::downgrade(&self.observers);
        Subscription::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers.lock().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Number of currently attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().entries.len()
    }

    /// A stream view of this subject.
    ///
    /// The stream does not keep the subject alive; subscribing after the
    /// last `Subject` handle is gone yields a subscription that never fires.
    #[must_use]
    pub fn stream(&self) -> Stream<T> {
        let observers = Arc::downgrade(&self.observers);
        Stream::new(move |observer| match observers.upgrade() {
            Some(observers) => Self { observers }.subscribe_observer(observer),
            None => Subscription::empty(),
        })
    }
}

type SubscribeFn<T> = dyn Fn(Observer<T>) -> Subscription + Send + Sync;

/// Cold, composable description of a push-based sequence.
pub struct Stream<T> {
    subscribe_fn: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: Arc::clone(&self.subscribe_fn),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Stream<T> {
    /// Build a stream from its subscribe function.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Observer<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            subscribe_fn: Arc::new(subscribe),
        }
    }

    /// A stream that never emits.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|_| Subscription::empty())
    }

    /// A stream that synchronously emits `values` to each new subscriber.
    #[must_use]
    pub fn from_values(values: Vec<T>) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move |observer| {
            for value in &values {
                observer(value.clone());
            }
            Subscription::empty()
        })
    }

    /// Subscribe with a closure.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_observer(Arc::new(observer))
    }

    /// Subscribe with an already shared observer.
    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        (self.subscribe_fn)(observer)
    }

    /// Transform every value.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let f = Arc::clone(&f);
            source.subscribe(move |value| observer(f(value)))
        })
    }

    /// Keep only values matching `predicate`.
    #[must_use]
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Self::new(move |observer: Observer<T>| {
            let predicate = Arc::clone(&predicate);
            source.subscribe(move |value| {
                if predicate(&value) {
                    observer(value);
                }
            })
        })
    }

    /// Transform and filter in one step.
    #[must_use]
    pub fn filter_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let f = Arc::clone(&f);
            source.subscribe(move |value| {
                if let Some(mapped) = f(value) {
                    observer(mapped);
                }
            })
        })
    }

    /// Narrow a stream of parent actions to one variant.
    #[must_use]
    pub fn of_type<C>(&self, prism: Prism<T, C>) -> Stream<C>
    where
        C: Send + 'static,
    {
        self.filter_map(move |value| prism.extract(&value))
    }

    /// Run `f` on every value without changing the stream.
    #[must_use]
    pub fn inspect<F>(&self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Self::new(move |observer: Observer<T>| {
            let f = Arc::clone(&f);
            source.subscribe(move |value| {
                f(&value);
                observer(value);
            })
        })
    }

    /// Drop the first `count` values of each subscription.
    #[must_use]
    pub fn skip(&self, count: usize) -> Self {
        let source = self.clone();
        Self::new(move |observer: Observer<T>| {
            let seen = AtomicUsize::new(0);
            source.subscribe(move |value| {
                if seen.fetch_add(1, Ordering::AcqRel) >= count {
                    observer(value);
                }
            })
        })
    }

    /// Emit `value` to each subscriber before anything from the source.
    #[must_use]
    pub fn start_with(&self, value: T) -> Self
    where
        T: Clone + Sync,
    {
        let source = self.clone();
        Self::new(move |observer: Observer<T>| {
            observer(value.clone());
            source.subscribe_observer(observer)
        })
    }

    /// Suppress values equal to the previous emission of the same
    /// subscription.
    #[must_use]
    pub fn distinct_until_changed(&self) -> Self
    where
        T: Clone + PartialEq,
    {
        let source = self.clone();
        Self::new(move |observer: Observer<T>| {
            let last: Mutex<Option<T>> = Mutex::new(None);
            source.subscribe(move |value| {
                {
                    let mut last = last.lock();
                    if last.as_ref() == Some(&value) {
                        return;
                    }
                    *last = Some(value.clone());
                }
                observer(value);
            })
        })
    }

    /// Fan in several streams.
    ///
    /// Each source keeps its own emission order; no ordering is defined
    /// between sources beyond "whichever emits first is delivered first".
    #[must_use]
    pub fn merge_all(streams: Vec<Self>) -> Self {
        Self::new(move |observer: Observer<T>| {
            Subscription::composite(
                streams
                    .iter()
                    .map(|stream| stream.subscribe_observer(Arc::clone(&observer))),
            )
        })
    }

    /// Fan in `self` and `other`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self::merge_all(vec![self.clone(), other.clone()])
    }

    /// Map every value to an inner stream and merge all inner streams.
    ///
    /// Inner subscriptions stay alive until the outer subscription is
    /// cancelled or, for sources that complete (see
    /// [`Subscription::is_finished`]), until they have finished. Finished
    /// inners are released whenever the next outer value arrives.
    #[must_use]
    pub fn flat_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Stream<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let inner: Arc<Mutex<Vec<Subscription>>> = Arc::default();
            let f = Arc::clone(&f);
            let active = Arc::clone(&inner);
            let outer = source.subscribe(move |value| {
                let subscription = f(value).subscribe_observer(Arc::clone(&observer));
                let released: Vec<Subscription> = {
                    let mut active = active.lock();
                    let (mut done, live): (Vec<_>, Vec<_>) = std::mem::take(&mut *active)
                        .into_iter()
                        .partition(Subscription::is_finished);
                    *active = live;
                    if subscription.is_finished() {
                        done.push(subscription);
                    } else {
                        active.push(subscription);
                    }
                    done
                };
                drop(released);
            });
            Subscription::new(move || {
                drop(outer);
                let subscriptions = std::mem::take(&mut *inner.lock());
                drop(subscriptions);
            })
        })
    }
}

impl<T, E> Stream<Result<T, E>>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Convert a fallible stream into an infallible one.
    ///
    /// `Ok` values pass through. Each `Err` is logged and handed to
    /// `handler`, which may turn it into a value (typically a failure action)
    /// or return `None` to drop it.
    #[must_use]
    pub fn recover<F>(&self, handler: F) -> Stream<T>
    where
        F: Fn(E) -> Option<T> + Send + Sync + 'static,
    {
        self.filter_map(move |result| match result {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(error = %error, "Recovered error inside stream");
                handler(error)
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn collect<T: Clone + Send + 'static>(stream: &Stream<T>) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = stream.subscribe(move |value| sink.lock().push(value));
        (seen, subscription)
    }

    #[test]
    fn test_publish_reaches_observers_in_subscription_order() {
        let subject = Subject::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _a = subject.subscribe(move |n: i32| first.lock().push(("a", n)));
        let second = Arc::clone(&order);
        let _b = subject.subscribe(move |n: i32| second.lock().push(("b", n)));

        subject.publish(1);
        subject.publish(2);

        assert_eq!(*order.lock(), vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn test_dropping_subscription_detaches_observer() {
        let subject = Subject::new();
        let (seen, subscription) = collect(&subject.stream());

        subject.publish(1);
        assert_eq!(subject.observer_count(), 1);
        drop(subscription);
        assert_eq!(subject.observer_count(), 0);
        subject.publish(2);

        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn test_subscription_outlives_subject_harmlessly() {
        let subject = Subject::<i32>::new();
        let subscription = subject.subscribe(|_| {});
        drop(subject);
        subscription.cancel();
    }

    #[test]
    fn test_stream_view_does_not_keep_subject_alive() {
        let subject = Subject::<i32>::new();
        let stream = subject.stream();
        drop(subject);
        let (seen, _subscription) = collect(&stream);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_nested_publish_is_depth_first() {
        let subject = Subject::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let echo = subject.clone();
        let log = Arc::clone(&order);
        let _reentrant = subject.subscribe(move |n: i32| {
            log.lock().push(format!("first:{n}"));
            if n == 1 {
                echo.publish(2);
            }
        });
        let log = Arc::clone(&order);
        let _second = subject.subscribe(move |n: i32| log.lock().push(format!("second:{n}")));

        subject.publish(1);

        assert_eq!(
            *order.lock(),
            vec!["first:1", "first:2", "second:2", "second:1"]
        );
    }

    #[test]
    fn test_operators_compose() {
        let subject = Subject::new();
        let stream = subject
            .stream()
            .filter(|n: &i32| n % 2 == 0)
            .map(|n| n * 3)
            .skip(1);
        let (seen, _subscription) = collect(&stream);

        for n in 1..=6 {
            subject.publish(n);
        }

        assert_eq!(*seen.lock(), vec![12, 18]);
    }

    #[test]
    fn test_distinct_until_changed_only_suppresses_adjacent_duplicates() {
        let subject = Subject::new();
        let (seen, _subscription) = collect(&subject.stream().distinct_until_changed());

        for n in [1, 1, 2, 2, 1, 3, 3] {
            subject.publish(n);
        }

        assert_eq!(*seen.lock(), vec![1, 2, 1, 3]);
    }

    #[test]
    fn test_start_with_emits_before_source() {
        let subject = Subject::new();
        let (seen, _subscription) = collect(&subject.stream().start_with(0));

        subject.publish(1);

        assert_eq!(*seen.lock(), vec![0, 1]);
    }

    #[test]
    fn test_merge_all_preserves_per_source_order() {
        let left = Subject::new();
        let right = Subject::new();
        let merged = Stream::merge_all(vec![left.stream(), right.stream()]);
        let (seen, subscription) = collect(&merged);

        left.publish("l1");
        right.publish("r1");
        left.publish("l2");
        right.publish("r2");

        assert_eq!(*seen.lock(), vec!["l1", "r1", "l2", "r2"]);

        drop(subscription);
        assert_eq!(left.observer_count(), 0);
        assert_eq!(right.observer_count(), 0);
    }

    #[test]
    fn test_flat_map_merges_inner_streams_until_cancelled() {
        let outer = Subject::new();
        let inner = Subject::new();
        let inner_stream = inner.stream();
        let (seen, subscription) =
            collect(&outer.stream().flat_map(move |_: ()| inner_stream.clone()));

        outer.publish(());
        inner.publish(1);
        outer.publish(());
        inner.publish(2);
        assert_eq!(*seen.lock(), vec![1, 2, 2]);

        drop(subscription);
        assert_eq!(inner.observer_count(), 0);
    }

    #[test]
    fn test_flat_map_releases_finished_inners() {
        let outer = Subject::new();
        let done = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicUsize::new(0));
        let (inner_done, inner_released) = (Arc::clone(&done), Arc::clone(&released));
        let one_shot = Stream::new(move |_: Observer<i32>| {
            let done = Arc::clone(&inner_done);
            let released = Arc::clone(&inner_released);
            Subscription::with_completion(
                move || {
                    released.fetch_add(1, Ordering::SeqCst);
                },
                move || done.load(Ordering::SeqCst),
            )
        });
        let (_seen, _subscription) = collect(&outer.stream().flat_map(move |_: ()| one_shot.clone()));

        for _ in 0..3 {
            outer.publish(());
        }
        assert_eq!(released.load(Ordering::SeqCst), 0);

        done.store(true, Ordering::SeqCst);
        outer.publish(());
        assert_eq!(released.load(Ordering::SeqCst), 4);

        for _ in 0..1000 {
            outer.publish(());
        }
        assert_eq!(released.load(Ordering::SeqCst), 1004);
    }

    #[test]
    fn test_finished_state_of_subscriptions() {
        assert!(Subscription::empty().is_finished());
        assert!(!Subscription::new(|| {}).is_finished());
        assert!(Subscription::with_completion(|| {}, || true).is_finished());
    }

    #[test]
    fn test_from_values_replays_for_every_subscriber() {
        let stream = Stream::from_values(vec![1, 2, 3]);
        let (first, _a) = collect(&stream);
        let (second, _b) = collect(&stream);

        assert_eq!(*first.lock(), vec![1, 2, 3]);
        assert_eq!(*second.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_recover_converts_or_drops_errors() {
        let subject: Subject<Result<i32, String>> = Subject::new();
        let recovered = subject
            .stream()
            .recover(|error| (error == "convert").then_some(-1));
        let (seen, _subscription) = collect(&recovered);

        subject.publish(Ok(1));
        subject.publish(Err("drop".to_string()));
        subject.publish(Err("convert".to_string()));
        subject.publish(Ok(2));

        assert_eq!(*seen.lock(), vec![1, -1, 2]);
    }

    #[test]
    fn test_empty_stream_never_emits() {
        let (seen, _subscription) = collect(&Stream::<i32>::empty());
        assert!(seen.lock().is_empty());
    }
}
