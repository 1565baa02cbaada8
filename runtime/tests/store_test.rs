//! Integration tests for Store dispatch, selection and epic wiring

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use epicstore_core::epic::{combine_epics, effect, Epic, StateStream};
use epicstore_core::reducer::Reducer;
use epicstore_core::stream::Stream;
use epicstore_runtime::{StateStore, Store, StoreConfig};
use epicstore_testing::{Recorder, action_sequence, init_tracing, replay};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum CounterAction {
    Increment,
    Decrement,
    Add(i64),
    Start,
    Echo,
    Audit,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CounterState {
    count: i64,
}

#[derive(Clone)]
struct CounterReducer;

impl Reducer for CounterReducer {
    type State = CounterState;
    type Action = CounterAction;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        match action {
            CounterAction::Increment => state.count += 1,
            CounterAction::Decrement => state.count -= 1,
            CounterAction::Add(n) => state.count += n,
            CounterAction::Start | CounterAction::Echo | CounterAction::Audit => {},
        }
    }
}

type CounterStore = Store<CounterState, CounterAction>;

fn counter_store(epics: Vec<Epic<CounterState, CounterAction>>) -> CounterStore {
    init_tracing();
    Store::new(CounterState::default(), CounterReducer, epics)
}

fn echo_epic(dispatch_back: bool) -> Epic<CounterState, CounterAction> {
    effect(dispatch_back, |_, actions: &Stream<CounterAction>| {
        actions
            .filter(|action| *action == CounterAction::Start)
            .map(|_| CounterAction::Echo)
    })
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_counter_scenario() {
    let store = counter_store(Vec::new());
    let states = Recorder::states(&store);

    store.dispatch(CounterAction::Increment);
    store.dispatch(CounterAction::Increment);
    store.dispatch(CounterAction::Decrement);

    let counts: Vec<i64> = states.recorded().iter().map(|state| state.count).collect();
    assert_eq!(counts, vec![1, 2, 1]);
    assert_eq!(store.state().count, 1);
}

#[test]
fn test_subscribers_notified_in_subscription_order() {
    let store = counter_store(Vec::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&log);
    let _a = store.subscribe(move |state| first.lock().unwrap().push(("first", state.count)));
    let second = Arc::clone(&log);
    let _b = store.subscribe(move |state| second.lock().unwrap().push(("second", state.count)));

    store.dispatch(CounterAction::Add(3));

    assert_eq!(*log.lock().unwrap(), vec![("first", 3), ("second", 3)]);
}

#[test]
fn test_nested_dispatch_is_depth_first() {
    let store = counter_store(Vec::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let weak = store.downgrade();
    let a = Arc::clone(&log);
    let _a = store.subscribe(move |state| {
        a.lock().unwrap().push(format!("a:{}", state.count));
        if state.count == 1 {
            weak.dispatch(CounterAction::Add(10)).unwrap();
        }
    });
    let b = Arc::clone(&log);
    let _b = store.subscribe(move |state| b.lock().unwrap().push(format!("b:{}", state.count)));
    let actions = Arc::clone(&log);
    let _actions = store
        .actions()
        .subscribe(move |action| actions.lock().unwrap().push(format!("action:{action:?}")));

    store.dispatch(CounterAction::Increment);

    // The nested dispatch finishes before the outer one resumes, so `b` sees
    // the newer state first.
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "a:1",
            "a:11",
            "b:11",
            "action:Add(10)",
            "b:1",
            "action:Increment",
        ]
    );
    assert_eq!(store.state().count, 11);
}

#[test]
fn test_deep_reentrant_chain_completes_past_depth_warning() {
    init_tracing();
    let store = Store::with_config(
        CounterState::default(),
        CounterReducer,
        Vec::new(),
        StoreConfig::new("deep").with_depth_warning(2),
    );
    let chain = effect(true, |_, actions: &Stream<CounterAction>| {
        actions.filter_map(|action| match action {
            CounterAction::Add(n) if n < 5 => Some(CounterAction::Add(n + 1)),
            _ => None,
        })
    });
    let _chain = store.register(chain);

    store.dispatch(CounterAction::Add(1));

    assert_eq!(store.state().count, 1 + 2 + 3 + 4 + 5);
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_select_emits_current_then_changes() {
    let store = counter_store(Vec::new());
    store.dispatch(CounterAction::Add(4));

    let positive = Recorder::record(&store.select(|state: &CounterState| state.count > 0));

    store.dispatch(CounterAction::Increment);
    store.dispatch(CounterAction::Add(-10));
    store.dispatch(CounterAction::Start);
    store.dispatch(CounterAction::Add(20));

    positive.assert_recorded(&[true, false, true]);
}

proptest! {
    #[test]
    fn prop_select_dedupes_unchanged_projection(deltas in action_sequence(-3_i64..=3, 24)) {
        let store = counter_store(Vec::new());
        let parity = Recorder::record(&store.select(|state: &CounterState| state.count.rem_euclid(2)));

        for delta in &deltas {
            store.dispatch(CounterAction::Add(*delta));
        }

        let mut expected = vec![0];
        let mut count = 0;
        for delta in &deltas {
            count += delta;
            let projected = count.rem_euclid(2);
            if expected.last() != Some(&projected) {
                expected.push(projected);
            }
        }
        prop_assert_eq!(parity.recorded(), expected);
    }

    #[test]
    fn prop_store_agrees_with_replayed_reducer(deltas in action_sequence(-100_i64..=100, 32)) {
        let store = counter_store(Vec::new());
        let actions: Vec<CounterAction> = deltas.into_iter().map(CounterAction::Add).collect();

        for action in &actions {
            store.dispatch(action.clone());
        }

        prop_assert_eq!(store.state(), replay(&CounterReducer, CounterState::default(), &actions));
    }
}

// ============================================================================
// Epics
// ============================================================================

#[test]
fn test_suppressed_epic_never_reaches_dispatch_history() {
    let store = counter_store(Vec::new());
    let history = Recorder::actions(&store);

    let audits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&audits);
    let audit = effect(false, move |_, actions: &Stream<CounterAction>| {
        let counter = Arc::clone(&counter);
        actions
            .filter(|action| *action == CounterAction::Start)
            .map(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                CounterAction::Audit
            })
    });
    let _epics = store.register(combine_epics(true, vec![audit, echo_epic(true)]));

    store.dispatch(CounterAction::Start);

    history.assert_recorded(&[CounterAction::Start, CounterAction::Echo]);
    history.assert_never(&CounterAction::Audit);
    assert_eq!(audits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_outer_dispatch_back_false_discards_combined_output() {
    let store = counter_store(Vec::new());
    let history = Recorder::actions(&store);
    let _epics = store.register(combine_epics(false, vec![echo_epic(true)]));

    store.dispatch(CounterAction::Start);

    history.assert_recorded(&[CounterAction::Start]);
}

#[test]
fn test_cancelling_registration_stops_only_that_epic() {
    let store = counter_store(Vec::new());
    let history = Recorder::actions(&store);
    let doubled = effect(true, |_, actions: &Stream<CounterAction>| {
        actions
            .filter(|action| *action == CounterAction::Start)
            .map(|_| CounterAction::Increment)
    });

    let echo = store.register(echo_epic(true));
    let increment = store.register(doubled);

    store.dispatch(CounterAction::Start);
    assert_eq!(store.state().count, 1);

    echo.cancel();
    store.dispatch(CounterAction::Start);

    assert_eq!(store.state().count, 2);
    history.assert_recorded(&[
        CounterAction::Start,
        CounterAction::Echo,
        CounterAction::Increment,
        CounterAction::Start,
        CounterAction::Increment,
    ]);
    drop(increment);
}

#[test]
fn test_construction_epics_live_as_long_as_store() {
    let store = counter_store(vec![echo_epic(true)]);
    let history = Recorder::actions(&store);

    store.dispatch(CounterAction::Start);
    store.dispatch(CounterAction::Start);

    // The epic subscribed before the recorder, so its nested dispatch is
    // recorded ahead of the action that triggered it.
    history.assert_recorded(&[
        CounterAction::Echo,
        CounterAction::Start,
        CounterAction::Echo,
        CounterAction::Start,
    ]);
}

#[test]
fn test_construction_epic_may_dispatch_immediately() {
    let bootstrap = effect(true, |_, _: &Stream<CounterAction>| {
        Stream::from_values(vec![CounterAction::Add(42)])
    });

    let store = counter_store(vec![bootstrap]);

    assert_eq!(store.state().count, 42);
}

#[test]
fn test_epic_reads_state_stream() {
    let threshold = effect(true, |state: &StateStream<CounterState>, _: &Stream<CounterAction>| {
        state
            .select(|state: &CounterState| state.count)
            .filter(|count| *count == 3)
            .map(|_| CounterAction::Echo)
    });
    let store = counter_store(vec![threshold]);
    let history = Recorder::actions(&store);

    for _ in 0..4 {
        store.dispatch(CounterAction::Increment);
    }

    history.assert_never(&CounterAction::Start);
    assert_eq!(
        history
            .recorded()
            .iter()
            .filter(|action| **action == CounterAction::Echo)
            .count(),
        1
    );
}

#[test]
fn test_epic_feedback_does_not_keep_store_alive() {
    let store = counter_store(vec![echo_epic(true)]);
    let weak = store.downgrade();

    drop(store);

    assert!(weak.upgrade().is_none());
}
