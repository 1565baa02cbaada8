//! Dispatch Benchmarks
//!
//! Measures the synchronous hot path of the store:
//! - Reducer execution through a bare `Store`
//! - Fan-out cost as state subscribers are added
//! - Epic feedback (one nested dispatch per action)
//! - Sub-store dispatch, which round-trips through the parent
//!
//! Run with: `cargo bench --bench dispatch_benchmarks`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use epicstore_core::epic::effect;
use epicstore_core::reducer::Reducer;
use epicstore_core::stream::Stream;
use epicstore_runtime::{StateStore, Store};

#[derive(Clone, Debug, Default, PartialEq)]
struct BenchState {
    counter: i64,
    data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
enum BenchAction {
    Increment,
    Decrement,
    Ping,
    Pong,
}

struct BenchReducer;

impl Reducer for BenchReducer {
    type State = BenchState;
    type Action = BenchAction;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        match action {
            BenchAction::Increment | BenchAction::Pong => state.counter += 1,
            BenchAction::Decrement => state.counter -= 1,
            BenchAction::Ping => {},
        }
    }
}

fn bench_state() -> BenchState {
    BenchState {
        counter: 0,
        data: vec![0; 1024],
    }
}

fn benchmark_reducer_execution(c: &mut Criterion) {
    let reducer = BenchReducer;

    c.bench_function("reducer_increment", |b| {
        let mut state = bench_state();
        b.iter(|| reducer.reduce(black_box(&mut state), black_box(&BenchAction::Increment)));
    });
}

fn benchmark_store_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_dispatch");
    group.throughput(Throughput::Elements(1));

    for subscribers in [0_usize, 1, 8] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &subscribers| {
                let store = Store::new(bench_state(), BenchReducer, Vec::new());
                let _subscriptions: Vec<_> = (0..subscribers)
                    .map(|_| {
                        store.subscribe(|state| {
                            black_box(state.counter);
                        })
                    })
                    .collect();

                b.iter(|| store.dispatch(black_box(BenchAction::Increment)));
            },
        );
    }

    group.finish();
}

fn benchmark_epic_feedback(c: &mut Criterion) {
    let pong = effect(true, |_, actions: &Stream<BenchAction>| {
        actions
            .filter(|action| *action == BenchAction::Ping)
            .map(|_| BenchAction::Pong)
    });
    let store = Store::new(bench_state(), BenchReducer, vec![pong]);

    c.bench_function("epic_ping_pong", |b| {
        b.iter(|| store.dispatch(black_box(BenchAction::Ping)));
    });
}

fn benchmark_sub_store_dispatch(c: &mut Criterion) {
    let store = Store::new(bench_state(), BenchReducer, Vec::new());
    let counter = store.sub_store(
        |state: &BenchState| state.counter,
        |action: BenchAction| action,
        Vec::new(),
    );

    c.bench_function("sub_store_dispatch", |b| {
        b.iter(|| counter.dispatch(black_box(BenchAction::Decrement)));
    });
}

criterion_group!(
    benches,
    benchmark_reducer_execution,
    benchmark_store_throughput,
    benchmark_epic_feedback,
    benchmark_sub_store_dispatch
);
criterion_main!(benches);
