//! Counter demo binary
//!
//! Drives the app store directly and through its counter sub-store.

use counter::{AppAction, CounterAction, INCREMENT_DELAY, app_store, counter_store};
use epicstore_runtime::StateStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter=info,epicstore_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    epicstore_runtime::metrics::register_metrics();

    println!("=== Counter Demo ===\n");

    let app = app_store();
    let counter = counter_store(&app);

    let _printer = counter.select(|state| state.count).subscribe(|count| {
        println!("count is now {count}");
    });

    println!(">>> app: Increment");
    app.dispatch(AppAction::Counter(CounterAction::Increment));

    println!(">>> counter: Increment x2");
    counter.dispatch(CounterAction::Increment);
    counter.dispatch(CounterAction::Increment);

    println!(">>> counter: Decrement");
    counter.dispatch(CounterAction::Decrement);

    println!(">>> counter: IncrementLater");
    counter.dispatch(CounterAction::IncrementLater);
    tokio::time::sleep(INCREMENT_DELAY * 2).await;

    println!(">>> counter: Increment x8");
    for _ in 0..8 {
        counter.dispatch(CounterAction::Increment);
    }

    println!(">>> counter: Reset");
    counter.try_dispatch(CounterAction::Reset)?;

    let state = app.state();
    println!("\nFinal count: {}", state.counter.count);
    println!("Log: {:?}", state.log);

    Ok(())
}
