//! Fanning writes and reads out to several in-memory stores.
//!
//! Run with:
//! ```sh
//! RUST_LOG=kvcombine=debug cargo run --example combiner --features="memory"
//! ```

use futures::future::join_all;
use kvcombine::{Combiner, CombinerOptions, GetPolicy, MemoryStore, Store, UpdatePolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user: String,
    roles: Vec<String>,
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let stores = [MemoryStore::new(), MemoryStore::new(), MemoryStore::new()];

    // Options usually come from a config file.
    let options: CombinerOptions = serde_json::from_str(
        r#"{
            "set_policy": "ParallelWaitAll",
            "get_policy": "SequentialWaitAll",
            "delete_policy": "SequentialWaitNoError",
            "max_concurrency": 2
        }"#,
    )?;
    let combiner = Combiner::new(options, stores.iter().cloned().map(Ok))?;

    let session = Session {
        user: "alice".to_string(),
        roles: vec!["admin".to_string()],
    };
    combiner.set("session:alice", &session).await?;
    for (i, store) in stores.iter().enumerate() {
        println!("store {i} has session:alice: {}", store.contains_key("session:alice"));
    }

    // Reads are independent, so several can be in flight at once
    let keys = ["session:alice", "session:bob"];
    let reads = join_all(keys.iter().map(|key| combiner.get::<Session>(key))).await;
    for (key, read) in keys.iter().zip(reads) {
        println!("{key}: {:?}", read?);
    }

    // A store drifting out of sync is reported, not hidden
    stores[2].set("session:alice", &Session {
        user: "mallory".to_string(),
        roles: Vec::new(),
    })
    .await?;
    match combiner.get::<Session>("session:alice").await {
        Ok(value) => println!("unexpected agreement: {value:?}"),
        Err(e) => println!("read refused: {e}"),
    }

    // A lenient reader returns the first hit instead
    let lenient = Combiner::builder()
        .add_backend(stores[2].clone())
        .add_backend(stores[0].clone())
        .get_policy(GetPolicy::SequentialWaitResult)
        .set_policy(UpdatePolicy::SequentialWaitFirst)
        .build()?;
    println!(
        "lenient read: {:?}",
        lenient.get::<Session>("session:alice").await?
    );

    combiner.delete("session:alice").await?;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    println!(
        "entries left: {}",
        stores.iter().map(MemoryStore::len).sum::<usize>()
    );

    combiner.close().await?;
    Ok(())
}
