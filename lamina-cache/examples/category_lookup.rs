//! Minimal cache-aside walkthrough over an in-memory remote store.
//!
//! Run with: cargo run -p lamina-cache --example category_lookup

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lamina_cache::{
    CacheBackend, CacheCoordinator, MemoryRemoteStore, RemoteBackend, RemoteStore, RetryExecutor,
    TieredCache,
};
use lamina_core::CacheOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Category {
    id: u32,
    name: String,
}

fn brakes() -> Category {
    Category {
        id: 42,
        name: "Brakes".to_string(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let store = Arc::new(MemoryRemoteStore::new());
    let backend: Arc<dyn CacheBackend> =
        Arc::new(RemoteBackend::new(Arc::clone(&store) as Arc<dyn RemoteStore>));
    let cache = TieredCache::remote_only(backend, RetryExecutor::default());
    let coordinator = CacheCoordinator::new(Arc::new(cache));

    let options = CacheOptions::new().with_absolute_ttl(Duration::from_secs(60));

    // First read misses and consults the source of truth.
    let category: Option<Category> = coordinator
        .get_or_load("category:42", &options, |key| async move {
            println!("loading {} from the source of truth", key);
            Ok(Some(brakes()))
        })
        .await?;
    println!("first read:  {:?}", category);

    // Second read is served from the cache; the loader does not run.
    let category: Option<Category> = coordinator
        .get_or_load("category:42", &options, |key| async move {
            println!("loading {} from the source of truth", key);
            Ok(Some(brakes()))
        })
        .await?;
    println!("second read: {:?}", category);

    coordinator.remove("category:42").await?;
    println!("removed category:42");

    Ok(())
}
