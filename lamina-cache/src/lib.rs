//! Lamina Cache - Resilient Cache-Aside Layer
//!
//! A multi-level cache-aside layer that sits between application code and a
//! slow or expensive source of truth, backed by a shared remote store and an
//! optional in-process tier.
//!
//! # Design Philosophy
//!
//! - **Cache-aside, explicitly**: callers hand the coordinator a loader; the
//!   coordinator decides when it runs. Population happens only after a
//!   successful source load, never implicitly on a remote hit.
//! - **One load per miss**: concurrent callers for the same key share a
//!   single source load. The load runs detached, so one caller giving up
//!   never starves the rest.
//! - **Failures have two colors**: transient backend failures are retried
//!   within a bounded attempt budget; permanent ones either fail the call or
//!   route it straight to the source, depending on the caller's options.
//! - **Absence is cacheable**: a loader that finds nothing can have that
//!   nothing cached as a marker, or have the key dropped, per call.
//!
//! # Example
//!
//! ```ignore
//! use lamina_cache::{CacheCoordinator, MemoryRemoteStore, RemoteBackend, RetryExecutor, TieredCache};
//! use lamina_core::CacheOptions;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(MemoryRemoteStore::new());
//! let remote = Arc::new(RemoteBackend::new(store));
//! let cache = Arc::new(TieredCache::remote_only(remote, RetryExecutor::default()));
//! let coordinator = CacheCoordinator::new(cache);
//!
//! let options = CacheOptions::new().with_absolute_ttl(Duration::from_secs(600));
//! let category: Option<Category> = coordinator
//!     .get_or_load("category:42", &options, |_key| async move {
//!         Ok(Some(fetch_category_from_database(42).await?))
//!     })
//!     .await?;
//! ```

pub mod backend;
pub mod classify;
pub mod coordinator;
mod flight;
pub mod memory;
pub mod remote;
pub mod retry;
pub mod tiered;

pub use backend::{CacheBackend, CacheStats, WriteMode};
pub use classify::{FailureClassification, TransientErrorClassifier};
pub use coordinator::CacheCoordinator;
pub use memory::{run_purge_task, MemoryBackend};
pub use remote::{MemoryRemoteStore, RemoteBackend, RemoteStore, RemoteStoreError, StoreOp};
pub use retry::RetryExecutor;
pub use tiered::{TieredCache, TieredStats};
