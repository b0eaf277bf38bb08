//! Multi-tier read-path cache for the trading back office.
//!
//! Position calculation, inventory lookups, and risk dashboards share
//! one cache with two storage tiers:
//!
//! - **L1**: a bounded in-process byte-map with per-entry TTL and
//!   priority-aware eviction
//! - **L2**: a shared store (Redis in production) reachable over the
//!   network, with pattern scans and the atomic primitives the
//!   stampede lock needs
//!
//! Reads consult L1 first and promote L2 hits into L1 under a short
//! promotion TTL. Full misses either return nothing or, through
//! [`TieredCache::get_with_fallback`], compute the value under a
//! distributed per-key lock so concurrent callers do not stampede the
//! underlying computation.
//!
//! The cache is advisory by contract: a missing or stale value can cost
//! latency, never correctness, and no cache-internal fault ever fails a
//! caller's operation.
//!
//! # Examples
//!
//! ```
//! use trading_cache::{CacheConfig, MemoryStore, TieredCache};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let config = CacheConfig::new().with_key_prefix("oiltrade");
//! let cache = TieredCache::with_distributed(config, Arc::new(MemoryStore::new()));
//!
//! cache.set("position:net:BRENT", &1250.5_f64, None).await;
//! let net: Option<f64> = cache.get("position:net:BRENT").await;
//! assert_eq!(net, Some(1250.5));
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
pub mod health;
pub mod key;
pub mod local;
pub mod lock;
pub mod redis_backend;
pub mod statistics;
pub mod tiered;

pub use backend::{DistributedStore, MemoryStore};
pub use config::CacheConfig;
pub use entry::EvictionPriority;
pub use error::{CacheError, Result};
pub use health::{HealthStatus, TierHealth};
pub use key::KeyBuilder;
pub use local::LocalStore;
pub use lock::{LockLease, StampedeLock};
pub use redis_backend::RedisStore;
pub use statistics::{CacheStatistics, TierStatistics};
pub use tiered::{CacheLayer, TieredCache, WarmupEntry, WarmupRequest};
