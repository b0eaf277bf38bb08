//! Tiered cache facade.
//!
//! Orchestrates the in-process tier (L1) and the distributed tier (L2)
//! into one read-path contract: layered lookups with promotion,
//! write-through sets, pattern invalidation, and stampede-protected
//! fallback computation.
//!
//! The cache is advisory. An internal fault such as an unreachable L2
//! never surfaces as a failure of the caller's operation; the read and
//! write paths swallow it, count it, and log it. The only error that
//! escapes is one raised by a caller-supplied fallback function.

use crate::backend::DistributedStore;
use crate::config::CacheConfig;
use crate::entry::EvictionPriority;
use crate::error::Result;
use crate::health::{HealthStatus, TierHealth};
use crate::key::KeyBuilder;
use crate::local::LocalStore;
use crate::lock::StampedeLock;
use crate::redis_backend::RedisStore;
use crate::statistics::{CacheStatistics, StatsRecorder};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One storage level of the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheLayer {
	/// In-process tier
	L1,
	/// Shared/distributed tier
	L2,
}

impl fmt::Display for CacheLayer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CacheLayer::L1 => write!(f, "L1"),
			CacheLayer::L2 => write!(f, "L2"),
		}
	}
}

/// A single key/value pair for cache warmup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupEntry {
	/// Logical cache key
	pub key: String,
	/// Value to store, already shaped as JSON
	pub value: serde_json::Value,
}

/// Bulk pre-population request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupRequest {
	/// Entries to write ahead of expected demand
	pub entries: Vec<WarmupEntry>,
	/// TTL for all entries; defaults to the configured TTL
	pub ttl: Option<Duration>,
}

/// Multi-tier cache with promotion and stampede protection.
///
/// Construct one per process and hand clones to consumers; all clones
/// share storage and counters.
///
/// # Examples
///
/// ```
/// use trading_cache::{CacheConfig, MemoryStore, TieredCache};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() {
/// let config = CacheConfig::new().with_key_prefix("oiltrade");
/// let cache = TieredCache::with_distributed(config, Arc::new(MemoryStore::new()));
///
/// cache.set("inventory:snapshot:P1:L1", &42_u64, Some(Duration::from_secs(2))).await;
/// assert_eq!(cache.get::<u64>("inventory:snapshot:P1:L1").await, Some(42));
/// # }
/// ```
#[derive(Clone)]
pub struct TieredCache {
	config: CacheConfig,
	keys: KeyBuilder,
	l1: LocalStore,
	l2: Option<Arc<dyn DistributedStore>>,
	lock: Option<StampedeLock>,
	stats: Arc<StatsRecorder>,
}

impl TieredCache {
	/// Create an L1-only cache
	pub fn new(config: CacheConfig) -> Self {
		Self::build(config, None)
	}

	/// Create a cache over the given distributed store.
	///
	/// When `config.enable_l2` is false the store is ignored and the
	/// cache degrades to L1-only, transparently to callers.
	pub fn with_distributed(config: CacheConfig, store: Arc<dyn DistributedStore>) -> Self {
		if config.enable_l2 {
			Self::build(config, Some(store))
		} else {
			Self::build(config, None)
		}
	}

	/// Create a cache over a Redis distributed tier
	pub fn with_redis(config: CacheConfig, connection_url: &str) -> Result<Self> {
		let store = RedisStore::new(connection_url)?;
		Ok(Self::with_distributed(config, Arc::new(store)))
	}

	fn build(config: CacheConfig, l2: Option<Arc<dyn DistributedStore>>) -> Self {
		let l1 = LocalStore::new(config.max_l1_size_bytes);
		if let Some(interval) = config.l1_cleanup_interval {
			l1.start_auto_cleanup(interval);
		}
		let lock = l2
			.as_ref()
			.map(|store| StampedeLock::new(Arc::clone(store), config.lock_ttl));
		Self {
			keys: KeyBuilder::new(config.key_prefix.clone()),
			l1,
			l2,
			lock,
			stats: Arc::new(StatsRecorder::default()),
			config,
		}
	}

	/// Look up a value, consulting L1 then L2.
	///
	/// An L2 hit is promoted into L1 under the (short) promotion TTL so
	/// subsequent reads stay local without letting the L1 copy go stale
	/// indefinitely. Never fails: internal errors count as misses.
	pub async fn get<T>(&self, key: &str) -> Option<T>
	where
		T: for<'de> Deserialize<'de> + Send,
	{
		let full_key = self.keys.full_key(key);

		if let Some(bytes) = self.l1.get(&full_key).await {
			match serde_json::from_slice(&bytes) {
				Ok(value) => {
					self.stats.l1.record_hit();
					self.stats.overall.record_hit();
					return Some(value);
				}
				Err(e) => {
					tracing::warn!(key = %full_key, error = %e, "dropping undecodable L1 entry");
					self.stats.l1.record_error();
					self.l1.delete(&full_key).await;
				}
			}
		}
		self.stats.l1.record_miss();

		let Some(l2) = &self.l2 else {
			self.stats.overall.record_miss();
			return None;
		};

		match l2.get(&full_key).await {
			Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
				Ok(value) => {
					self.stats.l2.record_hit();
					self.stats.overall.record_hit();
					self.promote(&full_key, bytes).await;
					Some(value)
				}
				Err(e) => {
					tracing::warn!(key = %full_key, error = %e, "undecodable L2 entry treated as miss");
					self.stats.l2.record_error();
					self.stats.l2.record_miss();
					self.stats.overall.record_miss();
					None
				}
			},
			Ok(None) => {
				self.stats.l2.record_miss();
				self.stats.overall.record_miss();
				None
			}
			Err(e) => {
				tracing::warn!(key = %full_key, error = %e, "L2 lookup failed, degrading to miss");
				self.stats.l2.record_error();
				self.stats.l2.record_miss();
				self.stats.overall.record_miss();
				None
			}
		}
	}

	/// Write a value to L1 synchronously and to L2 best-effort.
	///
	/// An unreachable L2 is counted and logged but does not fail the
	/// call; L1 alone satisfies the cache-aside contract.
	pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>)
	where
		T: Serialize + Send + Sync,
	{
		let full_key = self.keys.full_key(key);
		let bytes = match serde_json::to_vec(value) {
			Ok(bytes) => bytes,
			Err(e) => {
				tracing::warn!(key = %full_key, error = %e, "value not serializable, write dropped");
				self.stats.l1.record_error();
				return;
			}
		};
		let ttl = ttl.unwrap_or(self.config.default_ttl);

		self.l1
			.set(
				full_key.clone(),
				bytes.clone(),
				Some(ttl),
				EvictionPriority::from_key(&full_key),
			)
			.await;
		self.stats.l1.record_set();
		self.stats.overall.record_set();

		if let Some(l2) = &self.l2 {
			match l2.set(&full_key, bytes, Some(ttl)).await {
				Ok(()) => self.stats.l2.record_set(),
				Err(e) => {
					tracing::warn!(key = %full_key, error = %e, "L2 write failed, keeping L1 copy only");
					self.stats.l2.record_error();
				}
			}
		}
	}

	/// Remove a key from both tiers
	pub async fn remove(&self, key: &str) {
		let full_key = self.keys.full_key(key);
		self.l1.delete(&full_key).await;
		if let Some(l2) = &self.l2 {
			if let Err(e) = l2.delete(&full_key).await {
				tracing::warn!(key = %full_key, error = %e, "L2 delete failed; TTL will expire the remote copy");
				self.stats.l2.record_error();
			}
		}
	}

	/// Remove every key matching a `*`-wildcard pattern.
	///
	/// L1 has no pattern index, so it is cleared wholesale (coarse but
	/// correctness-preserving) while L2 performs a true scan-and-delete.
	pub async fn remove_by_pattern(&self, pattern: &str) {
		self.l1.clear().await;
		if let Some(l2) = &self.l2 {
			let full_pattern = self.keys.full_pattern(pattern);
			match l2.delete_pattern(&full_pattern).await {
				Ok(removed) => {
					tracing::debug!(pattern = %full_pattern, removed, "pattern invalidation");
				}
				Err(e) => {
					tracing::warn!(pattern = %full_pattern, error = %e, "L2 pattern delete failed");
					self.stats.l2.record_error();
				}
			}
		}
	}

	/// Read from a single tier, bypassing the promotion cascade
	pub async fn get_from_layer<T>(&self, key: &str, layer: CacheLayer) -> Option<T>
	where
		T: for<'de> Deserialize<'de> + Send,
	{
		let full_key = self.keys.full_key(key);
		let bytes = match layer {
			CacheLayer::L1 => self.l1.get(&full_key).await,
			CacheLayer::L2 => match &self.l2 {
				Some(l2) => match l2.get(&full_key).await {
					Ok(bytes) => bytes,
					Err(e) => {
						tracing::warn!(key = %full_key, error = %e, "L2 lookup failed");
						self.stats.l2.record_error();
						None
					}
				},
				None => None,
			},
		};

		let counters = match layer {
			CacheLayer::L1 => &self.stats.l1,
			CacheLayer::L2 => &self.stats.l2,
		};
		match bytes {
			Some(bytes) => match serde_json::from_slice(&bytes) {
				Ok(value) => {
					counters.record_hit();
					Some(value)
				}
				Err(e) => {
					tracing::warn!(key = %full_key, layer = %layer, error = %e, "undecodable entry treated as miss");
					counters.record_error();
					counters.record_miss();
					None
				}
			},
			None => {
				counters.record_miss();
				None
			}
		}
	}

	/// Write to a single tier, bypassing write-through
	pub async fn set_to_layer<T>(&self, key: &str, value: &T, layer: CacheLayer, ttl: Option<Duration>)
	where
		T: Serialize + Send + Sync,
	{
		let full_key = self.keys.full_key(key);
		let bytes = match serde_json::to_vec(value) {
			Ok(bytes) => bytes,
			Err(e) => {
				tracing::warn!(key = %full_key, error = %e, "value not serializable, write dropped");
				self.stats.l1.record_error();
				return;
			}
		};
		let ttl = ttl.unwrap_or(self.config.default_ttl);

		match layer {
			CacheLayer::L1 => {
				self.l1
					.set(
						full_key.clone(),
						bytes,
						Some(ttl),
						EvictionPriority::from_key(&full_key),
					)
					.await;
				self.stats.l1.record_set();
			}
			CacheLayer::L2 => {
				if let Some(l2) = &self.l2 {
					match l2.set(&full_key, bytes, Some(ttl)).await {
						Ok(()) => self.stats.l2.record_set(),
						Err(e) => {
							tracing::warn!(key = %full_key, error = %e, "L2 write failed");
							self.stats.l2.record_error();
						}
					}
				}
			}
		}
	}

	/// Cache-aside with stampede protection.
	///
	/// On a full miss, at most one caller cluster-wide holds the
	/// per-key lock while computing: it double-checks the cache,
	/// invokes the fallback, writes through both tiers, and releases
	/// the lock on every exit path. Fallback failure still releases;
	/// dropping the lease releases in the background.
	///
	/// A contending caller backs off for `lock_retry_delay`, re-checks
	/// the cache once, and then computes uncached rather than blocking.
	/// Under heavy contention this admits a small number of duplicate
	/// uncached computations in exchange for bounded latency and no
	/// deadlock risk. Tune the delay against the typical fallback
	/// duration.
	///
	/// Only errors from the fallback itself propagate.
	pub async fn get_with_fallback<T, E, F, Fut>(
		&self,
		key: &str,
		fallback: F,
		ttl: Option<Duration>,
	) -> std::result::Result<T, E>
	where
		T: Serialize + for<'de> Deserialize<'de> + Send + Sync,
		F: FnOnce() -> Fut + Send,
		Fut: Future<Output = std::result::Result<T, E>> + Send,
		E: Send,
	{
		if let Some(value) = self.get(key).await {
			return Ok(value);
		}

		let Some(lock) = &self.lock else {
			// L1-only mode has no cross-process stampede to guard against
			let value = fallback().await?;
			self.set(key, &value, ttl).await;
			return Ok(value);
		};

		let full_key = self.keys.full_key(key);
		match lock.acquire(&full_key).await {
			Ok(Some(lease)) => {
				// Another holder may have finished between our miss and
				// the acquisition; re-check before computing.
				if let Some(value) = self.get(key).await {
					lease.release().await;
					return Ok(value);
				}
				match fallback().await {
					Ok(value) => {
						self.set(key, &value, ttl).await;
						lease.release().await;
						Ok(value)
					}
					Err(e) => {
						lease.release().await;
						Err(e)
					}
				}
			}
			Ok(None) => {
				tokio::time::sleep(self.config.lock_retry_delay).await;
				if let Some(value) = self.get(key).await {
					return Ok(value);
				}
				// Still absent: compute uncached instead of racing the
				// current holder's write.
				fallback().await
			}
			Err(e) => {
				tracing::warn!(key = %full_key, error = %e, "stampede lock unavailable, computing uncached");
				self.stats.l2.record_error();
				fallback().await
			}
		}
	}

	/// Fetch many keys concurrently; absent keys are omitted
	pub async fn get_many<T>(&self, keys: &[&str]) -> HashMap<String, T>
	where
		T: for<'de> Deserialize<'de> + Send,
	{
		let lookups = keys
			.iter()
			.map(|key| async move { (key.to_string(), self.get::<T>(key).await) });

		let mut results = HashMap::new();
		for (key, value) in join_all(lookups).await {
			if let Some(value) = value {
				results.insert(key, value);
			}
		}
		results
	}

	/// Write many values concurrently; per-key failures are swallowed
	/// like single-key `set`
	pub async fn set_many<T>(&self, values: &HashMap<String, T>, ttl: Option<Duration>)
	where
		T: Serialize + Send + Sync,
	{
		let writes = values
			.iter()
			.map(|(key, value)| self.set(key.as_str(), value, ttl));
		join_all(writes).await;
	}

	/// Pull the L2 value into L1 unconditionally.
	///
	/// Used after out-of-band invalidation events. When L2 no longer
	/// holds the key the L1 copy is dropped too, so the tiers agree.
	pub async fn synchronize(&self, key: &str) {
		let Some(l2) = &self.l2 else {
			return;
		};
		let full_key = self.keys.full_key(key);
		match l2.get(&full_key).await {
			Ok(Some(bytes)) => {
				self.promote(&full_key, bytes).await;
			}
			Ok(None) => {
				self.l1.delete(&full_key).await;
			}
			Err(e) => {
				tracing::warn!(key = %full_key, error = %e, "synchronize failed, L1 left as-is");
				self.stats.l2.record_error();
			}
		}
	}

	/// Remove a key everywhere in response to a distributed
	/// invalidation event
	pub async fn invalidate_distributed(&self, key: &str) {
		tracing::debug!(key = %key, "distributed invalidation");
		self.remove(key).await;
	}

	/// Pre-populate the cache from supplied entries
	pub async fn warmup_cache(&self, request: &WarmupRequest) {
		tracing::info!(entries = request.entries.len(), "cache warmup");
		for entry in &request.entries {
			self.set(&entry.key, &entry.value, request.ttl).await;
		}
	}

	/// Preheat hook for a named key group.
	///
	/// Correctness never depends on warm data, so without a registered
	/// loader this only records that the request happened.
	pub async fn preheat_cache(&self, group: &str) {
		tracing::info!(group = %group, "cache preheat requested; no loader registered, skipping");
	}

	/// Snapshot of per-tier and overall counters
	pub async fn get_statistics(&self) -> CacheStatistics {
		CacheStatistics {
			l1: self.stats.l1.snapshot(),
			l2: self.stats.l2.snapshot(),
			overall: self.stats.overall.snapshot(),
			l1_entry_count: self.l1.entry_count().await as u64,
			l1_size_bytes: self.l1.size_bytes(),
		}
	}

	/// Probe every tier and aggregate liveness.
	///
	/// L1 is in-process and always healthy; L2 health is a ping.
	pub async fn get_health_status(&self) -> HealthStatus {
		let mut tiers = vec![TierHealth::ok(CacheLayer::L1)];
		if let Some(l2) = &self.l2 {
			match l2.ping().await {
				Ok(()) => tiers.push(TierHealth::ok(CacheLayer::L2)),
				Err(e) => tiers.push(TierHealth::failed(CacheLayer::L2, e.to_string())),
			}
		}
		HealthStatus::from_tiers(tiers)
	}

	async fn promote(&self, full_key: &str, bytes: Vec<u8>) {
		self.l1
			.set(
				full_key.to_string(),
				bytes,
				Some(self.config.l1_promotion_ttl),
				EvictionPriority::from_key(full_key),
			)
			.await;
	}
}
