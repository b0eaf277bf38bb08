//! In-process (L1) tier.
//!
//! A bounded byte-map with three layers of expiration handling:
//!
//! - **Passive expiration**: expired entries are dropped on access
//! - **TTL index**: keys grouped by expiry second for batch cleanup
//! - **Active sampling**: random sampling sweeps for the long tail
//!
//! Capacity is a byte budget; when an insert would exceed it, entries
//! are evicted lowest priority class first, oldest first within a class.

use crate::entry::{CacheEntry, EvictionPriority};
use rand::prelude::IndexedRandom;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

/// Sampling sweep configuration
#[derive(Debug, Clone)]
struct ActiveSampler {
	/// Keys sampled per round
	sample_size: usize,
	/// Expired fraction above which another round runs
	threshold: f32,
}

impl Default for ActiveSampler {
	fn default() -> Self {
		Self {
			sample_size: 20,
			threshold: 0.25,
		}
	}
}

/// Keys grouped by expiry timestamp (rounded to seconds)
type TtlIndex = HashMap<u64, Vec<String>>;

/// In-process bounded cache tier.
///
/// Thread-safe without external locking; every handle clones share the
/// same storage. Mutation happens only through the facade in normal
/// operation, but the store is usable standalone.
#[derive(Clone)]
pub struct LocalStore {
	store: Arc<RwLock<HashMap<String, CacheEntry>>>,
	ttl_index: Arc<RwLock<TtlIndex>>,
	size_bytes: Arc<AtomicU64>,
	max_size_bytes: u64,
	sampler: ActiveSampler,
	cleanup_handle: Arc<std::sync::Mutex<Option<AbortHandle>>>,
}

impl LocalStore {
	/// Create a store with the given byte budget
	pub fn new(max_size_bytes: u64) -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
			ttl_index: Arc::new(RwLock::new(HashMap::new())),
			size_bytes: Arc::new(AtomicU64::new(0)),
			max_size_bytes,
			sampler: ActiveSampler::default(),
			cleanup_handle: Arc::new(std::sync::Mutex::new(None)),
		}
	}

	/// Get a value, dropping it first if it has expired
	pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
		let mut store = self.store.write().await;
		let expired = matches!(store.get(key), Some(entry) if entry.is_expired());
		if expired {
			self.remove_entry(&mut store, key);
			return None;
		}
		store.get(key).map(|entry| entry.value.clone())
	}

	/// Insert a value, evicting under byte pressure.
	///
	/// Values larger than the whole budget are not cached at all; the
	/// caller still has L2 and the fallback path.
	pub async fn set(
		&self,
		key: String,
		value: Vec<u8>,
		ttl: Option<Duration>,
		priority: EvictionPriority,
	) {
		let entry = CacheEntry::new(value, ttl, priority);
		if entry.size as u64 > self.max_size_bytes {
			tracing::debug!(key = %key, size = entry.size, "value exceeds the L1 byte budget, skipping local tier");
			return;
		}

		let mut store = self.store.write().await;
		self.remove_entry(&mut store, &key);
		while self.size_bytes.load(Ordering::Relaxed) + entry.size as u64 > self.max_size_bytes {
			let victim = store
				.iter()
				.min_by_key(|(_, e)| (e.priority, e.created_at))
				.map(|(k, _)| k.clone());
			match victim {
				Some(victim) => {
					tracing::trace!(key = %victim, "evicting under byte pressure");
					self.remove_entry(&mut store, &victim);
				}
				None => break,
			}
		}

		if let Some(expires_at) = entry.expires_at {
			let timestamp = expires_at
				.duration_since(SystemTime::UNIX_EPOCH)
				.ok()
				.map(|d| d.as_secs())
				.unwrap_or(0);
			let mut ttl_index = self.ttl_index.write().await;
			ttl_index.entry(timestamp).or_default().push(key.clone());
		}

		self.size_bytes.fetch_add(entry.size as u64, Ordering::Relaxed);
		store.insert(key, entry);
	}

	/// Delete a key
	pub async fn delete(&self, key: &str) {
		let mut store = self.store.write().await;
		self.remove_entry(&mut store, key);
	}

	/// Remove all entries.
	///
	/// This is the only pattern-invalidation primitive L1 offers: there
	/// is no in-process pattern index, so bulk invalidation clears the
	/// tier wholesale.
	pub async fn clear(&self) {
		let mut store = self.store.write().await;
		let mut ttl_index = self.ttl_index.write().await;
		store.clear();
		ttl_index.clear();
		self.size_bytes.store(0, Ordering::Relaxed);
	}

	/// Number of entries currently stored (including not-yet-swept expired ones)
	pub async fn entry_count(&self) -> usize {
		let store = self.store.read().await;
		store.len()
	}

	/// Bytes currently charged against the budget
	pub fn size_bytes(&self) -> u64 {
		self.size_bytes.load(Ordering::Relaxed)
	}

	fn remove_entry(&self, store: &mut HashMap<String, CacheEntry>, key: &str) {
		if let Some(entry) = store.remove(key) {
			self.size_bytes.fetch_sub(entry.size as u64, Ordering::Relaxed);
		}
	}

	/// Batch-remove keys whose indexed expiry second has passed.
	///
	/// An index slot can reference a key that was since overwritten with
	/// a longer TTL, so each entry is re-checked before removal.
	pub async fn cleanup_ttl_index(&self) {
		let now = SystemTime::now()
			.duration_since(SystemTime::UNIX_EPOCH)
			.ok()
			.map(|d| d.as_secs())
			.unwrap_or(0);

		let expired_timestamps: Vec<u64> = {
			let ttl_index = self.ttl_index.read().await;
			ttl_index.keys().filter(|&&ts| ts <= now).cloned().collect()
		};
		if expired_timestamps.is_empty() {
			return;
		}

		let mut store = self.store.write().await;
		let mut ttl_index = self.ttl_index.write().await;
		for timestamp in expired_timestamps {
			if let Some(keys) = ttl_index.remove(&timestamp) {
				for key in keys {
					if matches!(store.get(&key), Some(entry) if entry.is_expired()) {
						self.remove_entry(&mut store, &key);
					}
				}
			}
		}
	}

	/// Randomly sample keys and remove expired ones, repeating while the
	/// expired fraction stays above the sampler threshold.
	pub async fn cleanup_active_sampling(&self) {
		const MAX_ROUNDS: usize = 100;

		for _ in 0..MAX_ROUNDS {
			let keys = {
				let store = self.store.read().await;
				store.keys().cloned().collect::<Vec<_>>()
			};
			if keys.is_empty() {
				return;
			}

			let sample_size = self.sampler.sample_size.min(keys.len());
			let sample: Vec<_> = {
				let mut rng = rand::rng();
				keys.choose_multiple(&mut rng, sample_size).cloned().collect()
			};

			let mut expired_keys = Vec::new();
			{
				let store = self.store.read().await;
				for key in &sample {
					if let Some(entry) = store.get(key)
						&& entry.is_expired()
					{
						expired_keys.push(key.clone());
					}
				}
			}

			let expired_ratio = expired_keys.len() as f32 / sample.len() as f32;
			if expired_ratio > self.sampler.threshold {
				let mut store = self.store.write().await;
				for key in expired_keys {
					self.remove_entry(&mut store, &key);
				}
			} else {
				return;
			}
		}
	}

	/// Run both cleanup passes
	pub async fn cleanup(&self) {
		self.cleanup_ttl_index().await;
		self.cleanup_active_sampling().await;
	}

	/// Spawn the periodic cleanup task, replacing any previous one
	pub fn start_auto_cleanup(&self, interval: Duration) {
		let mut handle_guard = self
			.cleanup_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(existing) = handle_guard.take() {
			existing.abort();
		}

		let store = self.clone();
		let abort_handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				store.cleanup().await;
			}
		})
		.abort_handle();

		*handle_guard = Some(abort_handle);
	}

	/// Stop the periodic cleanup task if one is running
	pub fn stop_auto_cleanup(&self) {
		let mut handle_guard = self
			.cleanup_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(handle) = handle_guard.take() {
			handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const NO_LIMIT: u64 = u64::MAX;

	#[tokio::test]
	async fn test_basic_operations() {
		let store = LocalStore::new(NO_LIMIT);

		store
			.set("key1".to_string(), vec![1, 2, 3], None, EvictionPriority::Low)
			.await;
		assert_eq!(store.get("key1").await, Some(vec![1, 2, 3]));
		assert_eq!(store.entry_count().await, 1);
		assert_eq!(store.size_bytes(), 3);

		store.delete("key1").await;
		assert!(store.get("key1").await.is_none());
		assert_eq!(store.size_bytes(), 0);
	}

	#[tokio::test]
	async fn test_passive_expiration() {
		let store = LocalStore::new(NO_LIMIT);
		store
			.set(
				"key1".to_string(),
				vec![1],
				Some(Duration::from_millis(30)),
				EvictionPriority::Low,
			)
			.await;
		assert!(store.get("key1").await.is_some());

		tokio::time::sleep(Duration::from_millis(60)).await;
		assert!(store.get("key1").await.is_none());
		// Passive expiry also released the charged bytes
		assert_eq!(store.size_bytes(), 0);
	}

	#[tokio::test]
	async fn test_overwrite_releases_old_bytes() {
		let store = LocalStore::new(NO_LIMIT);
		store
			.set("key1".to_string(), vec![0; 100], None, EvictionPriority::Low)
			.await;
		store
			.set("key1".to_string(), vec![0; 10], None, EvictionPriority::Low)
			.await;
		assert_eq!(store.size_bytes(), 10);
		assert_eq!(store.entry_count().await, 1);
	}

	#[tokio::test]
	async fn test_eviction_prefers_low_priority() {
		let store = LocalStore::new(100);

		store
			.set("low".to_string(), vec![0; 60], None, EvictionPriority::Low)
			.await;
		store
			.set("normal".to_string(), vec![0; 30], None, EvictionPriority::Normal)
			.await;
		// 60 + 30 + 50 > 100: the low-priority entry goes first
		store
			.set("high".to_string(), vec![0; 50], None, EvictionPriority::High)
			.await;

		assert!(store.get("low").await.is_none());
		assert!(store.get("normal").await.is_some());
		assert!(store.get("high").await.is_some());
		assert!(store.size_bytes() <= 100);
	}

	#[tokio::test]
	async fn test_oversized_value_is_not_cached() {
		let store = LocalStore::new(10);
		store
			.set("big".to_string(), vec![0; 100], None, EvictionPriority::High)
			.await;
		assert!(store.get("big").await.is_none());
		assert_eq!(store.size_bytes(), 0);
	}

	#[tokio::test]
	async fn test_ttl_index_cleanup() {
		let store = LocalStore::new(NO_LIMIT);
		for i in 0..50 {
			store
				.set(
					format!("key{}", i),
					vec![i as u8],
					Some(Duration::from_millis(20)),
					EvictionPriority::Low,
				)
				.await;
		}
		store
			.set("keeper".to_string(), vec![1], None, EvictionPriority::Low)
			.await;

		tokio::time::sleep(Duration::from_millis(1100)).await;
		store.cleanup_ttl_index().await;

		assert_eq!(store.entry_count().await, 1);
		assert!(store.get("keeper").await.is_some());
	}

	#[tokio::test]
	async fn test_ttl_index_respects_overwritten_entries() {
		let store = LocalStore::new(NO_LIMIT);
		store
			.set(
				"key1".to_string(),
				vec![1],
				Some(Duration::from_millis(20)),
				EvictionPriority::Low,
			)
			.await;
		// Overwrite with no TTL before the indexed second passes
		store
			.set("key1".to_string(), vec![2], None, EvictionPriority::Low)
			.await;

		tokio::time::sleep(Duration::from_millis(1100)).await;
		store.cleanup_ttl_index().await;

		assert_eq!(store.get("key1").await, Some(vec![2]));
	}

	#[tokio::test]
	async fn test_active_sampling_removes_expired() {
		let store = LocalStore::new(NO_LIMIT);
		for i in 0..50 {
			store
				.set(
					format!("key{}", i),
					vec![i as u8],
					Some(Duration::from_millis(20)),
					EvictionPriority::Low,
				)
				.await;
		}

		tokio::time::sleep(Duration::from_millis(60)).await;
		store.cleanup_active_sampling().await;

		assert_eq!(store.entry_count().await, 0);
	}

	#[tokio::test]
	async fn test_auto_cleanup_task() {
		let store = LocalStore::new(NO_LIMIT);
		store.start_auto_cleanup(Duration::from_millis(25));

		store
			.set(
				"short".to_string(),
				vec![1],
				Some(Duration::from_millis(30)),
				EvictionPriority::Low,
			)
			.await;
		store
			.set("long".to_string(), vec![2], None, EvictionPriority::Low)
			.await;

		tokio::time::sleep(Duration::from_millis(1200)).await;
		store.stop_auto_cleanup();

		assert_eq!(store.entry_count().await, 1);
		assert!(store.get("long").await.is_some());
	}

	#[tokio::test]
	async fn test_clear() {
		let store = LocalStore::new(NO_LIMIT);
		store
			.set("key1".to_string(), vec![1], None, EvictionPriority::Low)
			.await;
		store
			.set("key2".to_string(), vec![2], None, EvictionPriority::High)
			.await;

		store.clear().await;
		assert_eq!(store.entry_count().await, 0);
		assert_eq!(store.size_bytes(), 0);
	}
}
