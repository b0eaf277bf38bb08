//! Distributed (L2) tier contract.
//!
//! The trait is byte-level: serialization stays in the facade so every
//! backend stores the same representation. Besides plain key-value
//! operations it carries the two atomic primitives the stampede lock is
//! built on: conditional create and compare-and-delete.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// Shared key-value store reachable by every process in the cluster
#[async_trait]
pub trait DistributedStore: Send + Sync {
	/// Fetch the raw bytes stored under a key
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

	/// Store bytes under a key, with an optional TTL
	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

	/// Delete a key
	async fn delete(&self, key: &str) -> Result<()>;

	/// Delete every key matching a `*`-wildcard pattern, returning the
	/// number of keys removed
	async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

	/// Create `key = token` with a TTL only if the key is absent.
	/// Returns whether the write happened.
	async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

	/// Delete `key` only if it still holds `token`, as one atomic step.
	/// Returns whether the key was deleted.
	async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool>;

	/// Liveness probe
	async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredValue {
	value: Vec<u8>,
	expires_at: Option<SystemTime>,
}

impl StoredValue {
	fn is_expired(&self) -> bool {
		if let Some(expires_at) = self.expires_at {
			SystemTime::now() > expires_at
		} else {
			false
		}
	}
}

/// In-process [`DistributedStore`] for single-process deployments and
/// testing.
///
/// The conditional primitives run under one write lock, which makes them
/// atomic within the process, matching the guarantee Redis gives
/// cluster-wide.
///
/// # Examples
///
/// ```
/// use trading_cache::{DistributedStore, MemoryStore};
/// use std::time::Duration;
///
/// # async fn example() -> trading_cache::Result<()> {
/// let store = MemoryStore::new();
/// let acquired = store.set_if_absent("lock:k", "token-a", Duration::from_secs(30)).await?;
/// assert!(acquired);
///
/// // Only the matching token can release
/// assert!(!store.compare_and_delete("lock:k", "token-b").await?);
/// assert!(store.compare_and_delete("lock:k", "token-a").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
	entries: Arc<RwLock<HashMap<String, StoredValue>>>,
}

impl MemoryStore {
	/// Create an empty store
	pub fn new() -> Self {
		Self::default()
	}

	async fn cleanup_expired(&self) {
		let mut entries = self.entries.write().await;
		entries.retain(|_, stored| !stored.is_expired());
	}
}

#[async_trait]
impl DistributedStore for MemoryStore {
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
		let entries = self.entries.read().await;
		match entries.get(key) {
			Some(stored) if stored.is_expired() => Ok(None),
			Some(stored) => Ok(Some(stored.value.clone())),
			None => Ok(None),
		}
	}

	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
		let mut entries = self.entries.write().await;
		entries.insert(
			key.to_string(),
			StoredValue {
				value,
				expires_at: ttl.map(|d| SystemTime::now() + d),
			},
		);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<()> {
		let mut entries = self.entries.write().await;
		entries.remove(key);
		Ok(())
	}

	async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|key, _| !glob_match(pattern, key));
		Ok((before - entries.len()) as u64)
	}

	async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
		self.cleanup_expired().await;

		let mut entries = self.entries.write().await;
		if entries.contains_key(key) {
			return Ok(false);
		}
		entries.insert(
			key.to_string(),
			StoredValue {
				value: token.as_bytes().to_vec(),
				expires_at: Some(SystemTime::now() + ttl),
			},
		);
		Ok(true)
	}

	async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool> {
		let mut entries = self.entries.write().await;
		let matches = matches!(
			entries.get(key),
			Some(stored) if !stored.is_expired() && stored.value == token.as_bytes()
		);
		if matches {
			entries.remove(key);
		}
		Ok(matches)
	}

	async fn ping(&self) -> Result<()> {
		Ok(())
	}
}

/// Match `text` against a pattern where `*` matches any run of
/// characters. This is the only wildcard the cache's removal patterns
/// use.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
	let pattern: Vec<char> = pattern.chars().collect();
	let text: Vec<char> = text.chars().collect();

	let (mut p, mut t) = (0usize, 0usize);
	let mut star: Option<usize> = None;
	let mut mark = 0usize;

	while t < text.len() {
		if p < pattern.len() && pattern[p] != '*' && pattern[p] == text[t] {
			p += 1;
			t += 1;
		} else if p < pattern.len() && pattern[p] == '*' {
			star = Some(p);
			mark = t;
			p += 1;
		} else if let Some(star_pos) = star {
			p = star_pos + 1;
			mark += 1;
			t = mark;
		} else {
			return false;
		}
	}
	while p < pattern.len() && pattern[p] == '*' {
		p += 1;
	}
	p == pattern.len()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_glob_match() {
		assert!(glob_match("inventory:*", "inventory:a"));
		assert!(glob_match("inventory:*", "inventory:snapshot:P1:L1"));
		assert!(!glob_match("inventory:*", "other:c"));
		assert!(glob_match("*", "anything"));
		assert!(glob_match("a*c", "abc"));
		assert!(glob_match("a*c", "ac"));
		assert!(!glob_match("a*c", "ab"));
		assert!(glob_match("*:snapshot:*", "inventory:snapshot:P1:L1"));
		assert!(glob_match("exact", "exact"));
		assert!(!glob_match("exact", "exactly"));
	}

	#[tokio::test]
	async fn test_memory_store_round_trip() {
		let store = MemoryStore::new();
		store.set("key1", vec![1, 2, 3], None).await.unwrap();
		assert_eq!(store.get("key1").await.unwrap(), Some(vec![1, 2, 3]));

		store.delete("key1").await.unwrap();
		assert_eq!(store.get("key1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_memory_store_ttl() {
		let store = MemoryStore::new();
		store
			.set("key1", vec![1], Some(Duration::from_millis(30)))
			.await
			.unwrap();
		assert!(store.get("key1").await.unwrap().is_some());

		tokio::time::sleep(Duration::from_millis(60)).await;
		assert!(store.get("key1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_memory_store_pattern_delete() {
		let store = MemoryStore::new();
		store.set("inventory:a", vec![1], None).await.unwrap();
		store.set("inventory:b", vec![2], None).await.unwrap();
		store.set("other:c", vec![3], None).await.unwrap();

		let removed = store.delete_pattern("inventory:*").await.unwrap();
		assert_eq!(removed, 2);
		assert!(store.get("inventory:a").await.unwrap().is_none());
		assert!(store.get("other:c").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_set_if_absent_blocks_second_writer() {
		let store = MemoryStore::new();
		assert!(
			store
				.set_if_absent("lock:k", "a", Duration::from_secs(30))
				.await
				.unwrap()
		);
		assert!(
			!store
				.set_if_absent("lock:k", "b", Duration::from_secs(30))
				.await
				.unwrap()
		);
	}

	#[tokio::test]
	async fn test_set_if_absent_after_expiry() {
		let store = MemoryStore::new();
		assert!(
			store
				.set_if_absent("lock:k", "a", Duration::from_millis(30))
				.await
				.unwrap()
		);

		tokio::time::sleep(Duration::from_millis(60)).await;
		assert!(
			store
				.set_if_absent("lock:k", "b", Duration::from_secs(30))
				.await
				.unwrap()
		);
	}

	#[tokio::test]
	async fn test_compare_and_delete_requires_matching_token() {
		let store = MemoryStore::new();
		store
			.set_if_absent("lock:k", "a", Duration::from_secs(30))
			.await
			.unwrap();

		assert!(!store.compare_and_delete("lock:k", "b").await.unwrap());
		assert!(store.get("lock:k").await.unwrap().is_some());

		assert!(store.compare_and_delete("lock:k", "a").await.unwrap());
		assert!(store.get("lock:k").await.unwrap().is_none());
	}
}
