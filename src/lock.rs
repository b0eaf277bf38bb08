//! Distributed stampede lock.
//!
//! A key-scoped advisory mutex built on the distributed tier's
//! conditional-create and compare-and-delete primitives. The lock key is
//! `lock:<full cache key>`; the value is a token unique per acquisition
//! attempt, so only the acquirer can release its own lock even after the
//! TTL has let someone else re-acquire it.

use crate::backend::DistributedStore;
use crate::error::{CacheError, Result};
use crate::key::KeyBuilder;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Factory for per-key advisory locks over a [`DistributedStore`]
#[derive(Clone)]
pub struct StampedeLock {
	store: Arc<dyn DistributedStore>,
	ttl: Duration,
}

impl StampedeLock {
	/// Create a lock factory with the given lock TTL.
	///
	/// The TTL bounds how long a lock stranded by a crashed process can
	/// block other computations; it must exceed the expected fallback
	/// duration.
	pub fn new(store: Arc<dyn DistributedStore>, ttl: Duration) -> Self {
		Self { store, ttl }
	}

	/// Try to acquire the lock for a fully-qualified cache key.
	///
	/// Returns `Ok(None)` when another holder currently owns the lock.
	pub async fn acquire(&self, full_key: &str) -> Result<Option<LockLease>> {
		let lock_key = KeyBuilder::lock_key(full_key);
		let token = Uuid::new_v4().to_string();

		let acquired = self
			.store
			.set_if_absent(&lock_key, &token, self.ttl)
			.await
			.map_err(|e| CacheError::Lock(format!("failed to acquire {}: {}", lock_key, e)))?;

		if acquired {
			Ok(Some(LockLease {
				store: Arc::clone(&self.store),
				lock_key,
				token,
				released: false,
			}))
		} else {
			Ok(None)
		}
	}
}

/// A held stampede lock.
///
/// Release explicitly with [`LockLease::release`]. Dropping an
/// unreleased lease spawns a best-effort compare-and-delete so a
/// cancelled caller does not strand the lock for its full TTL; the TTL
/// remains the backstop for process crashes.
pub struct LockLease {
	store: Arc<dyn DistributedStore>,
	lock_key: String,
	token: String,
	released: bool,
}

impl LockLease {
	/// Release the lock, deleting it only if this lease still owns it
	pub async fn release(mut self) {
		self.released = true;
		match self
			.store
			.compare_and_delete(&self.lock_key, &self.token)
			.await
		{
			Ok(true) => {}
			Ok(false) => {
				tracing::debug!(lock_key = %self.lock_key, "lock expired before release and may have changed owner");
			}
			Err(e) => {
				tracing::warn!(lock_key = %self.lock_key, error = %e, "failed to release stampede lock; TTL will reclaim it");
			}
		}
	}
}

impl Drop for LockLease {
	fn drop(&mut self) {
		if self.released {
			return;
		}
		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			let store = Arc::clone(&self.store);
			let lock_key = std::mem::take(&mut self.lock_key);
			let token = std::mem::take(&mut self.token);
			handle.spawn(async move {
				if let Err(e) = store.compare_and_delete(&lock_key, &token).await {
					tracing::warn!(lock_key = %lock_key, error = %e, "failed to release dropped lock; TTL will reclaim it");
				}
			});
		}
	}
}
