//! Redis implementation of the distributed tier.
//!
//! Uses deadpool-redis for connection pooling. Pattern removal walks the
//! keyspace with SCAN (non-blocking) and deletes with UNLINK
//! (asynchronous reclamation). The stampede-lock primitives map to
//! `SET NX PX` and a compare-and-delete Lua script, so release can never
//! race a concurrent re-acquisition.

use crate::backend::DistributedStore;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use std::time::Duration;

/// Delete the lock key only while it still holds the caller's token.
/// GET + DEL must be one atomic step: a separate read-then-delete could
/// remove a lock that expired and was re-acquired by another owner.
const COMPARE_AND_DELETE_SCRIPT: &str = r#"
	if redis.call('GET', KEYS[1]) == ARGV[1] then
		return redis.call('DEL', KEYS[1])
	else
		return 0
	end
"#;

/// Number of keys to request per SCAN iteration
const SCAN_BATCH_SIZE: usize = 100;

/// Redis-backed distributed tier with connection pooling.
///
/// # Examples
///
/// ```no_run
/// use trading_cache::RedisStore;
///
/// # fn example() -> trading_cache::Result<()> {
/// let store = RedisStore::new("redis://localhost:6379")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStore {
	pool: Pool,
}

impl RedisStore {
	/// Create a store with default pool settings for the given URL
	pub fn new(connection_url: impl Into<String>) -> Result<Self> {
		let cfg = PoolConfig::from_url(connection_url.into());
		let pool = cfg
			.create_pool(Some(Runtime::Tokio1))
			.map_err(|e| CacheError::Config(format!("failed to create Redis pool: {}", e)))?;
		Ok(Self { pool })
	}

	/// Create a store from a custom pool configuration
	pub fn with_pool_config(config: PoolConfig) -> Result<Self> {
		let pool = config
			.create_pool(Some(Runtime::Tokio1))
			.map_err(|e| CacheError::Config(format!("failed to create Redis pool: {}", e)))?;
		Ok(Self { pool })
	}

	async fn connection(&self) -> Result<deadpool_redis::Connection> {
		self.pool
			.get()
			.await
			.map_err(|e| CacheError::Backend(format!("failed to get connection from pool: {}", e)))
	}
}

#[async_trait]
impl DistributedStore for RedisStore {
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
		let mut conn = self.connection().await?;
		let value: Option<Vec<u8>> = conn
			.get(key)
			.await
			.map_err(|e| CacheError::Backend(format!("failed to get value from Redis: {}", e)))?;
		Ok(value)
	}

	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
		let mut conn = self.connection().await?;
		if let Some(ttl) = ttl {
			// EXPIRE is second-granular; sub-second TTLs round up to 1s
			let seconds = ttl.as_secs().max(1);
			let _: () = conn
				.set_ex(key, value, seconds)
				.await
				.map_err(|e| CacheError::Backend(format!("failed to set value in Redis: {}", e)))?;
		} else {
			let _: () = conn
				.set(key, value)
				.await
				.map_err(|e| CacheError::Backend(format!("failed to set value in Redis: {}", e)))?;
		}
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<()> {
		let mut conn = self.connection().await?;
		let _: () = conn
			.del(key)
			.await
			.map_err(|e| CacheError::Backend(format!("failed to delete value from Redis: {}", e)))?;
		Ok(())
	}

	async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
		let mut conn = self.connection().await?;
		let mut cursor: u64 = 0;
		let mut removed: u64 = 0;

		loop {
			let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
				.arg(cursor)
				.arg("MATCH")
				.arg(pattern)
				.arg("COUNT")
				.arg(SCAN_BATCH_SIZE)
				.query_async(&mut *conn)
				.await
				.map_err(|e| {
					CacheError::Backend(format!("failed to scan keys matching pattern: {}", e))
				})?;

			if !keys.is_empty() {
				let unlinked: u64 = redis::cmd("UNLINK")
					.arg(&keys)
					.query_async(&mut *conn)
					.await
					.map_err(|e| CacheError::Backend(format!("failed to unlink keys: {}", e)))?;
				removed += unlinked;
			}

			cursor = next_cursor;
			if cursor == 0 {
				break;
			}
		}

		Ok(removed)
	}

	async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
		let mut conn = self.connection().await?;
		let reply: Option<String> = redis::cmd("SET")
			.arg(key)
			.arg(token)
			.arg("NX")
			.arg("PX")
			.arg(ttl.as_millis() as u64)
			.query_async(&mut *conn)
			.await
			.map_err(|e| CacheError::Backend(format!("failed conditional set in Redis: {}", e)))?;
		Ok(reply.is_some())
	}

	async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool> {
		let mut conn = self.connection().await?;
		let script = redis::Script::new(COMPARE_AND_DELETE_SCRIPT);
		let deleted: i64 = script
			.key(key)
			.arg(token)
			.invoke_async(&mut *conn)
			.await
			.map_err(|e| CacheError::Backend(format!("failed compare-and-delete in Redis: {}", e)))?;
		Ok(deleted == 1)
	}

	async fn ping(&self) -> Result<()> {
		let mut conn = self.connection().await?;
		let _: String = redis::cmd("PING")
			.query_async(&mut *conn)
			.await
			.map_err(|e| CacheError::Backend(format!("Redis ping failed: {}", e)))?;
		Ok(())
	}
}
