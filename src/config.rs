use std::time::Duration;

/// Cache subsystem configuration.
///
/// # Examples
///
/// ```
/// use trading_cache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new()
///     .with_key_prefix("oiltrade")
///     .with_default_ttl(Duration::from_secs(600));
/// assert_eq!(config.key_prefix, "oiltrade");
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
	/// Process-wide namespace prepended to every logical key
	pub key_prefix: String,

	/// TTL applied when a caller does not pass one
	pub default_ttl: Duration,

	/// TTL for values promoted from L2 into L1.
	///
	/// Biased short so an L1 copy cannot outlive the L2 original for
	/// long after an out-of-band invalidation.
	pub l1_promotion_ttl: Duration,

	/// When false the distributed tier is ignored even if a store is
	/// supplied, and the cache runs L1-only.
	pub enable_l2: bool,

	/// Byte budget for the L1 tier; entries are evicted by priority
	/// class once the budget is exceeded.
	pub max_l1_size_bytes: u64,

	/// TTL on the stampede lock. Must be generous relative to the
	/// expected fallback duration; it is also the backstop that frees
	/// locks stranded by a crashed process.
	pub lock_ttl: Duration,

	/// How long a contending caller waits before re-checking the cache
	/// and, failing that, computing uncached. Tunable policy: a longer
	/// delay trades latency for fewer duplicate computations.
	pub lock_retry_delay: Duration,

	/// Interval for the background L1 expiry sweep. `None` disables
	/// the task (expired entries are still dropped on access).
	/// Starting the sweep requires a running Tokio runtime.
	pub l1_cleanup_interval: Option<Duration>,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			key_prefix: String::new(),
			default_ttl: Duration::from_secs(300),
			l1_promotion_ttl: Duration::from_secs(60),
			enable_l2: true,
			max_l1_size_bytes: 64 * 1024 * 1024,
			lock_ttl: Duration::from_secs(30),
			lock_retry_delay: Duration::from_millis(150),
			l1_cleanup_interval: None,
		}
	}
}

impl CacheConfig {
	/// Create a configuration with default settings
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the namespace prefix for all keys
	pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = prefix.into();
		self
	}

	/// Set the TTL used when callers do not pass one
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = ttl;
		self
	}

	/// Set the TTL applied to values promoted into L1
	pub fn with_promotion_ttl(mut self, ttl: Duration) -> Self {
		self.l1_promotion_ttl = ttl;
		self
	}

	/// Enable or disable the distributed tier
	pub fn with_l2_enabled(mut self, enabled: bool) -> Self {
		self.enable_l2 = enabled;
		self
	}

	/// Set the L1 byte budget
	pub fn with_max_l1_size_bytes(mut self, bytes: u64) -> Self {
		self.max_l1_size_bytes = bytes;
		self
	}

	/// Set the stampede lock TTL
	pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
		self.lock_ttl = ttl;
		self
	}

	/// Set the backoff applied when the stampede lock is contended
	pub fn with_lock_retry_delay(mut self, delay: Duration) -> Self {
		self.lock_retry_delay = delay;
		self
	}

	/// Run the background L1 expiry sweep at the given interval
	pub fn with_l1_cleanup_interval(mut self, interval: Duration) -> Self {
		self.l1_cleanup_interval = Some(interval);
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_overrides_defaults() {
		let config = CacheConfig::new()
			.with_key_prefix("risk")
			.with_default_ttl(Duration::from_secs(120))
			.with_l2_enabled(false)
			.with_max_l1_size_bytes(1024);

		assert_eq!(config.key_prefix, "risk");
		assert_eq!(config.default_ttl, Duration::from_secs(120));
		assert!(!config.enable_l2);
		assert_eq!(config.max_l1_size_bytes, 1024);
		assert!(config.l1_cleanup_interval.is_none());
	}
}
