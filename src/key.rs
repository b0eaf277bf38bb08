//! Cache key construction.
//!
//! Logical keys follow a colon-delimited hierarchy
//! (e.g. `inventory:snapshot:<product>:<location>`); the builder adds the
//! process-wide namespace prefix in front. Keys are otherwise opaque to
//! the cache; the hierarchy only matters for pattern-based removal.

/// Builds fully-qualified cache keys from logical keys.
///
/// # Examples
///
/// ```
/// use trading_cache::KeyBuilder;
///
/// let keys = KeyBuilder::new("oiltrade");
/// assert_eq!(keys.full_key("inventory:snapshot:P1:L1"), "oiltrade:inventory:snapshot:P1:L1");
///
/// // An empty prefix leaves keys untouched
/// let keys = KeyBuilder::new("");
/// assert_eq!(keys.full_key("inventory:snapshot:P1:L1"), "inventory:snapshot:P1:L1");
/// ```
#[derive(Debug, Clone)]
pub struct KeyBuilder {
	prefix: String,
}

impl KeyBuilder {
	/// Create a builder with the given namespace prefix
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	/// Build the fully-qualified key for a logical key
	pub fn full_key(&self, key: &str) -> String {
		if self.prefix.is_empty() {
			key.to_string()
		} else {
			format!("{}:{}", self.prefix, key)
		}
	}

	/// Build the fully-qualified form of a removal pattern.
	///
	/// Patterns use `*` wildcards and are namespaced exactly like keys,
	/// so `inventory:*` under prefix `oiltrade` scans `oiltrade:inventory:*`.
	pub fn full_pattern(&self, pattern: &str) -> String {
		self.full_key(pattern)
	}

	/// Key under which the stampede lock for a cache key is stored
	pub fn lock_key(full_key: &str) -> String {
		format!("lock:{}", full_key)
	}
}
