//! Internal cache entry structure for the in-process tier.

use std::time::{Duration, SystemTime};

/// Eviction priority class for L1 entries.
///
/// Derived heuristically from key names: contract and position data is
/// the most expensive to recompute and survives pressure longest, while
/// market data is cheap to refresh and goes first.
///
/// Ordered so that `Low < Normal < High`; eviction removes the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvictionPriority {
	Low,
	Normal,
	High,
}

impl EvictionPriority {
	/// Classify a key by its name.
	///
	/// # Examples
	///
	/// ```
	/// use trading_cache::EvictionPriority;
	///
	/// assert_eq!(EvictionPriority::from_key("oiltrade:contract:42"), EvictionPriority::High);
	/// assert_eq!(EvictionPriority::from_key("oiltrade:market:BRENT:spot"), EvictionPriority::Normal);
	/// assert_eq!(EvictionPriority::from_key("oiltrade:inventory:snapshot"), EvictionPriority::Low);
	/// ```
	pub fn from_key(key: &str) -> Self {
		let key = key.to_ascii_lowercase();
		if key.contains("contract") || key.contains("position") {
			Self::High
		} else if key.contains("price") || key.contains("market") {
			Self::Normal
		} else {
			Self::Low
		}
	}
}

/// Cache entry with expiration and capacity-accounting metadata
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
	pub(crate) value: Vec<u8>,
	pub(crate) expires_at: Option<SystemTime>,
	pub(crate) priority: EvictionPriority,
	pub(crate) created_at: SystemTime,
	/// Serialized size in bytes, charged against the L1 budget
	pub(crate) size: usize,
}

impl CacheEntry {
	pub(crate) fn new(value: Vec<u8>, ttl: Option<Duration>, priority: EvictionPriority) -> Self {
		let size = value.len();
		Self {
			value,
			expires_at: ttl.map(|d| SystemTime::now() + d),
			priority,
			created_at: SystemTime::now(),
			size,
		}
	}

	pub(crate) fn is_expired(&self) -> bool {
		if let Some(expires_at) = self.expires_at {
			SystemTime::now() > expires_at
		} else {
			false
		}
	}
}
