//! Cache statistics.
//!
//! Counters are plain atomics incremented from the hot path with relaxed
//! ordering; ratios are derived on read and never stored.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for one tier
#[derive(Debug, Default)]
pub(crate) struct TierCounters {
	hits: AtomicU64,
	misses: AtomicU64,
	sets: AtomicU64,
	errors: AtomicU64,
}

impl TierCounters {
	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_miss(&self) {
		self.misses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_set(&self) {
		self.sets.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_error(&self) {
		self.errors.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn snapshot(&self) -> TierStatistics {
		TierStatistics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			sets: self.sets.load(Ordering::Relaxed),
			errors: self.errors.load(Ordering::Relaxed),
		}
	}
}

/// Per-facade counter set.
///
/// `overall` tracks facade-level outcomes: one hit or one miss per
/// logical lookup, regardless of how many tiers were consulted. The
/// per-tier counters record what each tier saw, so an L2-promoted read
/// shows up as an L1 miss, an L2 hit, and one overall hit.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
	pub(crate) l1: TierCounters,
	pub(crate) l2: TierCounters,
	pub(crate) overall: TierCounters,
}

/// Counter snapshot for one tier
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStatistics {
	/// Number of cache hits
	pub hits: u64,
	/// Number of cache misses
	pub misses: u64,
	/// Number of writes
	pub sets: u64,
	/// Number of swallowed internal errors
	pub errors: u64,
}

impl TierStatistics {
	/// Total lookups against this tier
	pub fn requests(&self) -> u64 {
		self.hits + self.misses
	}

	/// Hit ratio in `0.0..=1.0`, computed on read.
	///
	/// # Examples
	///
	/// ```
	/// use trading_cache::TierStatistics;
	///
	/// let stats = TierStatistics { hits: 75, misses: 25, sets: 0, errors: 0 };
	/// assert_eq!(stats.hit_ratio(), 0.75);
	/// ```
	pub fn hit_ratio(&self) -> f64 {
		let requests = self.requests();
		if requests == 0 {
			0.0
		} else {
			self.hits as f64 / requests as f64
		}
	}
}

/// Read-only statistics snapshot across all tiers
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
	/// In-process tier counters
	pub l1: TierStatistics,
	/// Distributed tier counters (all zero when L2 is disabled)
	pub l2: TierStatistics,
	/// Facade-level outcomes: one hit or miss per logical lookup
	pub overall: TierStatistics,
	/// Live entries currently held in L1
	pub l1_entry_count: u64,
	/// Bytes currently charged against the L1 budget
	pub l1_size_bytes: u64,
}
