//! Tier liveness reporting.

use crate::tiered::CacheLayer;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Liveness of a single tier
#[derive(Debug, Clone, Serialize)]
pub struct TierHealth {
	/// Which tier this record describes
	pub layer: CacheLayer,
	/// Whether the tier answered its probe
	pub healthy: bool,
	/// Human-readable failure descriptions, empty when healthy
	pub issues: Vec<String>,
}

impl TierHealth {
	pub(crate) fn ok(layer: CacheLayer) -> Self {
		Self {
			layer,
			healthy: true,
			issues: Vec::new(),
		}
	}

	pub(crate) fn failed(layer: CacheLayer, issue: String) -> Self {
		Self {
			layer,
			healthy: false,
			issues: vec![issue],
		}
	}
}

/// Aggregated health snapshot.
///
/// `healthy` is the logical AND over all probed tiers; individual tier
/// records carry the failure reasons for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
	/// AND of all tier probes
	pub healthy: bool,
	/// One record per probed tier
	pub tiers: Vec<TierHealth>,
	/// When the probe ran
	pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
	pub(crate) fn from_tiers(tiers: Vec<TierHealth>) -> Self {
		Self {
			healthy: tiers.iter().all(|t| t.healthy),
			tiers,
			checked_at: Utc::now(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_overall_health_is_and_of_tiers() {
		let status = HealthStatus::from_tiers(vec![
			TierHealth::ok(CacheLayer::L1),
			TierHealth::failed(CacheLayer::L2, "connection refused".to_string()),
		]);
		assert!(!status.healthy);
		assert!(status.tiers[0].healthy);
		assert!(!status.tiers[1].healthy);
		assert_eq!(status.tiers[1].issues.len(), 1);
	}

	#[test]
	fn test_all_tiers_healthy() {
		let status = HealthStatus::from_tiers(vec![TierHealth::ok(CacheLayer::L1)]);
		assert!(status.healthy);
	}
}
