use thiserror::Error;

/// Errors raised inside the cache subsystem.
///
/// Callers of the facade never see these from the read/write path: tier
/// failures are swallowed there, counted, and logged. They surface only
/// from constructors and from direct backend use.
#[derive(Debug, Error)]
pub enum CacheError {
	/// A storage tier is unreachable or rejected an operation
	#[error("cache backend error: {0}")]
	Backend(String),

	/// A value could not be serialized or deserialized
	#[error("serialization error: {0}")]
	Serialization(String),

	/// A stampede lock could not be acquired or released
	#[error("lock error: {0}")]
	Lock(String),

	/// The cache was configured with unusable settings
	#[error("configuration error: {0}")]
	Config(String),
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
