use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Failures inside the cache. Logged, never returned from `get` or `put`.
#[derive(Debug, Error)]
pub enum CacheError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("malformed cache record: {0}")]
	Json(#[from] serde_json::Error),

	#[error("background write exceeded {ms}ms deadline")]
	WriteDeadline { ms: u64 },

	#[error("background task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}
