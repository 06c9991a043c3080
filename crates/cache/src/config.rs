use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits and location of a [`StateCache`](crate::StateCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
	/// Maximum number of entries in the memory tier.
	pub capacity: usize,
	pub memory_ttl_secs: u64,
	pub disk_ttl_secs: u64,
	/// Deadline for one background disk write.
	pub write_deadline_ms: u64,
	pub sweep_interval_secs: u64,
	/// Record directory; defaults to [`default_state_dir`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			capacity: 20,
			memory_ttl_secs: 30 * 60,
			disk_ttl_secs: 7 * 24 * 60 * 60,
			write_deadline_ms: 2_500,
			sweep_interval_secs: 60 * 60,
			dir: None,
		}
	}
}

impl CacheConfig {
	pub fn memory_ttl(&self) -> Duration {
		Duration::from_secs(self.memory_ttl_secs)
	}

	pub fn disk_ttl(&self) -> Duration {
		Duration::from_secs(self.disk_ttl_secs)
	}

	pub fn write_deadline(&self) -> Duration {
		Duration::from_millis(self.write_deadline_ms)
	}

	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs.max(1))
	}

	pub fn state_dir(&self) -> PathBuf {
		self.dir.clone().unwrap_or_else(default_state_dir)
	}
}

/// `<platform cache dir>/pw-flow/state`, or `./.pw-flow/state` when the
/// platform has no cache directory.
pub fn default_state_dir() -> PathBuf {
	match dirs::cache_dir() {
		Some(base) => base.join("pw-flow").join("state"),
		None => PathBuf::from(".pw-flow").join("state"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_config_keeps_defaults() {
		let config: CacheConfig = serde_json::from_str(r#"{"capacity": 5, "dir": "/tmp/states"}"#).unwrap();
		assert_eq!(config.capacity, 5);
		assert_eq!(config.disk_ttl(), Duration::from_secs(604_800));
		assert_eq!(config.state_dir(), PathBuf::from("/tmp/states"));
	}
}
