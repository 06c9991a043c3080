//! Wall-clock source for TTL arithmetic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + std::fmt::Debug {
	fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> u64 {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
			.unwrap_or(0)
	}
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	now_ms: Arc<AtomicU64>,
}

impl ManualClock {
	pub fn new(start_ms: u64) -> Self {
		Self {
			now_ms: Arc::new(AtomicU64::new(start_ms)),
		}
	}

	pub fn advance(&self, by: Duration) {
		let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
		self.now_ms.fetch_add(by, Ordering::SeqCst);
	}

	pub fn set(&self, now_ms: u64) {
		self.now_ms.store(now_ms, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now_ms(&self) -> u64 {
		self.now_ms.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn manual_clock_clones_share_time() {
		let clock = ManualClock::new(1_000);
		let other = clock.clone();
		clock.advance(Duration::from_secs(2));
		assert_eq!(other.now_ms(), 3_000);
	}
}
