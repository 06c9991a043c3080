//! Wall-clock budgets and the cancellable bounded-wait primitive.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A wall-clock bound for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
	Bounded(Duration),
	/// No wall-clock bound; only cancellation ends the wait.
	Unbounded,
}

impl Budget {
	/// Builds a budget from wire millis, where any negative value means unbounded.
	pub fn from_millis(ms: i64) -> Self {
		u64::try_from(ms).map_or(Self::Unbounded, |ms| Self::Bounded(Duration::from_millis(ms)))
	}

	pub fn is_unbounded(&self) -> bool {
		matches!(self, Self::Unbounded)
	}

	/// Returns the tighter of two budgets.
	pub fn min(self, other: Budget) -> Budget {
		match (self, other) {
			(Self::Bounded(a), Self::Bounded(b)) => Self::Bounded(a.min(b)),
			(Self::Bounded(a), Self::Unbounded) | (Self::Unbounded, Self::Bounded(a)) => Self::Bounded(a),
			(Self::Unbounded, Self::Unbounded) => Self::Unbounded,
		}
	}

	/// Caps this budget at `cap`.
	pub fn capped(self, cap: Duration) -> Duration {
		match self {
			Self::Bounded(d) => d.min(cap),
			Self::Unbounded => cap,
		}
	}

	/// Absolute deadline measured from `start`, if bounded.
	pub fn deadline_from(self, start: Instant) -> Option<Instant> {
		match self {
			Self::Bounded(d) => Some(start + d),
			Self::Unbounded => None,
		}
	}

	pub fn as_millis(&self) -> i64 {
		match self {
			Self::Bounded(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
			Self::Unbounded => -1,
		}
	}
}

impl std::fmt::Display for Budget {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Bounded(d) => write!(f, "{}ms", d.as_millis()),
			Self::Unbounded => write!(f, "unbounded"),
		}
	}
}

/// Outcome of a cancellable, bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bounded<T> {
	Done(T),
	TimedOut,
	Cancelled,
}

impl<T> Bounded<T> {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

/// Races `fut` against `budget` and `cancel`.
///
/// Cancellation is checked first so an already-fired token never lets the
/// operation start. The losing future is dropped.
pub async fn bounded<F>(budget: Budget, cancel: &CancellationToken, fut: F) -> Bounded<F::Output>
where
	F: Future,
{
	if cancel.is_cancelled() {
		return Bounded::Cancelled;
	}
	match budget {
		Budget::Bounded(limit) => {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => Bounded::Cancelled,
				res = tokio::time::timeout(limit, fut) => match res {
					Ok(value) => Bounded::Done(value),
					Err(_) => Bounded::TimedOut,
				},
			}
		}
		Budget::Unbounded => {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => Bounded::Cancelled,
				value = fut => Bounded::Done(value),
			}
		}
	}
}

/// Sleeps for `duration` unless cancelled first. Returns false when cancelled.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => false,
		_ = tokio::time::sleep(duration) => true,
	}
}
