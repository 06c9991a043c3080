//! Readiness detection for asynchronously rendering documents.
//!
//! [`await_stable`] decides, without ground truth, when a document has settled
//! enough to read or act on:
//!
//! 1. Wait for `domcontentloaded`, bounded by `min(timeout, loadStateCap)`.
//! 2. Optionally wait for network idle, bounded by `networkIdleTimeout`.
//! 3. Poll the loading-indicator count and a mutation window together. Any
//!    change in the count, a non-zero count, or a noisy window resets the
//!    streak; [`StabilityOptions::required_stable_samples`] quiet samples in a
//!    row confirm stability.
//! 4. When the budget runs out without confirmation the document is assumed
//!    ready.
//!
//! Timeouts are never errors here. The only error is the session going away
//! while no navigation was expected.

mod options;
pub mod probe;

use std::time::Duration;

use pw_flow_protocol::LoadState;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub use self::options::{DEFAULT_LOADING_INDICATOR_SELECTOR, StabilityOptions, StabilityStrategy};
use crate::budget::{Budget, Bounded, bounded, sleep_or_cancel};
use crate::driver::Session;
use crate::error::{DriverError, Result};

/// Verdict of a stability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
	/// Enough consecutive quiet samples were observed.
	Confirmed,
	/// The budget ran out without proof of instability; proceed anyway.
	Assumed,
	/// The document went away while a navigation was expected.
	Navigated,
	/// Cancellation fired before a verdict.
	Aborted,
}

impl Stability {
	/// Returns true when it is safe to proceed.
	pub fn is_ready(&self) -> bool {
		!matches!(self, Self::Aborted)
	}
}

/// Waits until the document in `session` is safe to read or act on.
pub async fn await_stable(session: &dyn Session, options: &StabilityOptions, cancel: &CancellationToken) -> Result<Stability> {
	let started = Instant::now();
	let budget = options.timeout();

	let load_timeout = budget.capped(options.load_state_cap());
	let mut reached = match wait_load_state(session, LoadState::DomContentLoaded, load_timeout, options, cancel).await? {
		Step::Reached => true,
		Step::Skipped => false,
		Step::Finish(verdict) => return Ok(verdict),
	};

	if options.wait_for_network_idle {
		let idle_timeout = budget.capped(options.network_idle_timeout());
		match wait_load_state(session, LoadState::NetworkIdle, idle_timeout, options, cancel).await? {
			Step::Reached => {}
			Step::Skipped => reached = false,
			Step::Finish(verdict) => return Ok(verdict),
		}
	}

	if options.strategy == StabilityStrategy::LoadState {
		if !sleep_or_cancel(options.settle(), cancel).await {
			return Ok(Stability::Aborted);
		}
		return Ok(if reached { Stability::Confirmed } else { Stability::Assumed });
	}

	poll_until_stable(session, options, budget.deadline_from(started), cancel).await
}

/// Shorter-budget probe run after every individual action.
pub async fn await_post_action_stable(
	session: &dyn Session,
	options: &StabilityOptions,
	expect_navigation: bool,
	cancel: &CancellationToken,
) -> Result<Stability> {
	await_stable(session, &options.post_action(expect_navigation), cancel).await
}

enum Step {
	Reached,
	Skipped,
	Finish(Stability),
}

async fn wait_load_state(
	session: &dyn Session,
	state: LoadState,
	timeout: Duration,
	options: &StabilityOptions,
	cancel: &CancellationToken,
) -> Result<Step> {
	match bounded(Budget::Bounded(timeout), cancel, session.wait_for_load_state(state, timeout)).await {
		Bounded::Done(Ok(())) => Ok(Step::Reached),
		Bounded::Done(Err(err)) => match absorb(err, options)? {
			Some(verdict) => Ok(Step::Finish(verdict)),
			None => Ok(Step::Skipped),
		},
		Bounded::TimedOut => {
			debug!(target = "pw-flow", %state, timeout_ms = timeout.as_millis() as u64, "load state not reached, continuing");
			Ok(Step::Skipped)
		}
		Bounded::Cancelled => Ok(Step::Finish(Stability::Aborted)),
	}
}

/// Turns a driver error into a verdict, a tolerated miss, or a propagated error.
fn absorb(err: DriverError, options: &StabilityOptions) -> Result<Option<Stability>> {
	if err.is_gone() {
		if options.expect_navigation {
			debug!(target = "pw-flow", error = %err, "document went away during expected navigation");
			return Ok(Some(Stability::Navigated));
		}
		return Err(err);
	}
	debug!(target = "pw-flow", error = %err, "stability probe failed, continuing");
	Ok(None)
}

async fn poll_until_stable(
	session: &dyn Session,
	options: &StabilityOptions,
	deadline: Option<Instant>,
	cancel: &CancellationToken,
) -> Result<Stability> {
	let mut previous_count: Option<u64> = None;
	let mut streak = 0u32;
	let mut samples = 0u32;
	let required = options.required_stable_samples.max(1);

	loop {
		let remaining = match deadline {
			Some(deadline) => {
				let now = Instant::now();
				if now >= deadline {
					break;
				}
				Budget::Bounded(deadline - now)
			}
			None => Budget::Unbounded,
		};

		let indicators = async {
			if options.check_loading_indicators {
				probe::indicator_count(session, &options.loading_indicator_selector).await
			} else {
				Ok(0)
			}
		};
		let mutations = probe::sample_mutations(session, options.mutation_window_ms);

		let (count, sample) = match bounded(remaining, cancel, async { tokio::join!(indicators, mutations) }).await {
			Bounded::Done(pair) => pair,
			Bounded::TimedOut => break,
			Bounded::Cancelled => return Ok(Stability::Aborted),
		};
		samples += 1;

		let count = match count {
			Ok(count) => Some(count),
			Err(err) => match absorb(err, options)? {
				Some(verdict) => return Ok(verdict),
				None => None,
			},
		};
		let sample = match sample {
			Ok(sample) => Some(sample),
			Err(err) => match absorb(err, options)? {
				Some(verdict) => return Ok(verdict),
				None => None,
			},
		};

		let churned = matches!((previous_count, count), (Some(prev), Some(now)) if prev != now);
		let quiet = count == Some(0) && sample.is_some_and(|s| s.is_stable(options.max_mutations));

		if churned || !quiet {
			streak = 0;
		} else {
			streak += 1;
		}
		trace!(target = "pw-flow", samples, ?count, ?sample, streak, "stability sample");
		previous_count = count;

		if streak >= required {
			debug!(target = "pw-flow", samples, "document stable");
			return settle(session, options, cancel).await;
		}

		if !sleep_or_cancel(options.poll_interval(), cancel).await {
			return Ok(Stability::Aborted);
		}
	}

	debug!(target = "pw-flow", samples, streak, "stability budget exhausted, assuming ready");
	Ok(Stability::Assumed)
}

async fn settle(session: &dyn Session, options: &StabilityOptions, cancel: &CancellationToken) -> Result<Stability> {
	if !options.wait_for_animations {
		return Ok(Stability::Confirmed);
	}
	// The driver caps the wait at settleMs; the extra slack covers the round trip.
	let limit = Budget::Bounded(options.settle() + Duration::from_millis(500));
	match bounded(limit, cancel, probe::settle_animations(session, options.settle_ms)).await {
		Bounded::Done(Ok(running)) => {
			trace!(target = "pw-flow", running, "animations settled");
			Ok(Stability::Confirmed)
		}
		Bounded::Done(Err(err)) => Ok(absorb(err, options)?.unwrap_or(Stability::Confirmed)),
		Bounded::TimedOut => Ok(Stability::Confirmed),
		Bounded::Cancelled => Ok(Stability::Aborted),
	}
}
