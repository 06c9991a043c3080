//! End-to-end run: restore state, navigate, settle, execute, persist state.

use std::time::Duration;

use pw_flow_cache::StateCache;
use pw_flow_protocol::{ExecutionReport, LoadState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::budget::{Bounded, Budget, bounded};
use crate::driver::Session;
use crate::error::FlowError;
use crate::executor::{ExecutorOptions, PlanExecutor};
use crate::plan::ActionPlan;
use crate::stability::{Stability, await_stable};

/// Drives one plan against one session, with optional state caching.
///
/// The cache is the only thing shared across runs; a runner itself holds no
/// per-session state and may be reused for any number of sessions.
#[derive(Debug, Clone)]
pub struct FlowRunner {
	executor: PlanExecutor,
	cache: Option<StateCache>,
	navigation_timeout: Duration,
}

impl FlowRunner {
	pub fn new(options: ExecutorOptions) -> Self {
		Self {
			executor: PlanExecutor::new(options),
			cache: None,
			navigation_timeout: Duration::from_secs(30),
		}
	}

	pub fn with_cache(mut self, cache: StateCache) -> Self {
		self.cache = Some(cache);
		self
	}

	pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
		self.navigation_timeout = timeout;
		self
	}

	pub fn executor(&self) -> &PlanExecutor {
		&self.executor
	}

	pub fn cache(&self) -> Option<&StateCache> {
		self.cache.as_ref()
	}

	/// Runs `plan` at `url`.
	///
	/// Cached state for `url` is applied before navigating, and the session's
	/// state is stored back after any outcome `execute` reports rather than
	/// raises. Cache and storage-state failures are logged and ignored, and so
	/// are navigation errors other than session loss. Session loss before the
	/// first action is reported with index 0.
	pub async fn run(&self, session: &dyn Session, url: &str, plan: &ActionPlan, cancel: &CancellationToken) -> Result<ExecutionReport, FlowError> {
		info!(target = "pw-flow", %url, actions = plan.len(), "starting flow");

		if let Some(cache) = &self.cache {
			match cache.get(url).await {
				Some(state) => {
					debug!(target = "pw-flow", cookies = state.cookies.len(), origins = state.origins.len(), "restoring cached state");
					if let Err(err) = session.apply_storage_state(&state).await {
						warn!(target = "pw-flow", error = %err, "failed to apply cached state");
					}
				}
				None => debug!(target = "pw-flow", %url, "no cached state"),
			}
		}

		let navigation = bounded(
			Budget::Bounded(self.navigation_timeout),
			cancel,
			session.navigate(url, LoadState::DomContentLoaded, self.navigation_timeout),
		)
		.await;
		match navigation {
			Bounded::Done(Ok(())) => {}
			Bounded::Done(Err(err)) if err.is_session_lost() => return Err(FlowError::SessionLost { index: 0, source: err }),
			Bounded::Done(Err(err)) => warn!(target = "pw-flow", %url, error = %err, "navigation reported an error, continuing"),
			Bounded::TimedOut => warn!(target = "pw-flow", %url, timeout_ms = self.navigation_timeout.as_millis() as u64, "navigation timed out, continuing"),
			Bounded::Cancelled => debug!(target = "pw-flow", "cancelled during navigation"),
		}

		let stability = &self.executor.options().stability;
		match await_stable(session, stability, cancel).await {
			Ok(verdict @ (Stability::Confirmed | Stability::Assumed | Stability::Navigated)) => {
				debug!(target = "pw-flow", ?verdict, "initial document ready");
			}
			Ok(Stability::Aborted) => debug!(target = "pw-flow", "cancelled while waiting for initial stability"),
			Err(err) if err.is_session_lost() => return Err(FlowError::SessionLost { index: 0, source: err }),
			Err(err) => debug!(target = "pw-flow", error = %err, "document replaced while settling, continuing"),
		}

		// Cancellation is observed by the executor, which records an aborted first action.
		let report = self.executor.execute(session, plan, cancel).await?;

		if let Some(cache) = &self.cache {
			match session.storage_state().await {
				Ok(state) => cache.put(url, state),
				Err(err) => warn!(target = "pw-flow", error = %err, "failed to capture storage state"),
			}
		}

		info!(target = "pw-flow", %url, outcome = ?report.outcome, statuses = report.statuses.len(), "flow finished");
		Ok(report)
	}
}

impl Default for FlowRunner {
	fn default() -> Self {
		Self::new(ExecutorOptions::default())
	}
}
