use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::budget::Budget;
use crate::stability::StabilityOptions;

/// Configuration for [`PlanExecutor`](super::PlanExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorOptions {
	/// Wall-clock bound for a single non-Wait action, probe included.
	pub action_timeout_ms: u64,
	/// Wall-clock bound for the whole plan; `-1` disables it.
	pub plan_timeout_ms: i64,
	/// How often a Wait re-checks its selectors.
	pub selector_poll_ms: u64,
	/// Slice length an unbounded Wait re-arms with.
	pub infinite_wait_slice_ms: u64,
	/// Landmarks captured after a failure that produced no content.
	pub fallback_selectors: Vec<String>,
	pub stability: StabilityOptions,
}

impl Default for ExecutorOptions {
	fn default() -> Self {
		Self {
			action_timeout_ms: 30_000,
			plan_timeout_ms: -1,
			selector_poll_ms: 100,
			infinite_wait_slice_ms: 1_000,
			fallback_selectors: vec!["main".into(), "[role=main]".into(), "body".into()],
			stability: StabilityOptions::default(),
		}
	}
}

impl ExecutorOptions {
	pub fn action_timeout(&self) -> Budget {
		Budget::Bounded(Duration::from_millis(self.action_timeout_ms))
	}

	pub fn plan_timeout(&self) -> Budget {
		Budget::from_millis(self.plan_timeout_ms)
	}

	pub fn selector_poll(&self) -> Duration {
		Duration::from_millis(self.selector_poll_ms.max(1))
	}

	pub fn infinite_wait_slice(&self) -> Duration {
		Duration::from_millis(self.infinite_wait_slice_ms.max(1))
	}

	/// Budget for the best-effort fallback capture.
	pub fn fallback_timeout(&self) -> Duration {
		Duration::from_millis(self.stability.post_action_timeout_ms)
	}
}
