use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::budget::Budget;

/// Selector matched against common spinner, loader and skeleton markup.
pub const DEFAULT_LOADING_INDICATOR_SELECTOR: &str = "[aria-busy=\"true\"], [role=\"progressbar\"], .spinner, .loading, .loader, .skeleton, [class*=\"spinner\"], [class*=\"skeleton\"]";

/// How much evidence [`await_stable`](super::await_stable) gathers before declaring a document ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StabilityStrategy {
	/// Load states, then the indicator/mutation debounce loop.
	#[default]
	Full,
	/// Load states and the settle delay only.
	LoadState,
}

/// Configuration for the stability detector.
///
/// Every field has a default so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StabilityOptions {
	/// Overall budget in milliseconds; `-1` waits until stable or cancelled.
	pub timeout_ms: i64,
	/// Hard cap on the initial load-state wait.
	pub load_state_cap_ms: u64,
	pub wait_for_network_idle: bool,
	pub network_idle_timeout_ms: u64,
	pub check_loading_indicators: bool,
	pub loading_indicator_selector: String,
	pub poll_interval_ms: u64,
	/// Length of each driver-side mutation sample.
	pub mutation_window_ms: u64,
	/// Mutations tolerated inside one sample before it counts as unstable.
	pub max_mutations: u64,
	/// Consecutive stable samples that confirm stability.
	pub required_stable_samples: u32,
	pub wait_for_animations: bool,
	pub settle_ms: u64,
	/// Treat the session going away as an expected outcome instead of an error.
	pub expect_navigation: bool,
	pub strategy: StabilityStrategy,
	/// Budget used by the post-action probe.
	pub post_action_timeout_ms: u64,
}

impl Default for StabilityOptions {
	fn default() -> Self {
		Self {
			timeout_ms: 10_000,
			load_state_cap_ms: 10_000,
			wait_for_network_idle: true,
			network_idle_timeout_ms: 2_000,
			check_loading_indicators: true,
			loading_indicator_selector: DEFAULT_LOADING_INDICATOR_SELECTOR.to_string(),
			poll_interval_ms: 50,
			mutation_window_ms: 150,
			max_mutations: 0,
			required_stable_samples: 2,
			wait_for_animations: true,
			settle_ms: 100,
			expect_navigation: false,
			strategy: StabilityStrategy::Full,
			post_action_timeout_ms: 3_000,
		}
	}
}

impl StabilityOptions {
	pub fn timeout(&self) -> Budget {
		Budget::from_millis(self.timeout_ms)
	}

	pub fn load_state_cap(&self) -> Duration {
		Duration::from_millis(self.load_state_cap_ms)
	}

	pub fn network_idle_timeout(&self) -> Duration {
		Duration::from_millis(self.network_idle_timeout_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms.max(1))
	}

	pub fn settle(&self) -> Duration {
		Duration::from_millis(self.settle_ms)
	}

	pub fn with_expect_navigation(mut self, expect_navigation: bool) -> Self {
		self.expect_navigation = expect_navigation;
		self
	}

	/// Derives the smaller-budget variant used after every action.
	pub fn post_action(&self, expect_navigation: bool) -> Self {
		let cap = self.post_action_timeout_ms;
		let capped = |ms: u64| ms.min(cap);
		Self {
			timeout_ms: self.timeout().capped(Duration::from_millis(cap)).as_millis() as i64,
			load_state_cap_ms: capped(self.load_state_cap_ms),
			network_idle_timeout_ms: capped(self.network_idle_timeout_ms),
			expect_navigation,
			..self.clone()
		}
	}
}
