//! Driver-side probes evaluated inside the document.

use serde::Deserialize;
use serde_json::json;

use crate::driver::Session;
use crate::error::Result;

/// Counts elements matching `selector`.
pub(crate) const INDICATOR_COUNT_SCRIPT: &str = r#"({ selector }) => {
	try {
		return document.querySelectorAll(selector).length;
	} catch (e) {
		return 0;
	}
}"#;

/// Observes DOM mutations and document height for `windowMs`.
pub(crate) const MUTATION_SAMPLE_SCRIPT: &str = r#"({ windowMs }) => new Promise((resolve) => {
	const root = document.documentElement || document;
	const heightBefore = document.documentElement ? document.documentElement.scrollHeight : 0;
	let mutations = 0;
	const observer = new MutationObserver((records) => { mutations += records.length; });
	observer.observe(root, { childList: true, subtree: true, attributes: true, characterData: true });
	setTimeout(() => {
		observer.disconnect();
		const heightAfter = document.documentElement ? document.documentElement.scrollHeight : 0;
		resolve({ mutations, layoutShift: heightAfter !== heightBefore });
	}, windowMs);
})"#;

/// Waits for running animations to finish, bounded by `settleMs`.
pub(crate) const ANIMATION_SETTLE_SCRIPT: &str = r#"({ settleMs }) => {
	const running = typeof document.getAnimations === "function" ? document.getAnimations() : [];
	const finished = Promise.all(running.map((a) => a.finished.catch(() => null)));
	const cap = new Promise((resolve) => setTimeout(resolve, settleMs));
	return Promise.race([finished, cap]).then(() => running.length);
}"#;

/// One mutation-window observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MutationSample {
	pub mutations: u64,
	pub layout_shift: bool,
}

impl MutationSample {
	pub fn quiet() -> Self {
		Self::default()
	}

	pub fn busy(mutations: u64) -> Self {
		Self {
			mutations,
			layout_shift: false,
		}
	}

	pub fn is_stable(&self, max_mutations: u64) -> bool {
		!self.layout_shift && self.mutations <= max_mutations
	}
}

pub(crate) async fn indicator_count(session: &dyn Session, selector: &str) -> Result<u64> {
	let value = session.evaluate(INDICATOR_COUNT_SCRIPT, json!({ "selector": selector })).await?;
	Ok(value.as_u64().unwrap_or(0))
}

pub(crate) async fn sample_mutations(session: &dyn Session, window_ms: u64) -> Result<MutationSample> {
	let value = session.evaluate(MUTATION_SAMPLE_SCRIPT, json!({ "windowMs": window_ms })).await?;
	Ok(serde_json::from_value(value)?)
}

pub(crate) async fn settle_animations(session: &dyn Session, settle_ms: u64) -> Result<u64> {
	let value = session.evaluate(ANIMATION_SETTLE_SCRIPT, json!({ "settleMs": settle_ms })).await?;
	Ok(value.as_u64().unwrap_or(0))
}
