//! Scripted in-memory [`Session`] for tests.
//!
//! [`ScriptedSession`] never talks to a browser. Tests script what the
//! document reports (indicator counts, mutation samples, matching elements,
//! navigations, failures) and then assert on the recorded call log.
//!
//! # Example
//!
//! ```ignore
//! let session = ScriptedSession::new("https://example.com");
//! session.set_elements("h1", vec![ElementSnapshot::new("<h1>Hi</h1>", "Hi")]);
//! session.on_click_navigate("#go", "https://example.com/next", true);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_flow_protocol::{Cookie, LoadState, StorageState};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::driver::{ConsoleEntry, ElementSnapshot, NavigationEvent, Session};
use crate::error::{DriverError, Result};
use crate::stability::probe::{ANIMATION_SETTLE_SCRIPT, INDICATOR_COUNT_SCRIPT, MUTATION_SAMPLE_SCRIPT, MutationSample};

type ErrorFactory = Arc<dyn Fn() -> DriverError + Send + Sync>;

#[derive(Clone)]
struct ClickNavigation {
	url: String,
	destroys_context: bool,
}

#[derive(Default)]
struct State {
	url: String,
	calls: Vec<String>,
	indicator_counts: VecDeque<u64>,
	last_indicator_count: u64,
	indicator_queries: usize,
	mutation_samples: VecDeque<MutationSample>,
	default_sample: MutationSample,
	elements: HashMap<String, Vec<ElementSnapshot>>,
	interaction_failures: HashMap<String, ErrorFactory>,
	query_failures: HashMap<String, ErrorFactory>,
	stalled_queries: HashSet<String>,
	probe_failure: Option<ErrorFactory>,
	click_navigations: HashMap<String, ClickNavigation>,
	context_destroyed: bool,
	stall_load_states: bool,
	storage: StorageState,
	applied_storage: Vec<StorageState>,
	cookies: Vec<Cookie>,
}

/// An in-memory session whose behaviour is scripted by the test.
#[derive(Clone)]
pub struct ScriptedSession {
	state: Arc<Mutex<State>>,
	navigation_tx: broadcast::Sender<NavigationEvent>,
	console_tx: broadcast::Sender<ConsoleEntry>,
}

impl ScriptedSession {
	pub fn new(url: impl Into<String>) -> Self {
		let (navigation_tx, _) = broadcast::channel(64);
		let (console_tx, _) = broadcast::channel(256);
		Self {
			state: Arc::new(Mutex::new(State {
				url: url.into(),
				..Default::default()
			})),
			navigation_tx,
			console_tx,
		}
	}

	/// Loading-indicator counts returned by successive probes; the last one repeats.
	pub fn script_indicator_counts(&self, counts: impl IntoIterator<Item = u64>) {
		self.state.lock().indicator_counts = counts.into_iter().collect();
	}

	/// Mutation samples returned by successive probes before the default applies.
	pub fn script_mutation_samples(&self, samples: impl IntoIterator<Item = MutationSample>) {
		self.state.lock().mutation_samples = samples.into_iter().collect();
	}

	pub fn set_default_mutation_sample(&self, sample: MutationSample) {
		self.state.lock().default_sample = sample;
	}

	/// Makes every load-state wait and probe evaluation fail with `make()`.
	pub fn fail_probes_with(&self, make: impl Fn() -> DriverError + Send + Sync + 'static) {
		self.state.lock().probe_failure = Some(Arc::new(make));
	}

	/// Makes load-state waits hang until the caller's budget expires.
	pub fn stall_load_states(&self, stall: bool) {
		self.state.lock().stall_load_states = stall;
	}

	pub fn set_elements(&self, selector: impl Into<String>, elements: Vec<ElementSnapshot>) {
		self.state.lock().elements.insert(selector.into(), elements);
	}

	/// Makes `selector` start matching `elements` after `delay`.
	pub fn reveal_after(&self, selector: impl Into<String>, elements: Vec<ElementSnapshot>, delay: Duration) {
		let state = Arc::clone(&self.state);
		let selector = selector.into();
		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			state.lock().elements.insert(selector, elements);
		});
	}

	/// Emits a main-frame navigation to `url` after `delay`.
	pub fn navigate_after(&self, url: impl Into<String>, delay: Duration) {
		let session = self.clone();
		let url = url.into();
		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			session.emit_navigation(url);
		});
	}

	/// Emits a main-frame navigation to `url` now.
	pub fn emit_navigation(&self, url: impl Into<String>) {
		let url = url.into();
		self.state.lock().url = url.clone();
		let _ = self.navigation_tx.send(NavigationEvent { url });
	}

	pub fn emit_console(&self, kind: &str, text: &str) {
		let _ = self.console_tx.send(ConsoleEntry {
			kind: kind.to_string(),
			text: text.to_string(),
		});
	}

	/// Makes clicking `selector` navigate to `url`.
	///
	/// With `destroys_context`, the next driver call after the click fails with
	/// [`DriverError::ContextDestroyed`].
	pub fn on_click_navigate(&self, selector: impl Into<String>, url: impl Into<String>, destroys_context: bool) {
		self.state.lock().click_navigations.insert(
			selector.into(),
			ClickNavigation {
				url: url.into(),
				destroys_context,
			},
		);
	}

	/// Makes every interaction with `selector` fail with `make()`.
	pub fn fail_interaction(&self, selector: impl Into<String>, make: impl Fn() -> DriverError + Send + Sync + 'static) {
		self.state.lock().interaction_failures.insert(selector.into(), Arc::new(make));
	}

	/// Makes `query_all(selector)` fail with `make()`.
	pub fn fail_query(&self, selector: impl Into<String>, make: impl Fn() -> DriverError + Send + Sync + 'static) {
		self.state.lock().query_failures.insert(selector.into(), Arc::new(make));
	}

	/// Makes queries for `selector` never resolve.
	pub fn stall_query(&self, selector: impl Into<String>) {
		self.state.lock().stalled_queries.insert(selector.into());
	}

	pub fn set_storage_state(&self, storage: StorageState) {
		self.state.lock().storage = storage;
	}

	/// Storage states passed to [`Session::apply_storage_state`], in order.
	pub fn applied_storage(&self) -> Vec<StorageState> {
		self.state.lock().applied_storage.clone()
	}

	pub fn indicator_queries(&self) -> usize {
		self.state.lock().indicator_queries
	}

	/// Every recorded call, probes included.
	pub fn calls(&self) -> Vec<String> {
		self.state.lock().calls.clone()
	}

	/// Recorded calls that change the document (navigate, click, fill, type, press).
	pub fn interactions(&self) -> Vec<String> {
		self.state
			.lock()
			.calls
			.iter()
			.filter(|c| ["navigate ", "click ", "fill ", "type ", "press "].iter().any(|p| c.starts_with(p)))
			.cloned()
			.collect()
	}

	fn record(&self, call: String) {
		self.state.lock().calls.push(call);
	}

	/// Fails the call when the context was destroyed or probes are scripted to fail.
	fn check_probe(&self) -> Result<()> {
		let mut state = self.state.lock();
		if state.context_destroyed {
			state.context_destroyed = false;
			return Err(DriverError::ContextDestroyed("Execution context was destroyed".into()));
		}
		match &state.probe_failure {
			Some(make) => Err(make()),
			None => Ok(()),
		}
	}

	fn check_interaction(&self, selector: &str) -> Result<()> {
		let state = self.state.lock();
		if let Some(make) = state.interaction_failures.get(selector) {
			return Err(make());
		}
		Ok(())
	}
}

#[async_trait]
impl Session for ScriptedSession {
	fn url(&self) -> String {
		self.state.lock().url.clone()
	}

	async fn navigate(&self, url: &str, _wait_until: LoadState, _timeout: Duration) -> Result<()> {
		self.record(format!("navigate {url}"));
		self.emit_navigation(url);
		Ok(())
	}

	async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>> {
		self.record(format!("query {selector}"));
		let stalled = self.state.lock().stalled_queries.contains(selector);
		if stalled {
			std::future::pending::<()>().await;
		}
		let state = self.state.lock();
		if let Some(make) = state.query_failures.get(selector) {
			return Err(make());
		}
		Ok(state.elements.get(selector).cloned().unwrap_or_default())
	}

	async fn evaluate(&self, script: &str, _args: Value) -> Result<Value> {
		self.check_probe()?;
		let mut state = self.state.lock();
		if script == INDICATOR_COUNT_SCRIPT {
			state.calls.push("probe indicators".into());
			state.indicator_queries += 1;
			if let Some(count) = state.indicator_counts.pop_front() {
				state.last_indicator_count = count;
			}
			return Ok(json!(state.last_indicator_count));
		}
		if script == MUTATION_SAMPLE_SCRIPT {
			state.calls.push("probe mutations".into());
			let sample = state.mutation_samples.pop_front().unwrap_or(state.default_sample);
			return Ok(json!({ "mutations": sample.mutations, "layoutShift": sample.layout_shift }));
		}
		if script == ANIMATION_SETTLE_SCRIPT {
			state.calls.push("probe animations".into());
			return Ok(json!(0));
		}
		state.calls.push("evaluate".into());
		Ok(Value::Null)
	}

	async fn click(&self, selector: &str) -> Result<()> {
		self.record(format!("click {selector}"));
		self.check_interaction(selector)?;
		let navigation = self.state.lock().click_navigations.get(selector).cloned();
		match navigation {
			Some(nav) => {
				self.emit_navigation(nav.url);
				if nav.destroys_context {
					self.state.lock().context_destroyed = true;
				}
				Ok(())
			}
			None if self.state.lock().elements.contains_key(selector) => Ok(()),
			None => Err(DriverError::ElementNotFound { selector: selector.into() }),
		}
	}

	async fn fill(&self, selector: &str, value: &str) -> Result<()> {
		self.record(format!("fill {selector} {value:?}"));
		self.check_interaction(selector)
	}

	async fn type_text(&self, selector: &str, text: &str, delay: Duration) -> Result<()> {
		self.record(format!("type {selector} {text:?} {}ms", delay.as_millis()));
		self.check_interaction(selector)
	}

	async fn press_key(&self, key: &str, selector: Option<&str>) -> Result<()> {
		self.record(format!("press {key} {}", selector.unwrap_or("-")));
		match selector {
			Some(selector) => self.check_interaction(selector),
			None => Ok(()),
		}
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		self.record("cookies".into());
		Ok(self.state.lock().cookies.clone())
	}

	async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()> {
		self.record(format!("add_cookies {}", cookies.len()));
		self.state.lock().cookies.extend_from_slice(cookies);
		Ok(())
	}

	async fn storage_state(&self) -> Result<StorageState> {
		self.record("storage_state".into());
		Ok(self.state.lock().storage.clone())
	}

	async fn apply_storage_state(&self, state: &StorageState) -> Result<()> {
		self.record("apply_storage_state".into());
		let mut inner = self.state.lock();
		inner.applied_storage.push(state.clone());
		inner.storage = state.clone();
		Ok(())
	}

	async fn wait_for_load_state(&self, state: LoadState, _timeout: Duration) -> Result<()> {
		self.record(format!("wait_for_load_state {state}"));
		self.check_probe()?;
		if self.state.lock().stall_load_states {
			std::future::pending::<()>().await;
		}
		Ok(())
	}

	fn navigations(&self) -> broadcast::Receiver<NavigationEvent> {
		self.navigation_tx.subscribe()
	}

	fn console(&self) -> broadcast::Receiver<ConsoleEntry> {
		self.console_tx.subscribe()
	}
}
