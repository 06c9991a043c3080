//! The driver interface the orchestration layer consumes.
//!
//! A [`Session`] is a live handle to one controlled document. Implementations
//! wrap a real automation backend (Playwright, CDP, WebDriver); this crate only
//! ever talks to the trait. Every method is a suspension point and any of them
//! may fail with [`DriverError::SessionLost`](crate::DriverError::SessionLost).

use std::time::Duration;

use async_trait::async_trait;
use pw_flow_protocol::{Cookie, LoadState, StorageState};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;

/// Snapshot of one element matched by a selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
	/// `outerHTML` of the element.
	pub html: String,
	/// Driver-side text rendering (`innerText`), when available.
	pub text: Option<String>,
}

impl ElementSnapshot {
	pub fn new(html: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			html: html.into(),
			text: Some(text.into()),
		}
	}
}

/// Main-frame navigation observed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
	pub url: String,
}

/// Console message or page error forwarded by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
	/// `log`, `warning`, `error`, or `pageerror` for uncaught exceptions.
	pub kind: String,
	pub text: String,
}

impl ConsoleEntry {
	pub fn is_error(&self) -> bool {
		matches!(self.kind.as_str(), "error" | "pageerror")
	}
}

/// A live, stateful handle to a single controlled document.
#[async_trait]
pub trait Session: Send + Sync {
	/// Returns the current URL as last reported by the driver.
	fn url(&self) -> String;

	/// Navigates the main frame and waits for `wait_until`.
	async fn navigate(&self, url: &str, wait_until: LoadState, timeout: Duration) -> Result<()>;

	/// Returns every element currently matching `selector`.
	async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>>;

	/// Evaluates `script` as a function body called with `args`.
	async fn evaluate(&self, script: &str, args: Value) -> Result<Value>;

	/// Clicks the first element matching `selector`.
	async fn click(&self, selector: &str) -> Result<()>;

	/// Replaces the value of the element matching `selector`.
	async fn fill(&self, selector: &str, value: &str) -> Result<()>;

	/// Types `text` into `selector` one key at a time, pausing `delay` between keys.
	async fn type_text(&self, selector: &str, text: &str, delay: Duration) -> Result<()>;

	/// Presses `key`, focusing `selector` first when given.
	async fn press_key(&self, key: &str, selector: Option<&str>) -> Result<()>;

	async fn cookies(&self) -> Result<Vec<Cookie>>;

	async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()>;

	/// Captures cookies plus per-origin storage.
	///
	/// The default only captures cookies; drivers with storage access override it.
	async fn storage_state(&self) -> Result<StorageState> {
		Ok(StorageState::with_cookies(self.cookies().await?))
	}

	/// Seeds cookies and per-origin storage before the first navigation.
	///
	/// The default only seeds cookies.
	async fn apply_storage_state(&self, state: &StorageState) -> Result<()> {
		if state.cookies.is_empty() {
			return Ok(());
		}
		self.add_cookies(&state.cookies).await
	}

	/// Suspends until the document reaches `state` or `timeout` elapses.
	async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

	/// Subscribes to main-frame navigations from now on.
	fn navigations(&self) -> broadcast::Receiver<NavigationEvent>;

	/// Subscribes to console messages and page errors from now on.
	fn console(&self) -> broadcast::Receiver<ConsoleEntry>;
}
