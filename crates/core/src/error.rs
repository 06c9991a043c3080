//! Error types for driver calls, plan validation and plan execution.

use std::sync::LazyLock;

use regex::RegexSet;
use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors a [`Session`](crate::Session) implementation may raise.
#[derive(Debug, Error)]
pub enum DriverError {
	/// The session itself is gone (browser closed, connection dropped).
	#[error("session lost: {0}")]
	SessionLost(String),

	/// The document the call ran against was torn down, usually by a navigation.
	#[error("execution context destroyed: {0}")]
	ContextDestroyed(String),

	/// No element matched the selector.
	#[error("element not found: selector '{selector}'")]
	ElementNotFound { selector: String },

	/// The driver gave up waiting.
	#[error("timeout after {ms}ms: {operation}")]
	Timeout { ms: u64, operation: String },

	/// Script evaluation failed inside the document.
	#[error("evaluation failed: {0}")]
	Evaluation(String),

	/// Anything else the driver reported.
	#[error("driver error: {0}")]
	Protocol(String),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

static SESSION_LOST: LazyLock<RegexSet> = LazyLock::new(|| {
	RegexSet::new([
		r"(?i)target (page, context or browser )?(has been )?closed",
		r"(?i)browser has disconnected",
		r"(?i)connection closed",
		r"(?i)session (closed|not found)",
	])
	.expect("static patterns compile")
});

static CONTEXT_DESTROYED: LazyLock<RegexSet> = LazyLock::new(|| {
	RegexSet::new([
		r"(?i)execution context was destroyed",
		r"(?i)frame was detached",
		r"(?i)cannot find context with specified id",
		r"(?i)navigat(ed|ing|ion) (away|interrupted)",
	])
	.expect("static patterns compile")
});

static TIMEOUT: LazyLock<RegexSet> =
	LazyLock::new(|| RegexSet::new([r"(?i)timeout \d+ ?ms exceeded", r"(?i)timed out"]).expect("static patterns compile"));

impl DriverError {
	/// Maps a raw driver error message to the matching variant.
	///
	/// Drivers that only surface strings (CDP, Playwright JSON-RPC) route their
	/// failures through here so the orchestration layer can tell navigation
	/// side effects apart from real failures.
	pub fn classify(message: impl Into<String>) -> Self {
		let message = message.into();
		if CONTEXT_DESTROYED.is_match(&message) {
			Self::ContextDestroyed(message)
		} else if SESSION_LOST.is_match(&message) {
			Self::SessionLost(message)
		} else if TIMEOUT.is_match(&message) {
			Self::Timeout { ms: 0, operation: message }
		} else {
			Self::Protocol(message)
		}
	}

	/// Returns true when the session can no longer be used.
	pub fn is_session_lost(&self) -> bool {
		matches!(self, Self::SessionLost(_))
	}

	/// Returns true when the error is the side effect of a navigation.
	pub fn is_navigation(&self) -> bool {
		matches!(self, Self::ContextDestroyed(_))
	}

	/// Returns true for either flavour of "the document went away".
	pub fn is_gone(&self) -> bool {
		self.is_session_lost() || self.is_navigation()
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}

/// Structural problems with a plan document, detected before any driver call.
#[derive(Debug, Error)]
pub enum PlanError {
	#[error("plan is missing the `actions` field")]
	MissingActions,

	#[error("plan `actions` must be an array")]
	ActionsNotArray,

	#[error("plan `actions` must not be empty")]
	Empty,

	#[error("action {index}: {message}")]
	InvalidAction { index: usize, message: String },

	#[error("plan is not valid JSON: {0}")]
	Parse(#[from] serde_json::Error),
}

/// Errors that escape [`PlanExecutor::execute`](crate::PlanExecutor::execute).
///
/// Everything else is captured in the per-action results.
#[derive(Debug, Error)]
pub enum FlowError {
	#[error("invalid plan: {0}")]
	InvalidPlan(#[from] PlanError),

	/// `index` is the 1-based action being run, or 0 before the first action.
	#[error("session lost during action {index}")]
	SessionLost {
		index: usize,
		#[source]
		source: DriverError,
	},
}
