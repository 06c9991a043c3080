//! Action plan steps and the per-step audit records produced when running them.

use serde::{Deserialize, Serialize};

use crate::types::{ActionErrorKind, ContentFormat};

/// `timeoutMs` value meaning "no wall-clock bound, cancellable only".
pub const UNBOUNDED_TIMEOUT_MS: i64 = -1;

/// Default `timeoutMs` for a [`Action::Wait`] that omits one.
pub const DEFAULT_WAIT_TIMEOUT_MS: i64 = 30_000;

fn default_wait_timeout() -> i64 {
	DEFAULT_WAIT_TIMEOUT_MS
}

/// A single typed step of an action plan.
///
/// Serialized with a `type` discriminator:
///
/// ```json
/// { "type": "wait", "selectors": ["#app"], "timeoutMs": 5000 }
/// { "type": "typing", "selector": "input[name=q]", "value": "rust", "delayMs": 20 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
	/// Wait until every selector matches, or until the page navigates away.
	Wait {
		selectors: Vec<String>,
		#[serde(default = "default_wait_timeout")]
		timeout_ms: i64,
	},
	/// Click the first element matching `selector`.
	Click { selector: String },
	/// Clear the target and enter `value`, optionally one key at a time.
	#[serde(alias = "type")]
	Typing {
		selector: String,
		value: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		delay_ms: Option<u64>,
	},
	/// Press a key, optionally focusing `selector` first.
	#[serde(alias = "keypress")]
	KeyPress {
		key: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		selector: Option<String>,
	},
	/// Capture the content of every element matching each selector.
	Print {
		selectors: Vec<String>,
		#[serde(default)]
		format: ContentFormat,
	},
}

impl Action {
	/// Wire name of the action type.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Wait { .. } => "wait",
			Self::Click { .. } => "click",
			Self::Typing { .. } => "typing",
			Self::KeyPress { .. } => "keyPress",
			Self::Print { .. } => "print",
		}
	}

	/// Selectors this action targets, in declaration order.
	pub fn selectors(&self) -> Vec<&str> {
		match self {
			Self::Wait { selectors, .. } | Self::Print { selectors, .. } => selectors.iter().map(String::as_str).collect(),
			Self::Click { selector } | Self::Typing { selector, .. } => vec![selector.as_str()],
			Self::KeyPress { selector, .. } => selector.iter().map(String::as_str).collect(),
		}
	}

	/// Returns true for a Wait that may block until cancelled.
	pub fn is_unbounded_wait(&self) -> bool {
		matches!(self, Self::Wait { timeout_ms, .. } if *timeout_ms == UNBOUNDED_TIMEOUT_MS)
	}
}

impl std::fmt::Display for Action {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::KeyPress { key, selector: None } => write!(f, "keyPress({key})"),
			Self::KeyPress { key, selector: Some(sel) } => write!(f, "keyPress({key} on {sel})"),
			other => write!(f, "{}({})", other.name(), other.selectors().join(", ")),
		}
	}
}

/// Content captured for one selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
	pub selector: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	pub format: ContentFormat,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ContentItem {
	/// Error text recorded when a selector matches nothing.
	pub const NO_ELEMENTS: &'static str = "no elements found";

	pub fn content(selector: impl Into<String>, format: ContentFormat, content: impl Into<String>) -> Self {
		Self {
			selector: selector.into(),
			content: Some(content.into()),
			format,
			error: None,
		}
	}

	/// Item for a selector that matched no elements.
	pub fn missing(selector: impl Into<String>, format: ContentFormat) -> Self {
		Self::error(selector, format, Self::NO_ELEMENTS)
	}

	pub fn error(selector: impl Into<String>, format: ContentFormat, error: impl Into<String>) -> Self {
		Self {
			selector: selector.into(),
			content: None,
			format,
			error: Some(error.into()),
		}
	}

	/// Returns true when this item carries content.
	pub fn has_content(&self) -> bool {
		self.content.is_some() && self.error.is_none()
	}
}

/// Outcome of one executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
	pub success: bool,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub warning: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_kind: Option<ActionErrorKind>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub captured: Vec<ContentItem>,
	#[serde(default)]
	pub elapsed_ms: u64,
}

impl ActionResult {
	pub fn success(message: impl Into<String>) -> Self {
		Self {
			success: true,
			message: message.into(),
			warning: None,
			error: None,
			error_kind: None,
			captured: Vec::new(),
			elapsed_ms: 0,
		}
	}

	pub fn failure(kind: ActionErrorKind, message: impl Into<String>, error: impl Into<String>) -> Self {
		Self {
			success: false,
			message: message.into(),
			warning: None,
			error: Some(error.into()),
			error_kind: Some(kind),
			captured: Vec::new(),
			elapsed_ms: 0,
		}
	}

	/// Sets the warning attached to a (usually successful) result.
	pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
		self.warning = Some(warning.into());
		self
	}

	pub fn with_captured(mut self, captured: Vec<ContentItem>) -> Self {
		self.captured = captured;
		self
	}

	pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
		self.elapsed_ms = elapsed_ms;
		self
	}

	/// Returns true when cancellation ended this action.
	pub fn is_aborted(&self) -> bool {
		self.error_kind == Some(ActionErrorKind::Aborted)
	}
}

/// Audit-trail entry: one per action actually attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStatus {
	/// 1-based position of the action within the plan.
	pub index: usize,
	/// Number of actions in the plan.
	pub total: usize,
	pub action: Action,
	pub result: ActionResult,
}
