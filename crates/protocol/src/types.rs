//! Small enums shared by plans, reports and the driver interface.

use serde::{Deserialize, Serialize};

/// Document load states a driver can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
	/// The `load` event fired
	Load,
	/// The DOMContentLoaded event fired
	#[default]
	#[serde(rename = "domcontentloaded")]
	DomContentLoaded,
	/// No network connections for at least 500ms
	#[serde(rename = "networkidle")]
	NetworkIdle,
}

impl std::fmt::Display for LoadState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Load => write!(f, "load"),
			Self::DomContentLoaded => write!(f, "domcontentloaded"),
			Self::NetworkIdle => write!(f, "networkidle"),
		}
	}
}

/// Format of captured content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
	/// Element markup (`outerHTML`)
	#[default]
	Html,
	/// Rendered text as reported by the driver
	Text,
}

impl std::fmt::Display for ContentFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Html => write!(f, "html"),
			Self::Text => write!(f, "text"),
		}
	}
}

/// Failure class recorded on an unsuccessful [`ActionResult`](crate::ActionResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionErrorKind {
	/// A selector the action depends on never matched.
	ElementNotFound,
	/// The action exceeded its wall-clock budget.
	ActionTimeout,
	/// External cancellation fired while the action was running.
	Aborted,
	/// Any other driver-reported failure.
	Driver,
}

impl std::fmt::Display for ActionErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::ElementNotFound => write!(f, "elementNotFound"),
			Self::ActionTimeout => write!(f, "actionTimeout"),
			Self::Aborted => write!(f, "aborted"),
			Self::Driver => write!(f, "driver"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn load_state_uses_driver_names() {
		assert_eq!(serde_json::to_string(&LoadState::DomContentLoaded).unwrap(), "\"domcontentloaded\"");
		assert_eq!(serde_json::to_string(&LoadState::NetworkIdle).unwrap(), "\"networkidle\"");
		let parsed: LoadState = serde_json::from_str("\"load\"").unwrap();
		assert_eq!(parsed, LoadState::Load);
	}

	#[test]
	fn error_kind_display_matches_wire_name() {
		for kind in [ActionErrorKind::ElementNotFound, ActionErrorKind::ActionTimeout, ActionErrorKind::Aborted] {
			let wire = serde_json::to_value(kind).unwrap();
			assert_eq!(wire.as_str().unwrap(), kind.to_string());
		}
	}
}
