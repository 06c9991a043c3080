//! Validated action plans.

use pw_flow_protocol::{Action, UNBOUNDED_TIMEOUT_MS};
use serde_json::Value;

use crate::error::PlanError;

/// An ordered, non-empty, validated sequence of actions.
///
/// The only way to build one is through validation, so an `ActionPlan` in
/// hand never triggers [`PlanError`] later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
	url: Option<String>,
	actions: Vec<Action>,
}

impl ActionPlan {
	/// Validates `actions` into a plan.
	pub fn new(actions: Vec<Action>) -> Result<Self, PlanError> {
		if actions.is_empty() {
			return Err(PlanError::Empty);
		}
		for (i, action) in actions.iter().enumerate() {
			validate_action(i + 1, action)?;
		}
		Ok(Self { url: None, actions })
	}

	/// Parses and validates a plan document (`{"url"?: string, "actions": [...]}`).
	pub fn from_value(value: &Value) -> Result<Self, PlanError> {
		let actions = value.get("actions").ok_or(PlanError::MissingActions)?;
		let items = actions.as_array().ok_or(PlanError::ActionsNotArray)?;

		let actions = items
			.iter()
			.enumerate()
			.map(|(i, item)| {
				serde_json::from_value::<Action>(item.clone()).map_err(|e| PlanError::InvalidAction {
					index: i + 1,
					message: e.to_string(),
				})
			})
			.collect::<Result<Vec<_>, _>>()?;

		let mut plan = Self::new(actions)?;
		plan.url = value.get("url").and_then(Value::as_str).map(String::from);
		Ok(plan)
	}

	pub fn from_json(json: &str) -> Result<Self, PlanError> {
		let value: Value = serde_json::from_str(json)?;
		Self::from_value(&value)
	}

	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	/// Navigation target declared by the plan document, if any.
	pub fn url(&self) -> Option<&str> {
		self.url.as_deref()
	}

	pub fn actions(&self) -> &[Action] {
		&self.actions
	}

	pub fn len(&self) -> usize {
		self.actions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Action> {
		self.actions.iter()
	}
}

impl<'a> IntoIterator for &'a ActionPlan {
	type Item = &'a Action;
	type IntoIter = std::slice::Iter<'a, Action>;

	fn into_iter(self) -> Self::IntoIter {
		self.actions.iter()
	}
}

fn validate_action(index: usize, action: &Action) -> Result<(), PlanError> {
	let invalid = |message: &str| PlanError::InvalidAction {
		index,
		message: format!("{}: {message}", action.name()),
	};

	match action {
		Action::Wait { selectors, timeout_ms } => {
			if selectors.is_empty() {
				return Err(invalid("at least one selector is required"));
			}
			if *timeout_ms < UNBOUNDED_TIMEOUT_MS {
				return Err(invalid("timeoutMs must be -1 (unbounded) or a non-negative number"));
			}
		}
		Action::Print { selectors, .. } => {
			if selectors.is_empty() {
				return Err(invalid("at least one selector is required"));
			}
		}
		Action::KeyPress { key, .. } => {
			if key.trim().is_empty() {
				return Err(invalid("key must not be empty"));
			}
		}
		Action::Click { .. } | Action::Typing { .. } => {}
	}

	if action.selectors().iter().any(|s| s.trim().is_empty()) {
		return Err(invalid("selectors must not be blank"));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn parses_plan_with_url() {
		let plan = ActionPlan::from_value(&json!({
			"url": "https://example.com",
			"actions": [
				{ "type": "wait", "selectors": ["#app"], "timeoutMs": -1 },
				{ "type": "click", "selector": "#go" },
				{ "type": "print", "selectors": ["main"], "format": "text" }
			]
		}))
		.unwrap();

		assert_eq!(plan.len(), 3);
		assert_eq!(plan.url(), Some("https://example.com"));
		assert!(plan.actions()[0].is_unbounded_wait());
	}

	#[test]
	fn rejects_missing_actions() {
		let err = ActionPlan::from_value(&json!({ "url": "https://example.com" })).unwrap_err();
		assert!(matches!(err, PlanError::MissingActions));
	}

	#[test]
	fn rejects_non_array_actions() {
		let err = ActionPlan::from_value(&json!({ "actions": { "type": "click" } })).unwrap_err();
		assert!(matches!(err, PlanError::ActionsNotArray));
	}

	#[test]
	fn rejects_empty_plan() {
		let err = ActionPlan::from_value(&json!({ "actions": [] })).unwrap_err();
		assert!(matches!(err, PlanError::Empty));
	}

	#[test]
	fn reports_index_of_unknown_type() {
		let err = ActionPlan::from_value(&json!({
			"actions": [
				{ "type": "click", "selector": "#a" },
				{ "type": "hover", "selector": "#b" }
			]
		}))
		.unwrap_err();
		assert!(matches!(err, PlanError::InvalidAction { index: 2, .. }), "got {err:?}");
	}

	#[test]
	fn rejects_bad_wait_fields() {
		let err = ActionPlan::from_value(&json!({ "actions": [{ "type": "wait", "selectors": [] }] })).unwrap_err();
		assert!(matches!(err, PlanError::InvalidAction { index: 1, .. }));

		let err = ActionPlan::from_value(&json!({ "actions": [{ "type": "wait", "selectors": ["#a"], "timeoutMs": -5 }] })).unwrap_err();
		assert!(err.to_string().contains("timeoutMs"));
	}

	#[test]
	fn rejects_blank_selector() {
		let err = ActionPlan::new(vec![Action::Click { selector: "  ".into() }]).unwrap_err();
		assert!(err.to_string().contains("blank"));
	}

	#[test]
	fn from_json_surfaces_parse_errors() {
		assert!(matches!(ActionPlan::from_json("{not json"), Err(PlanError::Parse(_))));
	}
}
