//! Execution report returned after running an action plan.

use serde::{Deserialize, Serialize};

use crate::action::{ActionStatus, ContentItem};

/// How a plan run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
	/// Every action succeeded.
	Completed,
	/// The action at `index` (1-based) failed; nothing after it ran.
	Failed { index: usize },
	/// Cancellation fired during the action at `index` (1-based).
	Aborted { index: usize },
}

/// Audit trail and aggregated captures of one plan run.
///
/// `statuses` is always a prefix of the plan: one entry per attempted action,
/// in order, ending at the first unsuccessful one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
	pub statuses: Vec<ActionStatus>,
	pub captured: Vec<ContentItem>,
	pub outcome: RunOutcome,
	/// Console errors and uncaught page errors observed while the plan ran.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub console_errors: Vec<String>,
}

impl ExecutionReport {
	pub fn is_success(&self) -> bool {
		self.outcome == RunOutcome::Completed
	}

	/// The status of the action that stopped the run, if any.
	pub fn stopped_at(&self) -> Option<&ActionStatus> {
		match self.outcome {
			RunOutcome::Completed => None,
			RunOutcome::Failed { .. } | RunOutcome::Aborted { .. } => self.statuses.last(),
		}
	}
}
