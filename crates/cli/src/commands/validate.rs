use std::io::Read;
use std::path::Path;

use pw_flow::ActionPlan;
use serde::Serialize;
use tracing::info;

use crate::error::{CliError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanSummary {
	actions: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	url: Option<String>,
	steps: Vec<String>,
	/// 1-based indices of waits that only cancellation can end.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	unbounded_waits: Vec<usize>,
}

impl PlanSummary {
	fn of(plan: &ActionPlan) -> Self {
		Self {
			actions: plan.len(),
			url: plan.url().map(String::from),
			steps: plan.iter().map(ToString::to_string).collect(),
			unbounded_waits: plan
				.iter()
				.enumerate()
				.filter(|(_, action)| action.is_unbounded_wait())
				.map(|(i, _)| i + 1)
				.collect(),
		}
	}
}

pub fn execute(path: &Path, format: OutputFormat) -> Result<()> {
	let raw = read_plan(path)?;
	let plan = ActionPlan::from_json(&raw)?;
	info!(target = "pw-flow", path = %path.display(), actions = plan.len(), "plan is valid");

	let result = ResultBuilder::new("validate").data(PlanSummary::of(&plan)).build();
	print_result(&result, format);
	Ok(())
}

fn read_plan(path: &Path) -> Result<String> {
	let io_err = |source| CliError::Io {
		path: path.to_path_buf(),
		source,
	};
	if path == Path::new("-") {
		let mut raw = String::new();
		std::io::stdin().read_to_string(&mut raw).map_err(io_err)?;
		return Ok(raw);
	}
	std::fs::read_to_string(path).map_err(io_err)
}
