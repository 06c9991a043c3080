use std::path::PathBuf;

use pw_flow::PlanError;
use pw_flow_cache::CacheError;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid plan: {0}")]
	InvalidPlan(#[from] PlanError),

	#[error("invalid URL `{url}`: {source}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("failed to read {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("configuration error: {0:#}")]
	Config(anyhow::Error),

	#[error(transparent)]
	Cache(#[from] CacheError),
}

impl CliError {
	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			CliError::InvalidPlan(PlanError::InvalidAction { index, .. }) => (ErrorCode::InvalidPlan, Some(serde_json::json!({ "index": index }))),
			CliError::InvalidPlan(_) => (ErrorCode::InvalidPlan, None),
			CliError::InvalidUrl { url, .. } => (ErrorCode::InvalidInput, Some(serde_json::json!({ "url": url }))),
			CliError::Io { path, .. } => (ErrorCode::IoError, Some(serde_json::json!({ "path": path }))),
			CliError::Config(_) => (ErrorCode::ConfigError, None),
			CliError::Cache(_) => (ErrorCode::CacheError, None),
		};

		CommandError {
			code,
			message: self.to_string(),
			details,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_action_reports_its_index() {
		let err = CliError::from(PlanError::InvalidAction {
			index: 2,
			message: "unknown variant `hover`".into(),
		});
		let cmd = err.to_command_error();

		assert_eq!(cmd.code, ErrorCode::InvalidPlan);
		assert_eq!(cmd.details, Some(serde_json::json!({ "index": 2 })));
		assert!(cmd.message.contains("action 2"));
	}

	#[test]
	fn cache_failures_map_to_cache_error() {
		let err = CliError::from(CacheError::WriteDeadline { ms: 2500 });
		assert_eq!(err.to_command_error().code, ErrorCode::CacheError);
	}
}
