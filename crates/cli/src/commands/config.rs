use std::path::Path;

use serde::Serialize;

use crate::config::FlowConfig;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigView<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	path: Option<&'a Path>,
	loaded: bool,
	state_dir: std::path::PathBuf,
	config: &'a FlowConfig,
}

pub fn execute(config: &FlowConfig, path: Option<&Path>, format: OutputFormat) -> Result<()> {
	let view = ConfigView {
		path,
		loaded: path.is_some_and(Path::is_file),
		state_dir: config.cache.state_dir(),
		config,
	};
	let result = ResultBuilder::new("config").data(view).build();
	print_result(&result, format);
	Ok(())
}
