//! Command dispatch. Each command builds its own result envelope and prints
//! it; errors bubble up to `main`, which prints the failure envelope.

mod cache;
mod config;
mod validate;

use crate::cli::{CacheCommand, Cli, Commands};
use crate::config::FlowConfig;
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let format = cli.format;
	let (config, config_path) = FlowConfig::load(cli.config.as_deref())?;

	match cli.command {
		Commands::Validate { plan } => validate::execute(&plan, format),
		Commands::Cache(CacheCommand::Key { url }) => cache::key(&config, &url, format),
		Commands::Cache(CacheCommand::Show { url }) => cache::show(&config, &url, format).await,
		Commands::Cache(CacheCommand::Sweep) => cache::sweep(&config, format).await,
		Commands::Cache(CacheCommand::Clear) => cache::clear(&config, format).await,
		Commands::Config => config::execute(&config, config_path.as_deref(), format),
	}
}
