use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "pwf")]
#[command(about = "pw-flow - validate action plans and manage cached browser state")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default) or text
	#[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Json)]
	pub format: OutputFormat,

	/// Configuration file (defaults to $XDG_CONFIG_HOME/pw-flow/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Validate a plan document and summarize its actions
	Validate {
		/// Plan file (JSON), or `-` for stdin
		#[arg(value_name = "PLAN")]
		plan: PathBuf,
	},

	/// Inspect and maintain the state cache
	#[command(subcommand)]
	Cache(CacheCommand),

	/// Print the effective configuration
	Config,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
	/// Print the cache key and record path for a URL
	Key { url: String },

	/// Print the cached storage state for a URL
	Show { url: String },

	/// Remove expired and unreadable records
	Sweep,

	/// Remove every record
	Clear,
}

impl Commands {
	/// Name used in the result envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Validate { .. } => "validate",
			Commands::Cache(CacheCommand::Key { .. }) => "cache key",
			Commands::Cache(CacheCommand::Show { .. }) => "cache show",
			Commands::Cache(CacheCommand::Sweep) => "cache sweep",
			Commands::Cache(CacheCommand::Clear) => "cache clear",
			Commands::Config => "config",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn global_flags_follow_subcommands() {
		let cli = Cli::try_parse_from(["pwf", "cache", "show", "https://example.com", "-f", "text", "-vv"]).unwrap();
		assert_eq!(cli.format, OutputFormat::Text);
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.command.name(), "cache show");
	}

	#[test]
	fn config_path_is_optional() {
		let cli = Cli::try_parse_from(["pwf", "--config", "/tmp/pwf.json", "validate", "plan.json"]).unwrap();
		assert_eq!(cli.config, Some(PathBuf::from("/tmp/pwf.json")));
		assert!(matches!(cli.command, Commands::Validate { ref plan } if plan == &PathBuf::from("plan.json")));
	}

	#[test]
	fn cache_requires_a_subcommand() {
		assert!(Cli::try_parse_from(["pwf", "cache"]).is_err());
	}
}
