//! `pwf` configuration file.
//!
//! A single JSON document with one section per component:
//!
//! ```json
//! {
//!   "executor": { "actionTimeoutMs": 15000, "stability": { "waitForAnimations": false } },
//!   "cache": { "capacity": 50, "dir": "/var/lib/pw-flow/state" }
//! }
//! ```
//!
//! Every field is optional. A missing file means defaults; a malformed one is
//! an error.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use pw_flow::ExecutorOptions;
use pw_flow_cache::CacheConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowConfig {
	pub schema: u32,
	pub executor: ExecutorOptions,
	pub cache: CacheConfig,
}

impl Default for FlowConfig {
	fn default() -> Self {
		Self {
			schema: CONFIG_SCHEMA_VERSION,
			executor: ExecutorOptions::default(),
			cache: CacheConfig::default(),
		}
	}
}

impl FlowConfig {
	/// Loads `explicit` if given, else the default location.
	pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
		let path = match explicit {
			Some(path) => Some(path.to_path_buf()),
			None => default_config_path(),
		};
		let config = match &path {
			Some(path) => Self::load_from(path)?,
			None => Self::default(),
		};
		Ok((config, path))
	}

	pub fn load_from(path: &Path) -> Result<Self> {
		let raw = match std::fs::read_to_string(path) {
			Ok(raw) => raw,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				debug!(target = "pw-flow", path = %path.display(), "no config file, using defaults");
				return Ok(Self::default());
			}
			Err(source) => {
				return Err(CliError::Io {
					path: path.to_path_buf(),
					source,
				});
			}
		};

		serde_json::from_str(&raw)
			.with_context(|| format!("parsing {}", path.display()))
			.map_err(CliError::Config)
	}
}

/// `$XDG_CONFIG_HOME/pw-flow/config.json`, falling back to `~/.config`.
pub fn default_config_path() -> Option<PathBuf> {
	config_path_from(std::env::var_os("XDG_CONFIG_HOME"), dirs::home_dir())
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
	let base = xdg_config_home
		.filter(|v| !v.is_empty())
		.map(PathBuf::from)
		.or_else(|| home.map(|h| h.join(".config")))?;
	Some(base.join("pw-flow").join("config.json"))
}
