use std::path::PathBuf;

use pw_flow_cache::{StateCache, cache_key};
use pw_flow_protocol::StorageState;
use serde::Serialize;
use tracing::info;

use crate::config::FlowConfig;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyView {
	url: String,
	key: String,
	path: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowView {
	url: String,
	key: String,
	found: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	state: Option<StorageState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemovedView {
	removed: usize,
	dir: PathBuf,
}

/// Keys hash the URL exactly as given; parsing only rejects garbage.
fn checked_url(url: &str) -> Result<&str> {
	url::Url::parse(url).map_err(|source| CliError::InvalidUrl { url: url.to_string(), source })?;
	Ok(url)
}

pub fn key(config: &FlowConfig, url: &str, format: OutputFormat) -> Result<()> {
	let url = checked_url(url)?;
	let key = cache_key(url);
	let view = KeyView {
		url: url.to_string(),
		path: config.cache.state_dir().join(format!("{key}.json")),
		key,
	};
	print_result(&ResultBuilder::new("cache key").data(view).build(), format);
	Ok(())
}

pub async fn show(config: &FlowConfig, url: &str, format: OutputFormat) -> Result<()> {
	let url = checked_url(url)?;
	let cache = StateCache::open(config.cache.clone());
	let state = cache.get(url).await;
	let view = ShowView {
		url: url.to_string(),
		key: cache_key(url),
		found: state.is_some(),
		state,
	};
	print_result(&ResultBuilder::new("cache show").data(view).build(), format);
	Ok(())
}

pub async fn sweep(config: &FlowConfig, format: OutputFormat) -> Result<()> {
	let cache = StateCache::open(config.cache.clone());
	let removed = cache.sweep_expired().await?;
	info!(target = "pw-flow", removed, "swept state cache");
	let view = RemovedView {
		removed,
		dir: config.cache.state_dir(),
	};
	print_result(&ResultBuilder::new("cache sweep").data(view).build(), format);
	Ok(())
}

pub async fn clear(config: &FlowConfig, format: OutputFormat) -> Result<()> {
	let cache = StateCache::open(config.cache.clone());
	let removed = cache.clear().await?;
	let view = RemovedView {
		removed,
		dir: config.cache.state_dir(),
	};
	print_result(&ResultBuilder::new("cache clear").data(view).build(), format);
	Ok(())
}
