//! Runs the `pwf` binary against throwaway config and cache directories.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use pw_flow_cache::cache_key;
use serde_json::{Value, json};
use tempfile::TempDir;

struct Sandbox {
	dir: TempDir,
}

impl Sandbox {
	fn new() -> Self {
		let sandbox = Self { dir: TempDir::new().unwrap() };
		let config = json!({ "cache": { "dir": sandbox.state_dir() } });
		std::fs::write(sandbox.config_path(), config.to_string()).unwrap();
		sandbox
	}

	fn config_path(&self) -> PathBuf {
		self.dir.path().join("config.json")
	}

	fn state_dir(&self) -> PathBuf {
		self.dir.path().join("state")
	}

	fn write(&self, name: &str, contents: &str) -> PathBuf {
		let path = self.dir.path().join(name);
		std::fs::write(&path, contents).unwrap();
		path
	}

	fn seed_record(&self, url: &str, written_at: u64) {
		let key = cache_key(url);
		let record = json!({
			"key": key,
			"url": url,
			"writtenAt": written_at,
			"state": {
				"cookies": [],
				"origins": [{ "origin": "https://shop.example.com", "localStorage": { "cart": "[1]" } }]
			}
		});
		std::fs::create_dir_all(self.state_dir()).unwrap();
		std::fs::write(self.state_dir().join(format!("{key}.json")), record.to_string()).unwrap();
	}

	fn run(&self, args: &[&str]) -> (bool, Value) {
		let output = Command::new(env!("CARGO_BIN_EXE_pwf"))
			.env_remove("RUST_LOG")
			.env("XDG_CONFIG_HOME", self.dir.path().join("xdg"))
			.arg("--config")
			.arg(self.config_path())
			.args(args)
			.output()
			.expect("failed to execute pwf");

		let stdout = String::from_utf8_lossy(&output.stdout);
		let parsed = serde_json::from_str(&stdout).unwrap_or_else(|_| json!({ "raw": stdout }));
		(output.status.success(), parsed)
	}
}

fn now_ms() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
}

fn record_exists(dir: &Path, url: &str) -> bool {
	dir.join(format!("{}.json", cache_key(url))).exists()
}

#[test]
fn validate_summarizes_a_plan() {
	let sandbox = Sandbox::new();
	let plan = sandbox.write(
		"plan.json",
		r##"{"url": "https://example.com", "actions": [
			{"type": "click", "selector": "#go"},
			{"type": "wait", "selectors": ["#done"], "timeoutMs": -1},
			{"type": "print", "selectors": ["#done"]}
		]}"##,
	);

	let (success, json) = sandbox.run(&["validate", plan.to_str().unwrap()]);

	assert!(success, "unexpected failure: {json}");
	assert_eq!(json["ok"], true);
	assert_eq!(json["command"], "validate");
	assert_eq!(json["data"]["actions"], 3);
	assert_eq!(json["data"]["url"], "https://example.com");
	assert_eq!(json["data"]["unboundedWaits"], json!([2]));
}

#[test]
fn invalid_plan_exits_nonzero_with_envelope() {
	let sandbox = Sandbox::new();
	let plan = sandbox.write("plan.json", r##"{"actions": [{"type": "click", "selector": "#a"}, {"type": "hover"}]}"##);

	let (success, json) = sandbox.run(&["validate", plan.to_str().unwrap()]);

	assert!(!success);
	assert_eq!(json["ok"], false);
	assert_eq!(json["command"], "validate");
	assert_eq!(json["error"]["code"], "INVALID_PLAN");
	assert_eq!(json["error"]["details"]["index"], 2);
}

#[test]
fn empty_plan_is_rejected() {
	let sandbox = Sandbox::new();
	let plan = sandbox.write("plan.json", r#"{"actions": []}"#);

	let (success, json) = sandbox.run(&["validate", plan.to_str().unwrap()]);

	assert!(!success);
	assert_eq!(json["error"]["code"], "INVALID_PLAN");
}

#[test]
fn missing_plan_file_is_an_io_error() {
	let sandbox = Sandbox::new();

	let (success, json) = sandbox.run(&["validate", "does-not-exist.json"]);

	assert!(!success);
	assert_eq!(json["error"]["code"], "IO_ERROR");
}

#[test]
fn cache_key_points_into_the_configured_dir() {
	let sandbox = Sandbox::new();
	let url = "https://shop.example.com/account";

	let (success, json) = sandbox.run(&["cache", "key", url]);

	assert!(success);
	let key = cache_key(url);
	assert_eq!(json["data"]["key"], key.as_str());
	assert_eq!(key.len(), 64);
	let path = PathBuf::from(json["data"]["path"].as_str().unwrap());
	assert_eq!(path, sandbox.state_dir().join(format!("{key}.json")));
}

#[test]
fn cache_key_rejects_garbage_urls() {
	let sandbox = Sandbox::new();

	let (success, json) = sandbox.run(&["cache", "key", "not a url"]);

	assert!(!success);
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[test]
fn cache_show_reads_fresh_records() {
	let sandbox = Sandbox::new();
	let url = "https://shop.example.com/account";
	sandbox.seed_record(url, now_ms());

	let (success, json) = sandbox.run(&["cache", "show", url]);

	assert!(success, "unexpected failure: {json}");
	assert_eq!(json["data"]["found"], true);
	assert_eq!(json["data"]["state"]["origins"][0]["localStorage"]["cart"], "[1]");

	let (_, json) = sandbox.run(&["cache", "show", "https://shop.example.com/other"]);
	assert_eq!(json["data"]["found"], false);
	assert!(json["data"].get("state").is_none());
}

#[test]
fn cache_show_discards_expired_records() {
	let sandbox = Sandbox::new();
	let url = "https://shop.example.com/stale";
	sandbox.seed_record(url, 1);

	let (success, json) = sandbox.run(&["cache", "show", url]);

	assert!(success);
	assert_eq!(json["data"]["found"], false);
	assert!(!record_exists(&sandbox.state_dir(), url));
}

#[test]
fn sweep_removes_only_expired_records() {
	let sandbox = Sandbox::new();
	sandbox.seed_record("https://a.example.com", 1);
	sandbox.seed_record("https://b.example.com", now_ms());

	let (success, json) = sandbox.run(&["cache", "sweep"]);

	assert!(success);
	assert_eq!(json["data"]["removed"], 1);
	assert!(!record_exists(&sandbox.state_dir(), "https://a.example.com"));
	assert!(record_exists(&sandbox.state_dir(), "https://b.example.com"));
}

#[test]
fn clear_removes_everything() {
	let sandbox = Sandbox::new();
	sandbox.seed_record("https://a.example.com", now_ms());
	sandbox.seed_record("https://b.example.com", now_ms());

	let (success, json) = sandbox.run(&["cache", "clear"]);

	assert!(success);
	assert_eq!(json["data"]["removed"], 2);
	assert!(!record_exists(&sandbox.state_dir(), "https://a.example.com"));
}

#[test]
fn config_reports_effective_settings() {
	let sandbox = Sandbox::new();

	let (success, json) = sandbox.run(&["config"]);

	assert!(success);
	assert_eq!(json["data"]["loaded"], true);
	assert_eq!(json["data"]["config"]["executor"]["actionTimeoutMs"], 30000);
	assert_eq!(json["data"]["stateDir"], sandbox.state_dir().to_str().unwrap());
}

#[test]
fn malformed_config_is_reported() {
	let sandbox = Sandbox::new();
	sandbox.write("config.json", "{ nope");

	let (success, json) = sandbox.run(&["config"]);

	assert!(!success);
	assert_eq!(json["command"], "config");
	assert_eq!(json["error"]["code"], "CONFIG_ERROR");
}

#[test]
fn text_format_prints_no_envelope() {
	let sandbox = Sandbox::new();
	let url = "https://example.com";

	let output = Command::new(env!("CARGO_BIN_EXE_pwf"))
		.arg("--config")
		.arg(sandbox.config_path())
		.args(["-f", "text", "cache", "key", url])
		.output()
		.unwrap();

	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(output.status.success());
	assert!(stdout.contains(&cache_key(url)));
	assert!(!stdout.contains("\"ok\""));
}
