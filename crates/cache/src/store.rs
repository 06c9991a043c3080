//! Durable tier: one record per key.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use pw_flow_protocol::StorageState;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;

/// A persisted cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
	pub key: String,
	pub url: String,
	/// Milliseconds since the Unix epoch; the disk-TTL clock.
	pub written_at: u64,
	pub state: StorageState,
}

impl CacheRecord {
	pub fn age_ms(&self, now_ms: u64) -> u64 {
		now_ms.saturating_sub(self.written_at)
	}
}

/// Read/write/delete contract of the durable tier.
///
/// `write` must be atomic with respect to `read`: a reader sees the old
/// record or the new one, never a mix.
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
	async fn read(&self, key: &str) -> Result<Option<CacheRecord>>;

	async fn write(&self, record: &CacheRecord) -> Result<()>;

	/// Returns true when a record was removed.
	async fn remove(&self, key: &str) -> Result<bool>;

	async fn keys(&self) -> Result<Vec<String>>;

	/// Deletes leftovers of interrupted writes that are at least `older_than`
	/// old. Returns how many were removed.
	async fn purge_temp_files(&self, _older_than: Duration) -> Result<usize> {
		Ok(0)
	}
}

/// Stores records as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FsStore {
	dir: PathBuf,
}

impl FsStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path(&self, key: &str) -> PathBuf {
		self.dir.join(format!("{key}.json"))
	}
}

#[async_trait]
impl StateStore for FsStore {
	async fn read(&self, key: &str) -> Result<Option<CacheRecord>> {
		let bytes = match tokio::fs::read(self.path(key)).await {
			Ok(bytes) => bytes,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(err.into()),
		};
		Ok(Some(serde_json::from_slice(&bytes)?))
	}

	async fn write(&self, record: &CacheRecord) -> Result<()> {
		let json = serde_json::to_vec_pretty(record)?;
		let bytes = json.len();
		let dir = self.dir.clone();
		let path = self.path(&record.key);
		let prefix = format!(".{}.", record.key);

		let abandoned = Arc::new(AtomicBool::new(false));
		let _guard = AbandonOnDrop(Arc::clone(&abandoned));
		let landed = tokio::task::spawn_blocking(move || -> Result<bool> {
			std::fs::create_dir_all(&dir)?;
			let mut temp = tempfile::Builder::new().prefix(&prefix).suffix(".tmp").tempfile_in(&dir)?;
			temp.write_all(&json)?;
			temp.as_file().sync_all()?;
			// Dropping `temp` unlinks it.
			if abandoned.load(Ordering::Acquire) {
				return Ok(false);
			}
			temp.persist(&path).map_err(|err| err.error)?;
			Ok(true)
		})
		.await??;

		if landed {
			trace!(target = "pw-flow", key = %record.key, bytes, "wrote cache record");
		} else {
			trace!(target = "pw-flow", key = %record.key, "abandoned cache write discarded");
		}
		Ok(())
	}

	async fn remove(&self, key: &str) -> Result<bool> {
		match tokio::fs::remove_file(self.path(key)).await {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}

	async fn keys(&self) -> Result<Vec<String>> {
		let mut entries = match tokio::fs::read_dir(&self.dir).await {
			Ok(entries) => entries,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(err.into()),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await? {
			let name = entry.file_name();
			let Some(name) = name.to_str() else { continue };
			if name.starts_with('.') {
				continue;
			}
			if let Some(key) = name.strip_suffix(".json") {
				keys.push(key.to_string());
			}
		}
		keys.sort();
		Ok(keys)
	}

	async fn purge_temp_files(&self, older_than: Duration) -> Result<usize> {
		let mut entries = match tokio::fs::read_dir(&self.dir).await {
			Ok(entries) => entries,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
			Err(err) => return Err(err.into()),
		};

		let now = SystemTime::now();
		let mut purged = 0;
		while let Some(entry) = entries.next_entry().await? {
			let name = entry.file_name();
			let Some(name) = name.to_str() else { continue };
			if !(name.starts_with('.') && name.ends_with(".tmp")) {
				continue;
			}
			let modified = entry.metadata().await?.modified()?;
			if now.duration_since(modified).unwrap_or_default() < older_than {
				continue;
			}
			match tokio::fs::remove_file(entry.path()).await {
				Ok(()) => purged += 1,
				Err(err) if err.kind() == ErrorKind::NotFound => {}
				Err(err) => return Err(err.into()),
			}
		}
		Ok(purged)
	}
}

/// Tells a blocking write that its caller went away.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
	fn drop(&mut self) {
		self.0.store(true, Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	use pw_flow_protocol::Cookie;
	use tempfile::TempDir;

	use super::*;

	fn temp_files(dir: &Path) -> Vec<String> {
		let mut names: Vec<String> = std::fs::read_dir(dir)
			.unwrap()
			.filter_map(|entry| entry.unwrap().file_name().into_string().ok())
			.filter(|name| name.ends_with(".tmp"))
			.collect();
		names.sort();
		names
	}

	fn age(path: &Path, by: Duration) {
		let file = std::fs::File::options().write(true).open(path).unwrap();
		file.set_modified(SystemTime::now() - by).unwrap();
	}

	fn record(key: &str) -> CacheRecord {
		CacheRecord {
			key: key.into(),
			url: "https://example.com".into(),
			written_at: 42,
			state: StorageState::with_cookies(vec![Cookie::new("sid", "abc", ".example.com")]),
		}
	}

	#[tokio::test]
	async fn write_read_remove() {
		let dir = TempDir::new().unwrap();
		let store = FsStore::new(dir.path().join("state"));

		assert_eq!(store.read("k1").await.unwrap(), None);
		store.write(&record("k1")).await.unwrap();
		assert_eq!(store.read("k1").await.unwrap(), Some(record("k1")));
		assert_eq!(store.keys().await.unwrap(), vec!["k1"]);

		assert!(store.remove("k1").await.unwrap());
		assert!(!store.remove("k1").await.unwrap());
		assert!(store.keys().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn record_uses_camel_case_on_disk() {
		let dir = TempDir::new().unwrap();
		let store = FsStore::new(dir.path());
		store.write(&record("k2")).await.unwrap();

		let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(dir.path().join("k2.json")).unwrap()).unwrap();
		assert_eq!(raw["writtenAt"], 42);
		assert_eq!(raw["state"]["cookies"][0]["name"], "sid");
	}

	#[tokio::test]
	async fn keys_skip_temp_and_foreign_files() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join(".k3.1.0.tmp"), b"{").unwrap();
		std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
		let store = FsStore::new(dir.path());
		store.write(&record("k3")).await.unwrap();

		assert_eq!(store.keys().await.unwrap(), vec!["k3"]);
	}

	#[tokio::test]
	async fn write_leaves_no_temp_files() {
		let dir = TempDir::new().unwrap();
		let store = FsStore::new(dir.path());
		store.write(&record("k4")).await.unwrap();
		store.write(&record("k4")).await.unwrap();

		assert!(temp_files(dir.path()).is_empty());
		assert_eq!(store.read("k4").await.unwrap(), Some(record("k4")));
	}

	#[tokio::test]
	async fn dropped_write_cleans_up_its_temp_file() {
		let dir = TempDir::new().unwrap();
		let store = FsStore::new(dir.path());

		// Polls the write once, then drops it while the blocking half runs.
		let _ = tokio::time::timeout(Duration::ZERO, store.write(&record("k5"))).await;
		tokio::time::sleep(Duration::from_millis(200)).await;

		assert!(temp_files(dir.path()).is_empty());
	}

	#[tokio::test]
	async fn purge_removes_only_stale_temp_files() {
		let dir = TempDir::new().unwrap();
		let stale = dir.path().join(".k6.crashed.tmp");
		std::fs::write(&stale, b"{").unwrap();
		age(&stale, Duration::from_secs(60 * 60));
		std::fs::write(dir.path().join(".k7.inflight.tmp"), b"{").unwrap();
		let store = FsStore::new(dir.path());
		store.write(&record("k6")).await.unwrap();

		assert_eq!(store.purge_temp_files(Duration::from_secs(60)).await.unwrap(), 1);
		assert!(!stale.exists());
		assert_eq!(temp_files(dir.path()), vec![".k7.inflight.tmp".to_string()]);
		assert_eq!(store.keys().await.unwrap(), vec!["k6"]);
	}

	#[tokio::test]
	async fn purge_of_missing_dir_is_empty() {
		let dir = TempDir::new().unwrap();
		let store = FsStore::new(dir.path().join("never-created"));

		assert_eq!(store.purge_temp_files(Duration::ZERO).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn corrupt_record_is_an_error() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("bad.json"), b"{ nope").unwrap();
		let store = FsStore::new(dir.path());

		assert!(store.read("bad").await.is_err());
	}
}
