//! Memory tier, background persistence and expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use pw_flow_protocol::StorageState;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::cache_key;
use crate::store::{CacheRecord, FsStore, StateStore};

#[derive(Debug, Clone)]
struct MemoryEntry {
	state: StorageState,
	written_at: u64,
	/// Issue order of the `put` that produced this entry; 0 for disk rehydration.
	seq: u64,
}

#[derive(Debug, Default)]
struct Issued {
	/// Newest write sequence issued per key.
	latest: HashMap<String, u64>,
	/// Writes at or below this sequence were superseded by `clear`.
	cleared_through: u64,
}

impl Issued {
	fn is_current(&self, key: &str, seq: u64) -> bool {
		seq > self.cleared_through && self.latest.get(key) == Some(&seq)
	}
}

#[derive(Debug)]
struct Inner {
	config: CacheConfig,
	store: Arc<dyn StateStore>,
	clock: Arc<dyn Clock>,
	memory: Mutex<HashMap<String, MemoryEntry>>,
	issued: Mutex<Issued>,
	seq: AtomicU64,
	/// Shared by writers, exclusive for `clear`.
	epoch: tokio::sync::RwLock<()>,
	/// Orders disk writes per key so the newest issued write lands last.
	key_gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
	shutdown: CancellationToken,
}

/// Two-tier cache of [`StorageState`] keyed by URL hash.
///
/// Cheap to clone; clones share both tiers and the background tasks. Pending
/// writes are aborted when the last clone drops, so call [`flush`](Self::flush)
/// first when they matter.
#[derive(Debug, Clone)]
pub struct StateCache {
	inner: Arc<Inner>,
	writes: Arc<Mutex<JoinSet<()>>>,
	sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl StateCache {
	pub fn new(config: CacheConfig, store: Arc<dyn StateStore>) -> Self {
		Self::with_clock(config, store, Arc::new(SystemClock))
	}

	pub fn with_clock(config: CacheConfig, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
		Self {
			inner: Arc::new(Inner {
				config,
				store,
				clock,
				memory: Mutex::new(HashMap::new()),
				issued: Mutex::new(Issued::default()),
				seq: AtomicU64::new(0),
				epoch: tokio::sync::RwLock::new(()),
				key_gates: Mutex::new(HashMap::new()),
				shutdown: CancellationToken::new(),
			}),
			writes: Arc::new(Mutex::new(JoinSet::new())),
			sweeper: Arc::new(Mutex::new(None)),
		}
	}

	/// Cache backed by an [`FsStore`] in [`CacheConfig::state_dir`].
	pub fn open(config: CacheConfig) -> Self {
		let store = Arc::new(FsStore::new(config.state_dir()));
		Self::new(config, store)
	}

	pub fn config(&self) -> &CacheConfig {
		&self.inner.config
	}

	/// Returns the cached state for `url`, if fresh.
	///
	/// Memory hits younger than the memory TTL return immediately. Otherwise the
	/// durable record is consulted: expired records are deleted, fresh ones
	/// rehydrate the memory tier.
	pub async fn get(&self, url: &str) -> Option<StorageState> {
		let key = cache_key(url);
		let now = self.inner.clock.now_ms();
		let memory_ttl = millis(self.inner.config.memory_ttl());

		{
			let mut memory = self.inner.memory.lock();
			match memory.get(&key) {
				Some(entry) if now.saturating_sub(entry.written_at) < memory_ttl => {
					trace!(target = "pw-flow", %key, "memory hit");
					return Some(entry.state.clone());
				}
				Some(_) => {
					trace!(target = "pw-flow", %key, "memory entry expired");
					memory.remove(&key);
				}
				None => {}
			}
		}

		let record = match self.inner.store.read(&key).await {
			Ok(Some(record)) => record,
			Ok(None) => return None,
			Err(err) => {
				warn!(target = "pw-flow", %key, error = %err, "cache read failed");
				return None;
			}
		};

		if record.age_ms(now) >= millis(self.inner.config.disk_ttl()) {
			debug!(target = "pw-flow", %key, age_ms = record.age_ms(now), "disk record expired, removing");
			if let Err(err) = self.inner.store.remove(&key).await {
				warn!(target = "pw-flow", %key, error = %err, "failed to remove expired record");
			}
			return None;
		}

		let state = record.state;
		let mut memory = self.inner.memory.lock();
		// A put that raced this read owns the entry.
		if !memory.contains_key(&key) {
			memory.insert(
				key.clone(),
				MemoryEntry {
					state: state.clone(),
					written_at: now,
					seq: 0,
				},
			);
			evict_oldest(&mut memory, self.inner.config.capacity);
		}
		trace!(target = "pw-flow", %key, "disk hit");
		Some(state)
	}

	/// Stores `state` for `url`.
	///
	/// The memory tier is updated before this returns; persistence happens on a
	/// background task bounded by the write deadline. Must be called from
	/// within a Tokio runtime for the disk write to happen.
	pub fn put(&self, url: &str, state: StorageState) {
		let key = cache_key(url);
		let written_at = self.inner.clock.now_ms();

		let seq = {
			let mut memory = self.inner.memory.lock();
			let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
			memory.insert(
				key.clone(),
				MemoryEntry {
					state: state.clone(),
					written_at,
					seq,
				},
			);
			evict_oldest(&mut memory, self.inner.config.capacity);
			self.inner.issued.lock().latest.insert(key.clone(), seq);
			seq
		};

		let record = CacheRecord {
			key,
			url: url.to_string(),
			written_at,
			state,
		};
		self.spawn_write(record, seq);
	}

	fn spawn_write(&self, record: CacheRecord, seq: u64) {
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			warn!(target = "pw-flow", key = %record.key, "no runtime, cache write skipped");
			self.inner.release_key(&record.key, seq);
			return;
		};

		let inner = Arc::clone(&self.inner);
		let mut writes = self.writes.lock();
		while let Some(finished) = writes.try_join_next() {
			log_join(finished);
		}
		writes.spawn_on(
			async move {
				let key = record.key.clone();
				let outcome = tokio::select! {
					biased;
					_ = inner.shutdown.cancelled() => {
						debug!(target = "pw-flow", %key, "cache write cancelled by shutdown");
						return;
					}
					res = persist(&inner, &record, seq) => res,
				};
				match outcome {
					Ok(true) => trace!(target = "pw-flow", %key, seq, "cache record persisted"),
					Ok(false) => trace!(target = "pw-flow", %key, seq, "superseded cache write dropped"),
					Err(err) => warn!(target = "pw-flow", %key, error = %err, "cache write failed"),
				}
			},
			&runtime,
		);
	}

	/// Removes `url` from both tiers and drops its pending writes.
	pub async fn invalidate(&self, url: &str) -> bool {
		let key = cache_key(url);
		let in_memory = self.inner.memory.lock().remove(&key).is_some();
		let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
		self.inner.issued.lock().latest.insert(key.clone(), seq);

		let on_disk = {
			let _epoch = self.inner.epoch.read().await;
			let gate = self.inner.key_gate(&key);
			let _turn = gate.lock().await;
			match self.inner.store.remove(&key).await {
				Ok(removed) => removed,
				Err(err) => {
					warn!(target = "pw-flow", %key, error = %err, "failed to remove cache record");
					false
				}
			}
		};
		self.inner.release_key(&key, seq);
		in_memory || on_disk
	}

	/// Empties both tiers and drops all pending writes. Returns the number of
	/// disk records removed.
	pub async fn clear(&self) -> Result<usize> {
		self.inner.memory.lock().clear();
		{
			let mut issued = self.inner.issued.lock();
			issued.cleared_through = self.inner.seq.load(Ordering::SeqCst);
			issued.latest.clear();
		}

		let _epoch = self.inner.epoch.write().await;
		let mut removed = 0;
		for key in self.inner.store.keys().await? {
			if self.inner.store.remove(&key).await? {
				removed += 1;
			}
		}
		info!(target = "pw-flow", removed, "cache cleared");
		Ok(removed)
	}

	/// Deletes durable records past the disk TTL (and unreadable ones) and drops
	/// memory entries past the memory TTL. Returns the number of records removed.
	pub async fn sweep_expired(&self) -> Result<usize> {
		self.inner.sweep_expired().await
	}

	/// Number of entries in the memory tier.
	pub fn len(&self) -> usize {
		self.inner.memory.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns true when `url` is resident in the memory tier.
	pub fn contains(&self, url: &str) -> bool {
		self.inner.memory.lock().contains_key(&cache_key(url))
	}

	/// Waits for every pending background write to finish.
	pub async fn flush(&self) {
		let mut pending = std::mem::take(&mut *self.writes.lock());
		while let Some(finished) = pending.join_next().await {
			log_join(finished);
		}
	}

	/// Starts a task that runs [`sweep_expired`](Self::sweep_expired) every
	/// sweep interval until [`shutdown`](Self::shutdown).
	///
	/// Calling it again replaces the previous sweeper.
	pub fn spawn_sweeper(&self) {
		let inner = Arc::downgrade(&self.inner);
		let shutdown = self.inner.shutdown.clone();
		let period = self.inner.config.sweep_interval();

		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				tokio::select! {
					biased;
					_ = shutdown.cancelled() => break,
					_ = ticker.tick() => {}
				}
				let Some(inner) = inner.upgrade() else { break };
				match inner.sweep_expired().await {
					Ok(removed) => debug!(target = "pw-flow", removed, "periodic cache sweep"),
					Err(err) => warn!(target = "pw-flow", error = %err, "periodic cache sweep failed"),
				}
			}
			trace!(target = "pw-flow", "cache sweeper stopped");
		});

		if let Some(previous) = self.sweeper.lock().replace(handle) {
			previous.abort();
		}
	}

	/// Aborts pending writes and stops the sweeper.
	pub async fn shutdown(&self) {
		self.inner.shutdown.cancel();
		let sweeper = self.sweeper.lock().take();
		if let Some(sweeper) = sweeper {
			let _ = sweeper.await;
		}
		self.flush().await;
	}
}

impl Inner {
	async fn sweep_expired(&self) -> Result<usize> {
		let now = self.clock.now_ms();
		let memory_ttl = millis(self.config.memory_ttl());
		self.memory.lock().retain(|_, entry| now.saturating_sub(entry.written_at) < memory_ttl);

		let disk_ttl = millis(self.config.disk_ttl());
		let mut removed = 0;
		for key in self.store.keys().await? {
			let expired = match self.store.read(&key).await {
				Ok(Some(record)) => record.age_ms(now) >= disk_ttl,
				Ok(None) => false,
				Err(err) => {
					debug!(target = "pw-flow", %key, error = %err, "removing unreadable record");
					true
				}
			};
			if expired && self.store.remove(&key).await? {
				removed += 1;
			}
		}

		match self.store.purge_temp_files(self.config.write_deadline()).await {
			Ok(0) => {}
			Ok(purged) => debug!(target = "pw-flow", purged, "removed stale temp files"),
			Err(err) => warn!(target = "pw-flow", error = %err, "temp file cleanup failed"),
		}
		Ok(removed)
	}

	fn key_gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
		Arc::clone(self.key_gates.lock().entry(key.to_string()).or_default())
	}

	/// Forgets the bookkeeping for `key` once operation `seq` is done with it.
	fn release_key(&self, key: &str, seq: u64) {
		{
			let mut issued = self.issued.lock();
			if issued.latest.get(key) == Some(&seq) {
				issued.latest.remove(key);
			}
		}
		let mut gates = self.key_gates.lock();
		if gates.get(key).is_some_and(|gate| Arc::strong_count(gate) == 1) {
			gates.remove(key);
		}
	}
}

/// Writes `record` unless a newer write for the same key was issued.
///
/// Waits behind earlier writes for the same key only. The write deadline
/// covers the store call itself.
async fn persist(inner: &Inner, record: &CacheRecord, seq: u64) -> Result<bool> {
	let _epoch = inner.epoch.read().await;
	let gate = inner.key_gate(&record.key);
	let outcome = {
		let _turn = gate.lock().await;
		if inner.issued.lock().is_current(&record.key, seq) {
			let deadline = inner.config.write_deadline();
			match tokio::time::timeout(deadline, inner.store.write(record)).await {
				Ok(written) => written.map(|()| true),
				Err(_) => Err(CacheError::WriteDeadline { ms: millis(deadline) }),
			}
		} else {
			Ok(false)
		}
	};
	drop(gate);
	inner.release_key(&record.key, seq);
	outcome
}

fn evict_oldest(memory: &mut HashMap<String, MemoryEntry>, capacity: usize) {
	while memory.len() > capacity.max(1) {
		let Some(oldest) = memory
			.iter()
			.min_by_key(|(_, entry)| (entry.written_at, entry.seq))
			.map(|(key, _)| key.clone())
		else {
			break;
		};
		trace!(target = "pw-flow", key = %oldest, "evicting oldest memory entry");
		memory.remove(&oldest);
	}
}

fn log_join(finished: std::result::Result<(), tokio::task::JoinError>) {
	if let Err(err) = finished {
		if !err.is_cancelled() {
			warn!(target = "pw-flow", error = %CacheError::from(err), "cache write task failed");
		}
	}
}

fn millis(duration: std::time::Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
