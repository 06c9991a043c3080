//! Two-tier cache of browser storage state, keyed by URL.
//!
//! [`StateCache`] keeps a capacity-bounded in-memory tier in front of a durable
//! [`StateStore`] (by default [`FsStore`], one JSON record per key). Writes land
//! in memory synchronously and are persisted by supervised background tasks
//! under a deadline; reads fall through to disk and rehydrate memory.
//!
//! Persistence is best effort: read and write failures are logged and never
//! surface to callers of [`StateCache::get`] or [`StateCache::put`].
//!
//! # Example
//!
//! ```ignore
//! let cache = StateCache::open(CacheConfig::default())?;
//! cache.put("https://example.com/app", state);
//! let restored = cache.get("https://example.com/app").await;
//! cache.flush().await;
//! ```

mod cache;
mod clock;
mod config;
mod error;
mod key;
mod store;

pub use cache::StateCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, default_state_dir};
pub use error::{CacheError, Result};
pub use key::cache_key;
pub use store::{CacheRecord, FsStore, StateStore};
