//! In-memory query cache.
//!
//! `QueryCache` holds the last known server response per `QueryKey`.
//! Concurrent fetches of one key share a single request, and results
//! that arrive after the key was invalidated or cancelled are dropped.

pub mod entry;
pub mod key;
pub mod store;

pub use entry::{CacheEntry, FetchStatus, ValueOrigin};
pub use key::{entity, QueryKey, LATEST};
pub use store::{CacheError, QueryCache, DEFAULT_STALE_SECS};
