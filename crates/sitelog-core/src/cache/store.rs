//! In-memory query cache with request de-duplication.
//!
//! Every key carries a generation number. Invalidation and cancellation
//! move a key to a new generation, and a fetch only writes its result
//! back if the key is still on the generation the fetch started under.
//! The lock is never held across an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::ApiError;

use super::entry::{CacheEntry, FetchStatus, ValueOrigin};
use super::key::QueryKey;

/// Default freshness window. Matches the project list refresh interval of
/// the web client.
pub const DEFAULT_STALE_SECS: u64 = 60;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] ApiError),

    #[error("Cached value for {key} could not be decoded: {message}")]
    Decode { key: String, message: String },
}

impl CacheError {
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, CacheError::Fetch(e) if e.is_session_invalid())
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Value, ApiError>>>;

struct InFlight {
    generation: u64,
    future: SharedFetch,
}

struct Slot {
    entry: CacheEntry,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl Slot {
    /// The in-flight fetch, if it belongs to the current generation.
    fn joinable(&self) -> Option<SharedFetch> {
        self.in_flight
            .as_ref()
            .filter(|in_flight| in_flight.generation == self.generation)
            .map(|in_flight| in_flight.future.clone())
    }
}

enum Lookup {
    Hit(Value),
    Join(SharedFetch),
    Miss,
}

#[derive(Default)]
struct State {
    slots: HashMap<QueryKey, Slot>,
    /// Store-wide so a removed and re-created key never reuses a number.
    next_generation: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn slot_mut(&mut self, key: &QueryKey) -> &mut Slot {
        let State {
            slots,
            next_generation,
        } = self;
        slots.entry(key.clone()).or_insert_with(|| {
            *next_generation += 1;
            Slot {
                entry: CacheEntry::default(),
                generation: *next_generation,
                in_flight: None,
            }
        })
    }

    /// Move a key to a new generation, detaching any in-flight fetch.
    fn detach(&mut self, key: &QueryKey) -> Option<&mut Slot> {
        let generation = self.bump();
        let slot = self.slots.get_mut(key)?;
        slot.generation = generation;
        if slot.in_flight.take().is_some() && slot.entry.status == FetchStatus::Fetching {
            slot.entry.status = if slot.entry.value.is_some() {
                FetchStatus::Success
            } else {
                FetchStatus::Idle
            };
        }
        Some(slot)
    }
}

struct Inner {
    state: Mutex<State>,
    stale_time: chrono::Duration,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a finished fetch if its key is still on the same generation.
    fn complete(&self, key: &QueryKey, generation: u64, result: &Result<Value, ApiError>) {
        let mut state = self.lock();
        let Some(slot) = state.slots.get_mut(key) else {
            debug!(key = %key, "Fetch finished for a removed key, discarding");
            return;
        };
        if slot.generation != generation {
            debug!(
                key = %key,
                fetch_generation = generation,
                current_generation = slot.generation,
                "Discarding stale response"
            );
            return;
        }
        slot.in_flight = None;
        match result {
            Ok(value) => {
                slot.entry.value = Some(value.clone());
                slot.entry.origin = Some(ValueOrigin::Server);
                slot.entry.status = FetchStatus::Success;
                slot.entry.updated_at = Some(Utc::now());
                slot.entry.invalidated = false;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed");
                slot.entry.status = FetchStatus::Error(e.to_string());
            }
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        if entry.value.is_none() || entry.invalidated {
            return false;
        }
        entry
            .updated_at
            .map(|at| Utc::now() - at < self.stale_time)
            .unwrap_or(false)
    }
}

/// Keyed store of last-known server responses.
///
/// Clone is cheap and every clone shares the same entries, so one store
/// can be handed to each part of an application session.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_STALE_SECS))
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        let stale_time = chrono::Duration::from_std(stale_time)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                stale_time,
            }),
        }
    }

    /// Last known value, decoded.
    pub fn read<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.read_value(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    pub fn read_value(&self, key: &QueryKey) -> Option<Value> {
        let state = self.inner.lock();
        state.slots.get(key).and_then(|s| s.entry.value.clone())
    }

    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        let state = self.inner.lock();
        state.slots.get(key).map(|s| s.entry.clone())
    }

    pub fn status(&self, key: &QueryKey) -> FetchStatus {
        self.entry(key).map(|e| e.status).unwrap_or_default()
    }

    /// Replace the value locally. No network, no effect on in-flight fetches.
    pub fn write<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let mut state = self.inner.lock();
        let slot = state.slot_mut(key);
        slot.entry.value = Some(value);
        slot.entry.origin = Some(ValueOrigin::Local);
        slot.entry.updated_at = Some(Utc::now());
        slot.entry.invalidated = false;
        if slot.entry.status != FetchStatus::Fetching {
            slot.entry.status = FetchStatus::Success;
        }
        Ok(())
    }

    /// Copy of the whole entry, for a later `restore`.
    pub fn snapshot(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.entry(key)
    }

    /// Put back an entry captured by `snapshot`. `None` removes the key.
    pub fn restore(&self, key: &QueryKey, snapshot: Option<CacheEntry>) {
        let mut state = self.inner.lock();
        match snapshot {
            Some(entry) => {
                let slot = state.slot_mut(key);
                let fetching = slot.in_flight.is_some();
                slot.entry = entry;
                if fetching {
                    slot.entry.status = FetchStatus::Fetching;
                }
            }
            None => {
                state.slots.remove(key);
            }
        }
    }

    fn lookup(&self, key: &QueryKey) -> Lookup {
        let mut state = self.inner.lock();
        let slot = state.slot_mut(key);
        if self.inner.is_fresh(&slot.entry) {
            if let Some(value) = slot.entry.value.clone() {
                return Lookup::Hit(value);
            }
        }
        match slot.joinable() {
            Some(future) => Lookup::Join(future),
            None => Lookup::Miss,
        }
    }

    /// Return the cached value when fresh, otherwise load it.
    ///
    /// Concurrent calls for one key share a single loader future. The
    /// loader's result is written back only if the key has not been
    /// invalidated, cancelled or removed since the load started; callers
    /// still receive the result either way.
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, loader: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let shared = match self.lookup(key) {
            Lookup::Hit(value) => {
                debug!(key = %key, "Cache hit");
                return Self::decode(key, value);
            }
            Lookup::Join(future) => {
                debug!(key = %key, "Joining in-flight fetch");
                future
            }
            Lookup::Miss => {
                // Built unlocked so a loader may touch this cache
                let load = loader();
                let mut state = self.inner.lock();
                let slot = state.slot_mut(key);
                match slot.joinable() {
                    Some(future) => {
                        debug!(key = %key, "Fetch started concurrently, joining it");
                        future
                    }
                    None => {
                        debug!(key = %key, "Cache miss, fetching");
                        let generation = slot.generation;
                        let inner = Arc::clone(&self.inner);
                        let task_key = key.clone();
                        let future = async move {
                            let result = load.await.and_then(|v| {
                                serde_json::to_value(v)
                                    .map_err(|e| ApiError::InvalidResponse(e.to_string()))
                            });
                            inner.complete(&task_key, generation, &result);
                            result
                        }
                        .boxed()
                        .shared();
                        slot.in_flight = Some(InFlight {
                            generation,
                            future: future.clone(),
                        });
                        slot.entry.status = FetchStatus::Fetching;
                        future
                    }
                }
            }
        };

        let value = shared.await?;
        Self::decode(key, value)
    }

    /// Mark stale so the next fetch goes to the network. Any in-flight
    /// fetch is detached and its result will not be applied. Repeating
    /// this has no further effect.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut state = self.inner.lock();
        if let Some(slot) = state.detach(key) {
            slot.entry.invalidated = true;
            debug!(key = %key, "Invalidated");
        }
    }

    /// Invalidate every key of one entity.
    pub fn invalidate_entity(&self, entity: &str) {
        self.invalidate_if(|k| k.entity() == entity);
    }

    /// Invalidate every key that names `project` as its first parameter.
    pub fn invalidate_project(&self, project: &str) {
        self.invalidate_if(|k| k.is_for_project(project));
    }

    pub fn invalidate_if(&self, pred: impl Fn(&QueryKey) -> bool) {
        let mut state = self.inner.lock();
        let keys: Vec<QueryKey> = state.slots.keys().filter(|k| pred(k)).cloned().collect();
        for key in keys {
            if let Some(slot) = state.detach(&key) {
                slot.entry.invalidated = true;
            }
        }
    }

    /// Best-effort cancel: the request may still complete, but its result
    /// will not be written to the cache.
    pub fn cancel(&self, key: &QueryKey) {
        let mut state = self.inner.lock();
        if state.detach(key).is_some() {
            debug!(key = %key, "Cancelled in-flight fetch");
        }
    }

    pub fn remove(&self, key: &QueryKey) {
        self.inner.lock().slots.remove(key);
    }

    /// Drop every entry, e.g. on logout.
    pub fn clear(&self) {
        self.inner.lock().slots.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn decode<T: DeserializeOwned>(key: &QueryKey, value: Value) -> Result<T, CacheError> {
        serde_json::from_value(value).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}
