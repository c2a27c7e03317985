use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::api::ApiError;
use crate::observability::{
    CACHE_HITS_TOTAL, CACHE_INVALIDATED_TOTAL, CACHE_JOINED_TOTAL, CACHE_MISSES_TOTAL,
};

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

/// A settled fetch result. Replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

enum Slot<T> {
    Ready(CacheEntry<T>),
    /// Fetch in flight. `generation` tells the fetch task whether its slot
    /// survived invalidation.
    Pending { generation: u64, fetch: SharedFetch<T> },
}

enum Lookup<T> {
    Hit(T),
    Join(SharedFetch<T>),
    Miss,
}

fn lookup<T: Clone>(slot: &Slot<T>, now: Instant) -> Lookup<T> {
    match slot {
        Slot::Ready(entry) if entry.is_fresh(now) => Lookup::Hit(entry.payload.clone()),
        Slot::Ready(_) => Lookup::Miss,
        Slot::Pending { fetch, .. } => Lookup::Join(fetch.clone()),
    }
}

/// Keyed, time-bounded cache of fetch results with in-flight de-duplication.
///
/// - Fresh entry → returned without fetching.
/// - Fetch in flight for the key → the caller joins it.
/// - Otherwise the fetch runs on a spawned task, so it settles into the cache
///   even when every caller has gone away.
/// - Failures are handed to the callers that were waiting and never stored.
///
/// TTL is checked lazily on access; nothing runs in the background.
pub struct QueryCache<T> {
    name: &'static str,
    slots: Arc<DashMap<String, Slot<T>>>,
    next_generation: AtomicU64,
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        // Fast path under a shared shard lock.
        let seen = self
            .slots
            .get(key)
            .map(|slot| lookup(&slot, Instant::now()));
        let fetch = match seen {
            Some(Lookup::Hit(payload)) => {
                metrics::counter!(CACHE_HITS_TOTAL, "cache" => self.name).increment(1);
                return Ok(payload);
            }
            Some(Lookup::Join(fetch)) => {
                metrics::counter!(CACHE_JOINED_TOTAL, "cache" => self.name).increment(1);
                fetch
            }
            Some(Lookup::Miss) | None => {
                // Built before taking the exclusive lock; futures are lazy, so
                // dropping it unpolled when we lose the race costs nothing.
                let fut = fetcher();
                self.start_or_join(key, ttl, fut)
            }
        };
        fetch.await
    }

    fn start_or_join<Fut>(&self, key: &str, ttl: Duration, fut: Fut) -> SharedFetch<T>
    where
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match lookup(occupied.get(), Instant::now()) {
                Lookup::Hit(payload) => {
                    metrics::counter!(CACHE_HITS_TOTAL, "cache" => self.name).increment(1);
                    futures::future::ready(Ok(payload)).boxed().shared()
                }
                Lookup::Join(fetch) => {
                    metrics::counter!(CACHE_JOINED_TOTAL, "cache" => self.name).increment(1);
                    fetch
                }
                Lookup::Miss => {
                    let (generation, fetch) = self.spawn_fetch(key, ttl, fut);
                    occupied.insert(Slot::Pending {
                        generation,
                        fetch: fetch.clone(),
                    });
                    fetch
                }
            },
            Entry::Vacant(vacant) => {
                let (generation, fetch) = self.spawn_fetch(key, ttl, fut);
                vacant.insert(Slot::Pending {
                    generation,
                    fetch: fetch.clone(),
                });
                fetch
            }
        }
    }

    /// Spawn the fetch. The task settles its own slot: success replaces the
    /// pending marker with a ready entry, failure removes it. Either way only
    /// if the marker is still the one this task was started for.
    ///
    /// Called with the key's shard locked; the task needs that lock to settle,
    /// so it cannot overtake the insertion of its own marker.
    fn spawn_fetch<Fut>(&self, key: &str, ttl: Duration, fut: Fut) -> (u64, SharedFetch<T>)
    where
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        metrics::counter!(CACHE_MISSES_TOTAL, "cache" => self.name).increment(1);
        tracing::debug!(cache = self.name, key, "fetching");

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let slots = self.slots.clone();
        let owned_key = key.to_string();
        let name = self.name;

        let task = tokio::spawn(async move {
            let result = fut.await;
            settle(&slots, owned_key, generation, ttl, &result, name);
            result
        });

        let slots = self.slots.clone();
        let owned_key = key.to_string();
        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    // The task never reached settle().
                    let err = ApiError::Aborted(e.to_string());
                    settle(&slots, owned_key, generation, ttl, &Err(err.clone()), name);
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        (generation, fetch)
    }

    /// Drop every entry (settled or in flight) whose key starts with `prefix`.
    /// A fetch already running for a dropped key still answers its callers
    /// but does not store its result.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut removed = 0usize;
        self.slots.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            metrics::counter!(CACHE_INVALIDATED_TOTAL, "cache" => self.name)
                .increment(removed as u64);
            tracing::debug!(cache = self.name, prefix, removed, "invalidated");
        }
        removed
    }

    /// True when `key` holds a fresh settled entry.
    pub fn is_fresh(&self, key: &str) -> bool {
        self.slots.get(key).is_some_and(|slot| match &*slot {
            Slot::Ready(entry) => entry.is_fresh(Instant::now()),
            Slot::Pending { .. } => false,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn settle<T>(
    slots: &DashMap<String, Slot<T>>,
    key: String,
    generation: u64,
    ttl: Duration,
    result: &Result<T, ApiError>,
    name: &'static str,
) where
    T: Clone,
{
    let Entry::Occupied(mut occupied) = slots.entry(key) else {
        return;
    };
    let ours = matches!(occupied.get(), Slot::Pending { generation: g, .. } if *g == generation);
    if !ours {
        return;
    }
    match result {
        Ok(payload) => {
            occupied.insert(Slot::Ready(CacheEntry {
                payload: payload.clone(),
                fetched_at: Instant::now(),
                ttl,
            }));
        }
        Err(e) => {
            tracing::debug!(cache = name, key = occupied.key().as_str(), "fetch failed, not cached: {e}");
            occupied.remove();
        }
    }
}
