//! Size-bounded LRU cache with single-flight loads.
//!
//! Entries are materialized lazily through a [`CacheLoader`]. At most one load
//! runs per key; concurrent callers for the same key block on that load and
//! all receive its outcome. Failed loads are not remembered, so the next
//! `get` for the key loads again.
//!
//! Resident entries are charged against a total-size budget. Admitting a new
//! entry evicts least-recently-used entries until it fits or nothing else is
//! left, calling [`CacheLoader::clean_up`] on each. An entry larger than the
//! whole budget is still admitted and becomes the first victim of the next
//! admission.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Condvar, Mutex};

/// Result of a successful load: the value plus what it costs against the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<V> {
    pub value: V,
    pub size: u64,
}

/// Pluggable load and eviction behavior for [`LruSizeCache`].
pub trait CacheLoader<K, V>: Send + Sync {
    /// Error handed to every caller waiting on a failed load.
    type Error: Clone;

    /// Materialize the value for `key`.
    fn load(&self, key: &K) -> Result<Loaded<V>, Self::Error>;

    /// Release whatever backs an evicted entry. Must not panic; failures are
    /// the loader's to log.
    fn clean_up(&self, key: &K, value: &V);
}

/// Counters exposed for status and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub size_limit: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Resident<V> {
    value: V,
    size: u64,
}

enum FlightState<V, E> {
    Pending,
    Done(Result<V, E>),
    /// The loading caller unwound without an outcome; waiters start over.
    Abandoned,
}

struct Flight<V, E> {
    state: Mutex<FlightState<V, E>>,
    done: Condvar,
}

impl<V: Clone, E: Clone> Flight<V, E> {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Pending),
            done: Condvar::new(),
        }
    }

    /// Block until the load settles. `None` means the load was abandoned.
    fn wait(&self) -> Option<Result<V, E>> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                FlightState::Pending => self.done.wait(&mut state),
                FlightState::Done(outcome) => return Some(outcome.clone()),
                FlightState::Abandoned => return None,
            }
        }
    }

    fn settle(&self, outcome: FlightState<V, E>) {
        *self.state.lock() = outcome;
        self.done.notify_all();
    }
}

struct Inner<K: Hash + Eq, V, E> {
    entries: LruCache<K, Resident<V>>,
    in_flight: HashMap<K, Arc<Flight<V, E>>>,
    total_size: u64,
    size_limit: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

enum Step<V, E> {
    Hit(V),
    Wait(Arc<Flight<V, E>>),
    Load(Arc<Flight<V, E>>),
}

/// Concurrency-safe LRU cache bounded by the total size of its entries.
pub struct LruSizeCache<K, V, L>
where
    K: Hash + Eq,
    L: CacheLoader<K, V>,
{
    loader: L,
    inner: Mutex<Inner<K, V, L::Error>>,
}

impl<K, V, L> LruSizeCache<K, V, L>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
    L: CacheLoader<K, V>,
{
    /// Create an empty cache that keeps at most `size_limit` bytes resident.
    pub fn new(size_limit: u64, loader: L) -> Self {
        Self {
            loader,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                in_flight: HashMap::new(),
                total_size: 0,
                size_limit,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Return the value for `key`, loading it on a miss.
    pub fn get(&self, key: &K) -> Result<V, L::Error> {
        loop {
            let flight = match self.begin(key) {
                Step::Hit(value) => return Ok(value),
                Step::Load(flight) => return self.load(key, flight),
                Step::Wait(flight) => flight,
            };
            if let Some(outcome) = flight.wait() {
                return outcome;
            }
            tracing::debug!(key = ?key, "load abandoned by its owner, retrying");
        }
    }

    fn begin(&self, key: &K) -> Step<V, L::Error> {
        let mut inner = self.inner.lock();
        if let Some(resident) = inner.entries.get(key) {
            let value = resident.value.clone();
            inner.hits += 1;
            return Step::Hit(value);
        }
        if let Some(flight) = inner.in_flight.get(key) {
            return Step::Wait(Arc::clone(flight));
        }
        inner.misses += 1;
        let flight = Arc::new(Flight::new());
        inner.in_flight.insert(key.clone(), Arc::clone(&flight));
        Step::Load(flight)
    }

    fn load(&self, key: &K, flight: Arc<Flight<V, L::Error>>) -> Result<V, L::Error> {
        let mut guard = LoadGuard {
            cache: self,
            key,
            flight,
            settled: false,
        };

        let outcome = self.loader.load(key);

        let result = {
            let mut inner = self.inner.lock();
            inner.in_flight.remove(key);
            match outcome {
                Ok(loaded) => {
                    let value = loaded.value.clone();
                    self.admit(&mut inner, key.clone(), loaded);
                    Ok(value)
                }
                Err(e) => Err(e),
            }
        };

        guard.settle(result.clone());
        result
    }

    fn admit(&self, inner: &mut Inner<K, V, L::Error>, key: K, loaded: Loaded<V>) {
        while inner.total_size.saturating_add(loaded.size) > inner.size_limit {
            let Some((victim, resident)) = inner.entries.pop_lru() else {
                break;
            };
            inner.total_size = inner.total_size.saturating_sub(resident.size);
            inner.evictions += 1;
            tracing::debug!(key = ?victim, size_bytes = resident.size, "evicting cache entry");
            self.loader.clean_up(&victim, &resident.value);
        }

        if loaded.size > inner.size_limit {
            tracing::warn!(
                key = ?key,
                size_bytes = loaded.size,
                size_limit = inner.size_limit,
                "admitting entry larger than the whole cache budget"
            );
        }

        inner.total_size = inner.total_size.saturating_add(loaded.size);
        let resident = Resident {
            value: loaded.value,
            size: loaded.size,
        };
        if let Some(previous) = inner.entries.put(key, resident) {
            inner.total_size = inner.total_size.saturating_sub(previous.size);
        }
    }

    /// Whether `key` is resident. Does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of resident entries.
    pub fn total_size(&self) -> u64 {
        self.inner.lock().total_size
    }

    /// Resident keys from least to most recently used.
    pub fn keys_lru_first(&self) -> Vec<K> {
        let inner = self.inner.lock();
        inner.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            total_size: inner.total_size,
            size_limit: inner.size_limit,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// The loader this cache was built with.
    pub fn loader(&self) -> &L {
        &self.loader
    }
}

/// Settles the in-flight record even if the loader panics.
struct LoadGuard<'a, K, V, L>
where
    K: Hash + Eq,
    L: CacheLoader<K, V>,
{
    cache: &'a LruSizeCache<K, V, L>,
    key: &'a K,
    flight: Arc<Flight<V, L::Error>>,
    settled: bool,
}

impl<K, V, L> LoadGuard<'_, K, V, L>
where
    K: Hash + Eq,
    V: Clone,
    L: CacheLoader<K, V>,
{
    fn settle(&mut self, outcome: Result<V, L::Error>) {
        self.settled = true;
        self.flight.settle(FlightState::Done(outcome));
    }
}

impl<K, V, L> Drop for LoadGuard<'_, K, V, L>
where
    K: Hash + Eq,
    L: CacheLoader<K, V>,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.cache.inner.lock();
        if inner
            .in_flight
            .get(self.key)
            .is_some_and(|f| Arc::ptr_eq(f, &self.flight))
        {
            inner.in_flight.remove(self.key);
        }
        drop(inner);
        *self.flight.state.lock() = FlightState::Abandoned;
        self.flight.done.notify_all();
    }
}
