//! Bounded TTL cache for fusion results.
//!
//! Keyed by a low-cardinality market fingerprint so that repeated
//! evaluations of the same tick are served without recomputation. Eviction
//! is oldest-first on capacity overflow; entries past their TTL are dropped
//! on access. The cache is the only shared resource in the fusion path and
//! hides its lock behind a narrow get/put/stats interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use signal_fusion_core::CacheSettings;

/// Identity of one fusion input: symbol, price, volume and a timestamp
/// bucket. Price is quantized to cents so float jitter does not defeat
/// the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub symbol: String,
    price_cents: i64,
    volume: i64,
    bucket: i64,
}

impl Fingerprint {
    /// Builds a fingerprint, bucketing the timestamp to `bucket_seconds`.
    #[must_use]
    pub fn new(
        symbol: &str,
        price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
        bucket_seconds: i64,
    ) -> Self {
        let bucket_seconds = bucket_seconds.max(1);
        Self {
            symbol: symbol.to_string(),
            price_cents: (price * 100.0).round() as i64,
            volume: volume.round() as i64,
            bucket: timestamp.timestamp() / bucket_seconds,
        }
    }
}

/// Hit/miss/eviction counters for observability.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub len: usize,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    /// Insertion order, front = oldest
    order: VecDeque<K>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Bounded cache with TTL expiry and oldest-first eviction.
pub struct SignalCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> SignalCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            capacity: settings.capacity.max(1),
            ttl: Duration::from_secs(settings.ttl_seconds),
        }
    }

    /// Fetches a live entry, counting a hit; expired entries are removed
    /// and count as misses.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let lookup = inner
            .map
            .get(key)
            .map(|entry| (entry.inserted_at.elapsed() < self.ttl).then(|| entry.value.clone()));
        match lookup {
            Some(Some(value)) => {
                inner.hits += 1;
                Some(value)
            }
            Some(None) => {
                inner.map.remove(key);
                inner.order.retain(|k| k != key);
                inner.expirations += 1;
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Inserts a value, evicting the oldest entry on capacity overflow.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.lock();

        if inner.map.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.map.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
                inner.evictions += 1;
                tracing::debug!(
                    capacity = self.capacity,
                    evictions = inner.evictions,
                    "cache full, evicted oldest entry"
                );
            }
        }

        inner.order.push_back(key.clone());
        inner.map.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            len: inner.map.len(),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        // A poisoned cache lock only means a panic mid-insert elsewhere;
        // the map itself is still structurally sound.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
