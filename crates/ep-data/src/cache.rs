use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use ep_options::metrics::ChainMetrics;
use ep_types::AnalyticsError;

/// Aggregation outcome worth remembering, including "unavailable".
pub type CachedMetrics = Result<ChainMetrics, AnalyticsError>;

/// Cache key: one entry per symbol and expiration depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey(String);

impl CacheKey {
    fn new(symbol: &str, max_expirations: usize) -> Self {
        Self(format!("{}:{}", symbol, max_expirations))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedMetrics,
    stored_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.stored_at < ttl
    }
}

/// In-memory TTL cache for chain metrics
#[derive(Debug)]
pub struct MetricsCache {
    cache: DashMap<CacheKey, RwLock<CacheEntry>>,
    ttl: Duration,
    stats: RwLock<CacheStats>,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(2))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn get(&self, symbol: &str, max_expirations: usize) -> Option<CachedMetrics> {
        self.get_at(symbol, max_expirations, Utc::now())
    }

    /// Look up an entry as of `now`; stale entries count as misses and are dropped.
    pub fn get_at(&self, symbol: &str, max_expirations: usize, now: DateTime<Utc>) -> Option<CachedMetrics> {
        let key = CacheKey::new(symbol, max_expirations);

        let hit = self.cache.get(&key).and_then(|entry_lock| {
            let entry = entry_lock.read();
            entry.is_fresh(now, self.ttl).then(|| entry.value.clone())
        });

        let mut stats = self.stats.write();
        match hit {
            Some(value) => {
                stats.hits += 1;
                tracing::debug!("Metrics cache hit for {}", key.0);
                Some(value)
            }
            None => {
                stats.misses += 1;
                if self.cache.remove(&key).is_some() {
                    stats.expirations += 1;
                }
                None
            }
        }
    }

    pub fn store(&self, symbol: &str, max_expirations: usize, value: CachedMetrics) {
        self.store_at(symbol, max_expirations, value, Utc::now());
    }

    pub fn store_at(&self, symbol: &str, max_expirations: usize, value: CachedMetrics, now: DateTime<Utc>) {
        let entry = CacheEntry {
            value,
            stored_at: now,
        };
        self.cache
            .insert(CacheKey::new(symbol, max_expirations), RwLock::new(entry));
        self.stats.write().stores += 1;
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.read().is_fresh(now, self.ttl));
        let removed = before.saturating_sub(self.cache.len());
        self.stats.write().expirations += removed as u64;
        removed
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
        *self.stats.write() = CacheStats::default();
    }

    pub fn get_stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
