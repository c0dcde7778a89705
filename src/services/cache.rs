use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::CacheSettings;
use crate::services::shared::{RedisSharedCache, SharedCache};

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Shared cache timed out after {0:?}")]
    Timeout(Duration),

    #[error("Shared cache unavailable: {0}")]
    Unavailable(String),
}

/// Longest TTL either tier accepts; longer requests are clamped to it
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub(crate) fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.min(MAX_TTL)
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process, capacity-bounded tier.
///
/// On overflow an oldest-first batch (10% of capacity, at least one entry) is
/// evicted, ordered by expiry timestamp. Entries with the nearest expiry go
/// first, so already-expired entries are always evicted before live ones.
/// This approximates LRU; reads do not refresh an entry's position.
pub struct LocalCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
}

impl LocalCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted per overflowing insert
    pub fn eviction_batch(&self) -> usize {
        (self.capacity / 10).max(1)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Insert or replace an entry, returning how many entries were evicted to
    /// make room for it
    pub fn insert(&self, key: String, value: String, ttl: Duration) -> usize {
        let mut entries = self.entries.lock();

        let mut evicted = 0;
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            evicted = evict_oldest(&mut entries, self.eviction_batch());
        }

        let now = Instant::now();
        let expires_at = now.checked_add(clamp_ttl(ttl)).unwrap_or(now);
        entries.insert(key, CacheEntry { value, expires_at });
        evicted
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, batch: usize) -> usize {
    let mut by_expiry: Vec<(Instant, String)> = entries
        .iter()
        .map(|(key, entry)| (entry.expires_at, key.clone()))
        .collect();
    by_expiry.sort_unstable();

    let mut evicted = 0;
    for (_, key) in by_expiry.into_iter().take(batch) {
        if entries.remove(&key).is_some() {
            evicted += 1;
        }
    }
    tracing::trace!("Evicted {} local cache entries", evicted);
    evicted
}

#[derive(Default)]
struct CacheCounters {
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
    shared_errors: AtomicU64,
    evictions: AtomicU64,
}

/// Multi-tier cache service
///
/// Local tier (in-process) is checked first, then the shared tier. Any cache
/// failure behaves as a miss; a failing shared tier degrades the service to
/// local-only caching for that call.
pub struct CacheService {
    local: LocalCache,
    shared: Option<Arc<dyn SharedCache>>,
    default_ttl: Duration,
    promotion_ttl: Duration,
    shared_timeout: Duration,
    namespace: String,
    counters: CacheCounters,
}

impl CacheService {
    /// Cache with only the in-process tier
    pub fn local_only(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            local: LocalCache::new(capacity),
            shared: None,
            default_ttl: clamp_ttl(default_ttl),
            promotion_ttl: Duration::from_secs(60).min(default_ttl),
            shared_timeout: Duration::from_millis(250),
            namespace: "carmatch".to_string(),
            counters: CacheCounters::default(),
        }
    }

    /// Cache backed by a shared tier
    pub fn with_shared(
        capacity: usize,
        default_ttl: Duration,
        shared: Arc<dyn SharedCache>,
    ) -> Self {
        Self {
            shared: Some(shared),
            ..Self::local_only(capacity, default_ttl)
        }
    }

    /// TTL given to shared-tier hits promoted into the local tier
    pub fn with_promotion_ttl(mut self, ttl: Duration) -> Self {
        self.promotion_ttl = clamp_ttl(ttl).min(self.default_ttl);
        self
    }

    pub fn with_shared_timeout(mut self, timeout: Duration) -> Self {
        self.shared_timeout = timeout;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Build from settings, connecting to Redis when a URL is configured.
    ///
    /// A Redis connection failure is not fatal: the service runs local-only.
    pub async fn from_settings(settings: &CacheSettings) -> Self {
        let ttl = Duration::from_secs(settings.ttl_secs);

        let service = match &settings.redis_url {
            Some(url) => match RedisSharedCache::connect(url).await {
                Ok(redis) => {
                    tracing::info!("Shared cache tier connected");
                    Self::with_shared(settings.l1_cache_size, ttl, Arc::new(redis))
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to connect to Redis ({}), running with local cache only",
                        e
                    );
                    Self::local_only(settings.l1_cache_size, ttl)
                }
            },
            None => Self::local_only(settings.l1_cache_size, ttl),
        };

        service
            .with_promotion_ttl(Duration::from_secs(settings.promotion_ttl_secs))
            .with_shared_timeout(Duration::from_millis(settings.shared_timeout_ms))
            .with_namespace(settings.namespace.clone())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn has_shared_tier(&self) -> bool {
        self.shared.is_some()
    }

    /// Get a value from cache (local first, then shared)
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        if let Some(json) = self.local.get(key) {
            match serde_json::from_str(&json) {
                Ok(value) => {
                    tracing::trace!("Local cache hit: {}", key);
                    self.counters.local_hits.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
                Err(e) => {
                    tracing::debug!("Dropping undecodable local entry {}: {}", key, e);
                    self.local.remove(key);
                }
            }
        }

        if let Some(shared) = &self.shared {
            match self.bounded(shared.get(key)).await {
                Ok(Some(json)) => match serde_json::from_str(&json) {
                    Ok(value) => {
                        tracing::trace!("Shared cache hit: {}", key);
                        self.counters.shared_hits.fetch_add(1, Ordering::Relaxed);
                        self.insert_local(key, json, self.promotion_ttl);
                        return Some(value);
                    }
                    Err(e) => tracing::debug!("Ignoring undecodable shared entry {}: {}", key, e),
                },
                Ok(None) => {}
                Err(e) => self.record_shared_error("get", key, &e),
            }
        }

        tracing::trace!("Cache miss: {}", key);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Set a value in cache (both tiers). `None` uses the default TTL.
    ///
    /// Only a serialization failure is reported; a shared-tier failure leaves
    /// the value cached locally.
    pub async fn set<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;
        let ttl = clamp_ttl(ttl.unwrap_or(self.default_ttl));

        self.insert_local(key, json.clone(), ttl);

        if let Some(shared) = &self.shared {
            if let Err(e) = self.bounded(shared.set_with_ttl(key, &json, ttl)).await {
                self.record_shared_error("set", key, &e);
            }
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Delete a value from both cache tiers
    pub async fn delete(&self, key: &str) {
        self.local.remove(key);
        if let Some(shared) = &self.shared {
            if let Err(e) = self.bounded(shared.delete(key)).await {
                self.record_shared_error("delete", key, &e);
            }
        }
    }

    /// Extend the shared-tier TTL of a key. Local entries keep their expiry.
    pub async fn expire(&self, key: &str, ttl: Duration) -> bool {
        match &self.shared {
            Some(shared) => match self.bounded(shared.expire(key, clamp_ttl(ttl))).await {
                Ok(updated) => updated,
                Err(e) => {
                    self.record_shared_error("expire", key, &e);
                    false
                }
            },
            None => false,
        }
    }

    /// Drop everything in this service's namespace from both tiers
    pub async fn clear(&self) {
        self.local.clear();
        if let Some(shared) = &self.shared {
            let prefix = format!("{}:", self.namespace);
            match self.bounded(shared.clear_prefix(&prefix)).await {
                Ok(removed) => tracing::debug!("Cleared {} shared cache entries", removed),
                Err(e) => self.record_shared_error("clear", &prefix, &e),
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let local_hits = self.counters.local_hits.load(Ordering::Relaxed);
        let shared_hits = self.counters.shared_hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = local_hits + shared_hits + misses;

        CacheStats {
            local_entries: self.local.len(),
            local_capacity: self.local.capacity(),
            local_hits,
            shared_hits,
            misses,
            shared_errors: self.counters.shared_errors.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            hit_rate: if lookups > 0 {
                (local_hits + shared_hits) as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    fn insert_local(&self, key: &str, json: String, ttl: Duration) {
        let evicted = self.local.insert(key.to_string(), json, ttl);
        if evicted > 0 {
            self.counters.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.shared_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.shared_timeout)),
        }
    }

    fn record_shared_error(&self, op: &str, key: &str, error: &CacheError) {
        self.counters.shared_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Shared cache {} failed for {}, using local tier only: {}", op, key, error);
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub local_entries: usize,
    pub local_capacity: usize,
    pub local_hits: u64,
    pub shared_hits: u64,
    pub misses: u64,
    pub shared_errors: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Key for one agent's score of one vehicle under one profile
    pub fn agent_score(
        namespace: &str,
        agent: &str,
        vehicle_id: &str,
        profile_hash: &str,
    ) -> String {
        format!("{}:agent:{}:{}:{}", namespace, agent, vehicle_id, profile_hash)
    }

    /// Key for the weight vector computed for a profile
    pub fn weights(namespace: &str, agent: &str, profile_hash: &str) -> String {
        format!("{}:weights:{}:{}", namespace, agent, profile_hash)
    }

    /// Stable hash of the profile fields an agent depends on.
    ///
    /// Fields are hashed in key order, so the insertion order of the map never
    /// changes the result.
    pub fn profile_hash(fields: &BTreeMap<&'static str, String>) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in fields {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b";");
        }
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}
