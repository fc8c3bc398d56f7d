use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::config::CacheConfig;
use crate::error::PorticoResult;

/// One stored blob plus the bookkeeping the store needs for TTL and eviction
#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    created_at: SystemTime,
    ttl: Duration,
}

impl StoredBlob {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn is_expired(&self) -> bool {
        match self.created_at.elapsed() {
            Ok(elapsed) => elapsed > self.ttl,
            Err(_) => true, // If we can't determine elapsed time, consider it expired
        }
    }
}

/// In-memory key→blob store with TTL and size-bounded eviction.
///
/// Cloning is cheap and every clone shares the same storage, so one instance
/// can be handed to any number of concurrent request tasks.
#[derive(Clone)]
pub struct InMemoryCache {
    /// Blob storage
    storage: Arc<RwLock<HashMap<String, StoredBlob>>>,
    /// Cache configuration
    config: CacheConfig,
    /// Cache metrics
    metrics: Arc<RwLock<CacheMetrics>>,
    /// Maximum cache size in bytes
    max_size: u64,
    /// Current cache size in bytes
    current_size: Arc<RwLock<u64>>,
}

impl InMemoryCache {
    /// Create a new in-memory cache
    pub fn new(config: CacheConfig) -> Self {
        let cache = Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            max_size: config.max_size,
            config,
            metrics: Arc::new(RwLock::new(CacheMetrics::default())),
            current_size: Arc::new(RwLock::new(0)),
        };

        // Start cleanup task
        if cache.config.enabled {
            cache.start_cleanup_task();
        }

        cache
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let storage = self.storage.read().await;
        let metrics = self.metrics.read().await;
        let current_size = *self.current_size.read().await;

        CacheStats {
            entry_count: storage.len(),
            total_size: current_size,
            max_size: self.max_size,
            hit_ratio: metrics.hit_ratio(),
            hits: metrics.hits,
            misses: metrics.misses,
            stores: metrics.stores,
            evictions: metrics.evictions,
        }
    }

    /// Get cache metrics for monitoring
    pub async fn get_metrics(&self) -> CacheMetrics {
        let metrics = self.metrics.read().await;
        let mut result = metrics.clone();

        let storage = self.storage.read().await;
        result.entry_count = storage.len() as u64;
        result.current_size = *self.current_size.read().await;

        result
    }

    /// Check if the cache contains an unexpired entry for a key
    pub async fn contains_key(&self, key: &str) -> bool {
        if !self.config.enabled {
            return false;
        }

        let storage = self.storage.read().await;

        if let Some(blob) = storage.get(key) {
            !blob.is_expired()
        } else {
            false
        }
    }

    /// Ensure there's enough space for a new entry
    async fn ensure_space(&self, needed_size: u64) -> PorticoResult<()> {
        let current_size = *self.current_size.read().await;

        if current_size + needed_size <= self.max_size {
            return Ok(());
        }

        let target_size = self.max_size.saturating_sub(needed_size);
        self.evict_until_size(target_size).await
    }

    /// Evict oldest entries until cache size is below target
    async fn evict_until_size(&self, target_size: u64) -> PorticoResult<()> {
        let mut storage = self.storage.write().await;
        let mut current_size = self.current_size.write().await;

        let mut entries: Vec<(String, SystemTime, u64)> = storage
            .iter()
            .map(|(key, blob)| (key.clone(), blob.created_at, blob.size()))
            .collect();

        // Oldest first (LRU approximation on creation time)
        entries.sort_by_key(|(_, created_at, _)| *created_at);

        let mut evicted_count = 0;

        for (key, _, blob_size) in entries {
            if *current_size <= target_size {
                break;
            }

            storage.remove(&key);
            *current_size -= blob_size;
            evicted_count += 1;

            debug!("Evicted cache entry: {} (size: {} bytes)", key, blob_size);
        }

        if evicted_count > 0 {
            let mut metrics = self.metrics.write().await;
            metrics.evictions += evicted_count;

            info!("Evicted {} cache entries to free space", evicted_count);
        }

        Ok(())
    }

    /// Start background cleanup task for expired entries
    fn start_cleanup_task(&self) {
        let storage = Arc::clone(&self.storage);
        let current_size = Arc::clone(&self.current_size);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            let mut cleanup_interval = interval(Duration::from_secs(60));

            loop {
                cleanup_interval.tick().await;

                let mut removed_count = 0;
                let mut removed_size = 0u64;

                {
                    let mut storage_guard = storage.write().await;
                    let mut to_remove = Vec::new();

                    for (key, blob) in storage_guard.iter() {
                        if blob.is_expired() {
                            to_remove.push((key.clone(), blob.size()));
                        }
                    }

                    for (key, size) in to_remove {
                        storage_guard.remove(&key);
                        removed_size += size;
                        removed_count += 1;
                    }
                }

                if removed_size > 0 {
                    let mut current_size_guard = current_size.write().await;
                    *current_size_guard -= removed_size;
                }

                if removed_count > 0 {
                    let mut metrics_guard = metrics.write().await;
                    metrics_guard.expired_cleaned += removed_count;

                    debug!(
                        "Cleaned up {} expired cache entries (freed {} bytes)",
                        removed_count, removed_size
                    );
                }
            }
        });
    }

    /// Record a cache hit
    async fn record_hit(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.hits += 1;
    }

    /// Record a cache miss
    async fn record_miss(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.misses += 1;
    }

    /// Record a cache store
    async fn record_store(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.stores += 1;
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.config.enabled {
            return None;
        }

        let storage = self.storage.read().await;

        if let Some(blob) = storage.get(key) {
            if blob.is_expired() {
                // Expired entries count as misses; the sweeper reclaims them
                drop(storage);
                self.record_miss().await;
                None
            } else {
                let data = blob.data.clone();
                drop(storage);
                self.record_hit().await;
                Some(data)
            }
        } else {
            drop(storage);
            self.record_miss().await;
            None
        }
    }

    async fn put(&self, key: String, blob: Vec<u8>) -> PorticoResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let blob_size = blob.len() as u64;

        // Oversized blobs are dropped, not errors: the store owns its limits
        // and the proxy must not fail a request over a cache-side rejection
        if blob_size > self.config.entry_size_limit() || blob_size > self.max_size {
            warn!(
                "Rejecting cache entry for '{}': {} bytes exceeds entry limit",
                key, blob_size
            );
            return Ok(());
        }

        if let Err(e) = self.ensure_space(blob_size).await {
            warn!("Failed to ensure space for cache entry: {}", e);
            return Err(e);
        }

        let entry = StoredBlob {
            data: blob,
            created_at: SystemTime::now(),
            ttl: Duration::from_secs(self.config.default_ttl),
        };

        // Last writer wins: replace any existing blob and re-account its size
        {
            let mut storage = self.storage.write().await;

            if let Some(old_blob) = storage.get(&key) {
                let mut current_size = self.current_size.write().await;
                *current_size -= old_blob.size();
            }

            storage.insert(key, entry);
        }

        {
            let mut current_size = self.current_size.write().await;
            *current_size += blob_size;
        }

        self.record_store().await;

        debug!("Stored cache entry of size {} bytes", blob_size);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Option<Vec<u8>> {
        if !self.config.enabled {
            return None;
        }

        let mut storage = self.storage.write().await;

        if let Some(blob) = storage.remove(key) {
            {
                let mut current_size = self.current_size.write().await;
                *current_size -= blob.size();
            }

            debug!("Removed cache entry for key: {}", key);
            Some(blob.data)
        } else {
            None
        }
    }

    async fn clear(&self) {
        let mut storage = self.storage.write().await;
        storage.clear();

        let mut current_size = self.current_size.write().await;
        *current_size = 0;

        info!("Cache cleared");
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: usize,
    /// Total size in bytes
    pub total_size: u64,
    /// Maximum size in bytes
    pub max_size: u64,
    /// Hit ratio as percentage
    pub hit_ratio: f64,
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total stores
    pub stores: u64,
    /// Total evictions
    pub evictions: u64,
}

impl CacheStats {
    /// Get cache utilization as percentage
    pub fn utilization_percent(&self) -> f64 {
        if self.max_size > 0 {
            (self.total_size as f64 / self.max_size as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Cache metrics for detailed monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Total number of cache hits
    pub hits: u64,
    /// Total number of cache misses
    pub misses: u64,
    /// Total number of cache stores
    pub stores: u64,
    /// Total number of cache evictions
    pub evictions: u64,
    /// Current cache size in bytes
    pub current_size: u64,
    /// Number of cached entries
    pub entry_count: u64,
    /// Number of expired entries cleaned up
    pub expired_cleaned: u64,
}

impl CacheMetrics {
    /// Calculate hit ratio as percentage
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Get total requests (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}
