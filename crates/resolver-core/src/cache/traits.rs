//! The cache contract shared by the Local Inventory and the catalog adapters.
//!
//! Every entry lives under one of two namespaces — `search` (catalog query
//! results, keyed by `(catalog, normalized_query)`) and `inventory` (scanned
//! filesystem snapshots, keyed by the absolute models root) — with its own
//! TTL supplied at write time (§6, §4.4, catalogs/mod.rs). The trait itself
//! knows nothing about either namespace's key shape; it just needs the name
//! to isolate storage and, on `clear`, to scope what gets dropped.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Size and behavior limits for a `CacheBackend` implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum on-disk size in bytes before LRU eviction kicks in (0 = unlimited).
    pub max_size_bytes: u64,
    pub enable_eviction: bool,
}

impl CacheConfig {
    /// 4 GB.
    pub const DEFAULT_MAX_SIZE_BYTES: u64 = 4_294_967_296;
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: CacheConfig::DEFAULT_MAX_SIZE_BYTES,
            enable_eviction: true,
        }
    }
}

/// Entry count and size for one namespace, as reported by `CacheStats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub entry_count: usize,
    pub total_size_bytes: u64,
}

/// Cache statistics across both namespaces (§6: `stats`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub namespaces: Vec<NamespaceStats>,
}

/// Namespace-isolated, TTL-expiring key-value storage backing the Cache
/// module (§2a). All operations are synchronous to match rusqlite's API;
/// callers that need concurrency wrap a `CacheBackend` in an `Arc` and share
/// it, as `Core` does.
pub trait CacheBackend: Send + Sync {
    /// Look up `key` in `namespace`. Returns `None` on a miss or an expired
    /// entry — the two are indistinguishable to the caller by design.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `value` under `key` in `namespace`, expiring after `ttl`.
    /// Overwrites any existing entry at the same key.
    fn set(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Aggregate entry/size counts, overall and per namespace (§6: `stats`).
    fn get_stats(&self) -> Result<CacheStats>;

    /// Drop cached data. `Some(namespace)` clears just that namespace;
    /// `None` clears everything (§6: `clear(namespace?)`).
    fn clear(&self, namespace: Option<&str>) -> Result<()>;
}
