//! SQLite-backed `CacheBackend`: one database shared by the `search` and
//! `inventory` namespaces, isolated by a `(namespace, key)` primary key.

use super::traits::{CacheBackend, CacheConfig, CacheStats, NamespaceStats};
use crate::error::{Error, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

fn lock_error(e: impl std::fmt::Display) -> Error {
    Error::Database {
        message: format!("failed to lock cache database: {e}"),
        source: None,
    }
}

fn db_error(context: &str, e: rusqlite::Error) -> Error {
    Error::Database {
        message: format!("{context}: {e}"),
        source: Some(e),
    }
}

pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
    config: CacheConfig,
}

impl SqliteCache {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(db_path, CacheConfig::default())
    }

    pub fn with_config(db_path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| db_error("failed to open cache database", e))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| db_error("failed to set cache pragmas", e))?;

        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                last_accessed TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(namespace, expires_at);
            CREATE INDEX IF NOT EXISTS idx_cache_accessed ON cache_entries(last_accessed);

            CREATE TABLE IF NOT EXISTS cache_namespaces (
                namespace TEXT PRIMARY KEY,
                entry_count INTEGER NOT NULL DEFAULT 0,
                total_size_bytes INTEGER NOT NULL DEFAULT 0,
                last_modified TEXT
            );
            "#,
        )
        .map_err(|e| db_error("failed to initialize cache schema", e))?;
        Ok(())
    }

    /// Recompute `cache_namespaces`' count/size columns for one namespace
    /// after an insert or delete touched it.
    fn update_namespace_meta(&self, conn: &Connection, namespace: &str) -> Result<()> {
        let (count, size): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM cache_entries WHERE namespace = ?1",
                params![namespace],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap_or((0, 0));

        conn.execute(
            r#"
            INSERT INTO cache_namespaces (namespace, entry_count, total_size_bytes, last_modified)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(namespace) DO UPDATE SET
                entry_count = ?2, total_size_bytes = ?3, last_modified = ?4
            "#,
            params![namespace, count, size, Utc::now().to_rfc3339()],
        )
        .map_err(|e| db_error("failed to update namespace metadata", e))?;
        Ok(())
    }

    /// LRU-evict entries across every namespace until total size is back
    /// under `max_bytes`. Only called by `set` via `enforce_size_limit`.
    fn evict_to_size(&self, max_bytes: u64) -> Result<usize> {
        let conn = self.conn.lock().map_err(lock_error)?;

        let current_size: i64 = conn
            .query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);
        if (current_size as u64) <= max_bytes {
            return Ok(0);
        }
        let excess = current_size as u64 - max_bytes;

        let entries: Vec<(String, String, i64)> = {
            let mut stmt = conn
                .prepare("SELECT namespace, key, size_bytes FROM cache_entries ORDER BY last_accessed ASC")
                .map_err(|e| db_error("failed to prepare eviction query", e))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
                .map_err(|e| db_error("failed to query for eviction", e))?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        let mut evicted_bytes = 0u64;
        let mut evicted_count = 0;
        let mut touched = std::collections::HashSet::new();
        for (namespace, key, size) in entries {
            if evicted_bytes >= excess {
                break;
            }
            conn.execute(
                "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .ok();
            evicted_bytes += size as u64;
            evicted_count += 1;
            touched.insert(namespace);
        }
        for namespace in touched {
            self.update_namespace_meta(&conn, &namespace)?;
        }
        debug!(evicted_count, evicted_bytes, "evicted cache entries over size limit");
        Ok(evicted_count)
    }

    fn enforce_size_limit(&self) {
        if !self.config.enable_eviction || self.config.max_size_bytes == 0 {
            return;
        }
        if let Ok(stats) = self.get_stats() {
            if stats.total_size_bytes > self.config.max_size_bytes {
                let _ = self.evict_to_size(self.config.max_size_bytes);
            }
        }
    }
}

impl CacheBackend for SqliteCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let now = Utc::now().to_rfc3339();

        let value: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE namespace = ?1 AND key = ?2 AND expires_at > ?3",
                params![namespace, key, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| db_error("failed to query cache entry", e))?;

        if value.is_some() {
            let _ = conn.execute(
                "UPDATE cache_entries SET last_accessed = ?1 WHERE namespace = ?2 AND key = ?3",
                params![now, namespace, key],
            );
        }
        Ok(value)
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = Utc::now();
        let expires_at = (now + chrono::Duration::from_std(ttl).unwrap_or_default()).to_rfc3339();
        let now_str = now.to_rfc3339();

        {
            let conn = self.conn.lock().map_err(lock_error)?;
            conn.execute(
                r#"
                INSERT OR REPLACE INTO cache_entries
                (namespace, key, value, cached_at, expires_at, size_bytes, last_accessed)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![namespace, key, value, now_str, expires_at, value.len() as i64, now_str],
            )
            .map_err(|e| db_error("failed to set cache entry", e))?;
            self.update_namespace_meta(&conn, namespace)?;
        }

        self.enforce_size_limit();
        Ok(())
    }

    fn get_stats(&self) -> Result<CacheStats> {
        let conn = self.conn.lock().map_err(lock_error)?;

        let (total_entries, total_size_bytes): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM cache_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap_or((0, 0));

        let namespaces: Vec<NamespaceStats> = {
            let mut stmt = conn
                .prepare(
                    "SELECT namespace, entry_count, total_size_bytes FROM cache_namespaces ORDER BY namespace",
                )
                .map_err(|e| db_error("failed to prepare namespace stats query", e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(NamespaceStats {
                        namespace: row.get(0)?,
                        entry_count: row.get::<_, i64>(1)? as usize,
                        total_size_bytes: row.get::<_, i64>(2)? as u64,
                    })
                })
                .map_err(|e| db_error("failed to query namespace stats", e))?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        Ok(CacheStats {
            total_entries: total_entries as usize,
            total_size_bytes: total_size_bytes as u64,
            max_size_bytes: self.config.max_size_bytes,
            namespaces,
        })
    }

    fn clear(&self, namespace: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        match namespace {
            Some(ns) => {
                conn.execute("DELETE FROM cache_entries WHERE namespace = ?1", params![ns])
                    .map_err(|e| db_error("failed to clear cache namespace", e))?;
                conn.execute("DELETE FROM cache_namespaces WHERE namespace = ?1", params![ns])
                    .map_err(|e| db_error("failed to clear namespace metadata", e))?;
                debug!(namespace = ns, "cleared cache namespace");
            }
            None => {
                conn.execute("DELETE FROM cache_entries", [])
                    .map_err(|e| db_error("failed to clear cache entries", e))?;
                conn.execute("DELETE FROM cache_namespaces", [])
                    .map_err(|e| db_error("failed to clear namespace metadata", e))?;
                debug!("cleared entire cache");
            }
        }
        Ok(())
    }
}
