//! resolver-core - headless library for resolving a ComfyUI-style workflow's
//! model dependencies against a local inventory and a set of remote catalogs.
//!
//! This crate provides the core functionality without any HTTP/RPC layer: a
//! caller embeds it directly and drives it programmatically.
//!
//! # Example
//!
//! ```rust,no_run
//! use resolver_core::{Config, Core};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("/path/to/models")?;
//!     let core = Core::new(config)?;
//!
//!     let document: serde_json::Value = serde_json::from_str("{}")?;
//!     let plan = core.plan(&document).await?;
//!     println!("{} artifacts, {} missing", plan.len(), plan.iter().filter(|c| c.hits.is_empty()).count());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod catalogs;
pub mod classifier;
pub mod config;
pub mod error;
pub mod inventory;
pub mod keyword;
pub mod matcher;
pub mod network;
pub mod node_registry;
pub mod query;
pub mod ranker;
pub mod router;
pub mod types;
pub mod verify;
pub mod workflow;

pub use cache::{CacheBackend, SqliteCache};
pub use cancel::CancellationToken;
pub use config::Config;
pub use error::{Error, Result};
pub use network::{DownloadManager, DownloadManagerStatus, NewDownloadTask};
pub use types::{
    ArtifactKind, ArtifactRef, CatalogId, DownloadProgress, DownloadState, DownloadTask,
    HitConfidence, LocalModel, MatchResult, MatchStatus, RankedCandidate, SearchHit,
};

use catalogs::{CatalogAdapter, CivitaiCatalog, HuggingFaceCatalog};
use inventory::Inventory;
use network::HttpClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Main entry point for one resolution session rooted at a models directory.
///
/// `Core` owns the shared cache, the HTTP client, and the Download Manager.
/// It is cheap to construct once per process and reused across calls.
pub struct Core {
    config: Config,
    cache: Arc<dyn CacheBackend>,
    catalog_h: HuggingFaceCatalog,
    catalog_c: CivitaiCatalog,
    downloads: Arc<DownloadManager>,
}

impl Core {
    /// Build a `Core` from an already-validated config. Opens (and creates,
    /// if missing) the cache database under `config.paths.cache_dir`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.paths.cache_dir)
            .map_err(|e| Error::io_with_path(e, &config.paths.cache_dir))?;

        let cache: Arc<dyn CacheBackend> =
            Arc::new(SqliteCache::new(config.paths.cache_dir.join("cache.db"))?);
        let http = Arc::new(HttpClient::new()?);
        let search_ttl = Duration::from_secs(config.cache.search_ttl_s);

        let catalog_h = HuggingFaceCatalog::new(
            http.clone(),
            config.catalog_h.clone(),
            cache.clone(),
            search_ttl,
        );
        let catalog_c = CivitaiCatalog::new(
            http.clone(),
            config.catalog_c.clone(),
            cache.clone(),
            search_ttl,
        );
        let downloads = Arc::new(DownloadManager::new(&config)?);

        Ok(Self {
            config,
            cache,
            catalog_h,
            catalog_c,
            downloads,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse a workflow document and extract its ArtifactRefs (§4.2).
    pub fn analyze(&self, document: &Value) -> Result<Vec<ArtifactRef>> {
        workflow::analyze(document)
    }

    /// Scan (or reuse a cached scan of) the local models root (§4.4).
    pub fn inventory(&self) -> Result<Inventory> {
        Inventory::index(&self.config.paths.models_root, &self.config, &self.cache)
    }

    /// Match every ArtifactRef against the local inventory (§4.5).
    pub fn match_all(&self, refs: &[ArtifactRef]) -> Result<Vec<MatchResult>> {
        let inventory = self.inventory()?;
        Ok(matcher::match_all(refs, &inventory, &self.config))
    }

    /// Route, query-synthesize, search every remote catalog, and rank the
    /// results for one ArtifactRef (§4.6-§4.9). Adapter errors on one catalog
    /// do not fail the whole search; they are logged and the other catalog's
    /// hits (if any) are still ranked.
    pub async fn search(&self, artifact_ref: &ArtifactRef) -> Result<RankedCandidate> {
        let catalog_ids = router::route(artifact_ref, &self.config.router);
        let queries = query::synthesize(&artifact_ref.filename, &self.config.router.curated_authors);

        let mut hits = Vec::new();
        for id in &catalog_ids {
            let adapter: &dyn CatalogAdapter = match id {
                CatalogId::CatalogH => &self.catalog_h,
                CatalogId::CatalogC => &self.catalog_c,
            };
            match adapter
                .search(&artifact_ref.filename, artifact_ref.kind, &queries)
                .await
            {
                Ok(adapter_hits) => hits.extend(adapter_hits),
                Err(e) => warn!(catalog = id.as_str(), error = %e, "catalog search failed"),
            }
        }

        Ok(ranker::rank(artifact_ref, hits, &queries, &self.config.router))
    }

    /// Full pipeline: analyze, match against the local inventory, and search
    /// the remote catalogs for every artifact still missing or only
    /// partially matched.
    pub async fn plan(&self, document: &Value) -> Result<Vec<RankedCandidate>> {
        let refs = self.analyze(document)?;
        let matches = self.match_all(&refs)?;

        let mut plan = Vec::with_capacity(refs.len());
        for (artifact_ref, m) in refs.iter().zip(matches.iter()) {
            if m.status == MatchStatus::Present {
                continue;
            }
            plan.push(self.search(artifact_ref).await?);
        }
        Ok(plan)
    }

    /// Enqueue a download for one ranked candidate's top hit.
    pub fn enqueue_download(&self, candidate: &RankedCandidate) -> Result<u64> {
        let hit = candidate.hits.first().ok_or_else(|| Error::NotFound {
            message: format!(
                "no hits to download for {}",
                candidate.artifact_ref.filename
            ),
        })?;

        let target_path = self
            .config
            .target_path(candidate.artifact_ref.kind, &candidate.artifact_ref.filename);

        self.downloads.enqueue(NewDownloadTask {
            artifact_ref: candidate.artifact_ref.clone(),
            source_url: hit.direct_url.clone(),
            target_path,
            expected_size: hit.size_bytes,
        })
    }

    pub fn download_status(&self) -> DownloadManagerStatus {
        self.downloads.status()
    }

    pub fn download_progress(&self, id: u64) -> Option<DownloadProgress> {
        self.downloads.progress(id)
    }

    pub fn pause_download(&self, id: u64) -> Result<()> {
        self.downloads.pause(id)
    }

    pub fn resume_download(&self, id: u64) -> Result<()> {
        self.downloads.resume(id)
    }

    pub fn cancel_download(&self, id: u64) -> Result<()> {
        self.downloads.cancel(id)
    }

    /// Aggregate cache statistics across both the inventory scan and the
    /// catalog search namespaces.
    pub fn cache_stats(&self) -> Result<cache::CacheStats> {
        self.cache.get_stats()
    }

    /// Drop cached data. `Some("search")` or `Some("inventory")` clears just
    /// that namespace; `None` drops every cached search result and inventory
    /// scan.
    pub fn clear_cache(&self, namespace: Option<&str>) -> Result<()> {
        self.cache.clear(namespace)
    }
}
