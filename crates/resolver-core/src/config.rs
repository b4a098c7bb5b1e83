//! Typed configuration for the resolver core.
//!
//! The core never parses YAML or reads environment variables itself; a typed
//! `Config` value is handed to it by the caller. This module only defines the
//! shape and the literal defaults named in the external-interface contract.

use crate::error::{Error, Result};
use crate::types::ArtifactKind;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Fixed protocol-level constants that are not meant to vary per deployment.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_TOTAL_TIMEOUT: Duration = Duration::from_secs(3600);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const CIRCUIT_BREAKER_RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);
    /// Consecutive failures against one host before its breaker trips open.
    pub const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
    /// Probe requests allowed through a half-open breaker before it decides
    /// whether the host has recovered.
    pub const CIRCUIT_BREAKER_HALF_OPEN_PROBES: u32 = 1;
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub models_root: PathBuf,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CatalogHConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for CatalogHConfig {
    fn default() -> Self {
        Self {
            base_url: "https://huggingface.co".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogCConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for CatalogCConfig {
    fn default() -> Self {
        Self {
            base_url: "https://civitai.com".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub concurrency: usize,
    pub timeout_s: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            timeout_s: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub concurrency: usize,
    pub retries: u32,
    pub chunk_bytes: usize,
    pub per_task_timeout_s: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            retries: 3,
            chunk_bytes: 4 * 1024 * 1024,
            per_task_timeout_s: NetworkConfig::DOWNLOAD_TOTAL_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub search_ttl_s: u64,
    pub inventory_ttl_s: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_s: 24 * 3600,
            inventory_ttl_s: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Authors whose hits earn the +1 trust bonus in the ranker (§4.9).
    pub curated_authors: Vec<String>,
    /// Filename prefixes treated as "official checkpoint" (§4.6).
    pub official_prefixes: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            curated_authors: vec![
                "city96".to_string(),
                "black-forest-labs".to_string(),
                "Comfy-Org".to_string(),
            ],
            official_prefixes: vec![
                "flux1-dev".to_string(),
                "flux1-schnell".to_string(),
                "sdxl-base".to_string(),
                "sd_xl_base".to_string(),
                "stable-diffusion-".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub fuzzy_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { fuzzy_threshold: 0.7 }
    }
}

/// Effective configuration for one resolver `Core`.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: PathsConfig,
    pub subdirs: HashMap<ArtifactKind, String>,
    pub catalog_h: CatalogHConfig,
    pub catalog_c: CatalogCConfig,
    pub search: SearchConfig,
    pub download: DownloadConfig,
    pub cache: CacheConfig,
    pub router: RouterConfig,
    pub matching: MatchingConfig,
}

fn default_subdirs() -> HashMap<ArtifactKind, String> {
    use ArtifactKind::*;
    [
        (Checkpoint, "checkpoints"),
        (Lora, "loras"),
        (Vae, "vae"),
        (Clip, "clip"),
        (Unet, "unet"),
        (Controlnet, "controlnet"),
        (Upscale, "upscale_models"),
        (Embeddings, "embeddings"),
        (ClipVision, "clip_vision"),
        (TextEncoder, "text_encoders"),
        (Reactor, "reactor"),
        (Hypernetwork, "hypernetworks"),
        (Unknown, "unknown"),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect()
}

impl Config {
    /// Build a config rooted at `models_root`, with every other field at its
    /// documented default.
    pub fn new(models_root: impl Into<PathBuf>) -> Result<Self> {
        let models_root = models_root.into();
        let config = Self {
            paths: PathsConfig {
                cache_dir: models_root.join(".cache"),
                models_root,
            },
            subdirs: default_subdirs(),
            catalog_h: CatalogHConfig::default(),
            catalog_c: CatalogCConfig::default(),
            search: SearchConfig::default(),
            download: DownloadConfig::default(),
            cache: CacheConfig::default(),
            router: RouterConfig::default(),
            matching: MatchingConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants. Never panics; returns `InvalidInput`.
    pub fn validate(&self) -> Result<()> {
        if !self.paths.models_root.is_absolute() {
            return Err(Error::InvalidInput {
                message: format!(
                    "paths.models_root must be absolute, got {:?}",
                    self.paths.models_root
                ),
            });
        }
        if self.download.concurrency == 0 {
            return Err(Error::InvalidInput {
                message: "download.concurrency must be >= 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.matching.fuzzy_threshold) {
            return Err(Error::InvalidInput {
                message: "matching.fuzzy_threshold must be in [0.0, 1.0]".to_string(),
            });
        }
        Ok(())
    }

    /// The subdirectory under `models_root` for a given kind, falling back to
    /// the `unknown` bucket if a caller-supplied map omits an entry.
    pub fn subdir_for(&self, kind: ArtifactKind) -> &str {
        self.subdirs
            .get(&kind)
            .map(|s| s.as_str())
            .unwrap_or("unknown")
    }

    /// Resolve the on-disk target path for an artifact of the given kind.
    pub fn target_path(&self, kind: ArtifactKind, filename: &str) -> PathBuf {
        self.paths
            .models_root
            .join(self.subdir_for(kind))
            .join(filename)
    }
}
