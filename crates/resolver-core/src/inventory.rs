//! Local Inventory: recursive filesystem scan of the models root, with a
//! TTL-cached snapshot keyed by the absolute root path, plus exact and fuzzy
//! filename lookup over the scanned set (§4.4).

use crate::cache::CacheBackend;
use crate::config::Config;
use crate::error::Result;
use crate::keyword::{extract_keywords, jaccard_similarity};
use crate::types::{ArtifactKind, LocalModel};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use walkdir::WalkDir;

const NAMESPACE: &str = "inventory";

const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "safetensors",
    "ckpt",
    "pt",
    "pth",
    "bin",
    "onnx",
    "gguf",
];

fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_lowercase();
            RECOGNIZED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// A scanned snapshot of every recognized model file under a root, keyed by
/// lowercase filename for O(1) exact lookup.
pub struct Inventory {
    by_filename: HashMap<String, LocalModel>,
}

impl Inventory {
    /// Scan `root` recursively, caching the result under the `inventory`
    /// namespace keyed by the absolute root path. An unreadable subtree is
    /// skipped and logged; the top-level scan itself never fails.
    pub fn index(root: &Path, config: &Config, cache: &Arc<dyn CacheBackend>) -> Result<Self> {
        let key = root.to_string_lossy().to_string();
        let ttl = Duration::from_secs(config.cache.inventory_ttl_s);

        if let Some(bytes) = cache.get(NAMESPACE, &key)? {
            if let Ok(models) = serde_json::from_slice::<Vec<LocalModel>>(&bytes) {
                return Ok(Self::from_models(models));
            }
        }

        let models = scan(root);
        if let Ok(bytes) = serde_json::to_vec(&models) {
            cache.set(NAMESPACE, &key, &bytes, ttl)?;
        }
        Ok(Self::from_models(models))
    }

    fn from_models(models: Vec<LocalModel>) -> Self {
        let mut by_filename = HashMap::with_capacity(models.len());
        for model in models {
            by_filename.insert(model.filename.to_lowercase(), model);
        }
        Self { by_filename }
    }

    /// Case-insensitive exact filename match, O(1).
    pub fn lookup_exact(&self, filename: &str) -> Option<LocalModel> {
        self.by_filename.get(&filename.to_lowercase()).cloned()
    }

    /// Best fuzzy match among models in `kind`'s canonical subdirectory (or
    /// all models, when `kind` is `Unknown`), scored by Jaccard similarity
    /// against `keywords`. Returns `None` if nothing clears `threshold`.
    pub fn lookup_fuzzy(
        &self,
        keywords: &[String],
        kind: ArtifactKind,
        threshold: f64,
        config: &Config,
    ) -> Option<(LocalModel, f64)> {
        let restrict_subdir = if kind == ArtifactKind::Unknown {
            None
        } else {
            Some(config.subdir_for(kind))
        };

        self.by_filename
            .values()
            .filter(|model| {
                restrict_subdir
                    .map(|subdir| model.subdirectory == subdir)
                    .unwrap_or(true)
            })
            .map(|model| (model, jaccard_similarity(keywords, &model.keywords)))
            .filter(|(_, score)| *score >= threshold)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(model, score)| (model.clone(), score))
    }

    pub fn len(&self) -> usize {
        self.by_filename.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_filename.is_empty()
    }
}

fn scan(root: &Path) -> Vec<LocalModel> {
    let mut out = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable inventory subtree");
                None
            }
        })
    {
        if !entry.file_type().is_file() || !has_recognized_extension(entry.path()) {
            continue;
        }
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "skipping unreadable inventory entry");
                continue;
            }
        };

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let subdirectory = path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .and_then(|p| p.components().next())
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .unwrap_or_default();

        out.push(LocalModel {
            absolute_path: path.to_path_buf(),
            filename: filename.clone(),
            size_bytes: metadata.len(),
            modified_at: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            subdirectory,
            keywords: extract_keywords(&filename),
        });
    }

    out
}
