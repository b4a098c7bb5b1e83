//! Civitai-like catalog adapter (§4.8).

use super::{confidence_for, CatalogAdapter};
use crate::cache::CacheBackend;
use crate::config::CatalogCConfig;
use crate::error::{Error, Result};
use crate::network::HttpClient;
use crate::types::{ArtifactKind, CatalogId, SearchHit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CivitaiResponse {
    #[serde(default)]
    items: Vec<CivitaiModel>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CivitaiModel {
    #[serde(default)]
    creator: Option<CivitaiCreator>,
    #[serde(default, rename = "modelVersions")]
    model_versions: Vec<CivitaiModelVersion>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CivitaiCreator {
    username: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CivitaiModelVersion {
    id: u64,
    #[serde(default)]
    files: Vec<CivitaiFile>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CivitaiFile {
    name: String,
    #[serde(rename = "sizeKB")]
    size_kb: Option<f64>,
}

/// Queries a Civitai-like catalog by free text. Each model version is
/// reduced to its single best-matching file: highest Jaccard similarity to
/// the requested filename, ties broken by smaller size.
pub struct CivitaiCatalog {
    http: Arc<HttpClient>,
    config: CatalogCConfig,
    cache: Arc<dyn CacheBackend>,
    cache_ttl: Duration,
}

impl CivitaiCatalog {
    pub fn new(
        http: Arc<HttpClient>,
        config: CatalogCConfig,
        cache: Arc<dyn CacheBackend>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            http,
            config,
            cache,
            cache_ttl,
        }
    }

    fn cache_key(&self, query: &str, kind: ArtifactKind) -> String {
        format!("catalog_c:{}:{}", kind.as_str(), query.to_lowercase())
    }

    async fn search_one_query(
        &self,
        filename: &str,
        kind: ArtifactKind,
        query: &str,
    ) -> Result<Vec<SearchHit>> {
        let key = self.cache_key(query, kind);
        if let Some(bytes) = self.cache.get("search", &key)? {
            if let Ok(models) = serde_json::from_slice::<Vec<CivitaiModel>>(&bytes) {
                return Ok(self.hits_from_models(filename, &models));
            }
        }

        let mut url = format!(
            "{}/api/v1/models?query={}",
            self.config.base_url,
            urlencoding::encode(query)
        );
        if kind == ArtifactKind::Lora {
            url.push_str("&types=LORA");
        }

        let mut headers = Vec::new();
        if let Some(api_key) = &self.config.api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {api_key}")));
        }

        let response = self.http.get_with_headers(&url, &headers).await?;
        let parsed: CivitaiResponse = response.json().await.map_err(Error::from)?;
        if let Ok(bytes) = serde_json::to_vec(&parsed.items) {
            let _ = self.cache.set("search", &key, &bytes, self.cache_ttl);
        }

        Ok(self.hits_from_models(filename, &parsed.items))
    }

    fn hits_from_models(&self, filename: &str, models: &[CivitaiModel]) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        for model in models {
            let author = model
                .creator
                .as_ref()
                .and_then(|c| c.username.clone())
                .unwrap_or_else(|| "unknown".to_string());

            for version in &model.model_versions {
                let best = version
                    .files
                    .iter()
                    .map(|f| (f, confidence_for(filename, &f.name)))
                    .max_by(|(fa, (_, sa)), (fb, (_, sb))| {
                        sa.partial_cmp(sb)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| {
                                let size_a = fa.size_kb.unwrap_or(f64::MAX);
                                let size_b = fb.size_kb.unwrap_or(f64::MAX);
                                size_b.partial_cmp(&size_a).unwrap_or(std::cmp::Ordering::Equal)
                            })
                    });

                let Some((file, (confidence, score))) = best else {
                    continue;
                };
                if score <= 0.0 {
                    continue;
                }

                hits.push(SearchHit {
                    source_catalog: CatalogId::CatalogC,
                    repository_or_author: author.clone(),
                    display_name: file.name.clone(),
                    direct_url: format!("{}/api/download/models/{}", self.config.base_url, version.id),
                    size_bytes: file.size_kb.map(|kb| (kb * 1024.0) as u64),
                    kind_hint: None,
                    confidence,
                });
            }
        }
        hits
    }
}

#[async_trait::async_trait]
impl CatalogAdapter for CivitaiCatalog {
    fn id(&self) -> CatalogId {
        CatalogId::CatalogC
    }

    async fn search(
        &self,
        filename: &str,
        kind: ArtifactKind,
        queries: &[String],
    ) -> Result<Vec<SearchHit>> {
        let mut all = Vec::new();
        for query in queries {
            match self.search_one_query(filename, kind, query).await {
                Ok(hits) => all.extend(hits),
                Err(Error::NotFound { .. }) => {
                    debug!(query, "catalog_c query returned no hits");
                }
                Err(e) => {
                    warn!(query, error = %e, "catalog_c query failed");
                    return Err(e);
                }
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CivitaiCatalog {
        CivitaiCatalog::new(
            Arc::new(HttpClient::new().unwrap()),
            CatalogCConfig::default(),
            Arc::new(crate::cache::SqliteCache::new(
                std::env::temp_dir().join("resolver-core-civitai-test.db"),
            )
            .unwrap()),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn picks_best_file_by_jaccard_then_smaller_size() {
        let models = vec![CivitaiModel {
            creator: Some(CivitaiCreator {
                username: Some("artist".to_string()),
            }),
            model_versions: vec![CivitaiModelVersion {
                id: 12345,
                files: vec![
                    CivitaiFile {
                        name: "cute_3d_cartoon_flux.safetensors".to_string(),
                        size_kb: Some(200_000.0),
                    },
                    CivitaiFile {
                        name: "cute_3d_cartoon_flux-pruned.safetensors".to_string(),
                        size_kb: Some(100_000.0),
                    },
                ],
            }],
        }];

        let hits = catalog().hits_from_models("Cute_3d_Cartoon_Flux.safetensors", &models);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "cute_3d_cartoon_flux.safetensors");
        assert_eq!(hits[0].direct_url, "https://civitai.com/api/download/models/12345");
    }

    #[test]
    fn version_with_no_matching_file_is_skipped() {
        let models = vec![CivitaiModel {
            creator: None,
            model_versions: vec![CivitaiModelVersion {
                id: 1,
                files: vec![CivitaiFile {
                    name: "unrelated.bin".to_string(),
                    size_kb: Some(1.0),
                }],
            }],
        }];

        let hits = catalog().hits_from_models("Cute_3d_Cartoon_Flux.safetensors", &models);
        assert!(hits.is_empty());
    }
}
