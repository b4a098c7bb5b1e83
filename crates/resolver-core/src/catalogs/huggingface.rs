//! HuggingFace-like catalog adapter (§4.8).

use super::{confidence_for, CatalogAdapter};
use crate::cache::CacheBackend;
use crate::config::CatalogHConfig;
use crate::error::{Error, Result};
use crate::network::HttpClient;
use crate::types::{ArtifactKind, CatalogId, SearchHit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Serialize)]
struct HfModelSummary {
    id: String,
    #[serde(default)]
    siblings: Vec<HfSibling>,
}

#[derive(Debug, Deserialize, Serialize)]
struct HfSibling {
    rfilename: String,
}

/// Queries a HuggingFace-like models index and inspects each candidate
/// model's file listing for the requested filename.
pub struct HuggingFaceCatalog {
    http: Arc<HttpClient>,
    config: CatalogHConfig,
    cache: Arc<dyn CacheBackend>,
    cache_ttl: Duration,
}

impl HuggingFaceCatalog {
    pub fn new(
        http: Arc<HttpClient>,
        config: CatalogHConfig,
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

    fn cache_key(&self, query: &str) -> String {
        format!("catalog_h:{}", query.to_lowercase())
    }

    async fn search_one_query(&self, filename: &str, query: &str) -> Result<Vec<SearchHit>> {
        let key = self.cache_key(query);
        if let Some(bytes) = self.cache.get("search", &key)? {
            if let Ok(models) = serde_json::from_slice::<Vec<HfModelSummary>>(&bytes) {
                return Ok(self.hits_from_models(filename, &models));
            }
        }

        let url = format!(
            "{}/api/models?search={}&full=true",
            self.config.base_url,
            urlencoding::encode(query)
        );
        let mut headers = Vec::new();
        if let Some(token) = &self.config.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let response = self.http.get_with_headers(&url, &headers).await?;
        let models: Vec<HfModelSummary> = response.json().await.map_err(Error::from)?;
        if let Ok(bytes) = serde_json::to_vec(&models) {
            let _ = self.cache.set("search", &key, &bytes, self.cache_ttl);
        }

        Ok(self.hits_from_models(filename, &models))
    }

    fn hits_from_models(&self, filename: &str, models: &[HfModelSummary]) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        for model in models {
            let best = model
                .siblings
                .iter()
                .map(|s| (s, confidence_for(filename, &s.rfilename)))
                .max_by(|(_, (_, a)), (_, (_, b))| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let Some((sibling, (confidence, score))) = best else {
                continue;
            };
            if score <= 0.0 {
                continue;
            }

            hits.push(SearchHit {
                source_catalog: CatalogId::CatalogH,
                repository_or_author: model.id.clone(),
                display_name: sibling.rfilename.clone(),
                direct_url: format!(
                    "{}/{}/resolve/main/{}",
                    self.config.base_url, model.id, sibling.rfilename
                ),
                size_bytes: None,
                kind_hint: None,
                confidence,
            });
        }
        hits
    }
}

#[async_trait::async_trait]
impl CatalogAdapter for HuggingFaceCatalog {
    fn id(&self) -> CatalogId {
        CatalogId::CatalogH
    }

    async fn search(
        &self,
        filename: &str,
        _kind: ArtifactKind,
        queries: &[String],
    ) -> Result<Vec<SearchHit>> {
        let mut all = Vec::new();
        for query in queries {
            match self.search_one_query(filename, query).await {
                Ok(hits) => all.extend(hits),
                Err(Error::NotFound { .. }) => {
                    debug!(query, "catalog_h query returned no hits");
                }
                Err(e) => {
                    warn!(query, error = %e, "catalog_h query failed");
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

    #[test]
    fn hits_from_models_prefers_exact_filename() {
        let catalog = HuggingFaceCatalog::new(
            Arc::new(HttpClient::new().unwrap()),
            CatalogHConfig::default(),
            Arc::new(crate::cache::SqliteCache::new(
                std::env::temp_dir().join("resolver-core-hf-test.db"),
            )
            .unwrap()),
            Duration::from_secs(60),
        );

        let models = vec![HfModelSummary {
            id: "city96/FLUX.1-dev-gguf".to_string(),
            siblings: vec![
                HfSibling {
                    rfilename: "readme.md".to_string(),
                },
                HfSibling {
                    rfilename: "flux1-dev-Q4_0.gguf".to_string(),
                },
            ],
        }];

        let hits = catalog.hits_from_models("flux1-dev-Q4_0.gguf", &models);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "flux1-dev-Q4_0.gguf");
        assert_eq!(hits[0].confidence, crate::types::HitConfidence::Exact);
    }
}
