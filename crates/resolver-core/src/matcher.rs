//! Matcher: pairs each ArtifactRef with the best local candidate, if any (§4.5).

use crate::config::Config;
use crate::inventory::Inventory;
use crate::keyword::extract_keywords;
use crate::types::{ArtifactRef, MatchResult, MatchStatus};

/// Match one ArtifactRef against the inventory: exact match first, then
/// fuzzy, else missing. Partial matches are surfaced but never auto-queued.
pub fn match_one(artifact_ref: &ArtifactRef, inventory: &Inventory, config: &Config) -> MatchResult {
    if let Some(model) = inventory.lookup_exact(&artifact_ref.filename) {
        return MatchResult {
            status: MatchStatus::Present,
            score: 1.0,
            candidate: Some(model),
        };
    }

    let keywords = extract_keywords(&artifact_ref.filename);
    if let Some((model, score)) = inventory.lookup_fuzzy(
        &keywords,
        artifact_ref.kind,
        config.matching.fuzzy_threshold,
        config,
    ) {
        return MatchResult {
            status: MatchStatus::Partial,
            score,
            candidate: Some(model),
        };
    }

    MatchResult {
        status: MatchStatus::Missing,
        score: 0.0,
        candidate: None,
    }
}

/// Match every ArtifactRef, preserving input order.
pub fn match_all(refs: &[ArtifactRef], inventory: &Inventory, config: &Config) -> Vec<MatchResult> {
    refs.iter().map(|r| match_one(r, inventory, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, SqliteCache};
    use crate::types::{ArtifactKind, DetectionStrategy};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_ref(filename: &str, kind: ArtifactKind) -> ArtifactRef {
        ArtifactRef {
            filename: filename.to_string(),
            kind,
            node_id: "1".into(),
            node_type: "VAELoader".into(),
            detection_strategy: DetectionStrategy::KnownLoader,
        }
    }

    #[test]
    fn exact_match_short_circuits_scenario_4() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vae")).unwrap();
        fs::write(dir.path().join("vae/ae.safetensors"), b"0123456789").unwrap();

        let config = Config::new(dir.path()).unwrap();
        let cache: Arc<dyn CacheBackend> = Arc::new(
            SqliteCache::new(config.paths.cache_dir.join("cache.db")).unwrap(),
        );
        let inventory = Inventory::index(dir.path(), &config, &cache).unwrap();

        let result = match_one(&make_ref("ae.safetensors", ArtifactKind::Vae), &inventory, &config);
        assert_eq!(result.status, MatchStatus::Present);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn partial_match_surfaced_scenario_5() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vae")).unwrap();
        fs::write(
            dir.path().join("vae/epicRealism_naturalSin.safetensors"),
            b"x",
        )
        .unwrap();

        let config = Config::new(dir.path()).unwrap();
        let cache: Arc<dyn CacheBackend> = Arc::new(
            SqliteCache::new(config.paths.cache_dir.join("cache.db")).unwrap(),
        );
        let inventory = Inventory::index(dir.path(), &config, &cache).unwrap();

        let result = match_one(
            &make_ref("epicRealism_naturalSinRC1VAE.safetensors", ArtifactKind::Vae),
            &inventory,
            &config,
        );
        assert_eq!(result.status, MatchStatus::Partial);
        assert!(result.score >= 0.7);
    }

    #[test]
    fn missing_when_nothing_clears_threshold() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path()).unwrap();
        let cache: Arc<dyn CacheBackend> = Arc::new(
            SqliteCache::new(config.paths.cache_dir.join("cache.db")).unwrap(),
        );
        let inventory = Inventory::index(dir.path(), &config, &cache).unwrap();

        let result = match_one(
            &make_ref("nonexistent.safetensors", ArtifactKind::Checkpoint),
            &inventory,
            &config,
        );
        assert_eq!(result.status, MatchStatus::Missing);
    }

    #[test]
    fn fuzzy_threshold_of_one_reduces_to_exact_semantics() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vae")).unwrap();
        fs::write(
            dir.path().join("vae/epicRealism_naturalSin.safetensors"),
            b"x",
        )
        .unwrap();

        let mut config = Config::new(dir.path()).unwrap();
        config.matching.fuzzy_threshold = 1.0;
        let cache: Arc<dyn CacheBackend> = Arc::new(
            SqliteCache::new(config.paths.cache_dir.join("cache.db")).unwrap(),
        );
        let inventory = Inventory::index(dir.path(), &config, &cache).unwrap();

        let result = match_one(
            &make_ref("epicRealism_naturalSinRC1VAE.safetensors", ArtifactKind::Vae),
            &inventory,
            &config,
        );
        assert_eq!(result.status, MatchStatus::Missing);
    }
}
