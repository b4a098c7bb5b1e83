//! Result Ranker: dedups catalog hits and turns them into a 0-5 rating (§4.9).

use crate::config::RouterConfig;
use crate::types::{ArtifactRef, HitConfidence, RankedCandidate, SearchHit};
use std::collections::HashSet;

fn base_score(confidence: HitConfidence) -> u8 {
    match confidence {
        HitConfidence::Exact => 5,
        HitConfidence::FilenameMatch => 4,
        HitConfidence::KeywordMatch => 3,
        HitConfidence::Suggestive => 1,
    }
}

fn is_curated(hit: &SearchHit, curated_authors: &[String]) -> bool {
    curated_authors
        .iter()
        .any(|author| hit.repository_or_author.eq_ignore_ascii_case(author))
}

/// Dedup `hits` by `direct_url` (first occurrence wins, preserving adapter
/// order), then stable-sort by descending confidence. The top survivor is
/// flagged as the recommended download.
pub fn rank(
    artifact_ref: &ArtifactRef,
    hits: Vec<SearchHit>,
    queries_tried: &[String],
    config: &RouterConfig,
) -> RankedCandidate {
    let mut seen = HashSet::new();
    let mut deduped: Vec<SearchHit> = Vec::new();
    for hit in hits {
        if seen.insert(hit.direct_url.clone()) {
            deduped.push(hit);
        }
    }

    deduped.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    let rating = deduped
        .first()
        .map(|hit| {
            let bonus = if is_curated(hit, &config.curated_authors) {
                1
            } else {
                0
            };
            (base_score(hit.confidence) + bonus).min(5)
        })
        .unwrap_or(0);

    let suggestions = if deduped.is_empty() {
        queries_tried.iter().take(2).cloned().collect()
    } else {
        Vec::new()
    };

    RankedCandidate {
        artifact_ref: artifact_ref.clone(),
        hits: deduped,
        rating,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArtifactKind, CatalogId, DetectionStrategy};

    fn make_ref() -> ArtifactRef {
        ArtifactRef {
            filename: "ae.safetensors".into(),
            kind: ArtifactKind::Vae,
            node_id: "1".into(),
            node_type: "VAELoader".into(),
            detection_strategy: DetectionStrategy::KnownLoader,
        }
    }

    fn hit(url: &str, confidence: HitConfidence, author: &str) -> SearchHit {
        SearchHit {
            source_catalog: CatalogId::CatalogH,
            repository_or_author: author.to_string(),
            display_name: "ae.safetensors".into(),
            direct_url: url.to_string(),
            size_bytes: None,
            kind_hint: None,
            confidence,
        }
    }

    #[test]
    fn dedups_by_direct_url_keeping_first_seen() {
        let config = RouterConfig::default();
        let hits = vec![
            hit("https://a/1", HitConfidence::Exact, "x"),
            hit("https://a/1", HitConfidence::FilenameMatch, "y"),
        ];
        let ranked = rank(&make_ref(), hits, &[], &config);
        assert_eq!(ranked.hits.len(), 1);
        assert_eq!(ranked.hits[0].repository_or_author, "x");
    }

    #[test]
    fn sorts_descending_by_confidence() {
        let config = RouterConfig::default();
        let hits = vec![
            hit("https://a/1", HitConfidence::Suggestive, "x"),
            hit("https://a/2", HitConfidence::Exact, "y"),
        ];
        let ranked = rank(&make_ref(), hits, &[], &config);
        assert_eq!(ranked.hits[0].confidence, HitConfidence::Exact);
        assert_eq!(ranked.rating, 5);
    }

    #[test]
    fn curated_author_bonus_caps_at_five() {
        let mut config = RouterConfig::default();
        config.curated_authors = vec!["trusted".to_string()];
        let hits = vec![hit("https://a/1", HitConfidence::Exact, "trusted")];
        let ranked = rank(&make_ref(), hits, &[], &config);
        assert_eq!(ranked.rating, 5);
    }

    #[test]
    fn empty_hits_yield_zero_rating_and_surfaced_suggestions() {
        let config = RouterConfig::default();
        let queries = vec!["ae".to_string(), "ae-fp16".to_string(), "ae-v2".to_string()];
        let ranked = rank(&make_ref(), Vec::new(), &queries, &config);
        assert_eq!(ranked.rating, 0);
        assert_eq!(ranked.suggestions, vec!["ae".to_string(), "ae-fp16".to_string()]);
    }
}
