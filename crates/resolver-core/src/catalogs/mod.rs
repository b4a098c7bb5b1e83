//! Catalog Adapters: transport clients for the remote model catalogs (§4.8).
//!
//! Both concrete adapters implement the same [`CatalogAdapter`] contract so
//! the Search Router and Result Ranker never special-case a catalog id.

mod civitai;
mod huggingface;

pub use civitai::CivitaiCatalog;
pub use huggingface::HuggingFaceCatalog;

use crate::error::Result;
use crate::types::{ArtifactKind, CatalogId, SearchHit};
use async_trait::async_trait;

/// One remote catalog's search contract. Implementations may consult the
/// shared cache under the `search` namespace and must honor a per-call
/// deadline and the global cancellation signal.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    fn id(&self) -> CatalogId;

    async fn search(
        &self,
        filename: &str,
        kind: ArtifactKind,
        queries: &[String],
    ) -> Result<Vec<SearchHit>>;
}

/// Confidence for a candidate file found under some query, shared by both
/// adapters: exact filename match first, otherwise keyword intersection.
pub(crate) fn confidence_for(requested_filename: &str, candidate_filename: &str) -> (crate::types::HitConfidence, f64) {
    use crate::types::HitConfidence;

    if requested_filename.eq_ignore_ascii_case(candidate_filename) {
        return (HitConfidence::Exact, 1.0);
    }
    let requested = crate::keyword::extract_keywords(requested_filename);
    let candidate = crate::keyword::extract_keywords(candidate_filename);
    let score = crate::keyword::jaccard_similarity(&requested, &candidate);
    let confidence = if score >= 0.8 {
        HitConfidence::FilenameMatch
    } else if score > 0.0 {
        HitConfidence::KeywordMatch
    } else {
        HitConfidence::Suggestive
    };
    (confidence, score)
}
