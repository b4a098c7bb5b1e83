//! Search Router: given an ArtifactRef, decides which catalogs to query and
//! in what order (§4.6). The rule table is data, evaluated top to bottom.

use crate::config::RouterConfig;
use crate::types::{ArtifactKind, ArtifactRef, CatalogId};

fn is_gguf(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".gguf")
}

fn matches_official_prefix(filename: &str, config: &RouterConfig) -> bool {
    let lower = filename.to_lowercase();
    config
        .official_prefixes
        .iter()
        .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
}

/// Ordered list of catalogs to query for `artifact_ref`. Always non-empty
/// (§8 routing totality).
pub fn route(artifact_ref: &ArtifactRef, config: &RouterConfig) -> Vec<CatalogId> {
    use ArtifactKind::*;

    if artifact_ref.kind == Lora {
        return vec![CatalogId::CatalogC, CatalogId::CatalogH];
    }

    if matches!(
        artifact_ref.kind,
        Unet | Vae | Clip | TextEncoder | Controlnet | Upscale | Embeddings
    ) {
        return vec![CatalogId::CatalogH];
    }

    if is_gguf(&artifact_ref.filename) {
        return vec![CatalogId::CatalogH];
    }

    if artifact_ref.kind == Checkpoint && matches_official_prefix(&artifact_ref.filename, config) {
        return vec![CatalogId::CatalogH];
    }

    if artifact_ref.kind == Checkpoint {
        return vec![CatalogId::CatalogH, CatalogId::CatalogC];
    }

    // Unknown, and any kind not named above.
    vec![CatalogId::CatalogH, CatalogId::CatalogC]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectionStrategy;

    fn make_ref(filename: &str, kind: ArtifactKind) -> ArtifactRef {
        ArtifactRef {
            filename: filename.to_string(),
            kind,
            node_id: "1".into(),
            node_type: "Unknown".into(),
            detection_strategy: DetectionStrategy::WidgetScan,
        }
    }

    #[test]
    fn lora_routes_civitai_first_scenario_1() {
        let config = RouterConfig::default();
        let routed = route(&make_ref("Cute_3d_Cartoon_Flux.safetensors", ArtifactKind::Lora), &config);
        assert_eq!(routed, vec![CatalogId::CatalogC, CatalogId::CatalogH]);
    }

    #[test]
    fn vae_routes_huggingface_only() {
        let config = RouterConfig::default();
        let routed = route(&make_ref("ae.safetensors", ArtifactKind::Vae), &config);
        assert_eq!(routed, vec![CatalogId::CatalogH]);
    }

    #[test]
    fn gguf_routes_huggingface_only_regardless_of_kind() {
        let config = RouterConfig::default();
        let routed = route(&make_ref("flux1-dev-Q4_0.gguf", ArtifactKind::Unet), &config);
        assert_eq!(routed, vec![CatalogId::CatalogH]);
    }

    #[test]
    fn official_checkpoint_prefix_routes_huggingface_only() {
        let config = RouterConfig::default();
        let routed = route(
            &make_ref("flux1-dev-fp8.safetensors", ArtifactKind::Checkpoint),
            &config,
        );
        assert_eq!(routed, vec![CatalogId::CatalogH]);
    }

    #[test]
    fn generic_checkpoint_routes_both() {
        let config = RouterConfig::default();
        let routed = route(
            &make_ref("some_custom_merge.safetensors", ArtifactKind::Checkpoint),
            &config,
        );
        assert_eq!(routed, vec![CatalogId::CatalogH, CatalogId::CatalogC]);
    }

    #[test]
    fn unknown_kind_routes_both_and_is_never_empty() {
        let config = RouterConfig::default();
        let routed = route(&make_ref("mystery.safetensors", ArtifactKind::Unknown), &config);
        assert!(!routed.is_empty());
    }
}
