//! Integration tests exercising `Core` end to end against a real temp
//! directory and SQLite-backed cache, without any network access.

use resolver_core::{ArtifactKind, Config, Core, MatchStatus};
use serde_json::json;
use tempfile::tempdir;

#[tokio::test]
async fn analyze_and_match_against_a_populated_library() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("vae")).unwrap();
    std::fs::create_dir_all(dir.path().join("loras")).unwrap();
    std::fs::write(dir.path().join("vae/ae.safetensors"), b"0123456789").unwrap();
    std::fs::write(
        dir.path().join("loras/Cute_3d_Cartoon_Flux.safetensors"),
        b"x",
    )
    .unwrap();

    let config = Config::new(dir.path()).unwrap();
    let core = Core::new(config).unwrap();

    let document = json!({
        "nodes": [
            { "id": "1", "type": "VAELoader", "widgets_values": ["ae.safetensors"] },
            {
                "id": "2",
                "type": "Power Lora Loader (rgthree)",
                "widgets_values": ["Cute_3d_Cartoon_Flux.safetensors"]
            },
            { "id": "3", "type": "UNETLoader", "widgets_values": ["flux1-dev-fp8.safetensors"] }
        ]
    });

    let refs = core.analyze(&document).unwrap();
    assert_eq!(refs.len(), 3);

    let matches = core.match_all(&refs).unwrap();
    let vae = matches
        .iter()
        .zip(&refs)
        .find(|(_, r)| r.filename == "ae.safetensors")
        .unwrap()
        .0;
    assert_eq!(vae.status, MatchStatus::Present);

    let lora = matches
        .iter()
        .zip(&refs)
        .find(|(_, r)| r.filename.to_lowercase().contains("cartoon"))
        .unwrap()
        .0;
    assert_eq!(lora.status, MatchStatus::Present);

    let missing = matches
        .iter()
        .zip(&refs)
        .find(|(_, r)| r.filename.contains("flux1-dev-fp8"))
        .unwrap()
        .0;
    assert_eq!(missing.status, MatchStatus::Missing);
}

#[tokio::test]
async fn lora_classification_overrides_checkpoint_loader_hint() {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path()).unwrap();
    let core = Core::new(config).unwrap();

    let document = json!({
        "nodes": [
            {
                "id": "1",
                "type": "CheckpointLoaderSimple",
                "widgets_values": ["Cute_3d_Cartoon_Flux.safetensors"]
            }
        ]
    });

    let refs = core.analyze(&document).unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].kind, ArtifactKind::Lora);
}

#[tokio::test]
async fn repeated_inventory_scan_reuses_the_cached_snapshot() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("vae")).unwrap();
    std::fs::write(dir.path().join("vae/ae.safetensors"), b"x").unwrap();

    let config = Config::new(dir.path()).unwrap();
    let core = Core::new(config).unwrap();

    let first = core.inventory().unwrap();
    assert_eq!(first.len(), 1);

    std::fs::write(dir.path().join("vae/new.safetensors"), b"y").unwrap();
    let second = core.inventory().unwrap();
    assert_eq!(second.len(), 1, "cached snapshot should not see the new file yet");
}

#[tokio::test]
async fn enqueueing_a_download_for_an_unreachable_host_does_not_panic() {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path()).unwrap();
    let core = Core::new(config).unwrap();

    let candidate = resolver_core::RankedCandidate {
        artifact_ref: resolver_core::ArtifactRef {
            filename: "ae.safetensors".into(),
            kind: ArtifactKind::Vae,
            node_id: "1".into(),
            node_type: "VAELoader".into(),
            detection_strategy: resolver_core::types::DetectionStrategy::KnownLoader,
        },
        hits: vec![resolver_core::SearchHit {
            source_catalog: resolver_core::CatalogId::CatalogH,
            repository_or_author: "someone/ae".into(),
            display_name: "ae.safetensors".into(),
            direct_url: "https://huggingface.invalid/someone/ae/resolve/main/ae.safetensors"
                .into(),
            size_bytes: Some(10),
            kind_hint: None,
            confidence: resolver_core::HitConfidence::Exact,
        }],
        rating: 5,
        suggestions: Vec::new(),
    };

    let id = core.enqueue_download(&candidate).unwrap();
    assert!(core.download_status().queued.iter().any(|t| t.id == id)
        || core.download_status().active.iter().any(|t| t.id == id));

    core.cancel_download(id).unwrap();
}
