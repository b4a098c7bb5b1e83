//! Workflow Analyzer: parses a workflow document and extracts ArtifactRefs.
//!
//! Workflow nodes are decoded as a tagged shape plus a bag of string→value
//! widgets, rather than probed at runtime; the six detection strategies are
//! a pattern match over that shape (§9).

use crate::classifier;
use crate::error::{Error, Result};
use crate::node_registry;
use crate::types::{ArtifactKind, ArtifactRef, DetectionStrategy};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const RECOGNIZED_EXTENSIONS: &[&str] = &[
    ".safetensors",
    ".ckpt",
    ".pt",
    ".pth",
    ".bin",
    ".onnx",
    ".gguf",
];

/// Raw shape of a workflow document: a sequence of nodes. Unknown top-level
/// keys are ignored via `#[serde(default)]` fields that callers never read.
#[derive(Debug, Deserialize)]
pub struct WorkflowDocument {
    pub nodes: Vec<Value>,
}

fn ends_with_recognized_extension(s: &str) -> bool {
    let lower = s.to_lowercase();
    RECOGNIZED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn node_id_string(node: &Value) -> String {
    node.get("id")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn node_type_string(node: &Value) -> Option<String> {
    node.get("type").and_then(|v| v.as_str()).map(str::to_string)
}

fn widget_strings(node: &Value) -> Vec<String> {
    node.get("widgets_values")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Every string value reachable from `node.inputs`, regardless of nesting.
fn input_strings(node: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(inputs) = node.get("inputs") {
        collect_strings(inputs, &mut out);
    }
    out
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(arr) => arr.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

fn gguf_hint_kind(filename: &str) -> ArtifactKind {
    let lower = filename.to_lowercase();
    if ["encoder", "t5", "umt5", "clip"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        ArtifactKind::TextEncoder
    } else {
        ArtifactKind::Unet
    }
}

struct Hit {
    filename: String,
    kind: ArtifactKind,
    strategy: DetectionStrategy,
}

fn analyze_node(node: &Value) -> Vec<Hit> {
    let node_type = node_type_string(node);
    let widgets = widget_strings(node);
    let mut hits = Vec::new();

    // 1. known_loader
    if let Some(ty) = node_type.as_deref() {
        if let Some(entry) = node_registry::lookup(ty) {
            for w in &widgets {
                if ends_with_recognized_extension(w) {
                    hits.push(Hit {
                        filename: w.clone(),
                        kind: entry.kind,
                        strategy: DetectionStrategy::KnownLoader,
                    });
                }
            }
        }
    }
    if !hits.is_empty() {
        return hits;
    }

    // 2. flux_specific: UNet/dual-CLIP/GGUF loaders with nonstandard widget order.
    if let Some(ty) = node_type.as_deref() {
        if matches!(ty, "UNETLoaderGGUF" | "DualCLIPLoaderGGUF" | "UnetLoaderGGUF") {
            for w in &widgets {
                if w.to_lowercase().ends_with(".gguf") {
                    hits.push(Hit {
                        filename: w.clone(),
                        kind: gguf_hint_kind(w),
                        strategy: DetectionStrategy::FluxSpecific,
                    });
                }
            }
        }
    }
    if !hits.is_empty() {
        return hits;
    }

    // 3. path_walk: any input string with a path separator and a recognized extension.
    for s in input_strings(node) {
        if (s.contains('/') || s.contains('\\')) && ends_with_recognized_extension(&s) {
            let filename = s
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(&s)
                .to_string();
            hits.push(Hit {
                filename,
                kind: ArtifactKind::Unknown,
                strategy: DetectionStrategy::PathWalk,
            });
        }
    }
    if !hits.is_empty() {
        return hits;
    }

    // 4. widget_scan: any widget string with a recognized extension, unknown node type.
    for w in &widgets {
        if ends_with_recognized_extension(w) {
            hits.push(Hit {
                filename: w.clone(),
                kind: ArtifactKind::Unknown,
                strategy: DetectionStrategy::WidgetScan,
            });
        }
    }
    if !hits.is_empty() {
        return hits;
    }

    // 5. gguf_hint
    for w in &widgets {
        if w.to_lowercase().ends_with(".gguf") {
            hits.push(Hit {
                filename: w.clone(),
                kind: gguf_hint_kind(w),
                strategy: DetectionStrategy::GgufHint,
            });
        }
    }
    if !hits.is_empty() {
        return hits;
    }

    // 6. custom_node: community lora loaders.
    if let Some(ty) = node_type.as_deref() {
        if node_registry::is_custom_lora_loader(ty) {
            for w in &widgets {
                if ends_with_recognized_extension(w) {
                    hits.push(Hit {
                        filename: w.clone(),
                        kind: ArtifactKind::Lora,
                        strategy: DetectionStrategy::CustomNode,
                    });
                }
            }
        }
    }

    hits
}

/// Parse a workflow document and emit deduplicated ArtifactRefs (§4.2).
pub fn analyze(document: &Value) -> Result<Vec<ArtifactRef>> {
    let doc: WorkflowDocument = serde_json::from_value(normalize_document(document)?)
        .map_err(|e| Error::InvalidInput {
            message: format!("malformed workflow document: {e}"),
        })?;

    let mut by_filename: HashMap<String, ArtifactRef> = HashMap::new();

    for node in &doc.nodes {
        if !node.is_object() {
            warn!("skipping malformed workflow node: not an object");
            continue;
        }
        let node_id = node_id_string(node);
        let node_type = node_type_string(node).unwrap_or_else(|| "unknown".to_string());

        for mut hit in analyze_node(node) {
            hit.kind = classifier::classify(&hit.filename, hit.kind);
            let key = hit.filename.to_lowercase();
            by_filename
                .entry(key)
                .and_modify(|existing| {
                    existing.kind = existing.kind.most_specific(hit.kind);
                })
                .or_insert(ArtifactRef {
                    filename: hit.filename,
                    kind: hit.kind,
                    node_id: node_id.clone(),
                    node_type: node_type.clone(),
                    detection_strategy: hit.strategy,
                });
        }
    }

    debug!(count = by_filename.len(), "workflow analysis complete");
    Ok(by_filename.into_values().collect())
}

/// Accept either `{"nodes": [...]}` or a bare top-level array of nodes.
fn normalize_document(document: &Value) -> Result<Value> {
    if document.is_object() && document.get("nodes").is_some() {
        return Ok(document.clone());
    }
    if document.is_array() {
        return Ok(serde_json::json!({ "nodes": document }));
    }
    Err(Error::InvalidInput {
        message: "workflow document must be an object with a `nodes` array, or a bare array"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_workflow_produces_zero_refs() {
        let doc = json!({ "nodes": [] });
        let refs = analyze(&doc).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn malformed_top_level_document_fails() {
        let doc = json!("not a workflow");
        assert!(analyze(&doc).is_err());
    }

    #[test]
    fn known_loader_strategy_emits_ref() {
        let doc = json!({
            "nodes": [
                { "id": 1, "type": "VAELoader", "widgets_values": ["ae.safetensors"] }
            ]
        });
        let refs = analyze(&doc).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].filename, "ae.safetensors");
        assert_eq!(refs[0].kind, ArtifactKind::Vae);
        assert_eq!(refs[0].detection_strategy, DetectionStrategy::KnownLoader);
    }

    #[test]
    fn widget_scan_handles_unknown_node_types() {
        let doc = json!({
            "nodes": [
                { "id": 2, "type": "SomeCustomNode", "widgets_values": ["weird_model.safetensors"] }
            ]
        });
        let refs = analyze(&doc).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ArtifactKind::Unknown);
        assert_eq!(refs[0].detection_strategy, DetectionStrategy::WidgetScan);
    }

    #[test]
    fn gguf_hint_classifies_text_encoder_vs_unet() {
        let doc = json!({
            "nodes": [
                { "id": 3, "type": "Unknown", "widgets_values": ["t5-v1_1-xxl-encoder-Q4_K_S.gguf"] },
                { "id": 4, "type": "Unknown", "widgets_values": ["flux1-dev-Q4_0.gguf"] }
            ]
        });
        let refs = analyze(&doc).unwrap();
        let encoder = refs.iter().find(|r| r.filename.contains("encoder")).unwrap();
        assert_eq!(encoder.kind, ArtifactKind::TextEncoder);
        let unet = refs.iter().find(|r| r.filename.contains("flux1")).unwrap();
        assert_eq!(unet.kind, ArtifactKind::Unet);
    }

    #[test]
    fn custom_node_strategy_detects_lora() {
        let doc = json!({
            "nodes": [
                { "id": 5, "type": "Power Lora Loader (rgthree)", "widgets_values": ["Cute_3d_Cartoon_Flux.safetensors"] }
            ]
        });
        let refs = analyze(&doc).unwrap();
        assert_eq!(refs[0].kind, ArtifactKind::Lora);
        assert_eq!(refs[0].detection_strategy, DetectionStrategy::CustomNode);
    }

    #[test]
    fn dedup_collapses_same_filename_case_insensitively_to_most_specific_kind() {
        let doc = json!({
            "nodes": [
                { "id": 6, "type": "SomeCustomNode", "widgets_values": ["AE.SAFETENSORS"] },
                { "id": 7, "type": "VAELoader", "widgets_values": ["ae.safetensors"] }
            ]
        });
        let refs = analyze(&doc).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ArtifactKind::Vae);
    }

    #[test]
    fn malformed_node_is_skipped_not_fatal() {
        let doc = json!({
            "nodes": [
                "not an object",
                { "id": 8, "type": "VAELoader", "widgets_values": ["ae.safetensors"] }
            ]
        });
        let refs = analyze(&doc).unwrap();
        assert_eq!(refs.len(), 1);
    }
}
