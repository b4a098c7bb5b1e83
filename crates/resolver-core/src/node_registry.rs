//! Node-Type Registry: static mapping from loader-node-type string to
//! (artifact-kind, target-subdirectory, accepted-extensions).
//!
//! Data, not code: the Workflow Analyzer's `known_loader` strategy looks
//! entries up here instead of matching on node-type strings directly.

use crate::types::ArtifactKind;
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy)]
pub struct NodeTypeEntry {
    pub kind: ArtifactKind,
    pub accepted_extensions: &'static [&'static str],
}

const SAFETENSORS_CKPT: &[&str] = &[".safetensors", ".ckpt", ".pt", ".pth", ".bin"];
const SAFETENSORS_GGUF: &[&str] = &[".safetensors", ".gguf"];
const ONNX_ONLY: &[&str] = &[".onnx"];

static REGISTRY: LazyLock<HashMap<&'static str, NodeTypeEntry>> = LazyLock::new(|| {
    use ArtifactKind::*;
    [
        ("CheckpointLoaderSimple", Checkpoint, SAFETENSORS_CKPT),
        ("CheckpointLoader", Checkpoint, SAFETENSORS_CKPT),
        ("LoraLoader", Lora, SAFETENSORS_CKPT),
        ("LoraLoaderModelOnly", Lora, SAFETENSORS_CKPT),
        ("VAELoader", Vae, SAFETENSORS_CKPT),
        ("CLIPLoader", Clip, SAFETENSORS_GGUF),
        ("DualCLIPLoader", Clip, SAFETENSORS_GGUF),
        ("UNETLoader", Unet, SAFETENSORS_GGUF),
        ("UNETLoaderGGUF", Unet, SAFETENSORS_GGUF),
        ("ControlNetLoader", Controlnet, SAFETENSORS_CKPT),
        ("UpscaleModelLoader", Upscale, SAFETENSORS_CKPT),
        ("CLIPVisionLoader", ClipVision, SAFETENSORS_CKPT),
        ("HypernetworkLoader", Hypernetwork, SAFETENSORS_CKPT),
        ("ReActorFaceSwap", Reactor, ONNX_ONLY),
    ]
    .into_iter()
    .map(|(name, kind, exts)| {
        (
            name,
            NodeTypeEntry {
                kind,
                accepted_extensions: exts,
            },
        )
    })
    .collect()
});

/// Look up the registry entry for a node type, if the analyzer knows it.
pub fn lookup(node_type: &str) -> Option<NodeTypeEntry> {
    REGISTRY.get(node_type).copied()
}

/// A small allow-list of community loader node types whose widgets carry
/// lora filenames, used by the `custom_node` detection strategy (§4.2).
pub fn is_custom_lora_loader(node_type: &str) -> bool {
    matches!(
        node_type,
        "Power Lora Loader (rgthree)" | "LoraLoaderStack" | "CR LoRA Stack"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_loaders() {
        let entry = lookup("VAELoader").unwrap();
        assert_eq!(entry.kind, ArtifactKind::Vae);
    }

    #[test]
    fn unknown_node_type_returns_none() {
        assert!(lookup("SomeCustomNode").is_none());
    }

    #[test]
    fn recognizes_custom_lora_loaders() {
        assert!(is_custom_lora_loader("Power Lora Loader (rgthree)"));
        assert!(!is_custom_lora_loader("CheckpointLoaderSimple"));
    }
}
