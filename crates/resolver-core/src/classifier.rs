//! Filename Classifier: refines an ArtifactRef's `kind` from filename
//! heuristics, which take precedence over the Workflow Analyzer's node hint.
//!
//! Evaluated as a data-driven, ordered rule table (mirroring the resolver's
//! model-type rule tables) rather than an if/else chain, so adding a rule is
//! a data change.

use crate::types::ArtifactKind;

struct Rule {
    predicate: fn(&str) -> bool,
    kind: ArtifactKind,
}

fn contains_any(lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| lower.contains(n))
}

const FLUX_LIKE_FAMILIES: &[&str] = &["flux", "sdxl", "sd15", "sd21"];
const LORA_STYLE_WORDS: &[&str] = &["lora", "style", "anime", "cartoon", "cute", "detail", "tweaker"];

fn rules() -> Vec<Rule> {
    vec![
        Rule {
            predicate: |f| f.contains("vae"),
            kind: ArtifactKind::Vae,
        },
        Rule {
            predicate: |f| f.contains("lora") || f.contains("rank"),
            kind: ArtifactKind::Lora,
        },
        Rule {
            predicate: |f| {
                f.ends_with(".gguf") && contains_any(f, &["encoder", "umt5", "t5", "clip"])
            },
            kind: ArtifactKind::TextEncoder,
        },
        Rule {
            predicate: |f| f.ends_with(".gguf"),
            kind: ArtifactKind::Unet,
        },
        Rule {
            predicate: |f| f.ends_with(".onnx"),
            kind: ArtifactKind::Reactor,
        },
        Rule {
            predicate: |f| f.ends_with(".pth") && f.contains("gfpgan"),
            kind: ArtifactKind::Reactor,
        },
        Rule {
            predicate: |f| contains_any(f, LORA_STYLE_WORDS) && contains_any(f, FLUX_LIKE_FAMILIES),
            kind: ArtifactKind::Lora,
        },
    ]
}

/// Apply the kind-override rule table to a filename. Idempotent: applying it
/// twice to the same filename yields the same kind (§8 kind override
/// monotonicity) because the function only ever reads the filename, never
/// the current kind.
pub fn classify(filename: &str, node_hint: ArtifactKind) -> ArtifactKind {
    let lower = filename.to_lowercase();
    for rule in rules() {
        if (rule.predicate)(&lower) {
            return rule.kind;
        }
    }
    node_hint
}
