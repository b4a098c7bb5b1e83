//! Query Synthesizer: turns a filename into an ordered, deduplicated list of
//! query strings for the catalog adapters (§4.7).

use regex::Regex;
use std::sync::LazyLock;

const RECOGNIZED_EXTENSIONS: &[&str] = &[
    ".safetensors",
    ".ckpt",
    ".pt",
    ".pth",
    ".bin",
    ".onnx",
    ".gguf",
];

static SIZE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\d+gb").unwrap());

fn strip_extension(filename: &str) -> &str {
    let lower = filename.to_lowercase();
    for ext in RECOGNIZED_EXTENSIONS {
        if lower.ends_with(ext) {
            return &filename[..filename.len() - ext.len()];
        }
    }
    filename
}

fn basename(stem: &str) -> String {
    stem.to_string()
}

fn technical(stem: &str) -> String {
    SIZE_MARKER.replace_all(stem, "").trim_matches(['_', '-', ' ']).to_string()
}

struct FamilyRule {
    variants: &'static [&'static str],
    canonical: fn(&str) -> Vec<String>,
}

fn flux_canonical(stem: &str) -> Vec<String> {
    let lower = stem.to_lowercase();
    let mut versions = Vec::new();
    for version in ["dev", "schnell", "pro"] {
        if lower.contains(version) {
            versions.push(version);
        }
    }
    if versions.is_empty() {
        versions.push("dev");
    }
    versions
        .into_iter()
        .map(|v| format!("flux1-{v}"))
        .collect()
}

fn wan_canonical(_stem: &str) -> Vec<String> {
    vec!["Wan2.1".to_string()]
}

fn hunyuan_canonical(_stem: &str) -> Vec<String> {
    vec!["HunyuanDiT".to_string()]
}

static FAMILY_RULES: &[FamilyRule] = &[
    FamilyRule {
        variants: &["flux1", "flux-1", "flux_1", "flux"],
        canonical: flux_canonical,
    },
    FamilyRule {
        variants: &["wan2.1", "wan2_1", "wan21", "wan2", "wan"],
        canonical: wan_canonical,
    },
    FamilyRule {
        variants: &["hunyuan", "hy"],
        canonical: hunyuan_canonical,
    },
];

fn normalized_series(stem: &str) -> Vec<String> {
    let lower = stem.to_lowercase();
    for rule in FAMILY_RULES {
        if rule.variants.iter().any(|v| lower.contains(v)) {
            return (rule.canonical)(&lower);
        }
    }
    Vec::new()
}

fn separator_variants(query: &str) -> Vec<String> {
    let mut out = Vec::new();
    if query.contains('.') || query.contains('_') {
        out.push(query.replace(['.', '_'], "-"));
        out.push(query.replace(['.', '_'], " "));
    }
    out
}

/// Curated-author repository hints for `.gguf` filenames on catalog_H (§4.7).
pub fn repository_hints(filename: &str, curated_authors: &[String]) -> Vec<String> {
    if !filename.to_lowercase().ends_with(".gguf") {
        return Vec::new();
    }
    let stem = strip_extension(filename);
    let lower = stem.to_lowercase();
    let mut family = None;
    for rule in FAMILY_RULES {
        if rule.variants.iter().any(|v| lower.contains(v)) {
            family = Some((rule.canonical)(&lower));
            break;
        }
    }
    let Some(canonical_variants) = family else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for author in curated_authors {
        for canonical in &canonical_variants {
            out.push(format!("{author}/{canonical}-gguf"));
            out.push(format!("{author}/{}-gguf", canonical.to_uppercase()));
        }
    }
    out
}

/// Emit an ordered, first-seen-deduplicated list of query strings for
/// `filename`. `curated_authors` feeds the repository-hint decomposer and is
/// only relevant when the adapter is catalog_H and the file is `.gguf`.
pub fn synthesize(filename: &str, curated_authors: &[String]) -> Vec<String> {
    let stem = strip_extension(filename);
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    let mut candidates = vec![basename(stem), technical(stem)];
    candidates.extend(normalized_series(stem));
    candidates.extend(repository_hints(filename, curated_authors));

    for candidate in &candidates {
        push_unique(candidate.clone(), &mut out, &mut seen);
    }
    for candidate in &candidates {
        for variant in separator_variants(candidate) {
            push_unique(variant, &mut out, &mut seen);
        }
    }

    out
}

fn push_unique(q: String, out: &mut Vec<String>, seen: &mut std::collections::HashSet<String>) {
    if !q.is_empty() && seen.insert(q.clone()) {
        out.push(q);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gguf_synthesizer_scenario_2() {
        let curated = vec!["city96".to_string(), "black-forest-labs".to_string()];
        let queries = synthesize("flux1-dev-Q4_0.gguf", &curated);
        assert!(queries.iter().any(|q| q.to_lowercase().contains("flux1-dev")));
        assert!(queries.iter().any(|q| q.contains("-gguf")));
    }

    #[test]
    fn basename_strips_extension() {
        let queries = synthesize("ae.safetensors", &[]);
        assert!(queries.contains(&"ae".to_string()));
    }

    #[test]
    fn technical_drops_size_markers() {
        let result = technical("model-12gb-fp16");
        assert!(!result.to_lowercase().contains("12gb"));
        assert!(result.to_lowercase().contains("fp16"));
    }

    #[test]
    fn separator_variants_emitted_for_dotted_and_underscored_queries() {
        let variants = separator_variants("flux.1_dev");
        assert!(variants.contains(&"flux-1-dev".to_string()));
        assert!(variants.contains(&"flux 1 dev".to_string()));
    }

    #[test]
    fn repository_hints_empty_for_non_gguf() {
        assert!(repository_hints("ae.safetensors", &["city96".to_string()]).is_empty());
    }

    #[test]
    fn output_preserves_first_seen_order_and_dedups() {
        let queries = synthesize("wan2.1_model.safetensors", &[]);
        let mut seen = std::collections::HashSet::new();
        for q in &queries {
            assert!(seen.insert(q.clone()), "duplicate query: {q}");
        }
    }
}
