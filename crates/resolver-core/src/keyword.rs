//! Filename → keyword set extraction, and Jaccard similarity over keyword sets.
//!
//! Pure and deterministic: the same filename always yields the same token
//! sequence, in first-seen order.

use regex::Regex;
use std::collections::HashSet;
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

const STOP_LIST: &[&str] = &[
    "q4", "q5", "q6", "q8", "q4_0", "q4_1", "q4_k", "q4_k_m", "q4_k_s", "q5_0", "q5_1", "q5_k",
    "q5_k_m", "q5_k_s", "q6_k", "q8_0", "gguf", "ggml", "fp16", "fp32", "bf16", "int8", "f16",
    "f32", "pruned", "ema", "emaonly", "vae", "novae", "inpainting", "refiner", "base", "full",
    "lite", "v1", "v2", "v3", "v4", "v5", "v1.0", "v2.0", "v3.0", "final", "latest", "alpha",
    "beta", "rc", "release", "512", "768", "1024", "2048", "xl", "xxl", "small", "medium",
    "large",
];

const PRESERVE_LIST: &[&str] = &[
    "sdxl",
    "sd15",
    "sd21",
    "flux",
    "animatediff",
    "controlnet",
    "openpose",
    "canny",
    "depth",
    "normal",
    "semantic",
];

static CASE_TRANSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:(?<=[a-z])(?=[A-Z]))|(?:(?<=[A-Za-z])(?=[0-9]))|(?:(?<=[0-9])(?=[A-Za-z]))").unwrap());

/// Strip a recognized extension from `filename`, if it has one.
fn strip_extension(filename: &str) -> &str {
    let lower = filename.to_lowercase();
    for ext in RECOGNIZED_EXTENSIONS {
        if lower.ends_with(ext) {
            return &filename[..filename.len() - ext.len()];
        }
    }
    filename
}

fn segment(token: &str) -> Vec<String> {
    if token.is_empty() {
        return Vec::new();
    }
    CASE_TRANSITION
        .split(token)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Extract an ordered, duplicate-free sequence of lowercase keyword tokens
/// from a filename (§4.1).
pub fn extract_keywords(filename: &str) -> Vec<String> {
    let stem = strip_extension(filename);
    let preserve: HashSet<&str> = PRESERVE_LIST.iter().copied().collect();
    let stop: HashSet<&str> = STOP_LIST.iter().copied().collect();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in stem.split(['_', '-', '.', ' ']) {
        for seg in segment(raw) {
            let lower = seg.to_lowercase();
            if lower.is_empty() {
                continue;
            }
            if stop.contains(lower.as_str()) && !preserve.contains(lower.as_str()) {
                continue;
            }
            if seen.insert(lower.clone()) {
                out.push(lower);
            }
        }
    }
    out
}

/// Jaccard similarity |A ∩ B| / |A ∪ B| between two keyword sequences.
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let set_b: HashSet<&str> = b.iter().map(|s| s.as_str()).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}
