//! Core data types shared across the resolution pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Semantic class of a model artifact. Determines target subdirectory and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Checkpoint,
    Lora,
    Vae,
    Clip,
    Unet,
    Controlnet,
    Upscale,
    Embeddings,
    ClipVision,
    Hypernetwork,
    TextEncoder,
    Reactor,
    Unknown,
}

impl ArtifactKind {
    /// Total order used to resolve collisions when the same filename is
    /// referenced with conflicting kinds (§4.2 dedup): lower rank wins.
    fn specificity_rank(self) -> u8 {
        use ArtifactKind::*;
        match self {
            Vae => 0,
            Lora => 1,
            Clip => 2,
            Unet => 3,
            Reactor => 4,
            Controlnet => 5,
            Upscale => 6,
            Checkpoint => 7,
            Embeddings => 8,
            ClipVision => 9,
            Hypernetwork => 10,
            TextEncoder => 11,
            Unknown => 12,
        }
    }

    /// Pick the more specific of two kinds for the same filename.
    pub fn most_specific(self, other: ArtifactKind) -> ArtifactKind {
        if self.specificity_rank() <= other.specificity_rank() {
            self
        } else {
            other
        }
    }

    pub fn as_str(self) -> &'static str {
        use ArtifactKind::*;
        match self {
            Checkpoint => "checkpoint",
            Lora => "lora",
            Vae => "vae",
            Clip => "clip",
            Unet => "unet",
            Controlnet => "controlnet",
            Upscale => "upscale",
            Embeddings => "embeddings",
            ClipVision => "clip_vision",
            Hypernetwork => "hypernetwork",
            TextEncoder => "text_encoder",
            Reactor => "reactor",
            Unknown => "unknown",
        }
    }
}

/// How an ArtifactRef's filename was discovered in the workflow document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    KnownLoader,
    FluxSpecific,
    PathWalk,
    WidgetScan,
    GgufHint,
    CustomNode,
}

/// A requirement extracted from the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    pub kind: ArtifactKind,
    pub node_id: String,
    pub node_type: String,
    pub detection_strategy: DetectionStrategy,
}

/// A file discovered on local disk by the Local Inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModel {
    pub absolute_path: PathBuf,
    pub filename: String,
    pub size_bytes: u64,
    pub modified_at: SystemTime,
    pub subdirectory: String,
    pub keywords: Vec<String>,
}

/// Presence state produced by the Matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Present,
    Partial,
    Missing,
}

/// Pairing of an ArtifactRef with the best local candidate, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub status: MatchStatus,
    pub score: f64,
    pub candidate: Option<LocalModel>,
}

/// How strongly a catalog hit corresponds to the requested filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitConfidence {
    Suggestive,
    KeywordMatch,
    FilenameMatch,
    Exact,
}

/// Symbolic id of a registered catalog adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogId {
    CatalogH,
    CatalogC,
}

impl CatalogId {
    pub fn as_str(self) -> &'static str {
        match self {
            CatalogId::CatalogH => "catalog_h",
            CatalogId::CatalogC => "catalog_c",
        }
    }
}

/// One candidate from a catalog adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub source_catalog: CatalogId,
    pub repository_or_author: String,
    pub display_name: String,
    pub direct_url: String,
    pub size_bytes: Option<u64>,
    pub kind_hint: Option<ArtifactKind>,
    pub confidence: HitConfidence,
}

/// One ArtifactRef plus its ordered, deduplicated hit list and a 0-5 rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub artifact_ref: ArtifactRef,
    pub hits: Vec<SearchHit>,
    pub rating: u8,
    /// The top two queries tried, surfaced when `hits` is empty (§7).
    pub suggestions: Vec<String>,
}

/// Per-task state of a DownloadTask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    Queued,
    Active,
    Paused,
    Succeeded,
    Failed,
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadState::Succeeded | DownloadState::Failed | DownloadState::Cancelled
        )
    }
}

/// Progress snapshot emitted no more than 4x/sec while a task is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: Option<u64>,
    pub instantaneous_rate_bps: f64,
}

/// The unit of work handled by the Download Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: u64,
    pub artifact_ref: ArtifactRef,
    pub source_url: String,
    pub target_path: PathBuf,
    pub expected_size: Option<u64>,
    pub state: DownloadState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl DownloadTask {
    /// `target_path` with the reserved temp suffix appended.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .target_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(crate::config::NetworkConfig::DOWNLOAD_TEMP_SUFFIX);
        self.target_path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_prefers_vae_over_checkpoint() {
        assert_eq!(
            ArtifactKind::Checkpoint.most_specific(ArtifactKind::Vae),
            ArtifactKind::Vae
        );
    }

    #[test]
    fn temp_path_appends_reserved_suffix() {
        let task = DownloadTask {
            id: 1,
            artifact_ref: ArtifactRef {
                filename: "ae.safetensors".into(),
                kind: ArtifactKind::Vae,
                node_id: "1".into(),
                node_type: "VAELoader".into(),
                detection_strategy: DetectionStrategy::KnownLoader,
            },
            source_url: "https://example.invalid/ae.safetensors".into(),
            target_path: PathBuf::from("/models/vae/ae.safetensors"),
            expected_size: None,
            state: DownloadState::Queued,
            attempts: 0,
            last_error: None,
        };
        assert_eq!(
            task.temp_path(),
            PathBuf::from("/models/vae/ae.safetensors.part")
        );
    }
}
