//! Download Manager: a bounded-concurrency worker pool fed by a FIFO queue,
//! with resumable, range-aware transfers and cooperative pause/cancel (§4.10).

use crate::cancel::CancellationToken;
use crate::config::{CatalogCConfig, CatalogHConfig, Config};
use crate::error::{Error, Result};
use crate::network::client::HttpClient;
use crate::network::retry::TransferBackoff;
use crate::types::{ArtifactRef, DownloadProgress, DownloadState, DownloadTask};
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{info, warn};

const HISTORY_CAPACITY: usize = 100;
const PROGRESS_MIN_INTERVAL_MS: u64 = 250;

/// A request to start a new download, before it is assigned an id.
#[derive(Debug, Clone)]
pub struct NewDownloadTask {
    pub artifact_ref: ArtifactRef,
    pub source_url: String,
    pub target_path: PathBuf,
    pub expected_size: Option<u64>,
}

/// Snapshot of queue + active + terminal tasks, returned by `status()`.
#[derive(Debug, Clone)]
pub struct DownloadManagerStatus {
    pub queued: Vec<DownloadTask>,
    pub active: Vec<DownloadTask>,
    pub history: Vec<DownloadTask>,
}

struct TaskControl {
    cancel: CancellationToken,
    paused: AtomicBool,
    resume: Notify,
}

struct TaskEntry {
    task: DownloadTask,
    control: Arc<TaskControl>,
    progress: Option<DownloadProgress>,
}

/// Bounded-concurrency download worker pool (§4.10).
pub struct DownloadManager {
    http: Arc<HttpClient>,
    catalog_h: CatalogHConfig,
    catalog_c: CatalogCConfig,
    retries: u32,
    chunk_bytes: usize,
    tasks: Mutex<HashMap<u64, TaskEntry>>,
    history: Mutex<VecDeque<DownloadTask>>,
    active_targets: Mutex<HashSet<PathBuf>>,
    semaphore: Arc<tokio::sync::Semaphore>,
    next_id: AtomicU64,
}

impl DownloadManager {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: Arc::new(HttpClient::new()?),
            catalog_h: config.catalog_h.clone(),
            catalog_c: config.catalog_c.clone(),
            retries: config.download.retries,
            chunk_bytes: config.download.chunk_bytes,
            tasks: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            active_targets: Mutex::new(HashSet::new()),
            semaphore: Arc::new(tokio::sync::Semaphore::new(config.download.concurrency.max(1))),
            next_id: AtomicU64::new(1),
        })
    }

    /// Enqueue a new download. Fails with `TargetBusy` if another task
    /// already owns `target_path`.
    pub fn enqueue(self: &Arc<Self>, spec: NewDownloadTask) -> Result<u64> {
        {
            let mut active = self.active_targets.lock().unwrap();
            if active.contains(&spec.target_path) {
                return Err(Error::TargetBusy {
                    path: spec.target_path,
                });
            }
            active.insert(spec.target_path.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = DownloadTask {
            id,
            artifact_ref: spec.artifact_ref,
            source_url: spec.source_url,
            target_path: spec.target_path,
            expected_size: spec.expected_size,
            state: DownloadState::Queued,
            attempts: 0,
            last_error: None,
        };
        let control = Arc::new(TaskControl {
            cancel: CancellationToken::new(),
            paused: AtomicBool::new(false),
            resume: Notify::new(),
        });

        self.tasks.lock().unwrap().insert(
            id,
            TaskEntry {
                task,
                control,
                progress: None,
            },
        );

        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run_task(id).await });

        Ok(id)
    }

    pub fn status(&self) -> DownloadManagerStatus {
        let tasks = self.tasks.lock().unwrap();
        let mut queued = Vec::new();
        let mut active = Vec::new();
        for entry in tasks.values() {
            match entry.task.state {
                DownloadState::Queued => queued.push(entry.task.clone()),
                DownloadState::Active | DownloadState::Paused => active.push(entry.task.clone()),
                _ => {}
            }
        }
        let history = self.history.lock().unwrap().iter().cloned().collect();
        DownloadManagerStatus {
            queued,
            active,
            history,
        }
    }

    pub fn progress(&self, id: u64) -> Option<DownloadProgress> {
        self.tasks.lock().unwrap().get(&id).and_then(|e| e.progress)
    }

    pub fn pause(&self, id: u64) -> Result<()> {
        let tasks = self.tasks.lock().unwrap();
        let entry = tasks.get(&id).ok_or_else(|| Error::NotFound {
            message: format!("no download task with id {id}"),
        })?;
        entry.control.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn resume(&self, id: u64) -> Result<()> {
        let tasks = self.tasks.lock().unwrap();
        let entry = tasks.get(&id).ok_or_else(|| Error::NotFound {
            message: format!("no download task with id {id}"),
        })?;
        entry.control.paused.store(false, Ordering::SeqCst);
        entry.control.resume.notify_waiters();
        Ok(())
    }

    pub fn cancel(&self, id: u64) -> Result<()> {
        let tasks = self.tasks.lock().unwrap();
        let entry = tasks.get(&id).ok_or_else(|| Error::NotFound {
            message: format!("no download task with id {id}"),
        })?;
        entry.control.cancel.cancel();
        entry.control.resume.notify_waiters();
        Ok(())
    }

    fn set_state(&self, id: u64, state: DownloadState) {
        if let Some(entry) = self.tasks.lock().unwrap().get_mut(&id) {
            entry.task.state = state;
        }
    }

    fn finish(&self, id: u64) {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(entry) = tasks.remove(&id) {
            self.active_targets.lock().unwrap().remove(&entry.task.target_path);
            let mut history = self.history.lock().unwrap();
            if history.len() >= HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(entry.task);
        }
    }

    async fn run_task(self: Arc<Self>, id: u64) {
        let _permit = self.semaphore.clone().acquire_owned().await.ok();
        self.set_state(id, DownloadState::Active);

        let backoff = TransferBackoff::new(
            self.retries,
            std::time::Duration::from_secs(1),
            std::time::Duration::from_secs(30),
        );

        let mut attempt = 0u32;
        loop {
            let control = {
                let tasks = self.tasks.lock().unwrap();
                match tasks.get(&id) {
                    Some(entry) => entry.control.clone(),
                    None => return,
                }
            };

            if control.cancel.is_cancelled() {
                self.cleanup_temp(id);
                self.set_state(id, DownloadState::Cancelled);
                self.finish(id);
                return;
            }

            match self.transfer_once(id, &control).await {
                Ok(bytes) => {
                    info!(id, bytes, "download succeeded");
                    self.set_state(id, DownloadState::Succeeded);
                    self.finish(id);
                    return;
                }
                Err(Error::Cancelled) => {
                    self.cleanup_temp(id);
                    self.set_state(id, DownloadState::Cancelled);
                    self.finish(id);
                    return;
                }
                Err(e) => {
                    self.record_error(id, &e);
                    if e.is_retryable() && attempt + 1 < backoff.max_attempts {
                        let delay = backoff.delay_for(attempt);
                        warn!(id, attempt, error = %e, ?delay, "download attempt failed, retrying");
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    warn!(id, error = %e, "download failed permanently");
                    self.set_state(id, DownloadState::Failed);
                    self.finish(id);
                    return;
                }
            }
        }
    }

    fn record_error(&self, id: u64, error: &Error) {
        if let Some(entry) = self.tasks.lock().unwrap().get_mut(&id) {
            entry.task.attempts += 1;
            entry.task.last_error = Some(error.to_string());
        }
    }

    fn cleanup_temp(&self, id: u64) {
        let temp_path = self
            .tasks
            .lock()
            .unwrap()
            .get(&id)
            .map(|e| e.task.temp_path());
        if let Some(path) = temp_path {
            let _ = std::fs::remove_file(path);
        }
    }

    fn auth_header(&self, host: &str) -> Option<(&'static str, String)> {
        let catalog_h_host = url::Url::parse(&self.catalog_h.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        let catalog_c_host = url::Url::parse(&self.catalog_c.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        if catalog_h_host.as_deref() == Some(host) {
            self.catalog_h
                .token
                .as_ref()
                .map(|t| ("Authorization", format!("Bearer {t}")))
        } else if catalog_c_host.as_deref() == Some(host) {
            self.catalog_c
                .api_key
                .as_ref()
                .map(|k| ("Authorization", format!("Bearer {k}")))
        } else {
            None
        }
    }

    async fn transfer_once(&self, id: u64, control: &TaskControl) -> Result<u64> {
        let task = {
            let tasks = self.tasks.lock().unwrap();
            tasks.get(&id).map(|e| e.task.clone()).ok_or(Error::Cancelled)?
        };

        if let Some(parent) = task.target_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }

        if let Some(expected) = task.expected_size {
            if let Ok(metadata) = std::fs::metadata(&task.target_path) {
                if metadata.len() == expected {
                    return Ok(expected);
                }
            }
        }

        let temp_path = task.temp_path();
        let host = url::Url::parse(&task.source_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let auth = self.auth_header(&host);

        let mut head_request = self.http.inner().head(&task.source_url);
        if let Some((name, value)) = &auth {
            head_request = head_request.header(*name, value.as_str());
        }
        let head_response = head_request.send().await.map_err(Error::from)?;
        let supports_ranges = head_response
            .headers()
            .get(reqwest::header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);
        let total_bytes = head_response.content_length().or(task.expected_size);

        let resume_from = if temp_path.exists() && supports_ranges {
            std::fs::metadata(&temp_path).map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        let mut request = self.http.inner().get(&task.source_url);
        if let Some((name, value)) = &auth {
            request = request.header(*name, value.as_str());
        }
        if resume_from > 0 {
            request = request.header(reqwest::header::RANGE, format!("bytes={resume_from}-"));
        }

        let response = request.send().await.map_err(Error::from)?;
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::PARTIAL_CONTENT {
            return Err(Error::classify_http_status(status, &host));
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&temp_path)
            .map_err(|e| Error::io_with_path(e, &temp_path))?;
        if resume_from > 0 {
            file.seek(SeekFrom::Start(resume_from))
                .map_err(|e| Error::io_with_path(e, &temp_path))?;
        } else {
            file.set_len(0).map_err(|e| Error::io_with_path(e, &temp_path))?;
        }

        let mut bytes_transferred = resume_from;
        let mut last_progress_at = Instant::now();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            loop {
                control.cancel.check()?;
                if control.paused.load(Ordering::SeqCst) {
                    self.set_state(id, DownloadState::Paused);
                    control.resume.notified().await;
                    if !control.cancel.is_cancelled() {
                        self.set_state(id, DownloadState::Active);
                    }
                } else {
                    break;
                }
            }

            let chunk = chunk.map_err(Error::from)?;
            for piece in chunk.chunks(self.chunk_bytes.max(1)) {
                file.write_all(piece)
                    .map_err(|e| Error::io_with_path(e, &temp_path))?;
            }
            bytes_transferred += chunk.len() as u64;

            if last_progress_at.elapsed().as_millis() as u64 >= PROGRESS_MIN_INTERVAL_MS {
                self.report_progress(id, bytes_transferred, total_bytes, last_progress_at);
                last_progress_at = Instant::now();
            }
        }
        file.flush().map_err(|e| Error::io_with_path(e, &temp_path))?;
        drop(file);

        if let Some(expected) = task.expected_size.or(total_bytes) {
            if bytes_transferred != expected {
                return Err(Error::IntegrityFailure {
                    path: temp_path,
                    expected,
                    actual: bytes_transferred,
                });
            }
        }

        std::fs::rename(&temp_path, &task.target_path)
            .map_err(|e| Error::io_with_path(e, &task.target_path))?;

        Ok(bytes_transferred)
    }

    fn report_progress(
        &self,
        id: u64,
        bytes_transferred: u64,
        total_bytes: Option<u64>,
        since: Instant,
    ) {
        let elapsed = since.elapsed().as_secs_f64().max(0.001);
        let progress = DownloadProgress {
            bytes_transferred,
            total_bytes,
            instantaneous_rate_bps: bytes_transferred as f64 / elapsed,
        };
        if let Some(entry) = self.tasks.lock().unwrap().get_mut(&id) {
            entry.progress = Some(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArtifactKind, DetectionStrategy};

    fn artifact_ref() -> ArtifactRef {
        ArtifactRef {
            filename: "ae.safetensors".into(),
            kind: ArtifactKind::Vae,
            node_id: "1".into(),
            node_type: "VAELoader".into(),
            detection_strategy: DetectionStrategy::KnownLoader,
        }
    }

    #[test]
    fn status_starts_empty() {
        let config = Config::new(std::env::temp_dir().join("resolver-core-test")).unwrap();
        let manager = DownloadManager::new(&config).unwrap();
        let status = manager.status();
        assert!(status.queued.is_empty());
        assert!(status.active.is_empty());
        assert!(status.history.is_empty());
    }

    #[tokio::test]
    async fn enqueue_rejects_duplicate_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path()).unwrap();
        let manager = Arc::new(DownloadManager::new(&config).unwrap());

        let target = dir.path().join("vae/ae.safetensors");
        let spec = NewDownloadTask {
            artifact_ref: artifact_ref(),
            source_url: "https://example.invalid/ae.safetensors".into(),
            target_path: target.clone(),
            expected_size: None,
        };
        // Reserve the target without waiting for the spawned worker to run.
        manager.active_targets.lock().unwrap().insert(target.clone());

        let err = manager.enqueue(spec).unwrap_err();
        assert!(matches!(err, Error::TargetBusy { .. }));
    }

    #[test]
    fn pause_and_cancel_on_unknown_id_is_not_found() {
        let config = Config::new(std::env::temp_dir().join("resolver-core-test2")).unwrap();
        let manager = DownloadManager::new(&config).unwrap();
        assert!(matches!(manager.pause(999), Err(Error::NotFound { .. })));
        assert!(matches!(manager.cancel(999), Err(Error::NotFound { .. })));
    }
}
