//! Job runner: the per-file transfer state machine.
//!
//! For each file in the job, in order:
//! `PENDING → DUP_CHECK → SKIPPED | DOWNLOADING → UPLOADING → DONE`.
//! One file's full download+upload completes (or fails) before the next
//! begins, so the progress log has a single writer and a deterministic
//! order. A per-file failure never aborts the job; the only fatal error is
//! a missing job record, which fails fast before any event is written.
//!
//! Re-invoking the runner on the same job is safe: a completed-set scan of
//! the prior log short-circuits already uploaded files to `skipped` events,
//! then the log is truncated and replayed from scratch so a fresh reporter
//! sees a consistent picture.

use crate::clients::{ClientError, SinkClient, SourceClient};
use crate::models::{FileRef, JobRecord, Phase, ProgressEvent, UploadedVideo};
use crate::store::progress_log::{self, ProgressLog};
use crate::store::{JobStore, StoreError};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicI16, Ordering};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("job {0} not found")]
    MissingJob(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct JobRunner<S, K> {
    store: JobStore,
    source: S,
    sink: K,
}

impl<S, K> JobRunner<S, K>
where
    S: SourceClient + Send + Sync,
    K: SinkClient + Send + Sync,
{
    pub fn new(store: JobStore, source: S, sink: K) -> Self {
        Self { store, source, sink }
    }

    /// Run the job to completion. Appends progress events as a side effect
    /// and sets the completion marker after the per-file loop exits on any
    /// path. Fails fast, without marker or events, only when the job
    /// record is missing.
    pub async fn run(&self, job_id: &str) -> Result<RunSummary, RunnerError> {
        let job = self
            .store
            .load_job(job_id)
            .await?
            .ok_or_else(|| RunnerError::MissingJob(job_id.to_string()))?;

        // Files already uploaded by a prior partial run are not retried.
        let completed = progress_log::scan_completed(&self.store.events_path(job_id))?;
        self.store.clear_marker(job_id).await?;
        let log = ProgressLog::create(&self.store.events_path(job_id))?;

        let result = self.run_files(&job, &completed, &log).await;
        if let Err(e) = &result {
            warn!("Job {job_id} loop exited with error: {e}");
        }
        self.store.mark_complete(job_id).await?;

        let summary = result?;
        info!(
            "Job {job_id} complete: {} uploaded, {} skipped, {} failed",
            summary.succeeded, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    async fn run_files(
        &self,
        job: &JobRecord,
        completed: &HashMap<String, String>,
        log: &ProgressLog,
    ) -> Result<RunSummary, StoreError> {
        // One listing call per run; failure downgrades duplicate detection
        // to "treat everything as new" rather than failing the job.
        let existing = match self.sink.list_titles().await {
            Ok(map) => map,
            Err(e) => {
                warn!("Duplicate listing failed for job {}: {e}", job.id);
                log.append(&ProgressEvent::warning(format!(
                    "duplicate listing failed: {e}"
                )))?;
                HashMap::new()
            }
        };

        let scratch = self.store.scratch_dir(&job.id);
        tokio::fs::create_dir_all(&scratch).await?;

        let mut summary = RunSummary::default();
        let mut manifest: Vec<UploadedVideo> = Vec::new();

        for file in &job.files {
            if let Some(video_id) = completed.get(&file.name) {
                log.append(&ProgressEvent::skipped(&file.name, video_id))?;
                manifest.push(UploadedVideo {
                    filename: file.name.clone(),
                    video_id: video_id.clone(),
                });
                summary.skipped += 1;
                continue;
            }

            if let Some(video_id) = existing.get(file.title()) {
                log.append(&ProgressEvent::skipped(&file.name, video_id))?;
                manifest.push(UploadedVideo {
                    filename: file.name.clone(),
                    video_id: video_id.clone(),
                });
                summary.skipped += 1;
                continue;
            }

            let tmp = scratch.join(&file.name);
            let outcome = self.transfer_file(file, &tmp, log).await;

            // The temp artifact is released on every exit path.
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove temp file {}: {e}", tmp.display());
                }
            }

            match outcome {
                Ok(video_id) => {
                    log.append(&ProgressEvent::success(&file.name, &video_id))?;
                    manifest.push(UploadedVideo {
                        filename: file.name.clone(),
                        video_id,
                    });
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!("Transfer failed for {}: {e}", file.name);
                    log.append(&ProgressEvent::failed(&file.name, e.to_string()))?;
                    summary.failed += 1;
                }
            }
        }

        self.store.write_manifest(&job.id, &manifest).await?;
        Ok(summary)
    }

    async fn transfer_file(
        &self,
        file: &FileRef,
        tmp: &Path,
        log: &ProgressLog,
    ) -> Result<String, ClientError> {
        let download = phase_emitter(log.clone(), Phase::Download, file.name.clone());
        download(0);
        self.source.download(file, tmp, &download).await?;
        download(100);

        let upload = phase_emitter(log.clone(), Phase::Upload, file.name.clone());
        upload(0);
        let video_id = self.sink.upload(tmp, file.title(), &upload).await?;
        upload(100);

        Ok(video_id)
    }
}

/// Progress callback for one (filename, phase) pair. Emits each percentage
/// at most once and enforces monotonically non-decreasing `pct`, so client
/// chunk callbacks can fire as often as they like.
fn phase_emitter(log: ProgressLog, phase: Phase, filename: String) -> impl Fn(u8) + Send + Sync {
    let last = AtomicI16::new(-1);
    move |pct| {
        let pct = pct.min(100);
        if last.fetch_max(pct as i16, Ordering::SeqCst) < pct as i16 {
            if let Err(e) = log.append(&ProgressEvent::progress(phase, &filename, pct)) {
                warn!("Dropping progress event for {filename}: {e}");
            }
        }
    }
}
