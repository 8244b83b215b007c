//! Durable per-job state: the write-once job record, the append-only
//! progress log, the completion marker, and the upload manifest.
//!
//! Layout under the jobs directory:
//! ```text
//! {jobs_dir}/{job_id}/job.json       write-once job record
//! {jobs_dir}/{job_id}/events.ndjson  append-only progress log
//! {jobs_dir}/{job_id}/done           completion marker
//! {jobs_dir}/{job_id}/manifest.json  uploaded {filename, videoId} pairs
//! {jobs_dir}/{job_id}/tmp/           scratch dir for in-flight downloads
//! ```

pub mod progress_log;

use crate::models::{ConnectionParams, FileRef, JobRecord, UploadedVideo};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    fn record_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("job.json")
    }

    pub fn events_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("events.ndjson")
    }

    fn marker_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("done")
    }

    fn manifest_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("manifest.json")
    }

    pub fn scratch_dir(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("tmp")
    }

    /// Persist a fresh job record under a new id. The record is never
    /// mutated afterwards.
    pub async fn create_job(
        &self,
        files: Vec<FileRef>,
        params: ConnectionParams,
    ) -> Result<JobRecord, StoreError> {
        let record = JobRecord {
            id: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            files,
            params,
        };
        tokio::fs::create_dir_all(self.job_dir(&record.id)).await?;
        let json = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(self.record_path(&record.id), json).await?;
        Ok(record)
    }

    pub async fn load_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        match tokio::fs::read(self.record_path(job_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set the completion marker: no further events will be appended.
    pub async fn mark_complete(&self, job_id: &str) -> Result<(), StoreError> {
        tokio::fs::write(self.marker_path(job_id), b"").await?;
        Ok(())
    }

    /// Remove a stale marker left by a prior run before re-running.
    pub async fn clear_marker(&self, job_id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.marker_path(job_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn is_complete(&self, job_id: &str) -> bool {
        tokio::fs::try_exists(self.marker_path(job_id))
            .await
            .unwrap_or(false)
    }

    pub async fn write_manifest(
        &self,
        job_id: &str,
        videos: &[UploadedVideo],
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(videos)?;
        tokio::fs::write(self.manifest_path(job_id), json).await?;
        Ok(())
    }

    pub async fn read_manifest(
        &self,
        job_id: &str,
    ) -> Result<Option<Vec<UploadedVideo>>, StoreError> {
        match tokio::fs::read(self.manifest_path(job_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
