//! Progress reporter: tails a job's progress log and forwards frames to a
//! consumer channel, independent of the runner's lifetime.
//!
//! The log and completion marker are the only channel between runner and
//! reporter; there is no shared in-memory state. Every reporter instance
//! reads from position 0, so a reconnecting consumer is replayed the whole
//! log (at-least-once delivery; consumers must tolerate duplicates).

use crate::store::JobStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::Sender;
use tracing::warn;

pub struct ProgressReporter {
    store: JobStore,
    poll_interval: Duration,
}

impl ProgressReporter {
    pub fn new(store: JobStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// Stream a job's progress frames into `tx` until the completion
    /// marker is observed and the log is drained, or the consumer goes
    /// away. An unknown job id produces a single error frame.
    ///
    /// Frame order: `{init, files}`, then each log line as written, then
    /// `{done: true}`.
    pub async fn stream(&self, job_id: &str, tx: Sender<Value>) {
        let job = match self.store.load_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                let _ = tx.send(json!({ "error": "unknown job" })).await;
                return;
            }
            Err(e) => {
                warn!("Failed to load job {job_id}: {e}");
                let _ = tx.send(json!({ "error": e.to_string() })).await;
                return;
            }
        };

        let names: Vec<&str> = job.files.iter().map(|f| f.name.as_str()).collect();
        if tx.send(json!({ "init": true, "files": names })).await.is_err() {
            return;
        }

        if let Err(e) = self
            .tail(self.store.events_path(job_id), job_id, &tx)
            .await
        {
            warn!("Progress tail failed for job {job_id}: {e}");
            let _ = tx.send(json!({ "error": e.to_string() })).await;
        }
    }

    async fn tail(
        &self,
        events_path: PathBuf,
        job_id: &str,
        tx: &Sender<Value>,
    ) -> std::io::Result<()> {
        let mut file: Option<tokio::fs::File> = None;
        let mut pending: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 8192];

        loop {
            // Marker is checked before reading so anything appended before
            // completion is still drained on this pass.
            let complete = self.store.is_complete(job_id).await;

            if file.is_none() {
                match tokio::fs::File::open(&events_path).await {
                    Ok(f) => file = Some(f),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }

            let mut read_any = false;
            if let Some(f) = &mut file {
                loop {
                    let n = f.read(&mut chunk).await?;
                    if n == 0 {
                        break;
                    }
                    read_any = true;
                    pending.extend_from_slice(&chunk[..n]);
                }

                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(&line) {
                        Ok(frame) => {
                            if tx.send(frame).await.is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => warn!("Skipping malformed progress line: {e}"),
                    }
                }
            }

            if complete && !read_any {
                let _ = tx.send(json!({ "done": true })).await;
                return Ok(());
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
