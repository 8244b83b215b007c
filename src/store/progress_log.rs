//! Append-only progress log: newline-delimited `ProgressEvent` JSON.
//!
//! Single writer (the job runner), any number of readers. Each runner
//! invocation truncates and rewrites the log from scratch; a reader that
//! re-reads from the top sees the same lines in the same order.

use crate::models::{EventStatus, ProgressEvent};
use crate::store::StoreError;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Write handle to a job's progress log. Cheap to clone; clones share the
/// underlying file so progress callbacks can append from within client
/// calls.
#[derive(Clone)]
pub struct ProgressLog {
    file: Arc<Mutex<File>>,
}

impl ProgressLog {
    /// Truncate (or create) the log for a fresh runner invocation.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn append(&self, event: &ProgressEvent) -> Result<(), StoreError> {
        let line = serde_json::to_string(event)?;
        let mut file = self.file.lock().expect("progress log lock poisoned");
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }
}

/// Read every event currently in the log, skipping malformed lines. A
/// missing log reads as empty.
pub fn read_all(path: &Path) -> Result<Vec<ProgressEvent>, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ProgressEvent>(&line) {
            Ok(ev) => events.push(ev),
            Err(e) => tracing::warn!("Skipping malformed progress line: {e}"),
        }
    }
    Ok(events)
}

/// Scan a prior run's log for files that reached `done`/`success`,
/// returning `{filename → video_id}`. Used to short-circuit already
/// completed files when a runner is re-invoked on the same job.
pub fn scan_completed(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    let mut completed = HashMap::new();
    for ev in read_all(path)? {
        if ev.is_terminal() && ev.status == Some(EventStatus::Success) {
            if let (Some(name), Some(vid)) = (ev.filename, ev.video_id) {
                completed.insert(name, vid);
            }
        }
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;

    #[test]
    fn append_then_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let log = ProgressLog::create(&path).unwrap();

        let events = vec![
            ProgressEvent::progress(Phase::Download, "v.mp4", 0),
            ProgressEvent::progress(Phase::Download, "v.mp4", 100),
            ProgressEvent::success("v.mp4", "123"),
        ];
        for ev in &events {
            log.append(ev).unwrap();
        }

        assert_eq!(read_all(&path).unwrap(), events);
        // Stable across re-reads
        assert_eq!(read_all(&path).unwrap(), events);
    }

    #[test]
    fn create_truncates_prior_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");

        let log = ProgressLog::create(&path).unwrap();
        log.append(&ProgressEvent::success("old.mp4", "1")).unwrap();
        drop(log);

        let log = ProgressLog::create(&path).unwrap();
        log.append(&ProgressEvent::success("new.mp4", "2")).unwrap();

        let events = read_all(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].filename.as_deref(), Some("new.mp4"));
    }

    #[test]
    fn scan_completed_only_counts_success_terminals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let log = ProgressLog::create(&path).unwrap();

        log.append(&ProgressEvent::success("a.mp4", "1")).unwrap();
        log.append(&ProgressEvent::skipped("b.mp4", "2")).unwrap();
        log.append(&ProgressEvent::failed("c.mp4", "boom")).unwrap();
        log.append(&ProgressEvent::warning("listing failed")).unwrap();
        log.append(&ProgressEvent::progress(Phase::Upload, "d.mp4", 40))
            .unwrap();

        let completed = scan_completed(&path).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed.get("a.mp4").map(String::as_str), Some("1"));
    }

    #[test]
    fn scan_tolerates_missing_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        assert!(scan_completed(&path).unwrap().is_empty());

        std::fs::write(
            &path,
            "not json\n{\"phase\":\"done\",\"filename\":\"a.mp4\",\"status\":\"success\",\"videoId\":\"9\"}\n",
        )
        .unwrap();
        let completed = scan_completed(&path).unwrap();
        assert_eq!(completed.get("a.mp4").map(String::as_str), Some("9"));
    }
}
