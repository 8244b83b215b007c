//! Job runner state-machine tests with mock source/sink clients.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use vidbridge::clients::{ClientError, ProgressFn, SinkClient, SourceClient};
use vidbridge::models::{ConnectionParams, EventStatus, FileRef, Phase, ProgressEvent};
use vidbridge::runner::{JobRunner, RunnerError};
use vidbridge::store::progress_log::{self, ProgressLog};
use vidbridge::store::JobStore;

#[derive(Default, Clone)]
struct CallCounts(Arc<Mutex<HashMap<String, usize>>>);

impl CallCounts {
    fn bump(&self, key: &str) {
        *self.0.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;
    }

    fn get(&self, key: &str) -> usize {
        self.0.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

struct MockSource {
    fail: HashSet<String>,
    downloads: CallCounts,
}

impl MockSource {
    fn new() -> Self {
        Self {
            fail: HashSet::new(),
            downloads: CallCounts::default(),
        }
    }

    fn failing(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(|n| n.to_string()).collect(),
            downloads: CallCounts::default(),
        }
    }
}

#[async_trait]
impl SourceClient for MockSource {
    async fn list_files(&self) -> Result<Vec<FileRef>, ClientError> {
        Ok(Vec::new())
    }

    async fn download(
        &self,
        file: &FileRef,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<(), ClientError> {
        self.downloads.bump(&file.name);
        if self.fail.contains(&file.name) {
            return Err(ClientError::Api(format!(
                "simulated download failure for {}",
                file.name
            )));
        }
        progress(50);
        tokio::fs::write(dest, b"video-bytes").await?;
        Ok(())
    }
}

struct MockSink {
    existing: HashMap<String, String>,
    listing_fails: bool,
    uploads: CallCounts,
}

impl MockSink {
    fn new() -> Self {
        Self {
            existing: HashMap::new(),
            listing_fails: false,
            uploads: CallCounts::default(),
        }
    }

    fn with_existing(existing: &[(&str, &str)]) -> Self {
        Self {
            existing: existing
                .iter()
                .map(|(t, v)| (t.to_string(), v.to_string()))
                .collect(),
            listing_fails: false,
            uploads: CallCounts::default(),
        }
    }

    fn broken_listing() -> Self {
        Self {
            existing: HashMap::new(),
            listing_fails: true,
            uploads: CallCounts::default(),
        }
    }
}

#[async_trait]
impl SinkClient for MockSink {
    async fn list_titles(&self) -> Result<HashMap<String, String>, ClientError> {
        if self.listing_fails {
            return Err(ClientError::Api("simulated listing failure".into()));
        }
        Ok(self.existing.clone())
    }

    async fn upload(
        &self,
        path: &Path,
        title: &str,
        progress: ProgressFn<'_>,
    ) -> Result<String, ClientError> {
        assert!(path.exists(), "upload called without a downloaded file");
        self.uploads.bump(title);
        progress(50);
        Ok(format!("fb-{title}"))
    }
}

fn params() -> ConnectionParams {
    ConnectionParams {
        folder_id: "folder".into(),
        google_api_key: "key".into(),
        account_id: "act_1".into(),
        access_token: "token".into(),
    }
}

fn two_videos() -> Vec<FileRef> {
    vec![
        FileRef::new("a1", "Video1.mp4"),
        FileRef::new("a2", "Video2.mp4"),
    ]
}

fn events_for<'a>(events: &'a [ProgressEvent], name: &str) -> Vec<&'a ProgressEvent> {
    events
        .iter()
        .filter(|e| e.filename.as_deref() == Some(name))
        .collect()
}

fn terminal<'a>(events: &'a [ProgressEvent], name: &str) -> &'a ProgressEvent {
    events_for(events, name)
        .into_iter()
        .find(|e| e.is_terminal())
        .expect("no terminal event")
}

/// Per-file phase order and pct monotonicity (download 0..100, then
/// upload 0..100, then one terminal, nothing after).
fn assert_ordered(events: &[ProgressEvent], name: &str) {
    let file_events = events_for(events, name);
    let mut saw_upload = false;
    let mut saw_terminal = false;
    let mut last_pct: HashMap<Phase, u8> = HashMap::new();

    for ev in file_events {
        assert!(!saw_terminal, "{name}: event after terminal: {ev:?}");
        match ev.phase {
            Phase::Download => {
                assert!(!saw_upload, "{name}: download after upload started");
            }
            Phase::Upload => saw_upload = true,
            Phase::Done => {
                assert_eq!(ev.pct, Some(100));
                saw_terminal = true;
            }
            Phase::Warning => panic!("{name}: warning events carry no filename"),
        }
        if let Some(pct) = ev.pct {
            let prev = last_pct.entry(ev.phase).or_insert(0);
            assert!(pct >= *prev, "{name}: pct went backwards in {:?}", ev.phase);
            *prev = pct;
        }
    }
    assert!(saw_terminal, "{name}: no terminal event");
}

#[tokio::test]
async fn full_transfer_emits_ordered_events() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store.create_job(two_videos(), params()).await.unwrap();

    let runner = JobRunner::new(store.clone(), MockSource::new(), MockSink::new());
    let summary = runner.run(&job.id).await.unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);

    let events = progress_log::read_all(&store.events_path(&job.id)).unwrap();
    assert_ordered(&events, "Video1.mp4");
    assert_ordered(&events, "Video2.mp4");

    // Sequential processing: all of Video1's events precede Video2's
    let last_v1 = events
        .iter()
        .rposition(|e| e.filename.as_deref() == Some("Video1.mp4"))
        .unwrap();
    let first_v2 = events
        .iter()
        .position(|e| e.filename.as_deref() == Some("Video2.mp4"))
        .unwrap();
    assert!(last_v1 < first_v2);

    for name in ["Video1.mp4", "Video2.mp4"] {
        let done = terminal(&events, name);
        assert_eq!(done.status, Some(EventStatus::Success));
        assert!(done.video_id.is_some());
    }

    assert!(store.is_complete(&job.id).await);
    let manifest = store.read_manifest(&job.id).await.unwrap().unwrap();
    assert_eq!(manifest.len(), 2);
}

#[tokio::test]
async fn duplicate_title_skips_transfer_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store.create_job(two_videos(), params()).await.unwrap();

    let source = MockSource::new();
    let downloads = source.downloads.clone();
    let sink = MockSink::with_existing(&[("Video1", "existing123")]);
    let uploads = sink.uploads.clone();

    let runner = JobRunner::new(store.clone(), source, sink);
    let summary = runner.run(&job.id).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 1);

    let events = progress_log::read_all(&store.events_path(&job.id)).unwrap();

    // Exactly one event for the duplicate: the skipped terminal
    let v1_events = events_for(&events, "Video1.mp4");
    assert_eq!(v1_events.len(), 1);
    assert_eq!(v1_events[0].status, Some(EventStatus::Skipped));
    assert_eq!(v1_events[0].video_id.as_deref(), Some("existing123"));
    assert_eq!(downloads.get("Video1.mp4"), 0);
    assert_eq!(uploads.get("Video1"), 0);

    // The other file goes through the full pipeline
    assert_ordered(&events, "Video2.mp4");
    assert_eq!(
        terminal(&events, "Video2.mp4").status,
        Some(EventStatus::Success)
    );
    assert_eq!(uploads.get("Video2"), 1);
}

#[tokio::test]
async fn per_file_failure_does_not_abort_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store.create_job(two_videos(), params()).await.unwrap();

    let runner = JobRunner::new(
        store.clone(),
        MockSource::failing(&["Video2.mp4"]),
        MockSink::new(),
    );
    let summary = runner.run(&job.id).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let events = progress_log::read_all(&store.events_path(&job.id)).unwrap();
    assert_eq!(
        terminal(&events, "Video1.mp4").status,
        Some(EventStatus::Success)
    );
    let failed = terminal(&events, "Video2.mp4");
    assert_eq!(failed.status, Some(EventStatus::Error));
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .contains("simulated download failure"));

    // The job still converges on its completion marker
    assert!(store.is_complete(&job.id).await);
    let manifest = store.read_manifest(&job.id).await.unwrap().unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].filename, "Video1.mp4");
}

#[tokio::test]
async fn restarted_runner_does_not_reupload_completed_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store.create_job(two_videos(), params()).await.unwrap();

    // Prior partial run: Video1 reached success, then the process died
    // before Video2 started and before the marker was written.
    let log = ProgressLog::create(&store.events_path(&job.id)).unwrap();
    log.append(&ProgressEvent::success("Video1.mp4", "fb-Video1"))
        .unwrap();
    drop(log);

    let source = MockSource::new();
    let downloads = source.downloads.clone();
    let sink = MockSink::new();
    let uploads = sink.uploads.clone();

    let runner = JobRunner::new(store.clone(), source, sink);
    let summary = runner.run(&job.id).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 1);

    let events = progress_log::read_all(&store.events_path(&job.id)).unwrap();
    let v1_events = events_for(&events, "Video1.mp4");
    assert_eq!(v1_events.len(), 1);
    assert_eq!(v1_events[0].status, Some(EventStatus::Skipped));
    assert_eq!(v1_events[0].video_id.as_deref(), Some("fb-Video1"));

    // No second transfer for the completed file
    assert_eq!(downloads.get("Video1.mp4"), 0);
    assert_eq!(uploads.get("Video1"), 0);
    assert_eq!(uploads.get("Video2"), 1);

    // The rewritten log still names every file's outcome
    let manifest = store.read_manifest(&job.id).await.unwrap().unwrap();
    assert_eq!(manifest.len(), 2);
}

#[tokio::test]
async fn rerun_clears_stale_completion_marker_before_working() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store
        .create_job(vec![FileRef::new("a1", "Video1.mp4")], params())
        .await
        .unwrap();

    let runner = JobRunner::new(store.clone(), MockSource::new(), MockSink::new());
    runner.run(&job.id).await.unwrap();
    assert!(store.is_complete(&job.id).await);

    // A full re-run converges again: one skip, marker back in place
    let source = MockSource::new();
    let sink = MockSink::new();
    let uploads = sink.uploads.clone();
    let runner = JobRunner::new(store.clone(), source, sink);
    let summary = runner.run(&job.id).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(uploads.get("Video1"), 0);
    assert!(store.is_complete(&job.id).await);
}

#[tokio::test]
async fn temp_artifacts_are_removed_on_every_path() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store.create_job(two_videos(), params()).await.unwrap();

    let runner = JobRunner::new(
        store.clone(),
        MockSource::failing(&["Video2.mp4"]),
        MockSink::new(),
    );
    runner.run(&job.id).await.unwrap();

    let mut entries = tokio::fs::read_dir(store.scratch_dir(&job.id)).await.unwrap();
    assert!(
        entries.next_entry().await.unwrap().is_none(),
        "scratch dir should be empty after the job"
    );
}

#[tokio::test]
async fn listing_failure_downgrades_to_warning() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store.create_job(two_videos(), params()).await.unwrap();

    let sink = MockSink::broken_listing();
    let uploads = sink.uploads.clone();
    let runner = JobRunner::new(store.clone(), MockSource::new(), sink);
    let summary = runner.run(&job.id).await.unwrap();

    // All files treated as non-duplicate and transferred anyway
    assert_eq!(summary.succeeded, 2);
    assert_eq!(uploads.get("Video1"), 1);
    assert_eq!(uploads.get("Video2"), 1);

    let events = progress_log::read_all(&store.events_path(&job.id)).unwrap();
    assert_eq!(events[0].phase, Phase::Warning);
    assert_eq!(events[0].filename, None);
    assert!(events[0].error.as_deref().unwrap().contains("listing"));
}

#[tokio::test]
async fn missing_job_fails_fast_without_marker_or_events() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());

    let runner = JobRunner::new(store.clone(), MockSource::new(), MockSink::new());
    let err = runner.run("no-such-job").await.unwrap_err();
    assert!(matches!(err, RunnerError::MissingJob(_)));

    assert!(!store.is_complete("no-such-job").await);
    assert!(progress_log::read_all(&store.events_path("no-such-job"))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn log_replay_is_stable_across_reads() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new(dir.path());
    let job = store.create_job(two_videos(), params()).await.unwrap();

    let runner = JobRunner::new(store.clone(), MockSource::new(), MockSink::new());
    runner.run(&job.id).await.unwrap();

    let first = progress_log::read_all(&store.events_path(&job.id)).unwrap();
    let second = progress_log::read_all(&store.events_path(&job.id)).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}
