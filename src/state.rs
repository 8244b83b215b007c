use crate::config::AppConfig;
use crate::store::JobStore;
use dashmap::DashSet;
use std::sync::Arc;

pub struct AppState {
    pub config: AppConfig,
    pub store: JobStore,
    pub http: reqwest::Client,
    pub runners: RunnerTracker,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = JobStore::new(&config.jobs_dir);
        Self {
            config,
            store,
            http: reqwest::Client::new(),
            runners: RunnerTracker::new(),
        }
    }
}

/// Tracks in-flight job runners. A job with neither a tracker entry nor a
/// completion marker died mid-run; external liveness checks use this.
#[derive(Clone)]
pub struct RunnerTracker {
    running: Arc<DashSet<String>>,
}

impl RunnerTracker {
    pub fn new() -> Self {
        Self {
            running: Arc::new(DashSet::new()),
        }
    }

    pub fn register(&self, job_id: &str) {
        self.running.insert(job_id.to_string());
    }

    pub fn complete(&self, job_id: &str) {
        self.running.remove(job_id);
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.running.contains(job_id)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}

impl Default for RunnerTracker {
    fn default() -> Self {
        Self::new()
    }
}
