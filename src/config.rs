use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub jobs_dir: PathBuf,
    pub client_dist: PathBuf,
    pub drive_base_url: String,
    pub graph_base_url: String,
    pub poll_interval_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".into()));

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            jobs_dir: data_dir.join("jobs"),
            data_dir,
            client_dist: PathBuf::from(
                std::env::var("CLIENT_DIST").unwrap_or_else(|_| "client".into()),
            ),
            drive_base_url: std::env::var("DRIVE_BASE_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".into()),
            graph_base_url: std::env::var("GRAPH_BASE_URL")
                .unwrap_or_else(|_| "https://graph-video.facebook.com/v19.0".into()),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(250),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
