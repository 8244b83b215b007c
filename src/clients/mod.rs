//! Remote source (Google Drive) and sink (Facebook Graph) clients.
//!
//! The job runner depends on these only through the `SourceClient` and
//! `SinkClient` traits so tests can substitute mocks.

pub mod drive;
pub mod graph;

use crate::models::FileRef;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Callback invoked with a percentage in `0..=100` as bytes move.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

#[async_trait]
pub trait SourceClient {
    /// List the transferable files in the configured folder.
    async fn list_files(&self) -> Result<Vec<FileRef>, ClientError>;

    /// Download one file to `dest`, reporting byte-level progress.
    async fn download(
        &self,
        file: &FileRef,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<(), ClientError>;
}

#[async_trait]
pub trait SinkClient {
    /// Fetch the destination account's existing uploads as
    /// `{title → video_id}`, for duplicate matching.
    async fn list_titles(&self) -> Result<HashMap<String, String>, ClientError>;

    /// Upload a local file under the given title, returning the new
    /// video id.
    async fn upload(
        &self,
        path: &Path,
        title: &str,
        progress: ProgressFn<'_>,
    ) -> Result<String, ClientError>;
}
