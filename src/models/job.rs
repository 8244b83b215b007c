use serde::{Deserialize, Serialize};
use std::fmt;

/// One transferable item in a Drive folder. The name's stem (minus
/// extension) doubles as the title used for duplicate matching on the
/// Facebook side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub remote_id: String,
    pub name: String,
}

impl FileRef {
    pub fn new(remote_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            name: name.into(),
        }
    }

    /// Filename stem used as the upload title and duplicate-matching key.
    pub fn title(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(idx) => &self.name[..idx],
        }
    }
}

/// Credentials and identifiers needed to reach both remote APIs.
/// Persisted in the job record, never written to the progress log.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    pub folder_id: String,
    pub google_api_key: String,
    pub account_id: String,
    pub access_token: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("folder_id", &self.folder_id)
            .field("google_api_key", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Durable job record, written once at launch and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub created_at: String,
    pub files: Vec<FileRef>,
    pub params: ConnectionParams,
}

/// One successfully transferred (or duplicate-matched) video, as exposed
/// to the campaign spreadsheet builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedVideo {
    pub filename: String,
    pub video_id: String,
}
