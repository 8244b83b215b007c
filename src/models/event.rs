//! Progress event protocol shared by the job runner (writer) and the
//! progress reporter (reader).
//!
//! Events are serialized one per line into the per-job progress log. For a
//! given file they are totally ordered: at most one download progression
//! (0→100), then at most one upload progression (0→100), then exactly one
//! terminal `done` event. Job-level warnings carry no filename.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Download,
    Upload,
    Done,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Running,
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,

    #[serde(
        default,
        rename = "videoId",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    /// In-flight download/upload progress for one file.
    pub fn progress(phase: Phase, filename: impl Into<String>, pct: u8) -> Self {
        Self {
            phase,
            filename: Some(filename.into()),
            pct: Some(pct.min(100)),
            status: Some(EventStatus::Running),
            video_id: None,
            error: None,
        }
    }

    pub fn success(filename: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            phase: Phase::Done,
            filename: Some(filename.into()),
            pct: Some(100),
            status: Some(EventStatus::Success),
            video_id: Some(video_id.into()),
            error: None,
        }
    }

    /// Terminal event for a file skipped as a duplicate or as already
    /// completed by a prior run. Carries the existing video id.
    pub fn skipped(filename: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            phase: Phase::Done,
            filename: Some(filename.into()),
            pct: Some(100),
            status: Some(EventStatus::Skipped),
            video_id: Some(video_id.into()),
            error: None,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            phase: Phase::Done,
            filename: Some(filename.into()),
            pct: Some(100),
            status: Some(EventStatus::Error),
            video_id: None,
            error: Some(error.into()),
        }
    }

    /// Job-level warning, e.g. the duplicate-listing pre-fetch failing.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Warning,
            filename: None,
            pct: None,
            status: None,
            video_id: None,
            error: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Done
    }
}
