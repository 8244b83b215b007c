pub mod event;
pub mod job;

pub use event::{EventStatus, Phase, ProgressEvent};
pub use job::{ConnectionParams, FileRef, JobRecord, UploadedVideo};
