//! vidbridge
//!
//! Copies video files from a Google Drive folder to a Facebook Ad Account
//! as uploaded video creatives, streaming live per-file progress to the
//! browser over SSE. All coordination between the detached job runner and
//! the progress reporter goes through a durable per-job progress log and
//! completion marker.

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod reporter;
pub mod routes;
pub mod runner;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::AppError;
