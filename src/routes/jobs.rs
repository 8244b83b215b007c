use crate::clients::drive::DriveClient;
use crate::clients::graph::GraphClient;
use crate::clients::SourceClient;
use crate::error::AppError;
use crate::models::{ConnectionParams, FileRef, UploadedVideo};
use crate::reporter::ProgressReporter;
use crate::runner::JobRunner;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_job))
        .route("/{id}", get(get_job))
        .route("/{id}/progress", get(progress_stream))
        .route("/{id}/manifest", get(get_manifest))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub folder_id: String,
    pub google_api_key: String,
    pub account_id: String,
    pub access_token: String,

    /// Count-only mode: perform just the listing call, create no job.
    #[serde(default)]
    pub count: bool,

    /// Explicit input subset; when absent the folder listing is used.
    #[serde(default)]
    pub files: Option<Vec<FileRef>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: String,
    pub created_at: String,
    pub files: Vec<FileRef>,
    pub running: bool,
    pub complete: bool,
}

/// Launch a transfer job (or, with `count: true`, just size the folder).
/// Returns the job id before any transfer work starts; the runner's
/// lifetime is independent of this request.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LaunchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    for (field, value) in [
        ("folderId", &body.folder_id),
        ("googleApiKey", &body.google_api_key),
        ("accountId", &body.account_id),
        ("accessToken", &body.access_token),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("{field} is required")));
        }
    }

    let drive = DriveClient::new(
        state.http.clone(),
        state.config.drive_base_url.clone(),
        body.folder_id.clone(),
        body.google_api_key.clone(),
    );

    if body.count {
        let files = drive
            .list_files()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        return Ok(Json(serde_json::json!({ "count": files.len() })));
    }

    let files = match body.files {
        Some(files) => files,
        None => drive
            .list_files()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?,
    };

    let params = ConnectionParams {
        folder_id: body.folder_id,
        google_api_key: body.google_api_key,
        account_id: body.account_id.clone(),
        access_token: body.access_token.clone(),
    };
    let job = state
        .store
        .create_job(files, params)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let graph = GraphClient::new(
        state.http.clone(),
        state.config.graph_base_url.clone(),
        body.account_id,
        body.access_token,
    );
    let runner = JobRunner::new(state.store.clone(), drive, graph);
    let tracker = state.runners.clone();
    let job_id = job.id.clone();
    tracker.register(&job_id);

    // Detached from the request: losing the connection must not stop the
    // transfer.
    tokio::spawn(async move {
        if let Err(e) = runner.run(&job_id).await {
            tracing::error!("Job {job_id} failed: {e:#}");
        }
        tracker.complete(&job_id);
    });

    Ok(Json(serde_json::json!({ "jobId": job.id })))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let job = state
        .store
        .load_job(&id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .ok_or_else(|| AppError::NotFound("Job not found".into()))?;

    Ok(Json(JobStatusResponse {
        running: state.runners.is_running(&job.id),
        complete: state.store.is_complete(&job.id).await,
        id: job.id,
        created_at: job.created_at,
        files: job.files,
    }))
}

/// Live SSE stream of a job's progress events: `{init, files}`, then one
/// frame per progress event, then `{done: true}`. A reconnecting client is
/// replayed the whole log from the start.
async fn progress_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::channel(64);
    let reporter = ProgressReporter::new(state.store.clone(), state.config.poll_interval());

    tokio::spawn(async move {
        reporter.stream(&id, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|frame| Ok(Event::default().data(frame.to_string())));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(25)))
}

async fn get_manifest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UploadedVideo>>, AppError> {
    if state
        .store
        .load_job(&id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .is_none()
    {
        return Err(AppError::NotFound("Job not found".into()));
    }
    let manifest = state
        .store
        .read_manifest(&id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .unwrap_or_default();
    Ok(Json(manifest))
}
