//! Facebook Graph client: ad-account video listing and the three-phase
//! resumable upload (`start` / `transfer` / `finish`).

use crate::clients::{ClientError, ProgressFn, SinkClient};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct VideoPage {
    #[serde(default)]
    data: Vec<VideoEntry>,
    paging: Option<Paging>,
    error: Option<GraphErrorBody>,
}

#[derive(Debug, Deserialize)]
struct VideoEntry {
    id: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    cursors: Option<Cursors>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Cursors {
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    upload_session_id: Option<String>,
    start_offset: Option<String>,
    end_offset: Option<String>,
    error: Option<GraphErrorBody>,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    start_offset: Option<String>,
    end_offset: Option<String>,
    error: Option<GraphErrorBody>,
}

#[derive(Debug, Deserialize)]
struct FinishResponse {
    video_id: Option<String>,
    error: Option<GraphErrorBody>,
}

impl GraphClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            account_id: account_id.into(),
            access_token: access_token.into(),
        }
    }

    fn videos_url(&self) -> String {
        format!("{}/{}/advideos", self.base_url, self.account_id)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        form: reqwest::multipart::Form,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(self.videos_url())
            .multipart(form)
            .send()
            .await?;
        Ok(resp.json().await?)
    }
}

fn parse_offset(value: Option<String>, field: &str) -> Result<u64, ClientError> {
    value
        .as_deref()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ClientError::Api(format!("Graph response missing {field}")))
}

fn api_error(error: Option<GraphErrorBody>, phase: &str) -> ClientError {
    match error {
        Some(e) => ClientError::Api(format!("Graph {phase} failed: {}", e.message)),
        None => ClientError::Api(format!("Graph {phase} returned an incomplete response")),
    }
}

#[async_trait]
impl SinkClient for GraphClient {
    async fn list_titles(&self) -> Result<HashMap<String, String>, ClientError> {
        let mut titles = HashMap::new();
        let mut after: Option<String> = None;

        loop {
            let mut req = self.http.get(self.videos_url()).query(&[
                ("fields", "id,title"),
                ("access_token", self.access_token.as_str()),
            ]);
            if let Some(cursor) = &after {
                req = req.query(&[("after", cursor.as_str())]);
            }

            let page: VideoPage = req.send().await?.json().await?;
            if let Some(err) = page.error {
                return Err(ClientError::Api(format!(
                    "Graph video listing failed: {}",
                    err.message
                )));
            }
            for video in page.data {
                if let Some(title) = video.title {
                    titles.insert(title, video.id);
                }
            }

            let paging = page.paging;
            let has_next = paging.as_ref().is_some_and(|p| p.next.is_some());
            after = paging.and_then(|p| p.cursors).and_then(|c| c.after);
            if !has_next || after.is_none() {
                break;
            }
        }

        Ok(titles)
    }

    async fn upload(
        &self,
        path: &Path,
        title: &str,
        progress: ProgressFn<'_>,
    ) -> Result<String, ClientError> {
        let file_size = tokio::fs::metadata(path).await?.len();

        // Phase 1: start
        let form = reqwest::multipart::Form::new()
            .text("upload_phase", "start")
            .text("file_size", file_size.to_string())
            .text("access_token", self.access_token.clone());
        let start: StartResponse = self.post_form(form).await?;
        let session_id = match start.upload_session_id {
            Some(id) => id,
            None => return Err(api_error(start.error, "start")),
        };
        let mut start_offset = parse_offset(start.start_offset, "start_offset")?;
        let mut end_offset = parse_offset(start.end_offset, "end_offset")?;

        // Phase 2: transfer chunks until the server reports no further window
        let mut file = tokio::fs::File::open(path).await?;
        while start_offset < end_offset {
            let len = (end_offset - start_offset) as usize;
            let mut chunk = vec![0u8; len];
            file.seek(SeekFrom::Start(start_offset)).await?;
            file.read_exact(&mut chunk).await?;

            let part = reqwest::multipart::Part::bytes(chunk)
                .file_name(format!("{title}.chunk"));
            let form = reqwest::multipart::Form::new()
                .text("upload_phase", "transfer")
                .text("upload_session_id", session_id.clone())
                .text("start_offset", start_offset.to_string())
                .text("access_token", self.access_token.clone())
                .part("video_file_chunk", part);
            let transfer: TransferResponse = self.post_form(form).await?;
            if let Some(err) = transfer.error {
                return Err(ClientError::Api(format!(
                    "Graph transfer failed: {}",
                    err.message
                )));
            }
            start_offset = parse_offset(transfer.start_offset, "start_offset")?;
            end_offset = parse_offset(transfer.end_offset, "end_offset")?;

            if file_size > 0 {
                progress((start_offset * 100 / file_size).min(100) as u8);
            }
        }

        // Phase 3: finish commits the upload and assigns the title
        let form = reqwest::multipart::Form::new()
            .text("upload_phase", "finish")
            .text("upload_session_id", session_id)
            .text("title", title.to_string())
            .text("access_token", self.access_token.clone());
        let finish: FinishResponse = self.post_form(form).await?;
        match finish.video_id {
            Some(id) => Ok(id),
            None => Err(api_error(finish.error, "finish")),
        }
    }
}
