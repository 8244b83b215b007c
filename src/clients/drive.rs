//! Google Drive v3 client: folder listing and media download.

use crate::clients::{ClientError, ProgressFn, SourceClient};
use crate::models::FileRef;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

pub struct DriveClient {
    http: reqwest::Client,
    base_url: String,
    folder_id: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

impl DriveClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        folder_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            folder_id: folder_id.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SourceClient for DriveClient {
    async fn list_files(&self) -> Result<Vec<FileRef>, ClientError> {
        let url = format!("{}/files", self.base_url);
        let query = format!("'{}' in parents and mimeType contains 'video/'", self.folder_id);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self.http.get(&url).query(&[
                ("q", query.as_str()),
                ("fields", "nextPageToken,files(id,name)"),
                ("key", self.api_key.as_str()),
            ]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await?;
            if !resp.status().is_success() {
                return Err(ClientError::Api(format!(
                    "Drive listing returned HTTP {}",
                    resp.status()
                )));
            }
            let page: FileList = resp.json().await?;
            files.extend(
                page.files
                    .into_iter()
                    .map(|f| FileRef::new(f.id, f.name)),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    async fn download(
        &self,
        file: &FileRef,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<(), ClientError> {
        let url = format!("{}/files/{}", self.base_url, file.remote_id);
        let resp = self
            .http
            .get(&url)
            .query(&[("alt", "media"), ("key", self.api_key.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Api(format!(
                "Drive download returned HTTP {}",
                resp.status()
            )));
        }

        let total = resp.content_length();
        let mut out = tokio::fs::File::create(dest).await?;
        let mut received: u64 = 0;
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if let Some(total) = total {
                if total > 0 {
                    progress((received * 100 / total).min(100) as u8);
                }
            }
        }
        out.flush().await?;

        Ok(())
    }
}
