//! Google Drive v3 files API, called with a user's bearer token.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

/// Non-trashed files that look like meeting transcripts.
pub const TRANSCRIPT_QUERY: &str = "trashed = false and (\
    mimeType = 'text/plain' or \
    mimeType = 'application/vnd.google-apps.document' or \
    mimeType = 'application/vnd.openxmlformats-officedocument.wordprocessingml.document' or \
    name contains '.vtt' or \
    name contains '.srt' or \
    name contains '.txt'\
    ) and name contains 'transcript'";

pub const LIST_PAGE_SIZE: u32 = 50;
pub const LIST_FIELDS: &str = "files(id,name,mimeType,modifiedTime,webViewLink,size)";

pub const LIST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const PREVIEW_TIMEOUT: Duration = Duration::from_secs(20);

pub const PREVIEW_CHAR_LIMIT: usize = 8000;
pub const TRUNCATION_MARKER: &str = "\n\n…(truncated preview)…";

const GOOGLE_APPS_MIME_PREFIX: &str = "application/vnd.google-apps";

/// File metadata as projected by [`LIST_FIELDS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// How file content is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMethod {
    /// Native Google Apps file, exported as `text/plain`.
    Export,
    /// Stored file, fetched with `alt=media`.
    Media,
}

impl DownloadMethod {
    pub fn for_mime(mime_type: Option<&str>) -> Self {
        let mime = mime_type.unwrap_or_default().trim().to_ascii_lowercase();
        if mime.starts_with(GOOGLE_APPS_MIME_PREFIX) {
            DownloadMethod::Export
        } else {
            DownloadMethod::Media
        }
    }
}

/// Cut `text` to [`PREVIEW_CHAR_LIMIT`] characters and mark it, if longer.
pub fn truncate_preview(text: String) -> String {
    match text.char_indices().nth(PREVIEW_CHAR_LIMIT) {
        Some((byte_idx, _)) => {
            let mut preview = text[..byte_idx].to_string();
            preview.push_str(TRUNCATION_MARKER);
            preview
        }
        None => text,
    }
}

/// Turn any non-200 response into [`Error::Upstream`] with its body.
pub(crate) async fn ensure_ok(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status = status.as_u16(), error = %e, "Failed to read upstream error body");
            String::new()
        }
    };
    Err(Error::Upstream {
        status: status.as_u16(),
        body,
    })
}

#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Most recently modified transcript-like files, up to [`LIST_PAGE_SIZE`].
    pub async fn list_transcripts(&self, access_token: &str) -> Result<Vec<DriveFile>> {
        let page_size = LIST_PAGE_SIZE.to_string();

        let response = self
            .http
            .get(&self.api_base)
            .bearer_auth(access_token)
            .query(&[
                ("q", TRANSCRIPT_QUERY),
                ("pageSize", page_size.as_str()),
                ("orderBy", "modifiedTime desc"),
                ("fields", LIST_FIELDS),
            ])
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;

        let list: FileListResponse = ensure_ok(response).await?.json().await?;
        info!(count = list.files.len(), "Listed Drive transcripts");
        Ok(list.files)
    }

    fn download_request(
        &self,
        access_token: &str,
        file_id: &str,
        method: DownloadMethod,
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let file_id = urlencoding::encode(file_id);
        let request = match method {
            DownloadMethod::Export => self
                .http
                .get(format!("{}/{}/export", self.api_base, file_id))
                .query(&[("mimeType", "text/plain")]),
            DownloadMethod::Media => self
                .http
                .get(format!("{}/{}", self.api_base, file_id))
                .query(&[("alt", "media")]),
        };

        request.bearer_auth(access_token).timeout(timeout)
    }

    /// Raw file content.
    pub async fn download(
        &self,
        access_token: &str,
        file_id: &str,
        method: DownloadMethod,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let response = self
            .download_request(access_token, file_id, method, timeout)
            .send()
            .await?;

        let content = ensure_ok(response).await?.bytes().await?;
        Ok(content.to_vec())
    }

    /// File content decoded as text.
    pub async fn download_text(
        &self,
        access_token: &str,
        file_id: &str,
        method: DownloadMethod,
        timeout: Duration,
    ) -> Result<String> {
        let response = self
            .download_request(access_token, file_id, method, timeout)
            .send()
            .await?;

        Ok(ensure_ok(response).await?.text().await?)
    }
}
