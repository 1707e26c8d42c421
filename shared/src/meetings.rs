//! Client for this application's own meetings API.

use reqwest::multipart::{Form, Part};
use reqwest::header::COOKIE;
use std::time::Duration;
use tracing::info;

use crate::drive::ensure_ok;
use crate::{Error, Result};

pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TRANSCRIPT_NAME: &str = "drive_transcript.txt";

#[derive(Clone)]
pub struct MeetingsClient {
    http: reqwest::Client,
    base_url: String,
}

impl MeetingsClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Post `content` as the `file` field of `upload_transcript`, acting as the caller.
    pub async fn upload_transcript(
        &self,
        meeting_id: i64,
        filename: &str,
        content: Vec<u8>,
        cookie: Option<&str>,
    ) -> Result<()> {
        let part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str("text/plain")
            .map_err(|e| Error::Internal(format!("Invalid upload part: {}", e)))?;

        let response = self
            .http
            .post(format!(
                "{}/api/meetings/{}/upload_transcript",
                self.base_url, meeting_id
            ))
            .header(COOKIE, cookie.unwrap_or_default())
            .multipart(Form::new().part("file", part))
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        ensure_ok(response).await?;
        info!(meeting_id, filename, "Transcript uploaded to meeting");
        Ok(())
    }
}
