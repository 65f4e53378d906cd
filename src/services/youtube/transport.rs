//! The resumable-upload wire protocol: open a session, then PUT byte ranges
//! until the server answers with the created video.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::{YouTubeError, api_error};

pub const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Statuses the upload loop treats as worth another try.
const RETRIABLE_STATUS: [u16; 4] = [500, 502, 503, 504];

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// 308: keep going from this byte offset
    Incomplete { next_offset: u64 },
    /// 200/201 with the video resource
    Complete(Value),
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Returns the session URI to send bytes to.
    async fn start_session(
        &self,
        access_token: &str,
        metadata: &Value,
        content_type: &str,
        total_len: u64,
    ) -> Result<String, YouTubeError>;

    /// Send `chunk` starting at `offset`.
    async fn put_chunk(
        &self,
        access_token: &str,
        session_uri: &str,
        chunk: Bytes,
        offset: u64,
        total_len: u64,
    ) -> Result<ChunkOutcome, YouTubeError>;
}

#[derive(Clone)]
pub struct HttpUploadTransport {
    http: Client,
    upload_url: String,
}

impl Default for HttpUploadTransport {
    fn default() -> Self {
        Self::new(UPLOAD_URL)
    }
}

impl HttpUploadTransport {
    pub fn new(upload_url: &str) -> Self {
        // a 308 here is upload progress, not a redirect to follow
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            upload_url: upload_url.to_string(),
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> YouTubeError {
    if e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() {
        YouTubeError::Transient(e.to_string())
    } else {
        YouTubeError::Http(e)
    }
}

/// `Range: bytes=0-N` means the server holds bytes up to N inclusive.
fn next_offset(range: Option<&str>) -> u64 {
    range
        .and_then(|r| r.rsplit('-').next())
        .and_then(|end| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .unwrap_or(0)
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn start_session(
        &self,
        access_token: &str,
        metadata: &Value,
        content_type: &str,
        total_len: u64,
    ) -> Result<String, YouTubeError> {
        let resp = self
            .http
            .post(&self.upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", total_len.to_string())
            .json(metadata)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = resp.status();
        if RETRIABLE_STATUS.contains(&status.as_u16()) {
            return Err(YouTubeError::Transient(format!("session start got {}", status)));
        }
        if !status.is_success() {
            return Err(api_error(resp).await);
        }

        resp.headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| YouTubeError::Permanent("no session URI in response".into()))
    }

    async fn put_chunk(
        &self,
        access_token: &str,
        session_uri: &str,
        chunk: Bytes,
        offset: u64,
        total_len: u64,
    ) -> Result<ChunkOutcome, YouTubeError> {
        let end = offset + chunk.len() as u64;
        let content_range = if chunk.is_empty() {
            format!("bytes */{}", total_len)
        } else {
            format!("bytes {}-{}/{}", offset, end - 1, total_len)
        };

        let resp = self
            .http
            .put(session_uri)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_RANGE, content_range)
            .body(chunk)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = resp.status();
        match status {
            StatusCode::PERMANENT_REDIRECT => {
                let range = resp
                    .headers()
                    .get(reqwest::header::RANGE)
                    .and_then(|v| v.to_str().ok());
                Ok(ChunkOutcome::Incomplete {
                    next_offset: next_offset(range),
                })
            }
            StatusCode::OK | StatusCode::CREATED => {
                let text = resp.text().await.map_err(classify_send_error)?;
                let body = serde_json::from_str(&text).map_err(|e| {
                    YouTubeError::Permanent(format!("unreadable upload response ({}): {}", e, text))
                })?;
                Ok(ChunkOutcome::Complete(body))
            }
            s if RETRIABLE_STATUS.contains(&s.as_u16()) => {
                Err(YouTubeError::Transient(format!("server returned {}", s)))
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(YouTubeError::Permanent(format!("status {}: {}", status, body)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_offset_from_range() {
        assert_eq!(next_offset(Some("bytes=0-262143")), 262144);
        assert_eq!(next_offset(None), 0);
        assert_eq!(next_offset(Some("garbage")), 0);
    }
}
