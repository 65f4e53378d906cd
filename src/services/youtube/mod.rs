//! YouTube Data API v3: OAuth credentials, resumable uploads and the few
//! video-management calls a daily uploader needs.

mod api;
mod credentials;
mod oauth;
mod retry;
mod transport;
mod uploader;

pub use api::YouTubeApi;
pub use credentials::{ClientSecrets, Credential, CredentialState, CredentialStore};
pub use oauth::{AuthorizeRequest, OAuthClient, OAuthTokenSource, TokenResponse, TokenSource};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{ChunkOutcome, HttpUploadTransport, UploadTransport};
pub use uploader::{UploadRequest, Uploader, VideoMetadata};

#[derive(Debug)]
pub enum YouTubeError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    /// No usable credential could be obtained
    Auth(String),
    /// Worth retrying: 5xx gateway errors and dropped connections
    Transient(String),
    Permanent(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl YouTubeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, YouTubeError::Transient(_))
    }
}

impl From<reqwest::Error> for YouTubeError {
    fn from(e: reqwest::Error) -> Self {
        YouTubeError::Http(e)
    }
}

impl From<std::io::Error> for YouTubeError {
    fn from(e: std::io::Error) -> Self {
        YouTubeError::Io(e)
    }
}

impl From<serde_json::Error> for YouTubeError {
    fn from(e: serde_json::Error) -> Self {
        YouTubeError::Json(e)
    }
}

impl std::fmt::Display for YouTubeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YouTubeError::Http(e) => write!(f, "HTTP error: {}", e),
            YouTubeError::Api { status, body } => {
                write!(f, "YouTube API error (status {}): {}", status, body)
            }
            YouTubeError::Auth(s) => write!(f, "Authentication failed: {}", s),
            YouTubeError::Transient(s) => write!(f, "Transient upload error: {}", s),
            YouTubeError::Permanent(s) => write!(f, "Upload failed: {}", s),
            YouTubeError::Io(e) => write!(f, "IO error: {}", e),
            YouTubeError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for YouTubeError {}

/// Read a failed response into an API error.
pub(crate) async fn api_error(resp: reqwest::Response) -> YouTubeError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    YouTubeError::Api { status, body }
}
