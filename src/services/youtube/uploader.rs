//! Upload stage: metadata, resumable transfer with bounded retries, and the
//! upload log. Public operations log failures and return `None`/`false`.

use bytes::Bytes;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::api::YouTubeApi;
use super::credentials::CredentialStore;
use super::oauth::{OAuthTokenSource, TokenSource};
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::transport::{ChunkOutcome, HttpUploadTransport, UploadTransport};
use super::YouTubeError;
use crate::config::Settings;
use crate::constants::MAX_TAGS;
use crate::domain::{UploadLog, UploadRecord};

/// Fixed per-channel metadata applied to every upload.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub category_id: String,
    pub language: String,
    pub privacy_status: String,
    pub made_for_kids: bool,
}

impl VideoMetadata {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            category_id: settings.youtube.default_category.clone(),
            language: settings.youtube.default_language.clone(),
            privacy_status: settings.automation.upload_privacy.clone(),
            made_for_kids: settings.youtube.made_for_kids,
        }
    }
}

/// What to publish.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub asset_path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl UploadRequest {
    /// Resource body for `videos.insert`. Tags are capped here.
    pub fn resource(&self, meta: &VideoMetadata) -> Value {
        let tags: Vec<&String> = self.tags.iter().take(MAX_TAGS).collect();
        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": tags,
                "categoryId": meta.category_id,
                "defaultLanguage": meta.language,
                "defaultAudioLanguage": meta.language,
            },
            "status": {
                "privacyStatus": meta.privacy_status,
                "selfDeclaredMadeForKids": meta.made_for_kids,
            }
        })
    }
}

pub struct Uploader {
    tokens: Arc<dyn TokenSource>,
    transport: Arc<dyn UploadTransport>,
    sleeper: Arc<dyn Sleeper>,
    api: YouTubeApi,
    retry: RetryPolicy,
    log: Arc<UploadLog>,
    meta: VideoMetadata,
    chunk_size: usize,
}

impl Uploader {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        transport: Arc<dyn UploadTransport>,
        log: Arc<UploadLog>,
        meta: VideoMetadata,
    ) -> Self {
        Self {
            tokens,
            transport,
            sleeper: Arc::new(TokioSleeper),
            api: YouTubeApi::default(),
            retry: RetryPolicy::default(),
            log,
            meta,
            chunk_size: 0,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let yt = &settings.youtube;
        let tokens = OAuthTokenSource::new(
            &yt.client_secrets_file,
            CredentialStore::new(&yt.credentials_file),
            yt.allow_interactive_consent,
        );
        let retry = RetryPolicy {
            max_retries: settings.apis.retry_attempts,
        };

        Self::new(
            Arc::new(tokens),
            Arc::new(HttpUploadTransport::default()),
            Arc::new(UploadLog::new(&yt.uploads_log)),
            VideoMetadata::from_settings(settings),
        )
        .with_retry_policy(retry)
        .with_chunk_size(yt.chunk_size)
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_api(mut self, api: YouTubeApi) -> Self {
        self.api = api;
        self
    }

    /// Bytes per PUT; 0 sends the whole file at once.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn upload_log(&self) -> &Arc<UploadLog> {
        &self.log
    }

    /// Upload an asset and record it. Returns the new video id.
    pub async fn upload(
        &self,
        asset_path: &Path,
        title: &str,
        description: &str,
        tags: &[String],
    ) -> Option<String> {
        let request = UploadRequest {
            asset_path: asset_path.to_path_buf(),
            title: title.to_string(),
            description: description.to_string(),
            tags: tags.iter().take(MAX_TAGS).cloned().collect(),
        };

        match self.try_upload(&request).await {
            Ok(video_id) => {
                log::info!("[uploader] Upload complete: {}", video_id);
                let record = UploadRecord::new(
                    &video_id,
                    &request.asset_path,
                    &request.title,
                    &request.description,
                    &request.tags,
                );
                if let Err(e) = self.log.append(record).await {
                    log::error!("[uploader] Failed to write upload log: {}", e);
                }
                Some(video_id)
            }
            Err(e) => {
                log::error!("[uploader] Upload of {} failed: {}", asset_path.display(), e);
                None
            }
        }
    }

    async fn try_upload(&self, request: &UploadRequest) -> Result<String, YouTubeError> {
        if !request.asset_path.is_file() {
            return Err(YouTubeError::Permanent(format!(
                "asset not found: {}",
                request.asset_path.display()
            )));
        }

        let token = self.tokens.access_token().await?;
        let data = Bytes::from(tokio::fs::read(&request.asset_path).await?);
        let total = data.len() as u64;
        let content_type = content_type_for(&request.asset_path);

        log::info!(
            "[uploader] Uploading {} ({} bytes, {})",
            request.asset_path.display(),
            total,
            content_type
        );

        let session = self
            .transport
            .start_session(&token, &request.resource(&self.meta), content_type, total)
            .await?;

        self.send_chunks(&token, &session, data).await
    }

    /// The resumable loop. Transient failures and 308s that make no progress
    /// share one retry budget for the whole upload.
    async fn send_chunks(
        &self,
        token: &str,
        session: &str,
        data: Bytes,
    ) -> Result<String, YouTubeError> {
        let total = data.len() as u64;
        let mut offset: u64 = 0;
        let mut retry: u32 = 0;

        loop {
            let end = if self.chunk_size == 0 {
                total
            } else {
                (offset + self.chunk_size as u64).min(total)
            };
            let chunk = data.slice(offset as usize..end as usize);

            let failure = match self
                .transport
                .put_chunk(token, session, chunk, offset, total)
                .await
            {
                Ok(ChunkOutcome::Incomplete { next_offset }) if next_offset > offset => {
                    log::debug!("[uploader] {} / {} bytes stored", next_offset, total);
                    offset = next_offset.min(total);
                    continue;
                }
                Ok(ChunkOutcome::Incomplete { next_offset }) => {
                    let stalled_at = offset;
                    // resume wherever the server says it is
                    offset = next_offset.min(total);
                    YouTubeError::Transient(format!(
                        "no progress past byte {} (server holds {})",
                        stalled_at, next_offset
                    ))
                }
                Ok(ChunkOutcome::Complete(body)) => {
                    return body["id"]
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| {
                            YouTubeError::Permanent(format!("upload finished without an id: {}", body))
                        });
                }
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };

            if retry >= self.retry.max_retries {
                return Err(YouTubeError::Permanent(format!(
                    "giving up after {} retries: {}",
                    retry, failure
                )));
            }
            let wait = self.retry.backoff(retry);
            retry += 1;
            log::warn!(
                "[uploader] {} - retry {}/{} in {}s",
                failure,
                retry,
                self.retry.max_retries,
                wait.as_secs()
            );
            self.sleeper.sleep(wait).await;
        }
    }

    pub async fn set_thumbnail(&self, video_id: &str, image_path: &Path) -> bool {
        let result = async {
            let token = self.tokens.access_token().await?;
            self.api.set_thumbnail(&token, video_id, image_path).await
        }
        .await;

        match result {
            Ok(()) => {
                log::info!("[uploader] Thumbnail set for {}", video_id);
                true
            }
            Err(e) => {
                log::error!("[uploader] Failed to set thumbnail for {}: {}", video_id, e);
                false
            }
        }
    }

    /// Change any of title, description or tags; untouched fields keep their
    /// current values.
    pub async fn update_metadata(
        &self,
        video_id: &str,
        title: Option<&str>,
        description: Option<&str>,
        tags: Option<&[String]>,
    ) -> bool {
        let result = async {
            let token = self.tokens.access_token().await?;
            let video = self
                .api
                .get_video(&token, video_id, "snippet")
                .await?
                .ok_or_else(|| YouTubeError::Permanent(format!("video {} not found", video_id)))?;

            let mut snippet = video["snippet"].clone();
            if let Some(title) = title {
                snippet["title"] = json!(title);
            }
            if let Some(description) = description {
                snippet["description"] = json!(description);
            }
            if let Some(tags) = tags {
                let capped: Vec<&String> = tags.iter().take(MAX_TAGS).collect();
                snippet["tags"] = json!(capped);
            }

            self.api.update_snippet(&token, video_id, &snippet).await
        }
        .await;

        match result {
            Ok(()) => {
                log::info!("[uploader] Metadata updated for {}", video_id);
                true
            }
            Err(e) => {
                log::error!("[uploader] Failed to update {}: {}", video_id, e);
                false
            }
        }
    }

    /// Upload, processing and privacy state of a video.
    pub async fn upload_status(&self, video_id: &str) -> Option<Value> {
        let result = async {
            let token = self.tokens.access_token().await?;
            self.api
                .get_video(&token, video_id, "status,processingDetails")
                .await
        }
        .await;

        match result {
            Ok(Some(video)) => Some(json!({
                "id": video_id,
                "upload_status": video["status"]["uploadStatus"],
                "privacy_status": video["status"]["privacyStatus"],
                "processing_status": video["processingDetails"]["processingStatus"],
            })),
            Ok(None) => {
                log::warn!("[uploader] Video {} not found", video_id);
                None
            }
            Err(e) => {
                log::error!("[uploader] Status lookup for {} failed: {}", video_id, e);
                None
            }
        }
    }

    /// Newest uploads on the channel, newest first.
    pub async fn recent_uploads(&self, max_results: usize) -> Vec<Value> {
        let result = async {
            let token = self.tokens.access_token().await?;
            let playlist = self.api.uploads_playlist(&token).await?;
            self.api.playlist_items(&token, &playlist, max_results).await
        }
        .await;

        match result {
            Ok(items) => items
                .iter()
                .map(|item| {
                    let snippet = &item["snippet"];
                    let id = snippet["resourceId"]["videoId"].as_str().unwrap_or_default();
                    json!({
                        "id": id,
                        "title": snippet["title"],
                        "published_at": snippet["publishedAt"],
                        "url": format!("{}{}", crate::constants::WATCH_URL_PREFIX, id),
                    })
                })
                .collect(),
            Err(e) => {
                log::error!("[uploader] Listing recent uploads failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        Json, Router,
        extract::State,
        routing::{get, post},
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::testing::StaticToken;

    /// Replays scripted chunk results; repeats the last one forever.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<ChunkOutcome, YouTubeError>>>,
        puts: Mutex<Vec<(u64, usize)>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<ChunkOutcome, YouTubeError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                puts: Mutex::new(Vec::new()),
            }
        }
    }

    fn clone_reply(r: &Result<ChunkOutcome, YouTubeError>) -> Result<ChunkOutcome, YouTubeError> {
        match r {
            Ok(o) => Ok(o.clone()),
            Err(YouTubeError::Transient(s)) => Err(YouTubeError::Transient(s.clone())),
            Err(e) => Err(YouTubeError::Permanent(e.to_string())),
        }
    }

    #[async_trait]
    impl UploadTransport for ScriptedTransport {
        async fn start_session(
            &self,
            _access_token: &str,
            _metadata: &Value,
            _content_type: &str,
            _total_len: u64,
        ) -> Result<String, YouTubeError> {
            Ok("https://upload.example/session".to_string())
        }

        async fn put_chunk(
            &self,
            _access_token: &str,
            _session_uri: &str,
            chunk: Bytes,
            offset: u64,
            _total_len: u64,
        ) -> Result<ChunkOutcome, YouTubeError> {
            self.puts.lock().unwrap().push((offset, chunk.len()));
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                clone_reply(replies.front().unwrap())
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn transient() -> Result<ChunkOutcome, YouTubeError> {
        Err(YouTubeError::Transient("server returned 503".into()))
    }

    fn complete(id: &str) -> Result<ChunkOutcome, YouTubeError> {
        Ok(ChunkOutcome::Complete(json!({ "id": id, "kind": "youtube#video" })))
    }

    struct Harness {
        _dir: tempfile::TempDir,
        asset: PathBuf,
        uploader: Uploader,
        sleeper: Arc<RecordingSleeper>,
        transport: Arc<ScriptedTransport>,
    }

    fn harness(replies: Vec<Result<ChunkOutcome, YouTubeError>>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join("short.mp4");
        std::fs::write(&asset, vec![7u8; 1000]).unwrap();

        let sleeper = Arc::new(RecordingSleeper::default());
        let transport = Arc::new(ScriptedTransport::new(replies));
        let uploader = Uploader::new(
            Arc::new(StaticToken),
            transport.clone(),
            Arc::new(UploadLog::new(dir.path().join("uploads_log.json"))),
            VideoMetadata::from_settings(&Settings::default()),
        )
        .with_sleeper(sleeper.clone());

        Harness {
            _dir: dir,
            asset,
            uploader,
            sleeper,
            transport,
        }
    }

    fn tags(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tag{}", i)).collect()
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let h = harness(vec![transient(), transient(), complete("vid42")]);

        let id = h.uploader.upload(&h.asset, "t", "d", &tags(3)).await;

        assert_eq!(id.as_deref(), Some("vid42"));
        let sleeps = h.sleeper.sleeps.lock().unwrap().clone();
        assert_eq!(sleeps, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(sleeps.iter().sum::<Duration>(), Duration::from_secs(3));
        assert_eq!(h.uploader.upload_log().read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_always_transient_gives_up_after_three_retries() {
        let h = harness(vec![transient()]);

        let id = h.uploader.upload(&h.asset, "t", "d", &tags(3)).await;

        assert!(id.is_none());
        assert_eq!(h.sleeper.sleeps.lock().unwrap().len(), 3);
        assert_eq!(h.transport.puts.lock().unwrap().len(), 4);
        assert!(h.uploader.upload_log().read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let h = harness(vec![Err(YouTubeError::Permanent("status 400".into()))]);

        assert!(h.uploader.upload(&h.asset, "t", "d", &tags(1)).await.is_none());
        assert!(h.sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_without_id_fails() {
        let h = harness(vec![Ok(ChunkOutcome::Complete(json!({ "kind": "youtube#video" })))]);
        assert!(h.uploader.upload(&h.asset, "t", "d", &tags(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_asset_is_none() {
        let h = harness(vec![complete("x")]);
        let missing = h.asset.with_file_name("nope.mp4");
        assert!(h.uploader.upload(&missing, "t", "d", &tags(1)).await.is_none());
        assert!(h.transport.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunked_upload_resumes_at_server_offset() {
        let h = harness(vec![
            Ok(ChunkOutcome::Incomplete { next_offset: 400 }),
            Ok(ChunkOutcome::Incomplete { next_offset: 800 }),
            complete("chunked"),
        ]);
        let uploader = h.uploader.with_chunk_size(400);

        let id = uploader.upload(&h.asset, "t", "d", &tags(20)).await;

        assert_eq!(id.as_deref(), Some("chunked"));
        let puts = h.transport.puts.lock().unwrap().clone();
        assert_eq!(puts, vec![(0, 400), (400, 400), (800, 200)]);

        let records = uploader.upload_log().read_all().await.unwrap();
        assert_eq!(records[0].tags.len(), MAX_TAGS);
        assert_eq!(records[0].url, "https://www.youtube.com/watch?v=chunked");
    }

    #[tokio::test]
    async fn test_stalled_resume_uses_retry_budget() {
        // a 308 without a Range header never moves past byte 0
        let h = harness(vec![Ok(ChunkOutcome::Incomplete { next_offset: 0 })]);

        let id = h.uploader.upload(&h.asset, "t", "d", &tags(1)).await;

        assert!(id.is_none());
        assert_eq!(h.sleeper.sleeps.lock().unwrap().len(), 3);
        assert_eq!(h.transport.puts.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_repeated_offset_counts_against_budget() {
        let h = harness(vec![
            Ok(ChunkOutcome::Incomplete { next_offset: 400 }),
            Ok(ChunkOutcome::Incomplete { next_offset: 400 }),
            complete("late"),
        ]);
        let uploader = h.uploader.with_chunk_size(400);

        let id = uploader.upload(&h.asset, "t", "d", &tags(1)).await;

        assert_eq!(id.as_deref(), Some("late"));
        let puts = h.transport.puts.lock().unwrap().clone();
        assert_eq!(puts, vec![(0, 400), (400, 400), (400, 400)]);
        assert_eq!(h.sleeper.sleeps.lock().unwrap().clone(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_resource_body() {
        let request = UploadRequest {
            asset_path: PathBuf::from("a.mp4"),
            title: "Title".into(),
            description: "Desc".into(),
            tags: tags(30),
        };
        let body = request.resource(&VideoMetadata::from_settings(&Settings::default()));

        assert_eq!(body["snippet"]["categoryId"], "23");
        assert_eq!(body["snippet"]["tags"].as_array().unwrap().len(), 15);
        assert_eq!(body["status"]["privacyStatus"], "public");
        assert_eq!(body["status"]["selfDeclaredMadeForKids"], false);
    }

    type Captured = Arc<Mutex<Vec<Value>>>;

    async fn mock_api() -> (String, Captured) {
        let captured: Captured = Arc::default();

        let app = Router::new()
            .route(
                "/youtube/v3/channels",
                get(|| async {
                    Json(json!({"items": [{"contentDetails": {"relatedPlaylists": {"uploads": "UU123"}}}]}))
                }),
            )
            .route(
                "/youtube/v3/playlistItems",
                get(|| async {
                    Json(json!({"items": [
                        {"snippet": {"title": "Newest", "publishedAt": "2025-01-02T10:00:00Z", "resourceId": {"videoId": "v2"}}},
                        {"snippet": {"title": "Older", "publishedAt": "2025-01-01T10:00:00Z", "resourceId": {"videoId": "v1"}}}
                    ]}))
                }),
            )
            .route(
                "/youtube/v3/videos",
                get(|| async {
                    Json(json!({"items": [{
                        "id": "v1",
                        "snippet": {"title": "old", "description": "keep me", "categoryId": "23"},
                        "status": {"uploadStatus": "processed", "privacyStatus": "public"},
                        "processingDetails": {"processingStatus": "succeeded"}
                    }]}))
                })
                .put(|State(captured): State<Captured>, Json(body): Json<Value>| async move {
                    captured.lock().unwrap().push(body.clone());
                    Json(body)
                }),
            )
            .route(
                "/upload/youtube/v3/thumbnails/set",
                post(|| async { Json(json!({"items": []})) }),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    #[tokio::test]
    async fn test_management_calls_against_mock_api() {
        let (base, captured) = mock_api().await;
        let h = harness(vec![complete("x")]);
        let uploader = h.uploader.with_api(YouTubeApi::new(&base));

        let recent = uploader.recent_uploads(5).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0]["id"], "v2");
        assert_eq!(recent[0]["url"], "https://www.youtube.com/watch?v=v2");

        let status = uploader.upload_status("v1").await.unwrap();
        assert_eq!(status["upload_status"], "processed");
        assert_eq!(status["processing_status"], "succeeded");

        assert!(uploader.update_metadata("v1", Some("new title"), None, None).await);
        let sent = captured.lock().unwrap()[0].clone();
        assert_eq!(sent["id"], "v1");
        assert_eq!(sent["snippet"]["title"], "new title");
        assert_eq!(sent["snippet"]["description"], "keep me");

        assert!(uploader.set_thumbnail("v1", &h.asset).await);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.MP4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a")), "application/octet-stream");
    }
}
