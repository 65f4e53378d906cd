//! Fakes shared by the pipeline, session and dashboard tests.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigStore, Settings};
use crate::domain::UploadLog;
use crate::pipeline::Pipeline;
use crate::render::{Capabilities, RenderStage, Renderer, TextRenderer};
use crate::services::automation::AutomationSession;
use crate::services::jokes::{JokeError, JokeFetcher, JokeSource, Provider};
use crate::services::youtube::{
    ChunkOutcome, TokenSource, UploadTransport, Uploader, VideoMetadata, YouTubeError,
};

pub struct StaticToken;

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, YouTubeError> {
        Ok("token".into())
    }
}

/// Accepts the whole file in one PUT. `None` answers 403.
pub struct InstantTransport {
    pub id: Option<&'static str>,
}

#[async_trait]
impl UploadTransport for InstantTransport {
    async fn start_session(
        &self,
        _access_token: &str,
        _metadata: &Value,
        _content_type: &str,
        _total_len: u64,
    ) -> Result<String, YouTubeError> {
        Ok("session".into())
    }

    async fn put_chunk(
        &self,
        _access_token: &str,
        _session_uri: &str,
        _chunk: Bytes,
        _offset: u64,
        _total_len: u64,
    ) -> Result<ChunkOutcome, YouTubeError> {
        match self.id {
            Some(id) => Ok(ChunkOutcome::Complete(json!({ "id": id }))),
            None => Err(YouTubeError::Permanent("status 403".into())),
        }
    }
}

/// Every joke API is down.
pub struct NoJokes;

#[async_trait]
impl JokeFetcher for NoJokes {
    async fn fetch_json(&self, _provider: Provider, _url: &str) -> Result<Value, JokeError> {
        Err(JokeError::Status(500))
    }
}

/// Defaults with every path under `root` and no real API calls.
pub fn settings_in(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.directories.scripts = root.join("scripts");
    settings.directories.videos = root.join("videos");
    settings.directories.temp = root.join("temp");
    settings.directories.logs = root.join("logs");
    settings.youtube.uploads_log = root.join("uploads_log.json").display().to_string();
    settings.automation.auto_set_thumbnail = false;
    settings
}

pub fn pipeline_with(
    settings: &Settings,
    renderer: Arc<dyn Renderer>,
    video_id: Option<&'static str>,
) -> Pipeline {
    let uploader = Uploader::new(
        Arc::new(StaticToken),
        Arc::new(InstantTransport { id: video_id }),
        Arc::new(UploadLog::new(&settings.youtube.uploads_log)),
        VideoMetadata::from_settings(settings),
    );
    Pipeline::new(
        JokeSource::new(Arc::new(NoJokes), settings.script_generation.joke_apis.clone()),
        RenderStage::new(renderer, Capabilities::default(), settings),
        Arc::new(uploader),
        settings.clone(),
    )
}

/// Text assets, local jokes, uploads always succeed as `vid1`.
pub fn offline_pipeline(settings: &Settings) -> Pipeline {
    pipeline_with(settings, Arc::new(TextRenderer), Some("vid1"))
}

/// A config file under `root` with every path pointing inside it.
pub fn config_in(root: &Path) -> ConfigStore {
    let mut config = ConfigStore::load(root.join("config.json"));
    for (key, name) in [
        ("directories.scripts", "scripts"),
        ("directories.videos", "videos"),
        ("directories.temp", "temp"),
        ("directories.logs", "logs"),
        ("youtube.uploads_log", "uploads_log.json"),
    ] {
        let path = root.join(name).display().to_string();
        config.set(key, json!(path)).unwrap();
    }
    config.set("automation.auto_set_thumbnail", json!(false)).unwrap();
    config
}

/// Offline session with a fast scheduler tick.
pub fn session_in(root: &Path) -> Arc<AutomationSession> {
    let session = AutomationSession::with_factory(config_in(root), Box::new(offline_pipeline))
        .with_tick(Duration::from_millis(10));
    Arc::new(session)
}
