//! Joke source: shuffled public APIs with a local fallback.
//!
//! [`JokeSource::fetch`] never fails. Each endpoint gets one try, in a fresh
//! random order per call; when all of them fail a local joke is used.

mod fallback;
mod providers;

use async_trait::async_trait;
use chrono::Local;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use fallback::all as local_jokes;
pub use providers::Provider;

use crate::config::Settings;
use crate::constants::JOKE_USER_AGENT;
use crate::domain::{Joke, ScriptRecord, ScriptSource};

#[derive(Debug, thiserror::Error)]
pub enum JokeError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("http status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Fetch one raw JSON body from a joke endpoint.
#[async_trait]
pub trait JokeFetcher: Send + Sync {
    async fn fetch_json(&self, provider: Provider, url: &str) -> Result<Value, JokeError>;
}

pub struct HttpJokeFetcher {
    http: Client,
    timeout: Duration,
}

impl HttpJokeFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl JokeFetcher for HttpJokeFetcher {
    async fn fetch_json(&self, provider: Provider, url: &str) -> Result<Value, JokeError> {
        let mut req = self.http.get(url).timeout(self.timeout);
        if provider == Provider::ICanHazDadJoke {
            req = req
                .header("Accept", "application/json")
                .header("User-Agent", JOKE_USER_AGENT);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(JokeError::Status(status.as_u16()));
        }

        let text = resp.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| JokeError::Malformed(format!("not json ({}): {}", e, text)))
    }
}

pub struct JokeSource {
    fetcher: Arc<dyn JokeFetcher>,
    endpoints: Vec<String>,
    scripts_dir: Option<PathBuf>,
    /// Accepted script length in chars, inclusive
    min_len: usize,
    max_len: usize,
}

impl JokeSource {
    pub fn new(fetcher: Arc<dyn JokeFetcher>, endpoints: Vec<String>) -> Self {
        Self {
            fetcher,
            endpoints,
            scripts_dir: None,
            min_len: 0,
            max_len: usize::MAX,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let fetcher = HttpJokeFetcher::new(Duration::from_secs(settings.apis.timeout));
        let scripts = &settings.script_generation;
        Self::new(Arc::new(fetcher), scripts.joke_apis.clone())
            .with_scripts_dir(settings.directories.scripts.clone())
            .with_length_bounds(scripts.min_script_length, scripts.max_script_length)
    }

    /// API jokes outside `min..=max` chars count as malformed and the next
    /// endpoint is tried. Local jokes are not checked.
    pub fn with_length_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_len = min;
        self.max_len = max;
        self
    }

    fn check_length(&self, joke: Joke) -> Result<Joke, JokeError> {
        let len = joke.text_len();
        if len < self.min_len || len > self.max_len {
            return Err(JokeError::Malformed(format!(
                "{} chars, outside {}..={}",
                len, self.min_len, self.max_len
            )));
        }
        Ok(joke)
    }

    /// Persist every produced script under `dir`.
    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = Some(dir.into());
        self
    }

    /// Produce an enriched script. Falls back to a local joke, so this
    /// always yields a record.
    pub async fn fetch(&self) -> ScriptRecord {
        let (joke, source) = match self.fetch_remote().await {
            Some(joke) => (joke, ScriptSource::Api),
            None => {
                log::warn!("[jokes] All joke APIs failed, using a local joke");
                (fallback::random(), ScriptSource::Local)
            }
        };

        let record = ScriptRecord::from_joke(joke, source, Local::now());
        log::info!("[jokes] Script ready ({:?}): {}", record.kind, record.text);

        if let Some(dir) = &self.scripts_dir {
            match record.save(dir).await {
                Ok(path) => log::info!("[jokes] Script saved to {}", path.display()),
                Err(e) => log::error!("[jokes] Failed to save script: {}", e),
            }
        }

        record
    }

    async fn fetch_remote(&self) -> Option<Joke> {
        let mut endpoints = self.endpoints.clone();
        endpoints.shuffle(&mut rand::rng());

        for url in &endpoints {
            let Some(provider) = Provider::classify(url) else {
                log::warn!("[jokes] Skipping unrecognized joke endpoint {}", url);
                continue;
            };

            let result = match self.fetcher.fetch_json(provider, url).await {
                Ok(body) => provider.normalize(&body).and_then(|j| self.check_length(j)),
                Err(e) => Err(e),
            };

            match result {
                Ok(joke) => {
                    log::info!("[jokes] Got a joke from {}", provider.name());
                    return Some(joke);
                }
                Err(e) => log::warn!("[jokes] {} failed: {}", provider.name(), e),
            }
        }
        None
    }
}
