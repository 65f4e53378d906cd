use reqwest::Client;
use serde_json::{Value, json};
use std::path::Path;

use super::{YouTubeError, api_error};

pub const API_BASE: &str = "https://www.googleapis.com";

/// Thin client for the non-upload Data API calls.
#[derive(Clone)]
pub struct YouTubeApi {
    http: Client,
    base: String,
}

impl Default for YouTubeApi {
    fn default() -> Self {
        Self::new(API_BASE)
    }
}

impl YouTubeApi {
    pub fn new(base: &str) -> Self {
        Self {
            http: Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, YouTubeError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .query(query)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// `thumbnails.set` with a JPEG body.
    pub async fn set_thumbnail(
        &self,
        access_token: &str,
        video_id: &str,
        image_path: &Path,
    ) -> Result<(), YouTubeError> {
        let data = tokio::fs::read(image_path).await?;

        let resp = self
            .http
            .post(format!("{}/upload/youtube/v3/thumbnails/set", self.base))
            .query(&[("videoId", video_id)])
            .bearer_auth(access_token)
            .header("Content-Type", "image/jpeg")
            .body(data)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    /// First item of `videos.list` for one id, `None` if the video is gone.
    pub async fn get_video(
        &self,
        access_token: &str,
        video_id: &str,
        parts: &str,
    ) -> Result<Option<Value>, YouTubeError> {
        let body = self
            .get_json(
                access_token,
                "/youtube/v3/videos",
                &[("part", parts), ("id", video_id)],
            )
            .await?;
        Ok(body["items"].get(0).cloned())
    }

    pub async fn update_snippet(
        &self,
        access_token: &str,
        video_id: &str,
        snippet: &Value,
    ) -> Result<(), YouTubeError> {
        let resp = self
            .http
            .put(format!("{}/youtube/v3/videos", self.base))
            .query(&[("part", "snippet")])
            .bearer_auth(access_token)
            .json(&json!({ "id": video_id, "snippet": snippet }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    /// The channel's "uploads" playlist id.
    pub async fn uploads_playlist(&self, access_token: &str) -> Result<String, YouTubeError> {
        let body = self
            .get_json(
                access_token,
                "/youtube/v3/channels",
                &[("part", "contentDetails"), ("mine", "true")],
            )
            .await?;

        body["items"][0]["contentDetails"]["relatedPlaylists"]["uploads"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| YouTubeError::Permanent("channel has no uploads playlist".into()))
    }

    pub async fn playlist_items(
        &self,
        access_token: &str,
        playlist_id: &str,
        max_results: usize,
    ) -> Result<Vec<Value>, YouTubeError> {
        let max = max_results.clamp(1, 50).to_string();
        let body = self
            .get_json(
                access_token,
                "/youtube/v3/playlistItems",
                &[
                    ("part", "snippet"),
                    ("playlistId", playlist_id),
                    ("maxResults", max.as_str()),
                ],
            )
            .await?;

        Ok(body["items"].as_array().cloned().unwrap_or_default())
    }
}
