//! One content run: joke -> asset -> upload.
//!
//! Each stage reports failure as `None`; the first `None` ends the run and
//! nothing partial is uploaded.

pub mod metadata;

use chrono::Local;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::Settings;
use crate::domain::{ContentRecord, ScriptRecord};
use crate::render::{RenderStage, RenderedAsset};
use crate::services::jokes::JokeSource;
use crate::services::youtube::Uploader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    GeneratingScript,
    Rendering,
    Uploading,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    /// Stage that ended an unsuccessful run
    pub failed_stage: Option<Stage>,
    pub asset: Option<RenderedAsset>,
    pub video_id: Option<String>,
}

impl RunOutcome {
    fn failed(stage: Stage, asset: Option<RenderedAsset>) -> Self {
        Self {
            success: false,
            failed_stage: Some(stage),
            asset,
            video_id: None,
        }
    }
}

pub struct Pipeline {
    jokes: JokeSource,
    render: RenderStage,
    uploader: Arc<Uploader>,
    settings: Settings,
    stage: Mutex<Stage>,
}

impl Pipeline {
    pub fn new(
        jokes: JokeSource,
        render: RenderStage,
        uploader: Arc<Uploader>,
        settings: Settings,
    ) -> Self {
        Self {
            jokes,
            render,
            uploader,
            settings,
            stage: Mutex::new(Stage::Idle),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            JokeSource::from_settings(settings),
            RenderStage::from_settings(settings),
            Arc::new(Uploader::from_settings(settings)),
            settings.clone(),
        )
    }

    pub fn stage(&self) -> Stage {
        self.stage.lock().map(|s| *s).unwrap_or(Stage::Idle)
    }

    pub fn uploader(&self) -> &Arc<Uploader> {
        &self.uploader
    }

    fn enter(&self, stage: Stage) {
        if let Ok(mut current) = self.stage.lock() {
            *current = stage;
        }
    }

    pub async fn run(&self) -> RunOutcome {
        log::info!("[pipeline] Starting content run");
        self.enter(Stage::GeneratingScript);
        let script = self.jokes.fetch().await;
        let outcome = self.run_script(script).await;
        self.enter(Stage::Idle);
        outcome
    }

    /// Render and upload an already produced script.
    pub async fn run_script(&self, script: ScriptRecord) -> RunOutcome {
        let outcome = self.stages(script).await;
        self.enter(Stage::Idle);

        match outcome.failed_stage {
            None => log::info!(
                "[pipeline] Run complete: {}",
                outcome.video_id.as_deref().unwrap_or("-")
            ),
            Some(stage) => log::error!("[pipeline] Run failed during {:?}", stage),
        }
        outcome
    }

    async fn stages(&self, script: ScriptRecord) -> RunOutcome {
        let settings = &self.settings;

        // the joke source already filters API jokes by length
        script.validate(settings.script_generation.min_script_length);

        self.enter(Stage::Rendering);
        let Some(asset) = self.render.render(&script).await else {
            return RunOutcome::failed(Stage::Rendering, None);
        };

        let yt = &settings.youtube;
        let title = metadata::pick_title(&yt.title_templates);
        let tags = metadata::build_tags(&yt.default_tags, &script.topic);
        let description = metadata::build_description(&yt.description_template, &script.text);

        let thumbnail = if settings.advanced.create_thumbnails {
            self.render.thumbnail(&script, &asset).await
        } else {
            None
        };

        if settings.advanced.save_metadata {
            let record = ContentRecord {
                asset: asset.clone(),
                thumbnail: thumbnail.clone(),
                title: title.clone(),
                description: description.clone(),
                tags: tags.clone(),
                script,
                created_at: Local::now(),
            };
            match record.save(&settings.directories.videos).await {
                Ok(path) => log::info!("[pipeline] Metadata saved to {}", path.display()),
                Err(e) => log::error!("[pipeline] Failed to save metadata: {}", e),
            }
        }

        self.enter(Stage::Uploading);
        let Some(video_id) = self
            .uploader
            .upload(&asset.path, &title, &description, &tags)
            .await
        else {
            return RunOutcome::failed(Stage::Uploading, Some(asset));
        };

        if settings.automation.auto_set_thumbnail {
            if let Some(thumb) = &thumbnail {
                // the video is already live; a failed thumbnail is only logged
                self.uploader.set_thumbnail(&video_id, thumb).await;
            }
        }

        if settings.advanced.cleanup_temp_files {
            cleanup_temp_dir(&settings.directories.temp).await;
        }

        RunOutcome {
            success: true,
            failed_stage: None,
            asset: Some(asset),
            video_id: Some(video_id),
        }
    }
}

/// Remove loose files from the temp directory. Subdirectories are left alone.
async fn cleanup_temp_dir(dir: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && tokio::fs::remove_file(entry.path()).await.is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!("[pipeline] Cleaned {} temp files", removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{AssetKind, TextRenderer};
    use crate::testing::{pipeline_with, settings_in};

    #[cfg(feature = "image-render")]
    #[tokio::test]
    async fn test_end_to_end_local_joke_to_upload() {
        use crate::domain::ScriptSource;
        use crate::services::jokes::local_jokes;

        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let renderer = Arc::new(crate::render::ImageRenderer::new(
            settings.video_creation.clone(),
        ));
        let pipeline = pipeline_with(&settings, renderer, Some("abc123"));

        let script = ScriptRecord::from_joke(
            local_jokes()[0].clone(),
            ScriptSource::Local,
            Local::now(),
        );
        let outcome = pipeline.run_script(script).await;

        assert!(outcome.success);
        assert_eq!(outcome.video_id.as_deref(), Some("abc123"));

        let asset = outcome.asset.unwrap();
        assert_eq!(asset.kind, AssetKind::Image);
        let image = image::open(&asset.path).unwrap();
        assert_eq!((image.width(), image.height()), (1080, 1920));

        let records = pipeline.uploader().upload_log().read_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].remote_id, "abc123");
        assert!(records[0].tags.len() <= 15);

        let metadata_files = std::fs::read_dir(&settings.directories.videos)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with("_metadata.json"))
            .count();
        assert_eq!(metadata_files, 1);
        assert_eq!(pipeline.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_failed_upload_fails_the_run_without_log_entry() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let pipeline = pipeline_with(&settings, Arc::new(TextRenderer), None);

        let outcome = pipeline.run().await;

        assert!(!outcome.success);
        assert_eq!(outcome.failed_stage, Some(Stage::Uploading));
        assert!(outcome.asset.is_some());
        let records = pipeline.uploader().upload_log().read_all().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_full_run_with_fallback_joke_and_text_asset() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let pipeline = pipeline_with(&settings, Arc::new(TextRenderer), Some("txt1"));

        let outcome = pipeline.run().await;

        assert!(outcome.success);
        assert_eq!(outcome.asset.unwrap().kind, AssetKind::Text);
    }

    #[tokio::test]
    async fn test_short_script_still_renders_and_uploads() {
        use crate::domain::{Joke, ScriptSource};

        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let pipeline = pipeline_with(&settings, Arc::new(TextRenderer), Some("tiny"));

        let script = ScriptRecord::from_joke(
            Joke::TwoPart { setup: "Hi".into(), punchline: "Yo!".into() },
            ScriptSource::Api,
            Local::now(),
        );
        let outcome = pipeline.run_script(script).await;

        assert!(outcome.success);
        assert_eq!(outcome.failed_stage, None);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tmp"), "x").unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();

        cleanup_temp_dir(dir.path()).await;

        assert!(!dir.path().join("a.tmp").exists());
        assert!(dir.path().join("keep").exists());
    }
}
