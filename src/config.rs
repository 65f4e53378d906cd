//! JSON settings tree with dotted-path access.
//!
//! The file on disk is merged over [`Settings::default`], so a config written
//! by an older build picks up new keys. Unknown keys survive a load/save cycle.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_CATEGORY_ID, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_JOKE_TIMEOUT_SECS, DEFAULT_WIDTH,
    MAX_SHORT_DURATION_SECS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty config path")]
    EmptyPath,
    #[error("invalid value for {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    Solid,
    Animated,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererChoice {
    Auto,
    Video,
    Image,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    /// Local wall-clock time, `HH:MM`
    pub daily_upload_time: String,
    pub max_video_duration: f64,
    pub upload_privacy: String,
    pub auto_set_thumbnail: bool,
    pub enable_scheduling: bool,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            daily_upload_time: "10:00".to_string(),
            max_video_duration: MAX_SHORT_DURATION_SECS,
            upload_privacy: "public".to_string(),
            auto_set_thumbnail: true,
            enable_scheduling: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    pub joke_apis: Vec<String>,
    pub min_script_length: usize,
    pub max_script_length: usize,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            joke_apis: vec![
                "https://official-joke-api.appspot.com/random_joke".to_string(),
                "https://v2.jokeapi.dev/joke/Any?blacklistFlags=nsfw,religious,political,racist,sexist,explicit&type=single".to_string(),
                "https://icanhazdadjoke.com/".to_string(),
            ],
            min_script_length: 10,
            max_script_length: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_size: u32,
    /// Passed to ffmpeg `drawtext`; fontconfig picks a face when unset
    pub font_file: Option<String>,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 80,
            font_file: None,
            color: "white".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmojiSettings {
    pub enabled: bool,
    pub size: u32,
    pub animation: bool,
    /// Colour emoji face for ffmpeg, e.g. NotoColorEmoji.ttf. Without it
    /// fontconfig's default face usually draws a missing-glyph box.
    pub font_file: Option<String>,
}

impl Default for EmojiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 150,
            animation: true,
            font_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub resolution: Resolution,
    pub fps: u32,
    pub background_type: BackgroundType,
    pub renderer: RendererChoice,
    pub ffmpeg_path: Option<String>,
    pub text_style: TextStyle,
    pub emoji_settings: EmojiSettings,
    pub background_colors: Vec<[u8; 3]>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            },
            fps: DEFAULT_FPS,
            background_type: BackgroundType::Random,
            renderer: RendererChoice::Auto,
            ffmpeg_path: None,
            text_style: TextStyle::default(),
            emoji_settings: EmojiSettings::default(),
            background_colors: vec![
                [25, 25, 112],  // MidnightBlue
                [72, 61, 139],  // DarkSlateBlue
                [106, 90, 205], // SlateBlue
                [30, 144, 255], // DodgerBlue
                [0, 100, 0],    // DarkGreen
                [85, 107, 47],  // DarkOliveGreen
                [139, 69, 19],  // SaddleBrown
                [160, 82, 45],  // Sienna
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeSettings {
    pub default_category: String,
    pub default_language: String,
    pub made_for_kids: bool,
    pub default_tags: Vec<String>,
    pub title_templates: Vec<String>,
    pub description_template: String,
    pub client_secrets_file: String,
    pub credentials_file: String,
    pub uploads_log: String,
    /// Bytes per resumable chunk; 0 sends the whole file in one request
    pub chunk_size: usize,
    pub allow_interactive_consent: bool,
}

impl Default for YouTubeSettings {
    fn default() -> Self {
        let tags = [
            "funny", "comedy", "humor", "shorts", "viral", "laugh", "hilarious",
            "entertainment", "fun", "joke", "meme", "youtubeshorts", "short", "trending",
            "fyp", "foryou",
        ];
        let titles = [
            "😂 This Will Make You LAUGH!",
            "🤣 Funniest Short You'll See Today!",
            "😂 You Won't Believe This!",
            "🤣 This Is TOO FUNNY!",
            "😂 Watch This & Try Not to Laugh!",
            "🤣 Hilarious Short Alert!",
            "😂 This Cracked Me Up!",
            "🤣 You NEED to See This!",
        ];
        Self {
            default_category: DEFAULT_CATEGORY_ID.to_string(),
            default_language: "en".to_string(),
            made_for_kids: false,
            default_tags: tags.iter().map(|t| t.to_string()).collect(),
            title_templates: titles.iter().map(|t| t.to_string()).collect(),
            description_template: "🤣 Hope this made you laugh! \n\n{script_content}\n\n🔔 Subscribe for daily funny shorts!\n👍 Like if this made you smile!\n💬 Comment your favorite part!\n\n#Shorts #Funny #Comedy #Viral #Entertainment".to_string(),
            client_secrets_file: "client_secrets.json".to_string(),
            credentials_file: "youtube_credentials.json".to_string(),
            uploads_log: "uploads_log.json".to_string(),
            chunk_size: 0,
            allow_interactive_consent: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub scripts: PathBuf,
    pub videos: PathBuf,
    pub temp: PathBuf,
    pub logs: PathBuf,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            scripts: "scripts".into(),
            videos: "videos".into(),
            temp: "temp".into(),
            logs: "logs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub timeout: u64,
    pub retry_attempts: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_JOKE_TIMEOUT_SECS,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    pub cleanup_temp_files: bool,
    pub save_metadata: bool,
    pub create_thumbnails: bool,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            cleanup_temp_files: true,
            save_metadata: true,
            create_thumbnails: true,
        }
    }
}

/// Typed view of the whole tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub automation: AutomationSettings,
    pub script_generation: ScriptSettings,
    pub video_creation: VideoSettings,
    pub youtube: YouTubeSettings,
    pub directories: DirectorySettings,
    pub apis: ApiSettings,
    pub advanced: AdvancedSettings,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    tree: Value,
}

impl ConfigStore {
    /// Load `path` over the defaults. A missing file is created with the
    /// defaults; an unreadable one is reported and ignored.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tree = default_tree();

        match std::fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<Value>(&data) {
                Ok(loaded) => merge(&mut tree, loaded),
                Err(e) => {
                    log::warn!(
                        "[config] Error parsing {}: {} - using defaults",
                        path.display(),
                        e
                    );
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let store = Self {
                    path: Some(path.clone()),
                    tree: tree.clone(),
                };
                if let Err(e) = store.save() {
                    log::warn!("[config] Could not write defaults to {}: {}", path.display(), e);
                }
            }
            Err(e) => {
                log::warn!(
                    "[config] Error reading {}: {} - using defaults",
                    path.display(),
                    e
                );
            }
        }

        Self {
            path: Some(path),
            tree,
        }
    }

    /// Defaults only, never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tree: default_tree(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Look up a dotted path such as `video_creation.fps`.
    pub fn get(&self, key_path: &str) -> Option<&Value> {
        let mut value = &self.tree;
        for key in key_path.split('.') {
            value = value.as_object()?.get(key)?;
        }
        Some(value)
    }

    /// Typed lookup that falls back to `default` when missing or mistyped.
    pub fn get_or<T: DeserializeOwned>(&self, key_path: &str, default: T) -> T {
        self.get(key_path)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default)
    }

    /// Set a dotted path, creating intermediate objects, then persist.
    pub fn set(&mut self, key_path: &str, value: Value) -> Result<(), ConfigError> {
        self.set_many(vec![(key_path.to_string(), value)])
    }

    /// Apply every change or none. The candidate tree must still deserialize
    /// into [`Settings`]; it is written once.
    pub fn set_many(&mut self, changes: Vec<(String, Value)>) -> Result<(), ConfigError> {
        let mut candidate = self.tree.clone();
        for (key_path, value) in changes {
            set_path(&mut candidate, &key_path, value)?;
        }

        if let Err(e) = serde_json::from_value::<Settings>(candidate.clone()) {
            return Err(ConfigError::Invalid(e.to_string()));
        }

        self.tree = candidate;
        self.save()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(&self.tree)?)?;
        Ok(())
    }

    /// Deserialize one top-level section.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.get(key).cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Ok(serde_json::from_value(self.tree.clone())?)
    }

    /// Check required keys and value ranges. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for path in [
            "automation.daily_upload_time",
            "video_creation.resolution.width",
            "video_creation.resolution.height",
            "youtube.default_category",
        ] {
            if self.get(path).is_none_or(Value::is_null) {
                errors.push(format!("Missing required setting: {}", path));
            }
        }

        if let Some(time) = self.get("automation.daily_upload_time") {
            let valid = time.as_str().and_then(parse_hh_mm).is_some();
            if !valid {
                errors.push("Invalid upload time format. Use HH:MM (24-hour)".to_string());
            }
        }

        let width = self.get_or::<i64>("video_creation.resolution.width", 0);
        let height = self.get_or::<i64>("video_creation.resolution.height", 0);
        if width <= 0 || height <= 0 {
            errors.push("Invalid video resolution".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Create every directory listed under `directories`.
    pub fn create_directories(&self) -> Result<(), ConfigError> {
        if let Some(dirs) = self.get("directories").and_then(Value::as_object) {
            for dir in dirs.values().filter_map(Value::as_str) {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    pub fn is_feature_enabled(&self, feature: &str) -> bool {
        let path = match feature {
            "scheduling" => "automation.enable_scheduling",
            "thumbnails" => "automation.auto_set_thumbnail",
            "emoji" => "video_creation.emoji_settings.enabled",
            "cleanup" => "advanced.cleanup_temp_files",
            "metadata" => "advanced.save_metadata",
            _ => return false,
        };
        self.get_or(path, true)
    }
}

/// Parse `HH:MM` (24-hour) into `(hour, minute)`.
pub fn parse_hh_mm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

fn default_tree() -> Value {
    serde_json::to_value(Settings::default()).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn set_path(tree: &mut Value, key_path: &str, value: Value) -> Result<(), ConfigError> {
    if key_path.is_empty() || key_path.split('.').any(str::is_empty) {
        return Err(ConfigError::EmptyPath);
    }

    let keys: Vec<&str> = key_path.split('.').collect();
    let (last, parents) = keys.split_last().ok_or(ConfigError::EmptyPath)?;

    let mut node = tree;
    for key in parents {
        node = object_mut(node)
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_mut(node).insert(last.to_string(), value);
    Ok(())
}

/// Turn `node` into an object if it is anything else, and borrow the map.
fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Recursive merge: objects merge key by key, everything else replaces.
fn merge(base: &mut Value, loaded: Value) {
    match (base, loaded) {
        (Value::Object(base_map), Value::Object(loaded_map)) => {
            for (key, value) in loaded_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge(existing, value)
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, loaded) => *base = loaded,
    }
}
