//! Application constants

/// Longest clip YouTube accepts as a Short, in seconds
pub const MAX_SHORT_DURATION_SECS: f64 = 60.0;

/// YouTube rejects more than this many tags per video
pub const MAX_TAGS: usize = 15;

/// Comedy category on YouTube
pub const DEFAULT_CATEGORY_ID: &str = "23";

/// OAuth scope for uploading, nothing broader
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Public watch URL prefix for uploaded videos
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Per-request timeout for joke APIs (seconds)
pub const DEFAULT_JOKE_TIMEOUT_SECS: u64 = 10;

/// Scheduler poll period (seconds)
pub const SCHEDULER_TICK_SECS: u64 = 60;

/// Vertical 9:16 output
pub const DEFAULT_WIDTH: u32 = 1080;
pub const DEFAULT_HEIGHT: u32 = 1920;
pub const DEFAULT_FPS: u32 = 30;

/// Thumbnail size YouTube recommends
pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

/// JPEG quality for rendered stills
pub const JPEG_QUALITY: u8 = 95;

/// Sent to icanhazdadjoke, which rejects requests without one
pub const JOKE_USER_AGENT: &str = "shortsbot (https://github.com/shortsbot/shortsbot)";
