//! Records each pipeline run produces, and where they are persisted.

pub mod content;
pub mod script;
pub mod uploads;

pub use content::ContentRecord;
pub use script::{CueAction, Joke, ScriptKind, ScriptRecord, ScriptSource, TextOverlay, VisualCue};
pub use uploads::{UploadLog, UploadRecord};
