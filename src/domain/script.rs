//! Script domain - the joke text plus the timing the renderers follow.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::MAX_SHORT_DURATION_SECS;
use crate::storage;

/// A joke as it comes out of an API or the local list, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Joke {
    TwoPart { setup: String, punchline: String },
    Single { text: String },
}

impl Joke {
    /// Length in chars of the text a script built from this joke shows.
    pub fn text_len(&self) -> usize {
        match self {
            Joke::TwoPart { setup, punchline } if punchline.trim().is_empty() => {
                setup.trim().chars().count()
            }
            Joke::TwoPart { setup, punchline } => {
                setup.trim().chars().count() + 1 + punchline.trim().chars().count()
            }
            Joke::Single { text } => text.trim().chars().count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    DadJoke,
    OneLiner,
    Story,
}

impl ScriptKind {
    pub fn topic(self) -> &'static str {
        match self {
            ScriptKind::DadJoke => "dad joke",
            ScriptKind::OneLiner => "one liner",
            ScriptKind::Story => "humor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptSource {
    Api,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueAction {
    ShowSetupText,
    DramaticPause,
    ShowPunchlineText,
    ShowJokeText,
    ShowLaughingEmoji,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualCue {
    pub time: f64,
    pub action: CueAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// One run's script. Built once by the joke source and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub text: String,
    pub kind: ScriptKind,
    pub setup: Option<String>,
    pub punchline: Option<String>,
    pub duration_seconds: f64,
    pub visual_cues: Vec<VisualCue>,
    pub text_overlays: Vec<TextOverlay>,
    pub topic: String,
    pub source: ScriptSource,
    pub created_at: DateTime<Local>,
    pub suggested_hashtags: Vec<String>,
}

const HASHTAGS: [&str; 8] = [
    "#shorts",
    "#funny",
    "#comedy",
    "#joke",
    "#humor",
    "#viral",
    "#laughs",
    "#entertainment",
];

impl ScriptRecord {
    /// Format and enrich a joke. Every derived field is a pure function of
    /// the joke's kind and text.
    pub fn from_joke(joke: Joke, source: ScriptSource, created_at: DateTime<Local>) -> Self {
        let (text, kind, setup, punchline) = match joke {
            Joke::TwoPart { setup, punchline } if punchline.trim().is_empty() => {
                (setup.trim().to_string(), ScriptKind::Story, None, None)
            }
            Joke::TwoPart { setup, punchline } => {
                let setup = setup.trim().to_string();
                let punchline = punchline.trim().to_string();
                (
                    format!("{} {}", setup, punchline),
                    ScriptKind::DadJoke,
                    Some(setup),
                    Some(punchline),
                )
            }
            Joke::Single { text } => (text.trim().to_string(), ScriptKind::OneLiner, None, None),
        };

        let duration_seconds = match kind {
            ScriptKind::DadJoke => 6.0,
            ScriptKind::OneLiner => 4.0,
            ScriptKind::Story => (text.split_whitespace().count() / 2).max(1) as f64,
        };

        let (visual_cues, text_overlays) = match (&setup, &punchline) {
            (Some(setup), Some(punchline)) => (
                vec![
                    cue(0.0, CueAction::ShowSetupText),
                    cue(2.0, CueAction::DramaticPause),
                    cue(3.0, CueAction::ShowPunchlineText),
                    cue(5.0, CueAction::ShowLaughingEmoji),
                ],
                vec![
                    overlay(setup, 0.0, 2.5),
                    overlay(punchline, 3.0, 6.0),
                ],
            ),
            _ => (
                vec![
                    cue(0.0, CueAction::ShowJokeText),
                    cue(duration_seconds, CueAction::ShowLaughingEmoji),
                ],
                vec![overlay(&text, 0.0, duration_seconds)],
            ),
        };

        Self {
            topic: kind.topic().to_string(),
            text,
            kind,
            setup,
            punchline,
            duration_seconds,
            visual_cues,
            text_overlays,
            source,
            created_at,
            suggested_hashtags: HASHTAGS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_two_part(&self) -> bool {
        self.setup.is_some() && self.punchline.is_some()
    }

    /// The lines a still renderer shows, in order, without the emoji.
    pub fn display_lines(&self) -> Vec<&str> {
        match (&self.setup, &self.punchline) {
            (Some(setup), Some(punchline)) => vec![setup.as_str(), punchline.as_str()],
            _ => vec![self.text.as_str()],
        }
    }

    /// Sanity check before rendering. Logs what is off; never blocks a run.
    pub fn validate(&self, min_length: usize) -> bool {
        if self.text.chars().count() < min_length {
            log::warn!("[script] Script too short: {:?}", self.text);
            return false;
        }
        if self.duration_seconds > MAX_SHORT_DURATION_SECS {
            log::warn!(
                "[script] Script runs {}s, longer than a Short allows",
                self.duration_seconds
            );
        }
        true
    }

    /// Cues and overlays cut to a clip of `duration` seconds. Anything that
    /// starts at or after the end is dropped.
    pub fn timeline_within(&self, duration: f64) -> (Vec<VisualCue>, Vec<TextOverlay>) {
        let cues = self
            .visual_cues
            .iter()
            .filter(|c| c.time <= duration)
            .cloned()
            .collect();
        let overlays = self
            .text_overlays
            .iter()
            .filter(|o| o.start < duration)
            .map(|o| TextOverlay {
                end: o.end.min(duration),
                ..o.clone()
            })
            .collect();
        (cues, overlays)
    }

    /// Persist as `script_YYYYMMDD_HHMMSS.json` under `dir`.
    pub async fn save(
        &self,
        dir: &Path,
    ) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        let path = storage::timestamped_path(dir, "script_", self.created_at, ".json");
        storage::write_json(&path, self).await?;
        Ok(path)
    }
}

fn cue(time: f64, action: CueAction) -> VisualCue {
    VisualCue { time, action }
}

fn overlay(text: &str, start: f64, end: f64) -> TextOverlay {
    TextOverlay {
        text: text.to_string(),
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_part() -> Joke {
        Joke::TwoPart {
            setup: "Why don't scientists trust atoms?".into(),
            punchline: "Because they make up everything!".into(),
        }
    }

    #[test]
    fn test_two_part_enrichment() {
        let s = ScriptRecord::from_joke(two_part(), ScriptSource::Local, Local::now());

        assert_eq!(s.kind, ScriptKind::DadJoke);
        assert_eq!(s.duration_seconds, 6.0);
        assert_eq!(s.topic, "dad joke");
        assert_eq!(
            s.text,
            "Why don't scientists trust atoms? Because they make up everything!"
        );
        let actions: Vec<_> = s.visual_cues.iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![
                CueAction::ShowSetupText,
                CueAction::DramaticPause,
                CueAction::ShowPunchlineText,
                CueAction::ShowLaughingEmoji
            ]
        );
        assert_eq!(s.text_overlays[0].end, 2.5);
        assert_eq!(s.text_overlays[1].text, "Because they make up everything!");
        assert_eq!(s.display_lines().len(), 2);
    }

    #[test]
    fn test_one_liner_enrichment() {
        let s = ScriptRecord::from_joke(
            Joke::Single {
                text: "I invented a new word: Plagiarism!".into(),
            },
            ScriptSource::Api,
            Local::now(),
        );

        assert_eq!(s.kind, ScriptKind::OneLiner);
        assert_eq!(s.duration_seconds, 4.0);
        assert_eq!(s.visual_cues[1].time, 4.0);
        assert_eq!(s.text_overlays.len(), 1);
        assert!(!s.is_two_part());
    }

    #[test]
    fn test_story_duration_from_word_count() {
        let s = ScriptRecord::from_joke(
            Joke::TwoPart {
                setup: "one two three four five six seven eight nine ten".into(),
                punchline: "  ".into(),
            },
            ScriptSource::Api,
            Local::now(),
        );
        assert_eq!(s.kind, ScriptKind::Story);
        assert_eq!(s.duration_seconds, 5.0);
        assert_eq!(s.topic, "humor");

        let short = ScriptRecord::from_joke(
            Joke::TwoPart {
                setup: "Hi".into(),
                punchline: String::new(),
            },
            ScriptSource::Api,
            Local::now(),
        );
        assert_eq!(short.duration_seconds, 1.0);
    }

    #[test]
    fn test_validate_min_length() {
        let s = ScriptRecord::from_joke(
            Joke::Single { text: "Short".into() },
            ScriptSource::Api,
            Local::now(),
        );
        assert!(!s.validate(10));
        assert!(s.validate(3));
    }

    #[test]
    fn test_timeline_within_clamped_duration() {
        let s = ScriptRecord::from_joke(two_part(), ScriptSource::Api, Local::now());

        let (cues, overlays) = s.timeline_within(2.8);
        assert_eq!(cues.len(), 2);
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].end, 2.5);

        let (cues, overlays) = s.timeline_within(4.0);
        assert_eq!(cues.last().unwrap().action, CueAction::ShowPunchlineText);
        assert_eq!(overlays[1].end, 4.0);

        let (cues, overlays) = s.timeline_within(6.0);
        assert_eq!((cues, overlays), (s.visual_cues.clone(), s.text_overlays.clone()));
    }

    #[test]
    fn test_text_len_matches_record_text() {
        for joke in [
            two_part(),
            Joke::Single { text: "  Hi there ".into() },
            Joke::TwoPart { setup: "Only a setup".into(), punchline: " ".into() },
        ] {
            let len = joke.text_len();
            let s = ScriptRecord::from_joke(joke, ScriptSource::Api, Local::now());
            assert_eq!(len, s.text.chars().count());
        }
    }

    #[tokio::test]
    async fn test_save_writes_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let s = ScriptRecord::from_joke(two_part(), ScriptSource::Local, Local::now());

        let path = s.save(dir.path()).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("script_") && name.ends_with(".json"));

        let back: ScriptRecord = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back.kind, ScriptKind::DadJoke);
    }
}
