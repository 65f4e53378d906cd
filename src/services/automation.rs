//! Long-lived automation session shared by the CLI and the dashboard.
//!
//! Owns the config, a cached pipeline, the daily scheduler task and the
//! run slot. A run holds the slot for its whole duration; any trigger that
//! finds it taken is skipped, never queued.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{AutomationSettings, ConfigError, ConfigStore, Settings, parse_hh_mm};
use crate::constants::SCHEDULER_TICK_SECS;
use crate::domain::{UploadLog, UploadRecord};
use crate::pipeline::{Pipeline, RunOutcome, Stage};
use crate::scheduler::{self, DailySchedule};

const UPLOAD_TIME_KEY: &str = "automation.daily_upload_time";
const SCHEDULING_KEY: &str = "automation.enable_scheduling";
const ACTIVITY_CAPACITY: usize = 50;
const STATS_RECENT: usize = 10;

pub type PipelineFactory = Box<dyn Fn(&Settings) -> Pipeline + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub action: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub finished_at: DateTime<Local>,
    pub success: bool,
    pub failed_stage: Option<Stage>,
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub is_running: bool,
    pub busy: bool,
    pub stage: Stage,
    pub daily_upload_time: String,
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub skipped: u64,
    pub last_run: Option<LastRun>,
    pub total_uploads: usize,
    pub upload_log: Vec<UploadRecord>,
    /// Newest first
    pub recent_activity: Vec<Activity>,
}

#[derive(Default)]
struct Counters {
    runs: u64,
    successes: u64,
    failures: u64,
    skipped: u64,
    last_run: Option<LastRun>,
    activity: VecDeque<Activity>,
}

impl Counters {
    fn record(&mut self, action: &str, status: &str, message: impl Into<String>) {
        if self.activity.len() == ACTIVITY_CAPACITY {
            self.activity.pop_front();
        }
        self.activity.push_back(Activity {
            action: action.to_string(),
            status: status.to_string(),
            message: message.into(),
            timestamp: Local::now(),
        });
    }
}

struct SchedulerHandle {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

pub struct AutomationSession {
    config: Mutex<ConfigStore>,
    factory: PipelineFactory,
    pipeline: Mutex<Option<Arc<Pipeline>>>,
    pipeline_dirty: AtomicBool,
    /// Pipeline of the run holding the slot
    active: Mutex<Option<Arc<Pipeline>>>,
    run_slot: tokio::sync::Mutex<()>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    counters: Mutex<Counters>,
    tick: Duration,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AutomationSession {
    pub fn new(config: ConfigStore) -> Self {
        Self::with_factory(config, Box::new(Pipeline::from_settings))
    }

    pub fn with_factory(config: ConfigStore, factory: PipelineFactory) -> Self {
        Self {
            config: Mutex::new(config),
            factory,
            pipeline: Mutex::new(None),
            pipeline_dirty: AtomicBool::new(true),
            active: Mutex::new(None),
            run_slot: tokio::sync::Mutex::new(()),
            scheduler: Mutex::new(None),
            counters: Mutex::new(Counters::default()),
            tick: Duration::from_secs(SCHEDULER_TICK_SECS),
        }
    }

    /// Scheduler poll period.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    fn current_settings(&self) -> Settings {
        locked(&self.config).settings().unwrap_or_else(|e| {
            log::error!("[session] Settings do not deserialize, using defaults: {}", e);
            Settings::default()
        })
    }

    /// The cached pipeline, rebuilt after a settings change. A run already in
    /// progress keeps the instance it started with.
    fn pipeline(&self) -> Arc<Pipeline> {
        let mut cached = locked(&self.pipeline);
        if self.pipeline_dirty.swap(false, Ordering::SeqCst) || cached.is_none() {
            *cached = Some(Arc::new((self.factory)(&self.current_settings())));
        }
        match cached.as_ref() {
            Some(pipeline) => pipeline.clone(),
            None => Arc::new((self.factory)(&self.current_settings())),
        }
    }

    pub fn is_running(&self) -> bool {
        locked(&self.scheduler)
            .as_ref()
            .is_some_and(|h| h.running.load(Ordering::SeqCst) && !h.task.is_finished())
    }

    pub fn is_busy(&self) -> bool {
        self.run_slot.try_lock().is_err()
    }

    /// Start the daily scheduler. Returns false when it is already running,
    /// scheduling is disabled, or the configured time does not parse.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut current = locked(&self.scheduler);
        if current
            .as_ref()
            .is_some_and(|h| h.running.load(Ordering::SeqCst) && !h.task.is_finished())
        {
            log::warn!("[session] Automation already running");
            return false;
        }

        if !locked(&self.config).is_feature_enabled("scheduling") {
            log::warn!("[session] Scheduling is disabled ({}), not starting", SCHEDULING_KEY);
            locked(&self.counters).record("start", "error", "scheduling disabled");
            return false;
        }

        let automation = locked(&self.config).section::<AutomationSettings>("automation");
        let time = match automation {
            Ok(automation) => automation.daily_upload_time,
            Err(e) => {
                log::error!("[session] Unreadable automation settings: {}", e);
                return false;
            }
        };
        let Some(schedule) = DailySchedule::parse(&time, Local::now().naive_local()) else {
            log::error!("[session] Invalid daily upload time {:?}", time);
            locked(&self.counters).record("start", "error", format!("invalid time {}", time));
            return false;
        };

        let running = Arc::new(AtomicBool::new(true));
        let session: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(scheduler::run_daily(
            schedule,
            running.clone(),
            self.tick,
            move || {
                let session = session.upgrade();
                async move {
                    if let Some(session) = session {
                        session.run_once().await;
                    }
                }
            },
        ));

        *current = Some(SchedulerHandle { running, task });
        locked(&self.counters).record("start", "success", format!("daily at {}", time));
        log::info!("[session] Automation started, daily at {}", time);
        true
    }

    /// Clear the scheduler flag. A run in progress finishes normally.
    pub fn stop(&self) -> bool {
        let Some(handle) = locked(&self.scheduler).take() else {
            return false;
        };
        let was_running = handle.running.swap(false, Ordering::SeqCst);
        if was_running {
            locked(&self.counters).record("stop", "success", "automation stopped");
            log::info!("[session] Automation stopped");
        }
        was_running
    }

    /// Run the pipeline once now. Returns false on failure or when another
    /// run holds the slot.
    pub async fn run_once(&self) -> bool {
        let Ok(_slot) = self.run_slot.try_lock() else {
            log::warn!("[session] A run is already in progress, skipping trigger");
            let mut counters = locked(&self.counters);
            counters.skipped += 1;
            counters.record("run", "skipped", "run already in progress");
            return false;
        };

        let pipeline = self.pipeline();
        *locked(&self.active) = Some(pipeline.clone());
        let outcome = pipeline.run().await;
        *locked(&self.active) = None;

        self.record_run(&outcome);
        outcome.success
    }

    fn record_run(&self, outcome: &RunOutcome) {
        let mut counters = locked(&self.counters);
        counters.runs += 1;
        if outcome.success {
            counters.successes += 1;
            let id = outcome.video_id.clone().unwrap_or_default();
            counters.record("upload", "success", format!("uploaded {}", id));
        } else {
            counters.failures += 1;
            let stage = outcome
                .failed_stage
                .map(|s| format!("{:?}", s))
                .unwrap_or_default();
            counters.record("run", "error", format!("failed during {}", stage));
        }
        counters.last_run = Some(LastRun {
            finished_at: Local::now(),
            success: outcome.success,
            failed_stage: outcome.failed_stage,
            video_id: outcome.video_id.clone(),
        });
    }

    /// The whole settings tree.
    pub fn settings(&self) -> Value {
        locked(&self.config).tree().clone()
    }

    /// Set one dotted path and persist. See [`Self::set_settings`].
    pub fn set_setting(self: &Arc<Self>, key_path: &str, value: Value) -> Result<(), ConfigError> {
        self.set_settings(vec![(key_path.to_string(), value)])
    }

    /// Apply a batch of dotted-path changes, all or none, with one write.
    /// The next run picks them up; a new upload time or scheduling flag
    /// restarts a running scheduler.
    pub fn set_settings(self: &Arc<Self>, changes: Vec<(String, Value)>) -> Result<(), ConfigError> {
        for (key_path, value) in &changes {
            if key_path == UPLOAD_TIME_KEY && value.as_str().and_then(parse_hh_mm).is_none() {
                return Err(ConfigError::Invalid(key_path.clone()));
            }
        }

        let keys: Vec<String> = changes.iter().map(|(k, _)| k.clone()).collect();
        locked(&self.config).set_many(changes)?;
        self.pipeline_dirty.store(true, Ordering::SeqCst);
        locked(&self.counters).record("config_update", "success", keys.join(", "));
        log::info!("[session] Updated {}", keys.join(", "));

        let restart = keys.iter().any(|k| k == UPLOAD_TIME_KEY || k == SCHEDULING_KEY);
        if restart && self.stop() {
            self.start();
        }
        Ok(())
    }

    pub async fn stats(&self) -> SessionStats {
        let settings = self.current_settings();
        let upload_log = UploadLog::new(&settings.youtube.uploads_log);
        let uploads = upload_log.read_all().await.unwrap_or_else(|e| {
            log::warn!("[session] Could not read {}: {}", upload_log.path().display(), e);
            Vec::new()
        });

        let total_uploads = uploads.len();
        let skip = total_uploads.saturating_sub(STATS_RECENT);
        let upload_log = uploads.into_iter().skip(skip).collect();

        let stage = locked(&self.active)
            .as_ref()
            .map_or(Stage::Idle, |pipeline| pipeline.stage());
        let counters = locked(&self.counters);
        SessionStats {
            is_running: self.is_running(),
            busy: self.is_busy(),
            stage,
            daily_upload_time: settings.automation.daily_upload_time,
            runs: counters.runs,
            successes: counters.successes,
            failures: counters.failures,
            skipped: counters.skipped,
            last_run: counters.last_run.clone(),
            total_uploads,
            upload_log,
            recent_activity: counters
                .activity
                .iter()
                .rev()
                .take(STATS_RECENT)
                .cloned()
                .collect(),
        }
    }
}
