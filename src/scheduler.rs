//! Daily wall-clock trigger, polled on a fixed tick.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::config::parse_hh_mm;

/// Fires at most once per calendar day, at the first check at or after the
/// configured local time.
#[derive(Debug, Clone)]
pub struct DailySchedule {
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
}

impl DailySchedule {
    /// A schedule created after today's time has passed waits for tomorrow.
    pub fn new(at: NaiveTime, now: NaiveDateTime) -> Self {
        let last_fired = (now.time() >= at).then(|| now.date());
        Self { at, last_fired }
    }

    pub fn parse(hh_mm: &str, now: NaiveDateTime) -> Option<Self> {
        let (hour, minute) = parse_hh_mm(hh_mm)?;
        Some(Self::new(NaiveTime::from_hms_opt(hour, minute, 0)?, now))
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// Check and consume today's slot.
    pub fn due(&mut self, now: NaiveDateTime) -> bool {
        if self.last_fired == Some(now.date()) || now.time() < self.at {
            return false;
        }
        self.last_fired = Some(now.date());
        true
    }

    /// Next time this schedule will fire.
    pub fn next_fire(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.at);
        if self.last_fired == Some(now.date()) || now.time() >= self.at {
            today + chrono::Duration::days(1)
        } else {
            today
        }
    }
}

/// Tick every `period` until `running` is cleared, awaiting `fire` whenever
/// the schedule is due. A run in progress is never interrupted; the flag is
/// read at the next tick.
pub async fn run_daily<F, Fut>(
    mut schedule: DailySchedule,
    running: Arc<AtomicBool>,
    period: Duration,
    mut fire: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!(
        "[scheduler] Daily run at {}, next at {}",
        schedule.at().format("%H:%M"),
        schedule.next_fire(Local::now().naive_local())
    );

    loop {
        interval.tick().await;

        if !running.load(Ordering::SeqCst) {
            log::info!("[scheduler] Stopped");
            break;
        }

        if schedule.due(Local::now().naive_local()) {
            log::info!("[scheduler] Scheduled time reached, starting run");
            fire().await;
        }
    }
}
