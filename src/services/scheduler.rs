// src/services/scheduler.rs
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::Settings;
use crate::error::{MeterError, Result};

/// Every minute, on the minute. The schedule itself is matched against the
/// local wall clock on each tick, so offset changes need no re-registration.
const TICK: &str = "0 * * * * *";

/// Daily wall-clock times in one timezone.
#[derive(Debug, Clone)]
pub struct MeterScheduler {
    times: Vec<NaiveTime>,
    timezone: Tz,
}

impl MeterScheduler {
    pub fn new(times: Vec<NaiveTime>, timezone: Tz) -> Self {
        MeterScheduler { times, timezone }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.schedule_times.clone(), settings.timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn labels(&self) -> Vec<String> {
        self.times.iter().map(|t| t.format("%H:%M").to_string()).collect()
    }

    /// The local slot (date and configured time) whose minute `now` falls in.
    pub fn due_slot(&self, now: DateTime<Utc>) -> Option<NaiveDateTime> {
        let local = now.with_timezone(&self.timezone).naive_local();
        let minute = local.time().with_second(0)?.with_nanosecond(0)?;
        self.times
            .iter()
            .find(|t| **t == minute)
            .map(|t| local.date().and_time(*t))
    }

    /// Times that do not exist on a given day (spring-forward gap) are skipped for that day.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        let local_now = now.with_timezone(&self.timezone);
        (0..=2)
            .flat_map(|offset| {
                let day = local_now.date_naive() + Duration::days(offset);
                self.times
                    .iter()
                    .filter_map(move |t| self.timezone.from_local_datetime(&day.and_time(*t)).earliest())
                    .collect::<Vec<_>>()
            })
            .filter(|candidate| *candidate > local_now)
            .min()
    }

    pub fn upcoming_runs(&self, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Tz>> {
        let mut runs = Vec::with_capacity(count);
        let mut cursor = now;
        while runs.len() < count {
            match self.next_run_after(cursor) {
                Some(next) => {
                    cursor = next.with_timezone(&Utc);
                    runs.push(next);
                }
                None => break,
            }
        }
        runs
    }

    /// Starts a minute tick that runs `job` at each configured local time.
    /// Runs go through one `RunGate`, so they never overlap.
    pub async fn start<F, Fut>(&self, job: F) -> Result<JobScheduler>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut scheduler = JobScheduler::new()
            .await
            .map_err(|e| MeterError::Scheduler(format!("{:?}", e)))?;

        let schedule = self.clone();
        let gate = RunGate::default();
        let tick = Job::new_async(TICK, move |_id, _scheduler| {
            let schedule = schedule.clone();
            let gate = gate.clone();
            let job = job.clone();
            Box::pin(async move {
                if let Some(slot) = schedule.due_slot(Utc::now()) {
                    gate.run(slot, job()).await;
                }
            })
        })
        .map_err(|e| MeterError::Scheduler(format!("{:?}", e)))?;

        scheduler
            .add(tick)
            .await
            .map_err(|e| MeterError::Scheduler(format!("{:?}", e)))?;
        scheduler
            .start()
            .await
            .map_err(|e| MeterError::Scheduler(format!("{:?}", e)))?;
        info!(
            "Scheduler started: daily at {} ({}), next run: {:?}",
            self.labels().join(", "),
            self.timezone.name(),
            self.next_run_after(Utc::now())
        );
        Ok(scheduler)
    }
}

/// Admits one run at a time and each local slot at most once.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    last_slot: Arc<Mutex<Option<NaiveDateTime>>>,
}

impl RunGate {
    /// Runs `job` unless another run holds the gate or `slot` already ran.
    pub async fn run<Fut>(&self, slot: NaiveDateTime, job: Fut) -> bool
    where
        Fut: Future<Output = ()>,
    {
        let mut last_slot = match self.last_slot.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Previous run still in progress, skipping the {} run", slot);
                return false;
            }
        };
        if *last_slot == Some(slot) {
            // A repeated wall-clock hour after a DST fall-back.
            debug!("Slot {} already ran", slot);
            return false;
        }
        *last_slot = Some(slot);
        job.await;
        true
    }
}
