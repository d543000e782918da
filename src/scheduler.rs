//! Fires a job on a cron schedule in a fixed timezone, one run at a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::run_ledger::RunLedger;

#[derive(thiserror::Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },
    #[error("'{0}' is not a valid IANA timezone")]
    InvalidTimezone(String),
}

/// Something the scheduler can run.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<(), anyhow::Error>;
}

/// A cron expression (seconds first, e.g. `0 0 9 * * MON`) evaluated in `timezone`.
#[derive(Debug, Clone)]
pub struct DigestSchedule {
    schedule: cron::Schedule,
    timezone: Tz,
}

impl DigestSchedule {
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, ScheduleError> {
        let schedule =
            cron::Schedule::from_str(expression).map_err(|e| ScheduleError::InvalidExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;

        Ok(Self { schedule, timezone })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }

    /// Whether a fire time fell between `last_run` and `now`.
    pub fn missed_since(&self, last_run: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.next_after(last_run).map_or(false, |due| due <= now)
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Started(JoinHandle<()>),
    /// A previous run still holds the run lock.
    Skipped,
}

pub struct Scheduler {
    schedule: DigestSchedule,
    job: Arc<dyn ScheduledJob>,
    ledger: Arc<RunLedger>,
    running: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(schedule: DigestSchedule, job: Arc<dyn ScheduledJob>, ledger: RunLedger) -> Self {
        Self {
            schedule,
            job,
            ledger: Arc::new(ledger),
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Starts the job in the background unless a run is already in progress.
    pub fn trigger(&self) -> TriggerOutcome {
        self.trigger_for(Utc::now())
    }

    /// Like `trigger`, for the run due at `fire_time`. The ledger never records
    /// a completion earlier than `fire_time`, even if the wall clock lags.
    fn trigger_for(&self, fire_time: DateTime<Utc>) -> TriggerOutcome {
        let guard = match Arc::clone(&self.running).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(
                    job = self.job.name(),
                    "Previous run is still in progress, dropping this trigger"
                );
                return TriggerOutcome::Skipped;
            }
        };

        let job = Arc::clone(&self.job);
        let ledger = Arc::clone(&self.ledger);

        TriggerOutcome::Started(tokio::spawn(async move {
            let _guard = guard;
            let started_at = Utc::now().max(fire_time);

            tracing::info!(job = job.name(), "Scheduled run started");

            match job.run().await {
                Ok(()) => {
                    if let Err(err) = ledger.record(started_at).await {
                        tracing::error!(
                            job = job.name(),
                            error.cause_chain = ?err,
                            "Failed to record the completed run"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(
                        job = job.name(),
                        error.cause_chain = ?err,
                        error.message = %err,
                        "Scheduled run failed"
                    );
                }
            }
        }))
    }

    /// Waits for each fire time and triggers the job, forever. A fire time
    /// missed while the process was down is caught up once at startup.
    pub async fn run_until_stopped(self) {
        let now = Utc::now();

        if let Some(last_run) = self.ledger.last_completed_run().await {
            if self.schedule.missed_since(last_run, now) {
                tracing::info!(
                    job = self.job.name(),
                    last_run = %last_run,
                    "A scheduled run was missed, catching up"
                );
                self.trigger();
            }
        }

        let mut cursor = now;

        loop {
            let Some(next) = self.schedule.next_after(cursor) else {
                tracing::warn!(job = self.job.name(), "Schedule has no upcoming fire time");
                return;
            };

            tracing::info!(job = self.job.name(), next_run = %next, "Waiting for the next run");

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            self.trigger_for(next);
            cursor = next.max(Utc::now());
        }
    }
}
