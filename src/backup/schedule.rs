use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::backup::BackupJob;
use crate::error::AppError;

/// Parse a cron expression (seconds field first, e.g. `0 0 2 * * *`).
pub fn parse_schedule(expression: &str) -> Result<Schedule, AppError> {
    Schedule::from_str(expression)
        .map_err(|e| AppError::Config(format!("Invalid backup schedule '{expression}': {e}")))
}

/// Time to wait from `now` until the next firing, if any.
pub fn next_delay(schedule: &Schedule, now: DateTime<Utc>) -> Option<std::time::Duration> {
    let next = schedule.after(&now).next()?;
    (next - now).to_std().ok()
}

/// Run `job` on every firing of `schedule`.
///
/// Each run is spawned separately so a run still in progress makes the next
/// firing skip instead of queueing behind it.
pub fn spawn_scheduler(job: Arc<BackupJob>, schedule: Schedule) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(delay) = next_delay(&schedule, Utc::now()) else {
                tracing::warn!("Backup schedule has no upcoming run, scheduler stopped");
                return;
            };
            tracing::debug!(in_secs = delay.as_secs(), "Next backup scheduled");
            tokio::time::sleep(delay).await;

            let job = job.clone();
            tokio::spawn(async move {
                job.run_once().await;
            });
        }
    })
}
