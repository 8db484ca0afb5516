//! Scheduled database backup: dump, delayed restore into a standby
//! database, pruning, and disk usage alerts.

pub mod alert;
pub mod command;
pub mod disk;
pub mod schedule;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::backup::alert::Alerter;
use crate::backup::command::{check_output, CommandRunner};
use crate::backup::disk::DiskProbe;
use crate::config::{redact_uri, BackupSettings};
use crate::error::AppError;

/// Directory name format of a dump, one per run.
const DUMP_NAME_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupOutcome {
    Succeeded,
    Failed,
}

/// Result of one backup run.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: BackupOutcome,
    pub dump_dir: Option<String>,
    pub restored: bool,
    pub disk_used_percent: Option<f64>,
    pub disk_alert_sent: bool,
    pub pruned: Vec<String>,
    pub error: Option<String>,
}

/// Status returned by the admin endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    pub running: bool,
    pub schedule: String,
    pub last_report: Option<BackupReport>,
}

/// Everything a run needs; one instance lives for the whole process.
pub struct BackupJob {
    settings: BackupSettings,
    source_uri: String,
    runner: Arc<dyn CommandRunner>,
    disk: Arc<dyn DiskProbe>,
    alerter: Arc<dyn Alerter>,
    running: Arc<tokio::sync::Mutex<()>>,
    last_report: Mutex<Option<BackupReport>>,
}

/// Accumulates the report while a run progresses.
struct RunState {
    started_at: DateTime<Utc>,
    dump_dir: Option<PathBuf>,
    restored: bool,
    disk_used_percent: Option<f64>,
    disk_alert_sent: bool,
    pruned: Vec<String>,
}

impl BackupJob {
    pub fn new(
        settings: BackupSettings,
        source_uri: String,
        runner: Arc<dyn CommandRunner>,
        disk: Arc<dyn DiskProbe>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        Self {
            settings,
            source_uri,
            runner,
            disk,
            alerter,
            running: Arc::new(tokio::sync::Mutex::new(())),
            last_report: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub fn last_report(&self) -> Option<BackupReport> {
        match self.last_report.lock() {
            Ok(report) => report.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn status(&self) -> BackupStatus {
        BackupStatus {
            running: self.is_running(),
            schedule: self.settings.schedule.clone(),
            last_report: self.last_report(),
        }
    }

    /// Run now unless a run is already in progress (then skip with a warning).
    pub async fn run_once(&self) -> Option<BackupReport> {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("Previous backup still running, skipping this run");
            return None;
        };
        Some(self.execute().await)
    }

    /// Start a run in the background; `Conflict` if one is in progress.
    pub fn spawn_run(self: &Arc<Self>) -> Result<(), AppError> {
        let guard = self
            .running
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::Conflict("A backup is already running".into()))?;

        let job = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            job.execute().await;
        });
        Ok(())
    }

    async fn execute(&self) -> BackupReport {
        let mut state = RunState {
            started_at: Utc::now(),
            dump_dir: None,
            restored: false,
            disk_used_percent: None,
            disk_alert_sent: false,
            pruned: vec![],
        };

        tracing::info!(source = %redact_uri(&self.source_uri), "Backup started");
        let result = self.run_steps(&mut state).await;

        let report = BackupReport {
            started_at: state.started_at,
            finished_at: Utc::now(),
            outcome: if result.is_ok() {
                BackupOutcome::Succeeded
            } else {
                BackupOutcome::Failed
            },
            dump_dir: state.dump_dir.map(|dir| dir.display().to_string()),
            restored: state.restored,
            disk_used_percent: state.disk_used_percent,
            disk_alert_sent: state.disk_alert_sent,
            pruned: state.pruned,
            error: result.as_ref().err().map(|e| e.to_string()),
        };

        match &result {
            Ok(()) => tracing::info!(
                dump_dir = ?report.dump_dir,
                restored = report.restored,
                "Backup finished"
            ),
            Err(e) => {
                tracing::error!("Backup failed: {e}");
                let body = format!(
                    "The backup started at {} failed.\n\n{}",
                    report.started_at.to_rfc3339(),
                    e
                );
                if let Err(alert_err) = self.alerter.send("Database backup failed", &body).await {
                    tracing::warn!("Failed to send backup failure alert: {alert_err}");
                }
            }
        }

        match self.last_report.lock() {
            Ok(mut last) => *last = Some(report.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(report.clone()),
        }
        report
    }

    async fn run_steps(&self, state: &mut RunState) -> Result<(), AppError> {
        let root = PathBuf::from(&self.settings.dir);
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Backup(format!(
                "Failed to create backup directory '{}': {e}",
                root.display()
            ))
        })?;

        self.check_disk(&root, state).await;

        let dump_dir = root.join(state.started_at.format(DUMP_NAME_FORMAT).to_string());
        state.dump_dir = Some(dump_dir.clone());
        let dump_arg = dump_dir.display().to_string();

        let output = self
            .runner
            .run(
                &self.settings.mongodump_bin,
                &[
                    "--uri".to_string(),
                    self.source_uri.clone(),
                    "--out".to_string(),
                    dump_arg.clone(),
                ],
            )
            .await?;
        check_output(&self.settings.mongodump_bin, &output)?;
        tracing::info!(dump_dir = %dump_arg, "Database dumped");

        if let Some(target) = &self.settings.restore_uri {
            if self.settings.restore_delay_secs > 0 {
                tracing::info!(
                    delay_secs = self.settings.restore_delay_secs,
                    "Waiting before restore"
                );
                tokio::time::sleep(Duration::from_secs(self.settings.restore_delay_secs)).await;
            }

            let output = self
                .runner
                .run(
                    &self.settings.mongorestore_bin,
                    &[
                        "--uri".to_string(),
                        target.clone(),
                        "--drop".to_string(),
                        dump_arg.clone(),
                    ],
                )
                .await?;
            check_output(&self.settings.mongorestore_bin, &output)?;
            state.restored = true;
            tracing::info!(target = %redact_uri(target), "Dump restored");
        }

        state.pruned = prune_dumps(&root, self.settings.retain).await?;
        Ok(())
    }

    /// Probe the backup volume and alert when it is at or above the threshold.
    /// Probe and alert failures are logged and do not stop the run.
    async fn check_disk(&self, root: &Path, state: &mut RunState) {
        let usage = match self.disk.usage(root) {
            Ok(usage) => usage,
            Err(e) => {
                tracing::warn!("Disk usage probe failed: {e}");
                return;
            }
        };

        let used = usage.used_percent();
        state.disk_used_percent = Some(used);
        if used < self.settings.disk_threshold_percent {
            return;
        }

        tracing::warn!(used_percent = used, "Backup volume above threshold");
        let body = format!(
            "The backup volume holding '{}' is {:.1}% full (threshold {:.1}%).\n\
             {} bytes available of {}.",
            root.display(),
            used,
            self.settings.disk_threshold_percent,
            usage.available_bytes,
            usage.total_bytes
        );
        match self.alerter.send("Backup disk almost full", &body).await {
            Ok(()) => state.disk_alert_sent = true,
            Err(e) => tracing::warn!("Failed to send disk alert: {e}"),
        }
    }
}

/// Delete the oldest dump directories so that at most `retain` remain.
///
/// Only directories named with [`DUMP_NAME_FORMAT`] count as dumps; anything
/// else in the backup directory is left alone.
async fn prune_dumps(root: &Path, retain: usize) -> Result<Vec<String>, AppError> {
    if retain == 0 {
        return Ok(vec![]);
    }

    let io_err = |e: std::io::Error| AppError::Backup(format!("Failed to prune backups: {e}"));

    let mut dumps: Vec<(NaiveDateTime, String)> = vec![];
    let mut entries = tokio::fs::read_dir(root).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        if !entry.file_type().await.map_err(io_err)?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Ok(taken_at) = NaiveDateTime::parse_from_str(&name, DUMP_NAME_FORMAT) {
            dumps.push((taken_at, name));
        }
    }
    dumps.sort();

    let excess = dumps.len().saturating_sub(retain);
    let mut pruned = vec![];
    for (_, name) in dumps.into_iter().take(excess) {
        tokio::fs::remove_dir_all(root.join(&name))
            .await
            .map_err(io_err)?;
        tracing::info!(dump = %name, "Old backup pruned");
        pruned.push(name);
    }
    Ok(pruned)
}
