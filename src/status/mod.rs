pub mod bjobs;
pub mod logfile;

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::config::{LocalConfig, SchedulerConfig};
use crate::error::UserError;
use crate::run_id::{run_path, RunId};

pub use bjobs::{QueueSnapshot, QueueStatus};
use logfile::LogOutcome;

/// Lifecycle status of one model run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Submitted,
    Pending,
    Running,
    Completed,
    Failed,
    SubmissionFailed,
    Unknown,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Submitted => "Submitted",
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
            RunStatus::SubmissionFailed => "Submission Failed",
            RunStatus::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Resolved status of one run, rebuilt fresh on every status check.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub run_id: RunId,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub storage_mb: u64,
}

impl JobStatus {
    fn new(run_id: RunId, status: RunStatus, error_message: Option<String>) -> Self {
        Self {
            run_id,
            status,
            error_message,
            start_time: None,
            end_time: None,
            storage_mb: 0,
        }
    }
}

/// Determines a run's status from the run directory, the scheduler queue and
/// the completion log, in that order of authority.
pub struct JobStatusResolver {
    root: PathBuf,
    job_id_file_name: String,
    log_file_name: String,
}

impl JobStatusResolver {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            root: config.root_path.clone(),
            job_id_file_name: config.job_id_file_name.clone(),
            log_file_name: config.log_file_name.clone(),
        }
    }

    /// Resolve one run. The queue is authoritative while the job is still
    /// known to the scheduler; only once it has left the queue is the log
    /// consulted — a stale log from a previous attempt never wins.
    pub fn resolve(&self, run_id: RunId, queue: &QueueSnapshot) -> JobStatus {
        let run_dir = run_path(&self.root, run_id);
        if !run_dir.is_dir() {
            return JobStatus::new(
                run_id,
                RunStatus::SubmissionFailed,
                Some("no folder created for run".to_string()),
            );
        }

        let job_id = match self.read_job_id(&run_dir) {
            Some(id) => id,
            None => {
                return JobStatus::new(
                    run_id,
                    RunStatus::SubmissionFailed,
                    Some("no job id recorded".to_string()),
                );
            }
        };

        if let Some(queue_status) = queue.get(&job_id) {
            let status = match queue_status {
                QueueStatus::Running => RunStatus::Running,
                QueueStatus::Pending => RunStatus::Pending,
                QueueStatus::Unknown => RunStatus::Unknown,
            };
            return JobStatus::new(run_id, status, None);
        }

        // Job has left the queue; the log decides.
        let log_path = run_dir.join(&self.log_file_name);
        let content = match std::fs::read_to_string(&log_path) {
            Ok(content) => content,
            Err(e) => {
                let message = format!("Could not read {}: {e}", log_path.display());
                return JobStatus::new(run_id, RunStatus::Failed, Some(message));
            }
        };

        let summary = logfile::parse(&content);
        let mut status = match summary.outcome {
            LogOutcome::Completed => JobStatus::new(run_id, RunStatus::Completed, None),
            LogOutcome::Failed(message) => {
                JobStatus::new(run_id, RunStatus::Failed, Some(message))
            }
        };
        status.start_time = summary.start_time;
        status.end_time = summary.end_time;
        status.storage_mb = summary.storage_mb;
        status
    }

    /// The scheduler submission id persisted in the run's marker file.
    /// Absent or unreadable content counts as "not recorded".
    fn read_job_id(&self, run_dir: &std::path::Path) -> Option<u64> {
        let path = run_dir.join(&self.job_id_file_name);
        let content = std::fs::read_to_string(&path).ok()?;
        match content.trim().parse() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(path = %path.display(), "job id marker file is not numeric");
                None
            }
        }
    }
}

/// Take a fresh snapshot of the scheduler queue by running the configured
/// queue command.
pub fn queue_snapshot(config: &SchedulerConfig) -> Result<QueueSnapshot> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(&config.bjobs_command)
        .output()
        .with_context(|| format!("Failed to run `{}`", config.bjobs_command))?;

    if !output.status.success() {
        return Err(UserError::client(format!(
            "Scheduler query `{}` failed: {}",
            config.bjobs_command,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
        .into());
    }

    Ok(bjobs::parse(&String::from_utf8_lossy(&output.stdout)))
}
