//! Cron scheduler.
//!
//! Each job gets its own tokio task that sleeps until the next cron fire time,
//! runs the job to completion, then computes the next fire time. A slow run
//! therefore never overlaps with itself; fire times that pass during a run are
//! skipped.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::ServiceResult;

type JobFuture = Pin<Box<dyn Future<Output = ServiceResult<String>> + Send>>;
type JobFn = Arc<dyn Fn(DateTime<Utc>) -> JobFuture + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expression}' for job '{job}': {source}")]
    InvalidSchedule {
        job: String,
        expression: String,
        source: cron::error::Error,
    },

    #[error("job '{0}' is already scheduled")]
    DuplicateJob(String),
}

/// Per-job counters.
#[derive(Debug, Default, Clone, Serialize)]
pub struct JobStats {
    pub runs: u64,
    pub failures: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<String>,
}

struct ScheduledJob {
    name: String,
    schedule: Schedule,
    run: JobFn,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `run` under `name`, fired on the 6-field cron `expression`
    /// (`sec min hour day-of-month month day-of-week`).
    pub fn add<F, Fut>(&mut self, name: &str, expression: &str, run: F) -> Result<(), SchedulerError>
    where
        F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult<String>> + Send + 'static,
    {
        if self.jobs.iter().any(|j| j.name == name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }
        let schedule = Schedule::from_str(expression).map_err(|source| SchedulerError::InvalidSchedule {
            job: name.to_string(),
            expression: expression.to_string(),
            source,
        })?;

        self.jobs.push(ScheduledJob {
            name: name.to_string(),
            schedule,
            run: Arc::new(move |now| Box::pin(run(now))),
        });
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }

    /// Next fire time of every job after `after`.
    pub fn next_runs(&self, after: DateTime<Utc>) -> Vec<(&str, Option<DateTime<Utc>>)> {
        self.jobs
            .iter()
            .map(|j| (j.name.as_str(), j.schedule.after(&after).next()))
            .collect()
    }

    /// Start one task per job. Must be called from within a tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats: Arc<Mutex<BTreeMap<String, JobStats>>> = Arc::new(Mutex::new(
            self.jobs
                .iter()
                .map(|j| (j.name.clone(), JobStats::default()))
                .collect(),
        ));

        let joins = self
            .jobs
            .into_iter()
            .map(|job| tokio::spawn(run_job(job, shutdown_rx.clone(), stats.clone())))
            .collect();

        SchedulerHandle {
            shutdown: shutdown_tx,
            joins,
            stats,
        }
    }
}

async fn run_job(
    job: ScheduledJob,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<Mutex<BTreeMap<String, JobStats>>>,
) {
    info!(job = %job.name, "scheduled job registered");
    loop {
        let Some(next) = job.schedule.upcoming(Utc).next() else {
            warn!(job = %job.name, "schedule has no upcoming fire time");
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }

        let started = Utc::now();
        debug!(job = %job.name, "job started");
        let result = (job.run)(started).await;

        let mut guard = match stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = guard.entry(job.name.clone()).or_default();
        entry.runs += 1;
        entry.last_run_at = Some(started);
        match result {
            Ok(summary) => {
                info!(job = %job.name, summary = %summary, "job finished");
                entry.last_outcome = Some(summary);
            }
            Err(e) => {
                error!(job = %job.name, error = %e, "job failed");
                entry.failures += 1;
                entry.last_outcome = Some(e.to_string());
            }
        }
    }
    info!(job = %job.name, "scheduled job stopped");
}

/// Running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    stats: Arc<Mutex<BTreeMap<String, JobStats>>>,
}

impl SchedulerHandle {
    pub fn stats(&self) -> BTreeMap<String, JobStats> {
        match self.stats.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Stop every job. A run in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "scheduled job task failed");
            }
        }
    }
}
