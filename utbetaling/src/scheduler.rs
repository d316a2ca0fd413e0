//! Leader-gated job scheduler
//!
//! Each job runs on its own task with a fixed initial delay and period.
//! Before every tick the elector is asked fresh; a follower skips the tick.
//! A failed run is logged and the next tick proceeds as normal.

use crate::{config::JobSchedule, leader::LeaderElector, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Periodic job
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str;

    /// One run
    async fn run(&self) -> Result<()>;
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Job ran to completion
    Ran,
    /// Job ran and failed
    Failed,
    /// Not the leader, skipped
    Skipped,
    /// Leader check failed, skipped
    LeaderUnknown,
}

/// Runs jobs while this instance leads
pub struct JobScheduler {
    elector: Arc<dyn LeaderElector>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("jobs", &self.handles.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

impl JobScheduler {
    /// Create scheduler
    pub fn new(elector: Arc<dyn LeaderElector>) -> Self {
        Self {
            elector,
            handles: Vec::new(),
        }
    }

    /// Spawn `job` on `schedule`; disabled schedules are ignored
    pub fn schedule(&mut self, job: Arc<dyn ScheduledJob>, schedule: &JobSchedule) {
        let name = job.name().to_string();
        if !schedule.enabled {
            info!(job = %name, "Job disabled");
            return;
        }

        let elector = self.elector.clone();
        let initial_delay = schedule.initial_delay();
        let period = schedule.period();
        info!(job = %name, ?initial_delay, ?period, "Scheduling job");

        // First run counts from scheduling, not from the task's first poll
        let start = Instant::now() + initial_delay;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick(elector.as_ref(), job.as_ref()).await;
            }
        });
        self.handles.push((name, handle));
    }

    /// Number of scheduled jobs
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// No jobs scheduled
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop all jobs; a run in progress is aborted
    pub fn shutdown(&mut self) {
        for (name, handle) in self.handles.drain(..) {
            debug!(job = %name, "Stopping job");
            handle.abort();
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run `job` once if this instance leads
pub async fn tick(elector: &dyn LeaderElector, job: &dyn ScheduledJob) -> Tick {
    match elector.is_leader().await {
        Ok(true) => {}
        Ok(false) => {
            debug!(job = %job.name(), "Not leader, skipping run");
            return Tick::Skipped;
        }
        Err(e) => {
            warn!(job = %job.name(), error = %e, "Leader check failed, skipping run");
            return Tick::LeaderUnknown;
        }
    }

    info!(job = %job.name(), "Starting run");
    match job.run().await {
        Ok(()) => {
            info!(job = %job.name(), "Run finished");
            Tick::Ran
        }
        Err(e) => {
            error!(job = %job.name(), error = %e, "Run failed");
            Tick::Failed
        }
    }
}
