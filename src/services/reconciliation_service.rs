use std::sync::Arc;

use chrono::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::{Error, Result};
use crate::models::profile::TalentStatus;
use crate::services::profile_store::ProfileStore;
use crate::services::queue_service::ScoringQueue;
use crate::services::scoring_service::{ScoringOutcome, INTERRUPTED_MESSAGE};
use crate::services::session_service::InterviewSessionDriver;
use crate::services::status_machine::StatusMachine;
use crate::utils::time::Clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_sessions: usize,
    pub exhausted_jobs: usize,
    pub stranded_profiles: usize,
}

/// Recovers candidates stuck in a live call or in
/// `interview_completed_processing_summary`.
#[derive(Clone)]
pub struct ReconciliationService {
    sessions: InterviewSessionDriver,
    store: Arc<dyn ProfileStore>,
    queue: Arc<dyn ScoringQueue>,
    machine: StatusMachine,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
    max_attempts: i32,
}

impl ReconciliationService {
    pub fn new(
        sessions: InterviewSessionDriver,
        store: Arc<dyn ProfileStore>,
        queue: Arc<dyn ScoringQueue>,
        machine: StatusMachine,
        clock: Arc<dyn Clock>,
        stale_after: Duration,
        max_attempts: i32,
    ) -> Self {
        Self {
            sessions,
            store,
            queue,
            machine,
            clock,
            stale_after,
            max_attempts,
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let cutoff = now - self.stale_after;
        let mut report = SweepReport {
            expired_sessions: self.sessions.expire_stale().await?,
            ..Default::default()
        };

        let exhausted = self.queue.requeue_stale(cutoff, self.max_attempts).await?;
        for job in exhausted {
            tracing::warn!(job_id = %job.id, profile_id = %job.profile_id, attempts = job.attempts, "scoring job out of attempts");
            let outcome = ScoringOutcome::fallback(INTERRUPTED_MESSAGE, now);
            if self.machine.resolve_report(&job.profile_id, outcome).await?.is_some() {
                report.exhausted_jobs += 1;
            }
        }

        let stuck = self
            .store
            .list_by_status(TalentStatus::InterviewCompletedProcessingSummary, cutoff)
            .await?;
        for profile in stuck {
            if self.queue.has_open_job(&profile.id).await? {
                continue;
            }
            tracing::warn!(profile_id = %profile.id, updated_at = %profile.updated_at, "profile stranded in processing");
            let outcome = ScoringOutcome::fallback(INTERRUPTED_MESSAGE, now);
            if self.machine.resolve_report(&profile.id, outcome).await?.is_some() {
                report.stranded_profiles += 1;
            }
        }

        if report != SweepReport::default() {
            tracing::info!(
                expired_sessions = report.expired_sessions,
                exhausted_jobs = report.exhausted_jobs,
                stranded_profiles = report.stranded_profiles,
                "reconciliation sweep resolved profiles"
            );
        }
        Ok(report)
    }

    /// Runs the sweep on `cron` (six fields, seconds first).
    pub async fn schedule(self, cron: &str) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Internal(format!("Failed to create scheduler: {}", e)))?;

        let service = self;
        let job = Job::new_async(cron, move |_id, _scheduler| {
            let service = service.clone();
            Box::pin(async move {
                if let Err(e) = service.sweep().await {
                    tracing::error!(error = ?e, "reconciliation sweep failed");
                }
            })
        })
        .map_err(|e| Error::Config(format!("Invalid RECONCILE_CRON {}: {}", cron, e)))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| Error::Internal(format!("Failed to schedule sweep: {}", e)))?;
        scheduler
            .start()
            .await
            .map_err(|e| Error::Internal(format!("Failed to start scheduler: {}", e)))?;
        Ok(scheduler)
    }
}
