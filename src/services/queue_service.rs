use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::scoring_job::{JobStatus, ScoringJob, ScoringRequest};
use crate::services::scoring_service::ScoringEngine;
use crate::services::status_machine::StatusMachine;
use crate::utils::time::Clock;

/// Durable handoff between finalize and the scoring worker.
#[async_trait]
pub trait ScoringQueue: Send + Sync {
    async fn enqueue(&self, request: ScoringRequest) -> Result<Uuid>;

    /// Oldest pending job, moved to `running` with its attempt counter bumped.
    async fn claim_next(&self) -> Result<Option<ScoringJob>>;

    async fn complete(&self, id: Uuid) -> Result<()>;

    /// Back to `pending` for another attempt.
    async fn retry(&self, id: Uuid, error: &str) -> Result<()>;

    async fn fail(&self, id: Uuid, error: &str) -> Result<()>;

    async fn has_open_job(&self, profile_id: &str) -> Result<bool>;

    /// Running jobs started before the cutoff go back to `pending`; those out of
    /// attempts are failed and returned.
    async fn requeue_stale(
        &self,
        started_before: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Vec<ScoringJob>>;

    async fn get(&self, id: Uuid) -> Result<Option<ScoringJob>>;
}

const STALE_ERROR: &str = "scoring attempts exhausted";

#[derive(Clone)]
pub struct PgScoringQueue {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgScoringQueue {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

fn job_from_row(row: &PgRow) -> Result<ScoringJob> {
    let status: String = row.try_get("status")?;
    Ok(ScoringJob {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        request: row.try_get::<Json<ScoringRequest>, _>("request")?.0,
        status: status.parse().map_err(Error::Internal)?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

const JOB_COLUMNS: &str =
    "id, profile_id, request, status, attempts, last_error, created_at, started_at, finished_at";

#[async_trait]
impl ScoringQueue for PgScoringQueue {
    async fn enqueue(&self, request: ScoringRequest) -> Result<Uuid> {
        let job = ScoringJob::new(request, self.clock.now());
        sqlx::query(
            r#"
            INSERT INTO scoring_jobs (id, profile_id, request, status, attempts, created_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            "#,
        )
        .bind(job.id)
        .bind(&job.profile_id)
        .bind(Json(&job.request))
        .bind(JobStatus::Pending.as_str())
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(job.id)
    }

    async fn claim_next(&self) -> Result<Option<ScoringJob>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE scoring_jobs SET status = 'running', started_at = $1, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM scoring_jobs WHERE status = 'pending'
                ORDER BY created_at ASC FOR UPDATE SKIP LOCKED LIMIT 1
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE scoring_jobs SET status = 'succeeded', finished_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn retry(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scoring_jobs SET status = 'pending', last_error = $2, started_at = NULL WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scoring_jobs SET status = 'failed', last_error = $2, finished_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn has_open_job(&self, profile_id: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM scoring_jobs
                WHERE profile_id = $1 AND status IN ('pending', 'running')
            ) AS open
            "#,
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("open")?)
    }

    async fn requeue_stale(
        &self,
        started_before: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Vec<ScoringJob>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE scoring_jobs SET status = 'pending', started_at = NULL
            WHERE status = 'running' AND started_at < $1 AND attempts < $2
            "#,
        )
        .bind(started_before)
        .bind(max_attempts)
        .execute(&mut *tx)
        .await?;

        let rows = sqlx::query(&format!(
            r#"
            UPDATE scoring_jobs SET status = 'failed', last_error = $3, finished_at = $4
            WHERE status = 'running' AND started_at < $1 AND attempts >= $2
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(started_before)
        .bind(max_attempts)
        .bind(STALE_ERROR)
        .bind(self.clock.now())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScoringJob>> {
        let row = sqlx::query(&format!("SELECT {} FROM scoring_jobs WHERE id = $1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }
}

pub struct InMemoryScoringQueue {
    jobs: Mutex<Vec<ScoringJob>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryScoringQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            clock,
        }
    }

    pub async fn jobs(&self) -> Vec<ScoringJob> {
        self.jobs.lock().await.clone()
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| Error::NotFound(format!("Scoring job {} not found", id)))?;
        job.status = status;
        if let Some(error) = error {
            job.last_error = Some(error.to_string());
        }
        match status {
            JobStatus::Pending => job.started_at = None,
            JobStatus::Succeeded | JobStatus::Failed => job.finished_at = Some(now),
            JobStatus::Running => {}
        }
        Ok(())
    }
}

#[async_trait]
impl ScoringQueue for InMemoryScoringQueue {
    async fn enqueue(&self, request: ScoringRequest) -> Result<Uuid> {
        let job = ScoringJob::new(request, self.clock.now());
        let id = job.id;
        self.jobs.lock().await.push(job);
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<ScoringJob>> {
        let now = self.clock.now();
        let mut jobs = self.jobs.lock().await;
        let next = jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.created_at);
        Ok(next.map(|job| {
            job.status = JobStatus::Running;
            job.started_at = Some(now);
            job.attempts += 1;
            job.clone()
        }))
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        self.set_status(id, JobStatus::Succeeded, None).await
    }

    async fn retry(&self, id: Uuid, error: &str) -> Result<()> {
        self.set_status(id, JobStatus::Pending, Some(error)).await
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        self.set_status(id, JobStatus::Failed, Some(error)).await
    }

    async fn has_open_job(&self, profile_id: &str) -> Result<bool> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .iter()
            .any(|j| j.profile_id == profile_id && j.status.is_open()))
    }

    async fn requeue_stale(
        &self,
        started_before: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Vec<ScoringJob>> {
        let now = self.clock.now();
        let mut jobs = self.jobs.lock().await;
        let mut exhausted = Vec::new();
        for job in jobs.iter_mut().filter(|j| {
            j.status == JobStatus::Running && j.started_at.map_or(false, |s| s < started_before)
        }) {
            if job.attempts < max_attempts {
                job.status = JobStatus::Pending;
                job.started_at = None;
            } else {
                job.status = JobStatus::Failed;
                job.last_error = Some(STALE_ERROR.to_string());
                job.finished_at = Some(now);
                exhausted.push(job.clone());
            }
        }
        Ok(exhausted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScoringJob>> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|j| j.id == id).cloned())
    }
}

/// Consumes scoring jobs: score, write the terminal report, close the job.
#[derive(Clone)]
pub struct ScoringWorker {
    queue: Arc<dyn ScoringQueue>,
    engine: ScoringEngine,
    machine: StatusMachine,
    signal: Arc<Notify>,
    max_attempts: i32,
}

impl ScoringWorker {
    pub fn new(
        queue: Arc<dyn ScoringQueue>,
        engine: ScoringEngine,
        machine: StatusMachine,
        signal: Arc<Notify>,
        max_attempts: i32,
    ) -> Self {
        Self {
            queue,
            engine,
            machine,
            signal,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Processes at most one job. Returns false when the queue was empty.
    pub async fn run_once(&self) -> Result<bool> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(false);
        };
        tracing::info!(job_id = %job.id, profile_id = %job.profile_id, attempt = job.attempts, "scoring job claimed");

        let outcome = self.engine.score(&job.request).await;

        match self.machine.resolve_report(&job.profile_id, outcome).await {
            Ok(Some(_)) => {
                self.queue.complete(job.id).await?;
            }
            Ok(None) => {
                tracing::warn!(job_id = %job.id, profile_id = %job.profile_id, "stale scoring job closed");
                self.queue.complete(job.id).await?;
            }
            Err(e) if job.attempts < self.max_attempts => {
                tracing::error!(job_id = %job.id, error = %e, "report write failed, retrying");
                self.queue.retry(job.id, &e.to_string()).await?;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "report write failed, giving up");
                self.queue.fail(job.id, &e.to_string()).await?;
            }
        }
        Ok(true)
    }

    /// Runs until the queue is empty.
    pub async fn drain(&self) -> Result<usize> {
        let mut processed = 0;
        while self.run_once().await? {
            processed += 1;
        }
        Ok(processed)
    }

    pub async fn run(self) {
        loop {
            match self.run_once().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = self.signal.notified() => {}
                        _ = tokio::time::sleep(Duration::from_millis(750)) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "scoring worker error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
