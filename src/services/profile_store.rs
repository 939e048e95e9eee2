use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Row};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::profile::{
    CandidateProfile, CvEducation, CvExperience, ExtendedProfile, InterviewQuestions,
    TalentStatus, TalentTier,
};
use crate::models::report::ReportSummary;
use crate::utils::time::{Clock, SystemClock};

/// Partial update merged atomically into one profile document.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub status: Option<TalentStatus>,
    pub headline: Option<Option<String>>,
    pub professional_summary: Option<Option<String>>,
    pub country: Option<Option<String>>,
    pub timezone: Option<Option<String>>,
    pub years_of_experience: Option<Option<i32>>,
    pub tech_stack: Option<Option<String>>,
    pub linkedin: Option<Option<String>>,
    pub github: Option<Option<String>>,
    pub expected_monthly_rate_gbp: Option<Option<i32>>,
    pub availability: Option<Option<String>>,
    pub cv_file_name: Option<Option<String>>,
    pub cv_analysis_summary: Option<Option<String>>,
    pub cv_skills: Option<Vec<String>>,
    pub cv_experience: Option<Vec<CvExperience>>,
    pub cv_education: Option<Vec<CvEducation>>,
    pub interview_questions: Option<Option<InterviewQuestions>>,
    pub report_summary: Option<Option<ReportSummary>>,
    pub weighted_total_score: Option<Option<i32>>,
    pub talent_tier: Option<Option<TalentTier>>,
    pub next_interview_eligible_date: Option<Option<DateTime<Utc>>>,
    pub extended: Option<Option<ExtendedProfile>>,
}

impl ProfilePatch {
    pub fn status(status: TalentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Nulls every report field; used whenever a new interview cycle starts.
    pub fn clear_report(mut self) -> Self {
        self.report_summary = Some(None);
        self.weighted_total_score = Some(None);
        self.talent_tier = Some(None);
        self.next_interview_eligible_date = Some(None);
        self
    }

    pub fn apply(self, profile: &mut CandidateProfile, now: DateTime<Utc>) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }

        set(&mut profile.status, self.status);
        set(&mut profile.headline, self.headline);
        set(&mut profile.professional_summary, self.professional_summary);
        set(&mut profile.country, self.country);
        set(&mut profile.timezone, self.timezone);
        set(&mut profile.years_of_experience, self.years_of_experience);
        set(&mut profile.tech_stack, self.tech_stack);
        set(&mut profile.linkedin, self.linkedin);
        set(&mut profile.github, self.github);
        set(
            &mut profile.expected_monthly_rate_gbp,
            self.expected_monthly_rate_gbp,
        );
        set(&mut profile.availability, self.availability);
        set(&mut profile.cv_file_name, self.cv_file_name);
        set(&mut profile.cv_analysis_summary, self.cv_analysis_summary);
        set(&mut profile.cv_skills, self.cv_skills);
        set(&mut profile.cv_experience, self.cv_experience);
        set(&mut profile.cv_education, self.cv_education);
        set(&mut profile.interview_questions, self.interview_questions);
        set(&mut profile.report_summary, self.report_summary);
        set(&mut profile.weighted_total_score, self.weighted_total_score);
        set(&mut profile.talent_tier, self.talent_tier);
        set(
            &mut profile.next_interview_eligible_date,
            self.next_interview_eligible_date,
        );
        set(&mut profile.extended, self.extended);
        profile.updated_at = now;
    }
}

#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Applied(CandidateProfile),
    /// The expected status did not match; nothing was written.
    Rejected { current: TalentStatus },
}

/// Persisted candidate documents keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<CandidateProfile>>;

    /// Full write of a new document. Fails if the id is taken.
    async fn create(&self, profile: CandidateProfile) -> Result<CandidateProfile>;

    /// Atomic merge. When `expected` is set the write only happens if the
    /// stored status still equals it.
    async fn update(
        &self,
        id: &str,
        expected: Option<TalentStatus>,
        patch: ProfilePatch,
    ) -> Result<UpdateOutcome>;

    async fn list(&self) -> Result<Vec<CandidateProfile>>;

    async fn list_by_status(
        &self,
        status: TalentStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<CandidateProfile>>;
}

#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgProfileStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get(&self, id: &str) -> Result<Option<CandidateProfile>> {
        let row = sqlx::query("SELECT document FROM talent_profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<Json<CandidateProfile>, _>("document")?.0)),
            None => Ok(None),
        }
    }

    async fn create(&self, profile: CandidateProfile) -> Result<CandidateProfile> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO talent_profiles (id, status, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&profile.id)
        .bind(profile.status.as_str())
        .bind(Json(&profile))
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_none() {
            return Err(Error::Precondition(format!(
                "Profile {} already exists",
                profile.id
            )));
        }
        Ok(profile)
    }

    async fn update(
        &self,
        id: &str,
        expected: Option<TalentStatus>,
        patch: ProfilePatch,
    ) -> Result<UpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT document FROM talent_profiles WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("Profile {} not found", id)));
        };
        let mut profile = row.try_get::<Json<CandidateProfile>, _>("document")?.0;

        if let Some(expected) = expected {
            if profile.status != expected {
                tx.rollback().await?;
                return Ok(UpdateOutcome::Rejected {
                    current: profile.status,
                });
            }
        }

        patch.apply(&mut profile, self.clock.now());

        sqlx::query(
            r#"
            UPDATE talent_profiles
            SET status = $2, document = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(profile.status.as_str())
        .bind(Json(&profile))
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(UpdateOutcome::Applied(profile))
    }

    async fn list(&self) -> Result<Vec<CandidateProfile>> {
        let rows = sqlx::query("SELECT document FROM talent_profiles ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Ok(row.try_get::<Json<CandidateProfile>, _>("document")?.0))
            .collect()
    }

    async fn list_by_status(
        &self,
        status: TalentStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<CandidateProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT document FROM talent_profiles
            WHERE status = $1 AND updated_at < $2
            ORDER BY updated_at ASC
            "#,
        )
        .bind(status.as_str())
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Ok(row.try_get::<Json<CandidateProfile>, _>("document")?.0))
            .collect()
    }
}

/// In-memory store. Keeps every applied write so callers can inspect history.
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, CandidateProfile>>,
    writes: RwLock<Vec<CandidateProfile>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            writes: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Snapshots of every applied update for one profile, oldest first.
    pub async fn history(&self, id: &str) -> Vec<CandidateProfile> {
        let writes = self.writes.read().await;
        writes.iter().filter(|p| p.id == id).cloned().collect()
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, id: &str) -> Result<Option<CandidateProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(id).cloned())
    }

    async fn create(&self, profile: CandidateProfile) -> Result<CandidateProfile> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.id) {
            return Err(Error::Precondition(format!(
                "Profile {} already exists",
                profile.id
            )));
        }
        profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    async fn update(
        &self,
        id: &str,
        expected: Option<TalentStatus>,
        patch: ProfilePatch,
    ) -> Result<UpdateOutcome> {
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(id) else {
            return Err(Error::NotFound(format!("Profile {} not found", id)));
        };
        if let Some(expected) = expected {
            if profile.status != expected {
                return Ok(UpdateOutcome::Rejected {
                    current: profile.status,
                });
            }
        }
        patch.apply(profile, self.clock.now());
        let snapshot = profile.clone();
        self.writes.write().await.push(snapshot.clone());
        Ok(UpdateOutcome::Applied(snapshot))
    }

    async fn list(&self) -> Result<Vec<CandidateProfile>> {
        let profiles = self.profiles.read().await;
        let mut all: Vec<_> = profiles.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn list_by_status(
        &self,
        status: TalentStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<CandidateProfile>> {
        let profiles = self.profiles.read().await;
        let mut matching: Vec<_> = profiles
            .values()
            .filter(|p| p.status == status && p.updated_at < updated_before)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(matching)
    }
}
