use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::profile::{
    CandidateProfile, ExtendedProfile, InterviewQuestions, TalentStatus, TalentTier,
};
use crate::services::ai_service::{CvAnalysis, QuestionGenerationInput, QuestionGenerator};
use crate::services::profile_store::{ProfilePatch, ProfileStore, UpdateOutcome};
use crate::services::scoring_service::ScoringOutcome;
use crate::utils::time::Clock;

/// Profile fields the candidate edits before submission. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileDetails {
    pub headline: Option<String>,
    pub professional_summary: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub years_of_experience: Option<i32>,
    pub tech_stack: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub expected_monthly_rate_gbp: Option<i32>,
    pub availability: Option<String>,
}

impl ProfileDetails {
    fn into_patch(self) -> ProfilePatch {
        ProfilePatch {
            headline: self.headline.map(Some),
            professional_summary: self.professional_summary.map(Some),
            country: self.country.map(Some),
            timezone: self.timezone.map(Some),
            years_of_experience: self.years_of_experience.map(Some),
            tech_stack: self.tech_stack.map(Some),
            linkedin: self.linkedin.map(Some),
            github: self.github.map(Some),
            expected_monthly_rate_gbp: self.expected_monthly_rate_gbp.map(Some),
            availability: self.availability.map(Some),
            ..Default::default()
        }
    }
}

fn ensure_status(profile: &CandidateProfile, allowed: &[TalentStatus], action: &str) -> Result<()> {
    if allowed.contains(&profile.status) {
        return Ok(());
    }
    Err(Error::Precondition(format!(
        "Cannot {} while status is {}",
        action, profile.status
    )))
}

fn applied(outcome: UpdateOutcome, action: &str) -> Result<CandidateProfile> {
    match outcome {
        UpdateOutcome::Applied(profile) => Ok(profile),
        UpdateOutcome::Rejected { current } => Err(Error::Precondition(format!(
            "Cannot {}: status changed to {}",
            action, current
        ))),
    }
}

/// Only writer of `status`; every transition is a checked write against the
/// status the guard was evaluated on.
#[derive(Clone)]
pub struct StatusMachine {
    store: Arc<dyn ProfileStore>,
    questions: Arc<dyn QuestionGenerator>,
    clock: Arc<dyn Clock>,
}

impl StatusMachine {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        questions: Arc<dyn QuestionGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            questions,
            clock,
        }
    }

    pub async fn create_profile(
        &self,
        id: &str,
        email: Option<String>,
        full_name: Option<String>,
    ) -> Result<CandidateProfile> {
        let profile = CandidateProfile::new(id.to_string(), email, full_name, self.clock.now());
        let created = self.store.create(profile).await?;
        tracing::info!(profile_id = %created.id, status = %created.status, "profile created");
        Ok(created)
    }

    pub async fn get_profile(&self, id: &str) -> Result<CandidateProfile> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Profile {} not found", id)))
    }

    pub async fn attach_cv_analysis(
        &self,
        id: &str,
        file_name: Option<String>,
        analysis: CvAnalysis,
    ) -> Result<CandidateProfile> {
        let profile = self.get_profile(id).await?;
        ensure_status(
            &profile,
            &[TalentStatus::New, TalentStatus::ProfileSubmitted],
            "update the CV",
        )?;

        let summary = Some(analysis.summary).filter(|s| !s.trim().is_empty());
        let patch = ProfilePatch {
            cv_file_name: Some(file_name),
            cv_analysis_summary: Some(summary),
            cv_skills: Some(analysis.skills),
            cv_experience: Some(analysis.experience),
            cv_education: Some(analysis.education),
            ..Default::default()
        };
        let outcome = self.store.update(id, Some(profile.status), patch).await?;
        applied(outcome, "update the CV")
    }

    /// `new → profile_submitted`. Resubmitting edits from `profile_submitted` is allowed.
    pub async fn submit_profile(&self, id: &str, details: ProfileDetails) -> Result<CandidateProfile> {
        let profile = self.get_profile(id).await?;
        ensure_status(
            &profile,
            &[TalentStatus::New, TalentStatus::ProfileSubmitted],
            "submit the profile",
        )?;

        let mut patch = details.into_patch();
        patch.status = Some(TalentStatus::ProfileSubmitted);

        let mut preview = profile.clone();
        patch.clone().apply(&mut preview, self.clock.now());
        if !preview.has_headline_and_summary() {
            return Err(Error::Precondition(
                "A headline and professional summary are required".to_string(),
            ));
        }
        if !preview.has_parsed_cv() {
            return Err(Error::Precondition(
                "Upload a CV and wait for it to be analyzed before submitting".to_string(),
            ));
        }

        let outcome = self.store.update(id, Some(profile.status), patch).await?;
        let submitted = applied(outcome, "submit the profile")?;
        tracing::info!(profile_id = %id, status = %submitted.status, "profile submitted");
        Ok(submitted)
    }

    /// `profile_submitted → interview_invited` with freshly generated questions.
    pub async fn prepare_interview(&self, id: &str) -> Result<CandidateProfile> {
        let profile = self.get_profile(id).await?;
        ensure_status(&profile, &[TalentStatus::ProfileSubmitted], "prepare an interview")?;
        self.invite(profile, "prepare an interview").await
    }

    /// `report_ready → interview_invited` once the cooldown has elapsed.
    pub async fn request_retake(&self, id: &str) -> Result<CandidateProfile> {
        let profile = self.get_profile(id).await?;
        ensure_status(&profile, &[TalentStatus::ReportReady], "retake the interview")?;

        if profile.talent_tier != Some(TalentTier::ReInterviewEligible) {
            return Err(Error::Precondition(
                "Only re-interview eligible candidates can retake the interview".to_string(),
            ));
        }
        let now = self.clock.now();
        match profile.next_interview_eligible_date {
            Some(eligible_at) if now >= eligible_at => {}
            Some(eligible_at) => {
                return Err(Error::Precondition(format!(
                    "Retake available from {}",
                    eligible_at.to_rfc3339()
                )))
            }
            None => {
                return Err(Error::Precondition(
                    "No retake date has been set for this profile".to_string(),
                ))
            }
        }

        self.invite(profile, "retake the interview").await
    }

    async fn invite(&self, profile: CandidateProfile, action: &str) -> Result<CandidateProfile> {
        let skills = profile.skills();
        if !profile.has_headline_and_summary() || skills.is_empty() {
            return Err(Error::Precondition(
                "A headline, professional summary and at least one skill are required".to_string(),
            ));
        }

        let input = QuestionGenerationInput {
            headline: profile.headline.clone().unwrap_or_default(),
            summary: profile.professional_summary.clone().unwrap_or_default(),
            skills,
            experience_summary: profile.experience_summary(),
            role: profile.role_headline().to_string(),
        };
        let questions: InterviewQuestions = match self.questions.generate_questions(&input).await {
            Ok(q) if q.is_complete() => q,
            Ok(_) => {
                return Err(Error::ExternalService(
                    "Question generation did not return all three question categories".to_string(),
                ))
            }
            Err(e) => {
                tracing::error!(profile_id = %profile.id, error = %e, "question generation failed");
                return Err(e);
            }
        };

        let patch = ProfilePatch {
            status: Some(TalentStatus::InterviewInvited),
            interview_questions: Some(Some(questions)),
            ..Default::default()
        }
        .clear_report();

        let outcome = self.store.update(&profile.id, Some(profile.status), patch).await?;
        let invited = applied(outcome, action)?;
        tracing::info!(profile_id = %invited.id, status = %invited.status, "interview prepared");
        Ok(invited)
    }

    /// `report_ready → profile_fully_completed`.
    pub async fn complete_full_profile(
        &self,
        id: &str,
        extended: ExtendedProfile,
    ) -> Result<CandidateProfile> {
        let profile = self.get_profile(id).await?;
        ensure_status(&profile, &[TalentStatus::ReportReady], "complete the profile")?;

        let patch = ProfilePatch {
            status: Some(TalentStatus::ProfileFullyCompleted),
            extended: Some(Some(extended)),
            ..Default::default()
        };
        let outcome = self
            .store
            .update(id, Some(TalentStatus::ReportReady), patch)
            .await?;
        let completed = applied(outcome, "complete the profile")?;
        tracing::info!(profile_id = %id, status = %completed.status, "profile fully completed");
        Ok(completed)
    }

    /// `interview_invited → interview_completed_processing_summary`.
    /// Returns false when the profile already left `interview_invited`.
    pub async fn begin_processing(&self, id: &str) -> Result<bool> {
        let outcome = self
            .store
            .update(
                id,
                Some(TalentStatus::InterviewInvited),
                ProfilePatch::status(TalentStatus::InterviewCompletedProcessingSummary),
            )
            .await?;
        match outcome {
            UpdateOutcome::Applied(_) => Ok(true),
            UpdateOutcome::Rejected { current } => {
                tracing::warn!(profile_id = %id, status = %current, "interview already finalized");
                Ok(false)
            }
        }
    }

    /// Terminal write `interview_completed_processing_summary → report_ready`.
    /// Returns `None` when the profile is no longer processing.
    pub async fn resolve_report(
        &self,
        id: &str,
        outcome: ScoringOutcome,
    ) -> Result<Option<CandidateProfile>> {
        let score = outcome.weighted_total_score;
        let tier = outcome.talent_tier;
        let fallback = outcome.is_fallback();
        let result = self
            .store
            .update(
                id,
                Some(TalentStatus::InterviewCompletedProcessingSummary),
                outcome.into_patch(),
            )
            .await?;
        match result {
            UpdateOutcome::Applied(profile) => {
                tracing::info!(
                    profile_id = %id,
                    status = %profile.status,
                    weighted_total_score = score,
                    tier = %tier,
                    fallback,
                    "report written"
                );
                Ok(Some(profile))
            }
            UpdateOutcome::Rejected { current } => {
                tracing::warn!(profile_id = %id, status = %current, "report discarded, profile is not processing");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{ContractType, PortfolioLinks, WeeklyAvailability};
    use crate::services::ai_service::MockQuestionGenerator;
    use crate::services::profile_store::InMemoryProfileStore;
    use crate::utils::time::ManualClock;
    use chrono::{Duration, Utc};

    fn questions() -> InterviewQuestions {
        InterviewQuestions {
            behavioural_questions: vec!["b".into()],
            situational_questions: vec!["s".into()],
            technical_questions: vec!["t".into()],
        }
    }

    fn generator_returning(q: InterviewQuestions) -> MockQuestionGenerator {
        let mut gen = MockQuestionGenerator::new();
        gen.expect_generate_questions()
            .returning(move |_| Ok(q.clone()));
        gen
    }

    fn cv() -> CvAnalysis {
        CvAnalysis {
            skills: vec!["Rust".into()],
            experience: vec![],
            education: vec![],
            summary: "Backend engineer".into(),
        }
    }

    fn details() -> ProfileDetails {
        ProfileDetails {
            headline: Some("Backend Engineer".into()),
            professional_summary: Some("Builds services".into()),
            ..Default::default()
        }
    }

    async fn machine_with(
        gen: MockQuestionGenerator,
    ) -> (StatusMachine, Arc<InMemoryProfileStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryProfileStore::with_clock(clock.clone()));
        let machine = StatusMachine::new(store.clone(), Arc::new(gen), clock.clone());
        machine.create_profile("u1", None, Some("Ada".into())).await.unwrap();
        (machine, store, clock)
    }

    #[tokio::test]
    async fn submit_requires_parsed_cv() {
        let (machine, _, _) = machine_with(MockQuestionGenerator::new()).await;
        let err = machine.submit_profile("u1", details()).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));

        machine.attach_cv_analysis("u1", Some("cv.pdf".into()), cv()).await.unwrap();
        let profile = machine.submit_profile("u1", details()).await.unwrap();
        assert_eq!(profile.status, TalentStatus::ProfileSubmitted);
    }

    #[tokio::test]
    async fn failed_question_generation_keeps_profile_submitted() {
        let mut gen = MockQuestionGenerator::new();
        gen.expect_generate_questions()
            .returning(|_| Err(Error::ExternalService("model unavailable".into())));
        let (machine, _, _) = machine_with(gen).await;
        machine.attach_cv_analysis("u1", None, cv()).await.unwrap();
        machine.submit_profile("u1", details()).await.unwrap();

        let err = machine.prepare_interview("u1").await.unwrap_err();
        assert!(err.is_retryable());
        let profile = machine.get_profile("u1").await.unwrap();
        assert_eq!(profile.status, TalentStatus::ProfileSubmitted);
        assert!(profile.interview_questions.is_none());
    }

    #[tokio::test]
    async fn prepare_passes_profile_context_to_generator() {
        let mut gen = MockQuestionGenerator::new();
        gen.expect_generate_questions()
            .withf(|input| {
                input.role == "Backend Engineer"
                    && input.skills == vec!["Rust".to_string()]
                    && input.experience_summary == "Backend engineer"
            })
            .times(1)
            .returning(|_| Ok(questions()));
        let (machine, _, _) = machine_with(gen).await;
        machine.attach_cv_analysis("u1", None, cv()).await.unwrap();
        machine.submit_profile("u1", details()).await.unwrap();

        let profile = machine.prepare_interview("u1").await.unwrap();
        assert_eq!(profile.status, TalentStatus::InterviewInvited);
        assert_eq!(profile.interview_questions, Some(questions()));
    }

    #[tokio::test]
    async fn prepare_from_new_is_rejected() {
        let (machine, _, _) = machine_with(MockQuestionGenerator::new()).await;
        let err = machine.prepare_interview("u1").await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[tokio::test]
    async fn begin_processing_only_applies_once() {
        let (machine, _, _) = machine_with(generator_returning(questions())).await;
        machine.attach_cv_analysis("u1", None, cv()).await.unwrap();
        machine.submit_profile("u1", details()).await.unwrap();
        machine.prepare_interview("u1").await.unwrap();

        assert!(machine.begin_processing("u1").await.unwrap());
        assert!(!machine.begin_processing("u1").await.unwrap());
    }

    #[tokio::test]
    async fn retake_respects_cooldown_and_clears_report() {
        let (machine, _, clock) = machine_with(generator_returning(questions())).await;
        machine.attach_cv_analysis("u1", None, cv()).await.unwrap();
        machine.submit_profile("u1", details()).await.unwrap();
        machine.prepare_interview("u1").await.unwrap();
        machine.begin_processing("u1").await.unwrap();
        machine
            .resolve_report("u1", ScoringOutcome::fallback("boom", clock.now()))
            .await
            .unwrap();

        clock.advance(Duration::minutes(59));
        let err = machine.request_retake("u1").await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));

        clock.advance(Duration::minutes(1));
        let profile = machine.request_retake("u1").await.unwrap();
        assert_eq!(profile.status, TalentStatus::InterviewInvited);
        assert_eq!(profile.weighted_total_score, None);
        assert_eq!(profile.talent_tier, None);
        assert_eq!(profile.next_interview_eligible_date, None);
        assert_eq!(profile.report_summary, None);
    }

    #[tokio::test]
    async fn complete_full_profile_needs_report() {
        let (machine, _, clock) = machine_with(generator_returning(questions())).await;
        let extended = ExtendedProfile {
            profile_photo_url: None,
            short_bio: "Hi".into(),
            preferred_contract_type: ContractType::FullTime,
            weekly_availability: WeeklyAvailability::FortyPlus,
            portfolio_links: PortfolioLinks::default(),
        };
        let err = machine
            .complete_full_profile("u1", extended.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));

        machine.attach_cv_analysis("u1", None, cv()).await.unwrap();
        machine.submit_profile("u1", details()).await.unwrap();
        machine.prepare_interview("u1").await.unwrap();
        machine.begin_processing("u1").await.unwrap();
        machine
            .resolve_report("u1", ScoringOutcome::fallback("boom", clock.now()))
            .await
            .unwrap();

        let profile = machine.complete_full_profile("u1", extended).await.unwrap();
        assert_eq!(profile.status, TalentStatus::ProfileFullyCompleted);
        assert!(profile.extended.is_some());
    }

    #[tokio::test]
    async fn resolve_report_ignores_profiles_not_processing() {
        let (machine, store, clock) = machine_with(MockQuestionGenerator::new()).await;
        let written = machine
            .resolve_report("u1", ScoringOutcome::fallback("late", clock.now()))
            .await
            .unwrap();
        assert!(written.is_none());
        assert!(store.history("u1").await.is_empty());
    }
}
