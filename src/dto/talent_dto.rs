use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::profile::{
    CandidateProfile, ContractType, CvEducation, CvExperience, ExtendedProfile,
    InterviewQuestions, PortfolioLinks, TalentStatus, TalentTier, WeeklyAvailability,
};
use crate::models::report::InterviewReport;
use crate::services::status_machine::ProfileDetails;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTalentPayload {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadCvPayload {
    #[validate(length(min = 1, max = 255))]
    pub file_name: Option<String>,
    #[validate(length(min = 20, max = 100000))]
    pub cv_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SummarySuggestionsPayload {
    #[validate(length(min = 2, max = 200))]
    pub headline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SubmitProfilePayload {
    #[validate(length(min = 2, max = 200))]
    pub headline: Option<String>,
    #[validate(length(min = 20, max = 5000))]
    pub professional_summary: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub country: Option<String>,
    pub timezone: Option<String>,
    #[validate(range(min = 0, max = 60))]
    pub years_of_experience: Option<i32>,
    #[validate(length(max = 1000))]
    pub tech_stack: Option<String>,
    #[validate(url)]
    pub linkedin: Option<String>,
    #[validate(url)]
    pub github: Option<String>,
    #[validate(range(min = 0))]
    pub expected_monthly_rate_gbp: Option<i32>,
    pub availability: Option<String>,
}

impl From<SubmitProfilePayload> for ProfileDetails {
    fn from(p: SubmitProfilePayload) -> Self {
        Self {
            headline: p.headline,
            professional_summary: p.professional_summary,
            country: p.country,
            timezone: p.timezone,
            years_of_experience: p.years_of_experience,
            tech_stack: p.tech_stack,
            linkedin: p.linkedin,
            github: p.github,
            expected_monthly_rate_gbp: p.expected_monthly_rate_gbp,
            availability: p.availability,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompleteProfilePayload {
    #[validate(url)]
    pub profile_photo_url: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub short_bio: String,
    pub preferred_contract_type: ContractType,
    pub weekly_availability: WeeklyAvailability,
    #[serde(default)]
    pub portfolio_links: PortfolioLinks,
}

impl From<CompleteProfilePayload> for ExtendedProfile {
    fn from(p: CompleteProfilePayload) -> Self {
        Self {
            profile_photo_url: p.profile_photo_url,
            short_bio: p.short_bio,
            preferred_contract_type: p.preferred_contract_type,
            weekly_availability: p.weekly_availability,
            portfolio_links: p.portfolio_links,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentResponse {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub professional_summary: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub years_of_experience: Option<i32>,
    pub tech_stack: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub cv_file_name: Option<String>,
    pub cv_analysis_summary: Option<String>,
    pub cv_skills: Vec<String>,
    pub cv_experience: Vec<CvExperience>,
    pub cv_education: Vec<CvEducation>,
    pub expected_monthly_rate_gbp: Option<i32>,
    pub availability: Option<String>,
    pub status: TalentStatus,
    pub interview_questions: Option<InterviewQuestions>,
    pub has_report: bool,
    pub weighted_total_score: Option<i32>,
    pub talent_tier: Option<TalentTier>,
    pub next_interview_eligible_date: Option<DateTime<Utc>>,
    pub extended: Option<ExtendedProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CandidateProfile> for TalentResponse {
    fn from(p: CandidateProfile) -> Self {
        Self {
            has_report: p.report_summary.is_some(),
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            headline: p.headline,
            professional_summary: p.professional_summary,
            country: p.country,
            timezone: p.timezone,
            years_of_experience: p.years_of_experience,
            tech_stack: p.tech_stack,
            linkedin: p.linkedin,
            github: p.github,
            cv_file_name: p.cv_file_name,
            cv_analysis_summary: p.cv_analysis_summary,
            cv_skills: p.cv_skills,
            cv_experience: p.cv_experience,
            cv_education: p.cv_education,
            expected_monthly_rate_gbp: p.expected_monthly_rate_gbp,
            availability: p.availability,
            status: p.status,
            interview_questions: p.interview_questions,
            weighted_total_score: p.weighted_total_score,
            talent_tier: p.talent_tier,
            next_interview_eligible_date: p.next_interview_eligible_date,
            extended: p.extended,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Report view. Error reports are flagged and carry no score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub profile_id: String,
    pub candidate_name: Option<String>,
    pub headline: Option<String>,
    pub status: TalentStatus,
    pub is_error: bool,
    pub error: Option<String>,
    pub report: Option<InterviewReport>,
    pub weighted_total_score: Option<i32>,
    pub talent_tier: Option<TalentTier>,
    pub next_interview_eligible_date: Option<DateTime<Utc>>,
    pub retake_available_in_secs: Option<i64>,
}

impl ReportResponse {
    /// `None` while no report has been written.
    pub fn from_profile(p: CandidateProfile, now: DateTime<Utc>) -> Option<Self> {
        let summary = p.report_summary?;
        let retake_available_in_secs = match p.talent_tier {
            Some(TalentTier::ReInterviewEligible) => p
                .next_interview_eligible_date
                .map(|at| (at - now).num_seconds().max(0)),
            _ => None,
        };
        Some(Self {
            profile_id: p.id,
            candidate_name: p.full_name,
            headline: p.headline,
            status: p.status,
            is_error: summary.is_error(),
            error: summary.error_message().map(str::to_string),
            report: summary.as_report().cloned(),
            weighted_total_score: p.weighted_total_score,
            talent_tier: p.talent_tier,
            next_interview_eligible_date: p.next_interview_eligible_date,
            retake_available_in_secs,
        })
    }
}
