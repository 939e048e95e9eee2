use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::report::{CategoryScore, ReportSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Talent,
    Recruiter,
}

/// Candidate lifecycle status. Only the status machine writes this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TalentStatus {
    New,
    ProfileSubmitted,
    InterviewInvited,
    InterviewCompletedProcessingSummary,
    ReportReady,
    ProfileFullyCompleted,
}

impl TalentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TalentStatus::New => "new",
            TalentStatus::ProfileSubmitted => "profile_submitted",
            TalentStatus::InterviewInvited => "interview_invited",
            TalentStatus::InterviewCompletedProcessingSummary => {
                "interview_completed_processing_summary"
            }
            TalentStatus::ReportReady => "report_ready",
            TalentStatus::ProfileFullyCompleted => "profile_fully_completed",
        }
    }
}

impl fmt::Display for TalentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TalentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TalentStatus::New),
            "profile_submitted" => Ok(TalentStatus::ProfileSubmitted),
            "interview_invited" => Ok(TalentStatus::InterviewInvited),
            "interview_completed_processing_summary" => {
                Ok(TalentStatus::InterviewCompletedProcessingSummary)
            }
            "report_ready" => Ok(TalentStatus::ReportReady),
            "profile_fully_completed" => Ok(TalentStatus::ProfileFullyCompleted),
            other => Err(format!("unknown talent status: {}", other)),
        }
    }
}

/// Outcome bucket derived from the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TalentTier {
    Priority,
    Verified,
    ManualReview,
    ReInterviewEligible,
}

impl TalentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TalentTier::Priority => "priority",
            TalentTier::Verified => "verified",
            TalentTier::ManualReview => "manual_review",
            TalentTier::ReInterviewEligible => "re_interview_eligible",
        }
    }
}

impl fmt::Display for TalentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TalentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(TalentTier::Priority),
            "verified" => Ok(TalentTier::Verified),
            "manual_review" => Ok(TalentTier::ManualReview),
            "re_interview_eligible" => Ok(TalentTier::ReInterviewEligible),
            other => Err(format!("unknown talent tier: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterviewQuestions {
    #[serde(alias = "behaviouralQuestions")]
    pub behavioural_questions: Vec<String>,
    #[serde(alias = "situationalQuestions")]
    pub situational_questions: Vec<String>,
    #[serde(alias = "technicalQuestions")]
    pub technical_questions: Vec<String>,
}

impl InterviewQuestions {
    /// All three lists carry at least one non-blank question.
    pub fn is_complete(&self) -> bool {
        let filled = |qs: &[String]| qs.iter().any(|q| !q.trim().is_empty());
        filled(&self.behavioural_questions)
            && filled(&self.situational_questions)
            && filled(&self.technical_questions)
    }

    pub fn is_empty(&self) -> bool {
        self.behavioural_questions.is_empty()
            && self.situational_questions.is_empty()
            && self.technical_questions.is_empty()
    }

    /// Numbered sections, skipping empty lists.
    pub fn render_numbered(&self) -> String {
        let sections = [
            ("Behavioural", &self.behavioural_questions),
            ("Situational", &self.situational_questions),
            ("Technical", &self.technical_questions),
        ];
        sections
            .iter()
            .filter(|(_, qs)| !qs.is_empty())
            .map(|(label, qs)| {
                let lines = qs
                    .iter()
                    .enumerate()
                    .map(|(i, q)| format!("{}. {}", i + 1, q))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{} Questions:\n{}", label, lines)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvExperience {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub dates: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvEducation {
    pub degree: String,
    pub institution: String,
    #[serde(default)]
    pub dates: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    FullTime,
    PartTime,
    ContractFreelance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeeklyAvailability {
    #[serde(rename = "<10hrs")]
    UnderTen,
    #[serde(rename = "10-20hrs")]
    TenToTwenty,
    #[serde(rename = "20-30hrs")]
    TwentyToThirty,
    #[serde(rename = "30-40hrs")]
    ThirtyToForty,
    #[serde(rename = "40+hrs")]
    FortyPlus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLinks {
    pub behance: Option<String>,
    pub dribbble: Option<String>,
    pub personal_site: Option<String>,
    pub other: Option<String>,
}

/// Fields collected after the report, when the candidate completes the full profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProfile {
    pub profile_photo_url: Option<String>,
    pub short_bio: String,
    pub preferred_contract_type: ContractType,
    pub weekly_availability: WeeklyAvailability,
    #[serde(default)]
    pub portfolio_links: PortfolioLinks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
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
    #[serde(default)]
    pub cv_skills: Vec<String>,
    #[serde(default)]
    pub cv_experience: Vec<CvExperience>,
    #[serde(default)]
    pub cv_education: Vec<CvEducation>,
    pub expected_monthly_rate_gbp: Option<i32>,
    pub availability: Option<String>,
    pub status: TalentStatus,
    pub interview_questions: Option<InterviewQuestions>,
    pub report_summary: Option<ReportSummary>,
    pub weighted_total_score: Option<i32>,
    pub talent_tier: Option<TalentTier>,
    pub next_interview_eligible_date: Option<DateTime<Utc>>,
    pub extended: Option<ExtendedProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateProfile {
    pub fn new(
        id: String,
        email: Option<String>,
        full_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            full_name,
            headline: None,
            professional_summary: None,
            country: None,
            timezone: None,
            years_of_experience: None,
            tech_stack: None,
            linkedin: None,
            github: None,
            cv_file_name: None,
            cv_analysis_summary: None,
            cv_skills: Vec::new(),
            cv_experience: Vec::new(),
            cv_education: Vec::new(),
            expected_monthly_rate_gbp: None,
            availability: None,
            status: TalentStatus::New,
            interview_questions: None,
            report_summary: None,
            weighted_total_score: None,
            talent_tier: None,
            next_interview_eligible_date: None,
            extended: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Candidate")
    }

    pub fn role_headline(&self) -> &str {
        self.headline
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or("Role")
    }

    /// CV skills plus the comma-separated tech stack, trimmed, in that order.
    pub fn skills(&self) -> Vec<String> {
        let stack = self
            .tech_stack
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self.cv_skills
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .chain(stack)
            .collect()
    }

    /// One line per CV role, falling back to the CV analysis summary.
    pub fn experience_summary(&self) -> String {
        if self.cv_experience.is_empty() {
            return self.cv_analysis_summary.clone().unwrap_or_default();
        }
        self.cv_experience
            .iter()
            .map(|e| format!("{} at {}: {}", e.title, e.company, e.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn category_scores(&self) -> Option<&[CategoryScore]> {
        match &self.report_summary {
            Some(ReportSummary::Completed(report)) => Some(&report.category_scores),
            _ => None,
        }
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

impl CandidateProfile {
    pub fn has_headline_and_summary(&self) -> bool {
        has_text(&self.headline) && has_text(&self.professional_summary)
    }

    pub fn has_parsed_cv(&self) -> bool {
        has_text(&self.cv_analysis_summary)
    }
}
