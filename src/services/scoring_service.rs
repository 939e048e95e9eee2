use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::models::profile::{InterviewQuestions, TalentStatus, TalentTier};
use crate::models::report::{CategoryScore, InterviewReport, ReportSummary, CANONICAL_CATEGORIES};
use crate::models::scoring_job::ScoringRequest;
use crate::services::ai_service::{RawInterviewSummary, SummaryGenerationInput, SummaryGenerator};
use crate::services::profile_store::ProfilePatch;
use crate::utils::time::Clock;

/// Category weights in tenths, aligned with `CANONICAL_CATEGORIES`.
const WEIGHTS_IN_TENTHS: [f64; 4] = [3.0, 4.0, 2.0, 1.0];

pub const PRIORITY_THRESHOLD: i32 = 90;
pub const VERIFIED_THRESHOLD: i32 = 85;
pub const MANUAL_REVIEW_THRESHOLD: i32 = 80;

pub const INTERVIEWER_LABEL: &str = "AI Interview Conductor";

pub const EMPTY_TRANSCRIPT_MESSAGE: &str =
    "Interview ended prematurely with no interaction recorded.";
pub const SCHEMA_MISMATCH_MESSAGE: &str =
    "AI failed to generate a valid summary report or it did not match the expected schema (4 categories).";
pub const INTERRUPTED_MESSAGE: &str =
    "Interview processing was interrupted before a report could be generated.";

const SUMMARY_TIMEOUT: StdDuration = StdDuration::from_secs(180);

pub fn retake_cooldown() -> Duration {
    Duration::hours(1)
}

/// Numbers pass through, numeric strings are parsed, everything else is 0.
pub fn coerce_score(value: &JsonValue) -> f64 {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
        JsonValue::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// `round(0.30c + 0.40t + 0.20p + 0.10w)`, half-up, clamped to `[0, 100]`.
///
/// Summing in tenths keeps integer inputs exact so `.5` totals round up.
pub fn weighted_total(scores: [f64; 4]) -> i32 {
    let tenths: f64 = scores
        .iter()
        .zip(WEIGHTS_IN_TENTHS.iter())
        .map(|(score, weight)| score * weight)
        .sum();
    let rounded = ((tenths + 5.0) / 10.0).floor();
    if !rounded.is_finite() {
        return 0;
    }
    rounded.clamp(0.0, 100.0) as i32
}

pub fn tier_for(score: i32) -> TalentTier {
    if score >= PRIORITY_THRESHOLD {
        TalentTier::Priority
    } else if score >= VERIFIED_THRESHOLD {
        TalentTier::Verified
    } else if score >= MANUAL_REVIEW_THRESHOLD {
        TalentTier::ManualReview
    } else {
        TalentTier::ReInterviewEligible
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    pub report: ReportSummary,
    pub weighted_total_score: i32,
    pub talent_tier: TalentTier,
    pub next_interview_eligible_date: Option<DateTime<Utc>>,
}

impl ScoringOutcome {
    /// Error report, zero score, lowest tier, cooldown from `now`.
    pub fn fallback(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            report: ReportSummary::failed(message),
            weighted_total_score: 0,
            talent_tier: TalentTier::ReInterviewEligible,
            next_interview_eligible_date: Some(now + retake_cooldown()),
        }
    }

    /// Weights the coerced scores; the report only carries their rounded form.
    pub fn from_summary(summary: NormalizedSummary, now: DateTime<Utc>) -> Self {
        let NormalizedSummary { report, scores } = summary;
        let weighted_total_score = weighted_total(scores);
        let talent_tier = tier_for(weighted_total_score);
        let next_interview_eligible_date = match talent_tier {
            TalentTier::ReInterviewEligible => Some(now + retake_cooldown()),
            _ => None,
        };
        Self {
            report: ReportSummary::Completed(report),
            weighted_total_score,
            talent_tier,
            next_interview_eligible_date,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.report.is_error()
    }

    /// The single terminal write: report, score, tier, cooldown and `report_ready`.
    pub fn into_patch(self) -> ProfilePatch {
        ProfilePatch {
            status: Some(TalentStatus::ReportReady),
            report_summary: Some(Some(self.report)),
            weighted_total_score: Some(Some(self.weighted_total_score)),
            talent_tier: Some(Some(self.talent_tier)),
            next_interview_eligible_date: Some(self.next_interview_eligible_date),
            ..Default::default()
        }
    }
}

/// Question context prepended to the transcript so grading is not transcript-only.
pub fn question_context(questions: &InterviewQuestions) -> String {
    let mut context =
        String::from("The interview was intended to cover the following areas and questions:\n");
    if questions.is_empty() {
        context.push_str("General interview questions based on profile were asked.\n");
        return context;
    }
    let numbered = |qs: &[String]| {
        qs.iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {}", i + 1, q))
            .collect::<Vec<_>>()
            .join("\n")
    };
    context.push_str(&format!(
        "Behavioural:\n{}\n\nSituational:\n{}\n\nTechnical:\n{}\n",
        numbered(&questions.behavioural_questions),
        numbered(&questions.situational_questions),
        numbered(&questions.technical_questions),
    ));
    context
}

pub fn summary_input(request: &ScoringRequest) -> SummaryGenerationInput {
    SummaryGenerationInput {
        candidate_name: request.candidate_name.clone(),
        job_title: request.headline.clone(),
        interviewer_label: INTERVIEWER_LABEL.to_string(),
        interview_date: request.ended_at.format("%Y-%m-%d").to_string(),
        transcript_with_context: format!(
            "{}\nInterview Transcript:\n{}",
            question_context(&request.questions),
            request.transcript.render()
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSummary {
    pub report: InterviewReport,
    /// Coerced category scores in canonical order, before display rounding.
    pub scores: [f64; 4],
}

/// Exactly four categories; names are forced to the canonical list by position.
pub fn normalize_summary(raw: RawInterviewSummary) -> Option<NormalizedSummary> {
    if raw.category_scores.len() != CANONICAL_CATEGORIES.len() {
        tracing::warn!(
            categories = raw.category_scores.len(),
            "summary did not contain exactly four category scores"
        );
        return None;
    }

    let mut scores = [0.0; 4];
    let category_scores = raw
        .category_scores
        .into_iter()
        .zip(CANONICAL_CATEGORIES.iter())
        .zip(scores.iter_mut())
        .map(|((category, canonical), slot)| {
            if category.name != *canonical {
                tracing::warn!(
                    expected = %canonical,
                    got = %category.name,
                    "category name mismatch, using canonical name"
                );
            }
            *slot = coerce_score(&category.score);
            CategoryScore {
                name: canonical.to_string(),
                score: slot.round() as i32,
                comment: category.comment,
            }
        })
        .collect();

    Some(NormalizedSummary {
        report: InterviewReport {
            category_scores,
            strengths: raw.strengths,
            areas_for_improvement: raw.areas_for_improvement,
            final_assessment: raw.final_assessment,
        },
        scores,
    })
}

fn failure_reason(err: &Error) -> String {
    match err {
        Error::ExternalService(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct ScoringEngine {
    summaries: Arc<dyn SummaryGenerator>,
    clock: Arc<dyn Clock>,
    timeout: StdDuration,
}

impl ScoringEngine {
    pub fn new(summaries: Arc<dyn SummaryGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            summaries,
            clock,
            timeout: SUMMARY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fallback(&self, message: impl Into<String>) -> ScoringOutcome {
        ScoringOutcome::fallback(message, self.clock.now())
    }

    /// Always produces an outcome; every failure becomes the fallback report.
    pub async fn score(&self, request: &ScoringRequest) -> ScoringOutcome {
        if request.transcript.is_empty() {
            tracing::warn!(profile_id = %request.profile_id, "empty transcript, skipping summary generation");
            return self.fallback(EMPTY_TRANSCRIPT_MESSAGE);
        }

        let input = summary_input(request);
        let result = tokio::time::timeout(self.timeout, self.summaries.generate_summary(&input)).await;

        let raw = match result {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::error!(profile_id = %request.profile_id, error = %e, "summary generation failed");
                return self.fallback(format!(
                    "AI summary generation failed: {}",
                    failure_reason(&e)
                ));
            }
            Err(_) => {
                tracing::error!(profile_id = %request.profile_id, "summary generation timed out");
                return self.fallback("AI summary generation failed: timed out");
            }
        };

        match normalize_summary(raw) {
            Some(summary) => {
                let outcome = ScoringOutcome::from_summary(summary, self.clock.now());
                tracing::info!(
                    profile_id = %request.profile_id,
                    weighted_total_score = outcome.weighted_total_score,
                    tier = %outcome.talent_tier,
                    "interview scored"
                );
                outcome
            }
            None => self.fallback(SCHEMA_MISMATCH_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transcript::{Speaker, Transcript};
    use crate::services::ai_service::{MockSummaryGenerator, RawCategoryScore};
    use crate::utils::time::ManualClock;
    use async_trait::async_trait;
    use serde_json::json;

    fn raw(scores: [JsonValue; 4], names: [&str; 4]) -> RawInterviewSummary {
        RawInterviewSummary {
            category_scores: scores
                .into_iter()
                .zip(names)
                .map(|(score, name)| RawCategoryScore {
                    name: name.to_string(),
                    score,
                    comment: "c".into(),
                })
                .collect(),
            strengths: vec!["a".into(), "b".into()],
            areas_for_improvement: vec!["c".into(), "d".into()],
            final_assessment: "done".into(),
        }
    }

    fn request(transcript: Transcript) -> ScoringRequest {
        ScoringRequest {
            profile_id: "u1".into(),
            session_id: "call-1".into(),
            candidate_name: "Ada".into(),
            headline: "Backend Engineer".into(),
            questions: InterviewQuestions {
                behavioural_questions: vec!["Tell me about yourself".into()],
                situational_questions: vec!["A deadline slips".into()],
                technical_questions: vec!["Explain ownership".into()],
            },
            transcript,
            ended_at: "2026-03-04T10:00:00Z".parse().unwrap(),
        }
    }

    fn spoken() -> Transcript {
        let mut t = Transcript::default();
        t.push(Speaker::Ai, "Tell me about yourself");
        t.push(Speaker::Candidate, "I am an engineer...");
        t
    }

    #[test]
    fn weighted_total_matches_formula() {
        assert_eq!(weighted_total([100.0, 100.0, 100.0, 100.0]), 100);
        assert_eq!(weighted_total([0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(weighted_total([80.0, 90.0, 70.0, 60.0]), 80);
        // 25.5 + 34 + 17 + 9 = 85.5 rounds half-up
        assert_eq!(weighted_total([85.0, 85.0, 85.0, 90.0]), 86);
        assert_eq!(weighted_total([81.0, 81.0, 81.0, 83.0]), 81);
    }

    #[test]
    fn weighted_total_is_always_in_range() {
        for c in (0..=100).step_by(7) {
            for t in (0..=100).step_by(11) {
                for p in (0..=100).step_by(13) {
                    for w in (0..=100).step_by(17) {
                        let score =
                            weighted_total([c as f64, t as f64, p as f64, w as f64]);
                        let exact = 0.3 * c as f64 + 0.4 * t as f64 + 0.2 * p as f64 + 0.1 * w as f64;
                        assert!((0..=100).contains(&score));
                        assert!((score as f64 - exact).abs() <= 0.5 + 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn non_finite_totals_become_zero() {
        assert_eq!(weighted_total([f64::NAN, 50.0, 50.0, 50.0]), 0);
        assert_eq!(weighted_total([f64::INFINITY, 0.0, 0.0, 0.0]), 0);
    }

    #[test]
    fn tiers_partition_the_range() {
        assert_eq!(tier_for(100), TalentTier::Priority);
        assert_eq!(tier_for(90), TalentTier::Priority);
        assert_eq!(tier_for(89), TalentTier::Verified);
        assert_eq!(tier_for(85), TalentTier::Verified);
        assert_eq!(tier_for(84), TalentTier::ManualReview);
        assert_eq!(tier_for(80), TalentTier::ManualReview);
        assert_eq!(tier_for(79), TalentTier::ReInterviewEligible);
        assert_eq!(tier_for(0), TalentTier::ReInterviewEligible);
    }

    #[test]
    fn scores_are_coerced_to_numbers() {
        assert_eq!(coerce_score(&json!(72)), 72.0);
        assert_eq!(coerce_score(&json!("64")), 64.0);
        assert_eq!(coerce_score(&json!("high")), 0.0);
        assert_eq!(coerce_score(&json!(null)), 0.0);
        assert_eq!(coerce_score(&json!({"value": 3})), 0.0);
    }

    #[test]
    fn only_lowest_tier_sets_cooldown() {
        let now = Utc::now();
        let fallback = ScoringOutcome::fallback("boom", now);
        assert_eq!(fallback.weighted_total_score, 0);
        assert_eq!(fallback.talent_tier, TalentTier::ReInterviewEligible);
        assert_eq!(fallback.next_interview_eligible_date, Some(now + Duration::hours(1)));

        let summary = normalize_summary(raw(
            [json!(95), json!(95), json!(95), json!(95)],
            CANONICAL_CATEGORIES,
        ))
        .unwrap();
        let outcome = ScoringOutcome::from_summary(summary, now);
        assert_eq!(outcome.talent_tier, TalentTier::Priority);
        assert_eq!(outcome.next_interview_eligible_date, None);
    }

    #[test]
    fn question_context_lists_numbered_sections() {
        let req = request(spoken());
        let input = summary_input(&req);
        assert_eq!(input.interview_date, "2026-03-04");
        assert_eq!(input.interviewer_label, INTERVIEWER_LABEL);
        assert_eq!(
            input.transcript_with_context,
            "The interview was intended to cover the following areas and questions:\n\
             Behavioural:\n1. Tell me about yourself\n\n\
             Situational:\n1. A deadline slips\n\n\
             Technical:\n1. Explain ownership\n\n\
             Interview Transcript:\n\
             AI: Tell me about yourself\nYou: I am an engineer..."
        );
    }

    #[tokio::test]
    async fn misnamed_categories_are_reassigned_by_position() {
        let mut summaries = MockSummaryGenerator::new();
        summaries.expect_generate_summary().times(1).returning(|_| {
            Ok(raw(
                [json!(90), json!("80"), json!(70), json!("n/a")],
                ["Tech", "Comms", "Culture", "Problems"],
            ))
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = ScoringEngine::new(Arc::new(summaries), clock);

        let outcome = engine.score(&request(spoken())).await;

        let report = outcome.report.as_report().expect("completed report");
        let names: Vec<_> = report.category_scores.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, CANONICAL_CATEGORIES.to_vec());
        let scores: Vec<_> = report.category_scores.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![90, 80, 70, 0]);
        // 27 + 32 + 14 + 0
        assert_eq!(outcome.weighted_total_score, 73);
        assert_eq!(outcome.talent_tier, TalentTier::ReInterviewEligible);
    }

    #[tokio::test]
    async fn fractional_scores_are_weighted_before_rounding() {
        let mut summaries = MockSummaryGenerator::new();
        summaries.expect_generate_summary().returning(|_| {
            Ok(raw(
                [json!(81.4), json!("90.4"), json!(80.4), json!(80.4)],
                CANONICAL_CATEGORIES,
            ))
        });
        let engine = ScoringEngine::new(
            Arc::new(summaries),
            Arc::new(ManualClock::new(Utc::now())),
        );

        let outcome = engine.score(&request(spoken())).await;

        let report = outcome.report.as_report().expect("completed report");
        let shown: Vec<_> = report.category_scores.iter().map(|c| c.score).collect();
        assert_eq!(shown, vec![81, 90, 80, 80]);
        // 24.42 + 36.16 + 16.08 + 8.04 = 84.7; the rounded scores alone give 84.3
        assert_eq!(outcome.weighted_total_score, 85);
        assert_eq!(outcome.talent_tier, TalentTier::Verified);
    }

    #[tokio::test]
    async fn wrong_category_count_falls_back() {
        let mut summaries = MockSummaryGenerator::new();
        summaries.expect_generate_summary().returning(|_| {
            let mut r = raw(
                [json!(90), json!(90), json!(90), json!(90)],
                CANONICAL_CATEGORIES,
            );
            r.category_scores.pop();
            Ok(r)
        });
        let now = Utc::now();
        let engine = ScoringEngine::new(Arc::new(summaries), Arc::new(ManualClock::new(now)));

        let outcome = engine.score(&request(spoken())).await;

        assert_eq!(outcome.report.error_message(), Some(SCHEMA_MISMATCH_MESSAGE));
        assert_eq!(outcome.next_interview_eligible_date, Some(now + Duration::hours(1)));
    }

    #[tokio::test]
    async fn generator_error_is_absorbed_into_fallback() {
        let mut summaries = MockSummaryGenerator::new();
        summaries
            .expect_generate_summary()
            .returning(|_| Err(Error::ExternalService("rate limited".into())));
        let engine = ScoringEngine::new(
            Arc::new(summaries),
            Arc::new(ManualClock::new(Utc::now())),
        );

        let outcome = engine.score(&request(spoken())).await;

        assert!(outcome.is_fallback());
        assert_eq!(
            outcome.report.error_message(),
            Some("AI summary generation failed: rate limited")
        );
        assert_eq!(outcome.weighted_total_score, 0);
    }

    #[tokio::test]
    async fn empty_transcript_never_calls_generator() {
        let mut summaries = MockSummaryGenerator::new();
        summaries.expect_generate_summary().times(0);
        let engine = ScoringEngine::new(
            Arc::new(summaries),
            Arc::new(ManualClock::new(Utc::now())),
        );

        let outcome = engine.score(&request(Transcript::default())).await;

        assert_eq!(outcome.report.error_message(), Some(EMPTY_TRANSCRIPT_MESSAGE));
        assert_eq!(outcome.talent_tier, TalentTier::ReInterviewEligible);
    }

    struct StalledGenerator;

    #[async_trait]
    impl SummaryGenerator for StalledGenerator {
        async fn generate_summary(
            &self,
            _input: &SummaryGenerationInput,
        ) -> crate::error::Result<RawInterviewSummary> {
            tokio::time::sleep(StdDuration::from_secs(5)).await;
            Err(Error::Internal("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn slow_generator_times_out_into_fallback() {
        let engine = ScoringEngine::new(
            Arc::new(StalledGenerator),
            Arc::new(ManualClock::new(Utc::now())),
        )
        .with_timeout(StdDuration::from_millis(20));

        let outcome = engine.score(&request(spoken())).await;

        assert_eq!(
            outcome.report.error_message(),
            Some("AI summary generation failed: timed out")
        );
    }
}
