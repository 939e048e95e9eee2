use serde::{Deserialize, Serialize};

/// Fixed category names, in weighting order.
pub const CANONICAL_CATEGORIES: [&str; 4] = [
    "Communication & English Proficiency",
    "Technical Knowledge & Role Fit",
    "Problem Solving & Thinking",
    "Culture & Work Ethic Alignment",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    #[serde(alias = "category")]
    pub name: String,
    pub score: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewReport {
    #[serde(alias = "categoryScores")]
    pub category_scores: Vec<CategoryScore>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default, alias = "areasForImprovement")]
    pub areas_for_improvement: Vec<String>,
    #[serde(default, alias = "finalAssessment")]
    pub final_assessment: String,
}

/// Persisted report payload: either the error shape or a real report.
///
/// `Failed` is listed first so a document carrying an `error` key never
/// deserializes as a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportSummary {
    Failed { error: String },
    Completed(InterviewReport),
}

impl ReportSummary {
    pub fn failed(message: impl Into<String>) -> Self {
        ReportSummary::Failed {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReportSummary::Failed { .. })
    }

    pub fn as_report(&self) -> Option<&InterviewReport> {
        match self {
            ReportSummary::Completed(report) => Some(report),
            ReportSummary::Failed { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ReportSummary::Failed { error } => Some(error),
            ReportSummary::Completed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_shape_is_never_read_as_a_report() {
        let raw = json!({ "error": "AI summary generation failed: timeout" });
        let summary: ReportSummary = serde_json::from_value(raw).unwrap();
        assert!(summary.is_error());
        assert_eq!(
            summary.error_message(),
            Some("AI summary generation failed: timeout")
        );
    }

    #[test]
    fn success_shape_round_trips() {
        let report = ReportSummary::Completed(InterviewReport {
            category_scores: CANONICAL_CATEGORIES
                .iter()
                .map(|name| CategoryScore {
                    name: name.to_string(),
                    score: 80,
                    comment: "ok".into(),
                })
                .collect(),
            strengths: vec!["clear".into(), "concise".into()],
            areas_for_improvement: vec!["depth".into(), "examples".into()],
            final_assessment: "Solid".into(),
        });
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("error").is_none());
        let back: ReportSummary = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }
}
