use crate::error::{Error, Result};
use crate::models::profile::{CvEducation, CvExperience, InterviewQuestions};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGenerationInput {
    pub headline: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub experience_summary: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryGenerationInput {
    pub candidate_name: String,
    pub job_title: String,
    pub interviewer_label: String,
    pub interview_date: String,
    pub transcript_with_context: String,
}

/// Category entry exactly as the model produced it; the score is coerced later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCategoryScore {
    #[serde(default, alias = "category")]
    pub name: String,
    #[serde(default)]
    pub score: JsonValue,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInterviewSummary {
    #[serde(alias = "categoryScores")]
    pub category_scores: Vec<RawCategoryScore>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default, alias = "areasForImprovement")]
    pub areas_for_improvement: Vec<String>,
    #[serde(default, alias = "finalAssessment")]
    pub final_assessment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvAnalysis {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<CvExperience>,
    #[serde(default)]
    pub education: Vec<CvEducation>,
    #[serde(default)]
    pub summary: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// All three lists come back non-empty or the call fails.
    async fn generate_questions(&self, input: &QuestionGenerationInput)
        -> Result<InterviewQuestions>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate_summary(&self, input: &SummaryGenerationInput)
        -> Result<RawInterviewSummary>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileAssistant: Send + Sync {
    async fn analyze_cv(&self, cv_text: &str) -> Result<CvAnalysis>;

    async fn suggest_summaries(&self, headline: &str) -> Result<Vec<String>>;
}

#[derive(Clone)]
pub struct AIService {
    client: Client,
    api_key: String,
    model: String,
}

impl AIService {
    pub fn new(api_key: String, model: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    async fn chat_openai(&self, system_prompt: &str, user_content: String) -> Result<JsonValue> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.4
        });

        let res = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::ExternalService(format!(
                "OpenAI API Error {}: {}",
                status, text
            )));
        }

        let body: JsonValue = res.json().await?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .and_then(|s| serde_json::from_str(s).ok())
            .ok_or_else(|| Error::ExternalService("Invalid OpenAI response format".to_string()))
    }
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[async_trait]
impl QuestionGenerator for AIService {
    async fn generate_questions(
        &self,
        input: &QuestionGenerationInput,
    ) -> Result<InterviewQuestions> {
        let system_prompt = r#"You are an experienced technical interviewer preparing a voice interview.
Using the candidate profile, write interview questions tailored to the role.

Rules:
1. Return a JSON object with the keys "behaviouralQuestions", "situationalQuestions" and "technicalQuestions".
2. Each key holds an array of 2-4 concise questions that can be asked out loud.
3. Technical questions must target the listed skills and the stated role.
4. Do not number the questions and do not add any other keys."#;

        let user_content = serde_json::to_string(input)?;
        let raw = self.chat_openai(system_prompt, user_content).await?;

        let parsed: InterviewQuestions = serde_json::from_value(raw).map_err(|e| {
            Error::ExternalService(format!("Question generation returned malformed output: {}", e))
        })?;
        let questions = InterviewQuestions {
            behavioural_questions: non_blank(parsed.behavioural_questions),
            situational_questions: non_blank(parsed.situational_questions),
            technical_questions: non_blank(parsed.technical_questions),
        };

        if !questions.is_complete() {
            tracing::error!(role = %input.role, "question generation returned an incomplete set");
            return Err(Error::ExternalService(
                "Question generation did not return all three question categories".to_string(),
            ));
        }
        Ok(questions)
    }
}

#[async_trait]
impl SummaryGenerator for AIService {
    async fn generate_summary(
        &self,
        input: &SummaryGenerationInput,
    ) -> Result<RawInterviewSummary> {
        let system_prompt = format!(
            r#"You are an expert AI Interview Assessor generating a report for recruiters.
Analyze the interview conversation for the role of '{role}' and evaluate the candidate in exactly FOUR categories, in this order:
1. "Communication & English Proficiency": clarity, fluency, comprehension and articulation.
2. "Technical Knowledge & Role Fit": relevance and depth of technical knowledge for the role.
3. "Problem Solving & Thinking": analytical thinking and structured reasoning.
4. "Culture & Work Ethic Alignment": attitude, ownership and engagement.

For each category give an independent score from 0 to 100 and a 2-3 sentence comment.
List 2-4 strengths and 2-4 areas for improvement, then a 3-5 sentence final assessment.
Be objective and do not be overly lenient. Do NOT calculate a total score.

Return JSON: {{ "categoryScores": [{{ "name": "...", "score": 0, "comment": "..." }}], "strengths": [], "areasForImprovement": [], "finalAssessment": "..." }}"#,
            role = input.job_title
        );

        let user_content = format!(
            "Candidate Name: {}\nJob Title: {}\nInterviewer Name: {}\nInterview Date: {}\n\nInterview Conversation (including initial question context and full transcript):\n{}",
            input.candidate_name,
            input.job_title,
            input.interviewer_label,
            input.interview_date,
            input.transcript_with_context
        );

        let raw = self.chat_openai(&system_prompt, user_content).await?;
        serde_json::from_value(raw).map_err(|e| {
            Error::ExternalService(format!("Summary generation returned malformed output: {}", e))
        })
    }
}

#[async_trait]
impl ProfileAssistant for AIService {
    async fn analyze_cv(&self, cv_text: &str) -> Result<CvAnalysis> {
        let system_prompt = r#"You are an expert resume parser. Extract the following information from the CV.
Return JSON with the keys:
- "skills": array of skills.
- "experience": array of { "title", "company", "dates", "description" }.
- "education": array of { "degree", "institution", "dates", "description" }.
- "summary": a short summary of the candidate's qualifications."#;

        let raw = self
            .chat_openai(system_prompt, format!("CV Document:\n{}", cv_text))
            .await?;
        let mut analysis: CvAnalysis = serde_json::from_value(raw).map_err(|e| {
            Error::ExternalService(format!("CV analysis returned malformed output: {}", e))
        })?;
        analysis.skills = non_blank(analysis.skills);
        Ok(analysis)
    }

    async fn suggest_summaries(&self, headline: &str) -> Result<Vec<String>> {
        let system_prompt = r#"You are an expert career advisor and resume writer.
Based on the professional headline, generate 3 concise and impactful professional summary suggestions.
Each suggestion is a short paragraph of 2-4 sentences highlighting key skills and aspirations.
Return JSON: { "suggestions": ["...", "...", "..."] }"#;

        let raw = self
            .chat_openai(system_prompt, format!("Professional Headline:\n\"{}\"", headline))
            .await?;
        let suggestions = raw
            .get("suggestions")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|e| e.as_str().map(|s| s.trim().to_string()))
                    .filter(|s| !s.is_empty())
                    .take(5)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if suggestions.is_empty() {
            return Err(Error::ExternalService(
                "Summary suggestions were empty".to_string(),
            ));
        }
        Ok(suggestions)
    }
}
