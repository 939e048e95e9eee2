use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::models::profile::InterviewQuestions;

pub const MAX_CALL_DURATION_SECS: u32 = 20 * 60;

/// Everything the vendor needs to run one interview call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewScript {
    pub candidate_name: String,
    pub role: String,
    pub system_prompt: String,
    pub first_message: String,
    pub max_duration_secs: u32,
}

impl InterviewScript {
    pub fn new(candidate_name: &str, role: &str, questions: &InterviewQuestions) -> Self {
        let listed = questions.render_numbered();
        let listed = if listed.is_empty() {
            "No specific questions pre-loaded. Conduct a general interview based on the candidate's profile.".to_string()
        } else {
            listed
        };

        let system_prompt = format!(
            r#"You are an AI voice assistant conducting interviews.
Your job is to ask the candidate the provided interview questions and assess their responses.
Begin with a friendly introduction that sets a relaxed yet professional tone for {name}'s {role} interview.
Ask one question at a time and wait for the candidate's response before proceeding. Keep questions clear and concise.

Questions for {name}:
{listed}

If the candidate struggles, offer hints or rephrase the question without giving away the answer.
Give brief, encouraging feedback after each answer and keep the conversation natural.
Stay focused on the {role} role and the skills implied by the questions.
After the questions have been asked, wrap up smoothly, thank {name}, and end the call immediately after your final sentence."#,
            name = candidate_name,
            role = role,
            listed = listed,
        );

        Self {
            candidate_name: candidate_name.to_string(),
            role: role.to_string(),
            system_prompt,
            first_message: format!(
                "Hi {}, how are you? Ready for your interview for the {} role?",
                candidate_name, role
            ),
            max_duration_secs: MAX_CALL_DURATION_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorCall {
    pub call_id: String,
    pub join_url: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceVendor: Send + Sync {
    /// False when no credential is configured.
    fn is_configured(&self) -> bool;

    async fn start_call(&self, script: &InterviewScript) -> Result<VendorCall>;

    async fn stop_call(&self, call_id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct VapiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl VapiClient {
    pub fn new(api_key: Option<String>, base_url: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("Voice API key is missing".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid VOICE_API_URL: {}", e)))?;
        base.join(path)
            .map_err(|e| Error::Config(format!("Invalid voice endpoint {}: {}", path, e)))
    }
}

#[async_trait]
impl VoiceVendor for VapiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn start_call(&self, script: &InterviewScript) -> Result<VendorCall> {
        let api_key = self.api_key()?;
        let payload = serde_json::json!({
            "assistant": {
                "name": "AI Interviewer",
                "firstMessage": script.first_message,
                "transcriber": { "provider": "deepgram", "model": "nova-2", "language": "en-US" },
                "voice": { "provider": "playht", "voiceId": "jennifer" },
                "model": {
                    "provider": "openai",
                    "model": "gpt-3.5-turbo",
                    "messages": [{ "role": "system", "content": script.system_prompt }]
                },
                "maxDurationSeconds": script.max_duration_secs
            }
        });

        let res = self
            .client
            .post(self.endpoint("/call/web")?)
            .bearer_auth(api_key)
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::ExternalService(format!(
                "Voice API Error {}: {}",
                status, text
            )));
        }

        let body: JsonValue = res.json().await?;
        let call_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::ExternalService("Voice API returned no call id".to_string()))?;
        let join_url = body
            .get("webCallUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(VendorCall {
            call_id: call_id.to_string(),
            join_url,
        })
    }

    async fn stop_call(&self, call_id: &str) -> Result<()> {
        let api_key = self.api_key()?;
        let res = self
            .client
            .delete(self.endpoint(&format!("/call/{}", call_id))?)
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            tracing::warn!(call_id, %status, "voice vendor refused to stop call");
        }
        Ok(())
    }
}
