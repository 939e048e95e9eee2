use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::transcript::Speaker;
use crate::services::session_service::{FinalizeOutcome, TranscriptKind, VoiceEvent};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BeginSessionPayload {
    #[validate(length(min = 1))]
    pub profile_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub finalized: bool,
    pub profile_id: Option<String>,
    pub job_id: Option<Uuid>,
}

impl From<FinalizeOutcome> for FinalizeResponse {
    fn from(outcome: FinalizeOutcome) -> Self {
        match outcome {
            FinalizeOutcome::Finalized { profile_id, job_id } => Self {
                finalized: true,
                profile_id: Some(profile_id),
                job_id,
            },
            FinalizeOutcome::AlreadyFinalized => Self {
                finalized: false,
                profile_id: None,
                job_id: None,
            },
        }
    }
}

/// Vendor server-message envelope: `{"message": {"type": ..., "call": {"id": ...}, ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceWebhookEnvelope {
    pub message: JsonValue,
}

fn field<'a>(value: &'a JsonValue, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

impl VoiceWebhookEnvelope {
    pub fn session_id(&self) -> Option<&str> {
        self.message
            .get("call")
            .and_then(|call| field(call, "id"))
            .or_else(|| field(&self.message, "callId"))
    }

    /// `None` for message types the driver does not care about.
    pub fn to_event(&self) -> Option<VoiceEvent> {
        let message = &self.message;
        match field(message, "type")? {
            "status-update" => match field(message, "status")? {
                "in-progress" => Some(VoiceEvent::CallStart),
                "ended" => Some(VoiceEvent::CallEnd),
                _ => None,
            },
            "end-of-call-report" => Some(VoiceEvent::CallEnd),
            "transcript" => {
                let text = field(message, "transcript")?.to_string();
                let kind = match field(message, "transcriptType") {
                    Some("final") => TranscriptKind::Final,
                    _ => TranscriptKind::Partial,
                };
                let speaker = match field(message, "role") {
                    Some("assistant") => Speaker::Ai,
                    _ => Speaker::Candidate,
                };
                Some(VoiceEvent::Transcript {
                    kind,
                    speaker,
                    text,
                })
            }
            "error" | "hang" => Some(VoiceEvent::Error(message.clone())),
            _ => None,
        }
    }
}
