use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::caller::Caller;
use crate::models::profile::{InterviewQuestions, TalentStatus};
use crate::models::scoring_job::ScoringRequest;
use crate::models::transcript::{Speaker, Transcript, Utterance};
use crate::services::queue_service::ScoringQueue;
use crate::services::scoring_service::{ScoringOutcome, EMPTY_TRANSCRIPT_MESSAGE};
use crate::services::status_machine::StatusMachine;
use crate::services::voice_service::{InterviewScript, VoiceVendor, MAX_CALL_DURATION_SECS};
use crate::utils::time::Clock;

const CALL_ENDED_PHRASE: &str = "meeting has ended";

/// Grace past the vendor's own call limit before a silent session is expired.
const SESSION_GRACE_MINUTES: i64 = 5;

pub fn session_max_age() -> Duration {
    Duration::seconds(i64::from(MAX_CALL_DURATION_SECS)) + Duration::minutes(SESSION_GRACE_MINUTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptKind {
    Partial,
    Final,
}

/// Vendor callbacks after normalization at the webhook boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    CallStart,
    CallEnd,
    Transcript {
        kind: TranscriptKind,
        speaker: Speaker,
        text: String,
    },
    Error(JsonValue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTermination {
    Ended,
    Failed(String),
}

fn non_blank(value: Option<&JsonValue>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Candidate messages in the order the vendor's payload shapes are checked.
fn error_messages(payload: &JsonValue) -> Vec<String> {
    let mut messages = Vec::new();
    match payload {
        JsonValue::String(s) if !s.trim().is_empty() => messages.push(s.trim().to_string()),
        JsonValue::Object(_) => {
            messages.extend(non_blank(payload.get("message")));
            messages.extend(non_blank(payload.get("errorMsg")));
            if let Some(inner) = payload.get("error") {
                if inner.is_string() {
                    messages.extend(non_blank(Some(inner)));
                }
                messages.extend(non_blank(inner.get("message")));
                if let Some(list) = inner.get("message").and_then(|m| m.as_array()) {
                    let joined = list
                        .iter()
                        .filter_map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    if !joined.is_empty() {
                        messages.push(joined);
                    }
                }
                messages.extend(non_blank(inner.get("msg")));
                messages.extend(non_blank(inner.get("error")));
            }
        }
        _ => {}
    }
    messages
}

/// Some vendor "errors" just report that the call finished.
pub fn classify_vendor_error(payload: &JsonValue) -> CallTermination {
    let messages = error_messages(payload);
    if messages
        .iter()
        .any(|m| m.to_lowercase().contains(CALL_ENDED_PHRASE))
    {
        return CallTermination::Ended;
    }
    let reason = messages.into_iter().next().unwrap_or_else(|| {
        if payload.is_null() {
            "An unspecified voice connection error occurred.".to_string()
        } else {
            payload.to_string()
        }
    });
    CallTermination::Failed(reason)
}

struct LiveSession {
    session_id: String,
    profile_id: String,
    candidate_name: String,
    headline: String,
    questions: InterviewQuestions,
    transcript: Transcript,
    partial: Option<Utterance>,
    connected: bool,
    started_at: DateTime<Utc>,
}

impl LiveSession {
    fn snapshot(&self, ended_at: DateTime<Utc>) -> ScoringRequest {
        ScoringRequest {
            profile_id: self.profile_id.clone(),
            session_id: self.session_id.clone(),
            candidate_name: self.candidate_name.clone(),
            headline: self.headline.clone(),
            questions: self.questions.clone(),
            transcript: self.transcript.clone(),
            ended_at,
        }
    }

    fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session_id.clone(),
            profile_id: self.profile_id.clone(),
            connected: self.connected,
            started_at: self.started_at,
            transcript: self.transcript.utterances.clone(),
            partial: self.partial.clone(),
        }
    }
}

struct LiveEntry {
    session: Arc<Mutex<LiveSession>>,
    started_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    by_call: HashMap<String, LiveEntry>,
    /// `None` while the vendor call is still being opened. A finalizing call
    /// keeps its slot until the processing write has returned.
    by_profile: HashMap<String, Option<String>>,
}

fn already_in_progress() -> Error {
    Error::Precondition("An interview session is already in progress".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: String,
    pub profile_id: String,
    pub join_url: Option<String>,
    pub first_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub profile_id: String,
    pub connected: bool,
    pub started_at: DateTime<Utc>,
    pub transcript: Vec<Utterance>,
    pub partial: Option<Utterance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Status moved to processing; `job_id` is `None` when the empty-transcript
    /// report was written directly.
    Finalized {
        profile_id: String,
        job_id: Option<Uuid>,
    },
    AlreadyFinalized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Recorded,
    Finalized(FinalizeOutcome),
    /// Call failed; session dropped, profile untouched.
    TornDown { reason: String },
    Ignored,
}

/// Owns live interview calls and hands each one to scoring exactly once.
#[derive(Clone)]
pub struct InterviewSessionDriver {
    machine: StatusMachine,
    vendor: Arc<dyn VoiceVendor>,
    queue: Arc<dyn ScoringQueue>,
    clock: Arc<dyn Clock>,
    signal: Arc<Notify>,
    registry: Arc<Mutex<Registry>>,
}

impl InterviewSessionDriver {
    pub fn new(
        machine: StatusMachine,
        vendor: Arc<dyn VoiceVendor>,
        queue: Arc<dyn ScoringQueue>,
        clock: Arc<dyn Clock>,
        signal: Arc<Notify>,
    ) -> Self {
        Self {
            machine,
            vendor,
            queue,
            clock,
            signal,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub async fn begin(&self, caller: &Caller, profile_id: &str) -> Result<SessionStarted> {
        caller.ensure_owner(profile_id)?;
        if !self.vendor.is_configured() {
            return Err(Error::Config("Voice API key is missing".to_string()));
        }

        self.reserve(profile_id).await?;
        let started = self.open_call(profile_id).await;
        if started.is_err() {
            self.release(profile_id, None).await;
        }
        started
    }

    /// Claims the profile's slot before its status is read. An expired session
    /// holding the slot is finalized first.
    async fn reserve(&self, profile_id: &str) -> Result<()> {
        let cutoff = self.clock.now() - session_max_age();
        let expired = {
            let mut registry = self.registry.lock().await;
            match registry.by_profile.get(profile_id).cloned() {
                None => {
                    registry.by_profile.insert(profile_id.to_string(), None);
                    return Ok(());
                }
                Some(Some(call_id))
                    if registry
                        .by_call
                        .get(&call_id)
                        .is_some_and(|entry| entry.started_at <= cutoff) =>
                {
                    call_id
                }
                Some(_) => return Err(already_in_progress()),
            }
        };

        self.expire(&expired).await?;

        let mut registry = self.registry.lock().await;
        if registry.by_profile.contains_key(profile_id) {
            return Err(already_in_progress());
        }
        registry.by_profile.insert(profile_id.to_string(), None);
        Ok(())
    }

    /// Drops the profile's slot if it still points at `call_id`.
    async fn release(&self, profile_id: &str, call_id: Option<&str>) {
        let mut registry = self.registry.lock().await;
        if registry
            .by_profile
            .get(profile_id)
            .is_some_and(|held| held.as_deref() == call_id)
        {
            registry.by_profile.remove(profile_id);
        }
    }

    async fn open_call(&self, profile_id: &str) -> Result<SessionStarted> {
        let profile = self.machine.get_profile(profile_id).await?;
        if profile.status != TalentStatus::InterviewInvited {
            return Err(Error::Precondition(format!(
                "Cannot start an interview while status is {}",
                profile.status
            )));
        }
        let questions = match profile.interview_questions.clone() {
            Some(q) if q.is_complete() => q,
            _ => {
                return Err(Error::Precondition(
                    "Interview questions have not been prepared".to_string(),
                ))
            }
        };

        let candidate_name = profile.display_name().to_string();
        let headline = profile.role_headline().to_string();
        let script = InterviewScript::new(&candidate_name, &headline, &questions);

        let call = match self.vendor.start_call(&script).await {
            Ok(call) => call,
            Err(e) => {
                tracing::error!(profile_id, error = %e, "voice call could not be started");
                return Err(e);
            }
        };

        let started_at = self.clock.now();
        let session = LiveSession {
            session_id: call.call_id.clone(),
            profile_id: profile_id.to_string(),
            candidate_name,
            headline,
            questions,
            transcript: Transcript::default(),
            partial: None,
            connected: false,
            started_at,
        };
        {
            let mut registry = self.registry.lock().await;
            registry.by_call.insert(
                call.call_id.clone(),
                LiveEntry {
                    session: Arc::new(Mutex::new(session)),
                    started_at,
                },
            );
            registry
                .by_profile
                .insert(profile_id.to_string(), Some(call.call_id.clone()));
        }

        tracing::info!(profile_id, session_id = %call.call_id, "interview session started");
        Ok(SessionStarted {
            session_id: call.call_id,
            profile_id: profile_id.to_string(),
            join_url: call.join_url,
            first_message: script.first_message,
        })
    }

    async fn lookup(&self, session_id: &str) -> Option<Arc<Mutex<LiveSession>>> {
        self.registry
            .lock()
            .await
            .by_call
            .get(session_id)
            .map(|entry| entry.session.clone())
    }

    /// Removes the call from the registry; only the first caller gets it back.
    /// The profile slot stays held until `release`.
    async fn take(&self, session_id: &str) -> Option<Arc<Mutex<LiveSession>>> {
        self.registry
            .lock()
            .await
            .by_call
            .remove(session_id)
            .map(|entry| entry.session)
    }

    pub async fn handle_event(&self, session_id: &str, event: VoiceEvent) -> Result<EventOutcome> {
        let Some(session) = self.lookup(session_id).await else {
            tracing::debug!(session_id, "event for unknown session ignored");
            return Ok(EventOutcome::Ignored);
        };

        match event {
            VoiceEvent::CallStart => {
                session.lock().await.connected = true;
                tracing::info!(session_id, "voice call connected");
                Ok(EventOutcome::Recorded)
            }
            VoiceEvent::Transcript {
                kind,
                speaker,
                text,
            } => {
                let mut live = session.lock().await;
                match kind {
                    TranscriptKind::Partial => {
                        live.partial = Some(Utterance { speaker, text });
                    }
                    TranscriptKind::Final => {
                        live.partial = None;
                        live.transcript.push(speaker, text);
                    }
                }
                Ok(EventOutcome::Recorded)
            }
            VoiceEvent::CallEnd => Ok(EventOutcome::Finalized(self.finalize(session_id).await?)),
            VoiceEvent::Error(payload) => match classify_vendor_error(&payload) {
                CallTermination::Ended => {
                    tracing::info!(session_id, "voice call ended (reported via error event)");
                    Ok(EventOutcome::Finalized(self.finalize(session_id).await?))
                }
                CallTermination::Failed(reason) => {
                    tracing::error!(session_id, %reason, "voice call failed");
                    if let Some(session) = self.take(session_id).await {
                        let profile_id = session.lock().await.profile_id.clone();
                        self.release(&profile_id, Some(session_id)).await;
                        if let Err(e) = self.vendor.stop_call(session_id).await {
                            tracing::warn!(session_id, error = %e, "could not stop failed call");
                        }
                    }
                    Ok(EventOutcome::TornDown { reason })
                }
            },
        }
    }

    /// Explicit stop by the candidate; scored like a vendor-side end.
    pub async fn end(&self, caller: &Caller, session_id: &str) -> Result<FinalizeOutcome> {
        let Some(session) = self.lookup(session_id).await else {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        };
        let profile_id = session.lock().await.profile_id.clone();
        caller.ensure_owner(&profile_id)?;

        if let Err(e) = self.vendor.stop_call(session_id).await {
            tracing::warn!(session_id, error = %e, "vendor stop failed, finalizing anyway");
        }
        self.finalize(session_id).await
    }

    pub async fn view(&self, caller: &Caller, session_id: &str) -> Result<SessionView> {
        let session = self
            .lookup(session_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("Session {} not found", session_id)))?;
        let view = session.lock().await.view();
        caller.ensure_can_view(&view.profile_id)?;
        Ok(view)
    }

    /// Snapshot, checked status write, then hand off. Runs at most once per call.
    pub async fn finalize(&self, session_id: &str) -> Result<FinalizeOutcome> {
        let Some(session) = self.take(session_id).await else {
            tracing::warn!(session_id, "duplicate finalize ignored");
            return Ok(FinalizeOutcome::AlreadyFinalized);
        };
        let request = session.lock().await.snapshot(self.clock.now());
        let profile_id = request.profile_id.clone();

        let moved = self.machine.begin_processing(&profile_id).await;
        self.release(&profile_id, Some(session_id)).await;
        if !moved? {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }
        tracing::info!(
            profile_id = %profile_id,
            session_id,
            utterances = request.transcript.len(),
            status = %TalentStatus::InterviewCompletedProcessingSummary,
            "interview finalized"
        );

        if request.transcript.is_empty() {
            let outcome = ScoringOutcome::fallback(EMPTY_TRANSCRIPT_MESSAGE, self.clock.now());
            self.machine.resolve_report(&profile_id, outcome).await?;
            return Ok(FinalizeOutcome::Finalized {
                profile_id,
                job_id: None,
            });
        }

        let job_id = self.queue.enqueue(request).await?;
        self.signal.notify_one();
        tracing::info!(profile_id = %profile_id, job_id = %job_id, "scoring job enqueued");
        Ok(FinalizeOutcome::Finalized {
            profile_id,
            job_id: Some(job_id),
        })
    }

    /// Stops and finalizes a session whose end event never arrived.
    async fn expire(&self, session_id: &str) -> Result<FinalizeOutcome> {
        tracing::warn!(session_id, "live session expired without an end event");
        if let Err(e) = self.vendor.stop_call(session_id).await {
            tracing::warn!(session_id, error = %e, "could not stop expired call");
        }
        self.finalize(session_id).await
    }

    /// Finalizes every session older than `session_max_age`.
    pub async fn expire_stale(&self) -> Result<usize> {
        let cutoff = self.clock.now() - session_max_age();
        let stale: Vec<String> = self
            .registry
            .lock()
            .await
            .by_call
            .iter()
            .filter(|(_, entry)| entry.started_at <= cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        let mut expired = 0;
        for session_id in stale {
            if let FinalizeOutcome::Finalized { .. } = self.expire(&session_id).await? {
                expired += 1;
            }
        }
        Ok(expired)
    }

    pub async fn live_sessions(&self) -> usize {
        self.registry.lock().await.by_call.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meeting_ended_errors_are_normal_ends() {
        let shapes = [
            json!("Meeting has ended"),
            json!({ "message": "The meeting has ended." }),
            json!({ "errorMsg": "meeting has ended" }),
            json!({ "message": "ejected", "errorMsg": "Meeting has ended" }),
            json!({ "error": { "message": "Meeting has ended" } }),
            json!({ "error": { "message": ["room closed", "meeting has ended"] } }),
            json!({ "error": { "msg": "MEETING HAS ENDED" } }),
            json!({ "error": { "error": "meeting has ended" } }),
        ];
        for shape in shapes {
            assert_eq!(classify_vendor_error(&shape), CallTermination::Ended, "{}", shape);
        }
    }

    #[test]
    fn other_errors_carry_a_reason() {
        assert_eq!(
            classify_vendor_error(&json!({ "error": { "message": ["mic denied", "retry"] } })),
            CallTermination::Failed("mic denied, retry".into())
        );
        assert_eq!(
            classify_vendor_error(&json!({ "errorMsg": "  ", "error": { "msg": "socket closed" } })),
            CallTermination::Failed("socket closed".into())
        );
        assert_eq!(
            classify_vendor_error(&json!({ "code": 42 })),
            CallTermination::Failed("{\"code\":42}".into())
        );
        assert_eq!(
            classify_vendor_error(&JsonValue::Null),
            CallTermination::Failed("An unspecified voice connection error occurred.".into())
        );
    }
}
