#![allow(dead_code)]

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};

use talent_interview_backend::error::{Error, Result};
use talent_interview_backend::middleware::auth::Claims;
use talent_interview_backend::models::caller::Caller;
use talent_interview_backend::models::profile::{
    CandidateProfile, CvExperience, InterviewQuestions, TalentStatus,
};
use talent_interview_backend::models::report::CANONICAL_CATEGORIES;
use talent_interview_backend::services::ai_service::{
    CvAnalysis, ProfileAssistant, QuestionGenerationInput, QuestionGenerator, RawCategoryScore,
    RawInterviewSummary, SummaryGenerationInput, SummaryGenerator,
};
use talent_interview_backend::services::profile_store::{
    InMemoryProfileStore, ProfilePatch, ProfileStore, UpdateOutcome,
};
use talent_interview_backend::services::queue_service::InMemoryScoringQueue;
use talent_interview_backend::services::status_machine::ProfileDetails;
use talent_interview_backend::services::voice_service::{InterviewScript, VendorCall, VoiceVendor};
use talent_interview_backend::utils::time::ManualClock;
use talent_interview_backend::{AppState, Components, ScoringSettings};

pub const JWT_SECRET: &str = "test_secret_key";
pub const WEBHOOK_SECRET: &str = "whsec_voice_test";

pub fn setup_env() {
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("DATABASE_URL", "postgres://localhost/talent_test");
    env::set_var("JWT_SECRET", JWT_SECRET);
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::set_var("VOICE_WEBHOOK_SECRET", WEBHOOK_SECRET);
    env::set_var("PUBLIC_RPS", "1000");
    env::set_var("TALENT_RPS", "1000");
    let _ = talent_interview_backend::config::init_config();
}

pub fn token_for(sub: &str, role: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        role: Some(role.to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub struct StubQuestions;

#[async_trait]
impl QuestionGenerator for StubQuestions {
    async fn generate_questions(&self, input: &QuestionGenerationInput) -> Result<InterviewQuestions> {
        Ok(InterviewQuestions {
            behavioural_questions: vec![format!("Tell me about a project as a {}.", input.role)],
            situational_questions: vec!["A deploy breaks production. What do you do?".into()],
            technical_questions: vec![format!("How have you used {}?", input.skills.join(", "))],
        })
    }
}

#[derive(Debug, Clone)]
pub enum SummaryReply {
    Scores([JsonValue; 4]),
    Fail(String),
}

/// Summary generator whose next reply the test sets.
pub struct StubSummaries {
    reply: Mutex<SummaryReply>,
    pub calls: AtomicUsize,
}

impl StubSummaries {
    pub fn new() -> Self {
        Self {
            reply: Mutex::new(SummaryReply::Scores([json!(90), json!(85), json!(88), json!(90)])),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reply_with(&self, reply: SummaryReply) {
        *self.reply.lock().unwrap() = reply;
    }
}

#[async_trait]
impl SummaryGenerator for StubSummaries {
    async fn generate_summary(&self, _input: &SummaryGenerationInput) -> Result<RawInterviewSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            SummaryReply::Fail(msg) => Err(Error::ExternalService(msg)),
            SummaryReply::Scores(scores) => Ok(RawInterviewSummary {
                category_scores: CANONICAL_CATEGORIES
                    .iter()
                    .zip(scores)
                    .map(|(name, score)| RawCategoryScore {
                        name: name.to_string(),
                        score,
                        comment: "Solid.".into(),
                    })
                    .collect(),
                strengths: vec!["Clear answers".into()],
                areas_for_improvement: vec!["More detail on testing".into()],
                final_assessment: "Good fit.".into(),
            }),
        }
    }
}

pub struct StubAssistant;

#[async_trait]
impl ProfileAssistant for StubAssistant {
    async fn analyze_cv(&self, _cv_text: &str) -> Result<CvAnalysis> {
        Ok(CvAnalysis {
            skills: vec!["Rust".into(), "PostgreSQL".into()],
            experience: vec![CvExperience {
                title: "Backend Engineer".into(),
                company: "Acme".into(),
                dates: "2020 - 2025".into(),
                description: "Built payment APIs".into(),
            }],
            education: vec![],
            summary: "Backend engineer with five years of Rust.".into(),
        })
    }

    async fn suggest_summaries(&self, headline: &str) -> Result<Vec<String>> {
        Ok(vec![format!("Experienced {}.", headline)])
    }
}

pub struct StubVendor {
    configured: bool,
    started: AtomicUsize,
    pub stopped: Mutex<Vec<String>>,
}

impl StubVendor {
    pub fn new(configured: bool) -> Self {
        Self {
            configured,
            started: AtomicUsize::new(0),
            stopped: Mutex::new(Vec::new()),
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

/// In-memory store whose move into processing takes `delay`.
pub struct SlowProcessingStore {
    inner: Arc<InMemoryProfileStore>,
    delay: StdDuration,
}

#[async_trait]
impl ProfileStore for SlowProcessingStore {
    async fn get(&self, id: &str) -> Result<Option<CandidateProfile>> {
        self.inner.get(id).await
    }

    async fn create(&self, profile: CandidateProfile) -> Result<CandidateProfile> {
        self.inner.create(profile).await
    }

    async fn update(
        &self,
        id: &str,
        expected: Option<TalentStatus>,
        patch: ProfilePatch,
    ) -> Result<UpdateOutcome> {
        if patch.status == Some(TalentStatus::InterviewCompletedProcessingSummary) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.update(id, expected, patch).await
    }

    async fn list(&self) -> Result<Vec<CandidateProfile>> {
        self.inner.list().await
    }

    async fn list_by_status(
        &self,
        status: TalentStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<CandidateProfile>> {
        self.inner.list_by_status(status, updated_before).await
    }
}

#[async_trait]
impl VoiceVendor for StubVendor {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn start_call(&self, _script: &InterviewScript) -> Result<VendorCall> {
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(VendorCall {
            call_id: format!("call-{}", n),
            join_url: Some(format!("https://voice.example/join/{}", n)),
        })
    }

    async fn stop_call(&self, call_id: &str) -> Result<()> {
        self.stopped.lock().unwrap().push(call_id.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<InMemoryProfileStore>,
    pub queue: Arc<InMemoryScoringQueue>,
    pub clock: Arc<ManualClock>,
    pub summaries: Arc<StubSummaries>,
    pub vendor: Arc<StubVendor>,
}

pub fn harness() -> Harness {
    harness_with(true, ScoringSettings::default())
}

pub fn harness_with(vendor_configured: bool, settings: ScoringSettings) -> Harness {
    build_harness(vendor_configured, settings, None)
}

pub fn harness_with_slow_processing(delay: StdDuration) -> Harness {
    build_harness(true, ScoringSettings::default(), Some(delay))
}

fn build_harness(
    vendor_configured: bool,
    settings: ScoringSettings,
    processing_delay: Option<StdDuration>,
) -> Harness {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(InMemoryProfileStore::with_clock(clock.clone()));
    let queue = Arc::new(InMemoryScoringQueue::new(clock.clone()));
    let summaries = Arc::new(StubSummaries::new());
    let vendor = Arc::new(StubVendor::new(vendor_configured));

    let shared_store: Arc<dyn ProfileStore> = match processing_delay {
        Some(delay) => Arc::new(SlowProcessingStore {
            inner: store.clone(),
            delay,
        }),
        None => store.clone(),
    };

    let state = AppState::from_parts(
        Components {
            store: shared_store,
            queue: queue.clone(),
            questions: Arc::new(StubQuestions),
            summaries: summaries.clone(),
            assistant: Arc::new(StubAssistant),
            vendor: vendor.clone(),
            clock: clock.clone(),
        },
        settings,
    );

    Harness {
        state,
        store,
        queue,
        clock,
        summaries,
        vendor,
    }
}

pub async fn submitted_profile(h: &Harness, id: &str) -> CandidateProfile {
    let machine = &h.state.status_machine;
    machine
        .create_profile(id, Some(format!("{}@example.com", id)), Some("Ada Lovelace".into()))
        .await
        .expect("create");
    let analysis = StubAssistant.analyze_cv("cv").await.expect("analyze");
    machine
        .attach_cv_analysis(id, Some("ada.pdf".into()), analysis)
        .await
        .expect("attach cv");
    machine
        .submit_profile(
            id,
            ProfileDetails {
                headline: Some("Senior Rust Engineer".into()),
                professional_summary: Some("Builds reliable backend services.".into()),
                tech_stack: Some("Tokio, Axum".into()),
                years_of_experience: Some(6),
                ..Default::default()
            },
        )
        .await
        .expect("submit")
}

pub async fn invited_profile(h: &Harness, id: &str) -> CandidateProfile {
    submitted_profile(h, id).await;
    h.state
        .status_machine
        .prepare_interview(id)
        .await
        .expect("prepare")
}

/// Invited profile with a live call; returns the call id.
pub async fn live_session(h: &Harness, id: &str) -> String {
    invited_profile(h, id).await;
    h.state
        .session_driver
        .begin(&Caller::talent(id), id)
        .await
        .expect("begin")
        .session_id
}
