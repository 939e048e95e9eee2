pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use reqwest::Client;
use sqlx::PgPool;
use tokio::sync::Notify;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    ai_service::{AIService, ProfileAssistant, QuestionGenerator, SummaryGenerator},
    listing_service::ListingService,
    profile_store::{PgProfileStore, ProfileStore},
    queue_service::{PgScoringQueue, ScoringQueue, ScoringWorker},
    reconciliation_service::ReconciliationService,
    scoring_service::ScoringEngine,
    session_service::InterviewSessionDriver,
    status_machine::StatusMachine,
    voice_service::{VapiClient, VoiceVendor},
};
use crate::utils::time::{Clock, SystemClock};

/// External collaborators and storage the services are wired from.
#[derive(Clone)]
pub struct Components {
    pub store: Arc<dyn ProfileStore>,
    pub queue: Arc<dyn ScoringQueue>,
    pub questions: Arc<dyn QuestionGenerator>,
    pub summaries: Arc<dyn SummaryGenerator>,
    pub assistant: Arc<dyn ProfileAssistant>,
    pub vendor: Arc<dyn VoiceVendor>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringSettings {
    pub stale_after: chrono::Duration,
    pub max_attempts: i32,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            stale_after: chrono::Duration::seconds(900),
            max_attempts: 3,
        }
    }
}

impl ScoringSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stale_after: chrono::Duration::seconds(config.scoring_stale_after_secs),
            max_attempts: config.scoring_max_attempts,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub clock: Arc<dyn Clock>,
    pub status_machine: StatusMachine,
    pub session_driver: InterviewSessionDriver,
    pub listing_service: ListingService,
    pub profile_assistant: Arc<dyn ProfileAssistant>,
    pub scoring_worker: ScoringWorker,
    pub reconciliation: ReconciliationService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ai_service = Arc::new(AIService::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            http_client.clone(),
        ));
        let vendor = Arc::new(VapiClient::new(
            config.voice_api_key.clone(),
            config.voice_api_url.clone(),
            http_client,
        ));

        let components = Components {
            store: Arc::new(PgProfileStore::new(pool.clone(), clock.clone())),
            queue: Arc::new(PgScoringQueue::new(pool, clock.clone())),
            questions: ai_service.clone(),
            summaries: ai_service.clone(),
            assistant: ai_service,
            vendor,
            clock,
        };
        Ok(Self::from_parts(
            components,
            ScoringSettings::from_config(config),
        ))
    }

    pub fn from_parts(c: Components, settings: ScoringSettings) -> Self {
        let signal = Arc::new(Notify::new());
        let status_machine = StatusMachine::new(c.store.clone(), c.questions, c.clock.clone());
        let engine = ScoringEngine::new(c.summaries, c.clock.clone());

        let session_driver = InterviewSessionDriver::new(
            status_machine.clone(),
            c.vendor,
            c.queue.clone(),
            c.clock.clone(),
            signal.clone(),
        );
        let scoring_worker = ScoringWorker::new(
            c.queue.clone(),
            engine,
            status_machine.clone(),
            signal,
            settings.max_attempts,
        );
        let reconciliation = ReconciliationService::new(
            session_driver.clone(),
            c.store.clone(),
            c.queue,
            status_machine.clone(),
            c.clock.clone(),
            settings.stale_after,
            settings.max_attempts,
        );

        Self {
            clock: c.clock,
            status_machine,
            session_driver,
            listing_service: ListingService::new(c.store),
            profile_assistant: c.assistant,
            scoring_worker,
            reconciliation,
        }
    }
}

pub fn build_router(state: AppState, public_rps: u32, talent_rps: u32) -> Router {
    let public_api = Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/voice/events",
            post(routes::voice_webhook::handle_voice_event),
        )
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(public_rps),
            middleware::rate_limit::rps_middleware,
        ));

    let talent_api = Router::new()
        .route("/api/talents", post(routes::talent::create_talent))
        .route("/api/talents/:id", get(routes::talent::get_talent))
        .route("/api/talents/:id/cv", put(routes::talent::upload_cv))
        .route(
            "/api/talents/:id/summary-suggestions",
            post(routes::talent::suggest_summaries),
        )
        .route("/api/talents/:id/submit", post(routes::talent::submit_profile))
        .route(
            "/api/talents/:id/interview/prepare",
            post(routes::talent::prepare_interview),
        )
        .route(
            "/api/talents/:id/interview/retake",
            post(routes::talent::request_retake),
        )
        .route(
            "/api/talents/:id/complete",
            post(routes::talent::complete_profile),
        )
        .route("/api/talents/:id/report", get(routes::talent::get_report))
        .route("/api/interview/sessions", post(routes::interview::begin_interview))
        .route(
            "/api/interview/sessions/:session_id",
            get(routes::interview::get_interview),
        )
        .route(
            "/api/interview/sessions/:session_id/end",
            post(routes::interview::end_interview),
        )
        .route(
            "/api/marketplace/talents",
            get(routes::marketplace::list_talents),
        )
        .layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(talent_rps),
            middleware::rate_limit::rps_middleware,
        ));

    public_api.merge(talent_api).with_state(state)
}
