use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::{
    config::get_config,
    dto::session_dto::VoiceWebhookEnvelope,
    error::{Error, Result},
    services::session_service::EventOutcome,
    utils::signature::verify_signature,
    AppState,
};

const SIGNATURE_HEADERS: [&str; 2] = ["x-vapi-signature", "x-signature"];

fn verify_vendor_signature(headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let secret = get_config()
        .voice_webhook_secret
        .as_deref()
        .ok_or_else(|| Error::Unauthorized("Voice webhook secret is not configured".to_string()))?;

    let provided = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("Missing signature".to_string()))?;

    if !verify_signature(secret, body, provided) {
        return Err(Error::Unauthorized("Invalid signature".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/voice/events",
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Bad signature")
    )
)]
#[axum::debug_handler]
pub async fn handle_voice_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    verify_vendor_signature(&headers, &body)?;
    let envelope: VoiceWebhookEnvelope = serde_json::from_slice(&body)?;

    let Some(session_id) = envelope.session_id() else {
        return Ok((StatusCode::OK, Json(json!({ "status": "ignored" }))));
    };
    let Some(event) = envelope.to_event() else {
        return Ok((StatusCode::OK, Json(json!({ "status": "ignored" }))));
    };

    let status = match state.session_driver.handle_event(session_id, event).await? {
        EventOutcome::Recorded => "recorded",
        EventOutcome::Finalized(_) => "finalized",
        EventOutcome::TornDown { .. } => "torn_down",
        EventOutcome::Ignored => "ignored",
    };
    Ok((StatusCode::OK, Json(json!({ "status": status }))))
}
