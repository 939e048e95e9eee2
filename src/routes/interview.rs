use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use validator::Validate;

use crate::{
    dto::session_dto::{BeginSessionPayload, FinalizeResponse},
    error::Result,
    models::caller::Caller,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/interview/sessions",
    request_body = BeginSessionPayload,
    responses(
        (status = 201, description = "Voice call started"),
        (status = 409, description = "Not invited, or a session is already live"),
        (status = 500, description = "Voice vendor not configured")
    )
)]
#[axum::debug_handler]
pub async fn begin_interview(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<BeginSessionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let started = state
        .session_driver
        .begin(&caller, &payload.profile_id)
        .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

#[utoipa::path(
    get,
    path = "/api/interview/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Voice call ID")),
    responses(
        (status = 200, description = "Live transcript"),
        (status = 404, description = "Session not live")
    )
)]
#[axum::debug_handler]
pub async fn get_interview(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let view = state.session_driver.view(&caller, &session_id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/interview/sessions/{session_id}/end",
    params(("session_id" = String, Path, description = "Voice call ID")),
    responses(
        (status = 200, description = "Interview handed to scoring", body = Json<FinalizeResponse>)
    )
)]
#[axum::debug_handler]
pub async fn end_interview(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let outcome = state.session_driver.end(&caller, &session_id).await?;
    Ok(Json(FinalizeResponse::from(outcome)))
}
