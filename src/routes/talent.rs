use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use validator::Validate;

use crate::{
    dto::talent_dto::{
        CompleteProfilePayload, CreateTalentPayload, ReportResponse, SubmitProfilePayload,
        SummarySuggestionsPayload, SummarySuggestionsResponse, TalentResponse, UploadCvPayload,
    },
    error::{Error, Result},
    models::caller::Caller,
    utils::time::Clock,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/talents",
    request_body = CreateTalentPayload,
    responses(
        (status = 201, description = "Profile created", body = Json<TalentResponse>),
        (status = 409, description = "Profile already exists")
    )
)]
#[axum::debug_handler]
pub async fn create_talent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateTalentPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    caller.ensure_owner(&caller.user_id)?;
    let profile = state
        .status_machine
        .create_profile(&caller.user_id, payload.email, payload.full_name)
        .await?;
    Ok((StatusCode::CREATED, Json(TalentResponse::from(profile))))
}

#[utoipa::path(
    get,
    path = "/api/talents/{id}",
    params(("id" = String, Path, description = "Talent profile ID")),
    responses(
        (status = 200, description = "Profile", body = Json<TalentResponse>),
        (status = 404, description = "Profile not found")
    )
)]
#[axum::debug_handler]
pub async fn get_talent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    caller.ensure_can_view(&id)?;
    let profile = state.status_machine.get_profile(&id).await?;
    Ok(Json(TalentResponse::from(profile)))
}

#[utoipa::path(
    put,
    path = "/api/talents/{id}/cv",
    params(("id" = String, Path, description = "Talent profile ID")),
    request_body = UploadCvPayload,
    responses(
        (status = 200, description = "CV parsed and attached", body = Json<TalentResponse>),
        (status = 409, description = "Profile is past the editing stage"),
        (status = 502, description = "CV analysis failed")
    )
)]
#[axum::debug_handler]
pub async fn upload_cv(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<UploadCvPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    caller.ensure_owner(&id)?;
    if payload.cv_text.trim().is_empty() {
        return Err(Error::EmptyInput("CV text is empty".to_string()));
    }
    let analysis = state.profile_assistant.analyze_cv(&payload.cv_text).await?;
    let profile = state
        .status_machine
        .attach_cv_analysis(&id, payload.file_name, analysis)
        .await?;
    Ok(Json(TalentResponse::from(profile)))
}

#[utoipa::path(
    post,
    path = "/api/talents/{id}/summary-suggestions",
    params(("id" = String, Path, description = "Talent profile ID")),
    request_body = SummarySuggestionsPayload,
    responses(
        (status = 200, description = "Suggested summaries", body = Json<SummarySuggestionsResponse>),
        (status = 502, description = "Suggestion generation failed")
    )
)]
#[axum::debug_handler]
pub async fn suggest_summaries(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<SummarySuggestionsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    caller.ensure_owner(&id)?;
    let suggestions = state
        .profile_assistant
        .suggest_summaries(payload.headline.trim())
        .await?;
    Ok(Json(SummarySuggestionsResponse { suggestions }))
}

#[utoipa::path(
    post,
    path = "/api/talents/{id}/submit",
    params(("id" = String, Path, description = "Talent profile ID")),
    request_body = SubmitProfilePayload,
    responses(
        (status = 200, description = "Profile submitted", body = Json<TalentResponse>),
        (status = 409, description = "Profile incomplete or in the wrong status")
    )
)]
#[axum::debug_handler]
pub async fn submit_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<SubmitProfilePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    caller.ensure_owner(&id)?;
    let profile = state
        .status_machine
        .submit_profile(&id, payload.into())
        .await?;
    Ok(Json(TalentResponse::from(profile)))
}

#[utoipa::path(
    post,
    path = "/api/talents/{id}/interview/prepare",
    params(("id" = String, Path, description = "Talent profile ID")),
    responses(
        (status = 200, description = "Questions generated, candidate invited", body = Json<TalentResponse>),
        (status = 409, description = "Profile not ready for an interview"),
        (status = 502, description = "Question generation failed")
    )
)]
#[axum::debug_handler]
pub async fn prepare_interview(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    caller.ensure_owner(&id)?;
    let profile = state.status_machine.prepare_interview(&id).await?;
    Ok(Json(TalentResponse::from(profile)))
}

#[utoipa::path(
    post,
    path = "/api/talents/{id}/interview/retake",
    params(("id" = String, Path, description = "Talent profile ID")),
    responses(
        (status = 200, description = "New questions generated", body = Json<TalentResponse>),
        (status = 409, description = "Not eligible or still cooling down")
    )
)]
#[axum::debug_handler]
pub async fn request_retake(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    caller.ensure_owner(&id)?;
    let profile = state.status_machine.request_retake(&id).await?;
    Ok(Json(TalentResponse::from(profile)))
}

#[utoipa::path(
    post,
    path = "/api/talents/{id}/complete",
    params(("id" = String, Path, description = "Talent profile ID")),
    request_body = CompleteProfilePayload,
    responses(
        (status = 200, description = "Profile fully completed", body = Json<TalentResponse>),
        (status = 409, description = "No report yet")
    )
)]
#[axum::debug_handler]
pub async fn complete_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<CompleteProfilePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    caller.ensure_owner(&id)?;
    let profile = state
        .status_machine
        .complete_full_profile(&id, payload.into())
        .await?;
    Ok(Json(TalentResponse::from(profile)))
}

#[utoipa::path(
    get,
    path = "/api/talents/{id}/report",
    params(("id" = String, Path, description = "Talent profile ID")),
    responses(
        (status = 200, description = "Interview report", body = Json<ReportResponse>),
        (status = 404, description = "No report yet")
    )
)]
#[axum::debug_handler]
pub async fn get_report(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    caller.ensure_can_view(&id)?;
    let profile = state.status_machine.get_profile(&id).await?;
    let report = ReportResponse::from_profile(profile, state.clock.now())
        .ok_or_else(|| Error::NotFound(format!("No report for profile {}", id)))?;
    Ok(Json(report))
}
