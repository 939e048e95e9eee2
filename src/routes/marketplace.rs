use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::listing_dto::{TalentCard, TalentListQuery, TalentListResponse},
    error::Result,
    models::caller::Caller,
    AppState,
};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

#[utoipa::path(
    get,
    path = "/api/marketplace/talents",
    responses(
        (status = 200, description = "Scored talent, best first", body = Json<TalentListResponse>),
        (status = 400, description = "Unknown tier"),
        (status = 403, description = "Recruiters only")
    )
)]
#[axum::debug_handler]
pub async fn list_talents(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<TalentListQuery>,
) -> Result<impl IntoResponse> {
    caller.ensure_recruiter()?;
    let filter = query.to_filter()?;
    let matches = state.listing_service.search(&filter).await?;

    let total = matches.len();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let items = matches
        .into_iter()
        .take(limit)
        .map(TalentCard::from)
        .collect();
    Ok(Json(TalentListResponse { items, total }))
}
