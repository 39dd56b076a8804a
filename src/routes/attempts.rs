use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::dto::exam_dto::{HistoryQuery, SubmitResponseRequest};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::AppState;

pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let started = state.attempt_service.start_attempt(exam_id, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

pub async fn submit_response(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<impl IntoResponse> {
    let result = state
        .attempt_service
        .submit_response(attempt_id, user.user_id, payload)
        .await?;
    Ok(Json(result))
}

pub async fn complete_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let completed = state
        .attempt_service
        .complete_attempt(attempt_id, user.user_id)
        .await?;
    Ok(Json(completed))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let details = state
        .result_service
        .get_attempt_details(attempt_id, user.user_id)
        .await?;
    Ok(Json(details))
}

pub async fn get_results(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let results = state.result_service.get_results(attempt_id, user.user_id).await?;
    Ok(Json(results))
}

pub async fn list_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .result_service
        .get_user_exam_history(user.user_id, &query)
        .await?;
    Ok(Json(page))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let stats = state.result_service.get_user_exam_stats(user.user_id).await?;
    Ok(Json(stats))
}
