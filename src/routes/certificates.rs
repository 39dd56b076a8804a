use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::dto::exam_dto::{BackfillResponse, CertificateQuery};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::AppState;

pub async fn generate_certificate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let certificate = state
        .certificate_service
        .generate_certificate(attempt_id, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

pub async fn list_certificates(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CertificateQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .certificate_service
        .list_user_certificates(user.user_id, &query)
        .await?;
    Ok(Json(page))
}

pub async fn backfill_certificates(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let generated_count = state
        .certificate_service
        .auto_generate_certificates(user.user_id)
        .await?;
    Ok(Json(BackfillResponse { generated_count }))
}
