use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::dto::exam_dto::AnalyticsQuery;
use crate::error::Result;
use crate::AppState;

pub async fn exam_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse> {
    let analytics = state.result_service.get_exam_analytics(&query).await?;
    Ok(Json(analytics))
}
