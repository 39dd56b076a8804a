use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::middleware::{
    auth::{require_admin, require_user},
    rate_limit::{rps_middleware, RateLimiter},
};
use crate::AppState;

pub mod analytics;
pub mod attempts;
pub mod certificates;
pub mod health;

/// Every exam route. Identity is checked before the per-user rate limit.
pub fn api_router(state: AppState, rps: u32) -> Router {
    let user_api = Router::new()
        .route("/api/exams/:exam_id/attempts", post(attempts::start_attempt))
        .route("/api/attempts/:attempt_id", get(attempts::get_attempt))
        .route(
            "/api/attempts/:attempt_id/responses",
            put(attempts::submit_response),
        )
        .route(
            "/api/attempts/:attempt_id/complete",
            post(attempts::complete_attempt),
        )
        .route("/api/attempts/:attempt_id/results", get(attempts::get_results))
        .route(
            "/api/attempts/:attempt_id/certificate",
            post(certificates::generate_certificate),
        )
        .route("/api/me/attempts", get(attempts::list_history))
        .route("/api/me/stats", get(attempts::get_stats))
        .route("/api/me/certificates", get(certificates::list_certificates))
        .route(
            "/api/me/certificates/backfill",
            post(certificates::backfill_certificates),
        )
        .layer(from_fn_with_state(RateLimiter::new(rps), rps_middleware))
        .layer(from_fn_with_state(state.clone(), require_user));

    let admin_api = Router::new()
        .route("/api/admin/analytics/exams", get(analytics::exam_analytics))
        .layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health::health))
        .merge(user_api)
        .merge(admin_api)
        .with_state(state)
}
