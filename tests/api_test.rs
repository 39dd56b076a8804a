mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use exam_backend::middleware::auth::Claims;
use exam_backend::routes::api_router;
use exam_backend::services::grading_service::GradingService;
use exam_backend::services::notification_service::LogNotifier;
use exam_backend::AppState;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use common::{seed, test_config, Fixture, JWT_SECRET};

fn token(user_id: Uuid, role: Option<&str>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        role: role.map(str::to_string),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

fn router(fixture: &Fixture) -> Router {
    let state = AppState::new(fixture.store.clone(), Arc::new(LogNotifier), &test_config());
    api_router(state, 1000)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", t));
    }
    let request = match body {
        Some(b) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_is_public() {
    let fixture = seed().await;
    let app = router(&fixture);
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn exam_routes_require_a_bearer_token() {
    let fixture = seed().await;
    let app = router(&fixture);
    let uri = format!("/api/exams/{}/attempts", fixture.exam.id);

    let (status, body) = call(&app, "POST", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");

    let (status, body) = call(&app, "POST", &uri, Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn attempt_flow_over_http() {
    let fixture = seed().await;
    let app = router(&fixture);
    let user = Uuid::new_v4();
    let bearer = token(user, None);

    let (status, started) = call(
        &app,
        "POST",
        &format!("/api/exams/{}/attempts", fixture.exam.id),
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(started["total_questions"], 4);
    assert!(!started.to_string().contains("is_correct"));
    let attempt_id = started["attempt_id"].as_str().unwrap().to_string();

    for q in started["questions"].as_array().unwrap() {
        let question_id: Uuid = q["id"].as_str().unwrap().parse().unwrap();
        let question = fixture.question(question_id);
        let body = if q["type"] == "FILL_IN_THE_BLANK" {
            json!({
                "question_id": question_id,
                "time_spent": 12,
                "essay_answer": GradingService::encode_blank_answers(&["Paris", "1789"]),
            })
        } else {
            let correct: Vec<Uuid> = question
                .options
                .iter()
                .filter(|o| o.is_correct)
                .map(|o| o.id)
                .collect();
            json!({ "question_id": question_id, "selected_options": correct, "time_spent": 8 })
        };
        let (status, result) = call(
            &app,
            "PUT",
            &format!("/api/attempts/{}/responses", attempt_id),
            Some(&bearer),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["is_correct"], true);
    }

    let (status, details) = call(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["responses"].as_array().unwrap().len(), 4);
    assert!(details["responses"][0].get("is_correct").is_none());

    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        Some(&token(Uuid::new_v4(), None)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, done) = call(
        &app,
        "POST",
        &format!("/api/attempts/{}/complete", attempt_id),
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "COMPLETED");
    assert_eq!(done["correct_answers"], 4);
    assert_eq!(done["is_passed"], true);
    assert_eq!(done["certificate_eligible"], true);

    let (status, again) = call(
        &app,
        "POST",
        &format!("/api/attempts/{}/complete", attempt_id),
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"], "NOT_IN_PROGRESS");

    let (status, results) = call(
        &app,
        "GET",
        &format!("/api/attempts/{}/results", attempt_id),
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["percentage"], 100.0);

    let (status, cert) = call(
        &app,
        "POST",
        &format!("/api/attempts/{}/certificate", attempt_id),
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(cert["certificate_number"].as_str().unwrap().starts_with("CERT-"));

    let (status, page) = call(&app, "GET", "/api/me/certificates", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);

    let (status, history) = call(
        &app,
        "GET",
        "/api/me/attempts?status=passed&page=1&limit=5",
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["items"].as_array().unwrap().len(), 1);
    assert_eq!(history["pagination"]["limit"], 5);
}

#[tokio::test]
async fn retake_limit_is_reported_with_counts() {
    let fixture = seed().await;
    let app = router(&fixture);
    let bearer = token(Uuid::new_v4(), None);
    let uri = format!("/api/exams/{}/attempts", fixture.exam.id);

    for _ in 0..2 {
        let (status, _) = call(&app, "POST", &uri, Some(&bearer), None).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = call(&app, "POST", &uri, Some(&bearer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "RETAKES_EXCEEDED");
    assert_eq!(body["used"], 2);
    assert_eq!(body["allowed"], 2);
}

#[tokio::test]
async fn unknown_exam_and_invalid_body() {
    let fixture = seed().await;
    let app = router(&fixture);
    let bearer = token(Uuid::new_v4(), None);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/exams/{}/attempts", Uuid::new_v4()),
        Some(&bearer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "EXAM_NOT_FOUND");

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/api/attempts/{}/responses", Uuid::new_v4()),
        Some(&bearer),
        Some(json!({ "question_id": Uuid::new_v4(), "time_spent": -3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn analytics_is_admin_only() {
    let fixture = seed().await;
    let app = router(&fixture);

    let (status, body) = call(
        &app,
        "GET",
        "/api/admin/analytics/exams",
        Some(&token(Uuid::new_v4(), Some("student"))),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/admin/analytics/exams?exam_id={}", fixture.exam.id),
        Some(&token(Uuid::new_v4(), Some("admin"))),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_attempts"], 0);
    assert_eq!(body["completion_rate"], 0.0);
}
