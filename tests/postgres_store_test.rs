use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use exam_backend::error::Error;
use exam_backend::models::certificate::Certificate;
use exam_backend::models::exam_attempt::{AttemptScore, AttemptStatus, ExamAttempt};
use exam_backend::models::question_response::NewQuestionResponse;
use exam_backend::store::{
    AttemptFilter, AttemptSlot, AttemptStore, CertificateStore, Pagination, PgStore,
};

/// Migrated pool, or `None` when no database is configured for this run.
async fn pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Some(pool)
}

/// Inserts a category, an exam and one question; returns `(exam_id, question_id)`.
async fn seed(pool: &PgPool) -> (Uuid, Uuid) {
    let category_id = Uuid::new_v4();
    sqlx::query("INSERT INTO exam_categories (id, name) VALUES ($1, $2)")
        .bind(category_id)
        .bind("Store test")
        .execute(pool)
        .await
        .expect("seed category");

    let exam_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO exams (id, category_id, title, duration_minutes, max_retakes)
           VALUES ($1, $2, $3, 30, 1)"#,
    )
    .bind(exam_id)
    .bind(category_id)
    .bind("Store exam")
    .execute(pool)
    .await
    .expect("seed exam");

    let question_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO questions (id, category_id, question_type, text)
           VALUES ($1, $2, 'MULTIPLE_CHOICE', $3)"#,
    )
    .bind(question_id)
    .bind(category_id)
    .bind("2 + 2?")
    .execute(pool)
    .await
    .expect("seed question");

    (exam_id, question_id)
}

fn answer(attempt_id: Uuid, question_id: Uuid, user_id: Uuid, is_correct: bool) -> NewQuestionResponse {
    NewQuestionResponse {
        attempt_id,
        question_id,
        user_id,
        selected_options: vec![Uuid::new_v4()],
        essay_answer: None,
        time_spent: 7,
        is_correct,
        answered_at: Utc::now(),
    }
}

#[tokio::test]
async fn postgres_store_enforces_attempt_lifecycle() {
    let Some(pool) = pool().await else {
        return;
    };
    let (exam_id, question_id) = seed(&pool).await;
    let store = PgStore::new(pool);
    let user_id = Uuid::new_v4();

    let slot = store
        .create_attempt_within_limit(ExamAttempt::new(exam_id, user_id, Utc::now()), 1)
        .await
        .unwrap();
    let AttemptSlot::Created(attempt) = slot else {
        panic!("first attempt should fit under the limit");
    };
    assert_eq!(attempt.status, AttemptStatus::InProgress);
    assert!(matches!(
        store
            .create_attempt_within_limit(ExamAttempt::new(exam_id, user_id, Utc::now()), 1)
            .await
            .unwrap(),
        AttemptSlot::LimitReached { used: 1 }
    ));

    let first = store
        .upsert_response(answer(attempt.id, question_id, user_id, false))
        .await
        .unwrap();
    let second = store
        .upsert_response(answer(attempt.id, question_id, user_id, true))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    let responses = store.list_responses(attempt.id).await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_correct);

    let score = AttemptScore {
        total_marks: 1,
        obtained_marks: 1,
        percentage: Decimal::new(100, 0),
        is_passed: true,
        completed_at: Utc::now(),
    };
    let completed = store.complete_attempt(attempt.id, &score).await.unwrap().unwrap();
    assert_eq!(completed.status, AttemptStatus::Completed);
    assert_eq!(completed.obtained_marks, Some(1));
    assert!(store.complete_attempt(attempt.id, &score).await.unwrap().is_none());

    assert!(matches!(
        store
            .upsert_response(answer(attempt.id, question_id, user_id, false))
            .await,
        Err(Error::NotInProgress(id)) if id == attempt.id
    ));
    assert!(store.list_responses(attempt.id).await.unwrap()[0].is_correct);

    let issued_at = Utc::now();
    let certificate = Certificate {
        id: Uuid::new_v4(),
        user_id,
        exam_id,
        attempt_id: attempt.id,
        certificate_number: format!("CERT-{}-STORETEST", issued_at.timestamp_millis()),
        status: "EARNED".to_string(),
        is_active: true,
        issued_at,
        expires_at: issued_at + Duration::days(365),
    };
    store.insert_certificate(certificate.clone()).await.unwrap();
    let duplicate = Certificate {
        id: Uuid::new_v4(),
        certificate_number: format!("{}-2", certificate.certificate_number),
        ..certificate
    };
    assert!(matches!(
        store.insert_certificate(duplicate).await,
        Err(Error::CertificateExists(id)) if id == attempt.id
    ));

    let filter = AttemptFilter {
        user_id: Some(user_id),
        ..Default::default()
    };
    let (rows, total) = store
        .list_attempts(&filter, Some(Pagination::new(i64::MAX, 10)))
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(total, 1);
}
