use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::certificate::Certificate;
use crate::models::exam_attempt::{AttemptStatus, ExamAttempt};
use crate::models::question::PublicQuestion;
use crate::models::question_response::QuestionResponse;
use crate::services::result_service::AttemptOutcome;
use crate::store::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub exam_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub total_questions: usize,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitResponseRequest {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_options: Vec<Uuid>,
    #[serde(default)]
    #[validate(range(min = 0, message = "time_spent must not be negative"))]
    pub time_spent: i32,
    /// Free text for short answers and essays, or the encoded blanks of a
    /// fill-in-the-blank question (`Blank 1: a | Blank 2: b`).
    #[validate(length(max = 20000))]
    pub essay_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponseResult {
    pub response_id: Uuid,
    pub question_id: Uuid,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteAttemptResponse {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub completed_at: DateTime<Utc>,
    pub certificate_eligible: bool,
    #[serde(flatten)]
    pub results: AttemptOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseView {
    pub id: Uuid,
    pub question_id: Uuid,
    pub selected_options: Vec<Uuid>,
    pub essay_answer: Option<String>,
    pub time_spent: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub answered_at: DateTime<Utc>,
}

impl ResponseView {
    pub fn from_response(response: &QuestionResponse, reveal_correctness: bool) -> Self {
        Self {
            id: response.id,
            question_id: response.question_id,
            selected_options: response.selected_options.clone(),
            essay_answer: response.essay_answer.clone(),
            time_spent: response.time_spent,
            is_correct: reveal_correctness.then_some(response.is_correct),
            answered_at: response.answered_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptDetailsResponse {
    pub attempt: ExamAttempt,
    pub responses: Vec<ResponseView>,
    pub results: Option<AttemptOutcome>,
    pub certificate_eligible: bool,
    pub certificate: Option<Certificate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResultsResponse {
    pub attempt_id: Uuid,
    pub exam_id: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
    pub certificate_eligible: bool,
    #[serde(flatten)]
    pub results: AttemptOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryStatus {
    #[serde(rename = "passed")]
    Passed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl HistoryStatus {
    /// Status plus optional pass flag to filter attempts on.
    pub fn as_filter(self) -> (AttemptStatus, Option<bool>) {
        match self {
            HistoryStatus::Passed => (AttemptStatus::Completed, Some(true)),
            HistoryStatus::Failed => (AttemptStatus::Completed, Some(false)),
            HistoryStatus::InProgress => (AttemptStatus::InProgress, None),
            HistoryStatus::Completed => (AttemptStatus::Completed, None),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub exam_id: Option<Uuid>,
    pub status: Option<HistoryStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub exam_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub exam_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            items,
            pagination: PageInfo {
                page: pagination.page,
                limit: pagination.limit,
                total,
                pages: pagination.pages(total),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillResponse {
    pub generated_count: usize,
}
