use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A recorded answer, unique per `(attempt_id, question_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub selected_options: Vec<Uuid>,
    pub essay_answer: Option<String>,
    pub time_spent: i32,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuestionResponse {
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub selected_options: Vec<Uuid>,
    pub essay_answer: Option<String>,
    pub time_spent: i32,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}
