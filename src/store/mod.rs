//! Datastore seams consumed by the exam services.
//!
//! The services only ever talk to these traits, so the same lifecycle runs
//! against Postgres in production and against [`InMemoryStore`] in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;
use crate::models::certificate::Certificate;
use crate::models::exam::{Exam, ExamCategory};
use crate::models::exam_attempt::{AttemptScore, AttemptStatus, ExamAttempt};
use crate::models::question::{Question, QuestionType};
use crate::models::question_response::{NewQuestionResponse, QuestionResponse};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Keeps `page * limit` inside `i64` for any caller-supplied page.
const MAX_PAGE: i64 = i64::MAX / 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            limit: limit.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttemptFilter {
    pub user_id: Option<Uuid>,
    pub exam_id: Option<Uuid>,
    pub status: Option<AttemptStatus>,
    pub is_passed: Option<bool>,
    pub started_from: Option<DateTime<Utc>>,
    pub started_to: Option<DateTime<Utc>>,
}

impl AttemptFilter {
    pub fn matches(&self, attempt: &ExamAttempt) -> bool {
        self.user_id.map_or(true, |v| attempt.user_id == v)
            && self.exam_id.map_or(true, |v| attempt.exam_id == v)
            && self.status.map_or(true, |v| attempt.status == v)
            && self.is_passed.map_or(true, |v| attempt.is_passed == Some(v))
            && self.started_from.map_or(true, |v| attempt.started_at >= v)
            && self.started_to.map_or(true, |v| attempt.started_at <= v)
    }
}

/// Result of the serialized count-then-insert on attempt creation.
#[derive(Debug, Clone)]
pub enum AttemptSlot {
    Created(ExamAttempt),
    LimitReached { used: i64 },
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Questions of one category; `question_type: None` means every type.
    /// With `active_only` only active, public questions are returned.
    async fn find_questions_by_category_and_type(
        &self,
        category_id: Uuid,
        question_type: Option<QuestionType>,
        active_only: bool,
    ) -> Result<Vec<Question>>;

    async fn find_question_by_id(&self, id: Uuid) -> Result<Option<Question>>;

    async fn find_category(&self, id: Uuid) -> Result<Option<ExamCategory>>;
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn find_exam_by_id(&self, id: Uuid) -> Result<Option<Exam>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Attempts counted against `max_retakes` (in progress or completed).
    async fn count_attempts(&self, exam_id: Uuid, user_id: Uuid) -> Result<i64>;

    /// Re-counts and inserts under mutual exclusion on `(exam_id, user_id)`.
    async fn create_attempt_within_limit(
        &self,
        attempt: ExamAttempt,
        max_retakes: i32,
    ) -> Result<AttemptSlot>;

    async fn find_attempt(&self, id: Uuid) -> Result<Option<ExamAttempt>>;

    /// Insert or overwrite the response keyed by `(attempt_id, question_id)`.
    /// Fails with `NotInProgress` once the attempt has left `IN_PROGRESS`.
    async fn upsert_response(&self, response: NewQuestionResponse) -> Result<QuestionResponse>;

    async fn list_responses(&self, attempt_id: Uuid) -> Result<Vec<QuestionResponse>>;

    /// Every question the user has answered in any attempt of this exam.
    async fn answered_question_ids(&self, exam_id: Uuid, user_id: Uuid) -> Result<HashSet<Uuid>>;

    /// Moves an in-progress attempt to completed. Returns `None` when the
    /// attempt was not in progress, leaving it untouched.
    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        score: &AttemptScore,
    ) -> Result<Option<ExamAttempt>>;

    /// Newest first. Without pagination every match is returned.
    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<ExamAttempt>, i64)>;
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn find_certificate_by_attempt(&self, attempt_id: Uuid) -> Result<Option<Certificate>>;

    /// Fails with `CertificateExists` when the attempt already has one.
    async fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate>;

    async fn list_certificates(
        &self,
        user_id: Uuid,
        exam_id: Option<Uuid>,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<Certificate>, i64)>;
}

pub trait Datastore: QuestionStore + ExamStore + AttemptStore + CertificateStore {}

impl<T> Datastore for T where T: QuestionStore + ExamStore + AttemptStore + CertificateStore {}
