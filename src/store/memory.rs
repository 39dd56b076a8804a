use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::certificate::Certificate;
use crate::models::exam::{Exam, ExamCategory};
use crate::models::exam_attempt::{AttemptScore, AttemptStatus, ExamAttempt};
use crate::models::question::{Question, QuestionType};
use crate::models::question_response::{NewQuestionResponse, QuestionResponse};
use crate::store::{
    AttemptFilter, AttemptSlot, AttemptStore, CertificateStore, ExamStore, Pagination,
    QuestionStore,
};

#[derive(Default)]
struct MemoryState {
    categories: HashMap<Uuid, ExamCategory>,
    exams: HashMap<Uuid, Exam>,
    questions: Vec<Question>,
    attempts: Vec<ExamAttempt>,
    responses: HashMap<(Uuid, Uuid), QuestionResponse>,
    certificates: Vec<Certificate>,
}

/// Process-local datastore. One lock guards everything, which gives every
/// trait method the same atomicity the Postgres store gets from transactions.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_category(&self, category: ExamCategory) {
        self.state.lock().await.categories.insert(category.id, category);
    }

    pub async fn insert_exam(&self, exam: Exam) {
        self.state.lock().await.exams.insert(exam.id, exam);
    }

    pub async fn insert_question(&self, question: Question) {
        let mut state = self.state.lock().await;
        state.questions.retain(|q| q.id != question.id);
        state.questions.push(question);
    }
}

fn paginate<T: Clone>(items: Vec<T>, pagination: Option<Pagination>) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = match pagination {
        Some(p) => items
            .into_iter()
            .skip(p.offset() as usize)
            .take(p.limit as usize)
            .collect(),
        None => items,
    };
    (page, total)
}

#[async_trait]
impl QuestionStore for InMemoryStore {
    async fn find_questions_by_category_and_type(
        &self,
        category_id: Uuid,
        question_type: Option<QuestionType>,
        active_only: bool,
    ) -> Result<Vec<Question>> {
        let state = self.state.lock().await;
        Ok(state
            .questions
            .iter()
            .filter(|q| q.category_id == category_id)
            .filter(|q| question_type.map_or(true, |t| q.question_type == t))
            .filter(|q| !active_only || (q.is_active && q.is_public))
            .cloned()
            .collect())
    }

    async fn find_question_by_id(&self, id: Uuid) -> Result<Option<Question>> {
        let state = self.state.lock().await;
        Ok(state.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<ExamCategory>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }
}

#[async_trait]
impl ExamStore for InMemoryStore {
    async fn find_exam_by_id(&self, id: Uuid) -> Result<Option<Exam>> {
        Ok(self.state.lock().await.exams.get(&id).cloned())
    }
}

fn counted_attempts(state: &MemoryState, exam_id: Uuid, user_id: Uuid) -> i64 {
    state
        .attempts
        .iter()
        .filter(|a| a.exam_id == exam_id && a.user_id == user_id)
        .filter(|a| matches!(a.status, AttemptStatus::InProgress | AttemptStatus::Completed))
        .count() as i64
}

#[async_trait]
impl AttemptStore for InMemoryStore {
    async fn count_attempts(&self, exam_id: Uuid, user_id: Uuid) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(counted_attempts(&state, exam_id, user_id))
    }

    async fn create_attempt_within_limit(
        &self,
        attempt: ExamAttempt,
        max_retakes: i32,
    ) -> Result<AttemptSlot> {
        let mut state = self.state.lock().await;
        let used = counted_attempts(&state, attempt.exam_id, attempt.user_id);
        if used >= i64::from(max_retakes) {
            return Ok(AttemptSlot::LimitReached { used });
        }
        state.attempts.push(attempt.clone());
        Ok(AttemptSlot::Created(attempt))
    }

    async fn find_attempt(&self, id: Uuid) -> Result<Option<ExamAttempt>> {
        let state = self.state.lock().await;
        Ok(state.attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn upsert_response(&self, response: NewQuestionResponse) -> Result<QuestionResponse> {
        let mut state = self.state.lock().await;
        match state.attempts.iter().find(|a| a.id == response.attempt_id) {
            None => return Err(Error::AttemptNotFound(response.attempt_id)),
            Some(a) if a.status != AttemptStatus::InProgress => {
                return Err(Error::NotInProgress(response.attempt_id))
            }
            Some(_) => {}
        }
        let key = (response.attempt_id, response.question_id);
        let id = state
            .responses
            .get(&key)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);
        let row = QuestionResponse {
            id,
            attempt_id: response.attempt_id,
            question_id: response.question_id,
            user_id: response.user_id,
            selected_options: response.selected_options,
            essay_answer: response.essay_answer,
            time_spent: response.time_spent,
            is_correct: response.is_correct,
            answered_at: response.answered_at,
        };
        state.responses.insert(key, row.clone());
        Ok(row)
    }

    async fn list_responses(&self, attempt_id: Uuid) -> Result<Vec<QuestionResponse>> {
        let state = self.state.lock().await;
        let mut rows: Vec<QuestionResponse> = state
            .responses
            .values()
            .filter(|r| r.attempt_id == attempt_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.answered_at);
        Ok(rows)
    }

    async fn answered_question_ids(&self, exam_id: Uuid, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let state = self.state.lock().await;
        let attempt_ids: HashSet<Uuid> = state
            .attempts
            .iter()
            .filter(|a| a.exam_id == exam_id && a.user_id == user_id)
            .map(|a| a.id)
            .collect();
        Ok(state
            .responses
            .values()
            .filter(|r| attempt_ids.contains(&r.attempt_id))
            .map(|r| r.question_id)
            .collect())
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        score: &AttemptScore,
    ) -> Result<Option<ExamAttempt>> {
        let mut state = self.state.lock().await;
        let Some(attempt) = state
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt_id && a.status == AttemptStatus::InProgress)
        else {
            return Ok(None);
        };
        attempt.status = AttemptStatus::Completed;
        attempt.completed_at = Some(score.completed_at);
        attempt.total_marks = Some(score.total_marks);
        attempt.obtained_marks = Some(score.obtained_marks);
        attempt.percentage = Some(score.percentage);
        attempt.is_passed = Some(score.is_passed);
        Ok(Some(attempt.clone()))
    }

    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<ExamAttempt>, i64)> {
        let state = self.state.lock().await;
        let mut rows: Vec<ExamAttempt> = state
            .attempts
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(paginate(rows, pagination))
    }
}

#[async_trait]
impl CertificateStore for InMemoryStore {
    async fn find_certificate_by_attempt(&self, attempt_id: Uuid) -> Result<Option<Certificate>> {
        let state = self.state.lock().await;
        Ok(state
            .certificates
            .iter()
            .find(|c| c.attempt_id == attempt_id)
            .cloned())
    }

    async fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate> {
        let mut state = self.state.lock().await;
        if state
            .certificates
            .iter()
            .any(|c| c.attempt_id == certificate.attempt_id)
        {
            return Err(Error::CertificateExists(certificate.attempt_id));
        }
        state.certificates.push(certificate.clone());
        Ok(certificate)
    }

    async fn list_certificates(
        &self,
        user_id: Uuid,
        exam_id: Option<Uuid>,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<Certificate>, i64)> {
        let state = self.state.lock().await;
        let mut rows: Vec<Certificate> = state
            .certificates
            .iter()
            .filter(|c| c.user_id == user_id && exam_id.map_or(true, |e| c.exam_id == e))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(paginate(rows, pagination))
    }
}
