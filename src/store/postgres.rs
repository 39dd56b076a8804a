use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::certificate::Certificate;
use crate::models::exam::{Exam, ExamCategory};
use crate::models::exam_attempt::{AttemptScore, AttemptStatus, ExamAttempt};
use crate::models::question::{Difficulty, Question, QuestionOption, QuestionType};
use crate::models::question_response::{NewQuestionResponse, QuestionResponse};
use crate::store::{
    AttemptFilter, AttemptSlot, AttemptStore, CertificateStore, ExamStore, Pagination,
    QuestionStore,
};

const EXAM_COLUMNS: &str = r#"
    id, category_id, title, instructions, is_active, total_questions,
    essay_questions_count, multiple_choice_questions_count, short_answer_questions_count,
    fill_in_the_blank_questions_count, true_false_questions_count,
    matching_questions_count, ordering_questions_count,
    duration_minutes, passing_marks, max_retakes, question_overlap_percentage,
    randomize_questions, randomize_options, created_at, updated_at
"#;

const ATTEMPT_COLUMNS: &str = r#"
    id, exam_id, user_id, status, started_at, completed_at,
    total_marks, obtained_marks, percentage, is_passed
"#;

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    category_id: Uuid,
    question_type: QuestionType,
    text: String,
    difficulty: Difficulty,
    marks: i32,
    is_active: bool,
    is_public: bool,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_options(&self, rows: Vec<QuestionRow>) -> Result<Vec<Question>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let options = sqlx::query_as::<_, QuestionOption>(
            r#"
            SELECT id, question_id, text, is_correct, sort_order
            FROM question_options
            WHERE question_id = ANY($1)
            ORDER BY question_id, sort_order
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }

        Ok(rows
            .into_iter()
            .map(|row| Question {
                options: by_question.remove(&row.id).unwrap_or_default(),
                id: row.id,
                category_id: row.category_id,
                question_type: row.question_type,
                text: row.text,
                difficulty: row.difficulty,
                marks: row.marks,
                is_active: row.is_active,
                is_public: row.is_public,
            })
            .collect())
    }
}

#[async_trait]
impl QuestionStore for PgStore {
    async fn find_questions_by_category_and_type(
        &self,
        category_id: Uuid,
        question_type: Option<QuestionType>,
        active_only: bool,
    ) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, category_id, question_type, text, difficulty, marks, is_active, is_public
            FROM questions
            WHERE category_id = $1
              AND ($2::question_type IS NULL OR question_type = $2)
              AND (NOT $3 OR (is_active AND is_public))
            ORDER BY created_at
            "#,
        )
        .bind(category_id)
        .bind(question_type)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        self.attach_options(rows).await
    }

    async fn find_question_by_id(&self, id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, category_id, question_type, text, difficulty, marks, is_active, is_public
            FROM questions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_options(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<ExamCategory>> {
        let category = sqlx::query_as::<_, ExamCategory>(
            r#"SELECT id, name, is_active FROM exam_categories WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn find_exam_by_id(&self, id: Uuid) -> Result<Option<Exam>> {
        let exam = sqlx::query_as::<_, Exam>(&format!(
            "SELECT {} FROM exams WHERE id = $1",
            EXAM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exam)
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn count_attempts(&self, exam_id: Uuid, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM exam_attempts
            WHERE exam_id = $1 AND user_id = $2 AND status IN ('IN_PROGRESS', 'COMPLETED')
            "#,
        )
        .bind(exam_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn create_attempt_within_limit(
        &self,
        attempt: ExamAttempt,
        max_retakes: i32,
    ) -> Result<AttemptSlot> {
        let mut tx = self.pool.begin().await?;

        // Held until commit/rollback; serializes starts per (exam, user).
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("exam_attempt:{}:{}", attempt.exam_id, attempt.user_id))
            .execute(&mut *tx)
            .await?;

        let used: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM exam_attempts
            WHERE exam_id = $1 AND user_id = $2 AND status IN ('IN_PROGRESS', 'COMPLETED')
            "#,
        )
        .bind(attempt.exam_id)
        .bind(attempt.user_id)
        .fetch_one(&mut *tx)
        .await?;

        if used >= i64::from(max_retakes) {
            tx.rollback().await?;
            return Ok(AttemptSlot::LimitReached { used });
        }

        let created = sqlx::query_as::<_, ExamAttempt>(&format!(
            r#"
            INSERT INTO exam_attempts (id, exam_id, user_id, status, started_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.id)
        .bind(attempt.exam_id)
        .bind(attempt.user_id)
        .bind(AttemptStatus::InProgress)
        .bind(attempt.started_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AttemptSlot::Created(created))
    }

    async fn find_attempt(&self, id: Uuid) -> Result<Option<ExamAttempt>> {
        let attempt = sqlx::query_as::<_, ExamAttempt>(&format!(
            "SELECT {} FROM exam_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn upsert_response(&self, response: NewQuestionResponse) -> Result<QuestionResponse> {
        let attempt_id = response.attempt_id;
        let row = sqlx::query_as::<_, QuestionResponse>(
            r#"
            INSERT INTO question_responses (
                id, attempt_id, question_id, user_id, selected_options,
                essay_answer, time_spent, is_correct, answered_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE EXISTS (
                SELECT 1 FROM exam_attempts
                WHERE id = $2 AND status = 'IN_PROGRESS'
                FOR SHARE
            )
            ON CONFLICT (attempt_id, question_id) DO UPDATE SET
                selected_options = EXCLUDED.selected_options,
                essay_answer = EXCLUDED.essay_answer,
                time_spent = EXCLUDED.time_spent,
                is_correct = EXCLUDED.is_correct,
                answered_at = EXCLUDED.answered_at
            RETURNING id, attempt_id, question_id, user_id, selected_options,
                      essay_answer, time_spent, is_correct, answered_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(response.attempt_id)
        .bind(response.question_id)
        .bind(response.user_id)
        .bind(&response.selected_options)
        .bind(&response.essay_answer)
        .bind(response.time_spent)
        .bind(response.is_correct)
        .bind(response.answered_at)
        .fetch_optional(&self.pool)
        .await?;
        // No row means the attempt was completed after the caller checked it.
        row.ok_or(Error::NotInProgress(attempt_id))
    }

    async fn list_responses(&self, attempt_id: Uuid) -> Result<Vec<QuestionResponse>> {
        let rows = sqlx::query_as::<_, QuestionResponse>(
            r#"
            SELECT id, attempt_id, question_id, user_id, selected_options,
                   essay_answer, time_spent, is_correct, answered_at
            FROM question_responses
            WHERE attempt_id = $1
            ORDER BY answered_at
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn answered_question_ids(&self, exam_id: Uuid, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT r.question_id
            FROM question_responses r
            JOIN exam_attempts a ON a.id = r.attempt_id
            WHERE a.exam_id = $1 AND a.user_id = $2
            "#,
        )
        .bind(exam_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        score: &AttemptScore,
    ) -> Result<Option<ExamAttempt>> {
        let updated = sqlx::query_as::<_, ExamAttempt>(&format!(
            r#"
            UPDATE exam_attempts
            SET status = 'COMPLETED', completed_at = $2, total_marks = $3,
                obtained_marks = $4, percentage = $5, is_passed = $6
            WHERE id = $1 AND status = 'IN_PROGRESS'
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .bind(score.completed_at)
        .bind(score.total_marks)
        .bind(score.obtained_marks)
        .bind(score.percentage)
        .bind(score.is_passed)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<ExamAttempt>, i64)> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::uuid IS NULL OR exam_id = $2)
              AND ($3::attempt_status IS NULL OR status = $3)
              AND ($4::bool IS NULL OR is_passed = $4)
              AND ($5::timestamptz IS NULL OR started_at >= $5)
              AND ($6::timestamptz IS NULL OR started_at <= $6)
        "#;

        let rows = sqlx::query_as::<_, ExamAttempt>(&format!(
            "SELECT {} FROM exam_attempts {} ORDER BY started_at DESC LIMIT $7 OFFSET $8",
            ATTEMPT_COLUMNS, WHERE
        ))
        .bind(filter.user_id)
        .bind(filter.exam_id)
        .bind(filter.status)
        .bind(filter.is_passed)
        .bind(filter.started_from)
        .bind(filter.started_to)
        .bind(pagination.map(|p| p.limit))
        .bind(pagination.map_or(0, |p| p.offset()))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM exam_attempts {}", WHERE))
            .bind(filter.user_id)
            .bind(filter.exam_id)
            .bind(filter.status)
            .bind(filter.is_passed)
            .bind(filter.started_from)
            .bind(filter.started_to)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }
}

#[async_trait]
impl CertificateStore for PgStore {
    async fn find_certificate_by_attempt(&self, attempt_id: Uuid) -> Result<Option<Certificate>> {
        let cert = sqlx::query_as::<_, Certificate>(
            r#"
            SELECT id, user_id, exam_id, attempt_id, certificate_number, status,
                   is_active, issued_at, expires_at
            FROM certificates WHERE attempt_id = $1
            "#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cert)
    }

    async fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate> {
        let attempt_id = certificate.attempt_id;
        sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificates (
                id, user_id, exam_id, attempt_id, certificate_number, status,
                is_active, issued_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, exam_id, attempt_id, certificate_number, status,
                      is_active, issued_at, expires_at
            "#,
        )
        .bind(certificate.id)
        .bind(certificate.user_id)
        .bind(certificate.exam_id)
        .bind(certificate.attempt_id)
        .bind(certificate.certificate_number)
        .bind(certificate.status)
        .bind(certificate.is_active)
        .bind(certificate.issued_at)
        .bind(certificate.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::CertificateExists(attempt_id)
            }
            other => Error::from(other),
        })
    }

    async fn list_certificates(
        &self,
        user_id: Uuid,
        exam_id: Option<Uuid>,
        pagination: Option<Pagination>,
    ) -> Result<(Vec<Certificate>, i64)> {
        let rows = sqlx::query_as::<_, Certificate>(
            r#"
            SELECT id, user_id, exam_id, attempt_id, certificate_number, status,
                   is_active, issued_at, expires_at
            FROM certificates
            WHERE user_id = $1 AND ($2::uuid IS NULL OR exam_id = $2)
            ORDER BY issued_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(exam_id)
        .bind(pagination.map(|p| p.limit))
        .bind(pagination.map_or(0, |p| p.offset()))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM certificates WHERE user_id = $1 AND ($2::uuid IS NULL OR exam_id = $2)"#,
        )
        .bind(user_id)
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total))
    }
}
