use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::exam_dto::{
    CompleteAttemptResponse, StartAttemptResponse, SubmitResponseRequest, SubmitResponseResult,
};
use crate::error::{Error, Result};
use crate::models::exam_attempt::{AttemptTransition, ExamAttempt};
use crate::models::question_response::NewQuestionResponse;
use crate::services::grading_service::{GradingService, Submission};
use crate::services::notification_service::{notify_best_effort, ExamEvent, Notifier};
use crate::services::question_selector::{QuestionSelector, SelectionRequest};
use crate::services::result_service::ResultAggregator;
use crate::store::{AttemptSlot, Datastore};

/// Drives an attempt through `IN_PROGRESS -> COMPLETED`.
#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn Datastore>,
    selector: QuestionSelector,
    notifier: Arc<dyn Notifier>,
    default_passing_marks: f64,
}

impl AttemptService {
    pub fn new(store: Arc<dyn Datastore>, notifier: Arc<dyn Notifier>, default_passing_marks: f64) -> Self {
        Self {
            selector: QuestionSelector::new(store.clone()),
            store,
            notifier,
            default_passing_marks,
        }
    }

    /// Questions are selected before the attempt row exists, so a failed
    /// selection leaves nothing behind.
    pub async fn start_attempt(&self, exam_id: Uuid, user_id: Uuid) -> Result<StartAttemptResponse> {
        let exam = self
            .store
            .find_exam_by_id(exam_id)
            .await?
            .ok_or(Error::ExamNotFound(exam_id))?;
        if !exam.is_active {
            return Err(Error::ExamInactive(exam_id));
        }

        let used = self.store.count_attempts(exam_id, user_id).await?;
        if used >= i64::from(exam.max_retakes) {
            return Err(Error::RetakesExceeded {
                used,
                allowed: exam.max_retakes,
            });
        }

        let questions = self
            .selector
            .select_questions(&SelectionRequest::for_exam(&exam, user_id))
            .await?;

        let attempt = match self
            .store
            .create_attempt_within_limit(ExamAttempt::new(exam_id, user_id, Utc::now()), exam.max_retakes)
            .await?
        {
            AttemptSlot::Created(attempt) => attempt,
            AttemptSlot::LimitReached { used } => {
                return Err(Error::RetakesExceeded {
                    used,
                    allowed: exam.max_retakes,
                })
            }
        };

        tracing::info!(
            attempt_id = %attempt.id,
            exam_id = %exam_id,
            user_id = %user_id,
            questions = questions.len(),
            attempt_number = used + 1,
            "Exam attempt started"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            ExamEvent::AttemptStarted {
                attempt_id: attempt.id,
                user_id,
                exam_id,
                exam_title: exam.title.clone(),
                duration_minutes: exam.duration_minutes,
            },
        )
        .await;

        Ok(StartAttemptResponse {
            attempt_id: attempt.id,
            exam_id,
            status: attempt.status,
            started_at: attempt.started_at,
            duration_seconds: exam.duration_seconds(),
            total_questions: questions.len(),
            questions: questions.iter().map(|q| q.to_public()).collect(),
        })
    }

    /// Grades and stores one answer. Resubmitting a question overwrites it.
    pub async fn submit_response(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
        request: SubmitResponseRequest,
    ) -> Result<SubmitResponseResult> {
        request.validate()?;

        let attempt = self
            .store
            .find_attempt(attempt_id)
            .await?
            .ok_or(Error::AttemptNotFound(attempt_id))?;
        attempt.ensure_owned_by(user_id)?;
        attempt.ensure_in_progress()?;

        let question = self
            .store
            .find_question_by_id(request.question_id)
            .await?
            .ok_or(Error::QuestionNotFound(request.question_id))?;

        let mut seen = HashSet::new();
        let selected_options: Vec<Uuid> = request
            .selected_options
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        let is_correct = GradingService::grade(
            &question,
            Submission {
                selected_options: &selected_options,
                essay_answer: request.essay_answer.as_deref(),
            },
        );

        let response = self
            .store
            .upsert_response(NewQuestionResponse {
                attempt_id,
                question_id: question.id,
                user_id,
                selected_options,
                essay_answer: request.essay_answer,
                time_spent: request.time_spent,
                is_correct,
                answered_at: Utc::now(),
            })
            .await?;

        tracing::debug!(
            attempt_id = %attempt_id,
            question_id = %question.id,
            is_correct,
            "Response recorded"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            ExamEvent::AnswerSubmitted {
                attempt_id,
                user_id,
                question_id: question.id,
            },
        )
        .await;

        Ok(SubmitResponseResult {
            response_id: response.id,
            question_id: question.id,
            is_correct,
        })
    }

    /// Scores whatever responses are committed right now and closes the
    /// attempt. Unanswered questions count toward neither side of the ratio.
    pub async fn complete_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<CompleteAttemptResponse> {
        let attempt = self
            .store
            .find_attempt(attempt_id)
            .await?
            .ok_or(Error::AttemptNotFound(attempt_id))?;
        attempt.ensure_owned_by(user_id)?;
        let next = attempt.status.apply(AttemptTransition::Complete, attempt_id)?;

        let exam = self
            .store
            .find_exam_by_id(attempt.exam_id)
            .await?
            .ok_or(Error::ExamNotFound(attempt.exam_id))?;

        let responses = self.store.list_responses(attempt_id).await?;
        let outcome = ResultAggregator::tally(&responses, exam.passing_threshold(self.default_passing_marks));
        let completed_at = Utc::now();

        let completed = self
            .store
            .complete_attempt(attempt_id, &outcome.to_score(completed_at))
            .await?
            .ok_or(Error::NotInProgress(attempt_id))?;

        tracing::info!(
            attempt_id = %attempt_id,
            exam_id = %exam.id,
            user_id = %user_id,
            total_questions = outcome.total_questions,
            correct_answers = outcome.correct_answers,
            percentage = outcome.percentage,
            is_passed = outcome.is_passed,
            "Exam attempt completed"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            ExamEvent::AttemptCompleted {
                attempt_id,
                user_id,
                exam_id: exam.id,
                exam_title: exam.title.clone(),
                results: outcome,
            },
        )
        .await;

        Ok(CompleteAttemptResponse {
            attempt_id,
            status: next,
            completed_at: completed.completed_at.unwrap_or(completed_at),
            certificate_eligible: completed.is_certificate_eligible(),
            results: outcome,
        })
    }
}
