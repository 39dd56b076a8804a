use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::exam_dto::{
    AnalyticsQuery, AttemptDetailsResponse, AttemptResultsResponse, HistoryQuery, Paginated,
    ResponseView,
};
use crate::error::{Error, Result};
use crate::models::exam_attempt::{AttemptScore, AttemptStatus, ExamAttempt};
use crate::models::question_response::QuestionResponse;
use crate::store::{AttemptFilter, Datastore, Pagination};

/// Scored summary of one completed attempt.
///
/// Only recorded responses count: a question the student never answered adds
/// to neither `correct_answers` nor `total_questions`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub total_questions: i32,
    pub correct_answers: i32,
    pub score: i32,
    pub percentage: f64,
    pub is_passed: bool,
}

impl AttemptOutcome {
    pub fn to_score(&self, completed_at: DateTime<Utc>) -> AttemptScore {
        AttemptScore {
            total_marks: self.total_questions,
            obtained_marks: self.score,
            percentage: Decimal::from_f64(self.percentage)
                .unwrap_or_else(|| Decimal::new(0, 0))
                .round_dp(2),
            is_passed: self.is_passed,
            completed_at,
        }
    }

    /// Rebuilds the outcome from the score frozen at completion. Response rows
    /// are not consulted, so the figures always agree with each other.
    pub fn from_attempt(attempt: &ExamAttempt) -> Option<Self> {
        if attempt.status != AttemptStatus::Completed {
            return None;
        }
        Some(Self {
            total_questions: attempt.total_marks.unwrap_or(0),
            correct_answers: attempt.obtained_marks.unwrap_or(0),
            score: attempt.obtained_marks.unwrap_or(0),
            percentage: attempt.percentage.and_then(|p| p.to_f64()).unwrap_or(0.0),
            is_passed: attempt.is_passed.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserExamStats {
    pub total_attempts: i64,
    pub passed_attempts: i64,
    pub certificates: i64,
    pub pass_rate: f64,
    pub average_score: f64,
    pub average_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamAnalytics {
    pub exam_id: Option<Uuid>,
    pub total_attempts: i64,
    pub completed_attempts: i64,
    pub passed_attempts: i64,
    pub completion_rate: f64,
    pub pass_rate: f64,
    pub average_obtained_marks: f64,
    pub average_total_marks: f64,
    pub average_percentage: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio_percent(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

fn average<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n > 0 {
        sum / n as f64
    } else {
        0.0
    }
}

/// Deterministic folds over stored rows.
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn tally(responses: &[QuestionResponse], passing_marks: f64) -> AttemptOutcome {
        let total_questions = responses.len() as i32;
        let correct_answers = responses.iter().filter(|r| r.is_correct).count() as i32;
        let percentage = if total_questions > 0 {
            f64::from(correct_answers) / f64::from(total_questions) * 100.0
        } else {
            0.0
        };
        AttemptOutcome {
            total_questions,
            correct_answers,
            score: correct_answers,
            percentage,
            is_passed: percentage >= passing_marks,
        }
    }

    pub fn user_stats(attempts: &[ExamAttempt], certificates: i64) -> UserExamStats {
        let total_attempts = attempts.len() as i64;
        let passed_attempts = attempts.iter().filter(|a| a.is_passed == Some(true)).count() as i64;
        let completed = || attempts.iter().filter(|a| a.status == AttemptStatus::Completed);
        UserExamStats {
            total_attempts,
            passed_attempts,
            certificates,
            pass_rate: ratio_percent(passed_attempts, total_attempts),
            average_score: average(completed().map(|a| f64::from(a.obtained_marks.unwrap_or(0)))),
            average_percentage: average(
                completed().map(|a| a.percentage.and_then(|p| p.to_f64()).unwrap_or(0.0)),
            ),
        }
    }

    pub fn exam_analytics(exam_id: Option<Uuid>, attempts: &[ExamAttempt]) -> ExamAnalytics {
        let completed: Vec<&ExamAttempt> = attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::Completed)
            .collect();
        let total_attempts = attempts.len() as i64;
        let completed_attempts = completed.len() as i64;
        let passed_attempts = completed.iter().filter(|a| a.is_passed == Some(true)).count() as i64;

        ExamAnalytics {
            exam_id,
            total_attempts,
            completed_attempts,
            passed_attempts,
            completion_rate: round2(ratio_percent(completed_attempts, total_attempts)),
            pass_rate: round2(ratio_percent(passed_attempts, completed_attempts)),
            average_obtained_marks: round2(average(
                completed.iter().map(|a| f64::from(a.obtained_marks.unwrap_or(0))),
            )),
            average_total_marks: round2(average(
                completed.iter().map(|a| f64::from(a.total_marks.unwrap_or(0))),
            )),
            average_percentage: round2(average(
                completed
                    .iter()
                    .map(|a| a.percentage.and_then(|p| p.to_f64()).unwrap_or(0.0)),
            )),
        }
    }
}

#[derive(Clone)]
pub struct ResultService {
    store: Arc<dyn Datastore>,
}

impl ResultService {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    async fn owned_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<ExamAttempt> {
        let attempt = self
            .store
            .find_attempt(attempt_id)
            .await?
            .ok_or(Error::AttemptNotFound(attempt_id))?;
        attempt.ensure_owned_by(user_id)?;
        Ok(attempt)
    }

    /// The attempt with its responses. Correctness stays hidden until completion.
    pub async fn get_attempt_details(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
    ) -> Result<AttemptDetailsResponse> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        let responses = self.store.list_responses(attempt_id).await?;
        let certificate = self.store.find_certificate_by_attempt(attempt_id).await?;
        let reveal = attempt.status == AttemptStatus::Completed;

        Ok(AttemptDetailsResponse {
            results: AttemptOutcome::from_attempt(&attempt),
            certificate_eligible: attempt.is_certificate_eligible(),
            responses: responses
                .iter()
                .map(|r| ResponseView::from_response(r, reveal))
                .collect(),
            attempt,
            certificate,
        })
    }

    pub async fn get_results(&self, attempt_id: Uuid, user_id: Uuid) -> Result<AttemptResultsResponse> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        let results = AttemptOutcome::from_attempt(&attempt)
            .ok_or_else(|| Error::BadRequest("Attempt has not been completed yet".to_string()))?;
        Ok(AttemptResultsResponse {
            attempt_id: attempt.id,
            exam_id: attempt.exam_id,
            completed_at: attempt.completed_at,
            certificate_eligible: attempt.is_certificate_eligible(),
            results,
        })
    }

    pub async fn get_user_exam_history(
        &self,
        user_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<Paginated<ExamAttempt>> {
        let mut filter = AttemptFilter {
            user_id: Some(user_id),
            exam_id: query.exam_id,
            ..Default::default()
        };
        if let Some(status) = query.status {
            let (status, is_passed) = status.as_filter();
            filter.status = Some(status);
            filter.is_passed = is_passed;
        }
        let pagination = Pagination::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));
        let (items, total) = self.store.list_attempts(&filter, Some(pagination)).await?;
        Ok(Paginated::new(items, pagination, total))
    }

    pub async fn get_user_exam_stats(&self, user_id: Uuid) -> Result<UserExamStats> {
        let filter = AttemptFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        let (attempts, _) = self.store.list_attempts(&filter, None).await?;
        let (_, certificates) = self
            .store
            .list_certificates(user_id, None, Some(Pagination::new(1, 1)))
            .await?;
        Ok(ResultAggregator::user_stats(&attempts, certificates))
    }

    pub async fn get_exam_analytics(&self, query: &AnalyticsQuery) -> Result<ExamAnalytics> {
        if let Some(exam_id) = query.exam_id {
            self.store
                .find_exam_by_id(exam_id)
                .await?
                .ok_or(Error::ExamNotFound(exam_id))?;
        }
        let filter = AttemptFilter {
            exam_id: query.exam_id,
            started_from: query.from,
            started_to: query.to,
            ..Default::default()
        };
        let (attempts, _) = self.store.list_attempts(&filter, None).await?;
        Ok(ResultAggregator::exam_analytics(query.exam_id, &attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(is_correct: bool) -> QuestionResponse {
        QuestionResponse {
            id: Uuid::new_v4(),
            attempt_id: Uuid::nil(),
            question_id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            selected_options: vec![],
            essay_answer: None,
            time_spent: 10,
            is_correct,
            answered_at: Utc::now(),
        }
    }

    fn completed(percentage: i64, passed: bool, obtained: i32, total: i32) -> ExamAttempt {
        let mut a = ExamAttempt::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        a.status = AttemptStatus::Completed;
        a.percentage = Some(Decimal::new(percentage, 0));
        a.is_passed = Some(passed);
        a.obtained_marks = Some(obtained);
        a.total_marks = Some(total);
        a
    }

    #[test]
    fn tally_counts_only_recorded_responses() {
        let responses = vec![response(true), response(true), response(false), response(true)];
        let outcome = ResultAggregator::tally(&responses, 70.0);
        assert_eq!(outcome.total_questions, 4);
        assert_eq!(outcome.correct_answers, 3);
        assert_eq!(outcome.score, 3);
        assert!((outcome.percentage - 75.0).abs() < f64::EPSILON);
        assert!(outcome.is_passed);
        assert!(!ResultAggregator::tally(&responses, 80.0).is_passed);
    }

    #[test]
    fn tally_with_no_responses_fails() {
        let outcome = ResultAggregator::tally(&[], 50.0);
        assert_eq!(outcome.total_questions, 0);
        assert_eq!(outcome.percentage, 0.0);
        assert!(!outcome.is_passed);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let responses = vec![response(true), response(false)];
        assert!(ResultAggregator::tally(&responses, 50.0).is_passed);
    }

    #[test]
    fn score_rounds_percentage_to_two_places() {
        let responses = vec![response(true), response(false), response(false)];
        let score = ResultAggregator::tally(&responses, 50.0).to_score(Utc::now());
        assert_eq!(score.percentage, Decimal::new(3333, 2));
        assert_eq!(score.total_marks, 3);
        assert_eq!(score.obtained_marks, 1);
    }

    #[test]
    fn analytics_rates() {
        let mut in_progress = ExamAttempt::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        in_progress.status = AttemptStatus::InProgress;
        let attempts = vec![
            completed(80, true, 8, 10),
            completed(40, false, 4, 10),
            completed(90, true, 9, 10),
            in_progress,
        ];
        let analytics = ResultAggregator::exam_analytics(None, &attempts);
        assert_eq!(analytics.total_attempts, 4);
        assert_eq!(analytics.completed_attempts, 3);
        assert_eq!(analytics.passed_attempts, 2);
        assert_eq!(analytics.completion_rate, 75.0);
        assert_eq!(analytics.pass_rate, 66.67);
        assert_eq!(analytics.average_obtained_marks, 7.0);
        assert_eq!(analytics.average_total_marks, 10.0);
        assert_eq!(analytics.average_percentage, 70.0);
    }

    #[test]
    fn outcome_comes_from_stored_score() {
        let attempt = completed(0, false, 0, 0);
        let outcome = AttemptOutcome::from_attempt(&attempt).unwrap();
        assert_eq!(outcome.total_questions, 0);
        assert_eq!(outcome.correct_answers, 0);
        assert_eq!(outcome.score, 0);

        let attempt = completed(75, true, 3, 4);
        let outcome = AttemptOutcome::from_attempt(&attempt).unwrap();
        assert_eq!(outcome.correct_answers, 3);
        assert_eq!(outcome.total_questions, 4);

        let open = ExamAttempt::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        assert!(AttemptOutcome::from_attempt(&open).is_none());
    }

    #[tokio::test]
    async fn history_accepts_any_page_number() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        let service = ResultService::new(store);
        let page = service
            .get_user_exam_history(
                Uuid::new_v4(),
                &HistoryQuery {
                    page: Some(i64::MAX),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn user_stats_over_no_attempts() {
        let stats = ResultAggregator::user_stats(&[], 0);
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.pass_rate, 0.0);
        assert_eq!(stats.average_percentage, 0.0);
    }
}
