use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

/// Requested lifecycle move. Only `Complete` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptTransition {
    Complete,
}

impl AttemptStatus {
    pub fn apply(self, transition: AttemptTransition, attempt_id: Uuid) -> Result<AttemptStatus> {
        match (self, transition) {
            (AttemptStatus::InProgress, AttemptTransition::Complete) => Ok(AttemptStatus::Completed),
            (AttemptStatus::Completed, AttemptTransition::Complete) => {
                Err(Error::NotInProgress(attempt_id))
            }
        }
    }

    pub fn accepts_responses(self) -> bool {
        match self {
            AttemptStatus::InProgress => true,
            AttemptStatus::Completed => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamAttempt {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub user_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of responses scored, not the exam's nominal question count.
    pub total_marks: Option<i32>,
    pub obtained_marks: Option<i32>,
    pub percentage: Option<Decimal>,
    pub is_passed: Option<bool>,
}

/// Scored fields written once when an attempt completes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptScore {
    pub total_marks: i32,
    pub obtained_marks: i32,
    pub percentage: Decimal,
    pub is_passed: bool,
    pub completed_at: DateTime<Utc>,
}

impl ExamAttempt {
    pub fn new(exam_id: Uuid, user_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exam_id,
            user_id,
            status: AttemptStatus::InProgress,
            started_at,
            completed_at: None,
            total_marks: None,
            obtained_marks: None,
            percentage: None,
            is_passed: None,
        }
    }

    pub fn ensure_owned_by(&self, user_id: Uuid) -> Result<()> {
        if self.user_id != user_id {
            return Err(Error::Unauthorized(format!(
                "Attempt {} does not belong to the current user",
                self.id
            )));
        }
        Ok(())
    }

    pub fn ensure_in_progress(&self) -> Result<()> {
        if !self.status.accepts_responses() {
            return Err(Error::NotInProgress(self.id));
        }
        Ok(())
    }

    pub fn is_certificate_eligible(&self) -> bool {
        self.status == AttemptStatus::Completed && self.is_passed == Some(true)
    }
}
