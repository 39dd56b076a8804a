use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::question::QuestionType;

pub const DEFAULT_TOTAL_QUESTIONS: u32 = 10;
pub const DEFAULT_OVERLAP_PERCENTAGE: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamCategory {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub instructions: Option<String>,
    pub is_active: bool,
    pub total_questions: Option<i32>,
    pub essay_questions_count: i32,
    pub multiple_choice_questions_count: i32,
    pub short_answer_questions_count: i32,
    pub fill_in_the_blank_questions_count: i32,
    pub true_false_questions_count: i32,
    pub matching_questions_count: i32,
    pub ordering_questions_count: i32,
    pub duration_minutes: i32,
    pub passing_marks: Option<Decimal>,
    pub max_retakes: i32,
    pub question_overlap_percentage: Option<Decimal>,
    pub randomize_questions: bool,
    pub randomize_options: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Exam {
    pub fn distribution(&self) -> QuestionDistribution {
        QuestionDistribution {
            essay: self.essay_questions_count.max(0) as u32,
            multiple_choice: self.multiple_choice_questions_count.max(0) as u32,
            short_answer: self.short_answer_questions_count.max(0) as u32,
            fill_in_the_blank: self.fill_in_the_blank_questions_count.max(0) as u32,
            true_false: self.true_false_questions_count.max(0) as u32,
            matching: self.matching_questions_count.max(0) as u32,
            ordering: self.ordering_questions_count.max(0) as u32,
        }
    }

    pub fn nominal_total_questions(&self) -> u32 {
        match self.total_questions {
            Some(n) if n > 0 => n as u32,
            _ => DEFAULT_TOTAL_QUESTIONS,
        }
    }

    pub fn overlap_percentage(&self) -> f64 {
        self.question_overlap_percentage
            .and_then(|d| d.to_f64())
            .unwrap_or(DEFAULT_OVERLAP_PERCENTAGE)
            .clamp(0.0, 100.0)
    }

    pub fn passing_threshold(&self, default: f64) -> f64 {
        self.passing_marks.and_then(|d| d.to_f64()).unwrap_or(default)
    }

    pub fn duration_seconds(&self) -> i64 {
        i64::from(self.duration_minutes) * 60
    }
}

/// One of the exam's seven per-type counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionBucket {
    Essay,
    MultipleChoice,
    ShortAnswer,
    FillInTheBlank,
    TrueFalse,
    Matching,
    Ordering,
    /// Untyped draw used when no distribution is configured.
    Any,
}

impl QuestionBucket {
    /// Question types that may fill this bucket. `None` means any type.
    pub fn question_types(self) -> Option<&'static [QuestionType]> {
        match self {
            QuestionBucket::Essay => Some(&[QuestionType::Essay]),
            QuestionBucket::MultipleChoice => {
                Some(&[QuestionType::SingleChoice, QuestionType::MultipleChoice])
            }
            QuestionBucket::ShortAnswer => Some(&[QuestionType::ShortAnswer]),
            QuestionBucket::FillInTheBlank => Some(&[QuestionType::FillInTheBlank]),
            QuestionBucket::TrueFalse => Some(&[QuestionType::TrueFalse]),
            QuestionBucket::Matching => Some(&[QuestionType::Matching]),
            QuestionBucket::Ordering => Some(&[QuestionType::Ordering]),
            QuestionBucket::Any => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDistribution {
    pub essay: u32,
    pub multiple_choice: u32,
    pub short_answer: u32,
    pub fill_in_the_blank: u32,
    pub true_false: u32,
    pub matching: u32,
    pub ordering: u32,
}

impl QuestionDistribution {
    /// Nonzero buckets in presentation order.
    pub fn buckets(&self) -> Vec<(QuestionBucket, u32)> {
        [
            (QuestionBucket::MultipleChoice, self.multiple_choice),
            (QuestionBucket::TrueFalse, self.true_false),
            (QuestionBucket::FillInTheBlank, self.fill_in_the_blank),
            (QuestionBucket::Matching, self.matching),
            (QuestionBucket::Ordering, self.ordering),
            (QuestionBucket::ShortAnswer, self.short_answer),
            (QuestionBucket::Essay, self.essay),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect()
    }

    pub fn total(&self) -> u32 {
        self.buckets().iter().map(|(_, n)| n).sum()
    }

    pub fn is_unspecified(&self) -> bool {
        self.total() == 0
    }
}

/// How far a bucket's pool fell short of the requested count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionShortfall {
    pub bucket: QuestionBucket,
    pub requested: u32,
    pub available: u32,
}
