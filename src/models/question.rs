use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "question_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Matching,
    Ordering,
    ShortAnswer,
    Essay,
    FillInTheBlank,
}

impl QuestionType {
    pub const ALL: [QuestionType; 8] = [
        QuestionType::SingleChoice,
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::Matching,
        QuestionType::Ordering,
        QuestionType::ShortAnswer,
        QuestionType::Essay,
        QuestionType::FillInTheBlank,
    ];

    /// Types whose options are shown to the student as selectable choices.
    pub fn has_selectable_options(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice
                | QuestionType::MultipleChoice
                | QuestionType::TrueFalse
                | QuestionType::Matching
                | QuestionType::Ordering
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "question_difficulty", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
    /// Pairing key for matching, position for ordering, blank index for fill-in.
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub category_id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub difficulty: Difficulty,
    pub marks: i32,
    pub is_active: bool,
    pub is_public: bool,
    pub options: Vec<QuestionOption>,
}

/// What a correct response looks like, keyed by the structure of the question
/// rather than by the meaning overloaded onto `sort_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    ChoiceSet(BTreeSet<Uuid>),
    OrderedSequence(Vec<Uuid>),
    PairSet(BTreeMap<i32, Uuid>),
    BlankList(Vec<String>),
    Manual,
}

impl AnswerKey {
    /// Option ids that make up the key, regardless of shape.
    pub fn option_ids(&self) -> BTreeSet<Uuid> {
        match self {
            AnswerKey::ChoiceSet(ids) => ids.clone(),
            AnswerKey::OrderedSequence(ids) => ids.iter().copied().collect(),
            AnswerKey::PairSet(pairs) => pairs.values().copied().collect(),
            AnswerKey::BlankList(_) | AnswerKey::Manual => BTreeSet::new(),
        }
    }
}

impl Question {
    fn correct_options_by_sort_order(&self) -> Vec<&QuestionOption> {
        let mut correct: Vec<&QuestionOption> = self.options.iter().filter(|o| o.is_correct).collect();
        correct.sort_by_key(|o| o.sort_order);
        correct
    }

    pub fn answer_key(&self) -> AnswerKey {
        match self.question_type {
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                AnswerKey::ChoiceSet(
                    self.options
                        .iter()
                        .filter(|o| o.is_correct)
                        .map(|o| o.id)
                        .collect(),
                )
            }
            QuestionType::Ordering => AnswerKey::OrderedSequence(
                self.correct_options_by_sort_order()
                    .into_iter()
                    .map(|o| o.id)
                    .collect(),
            ),
            QuestionType::Matching => AnswerKey::PairSet(
                self.correct_options_by_sort_order()
                    .into_iter()
                    .map(|o| (o.sort_order, o.id))
                    .collect(),
            ),
            QuestionType::FillInTheBlank => AnswerKey::BlankList(
                self.correct_options_by_sort_order()
                    .into_iter()
                    .map(|o| o.text.clone())
                    .collect(),
            ),
            QuestionType::ShortAnswer | QuestionType::Essay => AnswerKey::Manual,
        }
    }

    /// Student-facing view with every piece of answer data removed.
    pub fn to_public(&self) -> PublicQuestion {
        let (options, blank_count) = if self.question_type.has_selectable_options() {
            let options = self
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect();
            (options, None)
        } else if self.question_type == QuestionType::FillInTheBlank {
            (Vec::new(), Some(self.options.iter().filter(|o| o.is_correct).count()))
        } else {
            (Vec::new(), None)
        };

        PublicQuestion {
            id: self.id,
            question_type: self.question_type,
            text: self.text.clone(),
            difficulty: self.difficulty,
            marks: self.marks,
            options,
            blank_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub difficulty: Difficulty,
    pub marks: i32,
    pub options: Vec<PublicOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blank_count: Option<usize>,
}
