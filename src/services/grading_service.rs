use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::question::{AnswerKey, Question};

const BLANK_SEPARATOR: &str = " | ";
const BLANK_PREFIX: &str = "Blank ";

/// A student's raw answer to one question, as submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Submission<'a> {
    pub selected_options: &'a [Uuid],
    pub essay_answer: Option<&'a str>,
}

/// Pure correctness checks. No I/O, no side effects.
pub struct GradingService;

impl GradingService {
    pub fn grade(question: &Question, submission: Submission<'_>) -> bool {
        match question.answer_key() {
            AnswerKey::ChoiceSet(correct) => Self::same_option_set(&correct, submission.selected_options),
            // Position and pairing are not checked: any permutation of the
            // right option ids is accepted.
            key @ (AnswerKey::OrderedSequence(_) | AnswerKey::PairSet(_)) => {
                Self::same_option_set(&key.option_ids(), submission.selected_options)
            }
            AnswerKey::BlankList(expected) => match submission.essay_answer {
                Some(raw) => Self::blanks_match(&expected, raw),
                None => {
                    tracing::debug!(question_id = %question.id, "fill-in-the-blank answer missing");
                    false
                }
            },
            // Short answers and essays need a human; never auto-credited.
            AnswerKey::Manual => false,
        }
    }

    fn same_option_set(correct: &BTreeSet<Uuid>, selected: &[Uuid]) -> bool {
        let selected: BTreeSet<Uuid> = selected.iter().copied().collect();
        *correct == selected
    }

    fn blanks_match(expected: &[String], raw: &str) -> bool {
        let given = Self::parse_blank_answers(raw);
        if given.len() != expected.len() {
            return false;
        }
        expected
            .iter()
            .zip(given.iter())
            .all(|(want, got)| want.trim().to_lowercase() == got.to_lowercase())
    }

    /// Parses `"Blank 1: a | Blank 2: b"` into `["a", "b"]`, ordered by blank
    /// number. Malformed or empty segments are dropped.
    pub fn parse_blank_answers(raw: &str) -> Vec<String> {
        let mut blanks: Vec<(u32, String)> = raw
            .split(BLANK_SEPARATOR)
            .filter_map(|part| {
                let rest = part.strip_prefix(BLANK_PREFIX)?;
                let (index, value) = rest.split_once(": ")?;
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let index: u32 = index.parse().ok()?;
                let value = value.trim();
                (!value.is_empty()).then(|| (index, value.to_string()))
            })
            .collect();
        blanks.sort_by_key(|(index, _)| *index);
        blanks.into_iter().map(|(_, value)| value).collect()
    }

    /// Inverse of [`parse_blank_answers`](Self::parse_blank_answers), numbering from 1.
    pub fn encode_blank_answers<S: AsRef<str>>(values: &[S]) -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}{}: {}", BLANK_PREFIX, i + 1, v.as_ref()))
            .collect::<Vec<_>>()
            .join(BLANK_SEPARATOR)
    }
}
