#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exam_backend::config::Config;
use exam_backend::error::Result;
use exam_backend::models::exam::{Exam, ExamCategory};
use exam_backend::models::question::{Difficulty, Question, QuestionOption, QuestionType};
use exam_backend::services::notification_service::{ExamEvent, Notifier};
use exam_backend::store::InMemoryStore;
use rust_decimal::Decimal;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        jwt_secret: JWT_SECRET.into(),
        public_rps: 1000,
        notification_webhook_url: None,
        webhook_secret: None,
        certificate_validity_days: 365,
        default_passing_marks: 50.0,
    }
}

/// Keeps every dispatched event for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<ExamEvent>>,
}

impl RecordingNotifier {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &ExamEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn option(question_id: Uuid, text: &str, is_correct: bool, sort_order: i32) -> QuestionOption {
    QuestionOption {
        id: Uuid::new_v4(),
        question_id,
        text: text.to_string(),
        is_correct,
        sort_order,
    }
}

pub fn choice_question(category_id: Uuid, question_type: QuestionType) -> Question {
    let id = Uuid::new_v4();
    Question {
        id,
        category_id,
        question_type,
        text: "Which of these are correct?".into(),
        difficulty: Difficulty::Medium,
        marks: 1,
        is_active: true,
        is_public: true,
        options: vec![
            option(id, "A", true, 1),
            option(id, "B", true, 2),
            option(id, "C", false, 3),
        ],
    }
}

pub fn blank_question(category_id: Uuid) -> Question {
    let id = Uuid::new_v4();
    Question {
        id,
        category_id,
        question_type: QuestionType::FillInTheBlank,
        text: "The capital of France is ___ and the revolution began in ___.".into(),
        difficulty: Difficulty::Easy,
        marks: 1,
        is_active: true,
        is_public: true,
        options: vec![option(id, "Paris", true, 1), option(id, "1789", true, 2)],
    }
}

pub fn exam(category_id: Uuid) -> Exam {
    Exam {
        id: Uuid::new_v4(),
        category_id,
        title: "Integration exam".into(),
        instructions: Some("Answer everything".into()),
        is_active: true,
        total_questions: Some(4),
        essay_questions_count: 0,
        multiple_choice_questions_count: 3,
        short_answer_questions_count: 0,
        fill_in_the_blank_questions_count: 1,
        true_false_questions_count: 0,
        matching_questions_count: 0,
        ordering_questions_count: 0,
        duration_minutes: 45,
        passing_marks: Some(Decimal::new(60, 0)),
        max_retakes: 2,
        question_overlap_percentage: Some(Decimal::new(0, 0)),
        randomize_questions: true,
        randomize_options: true,
        created_at: None,
        updated_at: None,
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub exam: Exam,
    pub questions: Vec<Question>,
}

impl Fixture {
    pub fn question(&self, id: Uuid) -> &Question {
        self.questions.iter().find(|q| q.id == id).unwrap()
    }
}

/// One category with six choice questions and two fill-in questions.
pub async fn seed() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let category = ExamCategory {
        id: Uuid::new_v4(),
        name: "General knowledge".into(),
        is_active: true,
    };
    let exam = exam(category.id);

    let mut questions = Vec::new();
    for i in 0..6 {
        let question_type = if i % 2 == 0 {
            QuestionType::MultipleChoice
        } else {
            QuestionType::SingleChoice
        };
        questions.push(choice_question(category.id, question_type));
    }
    questions.push(blank_question(category.id));
    questions.push(blank_question(category.id));

    store.insert_category(category).await;
    store.insert_exam(exam.clone()).await;
    for q in &questions {
        store.insert_question(q.clone()).await;
    }

    Fixture {
        store,
        exam,
        questions,
    }
}
