use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam::{Exam, QuestionBucket, QuestionDistribution, QuestionShortfall};
use crate::models::question::Question;
use crate::store::Datastore;

/// Everything the selector needs to build one attempt's question set.
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub exam_id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    /// Used only when `distribution` is all zero.
    pub total_count: u32,
    pub distribution: QuestionDistribution,
    pub overlap_percentage: f64,
    pub randomize_questions: bool,
    pub randomize_options: bool,
}

impl SelectionRequest {
    pub fn for_exam(exam: &Exam, user_id: Uuid) -> Self {
        Self {
            exam_id: exam.id,
            user_id,
            category_id: exam.category_id,
            total_count: exam.nominal_total_questions(),
            distribution: exam.distribution(),
            overlap_percentage: exam.overlap_percentage(),
            randomize_questions: exam.randomize_questions,
            randomize_options: exam.randomize_options,
        }
    }

    /// Requested count per bucket, falling back to one untyped draw.
    pub fn buckets(&self) -> Vec<(QuestionBucket, u32)> {
        if self.distribution.is_unspecified() {
            vec![(QuestionBucket::Any, self.total_count)]
        } else {
            self.distribution.buckets()
        }
    }
}

/// Candidate pool for one bucket, split by whether the user has seen it.
#[derive(Debug)]
pub struct BucketPool {
    pub bucket: QuestionBucket,
    pub requested: u32,
    pub unseen: Vec<Question>,
    pub seen: Vec<Question>,
}

impl BucketPool {
    pub fn new(bucket: QuestionBucket, requested: u32, pool: Vec<Question>, seen_ids: &HashSet<Uuid>) -> Self {
        let (seen, unseen): (Vec<Question>, Vec<Question>) =
            pool.into_iter().partition(|q| seen_ids.contains(&q.id));
        Self {
            bucket,
            requested,
            unseen,
            seen,
        }
    }

    fn size(&self) -> usize {
        self.unseen.len() + self.seen.len()
    }
}

/// Largest number of repeated questions a bucket of `requested` may carry.
pub fn overlap_cap(requested: u32, overlap_percentage: f64) -> u32 {
    let pct = overlap_percentage.clamp(0.0, 100.0);
    (f64::from(requested) * pct / 100.0).floor() as u32
}

/// Picks questions for each bucket, unseen first, then at most the overlap
/// cap from the seen pool. Every bucket is checked before failing so the
/// error lists all shortfalls at once.
pub fn draw<R: Rng + ?Sized>(
    pools: Vec<BucketPool>,
    overlap_percentage: f64,
    randomize_questions: bool,
    randomize_options: bool,
    rng: &mut R,
) -> Result<Vec<Question>> {
    let mut shortfalls = Vec::new();
    let mut selected = Vec::new();

    for mut pool in pools {
        let requested = pool.requested as usize;
        if pool.size() < requested {
            shortfalls.push(QuestionShortfall {
                bucket: pool.bucket,
                requested: pool.requested,
                available: pool.size() as u32,
            });
            continue;
        }

        let cap = overlap_cap(pool.requested, overlap_percentage) as usize;
        let usable_seen = cap.min(pool.seen.len());
        if pool.unseen.len() + usable_seen < requested {
            shortfalls.push(QuestionShortfall {
                bucket: pool.bucket,
                requested: pool.requested,
                available: (pool.unseen.len() + usable_seen) as u32,
            });
            continue;
        }

        pool.unseen.shuffle(rng);
        let from_unseen = requested.min(pool.unseen.len());
        let mut picked: Vec<Question> = pool.unseen.drain(..from_unseen).collect();
        if picked.len() < requested {
            pool.seen.shuffle(rng);
            let missing = requested - picked.len();
            picked.extend(pool.seen.drain(..missing));
        }
        picked.shuffle(rng);
        selected.extend(picked);
    }

    if !shortfalls.is_empty() {
        return Err(Error::InsufficientQuestions(shortfalls));
    }

    if randomize_questions {
        selected.shuffle(rng);
    }
    if randomize_options {
        for question in &mut selected {
            question.options.shuffle(rng);
        }
    }
    Ok(selected)
}

#[derive(Clone)]
pub struct QuestionSelector {
    store: Arc<dyn Datastore>,
}

impl QuestionSelector {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    pub async fn select_questions(&self, request: &SelectionRequest) -> Result<Vec<Question>> {
        self.store
            .find_category(request.category_id)
            .await?
            .ok_or(Error::CategoryNotFound(request.category_id))?;

        let seen_ids = self
            .store
            .answered_question_ids(request.exam_id, request.user_id)
            .await?;

        let mut pools = Vec::new();
        for (bucket, requested) in request.buckets() {
            let pool = self.load_pool(request.category_id, bucket).await?;
            pools.push(BucketPool::new(bucket, requested, pool, &seen_ids));
        }

        let questions = {
            let mut rng = rand::thread_rng();
            draw(
                pools,
                request.overlap_percentage,
                request.randomize_questions,
                request.randomize_options,
                &mut rng,
            )?
        };

        let repeated = questions.iter().filter(|q| seen_ids.contains(&q.id)).count();
        tracing::info!(
            exam_id = %request.exam_id,
            user_id = %request.user_id,
            selected = questions.len(),
            repeated,
            "Questions selected"
        );
        Ok(questions)
    }

    async fn load_pool(&self, category_id: Uuid, bucket: QuestionBucket) -> Result<Vec<Question>> {
        match bucket.question_types() {
            None => {
                self.store
                    .find_questions_by_category_and_type(category_id, None, true)
                    .await
            }
            Some(types) => {
                let mut pool = Vec::new();
                for question_type in types {
                    pool.extend(
                        self.store
                            .find_questions_by_category_and_type(category_id, Some(*question_type), true)
                            .await?,
                    );
                }
                Ok(pool)
            }
        }
    }
}
