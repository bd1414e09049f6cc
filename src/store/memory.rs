// src/store/memory.rs

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{AttemptArchive, QuestionSource};
use crate::{
    error::AppError,
    exam::{FinalizedSession, Question},
    models::{
        exam_record::ExamRecord,
        question::{CreateQuestionRequest, QuestionRow},
    },
};

/// In-process store, used by the tests and for running without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    questions: RwLock<Vec<QuestionRow>>,
    attempts: RwLock<Vec<ExamRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl QuestionSource for MemoryStore {
    async fn questions_for_exam(&self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        let rows = self.questions.read().await;
        rows.iter()
            .filter(|row| row.exam_id == exam_id)
            .cloned()
            .map(Question::try_from)
            .collect()
    }

    async fn add_question(&self, exam_id: i64, req: &CreateQuestionRequest) -> Result<i64, AppError> {
        let id = self.next_id();
        self.questions.write().await.push(QuestionRow {
            id,
            exam_id,
            kind: req.kind.clone(),
            content: req.content.clone(),
            options: Json(req.options.clone()),
            correct_index: req.correct_index,
            points: req.points,
        });
        Ok(id)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let mut rows = self.questions.write().await;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() != before)
    }
}

#[async_trait]
impl AttemptArchive for MemoryStore {
    async fn record(&self, attempt: &FinalizedSession) -> Result<i64, AppError> {
        let mut attempts = self.attempts.write().await;

        let duplicate = attempts.iter().any(|r| {
            r.student_id == attempt.student_id
                && r.exam_id == attempt.exam_id
                && r.started_at == attempt.started_at
        });
        if duplicate {
            return Err(AppError::Conflict("Attempt already archived".to_string()));
        }

        let id = self.next_id();
        attempts.push(ExamRecord::from_finalized(id, attempt));
        Ok(id)
    }

    async fn attempts_for_exam(&self, exam_id: i64) -> Result<Vec<ExamRecord>, AppError> {
        let attempts = self.attempts.read().await;
        let mut records: Vec<ExamRecord> = attempts
            .iter()
            .filter(|r| r.exam_id == exam_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(records)
    }
}
