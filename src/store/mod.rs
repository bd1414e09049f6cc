// src/store/mod.rs

//! Collaborators the exam engine talks to: where questions come from and where
//! finished attempts go.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    exam::{FinalizedSession, Question},
    models::{exam_record::ExamRecord, question::CreateQuestionRequest},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Supplies the full question list of an exam.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// All questions of `exam_id`, in authoring order. Empty if the exam is unknown.
    async fn questions_for_exam(&self, exam_id: i64) -> Result<Vec<Question>, AppError>;

    /// Adds a question and returns its id. The request must already be validated.
    async fn add_question(&self, exam_id: i64, req: &CreateQuestionRequest) -> Result<i64, AppError>;

    /// Returns `false` if no such question existed.
    async fn delete_question(&self, id: i64) -> Result<bool, AppError>;
}

/// Write-once storage for finished attempts.
///
/// Writing the same attempt (student, exam, start time) twice is a `Conflict`.
/// Failures are returned as-is; retrying is up to the caller.
#[async_trait]
pub trait AttemptArchive: Send + Sync {
    async fn record(&self, attempt: &FinalizedSession) -> Result<i64, AppError>;

    /// Archived attempts of one exam, newest first.
    async fn attempts_for_exam(&self, exam_id: i64) -> Result<Vec<ExamRecord>, AppError>;
}
