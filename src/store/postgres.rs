// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use super::{AttemptArchive, QuestionSource};
use crate::{
    error::AppError,
    exam::{FinalizedSession, Question},
    models::{
        exam_record::ExamRecord,
        question::{CreateQuestionRequest, QuestionRow},
    },
};

/// Postgres-backed question supply and attempt archive.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionSource for PgStore {
    async fn questions_for_exam(&self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, exam_id, kind, content, options, correct_index, points
            FROM exam_questions
            WHERE exam_id = $1
            ORDER BY id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions for exam {}: {:?}", exam_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn add_question(&self, exam_id: i64, req: &CreateQuestionRequest) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO exam_questions (exam_id, kind, content, options, correct_index, points)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(exam_id)
        .bind(&req.kind)
        .bind(&req.content)
        .bind(Json(&req.options))
        .bind(req.correct_index)
        .bind(req.points)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(id)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM exam_questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AttemptArchive for PgStore {
    async fn record(&self, attempt: &FinalizedSession) -> Result<i64, AppError> {
        let row = ExamRecord::from_finalized(0, attempt);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO exam_attempts (
                student_id, exam_id, outcome, complete, score, max_score,
                pending_manual_review, violations, question_count,
                time_budget_ms, remaining_ms, answers, bookmarks,
                started_at, finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(row.student_id)
        .bind(row.exam_id)
        .bind(&row.outcome)
        .bind(row.complete)
        .bind(row.score)
        .bind(row.max_score)
        .bind(row.pending_manual_review)
        .bind(row.violations)
        .bind(row.question_count)
        .bind(row.time_budget_ms)
        .bind(row.remaining_ms)
        .bind(&row.answers)
        .bind(&row.bookmarks)
        .bind(row.started_at)
        .bind(row.finished_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict("Attempt already archived".to_string())
            } else {
                tracing::error!("Failed to archive attempt: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

        Ok(id)
    }

    async fn attempts_for_exam(&self, exam_id: i64) -> Result<Vec<ExamRecord>, AppError> {
        let records = sqlx::query_as::<_, ExamRecord>(
            r#"
            SELECT
                id, student_id, exam_id, outcome, complete, score, max_score,
                pending_manual_review, violations, question_count,
                time_budget_ms, remaining_ms, answers, bookmarks,
                started_at, finished_at
            FROM exam_attempts
            WHERE exam_id = $1
            ORDER BY finished_at DESC
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list attempts for exam {}: {:?}", exam_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(records)
    }
}
