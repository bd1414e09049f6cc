// src/models/exam_record.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::{
    exam::{AnswerRecord, AnswerValue, FinalizedSession, GradingResult, SessionView},
    models::question::PublicQuestion,
};

/// Represents the 'exam_attempts' table in the database.
/// One row per finished attempt, written once.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamRecord {
    pub id: i64,
    pub student_id: i64,
    pub exam_id: i64,

    /// 'submitted', 'expired' or 'abandoned'.
    pub outcome: String,

    /// FALSE for abandoned attempts.
    pub complete: bool,

    pub score: i64,
    pub max_score: i64,
    pub pending_manual_review: i64,
    pub violations: i64,
    pub question_count: i64,
    pub time_budget_ms: i64,
    pub remaining_ms: i64,

    pub answers: Json<Vec<AnswerRecord>>,
    pub bookmarks: Json<Vec<i64>>,

    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl ExamRecord {
    /// Builds the row for a finished attempt. `id` is assigned by the store.
    pub fn from_finalized(id: i64, attempt: &FinalizedSession) -> Self {
        Self {
            id,
            student_id: attempt.student_id,
            exam_id: attempt.exam_id,
            outcome: attempt.outcome.as_str().to_string(),
            complete: attempt.outcome.is_complete(),
            score: attempt.grading.score.into(),
            max_score: attempt.grading.max_auto_gradable_score.into(),
            pending_manual_review: attempt.grading.pending_manual_review.into(),
            violations: attempt.violations.into(),
            question_count: attempt.question_ids.len() as i64,
            time_budget_ms: clamp_i64(attempt.time_budget_ms),
            remaining_ms: clamp_i64(attempt.remaining_ms),
            answers: Json(attempt.answers.clone()),
            bookmarks: Json(attempt.bookmarks.clone()),
            started_at: attempt.started_at,
            finished_at: attempt.finished_at,
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// DTO for starting a session. An absent count uses the configured default.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    /// Signed so that negative input reaches the engine's range check.
    pub index: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub force: bool,
}

/// Read-only session snapshot sent to the student.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub exam_id: i64,
    pub state: String,
    pub current_index: usize,
    pub current_question: Option<PublicQuestion>,
    pub current_answer: Option<AnswerValue>,
    pub total: usize,
    pub answered: usize,
    pub unanswered: Vec<usize>,
    pub remaining_ms: u64,
    pub violations: u32,
    pub bookmarks: Vec<i64>,
}

impl SessionResponse {
    pub fn new(session_id: Uuid, exam_id: i64, view: SessionView<'_>) -> Self {
        Self {
            session_id,
            exam_id,
            state: view.state.as_str().to_string(),
            current_index: view.current_index,
            current_question: view.current_question.map(PublicQuestion::from),
            current_answer: view.current_answer.cloned(),
            total: view.total,
            answered: view.answered,
            unanswered: view.unanswered,
            remaining_ms: u64::try_from(view.remaining.as_millis()).unwrap_or(u64::MAX),
            violations: view.violations,
            bookmarks: view.bookmarks.iter().copied().collect(),
        }
    }
}

/// Returned when an attempt reaches a terminal state.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub status: String,
    pub outcome: String,
    pub complete: bool,
    pub score: u32,
    pub max_score: u32,
    pub pending_manual_review: u32,
    pub correct_count: u32,
    pub answered: usize,
    pub total_questions: usize,
    pub violations: u32,
}

impl From<&FinalizedSession> for AttemptResponse {
    fn from(attempt: &FinalizedSession) -> Self {
        let GradingResult {
            score,
            max_auto_gradable_score,
            pending_manual_review,
            correct_count,
        } = attempt.grading;

        Self {
            status: attempt.outcome.as_str().to_string(),
            outcome: attempt.outcome.as_str().to_string(),
            complete: attempt.outcome.is_complete(),
            score,
            max_score: max_auto_gradable_score,
            pending_manual_review,
            correct_count,
            answered: attempt.answers.len(),
            total_questions: attempt.question_ids.len(),
            violations: attempt.violations,
        }
    }
}
