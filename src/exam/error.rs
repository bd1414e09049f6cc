// src/exam/error.rs

use thiserror::Error;

use super::session::SessionState;

/// Contract violations raised by the exam engine.
///
/// These indicate a caller bug (or a stale client) and are never retried.
/// Expected conditions such as unanswered questions at submit time are
/// reported through return values instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Question {0} is not part of this session")]
    UnknownQuestion(i64),

    #[error("Question index {index} is out of range (session has {len} questions)")]
    OutOfRange { index: i64, len: usize },

    #[error("Invalid answer for question {question_id}: {reason}")]
    InvalidAnswer { question_id: i64, reason: String },

    #[error("Operation '{operation}' is not allowed while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Invalid session: {0}")]
    InvalidSession(String),
}
