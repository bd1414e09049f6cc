// src/exam/grading.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{
    error::SessionError,
    question::Question,
    session::{AnswerRecord, ExamSession},
};

/// Score summary of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GradingResult {
    /// Sum of points of correctly answered auto-gradable questions.
    pub score: u32,
    /// Sum of points of every auto-gradable question in the session.
    pub max_auto_gradable_score: u32,
    /// Answered free-text questions waiting for a human grader.
    pub pending_manual_review: u32,
    pub correct_count: u32,
}

/// Grades a finished session. Never mutates it.
pub fn grade(session: &ExamSession) -> Result<GradingResult, SessionError> {
    if !session.state().is_terminal() {
        return Err(SessionError::InvalidState {
            operation: "grade",
            state: session.state(),
        });
    }
    Ok(grade_answers(session.questions(), session.answers()))
}

/// Unanswered questions count as incorrect; they are not errors.
pub(crate) fn grade_answers(
    questions: &[Question],
    answers: &HashMap<i64, AnswerRecord>,
) -> GradingResult {
    let mut result = GradingResult::default();

    for question in questions {
        let answer = answers.get(&question.id);

        if question.is_auto_gradable() {
            result.max_auto_gradable_score += question.points;
            let correct = answer
                .and_then(|record| question.is_correct(&record.value))
                .unwrap_or(false);
            if correct {
                result.score += question.points;
                result.correct_count += 1;
            }
        } else if answer.is_some() {
            result.pending_manual_review += 1;
        }
    }

    result
}
