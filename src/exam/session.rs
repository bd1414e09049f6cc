// src/exam/session.rs

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    error::SessionError,
    grading::{GradingResult, grade_answers},
    question::{AnswerValue, Question},
};

/// Lifecycle of one attempt.
///
/// `Submitted`, `Expired` and `Abandoned` are terminal and stay distinct all the
/// way to the archive, since credit policy may differ per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Submitting,
    Submitted,
    Expired,
    Abandoned,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not_started",
            SessionState::InProgress => "in_progress",
            SessionState::Submitting => "submitting",
            SessionState::Submitted => "submitted",
            SessionState::Expired => "expired",
            SessionState::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Submitted | SessionState::Expired | SessionState::Abandoned
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Submitted,
    Expired,
    Abandoned,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Submitted => "submitted",
            Outcome::Expired => "expired",
            Outcome::Abandoned => "abandoned",
        }
    }

    /// Only explicit submissions are complete attempts.
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Submitted)
    }
}

/// The stored response to one question. Re-answering overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: i64,
    pub value: AnswerValue,
    pub answered_at: DateTime<Utc>,
}

/// Result of `answer`: tells the caller whether anything observable changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Answered {
    First,
    Changed,
    Unchanged,
}

/// Result of `navigate`. Moving to an unanswered question is allowed and flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub index: usize,
    pub answered: bool,
}

/// Result of `tick`.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Running { remaining: Duration },
    Expired(FinalizedSession),
}

/// Result of `submit`.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Submission was held back: confirm with `force` to proceed.
    Unanswered { count: usize, positions: Vec<usize> },
    Submitted(FinalizedSession),
}

/// Everything about a finished attempt, handed to the archive once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizedSession {
    pub student_id: i64,
    pub exam_id: i64,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub question_ids: Vec<i64>,
    /// In presentation order.
    pub answers: Vec<AnswerRecord>,
    pub bookmarks: Vec<i64>,
    pub time_budget_ms: u64,
    pub remaining_ms: u64,
    pub violations: u32,
    pub grading: GradingResult,
}

/// Read-only projection used for rendering.
#[derive(Debug, Clone)]
pub struct SessionView<'a> {
    pub state: SessionState,
    pub current_index: usize,
    pub current_question: Option<&'a Question>,
    pub current_answer: Option<&'a AnswerValue>,
    pub total: usize,
    pub answered: usize,
    pub unanswered: Vec<usize>,
    pub remaining: Duration,
    pub violations: u32,
    pub bookmarks: &'a BTreeSet<i64>,
}

/// One student's attempt at one exam.
///
/// The session owns its randomized question list, the answers, bookmarks, the
/// countdown and the integrity-violation counter. It holds no clock of its own:
/// time advances only through `tick`, and timestamps can be supplied with the
/// `*_at` variants.
#[derive(Debug, Clone)]
pub struct ExamSession {
    student_id: i64,
    exam_id: i64,
    state: SessionState,
    questions: Vec<Question>,
    current: usize,
    answers: HashMap<i64, AnswerRecord>,
    bookmarks: BTreeSet<i64>,
    time_budget: Duration,
    remaining: Duration,
    violations: u32,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    pub fn new(student_id: i64, exam_id: i64) -> Self {
        Self {
            student_id,
            exam_id,
            state: SessionState::NotStarted,
            questions: Vec::new(),
            current: 0,
            answers: HashMap::new(),
            bookmarks: BTreeSet::new(),
            time_budget: Duration::ZERO,
            remaining: Duration::ZERO,
            violations: 0,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self, questions: Vec<Question>, budget: Duration) -> Result<(), SessionError> {
        self.start_at(questions, budget, Utc::now())
    }

    /// Begins the attempt with an already randomized question list.
    pub fn start_at(
        &mut self,
        questions: Vec<Question>,
        budget: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.require(SessionState::NotStarted, "start")?;

        if questions.is_empty() {
            return Err(SessionError::InvalidSession(
                "question list is empty".to_string(),
            ));
        }
        if budget.is_zero() {
            return Err(SessionError::InvalidSession(
                "time budget must be positive".to_string(),
            ));
        }
        let mut ids = HashSet::with_capacity(questions.len());
        if let Some(dup) = questions.iter().find(|q| !ids.insert(q.id)) {
            return Err(SessionError::InvalidSession(format!(
                "question {} appears more than once",
                dup.id
            )));
        }

        self.questions = questions;
        self.current = 0;
        self.answers.clear();
        self.bookmarks.clear();
        self.violations = 0;
        self.time_budget = budget;
        self.remaining = budget;
        self.started_at = Some(now);
        self.state = SessionState::InProgress;
        Ok(())
    }

    pub fn answer(&mut self, question_id: i64, value: AnswerValue) -> Result<Answered, SessionError> {
        self.answer_at(question_id, value, Utc::now())
    }

    /// Upserts the answer for `question_id`. Does not move the cursor.
    pub fn answer_at(
        &mut self,
        question_id: i64,
        value: AnswerValue,
        now: DateTime<Utc>,
    ) -> Result<Answered, SessionError> {
        self.require(SessionState::InProgress, "answer")?;

        let question = self.question(question_id)?;
        question
            .check_answer(&value)
            .map_err(|reason| SessionError::InvalidAnswer {
                question_id,
                reason,
            })?;

        let outcome = match self.answers.get(&question_id) {
            None => Answered::First,
            Some(prev) if prev.value == value => Answered::Unchanged,
            Some(_) => Answered::Changed,
        };

        self.answers.insert(
            question_id,
            AnswerRecord {
                question_id,
                value,
                answered_at: now,
            },
        );
        Ok(outcome)
    }

    /// Moves the cursor. Negative and past-the-end indices are out of range.
    pub fn navigate(&mut self, index: i64) -> Result<Position, SessionError> {
        self.require(SessionState::InProgress, "navigate")?;

        let len = self.questions.len();
        let (position, question) = usize::try_from(index)
            .ok()
            .and_then(|i| self.questions.get(i).map(|q| (i, q)))
            .ok_or(SessionError::OutOfRange { index, len })?;
        let answered = self.answers.contains_key(&question.id);

        self.current = position;
        Ok(Position {
            index: position,
            answered,
        })
    }

    /// Returns `true` if the bookmark was newly added.
    pub fn bookmark(&mut self, question_id: i64) -> Result<bool, SessionError> {
        self.require(SessionState::InProgress, "bookmark")?;
        self.question(question_id)?;
        Ok(self.bookmarks.insert(question_id))
    }

    /// Returns `true` if a bookmark was removed.
    pub fn unbookmark(&mut self, question_id: i64) -> Result<bool, SessionError> {
        self.require(SessionState::InProgress, "unbookmark")?;
        self.question(question_id)?;
        Ok(self.bookmarks.remove(&question_id))
    }

    /// Counts one integrity signal and returns the running total.
    ///
    /// Signals may race with submission, so outside `InProgress` the call is a
    /// no-op. The counter never locks or submits the session.
    pub fn report_integrity_violation(&mut self) -> u32 {
        if self.state == SessionState::InProgress {
            self.violations = self.violations.saturating_add(1);
        }
        self.violations
    }

    pub fn tick(&mut self, elapsed: Duration) -> Result<Tick, SessionError> {
        self.tick_at(elapsed, Utc::now())
    }

    /// Consumes `elapsed` from the budget; expires the session when it runs out.
    pub fn tick_at(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Result<Tick, SessionError> {
        self.require(SessionState::InProgress, "tick")?;

        self.remaining = self.remaining.saturating_sub(elapsed);
        if !self.remaining.is_zero() {
            return Ok(Tick::Running {
                remaining: self.remaining,
            });
        }

        self.state = SessionState::Expired;
        self.finished_at = Some(now);
        Ok(Tick::Expired(self.finalized()?))
    }

    pub fn submit(&mut self, force: bool) -> Result<SubmitOutcome, SessionError> {
        self.submit_at(force, Utc::now())
    }

    /// Submits the attempt.
    ///
    /// Without `force`, unanswered questions hold the submission back and are
    /// reported; state is left untouched in that case.
    pub fn submit_at(&mut self, force: bool, now: DateTime<Utc>) -> Result<SubmitOutcome, SessionError> {
        self.require(SessionState::InProgress, "submit")?;

        let positions = self.unanswered_positions();
        if !force && !positions.is_empty() {
            return Ok(SubmitOutcome::Unanswered {
                count: positions.len(),
                positions,
            });
        }

        // Countdown is frozen from here on
        self.state = SessionState::Submitting;
        self.finished_at = Some(now);
        self.state = SessionState::Submitted;
        Ok(SubmitOutcome::Submitted(self.finalized()?))
    }

    pub fn abandon(&mut self) -> Result<FinalizedSession, SessionError> {
        self.abandon_at(Utc::now())
    }

    /// The student left before submitting. Existing answers are kept and the
    /// attempt is reported as incomplete.
    pub fn abandon_at(&mut self, now: DateTime<Utc>) -> Result<FinalizedSession, SessionError> {
        self.require(SessionState::InProgress, "abandon")?;

        self.state = SessionState::Abandoned;
        self.finished_at = Some(now);
        self.finalized()
    }

    /// Snapshot of a finished attempt, graded. Fails unless the session is terminal.
    pub fn finalized(&self) -> Result<FinalizedSession, SessionError> {
        let outcome = match self.state {
            SessionState::Submitted => Outcome::Submitted,
            SessionState::Expired => Outcome::Expired,
            SessionState::Abandoned => Outcome::Abandoned,
            state => {
                return Err(SessionError::InvalidState {
                    operation: "finalize",
                    state,
                });
            }
        };
        let (Some(started_at), Some(finished_at)) = (self.started_at, self.finished_at) else {
            return Err(SessionError::InvalidSession(
                "finished session is missing timestamps".to_string(),
            ));
        };

        let answers = self
            .questions
            .iter()
            .filter_map(|q| self.answers.get(&q.id).cloned())
            .collect();

        Ok(FinalizedSession {
            student_id: self.student_id,
            exam_id: self.exam_id,
            outcome,
            started_at,
            finished_at,
            question_ids: self.questions.iter().map(|q| q.id).collect(),
            answers,
            bookmarks: self.bookmarks.iter().copied().collect(),
            time_budget_ms: duration_ms(self.time_budget),
            remaining_ms: duration_ms(self.remaining),
            violations: self.violations,
            grading: grade_answers(&self.questions, &self.answers),
        })
    }

    pub fn view(&self) -> SessionView<'_> {
        let current_question = self.questions.get(self.current);
        SessionView {
            state: self.state,
            current_index: self.current,
            current_question,
            current_answer: current_question
                .and_then(|q| self.answers.get(&q.id))
                .map(|record| &record.value),
            total: self.questions.len(),
            answered: self.answers.len(),
            unanswered: self.unanswered_positions(),
            remaining: self.remaining,
            violations: self.violations,
            bookmarks: &self.bookmarks,
        }
    }

    pub fn student_id(&self) -> i64 {
        self.student_id
    }

    pub fn exam_id(&self) -> i64 {
        self.exam_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn answer_for(&self, question_id: i64) -> Option<&AnswerRecord> {
        self.answers.get(&question_id)
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn violations(&self) -> u32 {
        self.violations
    }

    pub fn bookmarks(&self) -> &BTreeSet<i64> {
        &self.bookmarks
    }

    pub(crate) fn answers(&self) -> &HashMap<i64, AnswerRecord> {
        &self.answers
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn question(&self, question_id: i64) -> Result<&Question, SessionError> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))
    }

    fn unanswered_positions(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| !self.answers.contains_key(&q.id))
            .map(|(i, _)| i)
            .collect()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
