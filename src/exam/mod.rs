// src/exam/mod.rs

//! Timed exam engine: question randomization, the per-student session state
//! machine and automatic grading. Pure logic, no I/O.

pub mod error;
pub mod grading;
pub mod question;
pub mod randomizer;
pub mod session;

pub use error::SessionError;
pub use grading::{GradingResult, grade};
pub use question::{AnswerValue, Question, QuestionKind};
pub use randomizer::randomize;
pub use session::{
    AnswerRecord, Answered, ExamSession, FinalizedSession, Outcome, Position, SessionState,
    SessionView, SubmitOutcome, Tick,
};
