// src/exam/question.rs

use serde::{Deserialize, Serialize};

/// Labels used when a true/false question is rendered as options.
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

/// One evaluable item of an exam.
///
/// Questions are supplied from outside the engine and are never mutated once a
/// session has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Point value, always positive.
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice { options: Vec<String>, correct: usize },
    TrueFalse { correct: bool },
    ShortText,
    Essay,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice { .. } => "single_choice",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::ShortText => "short_text",
            QuestionKind::Essay => "essay",
        }
    }
}

/// A student's response. The variant must match the kind of the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(usize),
    Boolean(bool),
    Text(String),
}

impl Question {
    /// Single-choice and true/false questions can be scored without a human.
    pub fn is_auto_gradable(&self) -> bool {
        matches!(
            self.kind,
            QuestionKind::SingleChoice { .. } | QuestionKind::TrueFalse { .. }
        )
    }

    /// Option texts shown to the student. Empty for free-text kinds.
    pub fn options(&self) -> Vec<String> {
        match &self.kind {
            QuestionKind::SingleChoice { options, .. } => options.clone(),
            QuestionKind::TrueFalse { .. } => {
                TRUE_FALSE_OPTIONS.iter().map(|s| s.to_string()).collect()
            }
            QuestionKind::ShortText | QuestionKind::Essay => Vec::new(),
        }
    }

    /// Checks that `value` has the shape this question expects.
    pub fn check_answer(&self, value: &AnswerValue) -> Result<(), String> {
        match (&self.kind, value) {
            (QuestionKind::SingleChoice { options, .. }, AnswerValue::Choice(index)) => {
                if *index < options.len() {
                    Ok(())
                } else {
                    Err(format!(
                        "option {} does not exist ({} options)",
                        index,
                        options.len()
                    ))
                }
            }
            (QuestionKind::TrueFalse { .. }, AnswerValue::Boolean(_)) => Ok(()),
            (QuestionKind::ShortText | QuestionKind::Essay, AnswerValue::Text(_)) => Ok(()),
            (kind, _) => Err(format!("expected an answer for a {} question", kind.as_str())),
        }
    }

    /// `Some(correct?)` for auto-gradable questions, `None` when a human has to decide.
    pub fn is_correct(&self, value: &AnswerValue) -> Option<bool> {
        match (&self.kind, value) {
            (QuestionKind::SingleChoice { correct, .. }, AnswerValue::Choice(index)) => {
                Some(index == correct)
            }
            (QuestionKind::TrueFalse { correct }, AnswerValue::Boolean(b)) => Some(b == correct),
            (QuestionKind::SingleChoice { .. } | QuestionKind::TrueFalse { .. }, _) => Some(false),
            (QuestionKind::ShortText | QuestionKind::Essay, _) => None,
        }
    }
}
