// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::{
    error::AppError,
    exam::{Question, QuestionKind},
};

/// Represents the 'exam_questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub exam_id: i64,

    /// 'single_choice', 'true_false', 'short_text' or 'essay'.
    pub kind: String,

    pub content: String,

    /// Option texts, stored as a JSON array. Empty for free-text kinds.
    pub options: Json<Vec<String>>,

    /// Index of the correct option. For true/false, 0 means true.
    /// NULL for free-text kinds.
    pub correct_index: Option<i32>,

    pub points: i32,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let malformed =
            || AppError::InternalServerError(format!("Malformed question row {}", row.id));

        let correct = row
            .correct_index
            .map(usize::try_from)
            .transpose()
            .map_err(|_| malformed())?;

        let kind = match (row.kind.as_str(), correct) {
            ("single_choice", Some(correct)) if correct < row.options.len() => {
                QuestionKind::SingleChoice {
                    options: row.options.0.clone(),
                    correct,
                }
            }
            ("true_false", Some(correct @ (0 | 1))) => QuestionKind::TrueFalse {
                correct: correct == 0,
            },
            ("short_text", _) => QuestionKind::ShortText,
            ("essay", _) => QuestionKind::Essay,
            _ => return Err(malformed()),
        };

        let points = u32::try_from(row.points)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(malformed)?;

        Ok(Question {
            id: row.id,
            text: row.content,
            kind,
            points,
        })
    }
}

/// DTO for sending a question to the student (excludes the correct answer).
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PublicQuestion {
    pub id: i64,
    pub kind: String,
    pub content: String,
    pub options: Vec<String>,
    pub points: u32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            kind: q.kind.as_str().to_string(),
            content: q.text.clone(),
            options: q.options(),
            points: q.points,
        }
    }
}

/// DTO for adding a question to an exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 20))]
    pub kind: String,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_index: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub points: i32,
}

impl CreateQuestionRequest {
    /// Checks kind-specific constraints that the field validators cannot express.
    pub fn check_kind(&self) -> Result<(), AppError> {
        let ok = match self.kind.as_str() {
            "single_choice" => {
                self.options.len() >= 2
                    && self
                        .correct_index
                        .and_then(|i| usize::try_from(i).ok())
                        .is_some_and(|i| i < self.options.len())
            }
            "true_false" => self.options.is_empty() && matches!(self.correct_index, Some(0 | 1)),
            "short_text" | "essay" => self.options.is_empty() && self.correct_index.is_none(),
            other => {
                return Err(AppError::BadRequest(format!(
                    "Unknown question kind '{}'",
                    other
                )));
            }
        };

        if ok {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "Options or correct_index do not fit a '{}' question",
                self.kind
            )))
        }
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
