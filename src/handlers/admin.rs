// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{error::AppError, models::question::CreateQuestionRequest, state::AppState};

/// Adds a question to an exam's pool.
/// Admin only.
pub async fn create_question(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    payload.check_kind()?;

    let id = state.questions.add_question(exam_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Removes a question from its exam's pool.
/// Running sessions keep the copy they started with.
/// Admin only.
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.questions.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists archived attempts of an exam for the proctor, newest first.
/// Outcome, completeness and violation count are reported per attempt.
/// Admin only.
pub async fn list_attempts(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = state.archive.attempts_for_exam(exam_id).await?;

    Ok(Json(attempts))
}
