// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    exam::{
        AnswerValue, ExamSession, FinalizedSession, SessionState, SubmitOutcome, randomize,
        randomizer::draw_size,
    },
    models::exam_record::{
        AttemptResponse, NavigateRequest, SessionResponse, StartSessionRequest, SubmitRequest,
    },
    registry::archive_finished,
    state::AppState,
    utils::jwt::Claims,
};

/// Starts a timed attempt at an exam.
///
/// * Loads the exam's questions and draws the student's own random order.
/// * `count` limits the draw; absent, the configured default (or all) is used.
/// * Only one running attempt per student and exam.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let available = state.questions.questions_for_exam(exam_id).await?;
    let count = draw_size(req.count).or(state.config.default_question_count);
    let questions = randomize(&available, count, &mut rand::thread_rng());

    let mut session = ExamSession::new(student_id, exam_id);
    session.start(questions, state.config.exam_time_limit)?;

    let id = state.sessions.insert(session).await?;
    let (response, _) = state
        .sessions
        .apply(id, student_id, |s| SessionResponse::new(id, exam_id, s.view()))
        .await?;

    tracing::info!(
        "Student {} started exam {} (session {}, {} questions)",
        student_id,
        exam_id,
        id,
        response.total
    );

    Ok((StatusCode::CREATED, Json(response)))
}

/// Returns the read-only snapshot used to render the exam page.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let (response, _) = state
        .sessions
        .apply(id, student_id, |s| SessionResponse::new(id, s.exam_id(), s.view()))
        .await?;

    Ok(Json(response))
}

/// Records (or overwrites) the answer to one question.
pub async fn answer_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, question_id)): Path<(Uuid, i64)>,
    Json(value): Json<AnswerValue>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let (result, _) = state
        .sessions
        .apply(id, student_id, |s| {
            s.answer(question_id, value)
                .map(|answered| (answered, SessionResponse::new(id, s.exam_id(), s.view())))
        })
        .await?;
    let (answered, session) = result?;

    Ok(Json(json!({
        "answered": answered,
        "session": session,
    })))
}

/// Moves the cursor. Unanswered questions may be visited freely.
pub async fn navigate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let (result, _) = state
        .sessions
        .apply(id, student_id, |s| {
            s.navigate(req.index)
                .map(|position| (position, SessionResponse::new(id, s.exam_id(), s.view())))
        })
        .await?;
    let (position, session) = result?;

    Ok(Json(json!({
        "position": position,
        "session": session,
    })))
}

pub async fn add_bookmark(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, question_id)): Path<(Uuid, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let (changed, _) = state
        .sessions
        .apply(id, student_id, |s| s.bookmark(question_id))
        .await?;
    let changed = changed?;

    Ok(Json(json!({ "bookmarked": true, "changed": changed })))
}

pub async fn remove_bookmark(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, question_id)): Path<(Uuid, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let (changed, _) = state
        .sessions
        .apply(id, student_id, |s| s.unbookmark(question_id))
        .await?;
    let changed = changed?;

    Ok(Json(json!({ "bookmarked": false, "changed": changed })))
}

/// Fire-and-forget signal from the browser's integrity monitor
/// (tab switch, focus loss, copy/paste). Counted, never enforced.
pub async fn report_violation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let ((counted, violations), _) = state
        .sessions
        .apply(id, student_id, |s| {
            let counted = s.state() == SessionState::InProgress;
            (counted, s.report_integrity_violation())
        })
        .await?;

    if counted {
        tracing::warn!(
            "Integrity violation reported for session {} (student {}, total {})",
            id,
            student_id,
            violations
        );
    } else {
        tracing::debug!("Ignored integrity signal for finished session {}", id);
    }

    Ok(Json(json!({ "counted": counted, "violations": violations })))
}

/// Submits the attempt.
///
/// Without `force`, unanswered questions produce a confirmation prompt instead
/// of a submission. Once submitted, the attempt is graded and archived.
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let (outcome, finished) = state
        .sessions
        .apply(id, student_id, |s| s.submit(req.force))
        .await?;

    match outcome? {
        SubmitOutcome::Unanswered { count, positions } => Ok(Json(json!({
            "status": "unanswered",
            "unanswered": count,
            "positions": positions,
        }))),
        SubmitOutcome::Submitted(_) => {
            let attempt = finish(&state, id, finished).await?;
            Ok(Json(serde_json::to_value(AttemptResponse::from(&attempt))?))
        }
    }
}

/// The student left the exam. Whatever was answered is archived as an
/// incomplete attempt.
pub async fn abandon(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let (result, finished) = state
        .sessions
        .apply(id, student_id, |s| s.abandon())
        .await?;
    result?;

    let attempt = finish(&state, id, finished).await?;
    Ok(Json(AttemptResponse::from(&attempt)))
}

async fn finish(
    state: &AppState,
    id: Uuid,
    finished: Option<ExamSession>,
) -> Result<FinalizedSession, AppError> {
    let session = finished.ok_or_else(|| {
        AppError::InternalServerError(format!("Finished session {} left the registry", id))
    })?;

    archive_finished(state.archive.as_ref(), &state.sessions, id, session).await
}
