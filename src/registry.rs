// src/registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::AppError,
    exam::{ExamSession, FinalizedSession, SessionState, Tick},
    store::AttemptArchive,
};

/// Live exam sessions, keyed by session id.
///
/// Each session has exactly one writer at a time: every operation runs under
/// the registry lock. A session leaves the registry as soon as it reaches a
/// terminal state, and comes back only if archiving it failed.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, ExamSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a started session. One running session per student and exam.
    pub async fn insert(&self, session: ExamSession) -> Result<Uuid, AppError> {
        let mut sessions = self.sessions.lock().await;

        let running = sessions.values().any(|s| {
            s.student_id() == session.student_id()
                && s.exam_id() == session.exam_id()
                && s.state() == SessionState::InProgress
        });
        if running {
            return Err(AppError::Conflict(format!(
                "A session for exam {} is already in progress",
                session.exam_id()
            )));
        }

        let id = Uuid::new_v4();
        sessions.insert(id, session);
        Ok(id)
    }

    /// Runs `f` on the session owned by `student_id`.
    ///
    /// If `f` moves the session from running into a terminal state, it is
    /// removed and handed back so the caller can archive it. A session that was
    /// already terminal (waiting for an archive retry) stays where it is for the
    /// ticker. Unknown ids and other students' sessions are both reported as
    /// not found.
    pub async fn apply<T>(
        &self,
        id: Uuid,
        student_id: i64,
        f: impl FnOnce(&mut ExamSession) -> T,
    ) -> Result<(T, Option<ExamSession>), AppError> {
        let mut sessions = self.sessions.lock().await;

        let session = sessions
            .get_mut(&id)
            .filter(|s| s.student_id() == student_id)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        let was_terminal = session.state().is_terminal();
        let result = f(session);

        let finished = if !was_terminal && session.state().is_terminal() {
            sessions.remove(&id)
        } else {
            None
        };

        Ok((result, finished))
    }

    /// Puts back a finished session whose archive write failed.
    pub async fn restore(&self, id: Uuid, session: ExamSession) {
        self.sessions.lock().await.insert(id, session);
    }

    /// Advances every running session by `elapsed` and removes everything that
    /// is terminal afterwards, including sessions waiting for an archive retry.
    pub async fn tick_all(&self, elapsed: Duration) -> Vec<(Uuid, ExamSession)> {
        let mut sessions = self.sessions.lock().await;

        for (id, session) in sessions.iter_mut() {
            if session.state() != SessionState::InProgress {
                continue;
            }
            match session.tick(elapsed) {
                Ok(Tick::Running { remaining }) => {
                    tracing::trace!("Session {} has {:?} left", id, remaining);
                }
                Ok(Tick::Expired(_)) => {
                    tracing::info!("Session {} expired", id);
                }
                Err(e) => {
                    tracing::error!("Failed to tick session {}: {}", id, e);
                }
            }
        }

        let finished: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, s)| s.state().is_terminal())
            .map(|(id, _)| *id)
            .collect();

        finished
            .into_iter()
            .filter_map(|id| sessions.remove(&id).map(|s| (id, s)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// Writes a finished session to the archive.
///
/// On failure the session goes back into the registry so the next ticker pass
/// can retry, and the error is returned to the caller.
pub async fn archive_finished(
    archive: &dyn AttemptArchive,
    registry: &SessionRegistry,
    id: Uuid,
    session: ExamSession,
) -> Result<FinalizedSession, AppError> {
    let attempt = session.finalized()?;

    match archive.record(&attempt).await {
        Ok(record_id) => {
            tracing::info!(
                "Archived session {} as attempt {} ({}, score {}/{})",
                id,
                record_id,
                attempt.outcome.as_str(),
                attempt.grading.score,
                attempt.grading.max_auto_gradable_score
            );
            Ok(attempt)
        }
        // Already stored by an earlier try
        Err(AppError::Conflict(_)) => Ok(attempt),
        Err(e) => {
            tracing::warn!("Failed to archive session {}, keeping it for retry: {}", id, e);
            registry.restore(id, session).await;
            Err(e)
        }
    }
}
