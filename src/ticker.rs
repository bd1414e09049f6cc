// src/ticker.rs

use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{registry::archive_finished, state::AppState};

/// Spawns the clock that drives every live session.
///
/// Each pass feeds the real elapsed time to `tick`, so a delayed pass never
/// shortens or stretches an exam.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        interval.tick().await;
        let mut last = Instant::now();

        loop {
            interval.tick().await;
            let now = Instant::now();
            run_once(&state, now.duration_since(last)).await;
            last = now;
        }
    })
}

/// One ticker pass: advance all sessions, then archive whatever finished.
/// Returns how many sessions were archived.
pub async fn run_once(state: &AppState, elapsed: Duration) -> usize {
    let finished = state.sessions.tick_all(elapsed).await;
    let mut archived = 0;

    for (id, session) in finished {
        match archive_finished(state.archive.as_ref(), &state.sessions, id, session).await {
            Ok(_) => archived += 1,
            Err(e) => tracing::warn!("Ticker could not archive session {}: {}", id, e),
        }
    }

    if archived > 0 {
        tracing::debug!("Ticker archived {} sessions", archived);
    }
    archived
}
