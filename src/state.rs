// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    registry::SessionRegistry,
    store::{AttemptArchive, QuestionSource},
};

#[derive(Clone)]
pub struct AppState {
    pub questions: Arc<dyn QuestionSource>,
    pub archive: Arc<dyn AttemptArchive>,
    pub sessions: SessionRegistry,
    pub config: Config,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

