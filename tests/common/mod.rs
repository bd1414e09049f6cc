// tests/common/mod.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use intranet::{
    config::Config,
    error::AppError,
    exam::FinalizedSession,
    models::{exam_record::ExamRecord, question::CreateQuestionRequest},
    registry::SessionRegistry,
    routes,
    state::AppState,
    store::{AttemptArchive, MemoryStore, QuestionSource},
    utils::jwt::Claims,
};
use jsonwebtoken::{EncodingKey, Header, encode};

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        exam_time_limit: Duration::from_secs(60),
        default_question_count: None,
        tick_interval: Duration::from_secs(1),
    }
}

/// Archive whose first `failures` writes fail, then behaves like the
/// in-memory store. Counts every write it accepted.
pub struct FlakyArchive {
    inner: MemoryStore,
    failures: AtomicUsize,
    pub writes: AtomicUsize,
}

impl FlakyArchive {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(failures),
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AttemptArchive for FlakyArchive {
    async fn record(&self, attempt: &FinalizedSession) -> Result<i64, AppError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::InternalServerError(
                "archive unavailable".to_string(),
            ));
        }

        let id = self.inner.record(attempt).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn attempts_for_exam(&self, exam_id: i64) -> Result<Vec<ExamRecord>, AppError> {
        self.inner.attempts_for_exam(exam_id).await
    }
}

/// Spawns the app on a random port backed by an in-memory store.
/// The ticker is not started; tests drive time with `ticker::run_once`.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_archive(Arc::new(MemoryStore::new())).await
}

/// Same as `spawn_app`, with finished attempts going to `archive`.
pub async fn spawn_app_with_archive(archive: Arc<dyn AttemptArchive>) -> TestApp {
    let state = AppState {
        questions: Arc::new(MemoryStore::new()),
        archive,
        sessions: SessionRegistry::new(),
        config: test_config(),
    };

    let app = routes::create_router(state.clone());

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        state,
        client: reqwest::Client::new(),
    }
}

pub fn token(user_id: i64, role: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_owned(),
        exp: (chrono::Utc::now().timestamp() + 600) as usize,
    };
    let jwt = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token");
    format!("Bearer {}", jwt)
}

/// Seeds `count` single-choice questions worth 2 points each, correct option 0.
/// Returns their ids.
pub async fn seed_single_choice(app: &TestApp, exam_id: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..count {
        let req = CreateQuestionRequest {
            kind: "single_choice".to_string(),
            content: format!("Question {}", i),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_index: Some(0),
            points: 2,
        };
        ids.push(app.state.questions.add_question(exam_id, &req).await.unwrap());
    }
    ids
}
