// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, session},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Student exam routes (authenticated).
/// * Admin routes for question pools and archived attempts.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let exam_routes = Router::new()
        .route("/exams/{exam_id}/sessions", post(session::start_session))
        .route("/sessions/{id}", get(session::get_session))
        .route(
            "/sessions/{id}/answers/{question_id}",
            put(session::answer_question),
        )
        .route("/sessions/{id}/navigate", post(session::navigate))
        .route(
            "/sessions/{id}/bookmarks/{question_id}",
            put(session::add_bookmark).delete(session::remove_bookmark),
        )
        .route("/sessions/{id}/violations", post(session::report_violation))
        .route("/sessions/{id}/submit", post(session::submit))
        .route("/sessions/{id}/abandon", post(session::abandon))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/exams/{exam_id}/questions", post(admin::create_question))
        .route("/exams/{exam_id}/attempts", get(admin::list_attempts))
        .route("/questions/{id}", delete(admin::delete_question))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", exam_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
