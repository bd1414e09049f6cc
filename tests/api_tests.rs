// tests/api_tests.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FlakyArchive, seed_single_choice, spawn_app, spawn_app_with_archive, token};
use intranet::{models::exam_record::SessionResponse, ticker};
use serde_json::{Value, json};

async fn start(app: &common::TestApp, student: i64, exam_id: i64, body: Value) -> reqwest::Response {
    app.client
        .post(app.url(&format!("/api/exams/{}/sessions", exam_id)))
        .header("Authorization", token(student, "student"))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn session_routes_require_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/exams/1/sessions"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .post(app.url("/api/exams/1/sessions"))
        .header("Authorization", "Bearer not-a-jwt")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn start_draws_requested_count() {
    let app = spawn_app().await;
    seed_single_choice(&app, 1, 10).await;

    let response = start(&app, 7, 1, json!({ "count": 5 })).await;
    assert_eq!(response.status().as_u16(), 201);

    let session: SessionResponse = response.json().await.unwrap();
    assert_eq!(session.total, 5);
    assert_eq!(session.state, "in_progress");
    assert_eq!(session.current_index, 0);
    assert_eq!(session.unanswered, vec![0, 1, 2, 3, 4]);
    assert_eq!(session.remaining_ms, 60_000);
    assert!(session.current_question.is_some());
}

#[tokio::test]
async fn start_rejects_empty_exam_and_duplicate_session() {
    let app = spawn_app().await;

    // No questions for this exam
    let response = start(&app, 7, 99, json!({})).await;
    assert_eq!(response.status().as_u16(), 400);

    seed_single_choice(&app, 1, 3).await;
    // Negative count draws nothing
    let response = start(&app, 7, 1, json!({ "count": -2 })).await;
    assert_eq!(response.status().as_u16(), 400);

    assert_eq!(start(&app, 7, 1, json!({})).await.status().as_u16(), 201);
    assert_eq!(start(&app, 7, 1, json!({})).await.status().as_u16(), 409);
    // Another student is unaffected
    assert_eq!(start(&app, 8, 1, json!({})).await.status().as_u16(), 201);
}

#[tokio::test]
async fn partial_answers_forced_submit_flow() {
    // Arrange
    let app = spawn_app().await;
    seed_single_choice(&app, 1, 3).await;
    let auth = token(7, "student");

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();
    let id = session.session_id;

    // Collect the randomized question order
    let mut order = Vec::new();
    for index in 0..3 {
        let resp: Value = app
            .client
            .post(app.url(&format!("/api/sessions/{}/navigate", id)))
            .header("Authorization", &auth)
            .json(&json!({ "index": index }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["position"]["answered"], false);
        order.push(resp["session"]["current_question"]["id"].as_i64().unwrap());
    }

    // Act: first correct, second wrong, third left blank
    for (question_id, choice) in [(order[0], 0), (order[1], 3)] {
        let resp = app
            .client
            .put(app.url(&format!("/api/sessions/{}/answers/{}", id, question_id)))
            .header("Authorization", &auth)
            .json(&json!({ "type": "choice", "value": choice }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["answered"], "first");
    }

    let warning: Value = app
        .client
        .post(app.url(&format!("/api/sessions/{}/submit", id)))
        .header("Authorization", &auth)
        .json(&json!({ "force": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(warning["status"], "unanswered");
    assert_eq!(warning["unanswered"], 1);
    assert_eq!(warning["positions"], json!([2]));

    let result: Value = app
        .client
        .post(app.url(&format!("/api/sessions/{}/submit", id)))
        .header("Authorization", &auth)
        .json(&json!({ "force": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(result["outcome"], "submitted");
    assert_eq!(result["complete"], true);
    assert_eq!(result["score"], 2);
    assert_eq!(result["max_score"], 6);
    assert_eq!(result["pending_manual_review"], 0);

    let attempts = app.state.archive.attempts_for_exam(1).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].student_id, 7);
    assert!(app.state.sessions.is_empty().await);

    // The session is gone once archived
    let resp = app
        .client
        .put(app.url(&format!("/api/sessions/{}/answers/{}", id, order[2])))
        .header("Authorization", &auth)
        .json(&json!({ "type": "choice", "value": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn contract_violations_map_to_400() {
    let app = spawn_app().await;
    let ids = seed_single_choice(&app, 1, 2).await;
    let auth = token(7, "student");

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();
    let id = session.session_id;

    let out_of_range = app
        .client
        .post(app.url(&format!("/api/sessions/{}/navigate", id)))
        .header("Authorization", &auth)
        .json(&json!({ "index": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status().as_u16(), 400);

    let negative = app
        .client
        .post(app.url(&format!("/api/sessions/{}/navigate", id)))
        .header("Authorization", &auth)
        .json(&json!({ "index": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(negative.status().as_u16(), 400);
    let body: Value = negative.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    let unknown = app
        .client
        .put(app.url(&format!("/api/sessions/{}/answers/{}", id, 12345)))
        .header("Authorization", &auth)
        .json(&json!({ "type": "choice", "value": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 400);

    let malformed = app
        .client
        .put(app.url(&format!("/api/sessions/{}/answers/{}", id, ids[0])))
        .header("Authorization", &auth)
        .json(&json!({ "type": "choice", "value": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status().as_u16(), 400);
    let body: Value = malformed.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid answer"));
}

#[tokio::test]
async fn other_students_cannot_touch_a_session() {
    let app = spawn_app().await;
    seed_single_choice(&app, 1, 2).await;

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();

    let resp = app
        .client
        .get(app.url(&format!("/api/sessions/{}", session.session_id)))
        .header("Authorization", token(8, "student"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn bookmarks_and_violations_show_in_snapshot() {
    let app = spawn_app().await;
    let ids = seed_single_choice(&app, 1, 3).await;
    let auth = token(7, "student");

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();
    let id = session.session_id;

    for _ in 0..2 {
        let resp: Value = app
            .client
            .put(app.url(&format!("/api/sessions/{}/bookmarks/{}", id, ids[1])))
            .header("Authorization", &auth)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["bookmarked"], true);
    }

    for expected in 1..=3 {
        let resp: Value = app
            .client
            .post(app.url(&format!("/api/sessions/{}/violations", id)))
            .header("Authorization", &auth)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["counted"], true);
        assert_eq!(resp["violations"], expected);
    }

    let snapshot: SessionResponse = app
        .client
        .get(app.url(&format!("/api/sessions/{}", id)))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot.bookmarks, vec![ids[1]]);
    assert_eq!(snapshot.violations, 3);
    assert_eq!(snapshot.state, "in_progress");

    let removed: Value = app
        .client
        .delete(app.url(&format!("/api/sessions/{}/bookmarks/{}", id, ids[1])))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(removed["changed"], true);
}

#[tokio::test]
async fn ticker_expires_and_archives() {
    let app = spawn_app().await;
    let ids = seed_single_choice(&app, 1, 2).await;
    let auth = token(7, "student");

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();
    let id = session.session_id;

    app.client
        .put(app.url(&format!("/api/sessions/{}/answers/{}", id, ids[0])))
        .header("Authorization", &auth)
        .json(&json!({ "type": "choice", "value": 0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(30)).await, 0);
    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(31)).await, 1);

    let attempts = app.state.archive.attempts_for_exam(1).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, "expired");
    assert_eq!(attempts[0].remaining_ms, 0);
    assert_eq!(attempts[0].score, 2);
    assert_eq!(attempts[0].max_score, 4);

    // Nothing left to expire
    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(5)).await, 0);
}

#[tokio::test]
async fn abandon_archives_incomplete_attempt() {
    let app = spawn_app().await;
    let ids = seed_single_choice(&app, 1, 2).await;
    let auth = token(7, "student");

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();
    let id = session.session_id;

    app.client
        .put(app.url(&format!("/api/sessions/{}/answers/{}", id, ids[1])))
        .header("Authorization", &auth)
        .json(&json!({ "type": "choice", "value": 1 }))
        .send()
        .await
        .unwrap();

    let result: Value = app
        .client
        .post(app.url(&format!("/api/sessions/{}/abandon", id)))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["outcome"], "abandoned");
    assert_eq!(result["complete"], false);
    assert_eq!(result["answered"], 1);

    let attempts = app.state.archive.attempts_for_exam(1).await.unwrap();
    assert_eq!(attempts[0].outcome, "abandoned");
    assert_eq!(attempts[0].answers.len(), 1);

    // A new attempt can start afterwards
    assert_eq!(start(&app, 7, 1, json!({})).await.status().as_u16(), 201);
}

#[tokio::test]
async fn failed_archive_is_retried_by_ticker() {
    // Arrange
    let archive = Arc::new(FlakyArchive::new(1));
    let app = spawn_app_with_archive(archive.clone()).await;
    seed_single_choice(&app, 1, 2).await;
    let auth = token(7, "student");

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();
    let id = session.session_id;
    let submit_url = app.url(&format!("/api/sessions/{}/submit", id));

    // Act: the first write fails
    let failed = app
        .client
        .post(&submit_url)
        .header("Authorization", &auth)
        .json(&json!({ "force": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status().as_u16(), 500);

    // The student retries; the attempt is already submitted
    let retry = app
        .client
        .post(&submit_url)
        .header("Authorization", &auth)
        .json(&json!({ "force": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status().as_u16(), 409);

    let ignored: Value = app
        .client
        .post(app.url(&format!("/api/sessions/{}/violations", id)))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ignored["counted"], false);
    assert_eq!(ignored["violations"], 0);

    let snapshot: SessionResponse = app
        .client
        .get(app.url(&format!("/api/sessions/{}", id)))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot.state, "submitted");

    // Assert: the next pass archives it, once
    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(1)).await, 1);
    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(1)).await, 0);
    assert_eq!(archive.writes.load(Ordering::SeqCst), 1);

    let attempts = app.state.archive.attempts_for_exam(1).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, "submitted");
    assert!(app.state.sessions.is_empty().await);

    let gone = app
        .client
        .get(app.url(&format!("/api/sessions/{}", id)))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn expired_session_survives_archive_outage() {
    let archive = Arc::new(FlakyArchive::new(2));
    let app = spawn_app_with_archive(archive.clone()).await;
    seed_single_choice(&app, 1, 2).await;

    let session: SessionResponse = start(&app, 7, 1, json!({})).await.json().await.unwrap();

    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(61)).await, 0);
    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(1)).await, 0);
    assert_eq!(app.state.sessions.len().await, 1);

    assert_eq!(ticker::run_once(&app.state, Duration::from_secs(1)).await, 1);
    assert_eq!(archive.writes.load(Ordering::SeqCst), 1);

    let attempts = app.state.archive.attempts_for_exam(1).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, "expired");

    let gone = app
        .client
        .get(app.url(&format!("/api/sessions/{}", session.session_id)))
        .header("Authorization", token(7, "student"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}
