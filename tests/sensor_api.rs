//! End-to-end tests of the sensor endpoints over the SQLite store.
//!
//! Each test opens a private in-memory database, so they run in parallel.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use pulse_relay::api::{create_router, AppState};
use pulse_relay::auth::ApiKey;
use pulse_relay::reading::{ReadingValues, SensorReading};
use pulse_relay::store::{MemoryStore, ReadingStore, SqliteStore, StorePtr};

const KEY: &str = "7fRt29bQiQ1RADp3w7ScHtRJ8Tdrp9fQ";

async fn setup() -> (Router, StorePtr) {
    let store: StorePtr = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    let state = AppState::new(Arc::clone(&store), ApiKey::new(KEY));
    (create_router(state, None), store)
}

async fn post(app: &Router, body: Value) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/sensor-data")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_latest(app: &Router) -> (StatusCode, Option<Value>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/sensor-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).ok())
}

#[tokio::test]
async fn post_then_get_returns_submitted_values() {
    let (app, _store) = setup().await;

    let (status, text) = post(
        &app,
        json!({"irValue": 512, "bpm": 72, "avgBpm": 70, "apiKey": KEY}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Data received successfully");

    let (status, body) = get_latest(&app).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body.as_object().unwrap().len(), 4);
    assert_eq!(body["irValue"], json!(512));
    assert_eq!(body["bpm"], json!(72));
    assert_eq!(body["avgBpm"], json!(70));
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn empty_store_returns_404() {
    let (app, _store) = setup().await;

    let (status, _) = get_latest(&app).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_key_leaves_store_untouched() {
    let (app, _store) = setup().await;

    let (status, _) = post(&app, json!({"irValue": 1, "bpm": 60, "avgBpm": 60, "apiKey": "wrong"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(get_latest(&app).await.0, StatusCode::NOT_FOUND);

    post(&app, json!({"irValue": 512, "bpm": 72, "avgBpm": 70, "apiKey": KEY})).await;
    let (_, before) = get_latest(&app).await;

    let (status, _) = post(&app, json!({"irValue": 9, "bpm": 99, "avgBpm": 99, "apiKey": "wrong"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = post(&app, json!({"irValue": 9, "bpm": 99, "avgBpm": 99})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, after) = get_latest(&app).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn latest_is_the_greatest_timestamp() {
    let (app, store) = setup().await;
    let at = |secs, bpm| {
        SensorReading::at(
            ReadingValues {
                bpm: Some(bpm),
                ..Default::default()
            },
            chrono::DateTime::from_timestamp(secs, 0).unwrap(),
        )
    };

    store.insert(at(1_700_000_200, 2.0)).await.unwrap();
    store.insert(at(1_700_000_300, 3.0)).await.unwrap();
    store.insert(at(1_700_000_100, 1.0)).await.unwrap();

    let (_, body) = get_latest(&app).await;
    assert_eq!(body.unwrap()["bpm"], json!(3));
}

#[tokio::test]
async fn identical_posts_are_not_deduplicated() {
    let store = Arc::new(MemoryStore::new());
    let app = create_router(AppState::new(store.clone(), ApiKey::new(KEY)), None);
    let payload = json!({"irValue": 512, "bpm": 72, "avgBpm": 70, "apiKey": KEY});

    assert_eq!(post(&app, payload.clone()).await.0, StatusCode::OK);
    let first = store.latest().await.unwrap().unwrap();
    assert_eq!(post(&app, payload).await.0, StatusCode::OK);
    let second = store.latest().await.unwrap().unwrap();

    assert_eq!(store.len().await, 2);
    assert!(second.created_at >= first.created_at);
    assert_eq!(first.bpm, second.bpm);
}

#[tokio::test]
async fn missing_fields_are_stored_as_null() {
    let (app, _store) = setup().await;

    let (status, _) = post(&app, json!({"bpm": 80, "apiKey": KEY})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_latest(&app).await;
    let body = body.unwrap();
    assert_eq!(body["irValue"], Value::Null);
    assert_eq!(body["bpm"], json!(80));
    assert_eq!(body["avgBpm"], Value::Null);
}

#[tokio::test]
async fn numeric_strings_are_coerced() {
    let (app, _store) = setup().await;

    let (status, _) = post(
        &app,
        json!({"irValue": "512", "bpm": "72", "avgBpm": 70, "apiKey": KEY}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_latest(&app).await;
    assert_eq!(body.unwrap()["irValue"], json!(512));
}

#[tokio::test]
async fn closed_store_surfaces_as_500() {
    let (app, store) = setup().await;
    store.close().await.unwrap();

    let (status, text) = post(&app, json!({"bpm": 72, "apiKey": KEY})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "Error saving data");

    assert_eq!(get_latest(&app).await.0, StatusCode::INTERNAL_SERVER_ERROR);
}
