//! Shared helpers for driving the router over the in-memory store.

#![allow(dead_code)]

use api_lib::web::{router, state::AppState};
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tsundoku_core::MemoryStore;
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let router = router(Arc::new(AppState::new(store.clone())));
        Self { router, store }
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Registers a fresh reader and returns its id.
    pub async fn reader(&self) -> Uuid {
        let reader_id = Uuid::new_v4();
        let (status, _) = self.post("/readers", json!({ "readerId": reader_id })).await;
        assert_eq!(status, StatusCode::OK);
        reader_id
    }

    pub async fn shelve(&self, reader_id: Uuid, book_id: &str) {
        let (status, _) = self
            .post("/add-to-shelf", json!({ "readerId": reader_id, "book": book(book_id) }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    pub async fn counts(&self, reader_id: Uuid) -> (u64, u64) {
        let (status, body) = self.get(&format!("/shelf/counts?readerId={}", reader_id)).await;
        assert_eq!(status, StatusCode::OK);
        (
            body["totalToBeRead"].as_u64().unwrap(),
            body["totalCompleted"].as_u64().unwrap(),
        )
    }
}

pub fn book(book_id: &str) -> Value {
    json!({
        "bookId": book_id,
        "title": format!("Title {}", book_id),
        "authors": ["Natsume Soseki"],
        "description": "A novel.",
        "cover": format!("https://covers.example/{}.jpg", book_id),
        "publishedDate": "1906"
    })
}
