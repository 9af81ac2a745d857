//! Shared harness for the API integration tests
//!
//! Each [`TestApp`] owns a fresh in-memory store, so tests never see each
//! other's data and need no database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use taskhub_api::{
    app::{build_router, AppState},
    config::Config,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secret123";

pub struct TestApp {
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self {
            router: build_router(AppState::in_memory(Config::for_tests())),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn register(&self, email: &str) -> TestResponse {
        self.post(
            "/register",
            None,
            json!({ "name": "Test User", "email": email, "password": PASSWORD }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post(
            "/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Registers a fresh user and returns a bearer token for them
    pub async fn signed_in_user(&self) -> String {
        let email = format!("user-{}@example.com", Uuid::new_v4());
        assert_eq!(self.register(&email).await.status, StatusCode::CREATED);

        let response = self.login(&email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK);
        response.body["token"].as_str().unwrap().to_string()
    }

    /// Creates a task and returns its JSON
    pub async fn create_task(&self, token: &str, title: &str) -> Value {
        let response = self
            .post(
                "/tasks",
                Some(token),
                json!({ "title": title, "description": "details", "status": "pending" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["task"].clone()
    }
}
