#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use board_service::config::BoardConfig;
use board_service::services::MemoryStore;
use board_service::startup::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub set_cookie: Option<String>,
    pub body: Value,
}

impl TestApp {
    pub fn spawn() -> Self {
        let store = MemoryStore::new();
        let state = AppState::new(
            BoardConfig::for_memory("integration-test-secret"),
            Arc::new(store.clone()),
        );

        TestApp {
            router: build_router(state),
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, session);
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
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            set_cookie,
            body,
        }
    }

    /// Sign up and log in `username`, returning the `session=...` cookie pair.
    pub async fn session_for(&self, username: &str) -> String {
        let email = format!("{}@example.com", username);

        let signup = self
            .request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "username": username, "email": email, "password": TEST_PASSWORD })),
            )
            .await;
        assert_eq!(signup.status, StatusCode::CREATED, "{}", signup.body);

        let login = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": TEST_PASSWORD })),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);

        cookie_pair(login.set_cookie.as_deref().expect("login sets a cookie"))
    }

    pub async fn create_board(&self, session: &str, title: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/boards",
                Some(session),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["board"].clone()
    }

    pub async fn create_list(&self, session: &str, board_id: &str, title: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                &format!("/api/boards/{}/lists", board_id),
                Some(session),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["list"].clone()
    }

    pub async fn create_card(&self, session: &str, list_id: &str, body: Value) -> Value {
        let response = self
            .request(
                Method::POST,
                &format!("/api/lists/{}/cards", list_id),
                Some(session),
                Some(body),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["card"].clone()
    }

    pub async fn lists(&self, session: &str, board_id: &str) -> Vec<Value> {
        let response = self
            .request(
                Method::GET,
                &format!("/api/boards/{}/lists", board_id),
                Some(session),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["lists"].as_array().cloned().unwrap_or_default()
    }

    pub async fn cards(&self, session: &str, list_id: &str) -> Vec<Value> {
        let response = self
            .request(
                Method::GET,
                &format!("/api/lists/{}/cards", list_id),
                Some(session),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["cards"].as_array().cloned().unwrap_or_default()
    }

    /// Board `lists` sequence and list positions agree and positions are unique.
    pub async fn assert_board_consistent(&self, session: &str, board_id: &str) {
        let board = self
            .request(
                Method::GET,
                &format!("/api/boards/{}", board_id),
                Some(session),
                None,
            )
            .await;
        let lists = self.lists(session, board_id).await;

        let sequence: Vec<String> = board.body["board"]["lists"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        let by_position: Vec<String> = lists.iter().map(id_of).collect();
        assert_eq!(sequence, by_position);

        let positions: Vec<i64> = lists.iter().map(|l| l["position"].as_i64().unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }
}

/// `session=...` from a Set-Cookie header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().trim().to_string()
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

pub fn titles(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| v["title"].as_str().unwrap().to_string())
        .collect()
}
