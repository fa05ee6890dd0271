// Shared setup for the integration tests: an in-memory SQLite database with
// migrations applied, the full router, and fakes for the outbound services.
#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::{Value, json};
use tower::ServiceExt;
use trailshare::{
    AppState, Config, build_router, database,
    entities::user_role::{self, Role},
    services::{
        Candidate, Coordinates, Email, GeocodeError, Geocoder, MailError, Mailer,
        RelevanceScorer, ScoringError,
    },
};
use uuid::Uuid;

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR png body";
pub const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF jpeg body";
pub const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 webp body";

/// Resolves every location to the same point
pub struct FixedGeocoder(pub Option<Coordinates>);

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, _location: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(self.0)
    }
}

/// Collects sent emails instead of delivering them
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent_to(&self, address: &str) -> Vec<Email> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|email| email.to == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Stands in for a language model that is down
pub struct FailingScorer;

#[async_trait]
impl RelevanceScorer for FailingScorer {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn score(
        &self,
        _query: &str,
        _candidates: &[Candidate],
    ) -> Result<std::collections::HashMap<Uuid, u8>, ScoringError> {
        Err(ScoringError::Parse("model unavailable".to_string()))
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub storage_root: PathBuf,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with(|state| state).await
    }

    /// Build the app, letting the test swap collaborators on the state first
    pub async fn with(customize: impl FnOnce(AppState) -> AppState) -> Self {
        let storage_root = std::env::temp_dir().join(format!("trailshare-test-{}", Uuid::new_v4()));
        let config = Config::for_tests(&storage_root);
        let db = database::connect_and_migrate(&config.database_url)
            .await
            .expect("Failed to set up test database");
        let mailer = Arc::new(RecordingMailer::default());
        let state = customize(AppState::new(db, config).with_mailer(mailer.clone()));
        Self {
            router: build_router(state.clone()),
            state,
            mailer,
            storage_root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            headers,
            body,
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
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn signup(&self, email: &str, display_name: &str) -> TestUser {
        let response = self
            .post(
                "/auth/signup",
                None,
                json!({"email": email, "password": "correct horse", "display_name": display_name}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "signup failed: {}", response.body);
        TestUser {
            id: response.body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email: email.to_string(),
            token: response.body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn grant(&self, user: &TestUser, role: Role) {
        user_role::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            role: Set(role),
            granted_at: Set(Utc::now()),
        }
        .insert(&self.state.db)
        .await
        .unwrap();
    }

    pub async fn create_listing(&self, owner: &TestUser, body: Value) -> Value {
        let response = self.post("/equipment", Some(&owner.token), body).await;
        assert_eq!(response.status, StatusCode::CREATED, "create failed: {}", response.body);
        response.body
    }

    pub async fn tent(&self, owner: &TestUser) -> Uuid {
        let listing = self
            .create_listing(
                owner,
                json!({
                    "title": "Two person tent",
                    "description": "Light three-season tent",
                    "category": "camping",
                    "condition": "good",
                    "price_per_day_cents": 1500
                }),
            )
            .await;
        id_of(&listing)
    }

    pub async fn upload(
        &self,
        user: &TestUser,
        equipment_id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> TestResponse {
        let boundary = "trailshare-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/equipment/{equipment_id}/images"))
            .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage_root);
    }
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().expect("id field").parse().expect("uuid")
}

pub fn filter_uri(path: &str, filter: &Value) -> String {
    format!("{path}?filter={}", url_escape::encode_component(&filter.to_string()))
}

pub fn content_range(response: &TestResponse) -> String {
    response
        .headers
        .get(header::CONTENT_RANGE)
        .expect("content-range header")
        .to_str()
        .unwrap()
        .to_string()
}
