#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use basha_lagbe::{
    app,
    config::AppConfig,
    mail::{EmailMessage, MailError, Mailer},
    models::{Role, VerificationPurpose},
    state::AppState,
    store::{MemoryStore, Store},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secret123";

/// Keeps every message instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<EmailMessage>>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct Response {
    pub status: StatusCode,
    pub body: Value,
    pub cookie: Option<String>,
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: RecordingMailer,
}

/// One file part of a multipart upload.
pub struct Part<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn new(field: &'a str, file_name: &'a str, content_type: &'a str, size: usize) -> Self {
        Self {
            field,
            file_name,
            content_type,
            bytes: vec![0x42; size],
        }
    }
}

const BOUNDARY: &str = "basha-lagbe-test-boundary";

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, part.field, part.file_name, part.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Like [`TestApp::new`] with `adjust` applied to the test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig {
            store_backend: "memory".to_string(),
            jwt_secret: "integration-secret".to_string(),
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            upload_dir: std::env::temp_dir()
                .join("basha-lagbe-tests")
                .to_string_lossy()
                .into_owned(),
            ..AppConfig::default()
        };
        adjust(&mut config);
        let mailer = RecordingMailer::default();
        let state = AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(mailer.clone()),
        );
        Self {
            router: app(state.clone()),
            state,
            mailer,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Response {
            status,
            body,
            cookie,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.request(Method::GET, uri, None, cookie).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> Response {
        self.request(Method::POST, uri, Some(body), cookie).await
    }

    pub async fn put(&self, uri: &str, body: Value, cookie: Option<&str>) -> Response {
        self.request(Method::PUT, uri, Some(body), cookie).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.request(Method::DELETE, uri, None, cookie).await
    }

    /// Posts `parts` as `multipart/form-data`.
    pub async fn upload(&self, uri: &str, parts: &[Part<'_>], cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = builder.body(Body::from(multipart_body(parts))).unwrap();
        self.send(request).await
    }

    pub async fn signup(&self, username: &str, email: &str) -> Uuid {
        let response = self
            .post(
                "/api/auth/signup",
                json!({ "username": username, "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["user"]["id"].as_str().unwrap().parse().unwrap()
    }

    /// Signs up and signs in a regular account, returning the session cookie.
    pub async fn member(&self, username: &str, email: &str) -> (Uuid, String) {
        let id = self.signup(username, email).await;
        let response = self
            .post(
                "/api/auth/signin",
                json!({ "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        (id, response.cookie.unwrap())
    }

    pub async fn active_code(&self, user_id: Uuid, purpose: VerificationPurpose) -> String {
        self.state
            .store
            .find_active_verification(user_id, purpose)
            .await
            .unwrap()
            .expect("an active code")
            .code
    }

    /// Creates an admin and walks it through the emailed second factor.
    pub async fn admin(&self, email: &str) -> (Uuid, String) {
        let id = self.signup("site admin", email).await;
        let mut user = self.state.store.find_user(id).await.unwrap().unwrap();
        user.role = Role::Admin;
        self.state.store.update_user(user).await.unwrap();

        let response = self
            .post(
                "/api/auth/signin",
                json!({ "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(response.body["requiresVerification"], true);
        let code = self.active_code(id, VerificationPurpose::Login).await;
        let response = self
            .post(
                "/api/auth/verify-login",
                json!({ "userId": id, "code": code }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        (id, response.cookie.unwrap())
    }

    /// Creates a listing through the API and returns its id.
    pub async fn create_listing(&self, cookie: &str, payload: Value) -> Uuid {
        let response = self.post("/api/listing/create", payload, Some(cookie)).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["listing"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn approve(&self, admin_cookie: &str, listing_id: Uuid) {
        let response = self
            .put(
                &format!("/api/admin/properties/{}/status", listing_id),
                json!({ "status": "approved" }),
                Some(admin_cookie),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    }

    /// Waits for a background email to `to` whose subject contains `subject`.
    pub async fn wait_for_mail(&self, to: &str, subject: &str) -> EmailMessage {
        for _ in 0..100 {
            let found = self
                .mailer
                .sent
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.to == to && m.subject.contains(subject))
                .cloned();
            if let Some(message) = found {
                return message;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no email to {} with subject containing {:?}", to, subject);
    }
}

pub fn legacy_listing(name: &str, price: i64) -> Value {
    json!({
        "name": name,
        "address": "Road 3, Mirpur, Dhaka",
        "regularPrice": price,
        "bedrooms": 2,
        "type": "rent",
    })
}

pub fn sectioned_listing(title: &str, rent: i64) -> Value {
    json!({
        "basicInfo": { "title": title, "propertyType": "apartment", "listingType": "rent" },
        "location": { "city": "Dhaka", "area": "Banani" },
        "details": { "bedrooms": 3 },
        "pricing": { "rent": rent },
        "amenities": ["lift"],
    })
}
