//! Test helper module for identity-service integration tests.
//!
//! Builds the full router over in-memory collaborators and an HS256 token
//! validator, and drives it with `oneshot` while carrying the session cookie.

#![allow(dead_code)]

use chrono::Utc;
use http_body_util::BodyExt;
use identity_service::{
    apply_layers,
    config::IdentityConfig,
    models::{AssuranceLevel, SessionRecord, TokenReference, UserCredential},
    routes,
    services::{
        InMemoryCredentialStore, InMemoryUserSessionRegistry, JwtTokenValidator, SessionStore,
    },
    utils::{hash_password, Password},
    AppState,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use service_core::axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tower_sessions::Session;

pub const TOKEN_SECRET: &[u8] = b"integration-test-token-secret";
pub const ISSUER: &str = "https://id.example.test";
pub const AUDIENCE: &str = "identity-service";
pub const BASE_URL: &str = "https://id.example.test";
pub const ADMIN_SCOPE: &str = "identity:admin";
pub const SUBJECT: &str = "user-1";
pub const PASSWORD: &str = "Initial-Passw0rd";
pub const COOKIE_NAME: &str = "identity_session";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Router plus the in-memory collaborators behind it, acting as one browser.
pub struct TestApp {
    pub router: Router,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub user_sessions: Arc<InMemoryUserSessionRegistry>,
    cookie: Mutex<Option<String>>,
}

fn test_config() -> IdentityConfig {
    IdentityConfig::from_lookup(Default::default(), &|key: &str| {
        let value = match key {
            "BASE_URL" => BASE_URL,
            "ADMIN_SCOPE" => ADMIN_SCOPE,
            "ADMIN_CLIENT_ID" => "admin-console",
            "STEP_UP_ACCOUNT_CLIENT_ID" => "account-management",
            "PASSWORD_POLICY" => "medium",
            "HTTP_REQUEST_LOGGING" => "false",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test configuration is valid")
}

/// Test-only routes to put a record in the session and read it back.
async fn seed_session(session: Session, Json(record): Json<SessionRecord>) -> StatusCode {
    session
        .save_record(&record)
        .await
        .expect("Failed to seed session");
    StatusCode::NO_CONTENT
}

async fn read_session(session: Session) -> Json<serde_json::Value> {
    let record = session.get_record().await.expect("Failed to read session");
    Json(json!(record))
}

impl TestApp {
    pub fn spawn() -> Self {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let user_sessions = Arc::new(InMemoryUserSessionRegistry::new());

        let hash = hash_password(&Password::new(PASSWORD)).expect("Failed to hash password");
        credentials.insert(UserCredential::new(SUBJECT, hash.into_string()));

        let validator =
            JwtTokenValidator::from_secret(TOKEN_SECRET, Some(ISSUER), Some(AUDIENCE));

        let state = AppState::new(
            test_config(),
            None,
            credentials.clone(),
            user_sessions.clone(),
            Arc::new(validator),
        );

        let router = routes(&state).route(
            "/test/session",
            get(read_session).post(seed_session),
        );

        Self {
            router: apply_layers(router, &state),
            credentials,
            user_sessions,
            cookie: Mutex::new(None),
        }
    }

    pub fn credential(&self) -> UserCredential {
        self.credentials.get(SUBJECT).expect("credential exists")
    }

    /// Put a signed-in record for `SUBJECT` in this browser's session.
    pub async fn sign_in(&self, scopes: &[&str], assurance: AssuranceLevel) {
        self.seed(SessionRecord::with_tokens(mint_tokens(SUBJECT, scopes, assurance)))
            .await;
    }

    pub async fn seed(&self, record: SessionRecord) {
        let response = self
            .send(
                Method::POST,
                "/test/session",
                &[(header::CONTENT_TYPE.as_str(), "application/json")],
                Body::from(serde_json::to_vec(&record).unwrap()),
            )
            .await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }

    /// The raw session record, `Null` when absent.
    pub async fn session_record(&self) -> serde_json::Value {
        self.get("/test/session").await.body
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, &[], Body::empty()).await
    }

    pub async fn get_xhr(&self, path: &str) -> TestResponse {
        self.send(
            Method::GET,
            path,
            &[("x-requested-with", "XMLHttpRequest")],
            Body::empty(),
        )
        .await
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        self.send(
            Method::POST,
            path,
            &[(
                header::CONTENT_TYPE.as_str(),
                "application/x-www-form-urlencoded",
            )],
            Body::from(body),
        )
        .await
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Body,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(cookie) = self.cookie.lock().unwrap().clone() {
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("Failed to execute request");

        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_string();
            if pair.starts_with(&format!("{}=", COOKIE_NAME)) {
                *self.cookie.lock().unwrap() = Some(pair);
            }
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub fn mint_tokens(subject: &str, scopes: &[&str], assurance: AssuranceLevel) -> TokenReference {
    let exp = Utc::now().timestamp() + 3600;
    let key = EncodingKey::from_secret(TOKEN_SECRET);
    let header = Header::new(Algorithm::HS256);

    let access_token = encode(
        &header,
        &json!({
            "sub": subject,
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": exp,
            "scope": scopes.join(" "),
        }),
        &key,
    )
    .unwrap();

    let id_token = encode(
        &header,
        &json!({
            "sub": subject,
            "iss": ISSUER,
            "aud": "account-management",
            "exp": exp,
            "acr": assurance.acr(),
        }),
        &key,
    )
    .unwrap();

    TokenReference {
        access_token,
        id_token: Some(id_token),
        refresh_token: None,
    }
}
