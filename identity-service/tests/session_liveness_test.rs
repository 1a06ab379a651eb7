//! Browser sessions follow the server-side sign-in session they belong to.

mod common;

use common::{TestApp, ADMIN_SCOPE, SUBJECT};
use identity_service::models::{AssuranceLevel, SessionRecord};
use service_core::axum::http::StatusCode;

const ADMIN_PATH: &str = "/admin/session";

fn signed_in_record(user_session_id: &str) -> SessionRecord {
    let mut record = SessionRecord::with_tokens(common::mint_tokens(
        SUBJECT,
        &["openid", ADMIN_SCOPE],
        AssuranceLevel::PasswordMfa,
    ));
    record.user_session_id = Some(user_session_id.to_string());
    record
}

#[tokio::test]
async fn active_sign_in_session_keeps_identity() {
    // Arrange
    let app = TestApp::spawn();
    app.user_sessions.start("us-1");
    app.seed(signed_in_record("us-1")).await;

    // Act
    let response = app.get(ADMIN_PATH).await;

    // Assert
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["subject"], SUBJECT);
}

#[tokio::test]
async fn ended_sign_in_session_empties_browser_session() {
    // Arrange
    let app = TestApp::spawn();
    app.user_sessions.start("us-1");
    app.seed(signed_in_record("us-1")).await;
    assert_eq!(app.get(ADMIN_PATH).await.status, StatusCode::OK);

    // Act
    app.user_sessions.end("us-1");
    let response = app.get(ADMIN_PATH).await;

    // Assert
    assert_eq!(response.status, StatusCode::FOUND);
    let record = app.session_record().await;
    assert!(record.get("tokens").is_none());
    assert!(record.get("user_session_id").is_none());
}
