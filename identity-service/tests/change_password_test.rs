//! Password change over HTTP.

mod common;

use chrono::Utc;
use common::{TestApp, PASSWORD};
use identity_service::{
    models::AssuranceLevel,
    utils::{hash_password, Password},
};
use service_core::axum::http::StatusCode;

const CHANGE_PATH: &str = "/account/change-password";
const NEW_PASSWORD: &str = "Rotated-Passw0rd";

#[tokio::test]
async fn change_rotates_hash_and_voids_recovery_code() {
    // Arrange
    let app = TestApp::spawn();
    let mut credential = app.credential();
    credential.issue_recovery_code(
        hash_password(&Password::new("recovery-code")).unwrap().into_string(),
        Utc::now(),
    );
    app.credentials.insert(credential);
    let previous_hash = app.credential().password_hash;
    app.sign_in(&["openid"], AssuranceLevel::PasswordMfa).await;

    // Act
    let response = app
        .post_form(
            CHANGE_PATH,
            &[
                ("current_password", PASSWORD),
                ("new_password", NEW_PASSWORD),
                ("new_password_confirmation", NEW_PASSWORD),
            ],
        )
        .await;

    // Assert
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["changed"], true);
    let credential = app.credential();
    assert_ne!(credential.password_hash, previous_hash);
    assert!(!credential.has_outstanding_recovery_code());
    assert!(credential.recovery_code_issued_utc.is_none());
}

#[tokio::test]
async fn wrong_current_password_is_reported_before_other_problems() {
    // Arrange
    let app = TestApp::spawn();
    let previous_hash = app.credential().password_hash;
    app.sign_in(&["openid"], AssuranceLevel::PasswordMfa).await;

    // Act
    let response = app
        .post_form(
            CHANGE_PATH,
            &[
                ("current_password", "not-the-password"),
                ("new_password", NEW_PASSWORD),
                ("new_password_confirmation", "something-else"),
            ],
        )
        .await;

    // Assert
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body["error"],
        "Authentication failed. Check your current password and try again."
    );
    assert_eq!(app.credential().password_hash, previous_hash);
}

#[tokio::test]
async fn confirmation_mismatch_is_rejected() {
    // Arrange
    let app = TestApp::spawn();
    let previous_hash = app.credential().password_hash;
    app.sign_in(&["openid"], AssuranceLevel::PasswordMfa).await;

    // Act
    let response = app
        .post_form(
            CHANGE_PATH,
            &[
                ("current_password", PASSWORD),
                ("new_password", NEW_PASSWORD),
                ("new_password_confirmation", "Rotated-Passw0rd!"),
            ],
        )
        .await;

    // Assert
    assert_eq!(
        response.body["error"],
        "The new password confirmation does not match the password."
    );
    assert_eq!(app.credential().password_hash, previous_hash);
}

#[tokio::test]
async fn weak_password_is_refused_by_policy() {
    // Arrange
    let app = TestApp::spawn();
    app.sign_in(&["openid"], AssuranceLevel::PasswordMfa).await;

    // Act
    let response = app
        .post_form(
            CHANGE_PATH,
            &[
                ("current_password", PASSWORD),
                ("new_password", "short"),
                ("new_password_confirmation", "short"),
            ],
        )
        .await;

    // Assert
    assert!(response.body["error"].is_string());
    assert!(response.body.get("changed").is_none());
}

#[tokio::test]
async fn anonymous_caller_is_sent_to_step_up() {
    // Arrange
    let app = TestApp::spawn();
    let previous_hash = app.credential().password_hash;

    // Act
    let response = app
        .post_form(
            CHANGE_PATH,
            &[
                ("current_password", PASSWORD),
                ("new_password", NEW_PASSWORD),
                ("new_password_confirmation", NEW_PASSWORD),
            ],
        )
        .await;

    // Assert
    assert_eq!(response.status, StatusCode::FOUND);
    assert!(response
        .location()
        .unwrap()
        .ends_with("redirect_uri=%2Faccount%2Fchange-password"));
    assert_eq!(app.credential().password_hash, previous_hash);
}

#[tokio::test]
async fn step_up_return_url_resumes_the_change_form() {
    // Arrange
    let app = TestApp::spawn();
    app.sign_in(&["openid"], AssuranceLevel::Password).await;
    let denied = app
        .post_form(
            CHANGE_PATH,
            &[
                ("current_password", PASSWORD),
                ("new_password", NEW_PASSWORD),
                ("new_password_confirmation", NEW_PASSWORD),
            ],
        )
        .await;
    let location = denied.location().unwrap().to_string();
    let encoded = location.split("redirect_uri=").nth(1).unwrap();
    let return_url = urlencoding::decode(encoded).unwrap().into_owned();

    // Act
    app.sign_in(&["openid"], AssuranceLevel::PasswordMfa).await;
    let resumed = app.get(&return_url).await;

    // Assert
    assert_eq!(denied.status, StatusCode::FOUND);
    assert_eq!(return_url, CHANGE_PATH);
    assert_eq!(resumed.status, StatusCode::OK);
    assert_eq!(resumed.body["changed"], false);
}
