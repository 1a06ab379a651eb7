//! End-user account security: second factor and password change.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use tower_sessions::Session;

use crate::middleware::CurrentIdentity;
use crate::models::AuthContext;
use crate::services::{
    ChangePasswordForm, EnrollmentOutcome, PasswordChangeOutcome, SessionStore, StepUp,
};
use crate::utils::Password;
use crate::AppState;

pub const OTP_PATH: &str = "/account/otp";

#[derive(Deserialize)]
pub struct OtpRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirmation: String,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// The caller's context if it meets the configured assurance level, otherwise
/// the re-authentication redirect to send instead.
fn stepped_up<'a>(
    state: &AppState,
    identity: &'a CurrentIdentity,
    uri: &Uri,
) -> Result<&'a AuthContext, Response> {
    let return_path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    match state
        .step_up
        .check(identity.context(), state.config.step_up.required_level, return_path)
    {
        StepUp::Satisfied => identity
            .context()
            .ok_or_else(|| StatusCode::UNAUTHORIZED.into_response()),
        StepUp::Required(redirect) => Err(found(&redirect.location())),
    }
}

pub async fn otp_page(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    session: Session,
    uri: Uri,
) -> Result<Response, AppError> {
    let ctx = match stepped_up(&state, &identity, &uri) {
        Ok(ctx) => ctx,
        Err(redirect) => return Ok(redirect),
    };

    let mut record = session.get_record().await?.unwrap_or_default();
    let view = state.enrollment.view(ctx, &mut record).await?;
    session.save_record(&record).await?;

    Ok(Json(view).into_response())
}

pub async fn otp_submit(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    session: Session,
    uri: Uri,
    Form(form): Form<OtpRequest>,
) -> Result<Response, AppError> {
    let ctx = match stepped_up(&state, &identity, &uri) {
        Ok(ctx) => ctx,
        Err(redirect) => return Ok(redirect),
    };

    let mut record = session.get_record().await?.unwrap_or_default();
    let outcome = state
        .enrollment
        .submit(
            ctx,
            &mut record,
            &Password::new(form.password),
            &form.otp,
            Utc::now(),
        )
        .await?;

    match &outcome {
        EnrollmentOutcome::Enabled | EnrollmentOutcome::Disabled => {
            session.save_record(&record).await?;
            Ok(found(OTP_PATH))
        }
        EnrollmentOutcome::Rejected { reason, .. } => {
            let mut body = serde_json::to_value(outcome.view())
                .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;
            body["error"] = json!(reason.to_string());
            Ok(Json(body).into_response())
        }
    }
}

/// Form state of the password change page, where a step-up returns to.
pub async fn change_password_page(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    uri: Uri,
) -> Response {
    match stepped_up(&state, &identity, &uri) {
        Ok(_) => Json(json!({ "changed": false })).into_response(),
        Err(redirect) => redirect,
    }
}

pub async fn change_password(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    uri: Uri,
    Form(form): Form<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    let ctx = match stepped_up(&state, &identity, &uri) {
        Ok(ctx) => ctx,
        Err(redirect) => return Ok(redirect),
    };

    let outcome = state
        .rotation
        .change_password(
            ctx,
            ChangePasswordForm {
                current_password: Password::new(form.current_password),
                new_password: Password::new(form.new_password),
                new_password_confirmation: Password::new(form.new_password_confirmation),
            },
        )
        .await?;

    let body = match outcome {
        PasswordChangeOutcome::Changed => json!({ "changed": true }),
        PasswordChangeOutcome::Rejected(rejection) => json!({ "error": rejection.to_string() }),
    };

    Ok(Json(body).into_response())
}
