use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use super::{
    dto::{ForgotPasswordRequest, ResetPasswordRequest, VerifyOtpRequest},
    services::PasswordReset,
};
use crate::{
    auth::services::parse_email, dto::DetailResponse, error::AppError, state::AppState,
};

pub fn password_reset_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/password/reset", post(request_otp))
        .route("/auth/password/reset/validate", post(verify_otp))
        .route("/auth/password/reset/confirm", post(reset_password))
}

fn flow(state: &AppState) -> PasswordReset<'_> {
    PasswordReset::new(
        &state.db,
        state.kv.as_ref(),
        state.mailer.as_ref(),
        &state.config.otp,
        &state.config.smtp.from,
    )
}

#[instrument(skip(state, payload))]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    let email = parse_email(&payload.email)?;
    flow(&state).request_otp(&email).await?;
    Ok(Json(DetailResponse::new("OTP sent to your email.")))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    let email = parse_email(&payload.email)?;
    flow(&state).verify_otp(&email, &payload.otp).await?;
    Ok(Json(DetailResponse::new("OTP verified.")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    let email = parse_email(&payload.email)?;
    flow(&state)
        .reset_password(&email, &payload.password)
        .await?;
    Ok(Json(DetailResponse::new("Password has been reset.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_email_is_rejected_up_front() {
        let state = AppState::fake();
        let err = request_otp(
            State(state.clone()),
            Json(ForgotPasswordRequest {
                email: "not-an-email".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "email", .. }));

        let err = verify_otp(
            State(state),
            Json(VerifyOtpRequest {
                email: "@example.com".into(),
                otp: "1234".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "email", .. }));
    }
}
