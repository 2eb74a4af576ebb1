use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::mail::MailError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot follow yourself.")]
    SelfFollow,

    #[error("Not following.")]
    NotFollowing,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid or expired OTP.")]
    InvalidOrExpiredOtp,

    #[error("OTP not verified.")]
    OtpNotVerified,

    #[error("Failed to deliver email")]
    Delivery(#[source] MailError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::SelfFollow
            | AppError::NotFollowing
            | AppError::InvalidOrExpiredOtp
            | AppError::OtpNotVerified => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Delivery(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(e) => error!(error = ?e, "internal error"),
            AppError::Delivery(e) => error!(error = %e, "mail delivery failed"),
            _ => {}
        }

        let field = match &self {
            AppError::Validation { field, .. } => Some(*field),
            _ => None,
        };
        let body = ErrorBody {
            detail: self.to_string(),
            field,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(
            AppError::validation("email", "Invalid email").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("User").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Conflict("Email already registered".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::SelfFollow.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidOrExpiredOtp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Delivery(MailError::Timeout).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::Internal(anyhow::anyhow!("password=hunter2 connection refused"));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn error_body_serializes_field_only_when_present() {
        let body = ErrorBody {
            detail: "Password too short".into(),
            field: Some("password"),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"field\":\"password\""));

        let body = ErrorBody {
            detail: "User not found".into(),
            field: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("field"));
    }
}
