use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-level failure taxonomy. Everything a handler can return maps
/// onto one of these; store errors never leak their detail to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    AlreadyExists,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Incorrect password")]
    InvalidCredentials,

    #[error("Password reset token is invalid or has expired")]
    InvalidOrExpiredToken,

    #[error("Posting user does not exist")]
    OwnerNotFound,

    #[error("Error sending email")]
    Delivery(#[source] anyhow::Error),

    #[error("Server error")]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::AlreadyExists
            | ApiError::InvalidCredentials
            | ApiError::InvalidOrExpiredToken
            | ApiError::OwnerNotFound => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Delivery(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            // 23505 unique_violation, 23503 foreign_key_violation
            match db.code().as_deref() {
                Some("23505") => return ApiError::AlreadyExists,
                Some("23503") => return ApiError::OwnerNotFound,
                _ => {}
            }
        }
        ApiError::Store(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_correctable_errors_are_400() {
        assert_eq!(
            ApiError::validation("missing field").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::AlreadyExists.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidOrExpiredToken.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::OwnerNotFound.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_records_are_404() {
        assert_eq!(ApiError::NotFound("User").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::NotFound("Property").status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn infrastructure_errors_are_500() {
        assert_eq!(
            ApiError::Delivery(anyhow::anyhow!("smtp down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Store(anyhow::anyhow!("pool exhausted")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_never_leak_detail() {
        let e = ApiError::Store(anyhow::anyhow!("connection refused at 10.0.0.3:5432"));
        assert_eq!(e.to_string(), "Server error");
    }

    #[test]
    fn not_found_names_the_record() {
        assert_eq!(ApiError::NotFound("Property").to_string(), "Property not found");
    }
}
