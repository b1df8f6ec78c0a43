use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::auth::{AccessDenied, LoginError, TokenError};
use crate::db::{DatabaseError, InvalidTransition};
use crate::services::UploadRejected;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Inactive user")]
    InactiveUser,

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(err) => match err {
                DatabaseError::NotFound => StatusCode::NOT_FOUND,
                DatabaseError::Duplicate(_) => StatusCode::CONFLICT,
                DatabaseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) | AppError::InactiveUser => StatusCode::BAD_REQUEST,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::Database(DatabaseError::NotFound) | AppError::NotFound(_) => "Resource not found",
            AppError::Database(DatabaseError::Duplicate(_)) | AppError::Conflict(_) => {
                "Resource already exists"
            }
            AppError::Database(DatabaseError::InvalidInput(_)) | AppError::InvalidInput(_) => {
                "Invalid input data"
            }
            AppError::Unauthorized(_) => "Authentication failed",
            AppError::Forbidden(_) => "Access denied",
            AppError::InactiveUser => "Inactive user",
            AppError::Database(_) | AppError::InternalServerError(_) => {
                "An internal server error occurred"
            }
        };

        // Internal details stay in the logs.
        let details = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            error_message.to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "details": details,
            }
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(DatabaseError::from(err))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(err: FormRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(err: PathRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<AccessDenied> for AppError {
    fn from(err: AccessDenied) -> Self {
        AppError::Forbidden(err.to_string())
    }
}

impl From<LoginError> for AppError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidCredentials => {
                AppError::Unauthorized("Incorrect username or password".to_string())
            }
            LoginError::InactiveUser => AppError::InactiveUser,
        }
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<UploadRejected> for AppError {
    fn from(err: UploadRejected) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => AppError::InternalServerError(err.to_string()),
            TokenError::Invalid(_) => AppError::Unauthorized("Could not validate credentials".to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InactiveUser.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_errors_keep_their_meaning() {
        assert_eq!(
            AppError::from(DatabaseError::Duplicate("companies_rut_key".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rejected_uploads_are_bad_requests() {
        let err = AppError::from(UploadRejected::DisallowedExtension {
            extension: "exe".into(),
            allowed: "pdf".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn login_failures_are_distinguished() {
        assert_eq!(AppError::from(LoginError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(LoginError::InactiveUser).status(), StatusCode::BAD_REQUEST);
    }
}
