use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the credential service and the user store.
///
/// Storage failures propagate unchanged inside `Database`/`Internal`; nothing
/// is retried.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email in use")]
    DuplicateEmail,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not signed in")]
    NotSignedIn,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::DuplicateEmail => (StatusCode::CONFLICT, self.to_string()),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AuthError::InvalidCredentials | AuthError::NotSignedIn => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AuthError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AuthError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let res = AuthError::DuplicateEmail.into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = AuthError::UserNotFound.into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = AuthError::InvalidCredentials.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let res = AuthError::Internal(anyhow::anyhow!("pool exhausted")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
