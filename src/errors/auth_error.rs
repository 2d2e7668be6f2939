use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingAuthHeader,

    #[error("Invalid Authorization header, expected 'Bearer <token>'")]
    InvalidAuthHeader,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (self.status_code(), body).into_response()
    }
}
