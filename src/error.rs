use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Domain errors for the preview orchestrator, one variant per failure kind
/// the pipeline can surface.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("git clone failed: {message}")]
    CloneFailed { message: String },

    #[error("failed to parse compose file: {message}")]
    ComposeParseError { message: String },

    #[error("docker compose up failed: {message}")]
    ComposeUpFailed { message: String },

    #[error("no free port available in range {start}..{end}")]
    NoFreePort { start: u16, end: u16 },

    #[error("nginx config invalid: {message}")]
    NginxConfigInvalid { message: String },

    #[error("nginx reload failed: {message}")]
    NginxReloadFailed { message: String },

    #[error("secret store unavailable: {message}")]
    SecretStoreUnavailable { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match &self {
            OrchestratorError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            OrchestratorError::ComposeParseError { .. } => StatusCode::BAD_REQUEST,
            OrchestratorError::CloneFailed { .. }
            | OrchestratorError::ComposeUpFailed { .. }
            | OrchestratorError::NoFreePort { .. }
            | OrchestratorError::NginxConfigInvalid { .. }
            | OrchestratorError::NginxReloadFailed { .. }
            | OrchestratorError::SecretStoreUnavailable { .. }
            | OrchestratorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
