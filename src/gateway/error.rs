//! HTTP rendering of [`ConfabError`]

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::utils::error::ConfabError;

const INTERNAL_MESSAGE: &str = "Internal server error";

impl ConfabError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConfabError::Validation { .. } => StatusCode::BAD_REQUEST,
            ConfabError::NotFound { .. } => StatusCode::NOT_FOUND,
            ConfabError::Conflict { .. } => StatusCode::CONFLICT,
            ConfabError::Transport { .. }
            | ConfabError::Upstream { .. }
            | ConfabError::Decode { .. } => StatusCode::BAD_GATEWAY,
            ConfabError::Persistence { .. } | ConfabError::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to a client
    fn public_message(&self) -> String {
        match self {
            ConfabError::Persistence { .. } | ConfabError::Config { .. } => {
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ConfabError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_client_error() {
            debug!(status = status.as_u16(), error = %self, "Request rejected");
        } else if self.is_upstream() {
            warn!(status = status.as_u16(), error = %self, "Completion call failed");
            if let ConfabError::Upstream { body, .. } = &self {
                debug!(body = %body, "Upstream error body");
            }
        } else {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = json!({
            "error": true,
            "message": self.public_message(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ConfabError {
    fn from(rejection: JsonRejection) -> Self {
        ConfabError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ConfabError {
    fn from(rejection: QueryRejection) -> Self {
        ConfabError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ConfabError {
    fn from(rejection: PathRejection) -> Self {
        ConfabError::validation(rejection.body_text())
    }
}
