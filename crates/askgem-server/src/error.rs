//! Request error types and their HTTP mapping.

use askgem_config::ConfigError;
use askgem_core::AgentError;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::envelope::{ErrorBody, HttpResponseEnvelope};

/// Everything that can end a request in the error state.
#[derive(Debug, Error)]
pub enum AskError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Please provide a 'question' field in the request body")]
    MissingQuestion,

    #[error("{0}")]
    InvalidBody(String),

    #[error(transparent)]
    Upstream(#[from] AgentError),

    #[error("Method {0} is not allowed, use POST or OPTIONS")]
    MethodNotAllowed(String),

    /// The host refused to read the body; `status` is the host's own code.
    #[error("{reason}")]
    BodyRejected { status: u16, reason: String },
}

impl AskError {
    pub fn status(&self) -> u16 {
        match self {
            AskError::Configuration(_) | AskError::Upstream(_) => 500,
            AskError::MissingQuestion | AskError::InvalidBody(_) => 400,
            AskError::MethodNotAllowed(_) => 405,
            AskError::BodyRejected { status, .. } => *status,
        }
    }

    /// Short label sent as the `error` field.
    pub fn label(&self) -> &'static str {
        match self {
            AskError::Configuration(_) => "Configuration error",
            AskError::MissingQuestion => "Question is required",
            AskError::InvalidBody(_) => "Invalid request body",
            AskError::Upstream(_) => "Internal server error",
            AskError::MethodNotAllowed(_) => "Method not allowed",
            AskError::BodyRejected { status: 413, .. } => "Payload too large",
            AskError::BodyRejected { .. } => "Invalid request body",
        }
    }

    pub fn into_envelope(self) -> HttpResponseEnvelope {
        HttpResponseEnvelope::json(
            self.status(),
            &ErrorBody {
                error: self.label().to_string(),
                message: self.to_string(),
            },
        )
    }
}

impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        self.into_envelope().into_response()
    }
}
