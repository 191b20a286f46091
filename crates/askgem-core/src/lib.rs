//! Core domain types and error definitions for askgem.
//!
//! This crate provides the fundamental types shared across the askgem crates:
//!
//! - [`AgentError`] — Error type for model invocation
//! - [`Question`] and [`Answer`] — The request and response payloads
//! - [`RetryPolicy`] — Backoff contract honored by the model client
//! - [`BuiltinTool`] — Server-side tools the model may use during inference
//!
//! # Example
//!
//! ```rust
//! use askgem_core::{Question, RetryPolicy};
//!
//! let question = Question::new("  What is Rust?  ").unwrap();
//! assert_eq!(question.as_str(), "What is Rust?");
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_attempts(), 5);
//! ```

mod retry;

pub use retry::{PolicyError, RetryPolicy};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while invoking the hosted model.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("LLM request failed: {0}")]
    Http(String),

    /// The request exceeded the configured client timeout.
    #[error("LLM request timed out: {0}")]
    Timeout(String),

    /// The API answered with a non-success status.
    #[error("Gemini API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The API answered successfully but without usable text.
    #[error("Model returned no content: {0}")]
    EmptyResponse(String),

    /// The response body could not be decoded.
    #[error("Failed to parse model response: {0}")]
    ParseError(String),
}

impl AgentError {
    /// Returns the HTTP status code for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            AgentError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::ParseError(err.to_string())
    }
}

// ============================================================================
// Question / Answer
// ============================================================================

/// Returned when a question is empty after trimming.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("question is empty")]
pub struct EmptyQuestion;

/// A caller-supplied question, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Trims surrounding whitespace and rejects empty input.
    pub fn new(raw: &str) -> Result<Self, EmptyQuestion> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyQuestion);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for Question {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model output. Opaque text; never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Answer(String);

impl Answer {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Answer {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Answer {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// A tool executed by the model service itself during inference.
///
/// These are declared in the request; the service decides whether and how
/// often to call them. Nothing runs on our side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    /// Grounding with Google Search.
    GoogleSearch,
}

impl BuiltinTool {
    /// Returns the tool's wire name.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTool::GoogleSearch => "google_search",
        }
    }
}
