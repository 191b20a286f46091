//! API key diagnostics: one unretried test call, classified into guidance.

use std::fmt::Write as _;
use std::time::Duration;

use askgem_config::{ApiKey, Settings};
use askgem_core::{AgentError, RetryPolicy};
use askgem_llm::{ChatModel, GeminiClient, GenerateRequest, LlmResponse};
use serde_json::Value;
use tracing::debug;

pub const TEST_PROMPT: &str = "Hello! Say 'API works' in Spanish.";
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

const ENABLE_API_URL: &str =
    "https://console.cloud.google.com/apis/library/generativelanguage.googleapis.com";

/// Outcome of the test call.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    Working { reply: String },
    InvalidKey { status: String, message: String },
    BadRequest { body: String },
    Forbidden,
    Timeout,
    Unreachable(String),
    Unexpected(String),
}

impl Diagnosis {
    pub fn from_result(result: Result<LlmResponse, AgentError>) -> Self {
        match result {
            Ok(response) => Diagnosis::Working { reply: response.content },
            Err(AgentError::Api { status: 400, body }) => classify_bad_request(body),
            Err(AgentError::Api { status: 403, .. }) => Diagnosis::Forbidden,
            Err(AgentError::Timeout(_)) => Diagnosis::Timeout,
            Err(AgentError::Http(reason)) => Diagnosis::Unreachable(reason),
            Err(other) => Diagnosis::Unexpected(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Diagnosis::Working { .. })
    }

    /// Human-readable report with next steps.
    pub fn report(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = match self {
            Diagnosis::Working { reply } => writeln!(
                out,
                "OK: the API key works.\n\nGemini replied: {}\n\nIf requests still fail, check the agent configuration.",
                reply
            ),
            Diagnosis::InvalidKey { status, message } => writeln!(
                out,
                "ERROR 400: the key exists but is not valid for Gemini.\n\
                 Status: {}\nMessage: {}\n\n\
                 Possible causes:\n  - key belongs to a different service\n  - key is restricted to specific IPs or domains\n  - Generative Language API is not enabled\n\n\
                 Fix:\n  1. Open {}\n  2. Select the right project\n  3. Click ENABLE if the API is disabled\n  4. Wait a minute or two and retry",
                status, message, ENABLE_API_URL
            ),
            Diagnosis::BadRequest { body } => writeln!(out, "ERROR 400: bad request.\n\nFull response:\n{}", body),
            Diagnosis::Forbidden => writeln!(
                out,
                "ERROR 403: the key has no permission to use the Gemini API.\n\n\
                 Fix:\n  1. Check you are in the right project\n  2. Open {}\n  3. Enable the API",
                ENABLE_API_URL
            ),
            Diagnosis::Timeout => writeln!(
                out,
                "ERROR: the request took longer than {}s.",
                CHECK_TIMEOUT.as_secs()
            ),
            Diagnosis::Unreachable(reason) => writeln!(out, "ERROR: connection failed: {}", reason),
            Diagnosis::Unexpected(reason) => writeln!(out, "ERROR: unexpected failure: {}", reason),
        };
        out
    }
}

fn classify_bad_request(body: String) -> Diagnosis {
    let error = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").cloned());

    let field = |name: &str| {
        error
            .as_ref()
            .and_then(|e| e.get(name))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let status = field("status");
    let message = field("message");

    // Gemini reports bad keys as INVALID_ARGUMENT with the reason in details.
    if status.contains("API_KEY_INVALID") || message.contains("API key not valid") || body.contains("API_KEY_INVALID") {
        return Diagnosis::InvalidKey { status, message };
    }

    let body = match serde_json::from_str::<Value>(&body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(body),
        Err(_) => body,
    };
    Diagnosis::BadRequest { body }
}

/// Prints the key summary and returns the test call's diagnosis.
pub async fn run(settings: &Settings, key: &ApiKey) -> Result<Diagnosis, AgentError> {
    println!("API key: {}", key.masked_ends());
    println!("  Length: {} characters\n", key.char_count());

    let client = GeminiClient::from_settings(settings, &settings.direct_model)?
        .with_retry(RetryPolicy::no_retry())
        .with_timeout(CHECK_TIMEOUT)?;

    println!("Sending test request to {} ...\n", client.model());
    debug!("Test prompt: {}", TEST_PROMPT);

    let result = client.generate(&GenerateRequest::new(TEST_PROMPT)).await;
    Ok(Diagnosis::from_result(result))
}
