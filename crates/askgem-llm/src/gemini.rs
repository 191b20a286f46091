//! Gemini `generateContent` client.

use std::time::{Duration, Instant};

use askgem_config::{Settings, DEFAULT_API_BASE};
use askgem_core::{AgentError, BuiltinTool, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::client::{ChatModel, GenerateRequest, LlmMetrics, LlmResponse};
use crate::retry::with_retry;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

/// Builds the `{"google_search": {}}` style declaration for a built-in tool.
fn tool_declaration(tool: BuiltinTool) -> Value {
    let mut declaration = Map::new();
    declaration.insert(tool.name().to_string(), Value::Object(Map::new()));
    Value::Object(declaration)
}

fn build_request(request: &GenerateRequest) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: &request.prompt }],
        }],
        system_instruction: request.system_instruction.as_deref().map(|text| Content {
            role: None,
            parts: vec![Part { text }],
        }),
        tools: request.tools.iter().copied().map(tool_declaration).collect(),
    }
}

/// Extracts text and metrics from a generateContent response.
fn extract_response(response: GenerateContentResponse, elapsed_ms: u64) -> Result<LlmResponse, AgentError> {
    let (input_tokens, output_tokens) = response
        .usage_metadata
        .map(|u| (u.prompt_token_count.unwrap_or(0), u.candidates_token_count.unwrap_or(0)))
        .unwrap_or((0, 0));

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked: {}", r))
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(AgentError::EmptyResponse(reason));
    };

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();

    if texts.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(AgentError::EmptyResponse(format!("finish reason {}", reason)));
    }

    let content = texts.concat();
    info!(
        "LLM: {}ms, tokens: {}/{} (in/out)",
        elapsed_ms, input_tokens, output_tokens
    );

    Ok(LlmResponse {
        content,
        metrics: LlmMetrics { input_tokens, output_tokens, elapsed_ms },
    })
}

fn transport_err(err: reqwest::Error) -> AgentError {
    match err.is_timeout() {
        true => AgentError::Timeout(err.to_string()),
        false => AgentError::Http(err.to_string()),
    }
}

/// Client for Google's Gemini API.
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// Creates a client with the default endpoint and retry policy.
    pub fn new(model: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a client for `model` using endpoint, key, timeout and retry
    /// policy from the settings.
    ///
    /// A missing key yields a client with an empty key; callers are expected
    /// to check [`Settings::require_api_key`] before sending anything.
    pub fn from_settings(settings: &Settings, model: &str) -> Result<Self, AgentError> {
        let api_key = settings.api_key.as_ref().map(|k| k.expose()).unwrap_or_default();
        let client = Self::new(model, api_key)
            .with_api_base(&settings.api_base)
            .with_retry(settings.retry.clone());

        match settings.http_timeout {
            Some(timeout) => client.with_timeout(timeout),
            None => Ok(client),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Rebuilds the HTTP client with a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AgentError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Http(e.to_string()))?;
        Ok(self)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }

    async fn send_once(
        &self,
        body: &GenerateContentRequest<'_>,
        attempt: u32,
    ) -> Result<GenerateContentResponse, AgentError> {
        debug!("Gemini request to {} (attempt {})", self.model, attempt);

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<LlmResponse, AgentError> {
        let start = Instant::now();
        let body = build_request(request);

        let response = with_retry(&self.retry, |attempt| self.send_once(&body, attempt)).await?;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        extract_response(response, elapsed_ms)
    }
}
