//! Provider-neutral request/response types and the [`ChatModel`] trait.

use askgem_core::{AgentError, BuiltinTool};
use async_trait::async_trait;

/// Token usage and timing metrics from an LLM call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

/// Complete response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub metrics: LlmMetrics,
}

/// A single-turn generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub tools: Vec<BuiltinTool>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<BuiltinTool>) -> Self {
        self.tools = tools;
        self
    }
}

/// A hosted model that turns a prompt into text.
///
/// Implementations own their transport concerns, retries included.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier used for requests.
    fn model(&self) -> &str;

    /// Sends a generation request and returns the complete response.
    async fn generate(&self, request: &GenerateRequest) -> Result<LlmResponse, AgentError>;
}
