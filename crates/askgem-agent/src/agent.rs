//! The agent facade: a model plus an instruction and a declarative tool list.

use std::sync::Arc;
use std::time::Instant;

use askgem_core::{AgentError, Answer, BuiltinTool, Question};
use askgem_llm::{ChatModel, GenerateRequest};
use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::prompts::{DEFAULT_AGENT_DESCRIPTION, DEFAULT_AGENT_INSTRUCTION, DEFAULT_AGENT_NAME};
use crate::{preview, Responder};

/// Identity, instruction and tools of an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub tools: Vec<BuiltinTool>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            description: DEFAULT_AGENT_DESCRIPTION.to_string(),
            instruction: DEFAULT_AGENT_INSTRUCTION.to_string(),
            tools: vec![BuiltinTool::GoogleSearch],
        }
    }
}

/// A configured model that answers questions, optionally grounding on web search.
///
/// Retries are the model client's job; `ask` makes exactly one `generate`
/// call and never masks its failure.
pub struct Agent {
    config: AgentConfig,
    model: Arc<dyn ChatModel>,
}

impl Agent {
    pub fn new(config: AgentConfig, model: Arc<dyn ChatModel>) -> Self {
        Self { config, model }
    }

    /// The default general-purpose assistant with Google Search enabled.
    pub fn helpful_assistant(model: Arc<dyn ChatModel>) -> Self {
        Self::new(AgentConfig::default(), model)
    }

    /// Asks the agent a question and returns its answer.
    pub async fn ask(&self, question: &Question) -> Result<Answer, AgentError> {
        info!(
            "Agent {} ({}) asking: {}",
            self.config.name,
            self.model.model(),
            preview(question.as_str(), 100)
        );
        debug!(
            "Tools: {:?}",
            self.config.tools.iter().map(|t| t.name()).collect::<Vec<_>>()
        );

        let request = GenerateRequest::new(question.as_str())
            .with_system_instruction(self.config.instruction.as_str())
            .with_tools(self.config.tools.clone());

        let start = Instant::now();
        match self.model.generate(&request).await {
            Ok(response) => {
                info!(
                    "Agent {} answered in {:?}: {} chars, tokens: {}/{}",
                    self.config.name,
                    start.elapsed(),
                    response.content.len(),
                    response.metrics.input_tokens,
                    response.metrics.output_tokens
                );
                Ok(Answer::from(response.content))
            }
            Err(e) => {
                error!(
                    "Agent {} failed to get response after {:?}: {} ({:?})",
                    self.config.name,
                    start.elapsed(),
                    e,
                    e
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Responder for Agent {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn respond(&self, question: &Question) -> Result<Answer, AgentError> {
        self.ask(question).await
    }
}
