//! Question answering on top of a [`ChatModel`].
//!
//! Two [`Responder`] implementations are provided:
//!
//! - [`Agent`] — Adds a system instruction and the Google Search tool, so the
//!   model can ground its answer on current web results
//! - [`DirectResponder`] — Sends the question to the model as-is
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use askgem_agent::Agent;
//! use askgem_core::Question;
//! use askgem_llm::GeminiClient;
//!
//! let model = Arc::new(GeminiClient::new("gemini-2.5-flash-lite", &api_key));
//! let agent = Agent::helpful_assistant(model);
//!
//! let answer = agent.ask(&Question::new("What is the Agent Developer Kit?")?).await?;
//! println!("{}", answer);
//! ```
//!
//! [`ChatModel`]: askgem_llm::ChatModel

mod agent;
mod direct;
pub mod prompts;

pub use agent::{Agent, AgentConfig};
pub use direct::DirectResponder;

use askgem_core::{AgentError, Answer, Question};
use async_trait::async_trait;

/// Something that can answer a validated question.
///
/// HTTP handlers depend on this trait rather than on a concrete model so
/// tests can substitute a double.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produces an answer. Errors are returned unchanged to the caller.
    async fn respond(&self, question: &Question) -> Result<Answer, AgentError>;
}

/// Returns at most `max` characters of `text` for log previews.
pub(crate) fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
