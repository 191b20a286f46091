//! Single-shot model call without instruction or tools.

use std::sync::Arc;

use askgem_core::{AgentError, Answer, Question};
use askgem_llm::{ChatModel, GenerateRequest};
use async_trait::async_trait;
use tracing::{error, info};

use crate::{preview, Responder};

/// Passes the question straight to the model.
pub struct DirectResponder {
    model: Arc<dyn ChatModel>,
}

impl DirectResponder {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Responder for DirectResponder {
    fn name(&self) -> &str {
        self.model.model()
    }

    async fn respond(&self, question: &Question) -> Result<Answer, AgentError> {
        info!("Processing question: {}", preview(question.as_str(), 100));

        let request = GenerateRequest::new(question.as_str());
        match self.model.generate(&request).await {
            Ok(response) => {
                info!("Got response: {}...", preview(&response.content, 100));
                Ok(Answer::from(response.content))
            }
            Err(e) => {
                error!("Direct call to {} failed: {} ({:?})", self.model.model(), e, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[tokio::test]
    async fn sends_bare_prompt() {
        let model = Arc::new(ScriptedModel::replying("Hola"));
        let responder = DirectResponder::new(model.clone());

        let answer = responder.respond(&Question::new(" Hello ").unwrap()).await.unwrap();
        assert_eq!(answer.as_str(), "Hola");

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "Hello");
        assert!(requests[0].system_instruction.is_none());
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn propagates_errors() {
        let responder = DirectResponder::new(Arc::new(ScriptedModel::failing_with(400)));
        let err = responder.respond(&Question::new("x").unwrap()).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }
}
