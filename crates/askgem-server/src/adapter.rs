//! Host-independent request handling for the ask endpoints.
//!
//! A request is admitted (method and API key), validated (body and
//! question), then invoked (one responder call). Each phase can end the
//! request with an error response; `OPTIONS` skips all of them.

use std::fmt;
use std::sync::Arc;

use askgem_agent::Responder;
use askgem_config::Settings;
use askgem_core::Question;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::envelope::{AskResponse, HttpRequestEnvelope, HttpResponseEnvelope, RequestBody};
use crate::error::AskError;

/// Which endpoint a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// `/api/ask`, answered by the agent.
    Agent,
    /// `/api/index`, answered by a direct model call.
    Direct,
}

impl Variant {
    pub fn route(&self) -> &'static str {
        match self {
            Variant::Agent => "/api/ask",
            Variant::Direct => "/api/index",
        }
    }
}

/// Where a failed request stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Admission,
    Validation,
    Invocation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Admission => "admission",
            Phase::Validation => "validation",
            Phase::Invocation => "invocation",
        };
        f.write_str(name)
    }
}

type Failure = (Phase, AskError);

/// Turns request envelopes into response envelopes for one variant.
#[derive(Clone)]
pub struct AskHandler {
    variant: Variant,
    settings: Arc<Settings>,
    responder: Arc<dyn Responder>,
}

impl AskHandler {
    pub fn new(variant: Variant, settings: Arc<Settings>, responder: Arc<dyn Responder>) -> Self {
        Self { variant, settings, responder }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Handles one request. Never fails; errors become error envelopes.
    pub async fn handle(&self, request: HttpRequestEnvelope) -> HttpResponseEnvelope {
        if request.is_preflight() {
            debug!("Preflight on {}", self.variant.route());
            return HttpResponseEnvelope::empty(200);
        }

        match self.process(request).await {
            Ok(reply) => HttpResponseEnvelope::json(200, &reply),
            Err(failure) => self.fail(failure),
        }
    }

    /// Handles a raw serverless event such as
    /// `{"httpMethod": "POST", "headers": {...}, "body": "..."}`.
    pub async fn handle_event(&self, raw: &str) -> HttpResponseEnvelope {
        match HttpRequestEnvelope::from_event(raw) {
            Ok(request) => self.handle(request).await,
            Err(e) => self.fail((Phase::Admission, AskError::InvalidBody(format!("invalid event: {}", e)))),
        }
    }

    /// Answers a request whose body the host could not read, e.g. because
    /// it exceeded the size limit. Preflight, method and key checks still
    /// come first.
    pub fn reject_body(&self, method: &str, status: u16, reason: String) -> HttpResponseEnvelope {
        let request = HttpRequestEnvelope::new(method, None);
        if request.is_preflight() {
            return HttpResponseEnvelope::empty(200);
        }

        let failure = match self.admit(&request) {
            Ok(()) => (Phase::Validation, AskError::BodyRejected { status, reason }),
            Err(failure) => failure,
        };
        self.fail(failure)
    }

    fn fail(&self, (phase, e): Failure) -> HttpResponseEnvelope {
        match &e {
            AskError::Configuration(_) | AskError::Upstream(_) => {
                error!("{} failed during {}: {} ({:?})", self.variant.route(), phase, e, e)
            }
            _ => warn!("{} rejected during {}: {}", self.variant.route(), phase, e),
        }
        e.into_envelope()
    }

    fn admit(&self, request: &HttpRequestEnvelope) -> Result<(), Failure> {
        if !request.is_method("POST") {
            return Err((Phase::Admission, AskError::MethodNotAllowed(request.method().to_string())));
        }

        self.settings
            .require_api_key()
            .map_err(|e| (Phase::Admission, AskError::from(e)))?;
        Ok(())
    }

    async fn process(&self, request: HttpRequestEnvelope) -> Result<AskResponse, Failure> {
        self.admit(&request)?;

        let question = extract_question(request.body.as_ref()).map_err(|e| (Phase::Validation, e))?;
        debug!("Question accepted ({} chars)", question.as_str().len());

        info!("{} invoking {}", self.variant.route(), self.responder.name());
        let answer = self
            .responder
            .respond(&question)
            .await
            .map_err(|e| (Phase::Invocation, AskError::from(e)))?;

        Ok(AskResponse {
            response: answer.into_inner(),
            question: question.into_inner(),
        })
    }
}

/// Pulls a trimmed, non-empty question out of a request body.
///
/// A missing body is treated as `{}`.
pub fn extract_question(body: Option<&RequestBody>) -> Result<Question, AskError> {
    let value = match body {
        Some(body) => body
            .to_json()
            .map_err(|e| AskError::InvalidBody(format!("invalid JSON: {}", e)))?,
        None => Value::Object(Default::default()),
    };

    let Value::Object(fields) = value else {
        return Err(AskError::InvalidBody(format!(
            "expected a JSON object, got {}",
            json_type(&value)
        )));
    };

    match fields.get("question") {
        None | Some(Value::Null) => Err(AskError::MissingQuestion),
        Some(Value::String(raw)) => Question::new(raw).map_err(|_| AskError::MissingQuestion),
        Some(other) => Err(AskError::InvalidBody(format!(
            "'question' must be a string, got {}",
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use askgem_core::{AgentError, Answer};
    use async_trait::async_trait;
    use serde_json::json;

    use crate::envelope::{ErrorBody, CORS_HEADERS};

    /// Echoes the question back and counts calls.
    #[derive(Default)]
    struct CountingResponder {
        calls: AtomicUsize,
        fail: Option<u16>,
    }

    impl CountingResponder {
        fn failing(status: u16) -> Self {
            Self { calls: AtomicUsize::new(0), fail: Some(status) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Responder for CountingResponder {
        fn name(&self) -> &str {
            "counting"
        }

        async fn respond(&self, question: &Question) -> Result<Answer, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail {
                Some(status) => Err(AgentError::Api { status, body: "upstream down".into() }),
                None => Ok(Answer::from(format!("echo: {}", question))),
            }
        }
    }

    fn handler(responder: Arc<CountingResponder>) -> AskHandler {
        let settings = Arc::new(Settings::default().with_api_key("AIzaTestKey1234567890"));
        AskHandler::new(Variant::Agent, settings, responder)
    }

    fn post(body: Value) -> HttpRequestEnvelope {
        HttpRequestEnvelope::new("POST", Some(RequestBody::from(body)))
    }

    fn error_body(envelope: &HttpResponseEnvelope) -> ErrorBody {
        serde_json::from_str(&envelope.body).unwrap()
    }

    fn assert_cors(envelope: &HttpResponseEnvelope) {
        for (name, value) in CORS_HEADERS {
            assert_eq!(envelope.header(name), Some(value), "header {}", name);
        }
    }

    #[tokio::test]
    async fn answers_valid_question_once() {
        let responder = Arc::new(CountingResponder::default());
        let response = handler(responder.clone()).handle(post(json!({ "question": "Hello" }))).await;

        assert_eq!(response.status_code, 200);
        assert_cors(&response);
        let body: AskResponse = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body.question, "Hello");
        assert_eq!(body.response, "echo: Hello");
        assert_eq!(responder.calls(), 1);
    }

    #[tokio::test]
    async fn trims_question_from_string_body() {
        let responder = Arc::new(CountingResponder::default());
        let request = HttpRequestEnvelope::new(
            "POST",
            Some(RequestBody::Text(r#"{"question": "  What is ADK?  "}"#.into())),
        );

        let response = handler(responder.clone()).handle(request).await;
        let body: AskResponse = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body.question, "What is ADK?");
        assert_eq!(responder.calls(), 1);
    }

    #[tokio::test]
    async fn missing_or_blank_question_is_400() {
        let bodies = [
            Some(RequestBody::from(json!({}))),
            Some(RequestBody::from(json!({ "question": "" }))),
            Some(RequestBody::from(json!({ "question": "   " }))),
            Some(RequestBody::from(json!({ "question": null }))),
            Some(RequestBody::Text(String::new())),
            None,
        ];

        let responder = Arc::new(CountingResponder::default());
        let handler = handler(responder.clone());
        for body in bodies {
            let response = handler.handle(HttpRequestEnvelope::new("POST", body)).await;
            assert_eq!(response.status_code, 400);
            assert_cors(&response);
            let body = error_body(&response);
            assert_eq!(body.error, "Question is required");
            assert_eq!(body.message, "Please provide a 'question' field in the request body");
        }
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_bodies_are_400_invalid_body() {
        let bodies = [
            RequestBody::Text("{not json".into()),
            RequestBody::from(json!(["question"])),
            RequestBody::from(json!({ "question": 42 })),
        ];

        let responder = Arc::new(CountingResponder::default());
        let handler = handler(responder.clone());
        for body in bodies {
            let response = handler.handle(HttpRequestEnvelope::new("POST", Some(body))).await;
            assert_eq!(response.status_code, 400);
            let body = error_body(&response);
            assert_eq!(body.error, "Invalid request body");
            assert!(!body.message.is_empty());
        }
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn options_short_circuits_regardless_of_body() {
        let responder = Arc::new(CountingResponder::default());
        let request = HttpRequestEnvelope::new("OPTIONS", Some(RequestBody::Text("{garbage".into())));

        let response = handler(responder.clone()).handle(request).await;
        assert_eq!(response.status_code, 200);
        assert!(response.body.is_empty());
        assert_cors(&response);
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn missing_key_rejects_every_post_without_calling() {
        let responder = Arc::new(CountingResponder::default());
        let handler = AskHandler::new(Variant::Direct, Arc::new(Settings::default()), responder.clone());

        for body in [json!({ "question": "Hello" }), json!({})] {
            let response = handler.handle(post(body)).await;
            assert_eq!(response.status_code, 500);
            assert_cors(&response);
            let body = error_body(&response);
            assert_eq!(body.error, "Configuration error");
            assert!(body.message.contains("API Key"));
        }
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn responder_failure_is_500_with_error_text() {
        let responder = Arc::new(CountingResponder::failing(503));
        let response = handler(responder.clone()).handle(post(json!({ "question": "Hi" }))).await;

        assert_eq!(response.status_code, 500);
        assert_cors(&response);
        let body = error_body(&response);
        assert_eq!(body.error, "Internal server error");
        assert_eq!(
            body.message,
            AgentError::Api { status: 503, body: "upstream down".into() }.to_string()
        );
        assert_eq!(responder.calls(), 1);
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        let responder = Arc::new(CountingResponder::default());
        let response = handler(responder.clone())
            .handle(HttpRequestEnvelope::new("GET", None))
            .await;

        assert_eq!(response.status_code, 405);
        assert_cors(&response);
        assert_eq!(error_body(&response).error, "Method not allowed");
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn failures_report_the_phase_they_stopped_in() {
        let responder = Arc::new(CountingResponder::default());
        let keyed = handler(responder.clone());

        let (phase, _) = keyed.process(HttpRequestEnvelope::new("PUT", None)).await.unwrap_err();
        assert_eq!(phase, Phase::Admission);

        let (phase, err) = keyed.process(post(json!({ "question": 1 }))).await.unwrap_err();
        assert_eq!(phase, Phase::Validation);
        assert_eq!(err.label(), "Invalid request body");

        let (phase, _) = keyed.process(post(json!({}))).await.unwrap_err();
        assert_eq!(phase, Phase::Validation);

        let unkeyed = AskHandler::new(Variant::Agent, Arc::new(Settings::default()), responder.clone());
        let (phase, _) = unkeyed.process(post(json!({ "question": "Hi" }))).await.unwrap_err();
        assert_eq!(phase, Phase::Admission);

        let failing = handler(Arc::new(CountingResponder::failing(500)));
        let (phase, _) = failing.process(post(json!({ "question": "Hi" }))).await.unwrap_err();
        assert_eq!(phase, Phase::Invocation);

        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn serverless_events_with_either_method_key() {
        let responder = Arc::new(CountingResponder::default());
        let handler = handler(responder.clone());

        let preflight = handler
            .handle_event(r#"{"httpMethod": "OPTIONS", "method": "OPTIONS", "body": ""}"#)
            .await;
        assert_eq!(preflight.status_code, 200);
        assert!(preflight.body.is_empty());
        assert_cors(&preflight);

        let answered = handler
            .handle_event(r#"{"httpMethod": "POST", "body": "{\"question\": \"Hello\"}"}"#)
            .await;
        assert_eq!(answered.status_code, 200);
        let body: AskResponse = serde_json::from_str(&answered.body).unwrap();
        assert_eq!(body.question, "Hello");

        let answered = handler.handle_event(r#"{"method": "POST", "body": {"question": "Hi"}}"#).await;
        assert_eq!(answered.status_code, 200);

        let broken = handler.handle_event("not an event").await;
        assert_eq!(broken.status_code, 400);
        assert_cors(&broken);
        assert_eq!(error_body(&broken).error, "Invalid request body");

        assert_eq!(responder.calls(), 2);
    }

    #[test]
    fn rejected_bodies_keep_cors_and_check_order() {
        let responder = Arc::new(CountingResponder::default());
        let keyed = handler(responder.clone());

        let too_large = keyed.reject_body("POST", 413, "length limit exceeded".into());
        assert_eq!(too_large.status_code, 413);
        assert_cors(&too_large);
        let body = error_body(&too_large);
        assert_eq!(body.error, "Payload too large");
        assert_eq!(body.message, "length limit exceeded");

        assert_eq!(keyed.reject_body("OPTIONS", 413, "x".into()).status_code, 200);
        assert_eq!(keyed.reject_body("GET", 413, "x".into()).status_code, 405);

        let unkeyed = AskHandler::new(Variant::Direct, Arc::new(Settings::default()), responder.clone());
        let response = unkeyed.reject_body("POST", 413, "x".into());
        assert_eq!(response.status_code, 500);
        assert_eq!(error_body(&response).error, "Configuration error");

        assert_eq!(responder.calls(), 0);
    }

    #[test]
    fn extract_question_accepts_extra_fields() {
        let body = RequestBody::from(json!({ "question": "Hi", "session": "abc" }));
        assert_eq!(extract_question(Some(&body)).unwrap().as_str(), "Hi");
    }
}
