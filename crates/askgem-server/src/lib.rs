//! HTTP surface for askgem.
//!
//! Two endpoints share one request contract:
//!
//! | Route        | Answered by                                   |
//! |--------------|-----------------------------------------------|
//! | `/api/ask`   | [`Agent`] with instruction and Google Search  |
//! | `/api/index` | [`DirectResponder`], single model call        |
//!
//! Both accept `POST {"question": "..."}` and reply with
//! `{"response": "...", "question": "..."}`. `OPTIONS` is a CORS preflight.
//! The contract itself lives in [`adapter::AskHandler`], which works on
//! host-independent [`envelope`] types; the axum handlers only translate.
//!
//! [`Agent`]: askgem_agent::Agent
//! [`DirectResponder`]: askgem_agent::DirectResponder

pub mod adapter;
pub mod envelope;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use askgem_agent::{Agent, DirectResponder, Responder};
use askgem_config::Settings;
use askgem_core::AgentError;
use askgem_llm::GeminiClient;
use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::Router;

use crate::adapter::{AskHandler, Variant};

/// Largest request body the routes will buffer.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared, read-only server state.
pub struct AppState {
    pub ask: AskHandler,
    pub index: AskHandler,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, agent: Arc<dyn Responder>, direct: Arc<dyn Responder>) -> Self {
        Self {
            ask: AskHandler::new(Variant::Agent, settings.clone(), agent),
            index: AskHandler::new(Variant::Direct, settings, direct),
        }
    }

    /// Wires Gemini clients for both endpoints from the settings.
    pub fn from_settings(settings: Settings) -> Result<Self, AgentError> {
        let agent_model = Arc::new(GeminiClient::from_settings(&settings, &settings.agent_model)?);
        let direct_model = Arc::new(GeminiClient::from_settings(&settings, &settings.direct_model)?);

        Ok(Self::new(
            Arc::new(settings),
            Arc::new(Agent::helpful_assistant(agent_model)),
            Arc::new(DirectResponder::new(direct_model)),
        ))
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(Variant::Agent.route(), any(handlers::ask))
        .route(Variant::Direct.route(), any(handlers::index))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use askgem_core::{Answer, Question};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BODY_LIMIT: usize = 64 * 1024;

    struct FixedResponder {
        answer: &'static str,
        calls: AtomicUsize,
    }

    impl FixedResponder {
        fn new(answer: &'static str) -> Arc<Self> {
            Arc::new(Self { answer, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Responder for FixedResponder {
        fn name(&self) -> &str {
            self.answer
        }

        async fn respond(&self, _question: &Question) -> Result<Answer, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Answer::from(self.answer))
        }
    }

    fn app(settings: Settings, agent: Arc<FixedResponder>, direct: Arc<FixedResponder>) -> Router {
        router(Arc::new(AppState::new(Arc::new(settings), agent, direct)))
    }

    fn keyed() -> Settings {
        Settings::default().with_api_key("AIzaRouterTest")
    }

    async fn call(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn routes_each_endpoint_to_its_responder() {
        let agent = FixedResponder::new("from agent");
        let direct = FixedResponder::new("from direct");

        let (status, headers, body) = call(
            app(keyed(), agent.clone(), direct.clone()),
            "POST",
            "/api/ask",
            r#"{"question": "Hello"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["access-control-allow-origin"], "*");
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({ "response": "from agent", "question": "Hello" }));

        let (status, _, body) = call(
            app(keyed(), agent.clone(), direct.clone()),
            "POST",
            "/api/index",
            r#"{"question": "Hello"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["response"], "from direct");

        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
        assert_eq!(direct.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn preflight_returns_cors_headers() {
        let agent = FixedResponder::new("a");
        let (status, headers, body) =
            call(app(keyed(), agent.clone(), FixedResponder::new("d")), "OPTIONS", "/api/ask", "").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_post_body_is_missing_question() {
        let (status, headers, body) =
            call(app(keyed(), FixedResponder::new("a"), FixedResponder::new("d")), "POST", "/api/index", "").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["error"], "Question is required");
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error() {
        let direct = FixedResponder::new("d");
        let (status, _, body) = call(
            app(Settings::default(), FixedResponder::new("a"), direct.clone()),
            "POST",
            "/api/index",
            r#"{"question": "Hello"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Configuration error");
        assert!(body["message"].as_str().unwrap().contains("API Key"));
        assert_eq!(direct.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_is_method_not_allowed_with_cors() {
        let (status, headers, _) =
            call(app(keyed(), FixedResponder::new("a"), FixedResponder::new("d")), "GET", "/api/ask", "").await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn oversized_body_keeps_cors_headers() {
        let agent = FixedResponder::new("a");
        let body = format!(r#"{{"question": "{}"}}"#, "a".repeat(MAX_BODY_BYTES + 1024));
        let (status, headers, body) =
            call(app(keyed(), agent.clone(), FixedResponder::new("d")), "POST", "/api/ask", &body).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
        assert_eq!(headers["content-type"], "application/json");
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Payload too large");
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, _, body) =
            call(app(keyed(), FixedResponder::new("a"), FixedResponder::new("d")), "GET", "/health", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
