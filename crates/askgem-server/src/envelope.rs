//! Request/response envelopes shared by every hosting surface.
//!
//! The envelopes mirror the shape of a serverless HTTP event so the same
//! [`AskHandler`](crate::adapter::AskHandler) can sit behind axum or behind a
//! function runtime that hands over `{httpMethod, headers, body}`.

use std::collections::{BTreeMap, HashMap};

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Content-Type", "application/json"),
];

/// Request body as delivered by the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum RequestBody {
    /// Raw text still to be parsed as JSON.
    Text(String),
    /// Raw bytes still to be parsed as JSON.
    Bytes(Vec<u8>),
    /// A body the host already decoded.
    Json(Value),
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => RequestBody::Text(text),
            other => RequestBody::Json(other),
        }
    }
}

impl RequestBody {
    /// Decodes the body. Blank raw bodies decode to an empty object.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            RequestBody::Text(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
            RequestBody::Text(text) => serde_json::from_str(text),
            RequestBody::Bytes(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(Value::Object(Default::default()))
            }
            RequestBody::Bytes(bytes) => serde_json::from_slice(bytes),
            RequestBody::Json(value) => Ok(value.clone()),
        }
    }
}

/// An incoming HTTP request.
///
/// Serverless hosts name the method `httpMethod`, others `method`; an event
/// may carry both. A request with neither is treated as `POST`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpRequestEnvelope {
    #[serde(rename = "httpMethod", default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<RequestBody>,
}

impl HttpRequestEnvelope {
    pub fn new(method: &str, body: Option<RequestBody>) -> Self {
        Self {
            method: Some(method.to_string()),
            body,
            ..Self::default()
        }
    }

    /// Builds an envelope from axum request parts. Non-UTF-8 header values
    /// are dropped.
    pub fn from_parts(method: &str, headers: &HeaderMap, body: Vec<u8>) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();

        Self {
            method: Some(method.to_string()),
            headers,
            body: Some(RequestBody::Bytes(body)),
            ..Self::default()
        }
    }

    /// Parses a serverless event.
    pub fn from_event(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The effective method, preferring `httpMethod`.
    pub fn method(&self) -> &str {
        self.http_method
            .as_deref()
            .or(self.method.as_deref())
            .unwrap_or("POST")
    }

    /// True when either method key names a CORS preflight.
    pub fn is_preflight(&self) -> bool {
        [&self.http_method, &self.method]
            .into_iter()
            .flatten()
            .any(|m| m.eq_ignore_ascii_case("OPTIONS"))
    }

    pub fn is_method(&self, method: &str) -> bool {
        self.method().eq_ignore_ascii_case(method)
    }
}

/// Successful answer body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
    pub question: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// An outgoing HTTP response. Always carries the CORS headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponseEnvelope {
    /// A response with no body.
    pub fn empty(status_code: u16) -> Self {
        Self {
            status_code,
            headers: cors_headers(),
            body: String::new(),
        }
    }

    /// A response with a JSON body.
    pub fn json<T: Serialize>(status_code: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self { status_code, headers: cors_headers(), body },
            Err(e) => {
                error!("Failed to serialize response body: {}", e);
                Self {
                    status_code: 500,
                    headers: cors_headers(),
                    body: r#"{"error":"Internal server error","message":"response serialization failed"}"#
                        .to_string(),
                }
            }
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn cors_headers() -> BTreeMap<String, String> {
    CORS_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl IntoResponse for HttpResponseEnvelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) else {
                error!("Dropping invalid response header {}", name);
                continue;
            };
            headers.insert(name, value);
        }

        response
    }
}
