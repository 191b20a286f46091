//! Model client for the Gemini `generateContent` API.
//!
//! - [`ChatModel`] — The seam the agent and the HTTP handlers call through
//! - [`GeminiClient`] — `reqwest`-based implementation that honors a [`RetryPolicy`]
//! - [`with_retry`] — The backoff loop, usable with any fallible async operation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use askgem_core::BuiltinTool;
//! use askgem_llm::{ChatModel, GeminiClient, GenerateRequest};
//!
//! let client = GeminiClient::new("gemini-2.5-flash-lite", &api_key);
//! let request = GenerateRequest::new("What's new in Rust?")
//!     .with_system_instruction("You are a helpful assistant.")
//!     .with_tools(vec![BuiltinTool::GoogleSearch]);
//!
//! let response = client.generate(&request).await?;
//! println!("{}", response.content);
//! ```
//!
//! [`RetryPolicy`]: askgem_core::RetryPolicy

mod client;
mod gemini;
mod retry;

pub use client::{ChatModel, GenerateRequest, LlmMetrics, LlmResponse};
pub use gemini::GeminiClient;
pub use retry::with_retry;
