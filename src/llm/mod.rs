//! Model invocation seam.
//!
//! The language-model call is an opaque capability behind the `ModelClient`
//! trait: given a prompt and tuning parameters, produce text plus optional
//! token usage. It may fail or stall; failures surface as
//! `HubError::Invocation` and are never retried by this crate.
//! `HttpModelClient` is the production implementation, speaking the
//! OpenAI-compatible chat completions shape.

mod http;

pub use http::HttpModelClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Token usage reported by a model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One fully-resolved model invocation request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The model's answer to a `ChatRequest`.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Opaque model invocation capability.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one request to completion. May block on external I/O.
    async fn complete(&self, request: ChatRequest) -> Result<ModelReply, HubError>;
}
