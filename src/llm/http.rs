//! OpenAI-compatible chat completions client.
//!
//! Endpoint and credential are resolved through the provider catalog on
//! every call, so a rotated key or edited base URL takes effect without
//! rebuilding cached handles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatRequest, ModelClient, ModelReply, Usage};
use crate::error::HubError;
use crate::providers::ProviderCatalog;

/// Hard cap on a single model call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for any provider exposing `/chat/completions`.
pub struct HttpModelClient {
    client: Client,
    catalog: Arc<ProviderCatalog>,
}

impl HttpModelClient {
    pub fn new(catalog: Arc<ProviderCatalog>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, catalog }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, request: ChatRequest) -> Result<ModelReply, HubError> {
        let endpoint = self.catalog.endpoint(&request.provider).await?;
        let url = format!("{}/chat/completions", endpoint.base_url);

        let wire = WireRequest {
            model: &request.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                WireMessage {
                    role: "user",
                    content: &request.message,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(&wire)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(HubError::Invocation(format!(
                    "request to {} timed out: {}",
                    request.provider, e
                )))
            }
            Err(e) if e.is_connect() => {
                return Err(HubError::Invocation(format!(
                    "connection to {} failed: {}",
                    request.provider, e
                )))
            }
            Err(e) => {
                return Err(HubError::Invocation(format!(
                    "request to {} failed: {}",
                    request.provider, e
                )))
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(HubError::Invocation(format!(
                "{} returned HTTP {}: {}",
                request.provider,
                status.as_u16(),
                truncate(&body, 500)
            )));
        }

        parse_reply(&body)
    }
}

fn parse_reply(body: &str) -> Result<ModelReply, HubError> {
    let parsed: WireResponse = serde_json::from_str(body).map_err(|e| {
        HubError::Invocation(format!(
            "unparsable model response: {} (body: {})",
            e,
            truncate(body, 500)
        ))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| HubError::Invocation("no choices in model response".to_string()))?;

    Ok(ModelReply {
        text: choice.message.content.unwrap_or_default(),
        usage: parsed.usage,
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireAssistantMessage,
}

#[derive(Deserialize)]
struct WireAssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.text, "Hi there");
        assert_eq!(reply.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn missing_usage_is_none() {
        let body = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.text, "ok");
        assert!(reply.usage.is_none());
    }

    #[test]
    fn empty_choices_is_an_invocation_error() {
        let err = parse_reply(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, HubError::Invocation(_)));

        let err = parse_reply("not json").unwrap_err();
        assert!(matches!(err, HubError::Invocation(_)));
    }
}
