//! Anthropic Messages API 생성기
//!
//! ref: https://docs.anthropic.com/en/api/messages

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{non_empty, AnswerGenerator, GenerationParams, Prompt};
use crate::error::{RagError, Result};

/// Messages API 엔드포인트
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// API 버전 헤더 값
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic 생성기
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RagError::Generation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: ANTHROPIC_API_URL.to_string(),
        })
    }

    /// 엔드포인트 변경 (프록시/테스트용)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

fn build_request<'a>(prompt: &'a Prompt, params: &'a GenerationParams) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &params.model,
        max_tokens: params.max_tokens,
        system: &prompt.system,
        messages: vec![Message {
            role: "user",
            content: &prompt.user,
        }],
        temperature: params.temperature,
    }
}

/// 응답의 text 블록을 이어붙임
fn collect_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl AnswerGenerator for AnthropicGenerator {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        let request = build_request(prompt, params);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to send Anthropic request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to read Anthropic response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(RagError::Generation(format!(
                    "Anthropic API error ({}): {}",
                    error.error.kind, error.error.message
                )));
            }
            return Err(RagError::Generation(format!(
                "Anthropic API error ({}): {}",
                status, body
            )));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Generation(format!("Failed to parse Anthropic response: {}", e)))?;

        tracing::debug!(model = %params.model, "Anthropic answer received");
        non_empty(collect_text(parsed))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
