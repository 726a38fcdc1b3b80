//! Gemini generateContent 생성기
//!
//! 시스템 지시문은 `systemInstruction` 필드로 전달합니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{non_empty, AnswerGenerator, GenerationParams, Prompt};
use crate::embedding::{GeminiError, GEMINI_API_BASE};
use crate::error::{RagError, Result};

/// Gemini 생성기
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RagError::Generation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

fn build_request<'a>(prompt: &'a Prompt, params: &GenerationParams) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: &prompt.system,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: &prompt.user }],
        }],
        generation_config: GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
        },
    }
}

/// 첫 후보의 텍스트 파트를 이어붙임
fn first_candidate_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default()
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        let request = build_request(prompt, params);

        let response = self
            .client
            .post(self.endpoint(&params.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to send Gemini request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to read Gemini response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                return Err(RagError::Generation(format!(
                    "Gemini API error ({}): {}",
                    error.error.status, error.error.message
                )));
            }
            return Err(RagError::Generation(format!("Gemini API error ({}): {}", status, body)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Generation(format!("Failed to parse Gemini response: {}", e)))?;

        tracing::debug!(model = %params.model, "Gemini answer received");
        non_empty(first_candidate_text(parsed))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
