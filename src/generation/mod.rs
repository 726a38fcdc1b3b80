//! Generation 모듈 - LLM 답변 생성
//!
//! 시스템 지시문 + 검색 컨텍스트 + 질문을 단일 턴 요청으로 LLM에 보냅니다.
//! 서버 측 대화 상태는 없으며, 매 호출이 완결된 프롬프트를 받습니다.
//!
//! - Anthropic Messages API (기본)
//! - Gemini generateContent

mod anthropic;
mod gemini;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, LlmProvider};
use crate::error::{RagError, Result};

pub use anthropic::AnthropicGenerator;
pub use gemini::GeminiGenerator;

/// 시스템 지시문
///
/// 컨텍스트 안에서만 답하고 페이지 번호를 안내하도록 지시합니다.
/// 프롬프트 규약일 뿐 사실 검증은 하지 않습니다.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI Assistant who answers user queries based on the available context
retrieved from a PDF file along with page contents and page numbers.

You should only answer the user based on the following context and navigate the user
to open the right page number to know more.
Also if there is any topic which might require a code as sample example you can give it as well.
Also if in case user asks to give me a summary of entire PDF you can do it.";

// ============================================================================
// Types
// ============================================================================

/// 생성 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// 모델 ID
    pub model: String,
    /// 0.0 ~ 1.0
    pub temperature: f32,
    /// 최대 출력 토큰
    pub max_tokens: u32,
}

impl GenerationParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be at least 1".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(RagError::Config("model must not be empty".to_string()));
        }
        Ok(())
    }
}

/// 완성된 프롬프트 (시스템 + 사용자 메시지)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// 기본 시스템 지시문으로 프롬프트 구성
    pub fn new(context: &str, question: &str) -> Self {
        Self::with_system(SYSTEM_PROMPT, context, question)
    }

    pub fn with_system(system: &str, context: &str, question: &str) -> Self {
        Self {
            system: system.to_string(),
            user: format!("Context:\n{}\n\nQuestion: {}", context, question),
        }
    }
}

// ============================================================================
// AnswerGenerator Trait
// ============================================================================

/// 답변 생성기 트레이트 (async)
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// 프롬프트로 답변 생성. 서비스 실패는 `RagError::Generation`.
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String>;

    /// 제공자 이름
    fn name(&self) -> &str;
}

/// 설정에 맞는 생성기 생성
pub fn from_config(config: &Config) -> Result<Arc<dyn AnswerGenerator>> {
    let api_key = config.llm_api_key()?;
    let generator: Arc<dyn AnswerGenerator> = match config.llm.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicGenerator::new(api_key)?),
        LlmProvider::Gemini => Arc::new(GeminiGenerator::new(api_key)?),
    };

    tracing::info!(
        provider = generator.name(),
        model = %config.llm.model,
        "Answer generator initialized"
    );
    Ok(generator)
}

/// 응답이 비어 있으면 생성 실패로 처리
fn non_empty(text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(RagError::Generation("Model returned an empty answer".to_string()));
    }
    Ok(text)
}
