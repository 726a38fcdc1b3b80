//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 청크는 검색 대상 문서(RETRIEVAL_DOCUMENT)로, 질문은 검색 쿼리(RETRIEVAL_QUERY)로
//! 임베딩합니다. 문서 임베딩은 batchEmbedContents로 묶어서 호출합니다.
//!
//! 실패한 호출은 재시도하지 않고 그대로 EmbeddingService 에러로 반환합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::new(api_key, "text-embedding-004", 768)?;
//! let vectors = embedder.embed_documents(&chunks).await?;
//! let query = embedder.embed_query("What is the event loop?").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{RagError, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 고정 차원 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서(청크) 목록 임베딩. 입력 순서와 출력 순서가 같습니다.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 검색 질의 임베딩
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini API 기본 엔드포인트
/// source: https://ai.google.dev/gemini-api/docs/embeddings
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// batchEmbedContents 한 번에 보낼 수 있는 최대 요청 수
const MAX_BATCH_SIZE: usize = 100;

/// Rate Limiter 설정
const RATE_LIMIT_RPM: u32 = 150;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY_MS: u64 = 100;

/// 임베딩 작업 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration, min_delay: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay,
            last_request: None,
        }
    }

    /// 요청 가능할 때까지 대기 후 요청 기록
    async fn acquire(&mut self) {
        // 1. 최소 딜레이 적용 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();

        // 2. 윈도우 밖의 오래된 요청 제거
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. Rate limit 초과 시 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        // 4. 현재 요청 기록
        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 새 Gemini 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `model` - 임베딩 모델 (예: `text-embedding-004`)
    /// * `dimension` - 출력 차원
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "Embedding dimension must be greater than zero".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagError::EmbeddingService(format!("Failed to create HTTP client: {}", e)))?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
            Duration::from_millis(MIN_DELAY_MS),
        )));

        let model = model.into();
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();

        Ok(Self {
            api_key: api_key.into(),
            model,
            base_url: GEMINI_API_BASE.to_string(),
            client,
            dimension,
            rate_limiter,
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = Self::new(
            config.embedding_api_key()?,
            config.embedding.model.clone(),
            config.embedding.dimension,
        )?;
        tracing::info!(
            "Using Gemini embedding {} (dimension: {})",
            embedder.model,
            embedder.dimension
        );
        Ok(embedder)
    }

    /// API 엔드포인트 교체 (프록시, 테스트용)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn model_path(&self) -> String {
        format!("models/{}", self.model)
    }

    fn request_for(&self, text: &str, task_type: TaskType) -> EmbedRequest {
        EmbedRequest {
            model: self.model_path(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type,
            output_dimensionality: Some(self.dimension),
        }
    }

    /// POST 후 본문을 T로 파싱. 비정상 상태 코드는 즉시 에러.
    async fn post<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de>,
    {
        {
            let mut limiter = self.rate_limiter.lock().await;
            limiter.acquire().await;
        }

        let url = format!("{}/{}:{}", self.base_url, self.model_path(), method);

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingService(format!("Failed to send embedding request: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RagError::EmbeddingService(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&text) {
                return Err(RagError::EmbeddingService(format!(
                    "Gemini API error ({}): {}",
                    error.error.status, error.error.message
                )));
            }
            return Err(RagError::EmbeddingService(format!(
                "Gemini API error ({}): {}",
                status, text
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            RagError::EmbeddingService(format!("Failed to parse embedding response: {}", e))
        })
    }

    fn check_dimension(&self, values: &[f32]) -> Result<()> {
        if values.len() != self.dimension {
            return Err(RagError::EmbeddingService(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                values.len()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// API Types
// ============================================================================

/// Gemini API 요청 본문
/// source: https://ai.google.dev/gemini-api/docs/embeddings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
pub(crate) struct GeminiError {
    pub(crate) error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorDetail {
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = vec![Vec::new(); texts.len()];

        // 빈 텍스트는 API가 거부하므로 0 벡터로 대체
        let mut pending = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results[i] = vec![0.0; self.dimension];
            } else {
                pending.push(i);
            }
        }

        let batches = pending.chunks(MAX_BATCH_SIZE).count();
        for (batch_no, batch) in pending.chunks(MAX_BATCH_SIZE).enumerate() {
            tracing::debug!("Embedding batch {}/{} ({} texts)", batch_no + 1, batches, batch.len());

            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|&i| self.request_for(&texts[i], TaskType::RetrievalDocument))
                    .collect(),
            };
            let response: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;

            if response.embeddings.len() != batch.len() {
                return Err(RagError::EmbeddingService(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            for (&i, embedding) in batch.iter().zip(response.embeddings) {
                self.check_dimension(&embedding.values)?;
                results[i] = embedding.values;
            }
        }

        Ok(results)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = self.request_for(text, TaskType::RetrievalQuery);
        let response: EmbedResponse = self.post("embedContent", &request).await?;
        self.check_dimension(&response.embedding.values)?;
        Ok(response.embedding.values)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
