//! 설정 모듈
//!
//! 환경변수(.env 포함)에서 외부 서비스 주소, 자격 증명, 청킹/검색/생성 파라미터를
//! 읽어옵니다. 코어 로직에는 하드코딩된 값이 없고 모두 여기서 주입됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! dotenvy::dotenv().ok();
//! let config = Config::from_env()?;
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::chat::ChatSettings;
use crate::error::{RagError, Result};
use crate::knowledge::{ChunkConfig, PageBoundary};

/// 기본 Qdrant 주소 (로컬 gRPC)
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION: &str = "nodejs_docs";

/// 기본 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// 기본 임베딩 차원 (text-embedding-004)
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// 기본 Anthropic 모델
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// 기본 Gemini 생성 모델
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.pdf-chat/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pdf-chat")
}

// ============================================================================
// Types
// ============================================================================

/// 벡터 인덱스 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// 원격 Qdrant 서비스 (gRPC)
    Qdrant,
    /// 로컬 LanceDB 디렉토리
    Lance,
    /// 프로세스 내 메모리 (세션 종료 시 사라짐)
    Memory,
}

impl FromStr for VectorBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "lance" | "lancedb" => Ok(Self::Lance),
            "memory" | "inmemory" => Ok(Self::Memory),
            other => Err(RagError::Config(format!(
                "Unknown vector backend '{}'. Use qdrant, lance or memory",
                other
            ))),
        }
    }
}

/// LLM 프로바이더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    Gemini,
}

impl LlmProvider {
    /// 프로바이더별 기본 모델
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Self::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }
}

impl FromStr for LlmProvider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(RagError::Config(format!(
                "Unknown LLM provider '{}'. Use anthropic or gemini",
                other
            ))),
        }
    }
}

/// Qdrant 접속 설정
#[derive(Debug, Clone, Serialize)]
pub struct QdrantConfig {
    pub url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// 임베딩 서비스 설정
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
}

/// LLM 서비스 설정
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
}

/// 전체 설정
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub backend: VectorBackend,
    pub qdrant: QdrantConfig,
    pub lance_path: PathBuf,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(skip)]
    pub chunk: ChunkConfig,
    #[serde(skip)]
    pub chat: ChatSettings,
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// 환경변수에서 설정 로드
    ///
    /// `.env` 로드는 호출자(main)가 먼저 수행합니다.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키-값 조회 함수로 설정 로드
    ///
    /// 빈 문자열은 미설정으로 취급합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("VECTOR_BACKEND") {
            Some(v) => v.parse()?,
            None => VectorBackend::Qdrant,
        };

        let qdrant = QdrantConfig {
            url: get("QDRANT_URL").unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            api_key: get("QDRANT_API_KEY"),
        };

        let lance_path = get("LANCE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| get_data_dir().join("vectors.lance"));

        // 우선순위: GEMINI_API_KEY > GOOGLE_API_KEY > GOOGLE_AI_API_KEY
        let embedding = EmbeddingConfig {
            api_key: get("GEMINI_API_KEY")
                .or_else(|| get("GOOGLE_API_KEY"))
                .or_else(|| get("GOOGLE_AI_API_KEY")),
            model: get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            dimension: parse_or(&get, "EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
        };

        let provider = match get("LLM_PROVIDER") {
            Some(v) => v.parse()?,
            None => LlmProvider::Anthropic,
        };
        let llm_key = match provider {
            LlmProvider::Anthropic => get("ANTHROPIC_API_KEY"),
            LlmProvider::Gemini => embedding.api_key.clone(),
        };
        let llm = LlmConfig {
            provider,
            api_key: llm_key,
            model: get("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
        };

        let chunk = ChunkConfig {
            max_chunk_length: parse_or(&get, "CHUNK_SIZE", 1000)?,
            overlap_length: parse_or(&get, "CHUNK_OVERLAP", 400)?,
            page_boundary: match get("CHUNK_PAGE_BOUNDARY") {
                Some(v) => v.parse()?,
                None => PageBoundary::PerPage,
            },
        };

        let chat = ChatSettings {
            top_k: parse_or(&get, "SEARCH_K", 3)?,
            temperature: parse_or(&get, "TEMPERATURE", 0.7)?,
            max_tokens: parse_or(&get, "MAX_TOKENS", 2000)?,
        };

        let config = Self {
            backend,
            qdrant,
            lance_path,
            embedding,
            llm,
            chunk,
            chat,
        };
        config.validate()?;

        tracing::debug!(
            backend = ?config.backend,
            embedding_model = %config.embedding.model,
            llm_model = %config.llm.model,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        self.chunk.validate()?;
        self.chat.validate()?;

        if self.embedding.dimension == 0 {
            return Err(RagError::Config(
                "EMBEDDING_DIMENSION must be greater than zero".to_string(),
            ));
        }

        if self.backend == VectorBackend::Qdrant {
            url::Url::parse(&self.qdrant.url).map_err(|e| {
                RagError::Config(format!("Invalid QDRANT_URL '{}': {}", self.qdrant.url, e))
            })?;
        }

        Ok(())
    }

    /// 임베딩 API 키 (없으면 설정 에러)
    pub fn embedding_api_key(&self) -> Result<&str> {
        self.embedding.api_key.as_deref().ok_or_else(|| {
            RagError::Config(
                "Embedding API key not found. Set GEMINI_API_KEY or GOOGLE_API_KEY.\n\
                 Get your API key at: https://aistudio.google.com/app/apikey"
                    .to_string(),
            )
        })
    }

    /// LLM API 키 (없으면 설정 에러)
    pub fn llm_api_key(&self) -> Result<&str> {
        self.llm.api_key.as_deref().ok_or_else(|| {
            let var = match self.llm.provider {
                LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
                LlmProvider::Gemini => "GEMINI_API_KEY",
            };
            RagError::Config(format!("LLM API key not found. Set {}", var))
        })
    }
}

/// 값이 있으면 파싱, 없으면 기본값
fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| RagError::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

// ============================================================================
// Tests
// ============================================================================
