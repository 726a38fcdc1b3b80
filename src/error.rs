//! 에러 타입
//!
//! PDF 로드, 임베딩, 벡터 인덱스, 답변 생성 단계별 실패를 구분합니다.
//! 모든 외부 서비스 에러는 재시도 없이 호출자에게 그대로 전달됩니다.

use std::path::PathBuf;

use thiserror::Error;

/// RAG 작업 중 발생하는 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// PDF 파일이 없거나 읽을 수 없거나 올바른 PDF가 아님
    #[error("Failed to load PDF {path:?}: {message}")]
    Load { path: PathBuf, message: String },

    /// 임베딩 서비스 호출 실패 (네트워크, 인증, rate limit 등)
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// 존재하지 않는 컬렉션
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// 컬렉션 생성/쓰기 실패
    #[error("Vector index write failed ({collection}): {message}")]
    VectorIndexWrite { collection: String, message: String },

    /// 유사도 검색/컬렉션 조회 실패
    #[error("Vector index read failed ({collection}): {message}")]
    VectorIndexRead { collection: String, message: String },

    /// LLM 답변 생성 실패
    #[error("Generation error: {0}")]
    Generation(String),

    /// 컬렉션이 연결되지 않은 상태에서 질문
    #[error("No collection attached. Index a PDF or load a collection first")]
    NotIndexed,

    /// 설정 값 검증 실패
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub(crate) fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn write(collection: &str, message: impl ToString) -> Self {
        Self::VectorIndexWrite {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn read(collection: &str, message: impl ToString) -> Self {
        Self::VectorIndexRead {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }
}

/// RAG 작업 결과 타입
pub type Result<T> = std::result::Result<T, RagError>;
