//! pdf-chat - PDF 문서 기반 RAG 채팅 도구
//!
//! PDF를 페이지 단위로 읽어 겹치는 청크로 나누고, 임베딩하여 벡터 인덱스
//! (Qdrant / LanceDB / In-Memory)에 저장한 뒤, 질문마다 유사 청크를 검색해
//! LLM(Anthropic / Gemini)에 컨텍스트로 전달합니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;

// Re-exports
pub use chat::{
    assemble_context, format_sources, Answer, ChatMessage, ChatSettings, IngestReport,
    Orchestrator, Role, SessionState, SessionStatus,
};
pub use config::Config;
pub use embedding::{EmbeddingProvider, GeminiEmbedding};
pub use error::{RagError, Result};
pub use extractor::{Document, DocumentLoader, PageUnit, PdfLoader};
pub use generation::{AnswerGenerator, GenerationParams, Prompt};
pub use knowledge::{
    list_collections, Chunk, ChunkConfig, Chunker, Collection, InMemoryVectorStore, LanceVectorStore, QdrantStore,
    RetrievedChunk, SlidingWindowChunker, VectorIndex, VectorStore,
};
