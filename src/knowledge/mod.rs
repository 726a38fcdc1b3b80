//! Knowledge 모듈 - 청킹과 벡터 인덱스
//!
//! - Chunker: 페이지 텍스트를 겹치는 고정 길이 청크로 분할
//! - VectorStore: Qdrant(gRPC) / LanceDB(로컬) / In-Memory 백엔드
//! - VectorIndex: 임베딩 + 저장소를 묶은 컬렉션 단위 인덱스

mod chunker;
mod index;
mod lance;
mod memory;
mod qdrant;
mod vector;

use std::sync::Arc;

use crate::config::{Config, VectorBackend};
use crate::error::Result;

// Re-exports
pub use chunker::{Chunk, ChunkConfig, Chunker, PageBoundary, SlidingWindowChunker};
pub use index::{
    collection_name_for, list_collections, Collection, RetrievedChunk, VectorIndex,
    COLLECTION_PREFIX,
};
pub use lance::LanceVectorStore;
pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use vector::{cosine_similarity, sort_by_score, ScoredRecord, VectorRecord, VectorStore};

/// 설정된 백엔드의 벡터 저장소 열기
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend {
        VectorBackend::Qdrant => Arc::new(QdrantStore::new(
            &config.qdrant.url,
            config.qdrant.api_key.clone(),
        )?),
        VectorBackend::Lance => Arc::new(LanceVectorStore::open(&config.lance_path).await?),
        VectorBackend::Memory => Arc::new(InMemoryVectorStore::new()),
    };

    tracing::info!(backend = store.backend(), "Vector store ready");
    Ok(store)
}
