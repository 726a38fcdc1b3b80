//! Vector Index - 컬렉션 단위 인덱싱/검색
//!
//! 임베딩 서비스와 벡터 저장소를 묶어 컬렉션 생성, 기존 컬렉션 연결,
//! 유사도 검색을 제공합니다.
//!
//! 재인덱싱은 추가가 아니라 교체입니다. 모든 청크를 먼저 임베딩한 뒤에만
//! 기존 컬렉션을 지우므로, 임베딩 실패 시 기존 데이터는 그대로 남습니다.

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use super::chunker::Chunk;
use super::vector::{VectorRecord, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// 업로드 파일 컬렉션 이름 접두사
pub const COLLECTION_PREFIX: &str = "pdf_docs_";

// ============================================================================
// Types
// ============================================================================

/// 연결된 컬렉션 핸들
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub record_count: usize,
}

/// 검색된 청크
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub page_number: Option<usize>,
    pub score: f32,
}

/// 파일 경로로부터 컬렉션 이름 생성 (`pdf_docs_<stem>`)
///
/// 영문/숫자/`_`/`-` 외 문자는 `_`로 바꿉니다.
pub fn collection_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();

    format!("{}{}", COLLECTION_PREFIX, sanitized)
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 임베딩 + 벡터 저장소 조합
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// 청크로 컬렉션 생성 (같은 이름이 있으면 교체)
    ///
    /// # Arguments
    /// * `name` - 컬렉션 이름
    /// * `chunks` - 저장할 청크
    /// * `source` - 원본 파일 경로 (payload 메타데이터)
    pub async fn create_from_chunks(
        &self,
        name: &str,
        chunks: &[Chunk],
        source: Option<&str>,
    ) -> Result<Collection> {
        if name.trim().is_empty() {
            return Err(RagError::Config("Collection name must not be empty".to_string()));
        }

        // 1. 임베딩 (쓰기 전에 전부 완료)
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_documents(&texts).await?
        };

        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingService(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                id: Uuid::new_v4().to_string(),
                text: chunk.text.clone(),
                page_number: chunk.page_number,
                source: source.map(str::to_string),
                embedding,
            })
            .collect();

        // 2. 기존 컬렉션 교체
        if self.store.collection_exists(name).await? {
            tracing::info!(collection = name, "Replacing existing collection");
            self.store.delete_collection(name).await?;
        }

        self.store
            .create_collection(name, self.embedder.dimension())
            .await?;

        // 3. 저장 (실패 시 부분 컬렉션 제거)
        if let Err(e) = self.store.upsert(name, &records).await {
            tracing::error!(collection = name, error = %e, "Failed to write vectors, dropping partial collection");
            if let Err(cleanup) = self.store.delete_collection(name).await {
                tracing::warn!(collection = name, error = %cleanup, "Failed to drop partial collection");
            }
            return Err(match e {
                RagError::VectorIndexWrite { .. } => e,
                other => RagError::write(name, other),
            });
        }

        tracing::info!(
            collection = name,
            records = records.len(),
            backend = self.store.backend(),
            "Collection indexed"
        );

        Ok(Collection {
            name: name.to_string(),
            record_count: records.len(),
        })
    }

    /// 기존 컬렉션 연결 (쓰기 없음)
    pub async fn load_existing(&self, name: &str) -> Result<Collection> {
        if !self.store.collection_exists(name).await? {
            return Err(RagError::CollectionNotFound(name.to_string()));
        }

        let record_count = self.store.count(name).await?;
        tracing::info!(collection = name, records = record_count, "Attached to collection");

        Ok(Collection {
            name: name.to_string(),
            record_count,
        })
    }

    /// 유사도 검색 (최대 k개, 유사도 내림차순)
    pub async fn similarity_search(
        &self,
        collection: &Collection,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(RagError::Config("k must be at least 1".to_string()));
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let records = self.store.search(&collection.name, &query_vector, k).await?;

        let mut results: Vec<RetrievedChunk> = records
            .into_iter()
            .map(|r| RetrievedChunk {
                text: r.text,
                page_number: r.page_number,
                score: r.score,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        tracing::debug!(collection = %collection.name, k, found = results.len(), "Similarity search");
        Ok(results)
    }
}

/// 저장소의 컬렉션 목록 (이름순, 레코드 수 포함)
///
/// 임베딩 서비스 없이 저장소만으로 조회합니다.
pub async fn list_collections(store: &dyn VectorStore) -> Result<Vec<Collection>> {
    let mut collections = Vec::new();
    for name in store.list_collections().await? {
        let record_count = store.count(&name).await?;
        collections.push(Collection { name, record_count });
    }
    Ok(collections)
}

// ============================================================================
// Tests
// ============================================================================
