//! In-Memory Vector Store
//!
//! 프로세스 메모리에 컬렉션을 보관하는 저장소입니다.
//! 한 세션 안에서 인덱싱 후 바로 질문하는 용도와 테스트에 사용합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::vector::{cosine_similarity, sort_by_score, ScoredRecord, VectorRecord, VectorStore};
use crate::error::{RagError, Result};

#[derive(Debug, Default)]
struct MemoryCollection {
    dimension: usize,
    records: Vec<VectorRecord>,
}

/// 메모리 벡터 저장소 (코사인 유사도, 전수 검색)
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(RagError::write(name, "collection already exists"));
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::write(name, "collection does not exist"))?;

        if let Some(bad) = records.iter().find(|r| r.embedding.len() != collection.dimension) {
            return Err(RagError::write(
                name,
                format!(
                    "vector dimension {} does not match collection dimension {}",
                    bad.embedding.len(),
                    collection.dimension
                ),
            ));
        }

        for record in records {
            match collection.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => collection.records.push(record.clone()),
            }
        }

        Ok(records.len())
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        if query.len() != collection.dimension {
            return Err(RagError::read(
                name,
                format!(
                    "query dimension {} does not match collection dimension {}",
                    query.len(),
                    collection.dimension
                ),
            ));
        }

        let mut scored: Vec<ScoredRecord> = collection
            .records
            .iter()
            .map(|r| ScoredRecord {
                text: r.text.clone(),
                page_number: Some(r.page_number),
                score: cosine_similarity(&r.embedding, query),
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self, name: &str) -> Result<usize> {
        self.collections
            .read()
            .await
            .get(name)
            .map(|c| c.records.len())
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, page: usize, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: format!("text {}", id),
            page_number: page,
            source: None,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_create_upsert_count() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("docs").await.unwrap());

        store.create_collection("docs", 2).await.unwrap();
        assert!(store.collection_exists("docs").await.unwrap());
        assert!(store.create_collection("docs", 2).await.is_err());

        let n = store
            .upsert("docs", &[record("a", 0, vec![1.0, 0.0]), record("b", 1, vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.count("docs").await.unwrap(), 2);

        // 같은 ID는 덮어쓰기
        store.upsert("docs", &[record("a", 5, vec![1.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_orders_best_first() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                &[
                    record("far", 0, vec![0.0, 1.0]),
                    record("near", 1, vec![1.0, 0.1]),
                    record("mid", 2, vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("docs", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "text near");
        assert_eq!(results[1].text, "text mid");
        assert_eq!(results[0].page_number, Some(1));
    }

    #[tokio::test]
    async fn test_search_missing_collection() {
        let store = InMemoryVectorStore::new();
        let result = store.search("nope", &[1.0], 3).await;
        assert!(matches!(result, Err(RagError::CollectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 3).await.unwrap();
        let result = store.upsert("docs", &[record("a", 0, vec![1.0])]).await;
        assert!(matches!(result, Err(RagError::VectorIndexWrite { .. })));

        let result = store.search("docs", &[1.0], 1).await;
        assert!(matches!(result, Err(RagError::VectorIndexRead { .. })));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = InMemoryVectorStore::new();
        store.create_collection("b", 1).await.unwrap();
        store.create_collection("a", 1).await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);

        assert!(store.delete_collection("a").await.unwrap());
        assert!(!store.delete_collection("a").await.unwrap());
        assert_eq!(store.list_collections().await.unwrap(), vec!["b"]);
    }
}
