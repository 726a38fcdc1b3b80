//! LanceDB Vector Store - 로컬 파일 기반 벡터 검색
//!
//! 컬렉션 하나가 LanceDB 테이블 하나에 대응합니다.
//! 벡터 차원은 컬렉션 생성 시 결정되며 테이블 스키마에 기록됩니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use super::vector::{sort_by_score, ScoredRecord, VectorRecord, VectorStore};
use crate::error::{RagError, Result};

const EMBEDDING_COLUMN: &str = "embedding";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// Apache Arrow 기반 columnar 저장소로, 외부 서버 없이 디렉토리 하나에 저장됩니다.
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    RagError::Config(format!("Failed to create LanceDB directory: {}", e))
                })?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| RagError::Config("Invalid LanceDB path encoding".to_string()))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .map_err(|e| RagError::Config(format!("Failed to connect to LanceDB: {}", e)))?;

        tracing::debug!(path = %path.display(), "Opened LanceDB");
        Ok(Self { db })
    }

    /// 컬렉션 테이블 스키마
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("page", DataType::Int64, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, true),
            Field::new(
                EMBEDDING_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 레코드들을 Arrow RecordBatch로 변환
    fn records_to_batch(records: &[VectorRecord], dimension: i32) -> std::result::Result<RecordBatch, String> {
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let pages: Vec<i64> = records.iter().map(|r| r.page_number as i64).collect();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let sources: Vec<Option<&str>> = records.iter().map(|r| r.source.as_deref()).collect();

        let embeddings_flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .map_err(|e| format!("Failed to create embedding array: {}", e))?;

        RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(Int64Array::from(pages)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(sources)),
                Arc::new(embeddings),
            ],
        )
        .map_err(|e| format!("Failed to create RecordBatch: {}", e))
    }

    /// 테이블 스키마에서 벡터 차원 읽기
    fn schema_dimension(schema: &Schema) -> Option<usize> {
        match schema.field_with_name(EMBEDDING_COLUMN).ok()?.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        }
    }

    async fn table_names(&self) -> std::result::Result<Vec<String>, String> {
        self.db
            .table_names()
            .execute()
            .await
            .map_err(|e| format!("Failed to list tables: {}", e))
    }

    /// 컬렉션 테이블 열기 (없으면 CollectionNotFound)
    async fn open_table(&self, name: &str) -> Result<lancedb::table::Table> {
        let names = self.table_names().await.map_err(|e| RagError::read(name, e))?;
        if !names.iter().any(|n| n == name) {
            return Err(RagError::CollectionNotFound(name.to_string()));
        }

        self.db
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::read(name, format!("Failed to open table: {}", e)))
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let names = self.table_names().await.map_err(|e| RagError::read(name, e))?;
        Ok(names.iter().any(|n| n == name))
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let dim = i32::try_from(dimension)
            .map_err(|_| RagError::write(name, format!("Invalid dimension {}", dimension)))?;

        self.db
            .create_empty_table(name, Arc::new(Self::create_schema(dim)))
            .execute()
            .await
            .map_err(|e| RagError::write(name, format!("Failed to create table: {}", e)))?;

        tracing::debug!(collection = name, dimension, "Created LanceDB table");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        let names = self.table_names().await.map_err(|e| RagError::write(name, e))?;
        if !names.iter().any(|n| n == name) {
            return Ok(false);
        }

        self.db
            .drop_table(name)
            .await
            .map_err(|e| RagError::write(name, format!("Failed to drop table: {}", e)))?;
        Ok(true)
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let table = self.open_table(name).await.map_err(|e| match e {
            RagError::CollectionNotFound(_) => RagError::write(name, "collection does not exist"),
            RagError::VectorIndexRead { message, .. } => RagError::write(name, message),
            other => other,
        })?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::write(name, format!("Failed to read schema: {}", e)))?;
        let dimension = Self::schema_dimension(&schema)
            .ok_or_else(|| RagError::write(name, "table has no embedding column"))?;

        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            return Err(RagError::write(
                name,
                format!(
                    "vector dimension {} does not match collection dimension {}",
                    bad.embedding.len(),
                    dimension
                ),
            ));
        }

        let batch = Self::records_to_batch(records, dimension as i32)
            .map_err(|e| RagError::write(name, e))?;
        let batch_schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], batch_schema);

        table
            .add(batches)
            .execute()
            .await
            .map_err(|e| RagError::write(name, format!("Failed to add vectors: {}", e)))?;

        Ok(records.len())
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        let table = self.open_table(name).await?;

        let stream = table
            .vector_search(query.to_vec())
            .map_err(|e| RagError::read(name, format!("Failed to create vector search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::read(name, format!("Failed to execute vector search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| RagError::read(name, format!("Failed to read search results: {}", e)))?;

        let mut results = Vec::new();

        for batch in batches {
            let pages = batch
                .column_by_name("page")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| RagError::read(name, "Missing page column"))?;

            let texts = batch
                .column_by_name("chunk_text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| RagError::read(name, "Missing chunk_text column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| RagError::read(name, "Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                // 코사인 거리 = 1 - 코사인 유사도
                results.push(ScoredRecord {
                    text: texts.value(i).to_string(),
                    page_number: usize::try_from(pages.value(i)).ok(),
                    score: 1.0 - distances.value(i),
                });
            }
        }

        sort_by_score(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let table = self.open_table(name).await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::read(name, format!("Failed to count rows: {}", e)))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names = self.table_names().await.map_err(|e| RagError::read("*", e))?;
        names.sort();
        Ok(names)
    }

    fn backend(&self) -> &'static str {
        "lance"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, page: usize, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: format!("chunk {}", id),
            page_number: page,
            source: Some("manual.pdf".to_string()),
            embedding,
        }
    }

    #[test]
    fn test_schema_dimension() {
        let schema = LanceVectorStore::create_schema(768);
        assert_eq!(LanceVectorStore::schema_dimension(&schema), Some(768));
    }

    #[tokio::test]
    async fn test_lance_collection_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("vectors.lance"))
            .await
            .unwrap();

        assert!(!store.collection_exists("docs").await.unwrap());
        store.create_collection("docs", 3).await.unwrap();
        assert!(store.collection_exists("docs").await.unwrap());
        assert_eq!(store.count("docs").await.unwrap(), 0);

        let inserted = store
            .upsert("docs", &[record("a", 0, vec![1.0, 0.0, 0.0]), record("b", 1, vec![0.0, 1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count("docs").await.unwrap(), 2);
        assert_eq!(store.list_collections().await.unwrap(), vec!["docs"]);

        assert!(store.delete_collection("docs").await.unwrap());
        assert!(!store.delete_collection("docs").await.unwrap());
    }

    #[tokio::test]
    async fn test_lance_search_cosine() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("search.lance"))
            .await
            .unwrap();

        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                &[
                    record("far", 0, vec![0.0, 1.0]),
                    record("near", 3, vec![1.0, 0.0]),
                    record("mid", 5, vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("docs", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "chunk near");
        assert_eq!(results[0].page_number, Some(3));
        assert!((results[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_lance_missing_collection_and_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("err.lance"))
            .await
            .unwrap();

        let result = store.search("missing", &[1.0], 1).await;
        assert!(matches!(result, Err(RagError::CollectionNotFound(_))));

        store.create_collection("docs", 3).await.unwrap();
        let result = store.upsert("docs", &[record("a", 0, vec![1.0])]).await;
        assert!(matches!(result, Err(RagError::VectorIndexWrite { .. })));
    }
}
