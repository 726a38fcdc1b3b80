//! Qdrant Vector Store - gRPC 기반 원격 벡터 저장소
//!
//! 컬렉션은 코사인 거리로 생성하고, payload는 기존 인덱싱 도구와 같은
//! `{"page_content": ..., "metadata": {"page": ..., "source": ...}}` 구조로 저장합니다.
//! 따라서 다른 도구로 만든 컬렉션도 그대로 불러올 수 있습니다.
//!
//! ref: https://docs.rs/qdrant-client

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{json, Value};

use super::vector::{sort_by_score, ScoredRecord, VectorRecord, VectorStore};
use crate::error::{RagError, Result};

/// upsert 한 번에 보낼 포인트 수
const UPSERT_BATCH_SIZE: usize = 64;

/// payload 키
const CONTENT_KEY: &str = "page_content";
const METADATA_KEY: &str = "metadata";
const PAGE_KEY: &str = "page";

// ============================================================================
// QdrantStore
// ============================================================================

/// Qdrant 벡터 저장소
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Qdrant 접속
    ///
    /// # Arguments
    /// * `url` - Qdrant gRPC 주소 (예: `http://localhost:6334`)
    /// * `api_key` - Qdrant Cloud API 키 (로컬은 None)
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        url::Url::parse(url)
            .map_err(|e| RagError::Config(format!("Invalid Qdrant URL '{}': {}", url, e)))?;

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .skip_compatibility_check()
            .build()
            .map_err(|e| RagError::Config(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self { client })
    }
}

/// VectorRecord -> payload JSON
fn payload_json(record: &VectorRecord) -> Value {
    let mut metadata = serde_json::Map::new();
    metadata.insert(PAGE_KEY.to_string(), json!(record.page_number));
    if let Some(source) = &record.source {
        metadata.insert("source".to_string(), json!(source));
    }

    json!({
        CONTENT_KEY: record.text,
        METADATA_KEY: Value::Object(metadata),
    })
}

fn to_point(name: &str, record: &VectorRecord) -> Result<PointStruct> {
    let payload = Payload::try_from(payload_json(record))
        .map_err(|e| RagError::write(name, format!("Invalid payload: {}", e)))?;
    Ok(PointStruct::new(
        record.id.clone(),
        record.embedding.clone(),
        payload,
    ))
}

fn payload_text(payload: &HashMap<String, QdrantValue>) -> String {
    match payload.get(CONTENT_KEY).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => s.clone(),
        _ => String::new(),
    }
}

/// `metadata.page` 읽기 (정수, 또는 소수부가 없는 실수)
fn payload_page(payload: &HashMap<String, QdrantValue>) -> Option<usize> {
    let Some(Kind::StructValue(metadata)) = payload.get(METADATA_KEY)?.kind.as_ref() else {
        return None;
    };
    match metadata.fields.get(PAGE_KEY)?.kind.as_ref()? {
        Kind::IntegerValue(n) => usize::try_from(*n).ok(),
        Kind::DoubleValue(d) if *d >= 0.0 && d.fract() == 0.0 && *d <= u32::MAX as f64 => {
            Some(*d as usize)
        }
        _ => None,
    }
}

// ============================================================================
// VectorStore impl
// ============================================================================

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| RagError::read(name, e))
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| RagError::write(name, e))?;

        tracing::debug!(collection = name, dimension, "Created Qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }

        let response = self
            .client
            .delete_collection(name)
            .await
            .map_err(|e| RagError::write(name, e))?;
        Ok(response.result)
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let points = batch
                .iter()
                .map(|r| to_point(name, r))
                .collect::<Result<Vec<_>>>()?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
                .await
                .map_err(|e| RagError::write(name, e))?;
        }

        tracing::debug!(collection = name, count = records.len(), "Upserted points to Qdrant");
        Ok(records.len())
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        let response = match self
            .client
            .search_points(
                SearchPointsBuilder::new(name, query.to_vec(), limit as u64).with_payload(true),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // 컬렉션이 없으면 NotFound로 구분
                if matches!(self.collection_exists(name).await, Ok(false)) {
                    return Err(RagError::CollectionNotFound(name.to_string()));
                }
                return Err(RagError::read(name, e));
            }
        };

        let mut records: Vec<ScoredRecord> = response
            .result
            .into_iter()
            .map(|point| ScoredRecord {
                text: payload_text(&point.payload),
                page_number: payload_page(&point.payload),
                score: point.score,
            })
            .collect();

        sort_by_score(&mut records);
        Ok(records)
    }

    async fn count(&self, name: &str) -> Result<usize> {
        if !self.collection_exists(name).await? {
            return Err(RagError::CollectionNotFound(name.to_string()));
        }

        let response = self
            .client
            .count(CountPointsBuilder::new(name).exact(true))
            .await
            .map_err(|e| RagError::read(name, e))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| RagError::read("*", e))?;

        let mut names: Vec<String> = response.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }
}

// ============================================================================
// Tests
// ============================================================================
