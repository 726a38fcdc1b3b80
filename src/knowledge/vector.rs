//! Vector Store - 벡터 저장소 트레이트 및 유틸리티
//!
//! 컬렉션(이름 있는 네임스페이스) 단위로 청크 벡터와 메타데이터를 저장하고
//! 최근접 이웃 검색을 제공하는 백엔드 공통 인터페이스입니다.

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// 벡터 레코드 (저장용)
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// 레코드 ID (UUID)
    pub id: String,
    /// 청크 텍스트
    pub text: String,
    /// 원본 페이지 번호
    pub page_number: usize,
    /// 원본 파일 경로
    pub source: Option<String>,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// 청크 텍스트
    pub text: String,
    /// 페이지 번호 (외부 도구로 만든 컬렉션에는 없을 수 있음)
    pub page_number: Option<usize>,
    /// 유사도 스코어 (높을수록 유사)
    pub score: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 쓰기 실패는 `VectorIndexWrite`, 조회 실패는 `VectorIndexRead`,
/// 없는 컬렉션 검색은 `CollectionNotFound`로 보고합니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 컬렉션 존재 여부
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// 빈 컬렉션 생성
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()>;

    /// 컬렉션 삭제 (삭제했으면 true)
    async fn delete_collection(&self, name: &str) -> Result<bool>;

    /// 레코드 배치 삽입
    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<usize>;

    /// 유사도 내림차순 상위 `limit`개 검색
    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredRecord>>;

    /// 레코드 개수
    async fn count(&self, name: &str) -> Result<usize>;

    /// 컬렉션 이름 목록
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// 백엔드 이름
    fn backend(&self) -> &'static str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위이며, 길이가 다르거나 0 벡터면 0.0입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 점수 내림차순 정렬 (동점은 기존 순서 유지)
pub fn sort_by_score(records: &mut [ScoredRecord]) {
    records.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

// ============================================================================
// Tests
// ============================================================================
